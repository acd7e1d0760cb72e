// src/model.rs
//
// Domain documents for the task lifecycle and incentive engine. Everything
// here is a plain serde-(de)serializable record; business rules live in the
// recurrence/reset/incentive modules.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc, Weekday};
use rust_decimal::Decimal;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

// --- Canonical identifiers ---

/// Canonical owned identifier for any document.
///
/// Upstream data arrives with ids in several shapes: a plain string, a bare
/// integer, or an object wrapper (`{"$oid": ...}`, `{"_id": ...}`,
/// `{"id": ...}`). All of them are normalized to one owned string here, at
/// the deserialization boundary, so no business logic ever branches on the
/// representation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct EntityId(pub String);

impl EntityId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

impl<'de> Deserialize<'de> for EntityId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;
        normalize_id_value(&value)
            .map(EntityId)
            .ok_or_else(|| de::Error::custom(format!("unrecognized id shape: {}", value)))
    }
}

/// The single normalization point for identifier representations.
fn normalize_id_value(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Object(map) => {
            for key in ["$oid", "_id", "id"] {
                if let Some(inner) = map.get(key) {
                    if let Some(normalized) = normalize_id_value(inner) {
                        return Some(normalized);
                    }
                }
            }
            None
        }
        _ => None,
    }
}

// --- Task enumerations ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    OneTime,
    Daily,
    Weekly,
    Monthly,
    Recurring,
    Custom,
}

impl TaskKind {
    /// Kinds whose completion state is expected to be cleared and reused.
    pub fn is_recurring(&self) -> bool {
        !matches!(self, TaskKind::OneTime)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Overdue,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
    DeadlinePassed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
}

/// Recurrence configuration carried by `recurring` and `custom` tasks.
///
/// Interval-based kinds use `frequency` + `interval`, optionally pinned to a
/// specific weekday or day of month. Custom kinds use the explicit day
/// lists, with `recurring` distinguishing an every-matching-day pattern from
/// a once-per-period one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecurrenceConfig {
    #[serde(default)]
    pub frequency: Option<Frequency>,
    #[serde(default)]
    pub interval: Option<u32>,
    #[serde(default)]
    pub day_of_week: Option<Weekday>,
    #[serde(default)]
    pub day_of_month: Option<u32>,
    #[serde(default)]
    pub days_of_week: Vec<Weekday>,
    #[serde(default)]
    pub days_of_month: Vec<u32>,
    #[serde(default = "default_true")]
    pub recurring: bool,
}

fn default_true() -> bool {
    true
}

// --- Tasks and subtasks ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: EntityId,
    pub project_id: EntityId,
    pub title: String,
    pub kind: TaskKind,
    pub status: TaskStatus,
    pub approval: ApprovalStatus,
    #[serde(default)]
    pub assignees: Vec<EntityId>,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    /// Deadline time of day as "HH:MM", interpreted in the business timezone.
    #[serde(default)]
    pub deadline_time: Option<String>,
    #[serde(default)]
    pub bonus_points: i64,
    #[serde(default)]
    pub bonus_amount: Decimal,
    #[serde(default)]
    pub penalty_points: i64,
    #[serde(default)]
    pub penalty_amount: Decimal,
    #[serde(default)]
    pub recurrence: Option<RecurrenceConfig>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_by: Option<EntityId>,
    #[serde(default)]
    pub approved_by: Option<EntityId>,
    /// Excluded from incentive calculation entirely.
    #[serde(default)]
    pub not_applicable: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub created_by: Option<EntityId>,
}

impl Task {
    pub fn is_completed(&self) -> bool {
        self.status == TaskStatus::Completed
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subtask {
    pub id: EntityId,
    pub parent_task_id: EntityId,
    pub title: String,
    pub status: TaskStatus,
    pub approval: ApprovalStatus,
    pub assignee: EntityId,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub deadline_time: Option<String>,
    #[serde(default)]
    pub bonus_points: i64,
    #[serde(default)]
    pub bonus_amount: Decimal,
    #[serde(default)]
    pub penalty_points: i64,
    #[serde(default)]
    pub penalty_amount: Decimal,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub approved_by: Option<EntityId>,
    #[serde(default)]
    pub not_applicable: bool,
    pub created_at: DateTime<Utc>,
}

impl Subtask {
    pub fn is_completed(&self) -> bool {
        self.status == TaskStatus::Completed
    }

    /// Due date falls back to the parent task's when unset.
    pub fn effective_due_date(&self, parent: &Task) -> Option<NaiveDate> {
        self.due_date.or(parent.due_date)
    }

    /// Deadline time falls back to the parent task's when unset.
    pub fn effective_deadline_time<'a>(&'a self, parent: &'a Task) -> Option<&'a str> {
        self.deadline_time
            .as_deref()
            .or(parent.deadline_time.as_deref())
    }
}

// --- Completion history (append-only) ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskCompletionHistory {
    pub task_id: EntityId,
    pub project_id: EntityId,
    pub title: String,
    pub kind: TaskKind,
    pub status: TaskStatus,
    pub approval: ApprovalStatus,
    /// Denormalized at archive time; the live user record may later change.
    pub assignee_names: Vec<String>,
    pub assignee_ids: Vec<EntityId>,
    pub completed_by_name: String,
    pub approved_by_name: String,
    pub due_date: Option<NaiveDate>,
    pub deadline_time: Option<String>,
    pub bonus_points: i64,
    pub bonus_amount: Decimal,
    pub penalty_points: i64,
    pub penalty_amount: Decimal,
    pub not_applicable: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub archived_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubtaskCompletionHistory {
    pub subtask_id: EntityId,
    pub parent_task_id: EntityId,
    pub project_id: EntityId,
    pub title: String,
    pub status: TaskStatus,
    pub approval: ApprovalStatus,
    pub assignee_id: EntityId,
    pub assignee_name: String,
    pub approved_by_name: String,
    pub due_date: Option<NaiveDate>,
    pub deadline_time: Option<String>,
    pub bonus_points: i64,
    pub bonus_amount: Decimal,
    pub penalty_points: i64,
    pub penalty_amount: Decimal,
    pub not_applicable: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub archived_at: DateTime<Utc>,
}

// --- Attendance and daily updates ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub employee_id: EntityId,
    pub date: NaiveDate,
    pub hours: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyUpdate {
    pub employee_id: EntityId,
    pub date: NaiveDate,
    pub approved: bool,
    /// Compliance flags; both must be set for an update to count toward the
    /// checklist compliance bonus.
    #[serde(default)]
    pub plan_submitted: bool,
    #[serde(default)]
    pub summary_submitted: bool,
    /// Labels of checklist items completed with this update.
    #[serde(default)]
    pub checklist_items: Vec<String>,
    #[serde(default)]
    pub team_meeting_attended: bool,
    #[serde(default)]
    pub internal_meeting_attended: bool,
    #[serde(default)]
    pub client_meeting_attended: bool,
}

// --- Checklist configuration ---

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChecklistRate {
    #[serde(default)]
    pub bonus_points: i64,
    #[serde(default)]
    pub bonus_amount: Decimal,
    #[serde(default)]
    pub fine_points: i64,
    #[serde(default)]
    pub fine_amount: Decimal,
}

/// Three precedence tiers of checklist rates: per-employee custom beats
/// per-skill, which beats global.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChecklistSettings {
    #[serde(default)]
    pub global: HashMap<String, ChecklistRate>,
    #[serde(default)]
    pub by_skill: HashMap<String, HashMap<String, ChecklistRate>>,
    #[serde(default)]
    pub by_employee: HashMap<EntityId, HashMap<String, ChecklistRate>>,
}

impl ChecklistSettings {
    /// Resolves the effective item->rate map for one employee.
    pub fn resolve_for(&self, employee: &Employee) -> HashMap<String, ChecklistRate> {
        let mut resolved = self.global.clone();
        if let Some(skill) = &employee.skill {
            if let Some(tier) = self.by_skill.get(skill) {
                for (label, rate) in tier {
                    resolved.insert(label.clone(), rate.clone());
                }
            }
        }
        if let Some(tier) = self.by_employee.get(&employee.id) {
            for (label, rate) in tier {
                resolved.insert(label.clone(), rate.clone());
            }
        }
        resolved
    }
}

// --- Projects, employees, awards ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Active,
    Completed,
    OnHold,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: EntityId,
    pub name: String,
    pub status: ProjectStatus,
    #[serde(default)]
    pub lead_assignee: Option<EntityId>,
    #[serde(default)]
    pub va_assignee: Option<EntityId>,
    #[serde(default)]
    pub update_incharge: Option<EntityId>,
    #[serde(default)]
    pub deadline: Option<NaiveDate>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub client_approved: bool,
    #[serde(default)]
    pub lead_bonus_amount: Decimal,
    #[serde(default)]
    pub lead_fine_amount: Decimal,
}

impl Project {
    pub fn involves(&self, employee_id: &EntityId) -> bool {
        self.lead_assignee.as_ref() == Some(employee_id)
            || self.va_assignee.as_ref() == Some(employee_id)
            || self.update_incharge.as_ref() == Some(employee_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Employee {
    pub id: EntityId,
    pub name: String,
    pub joined_on: NaiveDate,
    #[serde(default)]
    pub approved: bool,
    #[serde(default)]
    pub skill: Option<String>,
    #[serde(default)]
    pub core_team: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HackathonAward {
    pub hackathon_id: EntityId,
    pub participant_id: EntityId,
    pub winner: bool,
    #[serde(default)]
    pub prize_amount: Decimal,
    #[serde(default)]
    pub prize_points: i64,
    pub result_date: NaiveDate,
}

// --- Fine and override records ---

/// Persisted per-employee aggregate for a period, carrying optional manual
/// admin overrides that supersede computed totals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BonusFineRecord {
    pub employee_id: EntityId,
    /// First day of the period the record covers.
    pub period_start: NaiveDate,
    #[serde(default)]
    pub accumulated_fine: Decimal,
    #[serde(default)]
    pub manual_bonus: Option<Decimal>,
    #[serde(default)]
    pub manual_fine: Option<Decimal>,
    #[serde(default)]
    pub admin_notes: Option<String>,
    #[serde(default)]
    pub approved_by_core_team: bool,
}

/// One fine charged to a project lead for a day with no task created before
/// the configured deadline. Unique per (employee, project, date).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyTaskFine {
    pub employee_id: EntityId,
    pub project_id: EntityId,
    pub date: NaiveDate,
    pub amount: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomFine {
    pub employee_id: EntityId,
    pub date: NaiveDate,
    #[serde(default)]
    pub points: i64,
    #[serde(default)]
    pub amount: Decimal,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomBonus {
    pub employee_id: EntityId,
    pub date: NaiveDate,
    #[serde(default)]
    pub points: i64,
    #[serde(default)]
    pub amount: Decimal,
    #[serde(default)]
    pub note: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_id_normalizes_all_known_shapes() {
        let cases = [
            (r#""64ab12""#, "64ab12"),
            (r#"1207"#, "1207"),
            (r#"{"$oid": "64ab12"}"#, "64ab12"),
            (r#"{"_id": "64ab12"}"#, "64ab12"),
            (r#"{"id": 42}"#, "42"),
            (r#"{"_id": {"$oid": "64ab12"}}"#, "64ab12"),
        ];
        for (raw, expected) in cases {
            let id: EntityId = serde_json::from_str(raw).unwrap();
            assert_eq!(id.as_str(), expected, "input {}", raw);
        }
    }

    #[test]
    fn entity_id_rejects_unusable_shapes() {
        for raw in [r#"null"#, r#"true"#, r#"{"name": "x"}"#, r#""""#] {
            assert!(
                serde_json::from_str::<EntityId>(raw).is_err(),
                "input {} should not normalize",
                raw
            );
        }
    }

    #[test]
    fn checklist_resolution_prefers_custom_over_skill_over_global() {
        let mut settings = ChecklistSettings::default();
        let rate = |points: i64| ChecklistRate {
            bonus_points: points,
            ..Default::default()
        };
        settings.global.insert("eod-report".into(), rate(1));
        settings.global.insert("standup".into(), rate(1));
        settings
            .by_skill
            .entry("design".into())
            .or_default()
            .insert("eod-report".into(), rate(2));
        settings
            .by_employee
            .entry(EntityId::from("emp-1"))
            .or_default()
            .insert("eod-report".into(), rate(3));

        let designer = Employee {
            id: EntityId::from("emp-1"),
            name: "Dana".into(),
            joined_on: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            approved: true,
            skill: Some("design".into()),
            core_team: false,
        };
        let resolved = settings.resolve_for(&designer);
        assert_eq!(resolved["eod-report"].bonus_points, 3);
        assert_eq!(resolved["standup"].bonus_points, 1);

        let other = Employee {
            id: EntityId::from("emp-2"),
            ..designer.clone()
        };
        let resolved = settings.resolve_for(&other);
        assert_eq!(resolved["eod-report"].bonus_points, 2);
    }
}
