// src/incentive.rs
//
// Incentive computation: derives the full bonus/fine breakdown for one
// employee over one period. Inputs are gathered from the store up front;
// the arithmetic itself is a pure function over `IncentiveInputs` so every
// rule is testable against fixed numbers and a fixed clock.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info};

use crate::model::{
    ApprovalStatus, BonusFineRecord, EntityId, Subtask, SubtaskCompletionHistory, Task,
    TaskCompletionHistory, TaskStatus,
};
use crate::period::{business_date, deadline_instant, parse_deadline_time, tenure_months};
use crate::store::DataStore;

/// Fixed incentive rates. Currency values are in the company's payout
/// currency; points are unit-less score.
pub mod rates {
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    pub const BASE_AMOUNT: Decimal = dec!(5000);

    pub const PRODUCTS_BONUS: Decimal = dec!(1000);
    pub const ATTENDANCE_BONUS_200: Decimal = dec!(2000);
    pub const ATTENDANCE_BONUS_160: Decimal = dec!(1500);
    pub const ATTENDANCE_BONUS_140: Decimal = dec!(1000);
    pub const CHECKLIST_BONUS: Decimal = dec!(1000);
    pub const LOYALTY_BONUS: Decimal = dec!(2000);
    pub const COMPLETED_PROJECTS_BONUS: Decimal = dec!(2000);

    pub const MISSING_UPDATE_RATE: Decimal = dec!(100);
    pub const MISSING_TEAM_MEETING_RATE: Decimal = dec!(100);
    pub const MISSING_INTERNAL_MEETING_RATE: Decimal = dec!(150);
    pub const MISSING_CLIENT_MEETING_RATE: Decimal = dec!(200);
    pub const DAILY_TASK_FINE: Decimal = dec!(200);

    // Absence fine tiers by absent-day count. The 14+ tier is a deduction,
    // not a fine: it reduces the fine total and can push it negative before
    // the final clamp.
    pub const ABSENCE_FINE_14_PLUS: Decimal = dec!(-500);
    pub const ABSENCE_FINE_7_TO_13: Decimal = dec!(1000);
    pub const ABSENCE_FINE_5_TO_6: Decimal = dec!(750);
    pub const ABSENCE_FINE_3_TO_4: Decimal = dec!(500);
    pub const ABSENCE_FINE_2: Decimal = dec!(250);
    pub const ABSENCE_FINE_1: Decimal = dec!(100);

    pub const ATTENDANCE_TIER_200: Decimal = dec!(200);
    pub const ATTENDANCE_TIER_160: Decimal = dec!(160);
    pub const ATTENDANCE_TIER_140: Decimal = dec!(140);
    pub const MIN_PAYABLE_HOURS: Decimal = dec!(100);

    pub const UPDATE_GRACE_DAYS: i64 = 3;
    pub const TEAM_MEETING_GRACE_DAYS: i64 = 3;
    pub const INTERNAL_MEETING_GRACE_DAYS: i64 = 3;
    pub const CLIENT_MEETING_GRACE_DAYS: i64 = 1;

    pub const NO_FINE_MIN_PRODUCTS: usize = 3; // strictly greater than
    pub const MAX_PAYABLE_ABSENT_DAYS: i64 = 4;
    pub const LOYALTY_TENURE_MONTHS: i64 = 6;
    pub const TRAINING_TENURE_MONTHS: i64 = 3;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IncentivePeriod {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl IncentivePeriod {
    pub fn new(from: NaiveDate, to: NaiveDate) -> Self {
        Self { from, to }
    }

    pub fn days(&self) -> i64 {
        (self.to - self.from).num_days() + 1
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.from && date <= self.to
    }
}

// --- Task event classification ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskOutcomeClass {
    /// Completed, approved, at or before the deadline instant.
    OnTime,
    /// Completed and approved, but after the deadline instant.
    Late,
    Rejected,
    /// Deadline passed while the task was never completed.
    DeadlineMissed,
}

impl TaskOutcomeClass {
    pub fn is_bonus(&self) -> bool {
        matches!(self, TaskOutcomeClass::OnTime)
    }
}

/// One task- or subtask-level incentive event, already dated.
#[derive(Debug, Clone, Serialize)]
pub struct TaskEvent {
    pub entity_id: EntityId,
    pub assignees: Vec<EntityId>,
    pub date: NaiveDate,
    pub class: TaskOutcomeClass,
    pub bonus_points: i64,
    pub bonus_amount: Decimal,
    pub penalty_points: i64,
    pub penalty_amount: Decimal,
}

/// The state facts needed to classify one task or subtask, independent of
/// whether they came from a live record or a history row.
#[derive(Debug, Clone)]
pub struct TaskFacts {
    pub entity_id: EntityId,
    pub assignees: Vec<EntityId>,
    pub status: TaskStatus,
    pub approval: ApprovalStatus,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    pub due_date: Option<NaiveDate>,
    pub deadline_time: Option<String>,
    pub not_applicable: bool,
    pub bonus_points: i64,
    pub bonus_amount: Decimal,
    pub penalty_points: i64,
    pub penalty_amount: Decimal,
}

impl TaskFacts {
    pub fn from_task(task: &Task) -> Self {
        Self {
            entity_id: task.id.clone(),
            assignees: task.assignees.clone(),
            status: task.status,
            approval: task.approval,
            completed_at: task.completed_at,
            created_at: Some(task.created_at),
            due_date: task.due_date,
            deadline_time: task.deadline_time.clone(),
            not_applicable: task.not_applicable,
            bonus_points: task.bonus_points,
            bonus_amount: task.bonus_amount,
            penalty_points: task.penalty_points,
            penalty_amount: task.penalty_amount,
        }
    }

    pub fn from_subtask(subtask: &Subtask, parent: &Task) -> Self {
        Self {
            entity_id: subtask.id.clone(),
            assignees: vec![subtask.assignee.clone()],
            status: subtask.status,
            approval: subtask.approval,
            completed_at: subtask.completed_at,
            created_at: Some(subtask.created_at),
            due_date: subtask.effective_due_date(parent),
            deadline_time: subtask
                .effective_deadline_time(parent)
                .map(|t| t.to_string()),
            not_applicable: subtask.not_applicable,
            bonus_points: subtask.bonus_points,
            bonus_amount: subtask.bonus_amount,
            penalty_points: subtask.penalty_points,
            penalty_amount: subtask.penalty_amount,
        }
    }

    pub fn from_task_history(row: &TaskCompletionHistory) -> Self {
        Self {
            entity_id: row.task_id.clone(),
            assignees: row.assignee_ids.clone(),
            status: row.status,
            approval: row.approval,
            completed_at: row.completed_at,
            created_at: None,
            due_date: row.due_date,
            deadline_time: row.deadline_time.clone(),
            not_applicable: row.not_applicable,
            bonus_points: row.bonus_points,
            bonus_amount: row.bonus_amount,
            penalty_points: row.penalty_points,
            penalty_amount: row.penalty_amount,
        }
    }

    pub fn from_subtask_history(row: &SubtaskCompletionHistory) -> Self {
        Self {
            entity_id: row.subtask_id.clone(),
            assignees: vec![row.assignee_id.clone()],
            status: row.status,
            approval: row.approval,
            completed_at: row.completed_at,
            created_at: None,
            due_date: row.due_date,
            deadline_time: row.deadline_time.clone(),
            not_applicable: row.not_applicable,
            bonus_points: row.bonus_points,
            bonus_amount: row.bonus_amount,
            penalty_points: row.penalty_points,
            penalty_amount: row.penalty_amount,
        }
    }

    /// Penalty in currency, with the legacy fallback: when no currency
    /// penalty is configured, the point value doubles as the amount.
    fn effective_penalty_amount(&self) -> Decimal {
        if self.penalty_amount.is_zero() {
            Decimal::from(self.penalty_points)
        } else {
            self.penalty_amount
        }
    }

    /// The absolute deadline instant, when a due date is configured. A
    /// missing or malformed time defaults to end of the business day.
    fn deadline_instant(&self, tz: FixedOffset) -> Option<DateTime<Utc>> {
        let due = self.due_date?;
        let time = self
            .deadline_time
            .as_deref()
            .and_then(parse_deadline_time)
            .unwrap_or_else(|| NaiveTime::from_hms_opt(23, 59, 59).expect("valid end of day"));
        Some(deadline_instant(due, time, tz))
    }
}

/// Classifies one task/subtask into an incentive event, or `None` when it
/// carries no incentive consequence (pending, in progress, or marked not
/// applicable).
pub fn classify(facts: &TaskFacts, now: DateTime<Utc>, tz: FixedOffset) -> Option<TaskEvent> {
    if facts.not_applicable {
        return None;
    }

    let deadline = facts.deadline_instant(tz);
    let (class, event_instant) = match (facts.status, facts.approval) {
        (TaskStatus::Completed, ApprovalStatus::Approved) => {
            let completed_at = facts.completed_at?;
            // The boundary is inclusive: completion exactly at the deadline
            // instant counts as on time.
            let on_time = deadline.map_or(true, |d| completed_at <= d);
            let class = if on_time {
                TaskOutcomeClass::OnTime
            } else {
                TaskOutcomeClass::Late
            };
            (class, completed_at)
        }
        (_, ApprovalStatus::Rejected) => {
            let instant = facts.completed_at.or(facts.created_at)?;
            (TaskOutcomeClass::Rejected, instant)
        }
        (_, ApprovalStatus::DeadlinePassed) => {
            let instant = deadline.or(facts.completed_at)?;
            (TaskOutcomeClass::DeadlineMissed, instant)
        }
        (status, _) if status != TaskStatus::Completed => {
            // Deadline elapsed while the work never finished.
            let deadline = deadline?;
            if deadline <= now {
                (TaskOutcomeClass::DeadlineMissed, deadline)
            } else {
                return None;
            }
        }
        // Completed but still awaiting approval: no incentive yet.
        _ => return None,
    };

    let (bonus_points, bonus_amount, penalty_points, penalty_amount) = if class.is_bonus() {
        (facts.bonus_points, facts.bonus_amount, 0, Decimal::ZERO)
    } else {
        (0, Decimal::ZERO, facts.penalty_points, facts.effective_penalty_amount())
    };

    Some(TaskEvent {
        entity_id: facts.entity_id.clone(),
        assignees: facts.assignees.clone(),
        date: business_date(event_instant, tz),
        class,
        bonus_points,
        bonus_amount,
        penalty_points,
        penalty_amount,
    })
}

/// Collects classified events from history and live records. History rows
/// are authoritative: they are folded first, and a live record only adds an
/// event when no archived row already covers the same (entity, day) key.
///
/// A live record that was reset back to pending still carries the due date
/// of its archived cycle; its not-finished-by-deadline reading must never
/// shadow or add to the archived outcome, so live `DeadlineMissed` events
/// are dropped whenever a history row exists for that entity and due date.
pub fn collect_task_events(store: &DataStore, now: DateTime<Utc>, tz: FixedOffset) -> Vec<TaskEvent> {
    let mut events: Vec<TaskEvent> = Vec::new();
    let mut seen: std::collections::HashSet<(EntityId, NaiveDate)> = std::collections::HashSet::new();
    let mut archived_cycles: std::collections::HashSet<(EntityId, Option<NaiveDate>)> =
        std::collections::HashSet::new();

    for row in store.task_history_rows() {
        archived_cycles.insert((row.task_id.clone(), row.due_date));
        if let Some(event) = classify(&TaskFacts::from_task_history(&row), now, tz) {
            if seen.insert((event.entity_id.clone(), event.date)) {
                events.push(event);
            }
        }
    }
    for row in store.subtask_history_rows() {
        archived_cycles.insert((row.subtask_id.clone(), row.due_date));
        if let Some(event) = classify(&TaskFacts::from_subtask_history(&row), now, tz) {
            if seen.insert((event.entity_id.clone(), event.date)) {
                events.push(event);
            }
        }
    }

    let tasks = store.all_tasks();
    for task in &tasks {
        let facts = TaskFacts::from_task(task);
        if let Some(event) = classify(&facts, now, tz) {
            if !is_stale_deadline_event(&event, &facts, &archived_cycles)
                && seen.insert((event.entity_id.clone(), event.date))
            {
                events.push(event);
            }
        }
        for subtask in store.subtasks_of(&task.id) {
            let facts = TaskFacts::from_subtask(&subtask, task);
            if let Some(event) = classify(&facts, now, tz) {
                if !is_stale_deadline_event(&event, &facts, &archived_cycles)
                    && seen.insert((event.entity_id.clone(), event.date))
                {
                    events.push(event);
                }
            }
        }
    }

    events
}

/// A live `DeadlineMissed` reading is stale when the deadline it points at
/// belongs to a cycle that has already been archived.
fn is_stale_deadline_event(
    event: &TaskEvent,
    facts: &TaskFacts,
    archived_cycles: &std::collections::HashSet<(EntityId, Option<NaiveDate>)>,
) -> bool {
    event.class == TaskOutcomeClass::DeadlineMissed
        && archived_cycles.contains(&(facts.entity_id.clone(), facts.due_date))
}

// --- Inputs and computation ---

#[derive(Debug, Clone)]
pub struct IncentiveInputs {
    pub employee_id: EntityId,
    pub period: IncentivePeriod,
    pub attendance_hours: Decimal,
    pub absent_days: i64,
    pub tenure_months: i64,
    /// Completed projects the employee is attached to (lead, VA or update
    /// in-charge).
    pub products_completed: usize,
    pub client_approved_projects: usize,
    pub lead_on_completed_project: bool,
    pub is_project_lead: bool,
    pub approved_updates: usize,
    /// Approved updates with both compliance flags set.
    pub compliant_updates: usize,
    pub missing_update_days: i64,
    pub missing_team_meeting_days: i64,
    pub missing_internal_meeting_days: i64,
    pub missing_client_meeting_days: i64,
    pub task_events: Vec<TaskEvent>,
    pub daily_task_fine_total: Decimal,
    pub custom_fine_total: Decimal,
    pub custom_fine_points: i64,
    pub override_record: Option<BonusFineRecord>,
}

impl IncentiveInputs {
    /// A blank input set; tests fill in only what a rule needs.
    pub fn empty(employee_id: EntityId, period: IncentivePeriod) -> Self {
        Self {
            employee_id,
            period,
            attendance_hours: Decimal::ZERO,
            absent_days: 0,
            tenure_months: 0,
            products_completed: 0,
            client_approved_projects: 0,
            lead_on_completed_project: false,
            is_project_lead: false,
            approved_updates: 0,
            compliant_updates: 0,
            missing_update_days: 0,
            missing_team_meeting_days: 0,
            missing_internal_meeting_days: 0,
            missing_client_meeting_days: 0,
            task_events: Vec::new(),
            daily_task_fine_total: Decimal::ZERO,
            custom_fine_total: Decimal::ZERO,
            custom_fine_points: 0,
            override_record: None,
        }
    }
}

/// The full breakdown reported for one employee and one period. Every
/// category is kept visible even when a short-circuit zeroes the total; the
/// explanatory condition lists say why.
#[derive(Debug, Clone, Serialize)]
pub struct IncentiveCalculation {
    pub employee_id: EntityId,
    pub period: IncentivePeriod,

    pub base_amount: Decimal,
    pub products_bonus: Decimal,
    pub attendance_bonus: Decimal,
    pub checklist_bonus: Decimal,
    pub loyalty_bonus: Decimal,
    pub completed_projects_bonus: Decimal,
    pub task_bonus_amount: Decimal,
    pub task_bonus_points: i64,

    pub missing_update_fine: Decimal,
    pub missing_team_meeting_fine: Decimal,
    pub missing_internal_meeting_fine: Decimal,
    pub missing_client_meeting_fine: Decimal,
    pub absence_fine: Decimal,
    pub daily_task_fine: Decimal,
    pub task_fine_amount: Decimal,
    pub task_fine_points: i64,
    pub custom_fine: Decimal,
    pub custom_fine_points: i64,

    pub total_bonus: Decimal,
    pub total_fine: Decimal,
    pub net_amount: Decimal,

    pub no_fine_conditions: Vec<String>,
    pub no_payment_conditions: Vec<String>,
    pub training_period: bool,
    pub project_lead_fine_doubled: bool,
    pub manual_override: bool,
    pub approved_by_core_team: bool,
}

fn absence_fine_for(absent_days: i64) -> Decimal {
    match absent_days {
        d if d >= 14 => rates::ABSENCE_FINE_14_PLUS,
        7..=13 => rates::ABSENCE_FINE_7_TO_13,
        5..=6 => rates::ABSENCE_FINE_5_TO_6,
        3..=4 => rates::ABSENCE_FINE_3_TO_4,
        2 => rates::ABSENCE_FINE_2,
        1 => rates::ABSENCE_FINE_1,
        _ => Decimal::ZERO,
    }
}

fn grace_fine(missing_days: i64, grace: i64, rate: Decimal) -> Decimal {
    let chargeable = (missing_days - grace).max(0);
    rate * Decimal::from(chargeable)
}

/// Pure incentive arithmetic over pre-gathered inputs, applying the
/// eligibility short-circuits in their fixed order after the category sums.
pub fn compute(inputs: &IncentiveInputs) -> IncentiveCalculation {
    // Bonus categories, each independently gated.
    let products_bonus = if inputs.products_completed > rates::NO_FINE_MIN_PRODUCTS {
        rates::PRODUCTS_BONUS
    } else {
        Decimal::ZERO
    };
    let attendance_bonus = if inputs.attendance_hours > rates::ATTENDANCE_TIER_200 {
        rates::ATTENDANCE_BONUS_200
    } else if inputs.attendance_hours > rates::ATTENDANCE_TIER_160 {
        rates::ATTENDANCE_BONUS_160
    } else if inputs.attendance_hours > rates::ATTENDANCE_TIER_140 {
        rates::ATTENDANCE_BONUS_140
    } else {
        Decimal::ZERO
    };
    // >= 80% of approved updates carrying both flags.
    let checklist_bonus = if inputs.approved_updates > 0
        && inputs.compliant_updates * 5 >= inputs.approved_updates * 4
    {
        rates::CHECKLIST_BONUS
    } else {
        Decimal::ZERO
    };
    let loyalty_bonus = if inputs.tenure_months >= rates::LOYALTY_TENURE_MONTHS {
        rates::LOYALTY_BONUS
    } else {
        Decimal::ZERO
    };
    // The project-lead multiplier applies to this category only.
    let completed_projects_bonus = if inputs.products_completed >= 1 {
        if inputs.lead_on_completed_project {
            rates::COMPLETED_PROJECTS_BONUS * Decimal::from(2)
        } else {
            rates::COMPLETED_PROJECTS_BONUS
        }
    } else {
        Decimal::ZERO
    };

    let mut task_bonus_amount = Decimal::ZERO;
    let mut task_bonus_points = 0i64;
    let mut task_fine_amount = Decimal::ZERO;
    let mut task_fine_points = 0i64;
    for event in &inputs.task_events {
        if !inputs.period.contains(event.date) {
            continue;
        }
        if event.class.is_bonus() {
            task_bonus_amount += event.bonus_amount;
            task_bonus_points += event.bonus_points;
        } else {
            task_fine_amount += event.penalty_amount;
            task_fine_points += event.penalty_points;
        }
    }

    // Fine categories.
    let missing_update_fine = grace_fine(
        inputs.missing_update_days,
        rates::UPDATE_GRACE_DAYS,
        rates::MISSING_UPDATE_RATE,
    );
    let missing_team_meeting_fine = grace_fine(
        inputs.missing_team_meeting_days,
        rates::TEAM_MEETING_GRACE_DAYS,
        rates::MISSING_TEAM_MEETING_RATE,
    );
    let missing_internal_meeting_fine = grace_fine(
        inputs.missing_internal_meeting_days,
        rates::INTERNAL_MEETING_GRACE_DAYS,
        rates::MISSING_INTERNAL_MEETING_RATE,
    );
    let missing_client_meeting_fine = grace_fine(
        inputs.missing_client_meeting_days,
        rates::CLIENT_MEETING_GRACE_DAYS,
        rates::MISSING_CLIENT_MEETING_RATE,
    );
    let absence_fine = absence_fine_for(inputs.absent_days);

    let mut total_bonus = products_bonus
        + attendance_bonus
        + checklist_bonus
        + loyalty_bonus
        + completed_projects_bonus
        + task_bonus_amount;
    let mut total_fine = missing_update_fine
        + missing_team_meeting_fine
        + missing_internal_meeting_fine
        + missing_client_meeting_fine
        + absence_fine
        + inputs.daily_task_fine_total
        + task_fine_amount
        + inputs.custom_fine_total;

    // 1. No-fine conditions.
    let mut no_fine_conditions = Vec::new();
    if inputs.products_completed > rates::NO_FINE_MIN_PRODUCTS {
        no_fine_conditions.push(format!(
            "products completed ({}) above threshold",
            inputs.products_completed
        ));
    }
    if inputs.client_approved_projects > rates::NO_FINE_MIN_PRODUCTS {
        no_fine_conditions.push(format!(
            "client-approved projects ({}) above threshold",
            inputs.client_approved_projects
        ));
    }
    if !no_fine_conditions.is_empty() {
        total_fine = Decimal::ZERO;
    }

    // 2. Training period.
    let training_period = inputs.tenure_months < rates::TRAINING_TENURE_MONTHS;
    if training_period {
        total_fine = Decimal::ZERO;
    }

    // 3. Project-lead fine multiplier.
    let mut project_lead_fine_doubled = false;
    if inputs.is_project_lead && total_fine > Decimal::ZERO {
        total_fine *= Decimal::from(2);
        project_lead_fine_doubled = true;
    }

    // 4. Fine floor.
    if total_fine < Decimal::ZERO {
        total_fine = Decimal::ZERO;
    }

    // 5. No-payment conditions.
    let mut no_payment_conditions = Vec::new();
    if inputs.attendance_hours < rates::MIN_PAYABLE_HOURS {
        no_payment_conditions.push(format!(
            "attendance hours ({}) below minimum",
            inputs.attendance_hours
        ));
    }
    if inputs.absent_days > rates::MAX_PAYABLE_ABSENT_DAYS {
        no_payment_conditions.push(format!("absent days ({}) above limit", inputs.absent_days));
    }
    if inputs.products_completed == 0 {
        no_payment_conditions.push("no completed products".to_string());
    }

    // 6. Bonus floor.
    if total_bonus < Decimal::ZERO {
        total_bonus = Decimal::ZERO;
    }

    // 7. Manual overrides supersede the computed totals.
    let mut manual_override = false;
    let mut approved_by_core_team = false;
    if let Some(record) = &inputs.override_record {
        approved_by_core_team = record.approved_by_core_team;
        if let Some(manual_bonus) = record.manual_bonus {
            total_bonus = manual_bonus.max(Decimal::ZERO);
            manual_override = true;
        }
        if let Some(manual_fine) = record.manual_fine {
            total_fine = manual_fine.max(Decimal::ZERO);
            manual_override = true;
        }
    }

    let payable = no_payment_conditions.is_empty() || approved_by_core_team;
    let net_amount = if payable {
        rates::BASE_AMOUNT + total_bonus - total_fine
    } else {
        Decimal::ZERO
    };

    debug!(
        employee = %inputs.employee_id,
        %total_bonus,
        %total_fine,
        %net_amount,
        "incentive computed"
    );

    IncentiveCalculation {
        employee_id: inputs.employee_id.clone(),
        period: inputs.period,
        base_amount: rates::BASE_AMOUNT,
        products_bonus,
        attendance_bonus,
        checklist_bonus,
        loyalty_bonus,
        completed_projects_bonus,
        task_bonus_amount,
        task_bonus_points,
        missing_update_fine,
        missing_team_meeting_fine,
        missing_internal_meeting_fine,
        missing_client_meeting_fine,
        absence_fine,
        daily_task_fine: inputs.daily_task_fine_total,
        task_fine_amount,
        task_fine_points,
        custom_fine: inputs.custom_fine_total,
        custom_fine_points: inputs.custom_fine_points,
        total_bonus,
        total_fine,
        net_amount,
        no_fine_conditions,
        no_payment_conditions,
        training_period,
        project_lead_fine_doubled,
        manual_override,
        approved_by_core_team,
    }
}

/// Gathers the per-employee inputs from the store and runs the computation.
pub fn calculate_for_employee(
    store: &DataStore,
    employee_id: &EntityId,
    period: IncentivePeriod,
    now: DateTime<Utc>,
    tz: FixedOffset,
) -> anyhow::Result<IncentiveCalculation> {
    let inputs = gather_inputs(store, employee_id, period, now, tz)?;
    let calculation = compute(&inputs);
    info!(
        employee = %employee_id,
        from = %period.from,
        to = %period.to,
        net = %calculation.net_amount,
        "incentive calculation ready"
    );
    Ok(calculation)
}

pub fn gather_inputs(
    store: &DataStore,
    employee_id: &EntityId,
    period: IncentivePeriod,
    now: DateTime<Utc>,
    tz: FixedOffset,
) -> anyhow::Result<IncentiveInputs> {
    let employee = store.employee(employee_id)?;

    let attendance = store.attendance_for(employee_id, period.from, period.to);
    let attendance_hours: Decimal = attendance.iter().map(|r| r.hours).sum();
    let present_days = attendance
        .iter()
        .map(|r| r.date)
        .collect::<std::collections::HashSet<_>>()
        .len() as i64;
    // Absence is inferred, never stored: period days minus days present.
    let absent_days = (period.days() - present_days).max(0);

    let projects = store.projects_involving(employee_id);
    let completed: Vec<_> = projects
        .iter()
        .filter(|p| p.status == crate::model::ProjectStatus::Completed)
        .collect();
    let products_completed = completed.len();
    let lead_on_completed_project = completed
        .iter()
        .any(|p| p.lead_assignee.as_ref() == Some(employee_id));
    let client_approved_projects = projects.iter().filter(|p| p.client_approved).count();
    let is_project_lead = !store.projects_led_by(employee_id).is_empty();

    let updates = store.approved_updates_for(employee_id, period.from, period.to);
    let approved_updates = updates.len();
    let compliant_updates = updates
        .iter()
        .filter(|u| u.plan_submitted && u.summary_submitted)
        .count();
    // Days are what count here, not update rows: several approved updates on
    // one date still cover exactly one day.
    let distinct_days = |pred: &dyn Fn(&crate::model::DailyUpdate) -> bool| -> i64 {
        updates
            .iter()
            .filter(|u| pred(u))
            .map(|u| u.date)
            .collect::<std::collections::HashSet<_>>()
            .len() as i64
    };
    let missing_update_days = period.days() - distinct_days(&|_| true);
    let missing_team_meeting_days = period.days() - distinct_days(&|u| u.team_meeting_attended);
    let missing_internal_meeting_days =
        period.days() - distinct_days(&|u| u.internal_meeting_attended);
    let missing_client_meeting_days =
        period.days() - distinct_days(&|u| u.client_meeting_attended);

    let task_events: Vec<TaskEvent> = collect_task_events(store, now, tz)
        .into_iter()
        .filter(|e| e.assignees.contains(employee_id))
        .collect();

    let daily_task_fine_total: Decimal = store
        .daily_task_fines_for(employee_id, period.from, period.to)
        .iter()
        .map(|f| f.amount)
        .sum();
    let custom_fines = store.custom_fines_for(employee_id, period.from, period.to);
    let custom_fine_total: Decimal = custom_fines.iter().map(|f| f.amount).sum();
    let custom_fine_points: i64 = custom_fines.iter().map(|f| f.points).sum();

    let override_record = store.bonus_fine_record(employee_id, period.from);

    Ok(IncentiveInputs {
        employee_id: employee_id.clone(),
        period,
        attendance_hours,
        absent_days,
        tenure_months: tenure_months(employee.joined_on, period.to),
        products_completed,
        client_approved_projects,
        lead_on_completed_project,
        is_project_lead,
        approved_updates,
        compliant_updates,
        missing_update_days: missing_update_days.max(0),
        missing_team_meeting_days: missing_team_meeting_days.max(0),
        missing_internal_meeting_days: missing_internal_meeting_days.max(0),
        missing_client_meeting_days: missing_client_meeting_days.max(0),
        task_events,
        daily_task_fine_total,
        custom_fine_total,
        custom_fine_points,
        override_record,
    })
}
