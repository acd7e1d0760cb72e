// src/store.rs
//
// Generic in-memory document store. Collections are addressed through typed
// filter methods rather than a wire protocol; the physical persistence
// driver sits behind this boundary and is not part of the core.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::model::{
    AttendanceRecord, BonusFineRecord, ChecklistSettings, CustomBonus, CustomFine, DailyTaskFine,
    DailyUpdate, Employee, EntityId, HackathonAward, Project, ProjectStatus, Subtask,
    SubtaskCompletionHistory, Task, TaskCompletionHistory, TaskStatus,
};

#[derive(Clone, Default)]
pub struct DataStore {
    pub tasks: Arc<Mutex<HashMap<EntityId, Task>>>,
    pub subtasks: Arc<Mutex<HashMap<EntityId, Subtask>>>,
    pub task_history: Arc<Mutex<Vec<TaskCompletionHistory>>>,
    pub subtask_history: Arc<Mutex<Vec<SubtaskCompletionHistory>>>,
    pub attendance: Arc<Mutex<Vec<AttendanceRecord>>>,
    pub daily_updates: Arc<Mutex<Vec<DailyUpdate>>>,
    pub checklist: Arc<Mutex<ChecklistSettings>>,
    pub projects: Arc<Mutex<HashMap<EntityId, Project>>>,
    pub employees: Arc<Mutex<HashMap<EntityId, Employee>>>,
    pub hackathon_awards: Arc<Mutex<Vec<HackathonAward>>>,
    pub bonus_fine_records: Arc<Mutex<Vec<BonusFineRecord>>>,
    pub daily_task_fines: Arc<Mutex<Vec<DailyTaskFine>>>,
    pub custom_fines: Arc<Mutex<Vec<CustomFine>>>,
    pub custom_bonuses: Arc<Mutex<Vec<CustomBonus>>>,
}

/// Full dataset snapshot accepted by the seed endpoint and test fixtures.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub subtasks: Vec<Subtask>,
    #[serde(default)]
    pub task_history: Vec<TaskCompletionHistory>,
    #[serde(default)]
    pub subtask_history: Vec<SubtaskCompletionHistory>,
    #[serde(default)]
    pub attendance: Vec<AttendanceRecord>,
    #[serde(default)]
    pub daily_updates: Vec<DailyUpdate>,
    #[serde(default)]
    pub checklist: ChecklistSettings,
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default)]
    pub employees: Vec<Employee>,
    #[serde(default)]
    pub hackathon_awards: Vec<HackathonAward>,
    #[serde(default)]
    pub bonus_fine_records: Vec<BonusFineRecord>,
    #[serde(default)]
    pub daily_task_fines: Vec<DailyTaskFine>,
    #[serde(default)]
    pub custom_fines: Vec<CustomFine>,
    #[serde(default)]
    pub custom_bonuses: Vec<CustomBonus>,
}

impl DataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load_snapshot(&self, snapshot: Snapshot) {
        info!(
            tasks = snapshot.tasks.len(),
            subtasks = snapshot.subtasks.len(),
            employees = snapshot.employees.len(),
            projects = snapshot.projects.len(),
            "loading dataset snapshot"
        );
        let mut tasks = self.tasks.lock().unwrap();
        for task in snapshot.tasks {
            tasks.insert(task.id.clone(), task);
        }
        drop(tasks);
        let mut subtasks = self.subtasks.lock().unwrap();
        for subtask in snapshot.subtasks {
            subtasks.insert(subtask.id.clone(), subtask);
        }
        drop(subtasks);
        self.task_history.lock().unwrap().extend(snapshot.task_history);
        self.subtask_history
            .lock()
            .unwrap()
            .extend(snapshot.subtask_history);
        self.attendance.lock().unwrap().extend(snapshot.attendance);
        self.daily_updates
            .lock()
            .unwrap()
            .extend(snapshot.daily_updates);
        *self.checklist.lock().unwrap() = snapshot.checklist;
        let mut projects = self.projects.lock().unwrap();
        for project in snapshot.projects {
            projects.insert(project.id.clone(), project);
        }
        drop(projects);
        let mut employees = self.employees.lock().unwrap();
        for employee in snapshot.employees {
            employees.insert(employee.id.clone(), employee);
        }
        drop(employees);
        self.hackathon_awards
            .lock()
            .unwrap()
            .extend(snapshot.hackathon_awards);
        self.bonus_fine_records
            .lock()
            .unwrap()
            .extend(snapshot.bonus_fine_records);
        self.daily_task_fines
            .lock()
            .unwrap()
            .extend(snapshot.daily_task_fines);
        self.custom_fines.lock().unwrap().extend(snapshot.custom_fines);
        self.custom_bonuses
            .lock()
            .unwrap()
            .extend(snapshot.custom_bonuses);
    }

    // --- Tasks and subtasks ---

    pub fn insert_task(&self, task: Task) {
        self.tasks.lock().unwrap().insert(task.id.clone(), task);
    }

    pub fn insert_subtask(&self, subtask: Subtask) {
        self.subtasks
            .lock()
            .unwrap()
            .insert(subtask.id.clone(), subtask);
    }

    pub fn task(&self, id: &EntityId) -> Option<Task> {
        self.tasks.lock().unwrap().get(id).cloned()
    }

    pub fn subtask(&self, id: &EntityId) -> Option<Subtask> {
        self.subtasks.lock().unwrap().get(id).cloned()
    }

    pub fn all_tasks(&self) -> Vec<Task> {
        self.tasks.lock().unwrap().values().cloned().collect()
    }

    /// Completed recurring tasks for one project.
    pub fn completed_recurring_tasks_for_project(&self, project_id: &EntityId) -> Vec<Task> {
        self.tasks
            .lock()
            .unwrap()
            .values()
            .filter(|t| {
                t.project_id == *project_id && t.is_completed() && t.kind.is_recurring()
            })
            .cloned()
            .collect()
    }

    /// Completed recurring tasks assigned to one user.
    pub fn completed_recurring_tasks_assigned_to(&self, user_id: &EntityId) -> Vec<Task> {
        self.tasks
            .lock()
            .unwrap()
            .values()
            .filter(|t| {
                t.assignees.contains(user_id) && t.is_completed() && t.kind.is_recurring()
            })
            .cloned()
            .collect()
    }

    /// All completed recurring tasks, system-wide.
    pub fn completed_recurring_tasks(&self) -> Vec<Task> {
        self.tasks
            .lock()
            .unwrap()
            .values()
            .filter(|t| t.is_completed() && t.kind.is_recurring())
            .cloned()
            .collect()
    }

    pub fn subtasks_of(&self, parent_task_id: &EntityId) -> Vec<Subtask> {
        self.subtasks
            .lock()
            .unwrap()
            .values()
            .filter(|s| s.parent_task_id == *parent_task_id)
            .cloned()
            .collect()
    }

    pub fn tasks_for_project(&self, project_id: &EntityId) -> Vec<Task> {
        self.tasks
            .lock()
            .unwrap()
            .values()
            .filter(|t| t.project_id == *project_id)
            .cloned()
            .collect()
    }

    /// Clears a task's completion and approval fields and sets it pending.
    /// Returns the number of fields-bearing records touched (0 when the task
    /// is gone or already pending).
    pub fn clear_task_completion(&self, task_id: &EntityId) -> usize {
        let mut tasks = self.tasks.lock().unwrap();
        match tasks.get_mut(task_id) {
            Some(task) if task.status != TaskStatus::Pending || task.completed_at.is_some() => {
                task.status = TaskStatus::Pending;
                task.approval = crate::model::ApprovalStatus::Pending;
                task.completed_at = None;
                task.completed_by = None;
                task.approved_by = None;
                1
            }
            _ => 0,
        }
    }

    pub fn clear_subtask_completion(&self, subtask_id: &EntityId) -> usize {
        let mut subtasks = self.subtasks.lock().unwrap();
        match subtasks.get_mut(subtask_id) {
            Some(subtask)
                if subtask.status != TaskStatus::Pending || subtask.completed_at.is_some() =>
            {
                subtask.status = TaskStatus::Pending;
                subtask.approval = crate::model::ApprovalStatus::Pending;
                subtask.completed_at = None;
                subtask.approved_by = None;
                1
            }
            _ => 0,
        }
    }

    // --- Completion history (append-only) ---

    pub fn insert_task_history(&self, row: TaskCompletionHistory) {
        self.task_history.lock().unwrap().push(row);
    }

    pub fn insert_subtask_history(&self, row: SubtaskCompletionHistory) {
        self.subtask_history.lock().unwrap().push(row);
    }

    pub fn task_history_rows(&self) -> Vec<TaskCompletionHistory> {
        self.task_history.lock().unwrap().clone()
    }

    pub fn subtask_history_rows(&self) -> Vec<SubtaskCompletionHistory> {
        self.subtask_history.lock().unwrap().clone()
    }

    // --- Attendance / daily updates ---

    pub fn attendance_for(
        &self,
        employee_id: &EntityId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Vec<AttendanceRecord> {
        self.attendance
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.employee_id == *employee_id && r.date >= from && r.date <= to)
            .cloned()
            .collect()
    }

    pub fn approved_updates_for(
        &self,
        employee_id: &EntityId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Vec<DailyUpdate> {
        self.daily_updates
            .lock()
            .unwrap()
            .iter()
            .filter(|u| {
                u.employee_id == *employee_id && u.approved && u.date >= from && u.date <= to
            })
            .cloned()
            .collect()
    }

    pub fn checklist_settings(&self) -> ChecklistSettings {
        self.checklist.lock().unwrap().clone()
    }

    // --- Projects / employees ---

    pub fn all_projects(&self) -> Vec<Project> {
        self.projects.lock().unwrap().values().cloned().collect()
    }

    pub fn active_projects(&self) -> Vec<Project> {
        self.projects
            .lock()
            .unwrap()
            .values()
            .filter(|p| p.status == ProjectStatus::Active)
            .cloned()
            .collect()
    }

    pub fn projects_involving(&self, employee_id: &EntityId) -> Vec<Project> {
        self.projects
            .lock()
            .unwrap()
            .values()
            .filter(|p| p.involves(employee_id))
            .cloned()
            .collect()
    }

    pub fn projects_led_by(&self, employee_id: &EntityId) -> Vec<Project> {
        self.projects
            .lock()
            .unwrap()
            .values()
            .filter(|p| p.lead_assignee.as_ref() == Some(employee_id))
            .cloned()
            .collect()
    }

    pub fn employee(&self, id: &EntityId) -> Result<Employee> {
        self.employees
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| anyhow!("employee not found: {}", id))
    }

    pub fn approved_employees(&self) -> Vec<Employee> {
        let mut employees: Vec<Employee> = self
            .employees
            .lock()
            .unwrap()
            .values()
            .filter(|e| e.approved)
            .cloned()
            .collect();
        employees.sort_by(|a, b| a.id.cmp(&b.id));
        employees
    }

    // --- Awards, fines, overrides ---

    pub fn winning_awards_in(&self, from: NaiveDate, to: NaiveDate) -> Vec<HackathonAward> {
        self.hackathon_awards
            .lock()
            .unwrap()
            .iter()
            .filter(|a| a.winner && a.result_date >= from && a.result_date <= to)
            .cloned()
            .collect()
    }

    pub fn bonus_fine_record(
        &self,
        employee_id: &EntityId,
        period_start: NaiveDate,
    ) -> Option<BonusFineRecord> {
        self.bonus_fine_records
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.employee_id == *employee_id && r.period_start == period_start)
            .cloned()
    }

    /// Increments (never overwrites) the accumulated fine on the period
    /// aggregate, creating the record on first use.
    pub fn accumulate_period_fine(
        &self,
        employee_id: &EntityId,
        period_start: NaiveDate,
        amount: Decimal,
    ) {
        let mut records = self.bonus_fine_records.lock().unwrap();
        if let Some(record) = records
            .iter_mut()
            .find(|r| r.employee_id == *employee_id && r.period_start == period_start)
        {
            record.accumulated_fine += amount;
        } else {
            records.push(BonusFineRecord {
                employee_id: employee_id.clone(),
                period_start,
                accumulated_fine: amount,
                manual_bonus: None,
                manual_fine: None,
                admin_notes: None,
                approved_by_core_team: false,
            });
        }
    }

    pub fn has_daily_task_fine(
        &self,
        employee_id: &EntityId,
        project_id: &EntityId,
        date: NaiveDate,
    ) -> bool {
        self.daily_task_fines
            .lock()
            .unwrap()
            .iter()
            .any(|f| f.employee_id == *employee_id && f.project_id == *project_id && f.date == date)
    }

    pub fn insert_daily_task_fine(&self, fine: DailyTaskFine) {
        self.daily_task_fines.lock().unwrap().push(fine);
    }

    pub fn daily_task_fines_for(
        &self,
        employee_id: &EntityId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Vec<DailyTaskFine> {
        self.daily_task_fines
            .lock()
            .unwrap()
            .iter()
            .filter(|f| f.employee_id == *employee_id && f.date >= from && f.date <= to)
            .cloned()
            .collect()
    }

    pub fn custom_fines_for(
        &self,
        employee_id: &EntityId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Vec<CustomFine> {
        self.custom_fines
            .lock()
            .unwrap()
            .iter()
            .filter(|f| f.employee_id == *employee_id && f.date >= from && f.date <= to)
            .cloned()
            .collect()
    }

    pub fn custom_bonuses_for(
        &self,
        employee_id: &EntityId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Vec<CustomBonus> {
        self.custom_bonuses
            .lock()
            .unwrap()
            .iter()
            .filter(|b| b.employee_id == *employee_id && b.date >= from && b.date <= to)
            .cloned()
            .collect()
    }

    /// Collection sizes for the status endpoint.
    pub fn counts(&self) -> HashMap<&'static str, usize> {
        let mut counts = HashMap::new();
        counts.insert("tasks", self.tasks.lock().unwrap().len());
        counts.insert("subtasks", self.subtasks.lock().unwrap().len());
        counts.insert("task_history", self.task_history.lock().unwrap().len());
        counts.insert(
            "subtask_history",
            self.subtask_history.lock().unwrap().len(),
        );
        counts.insert("employees", self.employees.lock().unwrap().len());
        counts.insert("projects", self.projects.lock().unwrap().len());
        counts.insert("attendance", self.attendance.lock().unwrap().len());
        counts.insert(
            "daily_task_fines",
            self.daily_task_fines.lock().unwrap().len(),
        );
        counts
    }
}

// --- History write boundary ---

/// Insert-only sink for completion history. The archiver refuses to mutate
/// live records when a write through this boundary fails.
#[async_trait]
pub trait HistoryWriter: Send + Sync {
    async fn write_task_history(&self, row: TaskCompletionHistory) -> Result<()>;
    async fn write_subtask_history(&self, row: SubtaskCompletionHistory) -> Result<()>;
}

#[async_trait]
impl HistoryWriter for DataStore {
    async fn write_task_history(&self, row: TaskCompletionHistory) -> Result<()> {
        self.insert_task_history(row);
        Ok(())
    }

    async fn write_subtask_history(&self, row: SubtaskCompletionHistory) -> Result<()> {
        self.insert_subtask_history(row);
        Ok(())
    }
}

// --- Identity lookup collaborator ---

/// External read-only identity service mapping ids to display names.
#[async_trait]
pub trait NameResolver: Send + Sync {
    async fn display_name(&self, id: &EntityId) -> Result<String>;
}

/// Resolves against the employee collection of the local store.
pub struct DirectoryResolver {
    store: DataStore,
}

impl DirectoryResolver {
    pub fn new(store: DataStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl NameResolver for DirectoryResolver {
    async fn display_name(&self, id: &EntityId) -> Result<String> {
        self.store.employee(id).map(|e| e.name)
    }
}

/// Name lookup that degrades to a placeholder instead of failing the
/// caller; archive and report paths must never abort on a lookup miss.
pub async fn resolve_or_unknown(resolver: &dyn NameResolver, id: Option<&EntityId>) -> String {
    let Some(id) = id else {
        return "Unknown".to_string();
    };
    match resolver.display_name(id).await {
        Ok(name) => name,
        Err(e) => {
            warn!(id = %id, error = %e, "name resolution failed, recording placeholder");
            "Unknown".to_string()
        }
    }
}
