// src/reset.rs
//
// Reset executor: drives the completed -> archived -> pending cycle for
// recurring tasks. Per task the sequence is strictly ordered: archive the
// task, archive its completed subtasks, then clear the live records. An
// archive failure aborts only that task's reset; the batch carries on and
// reports per-task outcomes in its summary.

use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, FixedOffset, Utc};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::archive::Archiver;
use crate::model::{EntityId, Task};
use crate::recurrence::{evaluate, ResetReason};
use crate::store::{DataStore, HistoryWriter, NameResolver};

/// Outcome counts for one batch invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub applied: usize,
    pub skipped: usize,
    pub errored: usize,
}

#[derive(Debug)]
enum TaskOutcome {
    Applied,
    Skipped(ResetReason),
}

#[derive(Clone)]
pub struct ResetExecutor {
    store: DataStore,
    archiver: Archiver,
    tz: FixedOffset,
}

impl ResetExecutor {
    pub fn new(
        store: DataStore,
        history: Arc<dyn HistoryWriter>,
        resolver: Arc<dyn NameResolver>,
        tz: FixedOffset,
    ) -> Self {
        Self {
            archiver: Archiver::new(history, resolver),
            store,
            tz,
        }
    }

    /// Resets due tasks belonging to one project.
    pub async fn reset_for_project(
        &self,
        project_id: &EntityId,
        now: DateTime<Utc>,
    ) -> BatchSummary {
        let tasks = self.store.completed_recurring_tasks_for_project(project_id);
        info!(project = %project_id, candidates = tasks.len(), "project reset sweep");
        self.run_batch(tasks, now).await
    }

    /// Resets due tasks assigned to one user.
    pub async fn reset_for_user(&self, user_id: &EntityId, now: DateTime<Utc>) -> BatchSummary {
        let tasks = self.store.completed_recurring_tasks_assigned_to(user_id);
        info!(user = %user_id, candidates = tasks.len(), "user reset sweep");
        self.run_batch(tasks, now).await
    }

    /// Resets every due completed recurring task, system-wide.
    pub async fn reset_all(&self, now: DateTime<Utc>) -> BatchSummary {
        let tasks = self.store.completed_recurring_tasks();
        info!(candidates = tasks.len(), "system-wide reset sweep");
        self.run_batch(tasks, now).await
    }

    async fn run_batch(&self, tasks: Vec<Task>, now: DateTime<Utc>) -> BatchSummary {
        let mut summary = BatchSummary::default();
        for task in tasks {
            match self.reset_task(&task, now).await {
                Ok(TaskOutcome::Applied) => summary.applied += 1,
                Ok(TaskOutcome::Skipped(reason)) => {
                    summary.skipped += 1;
                    info!(task = %task.id, %reason, "reset skipped");
                }
                Err(e) => {
                    summary.errored += 1;
                    error!(task = %task.id, error = ?e, "reset failed; task left untouched");
                }
            }
        }
        info!(
            applied = summary.applied,
            skipped = summary.skipped,
            errored = summary.errored,
            "reset sweep finished"
        );
        summary
    }

    /// The per-task saga. Ordering is the correctness property here: no
    /// live field is cleared until every history row for this task has been
    /// written.
    async fn reset_task(&self, task: &Task, now: DateTime<Utc>) -> Result<TaskOutcome> {
        let decision = evaluate(
            task.kind,
            task.completed_at,
            task.recurrence.as_ref(),
            now,
            self.tz,
        );
        if !decision.should_reset {
            return Ok(TaskOutcome::Skipped(decision.reason));
        }

        self.archiver.archive_task(task, now).await?;

        let subtasks = self.store.subtasks_of(&task.id);
        for subtask in &subtasks {
            if subtask.is_completed() {
                self.archiver.archive_subtask(subtask, task, now).await?;
            }
        }

        if self.store.clear_task_completion(&task.id) == 0 {
            // Task disappeared or was reset concurrently after selection;
            // history is already written, which is safe (append-only).
            warn!(task = %task.id, "task no longer resettable after archive");
        }
        // Subtasks reset in lockstep with the parent, regardless of their
        // own recurrence state. The parent drives the cycle.
        for subtask in &subtasks {
            self.store.clear_subtask_completion(&subtask.id);
        }

        info!(task = %task.id, subtasks = subtasks.len(), reason = %decision.reason, "task reset to pending");
        Ok(TaskOutcome::Applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        ApprovalStatus, Employee, EntityId, Subtask, SubtaskCompletionHistory, TaskCompletionHistory,
        TaskKind, TaskStatus,
    };
    use crate::store::DirectoryResolver;
    use anyhow::{anyhow, bail};
    use async_trait::async_trait;
    use chrono::{NaiveDate, TimeZone};
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn tz() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    fn completed_daily_task(id: &str, completed: DateTime<Utc>) -> Task {
        Task {
            id: EntityId::from(id),
            project_id: EntityId::from("p1"),
            title: format!("daily {}", id),
            kind: TaskKind::Daily,
            status: TaskStatus::Completed,
            approval: ApprovalStatus::Approved,
            assignees: vec![EntityId::from("e1")],
            due_date: None,
            deadline_time: None,
            bonus_points: 0,
            bonus_amount: dec!(0),
            penalty_points: 0,
            penalty_amount: dec!(0),
            recurrence: None,
            completed_at: Some(completed),
            completed_by: Some(EntityId::from("e1")),
            approved_by: None,
            not_applicable: false,
            created_at: completed,
            created_by: None,
        }
    }

    fn completed_subtask(id: &str, parent: &str, completed: DateTime<Utc>) -> Subtask {
        Subtask {
            id: EntityId::from(id),
            parent_task_id: EntityId::from(parent),
            title: format!("sub {}", id),
            status: TaskStatus::Completed,
            approval: ApprovalStatus::Approved,
            assignee: EntityId::from("e1"),
            due_date: None,
            deadline_time: None,
            bonus_points: 0,
            bonus_amount: dec!(0),
            penalty_points: 0,
            penalty_amount: dec!(0),
            completed_at: Some(completed),
            approved_by: None,
            not_applicable: false,
            created_at: completed,
        }
    }

    fn seeded_store() -> DataStore {
        let store = DataStore::new();
        store.employees.lock().unwrap().insert(
            EntityId::from("e1"),
            Employee {
                id: EntityId::from("e1"),
                name: "Asha".into(),
                joined_on: NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
                approved: true,
                skill: None,
                core_team: false,
            },
        );
        store
    }

    fn executor(store: &DataStore) -> ResetExecutor {
        ResetExecutor::new(
            store.clone(),
            Arc::new(store.clone()),
            Arc::new(DirectoryResolver::new(store.clone())),
            tz(),
        )
    }

    #[tokio::test]
    async fn due_task_is_archived_then_cleared_with_subtasks_in_lockstep() {
        let store = seeded_store();
        let completed = Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap();
        store.insert_task(completed_daily_task("t1", completed));
        store.insert_subtask(completed_subtask("s1", "t1", completed));
        // An in-progress subtask is not archived, but still resets.
        let mut open = completed_subtask("s2", "t1", completed);
        open.status = TaskStatus::InProgress;
        open.completed_at = None;
        store.insert_subtask(open);

        let now = Utc.with_ymd_and_hms(2024, 6, 2, 1, 0, 0).unwrap();
        let summary = executor(&store).reset_all(now).await;
        assert_eq!(
            summary,
            BatchSummary {
                applied: 1,
                skipped: 0,
                errored: 0
            }
        );

        assert_eq!(store.task_history_rows().len(), 1);
        assert_eq!(store.subtask_history_rows().len(), 1, "only the completed subtask");

        let task = store.task(&EntityId::from("t1")).unwrap();
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.approval, ApprovalStatus::Pending);
        assert!(task.completed_at.is_none());
        assert!(task.completed_by.is_none());

        for id in ["s1", "s2"] {
            let subtask = store.subtask(&EntityId::from(id)).unwrap();
            assert_eq!(subtask.status, TaskStatus::Pending, "subtask {}", id);
            assert!(subtask.completed_at.is_none());
        }
    }

    #[tokio::test]
    async fn rerunning_the_sweep_is_a_no_op() {
        let store = seeded_store();
        let completed = Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap();
        store.insert_task(completed_daily_task("t1", completed));

        let now = Utc.with_ymd_and_hms(2024, 6, 2, 1, 0, 0).unwrap();
        let exec = executor(&store);
        let first = exec.reset_all(now).await;
        assert_eq!(first.applied, 1);

        let second = exec.reset_all(now).await;
        assert_eq!(second.applied, 0);
        assert_eq!(second.errored, 0);
        // No extra history rows and no field churn on the second pass.
        assert_eq!(store.task_history_rows().len(), 1);
        let task = store.task(&EntityId::from("t1")).unwrap();
        assert_eq!(task.status, TaskStatus::Pending);
    }

    #[tokio::test]
    async fn same_day_completion_is_skipped() {
        let store = seeded_store();
        let completed = Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap();
        store.insert_task(completed_daily_task("t1", completed));

        let same_day = Utc.with_ymd_and_hms(2024, 6, 1, 23, 0, 0).unwrap();
        let summary = executor(&store).reset_all(same_day).await;
        assert_eq!(summary.skipped, 1);
        assert!(store.task_history_rows().is_empty());
        let task = store.task(&EntityId::from("t1")).unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
    }

    /// History sink that fails for one task id; used to prove per-task
    /// failure isolation.
    struct FlakyHistory {
        inner: DataStore,
        poison_task: EntityId,
        failures: AtomicUsize,
    }

    #[async_trait]
    impl HistoryWriter for FlakyHistory {
        async fn write_task_history(&self, row: TaskCompletionHistory) -> Result<()> {
            if row.task_id == self.poison_task {
                self.failures.fetch_add(1, Ordering::SeqCst);
                bail!("history store rejected the write");
            }
            self.inner.insert_task_history(row);
            Ok(())
        }

        async fn write_subtask_history(&self, row: SubtaskCompletionHistory) -> Result<()> {
            if row.parent_task_id == self.poison_task {
                self.failures.fetch_add(1, Ordering::SeqCst);
                return Err(anyhow!("history store rejected the write"));
            }
            self.inner.insert_subtask_history(row);
            Ok(())
        }
    }

    #[tokio::test]
    async fn archive_failure_aborts_only_that_task_and_batch_continues() {
        let store = seeded_store();
        let completed = Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap();
        store.insert_task(completed_daily_task("bad", completed));
        store.insert_task(completed_daily_task("good", completed));

        let history = Arc::new(FlakyHistory {
            inner: store.clone(),
            poison_task: EntityId::from("bad"),
            failures: AtomicUsize::new(0),
        });
        let exec = ResetExecutor::new(
            store.clone(),
            history.clone(),
            Arc::new(DirectoryResolver::new(store.clone())),
            tz(),
        );

        let now = Utc.with_ymd_and_hms(2024, 6, 2, 1, 0, 0).unwrap();
        let summary = exec.reset_all(now).await;
        assert_eq!(summary.applied, 1);
        assert_eq!(summary.errored, 1);
        assert!(history.failures.load(Ordering::SeqCst) >= 1);

        // The failed task keeps its completion state: no silent history loss.
        let bad = store.task(&EntityId::from("bad")).unwrap();
        assert_eq!(bad.status, TaskStatus::Completed);
        assert!(bad.completed_at.is_some());

        let good = store.task(&EntityId::from("good")).unwrap();
        assert_eq!(good.status, TaskStatus::Pending);
    }
}
