// src/archive.rs
//
// History archiver: snapshots a completed task or subtask into an immutable
// completion-history row before the live record is mutated. Rows are only
// ever inserted; nothing in this module updates or deletes history.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::info;

use crate::model::{Subtask, SubtaskCompletionHistory, Task, TaskCompletionHistory};
use crate::store::{resolve_or_unknown, HistoryWriter, NameResolver};

#[derive(Clone)]
pub struct Archiver {
    history: Arc<dyn HistoryWriter>,
    resolver: Arc<dyn NameResolver>,
}

impl Archiver {
    pub fn new(history: Arc<dyn HistoryWriter>, resolver: Arc<dyn NameResolver>) -> Self {
        Self { history, resolver }
    }

    /// Snapshots a task into the task history collection.
    ///
    /// Display names are denormalized at archive time because the live user
    /// record may later change or disappear; a failed lookup records
    /// "Unknown" rather than blocking the archive. A failed history write,
    /// by contrast, is an error the caller must treat as fatal for this
    /// task's reset.
    pub async fn archive_task(&self, task: &Task, now: DateTime<Utc>) -> Result<TaskCompletionHistory> {
        let mut assignee_names = Vec::with_capacity(task.assignees.len());
        for assignee in &task.assignees {
            assignee_names.push(resolve_or_unknown(self.resolver.as_ref(), Some(assignee)).await);
        }
        let completed_by_name =
            resolve_or_unknown(self.resolver.as_ref(), task.completed_by.as_ref()).await;
        let approved_by_name =
            resolve_or_unknown(self.resolver.as_ref(), task.approved_by.as_ref()).await;

        let row = TaskCompletionHistory {
            task_id: task.id.clone(),
            project_id: task.project_id.clone(),
            title: task.title.clone(),
            kind: task.kind,
            status: task.status,
            approval: task.approval,
            assignee_names,
            assignee_ids: task.assignees.clone(),
            completed_by_name,
            approved_by_name,
            due_date: task.due_date,
            deadline_time: task.deadline_time.clone(),
            bonus_points: task.bonus_points,
            bonus_amount: task.bonus_amount,
            penalty_points: task.penalty_points,
            penalty_amount: task.penalty_amount,
            not_applicable: task.not_applicable,
            completed_at: task.completed_at,
            archived_at: now,
        };
        self.history
            .write_task_history(row.clone())
            .await
            .with_context(|| format!("archiving task {}", task.id))?;
        info!(task = %task.id, "archived task completion");
        Ok(row)
    }

    /// Snapshots a subtask, inheriting deadline fields from its parent where
    /// its own are unset.
    pub async fn archive_subtask(
        &self,
        subtask: &Subtask,
        parent: &Task,
        now: DateTime<Utc>,
    ) -> Result<SubtaskCompletionHistory> {
        let assignee_name =
            resolve_or_unknown(self.resolver.as_ref(), Some(&subtask.assignee)).await;
        let approved_by_name =
            resolve_or_unknown(self.resolver.as_ref(), subtask.approved_by.as_ref()).await;

        let row = SubtaskCompletionHistory {
            subtask_id: subtask.id.clone(),
            parent_task_id: subtask.parent_task_id.clone(),
            project_id: parent.project_id.clone(),
            title: subtask.title.clone(),
            status: subtask.status,
            approval: subtask.approval,
            assignee_id: subtask.assignee.clone(),
            assignee_name,
            approved_by_name,
            due_date: subtask.effective_due_date(parent),
            deadline_time: subtask
                .effective_deadline_time(parent)
                .map(|t| t.to_string()),
            bonus_points: subtask.bonus_points,
            bonus_amount: subtask.bonus_amount,
            penalty_points: subtask.penalty_points,
            penalty_amount: subtask.penalty_amount,
            not_applicable: subtask.not_applicable,
            completed_at: subtask.completed_at,
            archived_at: now,
        };
        self.history
            .write_subtask_history(row.clone())
            .await
            .with_context(|| format!("archiving subtask {}", subtask.id))?;
        info!(subtask = %subtask.id, parent = %parent.id, "archived subtask completion");
        Ok(row)
    }
}
