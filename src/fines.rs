// src/fines.rs
//
// Daily-task fine sweep: every active project with a lead is expected to
// have at least one task created each business day before the configured
// deadline. Projects that miss it cost their lead a fixed fine, charged at
// most once per (lead, project, day).

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::incentive::rates;
use crate::model::{DailyTaskFine, EntityId, Project, Task};
use crate::period::{business_date, deadline_instant, month_start, parse_deadline_time};
use crate::store::DataStore;

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct FineSweepSummary {
    pub charged: usize,
    pub skipped: usize,
    pub errored: usize,
}

/// Runs the sweep for one business date. Rerunning for the same date is a
/// no-op for projects already charged, so the sweep can be retried safely.
pub fn charge_missing_daily_task_fines(
    store: &DataStore,
    date: NaiveDate,
    deadline: &str,
    now: DateTime<Utc>,
    tz: FixedOffset,
) -> FineSweepSummary {
    let Some(deadline_time) = parse_deadline_time(deadline) else {
        warn!(deadline, "unparseable daily-task deadline, sweep aborted");
        return FineSweepSummary {
            errored: 1,
            ..Default::default()
        };
    };
    let cutoff = deadline_instant(date, deadline_time, tz);
    if cutoff > now {
        info!(%date, deadline, "daily-task deadline not reached yet, nothing to charge");
        return FineSweepSummary::default();
    }

    let mut summary = FineSweepSummary::default();
    for project in store.active_projects() {
        let Some(lead) = project.lead_assignee.clone() else {
            debug!(project = %project.id, "no lead assigned, skipping");
            summary.skipped += 1;
            continue;
        };
        if project_satisfied_on(store, &project, date, cutoff, tz) {
            summary.skipped += 1;
            continue;
        }
        if store.has_daily_task_fine(&lead, &project.id, date) {
            debug!(project = %project.id, employee = %lead, %date, "fine already charged");
            summary.skipped += 1;
            continue;
        }

        store.insert_daily_task_fine(DailyTaskFine {
            employee_id: lead.clone(),
            project_id: project.id.clone(),
            date,
            amount: rates::DAILY_TASK_FINE,
        });
        store.accumulate_period_fine(&lead, month_start(date), rates::DAILY_TASK_FINE);
        info!(
            project = %project.id,
            employee = %lead,
            %date,
            amount = %rates::DAILY_TASK_FINE,
            "daily-task fine charged"
        );
        summary.charged += 1;
    }

    info!(
        %date,
        charged = summary.charged,
        skipped = summary.skipped,
        "daily-task fine sweep finished"
    );
    summary
}

/// A project is satisfied for the day when some task was created that
/// business day at or before the cutoff, or when a task due that day is
/// explicitly marked not applicable.
fn project_satisfied_on(
    store: &DataStore,
    project: &Project,
    date: NaiveDate,
    cutoff: DateTime<Utc>,
    tz: FixedOffset,
) -> bool {
    let tasks = store.tasks_for_project(&project.id);
    tasks
        .iter()
        .any(|t| created_in_time(t, date, cutoff, tz) || excused_for(t, date))
}

fn created_in_time(task: &Task, date: NaiveDate, cutoff: DateTime<Utc>, tz: FixedOffset) -> bool {
    business_date(task.created_at, tz) == date && task.created_at <= cutoff
}

fn excused_for(task: &Task, date: NaiveDate) -> bool {
    task.not_applicable && task.due_date == Some(date)
}
