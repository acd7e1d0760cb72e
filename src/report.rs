// src/report.rs
//
// Aggregation reporter: one row per approved employee per day in the
// requested range, folding in every bonus- or fine-bearing fact. Days with
// no activity still get a zeroed row so downstream consumers can render a
// dense grid without joining against a calendar.

use std::collections::HashMap;

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, warn};

use crate::incentive::collect_task_events;
use crate::model::{Employee, EntityId};
use crate::period::{business_date, days_in_range};
use crate::store::DataStore;

#[derive(Debug, Clone, Serialize)]
pub struct ReportRow {
    pub employee_id: EntityId,
    pub employee_name: String,
    pub date: NaiveDate,
    pub bonus_points: i64,
    pub bonus_amount: Decimal,
    pub fine_points: i64,
    pub fine_amount: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmployeeTotal {
    pub employee_id: EntityId,
    pub employee_name: String,
    pub bonus_points: i64,
    pub bonus_amount: Decimal,
    pub fine_points: i64,
    pub fine_amount: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct AggregationReport {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub rows: Vec<ReportRow>,
    pub totals: Vec<EmployeeTotal>,
}

struct Accumulator {
    rows: HashMap<(EntityId, NaiveDate), ReportRow>,
    from: NaiveDate,
    to: NaiveDate,
}

impl Accumulator {
    fn new(employees: &[Employee], from: NaiveDate, to: NaiveDate) -> Self {
        let mut rows = HashMap::new();
        for employee in employees {
            for date in days_in_range(from, to) {
                rows.insert(
                    (employee.id.clone(), date),
                    ReportRow {
                        employee_id: employee.id.clone(),
                        employee_name: employee.name.clone(),
                        date,
                        bonus_points: 0,
                        bonus_amount: Decimal::ZERO,
                        fine_points: 0,
                        fine_amount: Decimal::ZERO,
                    },
                );
            }
        }
        Self { rows, from, to }
    }

    fn add_bonus(&mut self, employee: &EntityId, date: NaiveDate, points: i64, amount: Decimal) {
        if let Some(row) = self.row_mut(employee, date) {
            row.bonus_points += points;
            row.bonus_amount += amount;
        }
    }

    fn add_fine(&mut self, employee: &EntityId, date: NaiveDate, points: i64, amount: Decimal) {
        if let Some(row) = self.row_mut(employee, date) {
            row.fine_points += points;
            row.fine_amount += amount;
        }
    }

    /// `None` when the date falls outside the range or the employee is not
    /// in the approved set; such facts simply do not appear in the report.
    fn row_mut(&mut self, employee: &EntityId, date: NaiveDate) -> Option<&mut ReportRow> {
        if date < self.from || date > self.to {
            return None;
        }
        self.rows.get_mut(&(employee.clone(), date))
    }
}

/// Builds the full range report from everything the store knows.
pub fn build_report(
    store: &DataStore,
    from: NaiveDate,
    to: NaiveDate,
    now: DateTime<Utc>,
    tz: FixedOffset,
) -> AggregationReport {
    let employees = store.approved_employees();
    let mut acc = Accumulator::new(&employees, from, to);

    fold_checklist(store, &employees, &mut acc);
    fold_task_events(store, &mut acc, now, tz);
    fold_project_leads(store, &mut acc, now, tz);
    fold_hackathon_awards(store, &mut acc);
    fold_custom_entries(store, &employees, &mut acc);

    let mut rows: Vec<ReportRow> = acc.rows.into_values().collect();
    rows.sort_by(|a, b| (&a.employee_id, a.date).cmp(&(&b.employee_id, b.date)));

    let mut totals: Vec<EmployeeTotal> = employees
        .iter()
        .map(|e| EmployeeTotal {
            employee_id: e.id.clone(),
            employee_name: e.name.clone(),
            bonus_points: 0,
            bonus_amount: Decimal::ZERO,
            fine_points: 0,
            fine_amount: Decimal::ZERO,
        })
        .collect();
    for row in &rows {
        if let Some(total) = totals.iter_mut().find(|t| t.employee_id == row.employee_id) {
            total.bonus_points += row.bonus_points;
            total.bonus_amount += row.bonus_amount;
            total.fine_points += row.fine_points;
            total.fine_amount += row.fine_amount;
        }
    }

    info!(
        %from,
        %to,
        employees = employees.len(),
        rows = rows.len(),
        "aggregation report built"
    );
    AggregationReport { from, to, rows, totals }
}

/// Checklist items on an approved update earn their bonus rate; configured
/// items missing from that day's update charge their fine rate. Rates are
/// resolved per employee, so custom and per-skill overrides apply here.
fn fold_checklist(store: &DataStore, employees: &[Employee], acc: &mut Accumulator) {
    let settings = store.checklist_settings();
    for employee in employees {
        let rates = settings.resolve_for(employee);
        if rates.is_empty() {
            continue;
        }
        for update in store.approved_updates_for(&employee.id, acc.from, acc.to) {
            for (label, rate) in &rates {
                if update.checklist_items.iter().any(|i| i == label) {
                    acc.add_bonus(&employee.id, update.date, rate.bonus_points, rate.bonus_amount);
                } else {
                    acc.add_fine(&employee.id, update.date, rate.fine_points, rate.fine_amount);
                }
            }
        }
    }
}

fn fold_task_events(store: &DataStore, acc: &mut Accumulator, now: DateTime<Utc>, tz: FixedOffset) {
    for event in collect_task_events(store, now, tz) {
        for assignee in &event.assignees {
            if event.class.is_bonus() {
                acc.add_bonus(assignee, event.date, event.bonus_points, event.bonus_amount);
            } else {
                acc.add_fine(assignee, event.date, event.penalty_points, event.penalty_amount);
            }
        }
    }
}

/// Leads earn the project bonus on the completion date and pay the project
/// fine dated at the deadline once it has passed with the project unfinished.
fn fold_project_leads(store: &DataStore, acc: &mut Accumulator, now: DateTime<Utc>, tz: FixedOffset) {
    let today = business_date(now, tz);
    for project in store.all_projects() {
        let Some(lead) = &project.lead_assignee else {
            continue;
        };
        match (project.status, project.completed_at, project.deadline) {
            (crate::model::ProjectStatus::Completed, Some(completed_at), _) => {
                if !project.lead_bonus_amount.is_zero() {
                    acc.add_bonus(lead, business_date(completed_at, tz), 0, project.lead_bonus_amount);
                }
            }
            (crate::model::ProjectStatus::Completed, None, _) => {
                warn!(project = %project.id, "completed project without a completion instant");
            }
            (_, _, Some(deadline)) if deadline < today => {
                if !project.lead_fine_amount.is_zero() {
                    acc.add_fine(lead, deadline, 0, project.lead_fine_amount);
                }
            }
            _ => {}
        }
    }
}

fn fold_hackathon_awards(store: &DataStore, acc: &mut Accumulator) {
    for award in store.winning_awards_in(acc.from, acc.to) {
        acc.add_bonus(
            &award.participant_id,
            award.result_date,
            award.prize_points,
            award.prize_amount,
        );
    }
}

fn fold_custom_entries(store: &DataStore, employees: &[Employee], acc: &mut Accumulator) {
    for employee in employees {
        for bonus in store.custom_bonuses_for(&employee.id, acc.from, acc.to) {
            acc.add_bonus(&employee.id, bonus.date, bonus.points, bonus.amount);
        }
        for fine in store.custom_fines_for(&employee.id, acc.from, acc.to) {
            acc.add_fine(&employee.id, fine.date, fine.points, fine.amount);
        }
    }
}
