// src/recurrence.rs
//
// Pure recurrence evaluation: given a task's kind, its last completion and
// its recurrence configuration, decide whether it is due for a reset at the
// injected instant. No I/O, no global clock. An ambiguous or malformed
// configuration always evaluates to "no reset" — a bad config must never be
// able to wipe completion state.

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, Utc};
use thiserror::Error;
use tracing::debug;

use crate::model::{Frequency, RecurrenceConfig, TaskKind};
use crate::period::{
    business_date, days_between, month_index, month_start, week_index, week_start,
    whole_months_between, whole_weeks_between,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResetDecision {
    pub should_reset: bool,
    pub reason: ResetReason,
}

impl ResetDecision {
    fn due(reason: ResetReason) -> Self {
        Self {
            should_reset: true,
            reason,
        }
    }

    fn not_due(reason: ResetReason) -> Self {
        Self {
            should_reset: false,
            reason,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResetReason {
    #[error("one-time tasks never reset")]
    NotRecurring,
    #[error("task has no completion on record")]
    NeverCompleted,
    #[error("already completed today ({0})")]
    CompletedToday(NaiveDate),
    #[error("calendar day rolled over ({last} -> {today})")]
    DayRolledOver { last: NaiveDate, today: NaiveDate },
    #[error("still within the day of completion")]
    SameDay,
    #[error("week rolled over (week of {last} -> week of {today})")]
    WeekRolledOver { last: NaiveDate, today: NaiveDate },
    #[error("still within the week of completion")]
    SameWeek,
    #[error("month rolled over (month of {last} -> month of {today})")]
    MonthRolledOver { last: NaiveDate, today: NaiveDate },
    #[error("still within the month of completion")]
    SameMonth,
    #[error("{elapsed} whole {unit}(s) elapsed, interval {interval}")]
    IntervalElapsed {
        unit: &'static str,
        elapsed: i64,
        interval: u32,
    },
    #[error("only {elapsed} whole {unit}(s) elapsed, interval {interval}")]
    IntervalNotElapsed {
        unit: &'static str,
        elapsed: i64,
        interval: u32,
    },
    #[error("today does not match the configured specific day")]
    SpecificDayMismatch,
    #[error("today matches the configured pattern")]
    PatternMatched,
    #[error("today is not in the configured day pattern")]
    PatternNotMatched,
    #[error("this pattern occurrence was already consumed this period")]
    OccurrenceConsumed,
    #[error("recurrence configuration missing")]
    ConfigMissing,
    #[error("recurrence configuration invalid: {0}")]
    ConfigInvalid(String),
}

/// Decides whether a completed task is due for a reset at `now`.
///
/// `last_completed_at` is the stored completion instant; callers pass `None`
/// when the task has never been completed (which never resets).
pub fn evaluate(
    kind: TaskKind,
    last_completed_at: Option<DateTime<Utc>>,
    recurrence: Option<&RecurrenceConfig>,
    now: DateTime<Utc>,
    tz: FixedOffset,
) -> ResetDecision {
    if kind == TaskKind::OneTime {
        return ResetDecision::not_due(ResetReason::NotRecurring);
    }
    let Some(completed_at) = last_completed_at else {
        return ResetDecision::not_due(ResetReason::NeverCompleted);
    };

    let last_day = business_date(completed_at, tz);
    let today = business_date(now, tz);

    // A completion stamped today is never reset, regardless of kind.
    if today == last_day {
        return ResetDecision::not_due(ResetReason::CompletedToday(today));
    }

    let decision = match kind {
        TaskKind::OneTime => unreachable!("handled above"),
        TaskKind::Daily => evaluate_daily(last_day, today),
        TaskKind::Weekly => evaluate_weekly(last_day, today),
        TaskKind::Monthly => evaluate_monthly(last_day, today),
        TaskKind::Recurring => evaluate_interval(recurrence, last_day, today),
        TaskKind::Custom => evaluate_custom(recurrence, last_day, today),
    };
    debug!(
        ?kind,
        %last_day,
        %today,
        should_reset = decision.should_reset,
        reason = %decision.reason,
        "recurrence evaluated"
    );
    decision
}

fn evaluate_daily(last_day: NaiveDate, today: NaiveDate) -> ResetDecision {
    if today > last_day {
        ResetDecision::due(ResetReason::DayRolledOver {
            last: last_day,
            today,
        })
    } else {
        ResetDecision::not_due(ResetReason::SameDay)
    }
}

fn evaluate_weekly(last_day: NaiveDate, today: NaiveDate) -> ResetDecision {
    if week_start(today) > week_start(last_day) {
        ResetDecision::due(ResetReason::WeekRolledOver {
            last: last_day,
            today,
        })
    } else {
        ResetDecision::not_due(ResetReason::SameWeek)
    }
}

fn evaluate_monthly(last_day: NaiveDate, today: NaiveDate) -> ResetDecision {
    if month_start(today) > month_start(last_day) {
        ResetDecision::due(ResetReason::MonthRolledOver {
            last: last_day,
            today,
        })
    } else {
        ResetDecision::not_due(ResetReason::SameMonth)
    }
}

/// Interval-based recurrence: due once the configured number of whole
/// days/weeks/months has elapsed, optionally pinned to a specific
/// day-of-week or day-of-month.
fn evaluate_interval(
    recurrence: Option<&RecurrenceConfig>,
    last_day: NaiveDate,
    today: NaiveDate,
) -> ResetDecision {
    let Some(config) = recurrence else {
        return ResetDecision::not_due(ResetReason::ConfigMissing);
    };
    let Some(frequency) = config.frequency else {
        return ResetDecision::not_due(ResetReason::ConfigInvalid(
            "interval recurrence without a frequency".into(),
        ));
    };
    let interval = config.interval.unwrap_or(1);
    if interval == 0 {
        return ResetDecision::not_due(ResetReason::ConfigInvalid(
            "interval of zero".into(),
        ));
    }

    let (unit, elapsed) = match frequency {
        Frequency::Daily => ("day", days_between(last_day, today)),
        Frequency::Weekly => ("week", whole_weeks_between(last_day, today)),
        Frequency::Monthly => ("month", whole_months_between(last_day, today)),
    };
    if elapsed < interval as i64 {
        return ResetDecision::not_due(ResetReason::IntervalNotElapsed {
            unit,
            elapsed,
            interval,
        });
    }

    if let Some(weekday) = config.day_of_week {
        if today.weekday() != weekday {
            return ResetDecision::not_due(ResetReason::SpecificDayMismatch);
        }
    }
    if let Some(day) = config.day_of_month {
        if today.day() != day {
            return ResetDecision::not_due(ResetReason::SpecificDayMismatch);
        }
    }
    ResetDecision::due(ResetReason::IntervalElapsed {
        unit,
        elapsed,
        interval,
    })
}

/// Custom patterns: explicit days-of-week or days-of-month.
///
/// `recurring = true` fires on every matching day. `recurring = false`
/// consumes each matching occurrence at most once, where an occurrence is
/// identified by its epoch-relative period index (week for weekday
/// patterns, month for day-of-month patterns) plus its position in the
/// pattern.
fn evaluate_custom(
    recurrence: Option<&RecurrenceConfig>,
    last_day: NaiveDate,
    today: NaiveDate,
) -> ResetDecision {
    let Some(config) = recurrence else {
        return ResetDecision::not_due(ResetReason::ConfigMissing);
    };

    if !config.days_of_week.is_empty() {
        if !config.days_of_week.contains(&today.weekday()) {
            return ResetDecision::not_due(ResetReason::PatternNotMatched);
        }
        if config.recurring {
            return ResetDecision::due(ResetReason::PatternMatched);
        }
        return one_shot_occurrence(
            week_index(today),
            week_index(last_day),
            pattern_position(&config.days_of_week, &today.weekday()),
            pattern_position(&config.days_of_week, &last_day.weekday()),
        );
    }

    if !config.days_of_month.is_empty() {
        if !config.days_of_month.contains(&today.day()) {
            return ResetDecision::not_due(ResetReason::PatternNotMatched);
        }
        if config.recurring {
            return ResetDecision::due(ResetReason::PatternMatched);
        }
        return one_shot_occurrence(
            month_index(today),
            month_index(last_day),
            pattern_position(&config.days_of_month, &today.day()),
            pattern_position(&config.days_of_month, &last_day.day()),
        );
    }

    ResetDecision::not_due(ResetReason::ConfigInvalid(
        "custom recurrence without day pattern".into(),
    ))
}

fn pattern_position<T: PartialEq>(pattern: &[T], value: &T) -> i64 {
    pattern
        .iter()
        .position(|candidate| candidate == value)
        .map(|p| p as i64)
        // A completion recorded outside the pattern never blocks the next
        // matching day.
        .unwrap_or(-1)
}

fn one_shot_occurrence(
    today_period: i64,
    last_period: i64,
    today_position: i64,
    last_position: i64,
) -> ResetDecision {
    if today_period > last_period
        || (today_period == last_period && today_position > last_position)
    {
        ResetDecision::due(ResetReason::PatternMatched)
    } else {
        ResetDecision::not_due(ResetReason::OccurrenceConsumed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate, TimeZone, Weekday};

    const TZ_EAST: i32 = 5 * 3600 + 30 * 60;

    fn tz() -> FixedOffset {
        FixedOffset::east_opt(TZ_EAST).unwrap()
    }

    fn at(date: &str, time: &str) -> DateTime<Utc> {
        let naive = format!("{} {}", date, time);
        let local = chrono::NaiveDateTime::parse_from_str(&naive, "%Y-%m-%d %H:%M")
            .expect("test datetime");
        tz().from_local_datetime(&local)
            .single()
            .unwrap()
            .with_timezone(&Utc)
    }

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn one_time_tasks_never_reset() {
        let decision = evaluate(
            TaskKind::OneTime,
            Some(at("2024-01-01", "08:00")),
            None,
            at("2025-01-01", "08:00"),
            tz(),
        );
        assert!(!decision.should_reset);
        assert_eq!(decision.reason, ResetReason::NotRecurring);
    }

    #[test]
    fn never_completed_tasks_never_reset() {
        let decision = evaluate(TaskKind::Daily, None, None, at("2024-06-01", "09:00"), tz());
        assert!(!decision.should_reset);
        assert_eq!(decision.reason, ResetReason::NeverCompleted);
    }

    #[test]
    fn daily_resets_iff_business_day_strictly_after_completion_day_full_year() {
        // Walk a full year of completions, checking the same-day and
        // next-day boundary on every single date, across month and year
        // rollovers.
        let mut day = d("2024-01-01");
        let end = d("2024-12-31");
        while day <= end {
            let completed = at(&day.format("%Y-%m-%d").to_string(), "23:30");
            let same_day_check = at(&day.format("%Y-%m-%d").to_string(), "23:59");
            let next_day = day.succ_opt().unwrap();
            let next_day_check = at(&next_day.format("%Y-%m-%d").to_string(), "00:01");

            let same = evaluate(TaskKind::Daily, Some(completed), None, same_day_check, tz());
            assert!(!same.should_reset, "same-day reset on {}", day);

            let next = evaluate(TaskKind::Daily, Some(completed), None, next_day_check, tz());
            assert!(next.should_reset, "missed rollover on {}", day);

            day = next_day;
        }
    }

    #[test]
    fn daily_boundary_uses_business_timezone_not_utc() {
        // Completed 2024-06-01 23:00 IST; checked 2024-06-01 19:00 UTC,
        // which is already 2024-06-02 00:30 IST.
        let completed = at("2024-06-01", "23:00");
        let check = Utc.with_ymd_and_hms(2024, 6, 1, 19, 0, 0).unwrap();
        let decision = evaluate(TaskKind::Daily, Some(completed), None, check, tz());
        assert!(decision.should_reset);
    }

    #[test]
    fn weekly_resets_only_when_sunday_week_start_advances() {
        // 2024-03-10 is a Sunday; completed mid-week.
        let completed = at("2024-03-13", "10:00");
        // Saturday of the same week: no reset.
        let same_week = evaluate(
            TaskKind::Weekly,
            Some(completed),
            None,
            at("2024-03-16", "10:00"),
            tz(),
        );
        assert!(!same_week.should_reset);
        assert_eq!(same_week.reason, ResetReason::SameWeek);
        // Next Sunday: reset.
        let next_week = evaluate(
            TaskKind::Weekly,
            Some(completed),
            None,
            at("2024-03-17", "00:30"),
            tz(),
        );
        assert!(next_week.should_reset);
    }

    #[test]
    fn monthly_resets_only_when_month_advances() {
        let completed = at("2024-01-31", "18:00");
        let same_month = evaluate(
            TaskKind::Monthly,
            Some(completed),
            None,
            at("2024-01-31", "23:00"),
            tz(),
        );
        assert!(!same_month.should_reset);
        let next_month = evaluate(
            TaskKind::Monthly,
            Some(completed),
            None,
            at("2024-02-01", "00:30"),
            tz(),
        );
        assert!(next_month.should_reset);
    }

    #[test]
    fn interval_recurrence_waits_for_whole_interval() {
        let config = RecurrenceConfig {
            frequency: Some(Frequency::Daily),
            interval: Some(3),
            ..Default::default()
        };
        let completed = at("2024-06-01", "09:00");
        let early = evaluate(
            TaskKind::Recurring,
            Some(completed),
            Some(&config),
            at("2024-06-03", "09:00"),
            tz(),
        );
        assert!(!early.should_reset);
        let due = evaluate(
            TaskKind::Recurring,
            Some(completed),
            Some(&config),
            at("2024-06-04", "09:00"),
            tz(),
        );
        assert!(due.should_reset);
    }

    #[test]
    fn interval_recurrence_gated_by_specific_weekday() {
        let config = RecurrenceConfig {
            frequency: Some(Frequency::Weekly),
            interval: Some(1),
            day_of_week: Some(Weekday::Mon),
            ..Default::default()
        };
        let completed = at("2024-03-11", "09:00"); // a Monday
        // Following Sunday: a whole week has not elapsed in Sunday-start terms?
        // Week rolls at 2024-03-17; Tuesday the 19th is past the interval but
        // not a Monday.
        let tuesday = evaluate(
            TaskKind::Recurring,
            Some(completed),
            Some(&config),
            at("2024-03-19", "09:00"),
            tz(),
        );
        assert!(!tuesday.should_reset);
        assert_eq!(tuesday.reason, ResetReason::SpecificDayMismatch);
        let monday = evaluate(
            TaskKind::Recurring,
            Some(completed),
            Some(&config),
            at("2024-03-18", "09:00"),
            tz(),
        );
        assert!(monday.should_reset);
    }

    #[test]
    fn interval_recurrence_with_bad_config_never_resets() {
        let completed = Some(at("2024-01-01", "09:00"));
        let now = at("2024-12-01", "09:00");

        let missing = evaluate(TaskKind::Recurring, completed, None, now, tz());
        assert!(!missing.should_reset);
        assert_eq!(missing.reason, ResetReason::ConfigMissing);

        let no_frequency = RecurrenceConfig::default();
        let invalid = evaluate(TaskKind::Recurring, completed, Some(&no_frequency), now, tz());
        assert!(!invalid.should_reset);

        let zero_interval = RecurrenceConfig {
            frequency: Some(Frequency::Daily),
            interval: Some(0),
            ..Default::default()
        };
        let zero = evaluate(TaskKind::Recurring, completed, Some(&zero_interval), now, tz());
        assert!(!zero.should_reset);
    }

    #[test]
    fn custom_weekday_pattern_recurring_fires_every_matching_day() {
        let config = RecurrenceConfig {
            days_of_week: vec![Weekday::Mon, Weekday::Wed],
            recurring: true,
            ..Default::default()
        };
        let completed = at("2024-03-11", "09:00"); // Monday
        let wednesday = evaluate(
            TaskKind::Custom,
            Some(completed),
            Some(&config),
            at("2024-03-13", "09:00"),
            tz(),
        );
        assert!(wednesday.should_reset);
        let thursday = evaluate(
            TaskKind::Custom,
            Some(completed),
            Some(&config),
            at("2024-03-14", "09:00"),
            tz(),
        );
        assert!(!thursday.should_reset);
        assert_eq!(thursday.reason, ResetReason::PatternNotMatched);
    }

    #[test]
    fn custom_days_of_month_one_shot_fires_once_per_occurrence() {
        let config = RecurrenceConfig {
            days_of_month: vec![1, 15],
            recurring: false,
            ..Default::default()
        };
        // Completed on the 1st; the 15th of the same month is a fresh
        // occurrence and fires.
        let completed_first = at("2024-06-01", "11:00");
        let on_fifteenth = evaluate(
            TaskKind::Custom,
            Some(completed_first),
            Some(&config),
            at("2024-06-15", "09:00"),
            tz(),
        );
        assert!(on_fifteenth.should_reset);

        // Once completion lands on the 15th, the same day never fires again.
        let completed_fifteenth = at("2024-06-15", "10:00");
        let same_day = evaluate(
            TaskKind::Custom,
            Some(completed_fifteenth),
            Some(&config),
            at("2024-06-15", "18:00"),
            tz(),
        );
        assert!(!same_day.should_reset);
        assert_eq!(same_day.reason, ResetReason::CompletedToday(d("2024-06-15")));

        // And an earlier occurrence in the same month stays consumed.
        let back_on_first = evaluate(
            TaskKind::Custom,
            Some(completed_fifteenth),
            Some(&config),
            at("2024-07-01", "09:00"),
            tz(),
        );
        // New month, new occurrence: fires again.
        assert!(back_on_first.should_reset);
    }

    #[test]
    fn custom_one_shot_does_not_refire_on_earlier_position_same_period() {
        let config = RecurrenceConfig {
            days_of_week: vec![Weekday::Mon, Weekday::Fri],
            recurring: false,
            ..Default::default()
        };
        // Completed Friday 2024-03-15; Monday of that same Sunday-start week
        // was 2024-03-11, already behind the Friday occurrence.
        let completed = at("2024-03-15", "09:00");
        let friday_again = evaluate(
            TaskKind::Custom,
            Some(completed),
            Some(&config),
            at("2024-03-16", "09:00"),
            tz(),
        );
        assert!(!friday_again.should_reset); // Saturday, no pattern match
        let next_monday = evaluate(
            TaskKind::Custom,
            Some(completed),
            Some(&config),
            at("2024-03-18", "09:00"),
            tz(),
        );
        // Next Sunday-start week began 2024-03-17, so Monday fires.
        assert!(next_monday.should_reset);
    }

    #[test]
    fn custom_without_patterns_never_resets() {
        let config = RecurrenceConfig::default();
        let decision = evaluate(
            TaskKind::Custom,
            Some(at("2024-01-01", "09:00")),
            Some(&config),
            at("2024-02-01", "09:00"),
            tz(),
        );
        assert!(!decision.should_reset);
        assert!(matches!(decision.reason, ResetReason::ConfigInvalid(_)));
    }
}
