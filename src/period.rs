// src/period.rs
//
// Pure calendar helpers. Every function takes the instant and the business
// timezone as explicit parameters; nothing here reads a global clock, so
// date-boundary behavior is deterministic under test.

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};


/// The business-local calendar date of a UTC instant.
pub fn business_date(instant: DateTime<Utc>, tz: FixedOffset) -> NaiveDate {
    instant.with_timezone(&tz).date_naive()
}

/// The business-local wall time of a UTC instant.
pub fn business_datetime(instant: DateTime<Utc>, tz: FixedOffset) -> NaiveDateTime {
    instant.with_timezone(&tz).naive_local()
}

/// Start of the week containing `date`; weeks start on Sunday.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    let days_from_sunday = date.weekday().num_days_from_sunday() as i64;
    date - Duration::days(days_from_sunday)
}

/// First day of the month containing `date`.
pub fn month_start(date: NaiveDate) -> NaiveDate {
    // day 1 always exists for a valid year/month
    date.with_day(1).expect("first of month is always valid")
}

/// Whole days from `from` to `to` (negative when `to` precedes `from`).
pub fn days_between(from: NaiveDate, to: NaiveDate) -> i64 {
    (to - from).num_days()
}

/// Epoch-relative index of the Sunday-started week containing `date`.
pub fn week_index(date: NaiveDate) -> i64 {
    // Day 1 of the common era is a Monday, so Sundays land on multiples of 7.
    (date.num_days_from_ce() as i64).div_euclid(7)
}

/// Epoch-relative month index (year * 12 + month).
pub fn month_index(date: NaiveDate) -> i64 {
    date.year() as i64 * 12 + date.month() as i64 - 1
}

/// Whole Sunday-to-Sunday weeks elapsed between two dates.
pub fn whole_weeks_between(from: NaiveDate, to: NaiveDate) -> i64 {
    week_index(to) - week_index(from)
}

/// Whole calendar months elapsed between two dates.
pub fn whole_months_between(from: NaiveDate, to: NaiveDate) -> i64 {
    month_index(to) - month_index(from)
}

/// Tenure in whole months from `joined_on` to `as_of`, day-accurate.
pub fn tenure_months(joined_on: NaiveDate, as_of: NaiveDate) -> i64 {
    let mut months = whole_months_between(joined_on, as_of);
    if as_of.day() < joined_on.day() {
        months -= 1;
    }
    months.max(0)
}

/// Parses a "HH:MM" deadline string. `None` for anything malformed; a bad
/// deadline must never be treated as an instant that already passed.
pub fn parse_deadline_time(raw: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M").ok()
}

/// Absolute UTC instant of `date` at `time` in the business timezone.
pub fn deadline_instant(date: NaiveDate, time: NaiveTime, tz: FixedOffset) -> DateTime<Utc> {
    date.and_time(time)
        .and_local_timezone(tz)
        .single()
        // Fixed offsets have no gaps or folds; single() always holds.
        .expect("fixed-offset local time is unambiguous")
        .with_timezone(&Utc)
}

/// All dates from `from` through `to`, inclusive.
pub fn days_in_range(from: NaiveDate, to: NaiveDate) -> Vec<NaiveDate> {
    let mut days = Vec::new();
    let mut current = from;
    while current <= to {
        days.push(current);
        if let Some(next) = current.succ_opt() {
            current = next;
        } else {
            break;
        }
    }
    days
}
