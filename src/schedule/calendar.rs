//! Civil-date arithmetic and the allow-list predicates used by the scheduler.

use chrono::{Datelike, Duration, Months, NaiveDate};
use hourglass_rs::SafeTimeProvider;

/// today's civil date according to the injected clock
pub fn today(time: &SafeTimeProvider) -> NaiveDate {
    time.now().date_naive()
}

pub fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || (year % 400 == 0)
}

pub fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 => {
            if is_leap_year(year) {
                29
            } else {
                28
            }
        }
        _ => 30,
    }
}

/// add whole months keeping `anchor_day`, clamped to the target month's last day
pub fn add_months_anchored(date: NaiveDate, months: u32, anchor_day: u32) -> Option<NaiveDate> {
    let first = NaiveDate::from_ymd_opt(date.year(), date.month(), 1)?;
    let target = first.checked_add_months(Months::new(months))?;
    let day = anchor_day.min(days_in_month(target.year(), target.month()));
    NaiveDate::from_ymd_opt(target.year(), target.month(), day)
}

/// add whole months keeping the date's own day of month
pub fn add_months_clamped(date: NaiveDate, months: u32) -> Option<NaiveDate> {
    add_months_anchored(date, months, date.day())
}

pub fn add_days(date: NaiveDate, days: u64) -> Option<NaiveDate> {
    date.checked_add_signed(Duration::days(i64::try_from(days).ok()?))
}

/// weekday with sunday = 0 through saturday = 6
pub fn weekday_index(date: NaiveDate) -> u8 {
    date.weekday().num_days_from_sunday() as u8
}

pub fn is_last_day_of_month(date: NaiveDate) -> bool {
    date.day() == days_in_month(date.year(), date.month())
}

/// whole days from `from` to `to`, negative when `to` is earlier
pub fn days_between(from: NaiveDate, to: NaiveDate) -> i64 {
    (to - from).num_days()
}

/// months elapsed between the calendar months of two dates
pub fn months_between(from: NaiveDate, to: NaiveDate) -> i64 {
    (to.year() as i64 - from.year() as i64) * 12 + (to.month() as i64 - from.month() as i64)
}

/// empty list allows every weekday
pub fn is_weekday_allowed(date: NaiveDate, allowed: &[u8]) -> bool {
    allowed.is_empty() || allowed.contains(&weekday_index(date))
}

/// empty list allows every day; a listed day past the month's end matches its last day
pub fn is_month_day_allowed(date: NaiveDate, allowed: &[u8]) -> bool {
    if allowed.is_empty() {
        return true;
    }
    let day = date.day() as u8;
    allowed
        .iter()
        .any(|&d| d == day || (d > day && is_last_day_of_month(date)))
}

/// empty list allows every month
pub fn is_month_allowed(date: NaiveDate, allowed: &[u8]) -> bool {
    allowed.is_empty() || allowed.contains(&(date.month() as u8))
}
