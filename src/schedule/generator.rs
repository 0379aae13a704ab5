use chrono::{Datelike, NaiveDate};

use crate::errors::{LedgerError, Result};
use crate::schedule::calendar::{
    add_days, add_months_anchored, days_between, is_month_allowed, is_month_day_allowed,
    is_weekday_allowed, months_between,
};
use crate::schedule::periodicity::{IntervalType, Periodicity};

/// how candidate dates are produced before the allow-lists are applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stepping {
    /// candidate k is start + k * days
    FixedDays(u64),
    /// candidate k is start + k * months on the start's day, clamped to month end
    AnchoredMonths { months: u32, anchor_day: u32 },
    /// every calendar day inside every n-th week counted from the start
    WeekWalk { every: u32 },
    /// every calendar day inside every n-th month counted from the start
    MonthWalk { every: u32 },
}

impl Stepping {
    /// consecutive rejections after which no accepted date can follow
    fn rejection_limit(&self) -> u64 {
        match *self {
            Stepping::FixedDays(_) => 7,
            Stepping::AnchoredMonths { .. } => 400,
            Stepping::WeekWalk { every } => 7 * (every as u64 + 1),
            Stepping::MonthWalk { every } => 366 * (every as u64 + 1),
        }
    }
}

/// lazy due-date sequence for a periodicity, starting with `start` as the first candidate
///
/// The sequence is deterministic: cloning it or calling [`DueDates::restart`] replays the
/// same dates. It ends early only when the configuration cannot accept another date.
#[derive(Debug, Clone)]
pub struct DueDates {
    periodicity: Periodicity,
    start: NaiveDate,
    stepping: Stepping,
    index: u64,
    exhausted: bool,
}

impl DueDates {
    pub fn new(periodicity: &Periodicity, start: NaiveDate) -> Result<Self> {
        periodicity.validate()?;

        let value = periodicity.interval_value;
        let stepping = match periodicity.interval_type {
            IntervalType::Daily => Stepping::FixedDays(value as u64),
            IntervalType::Weekly if periodicity.allowed_weekdays.is_empty() => {
                Stepping::FixedDays(7 * value as u64)
            }
            IntervalType::Weekly => Stepping::WeekWalk { every: value },
            IntervalType::Monthly if periodicity.allowed_month_days.is_empty() => {
                Stepping::AnchoredMonths {
                    months: value,
                    anchor_day: start.day(),
                }
            }
            IntervalType::Monthly => Stepping::MonthWalk { every: value },
            IntervalType::Yearly => Stepping::AnchoredMonths {
                months: value.checked_mul(12).ok_or_else(|| {
                    LedgerError::configuration(format!(
                        "periodicity '{}' interval of {} years is too large",
                        periodicity.name, value
                    ))
                })?,
                anchor_day: start.day(),
            },
        };

        Ok(Self {
            periodicity: periodicity.clone(),
            start,
            stepping,
            index: 0,
            exhausted: false,
        })
    }

    /// rewind to the first due date
    pub fn restart(&mut self) {
        self.index = 0;
        self.exhausted = false;
    }

    fn candidate(&self, k: u64) -> Option<NaiveDate> {
        match self.stepping {
            Stepping::FixedDays(step) => add_days(self.start, k.checked_mul(step)?),
            Stepping::AnchoredMonths { months, anchor_day } => {
                let offset = u32::try_from(k.checked_mul(months as u64)?).ok()?;
                add_months_anchored(self.start, offset, anchor_day)
            }
            Stepping::WeekWalk { .. } | Stepping::MonthWalk { .. } => add_days(self.start, k),
        }
    }

    fn accepts(&self, date: NaiveDate) -> bool {
        let p = &self.periodicity;
        match self.stepping {
            Stepping::FixedDays(_) => match p.interval_type {
                IntervalType::Daily | IntervalType::Weekly => {
                    is_weekday_allowed(date, &p.allowed_weekdays)
                }
                _ => true,
            },
            Stepping::AnchoredMonths { .. } => {
                is_month_day_allowed(date, &p.allowed_month_days)
                    && is_month_allowed(date, &p.allowed_months)
            }
            Stepping::WeekWalk { every } => {
                let week = days_between(self.start, date) / 7;
                week % every as i64 == 0 && is_weekday_allowed(date, &p.allowed_weekdays)
            }
            Stepping::MonthWalk { every } => {
                months_between(self.start, date) % every as i64 == 0
                    && is_month_day_allowed(date, &p.allowed_month_days)
                    && is_month_allowed(date, &p.allowed_months)
            }
        }
    }
}

impl Iterator for DueDates {
    type Item = NaiveDate;

    fn next(&mut self) -> Option<NaiveDate> {
        if self.exhausted {
            return None;
        }

        let limit = self.stepping.rejection_limit();
        let mut rejections = 0;

        loop {
            let Some(candidate) = self.candidate(self.index) else {
                self.exhausted = true;
                return None;
            };
            self.index += 1;

            if self.accepts(candidate) {
                return Some(candidate);
            }

            rejections += 1;
            if rejections >= limit {
                self.exhausted = true;
                return None;
            }
        }
    }
}

/// generate exactly `count` due dates, failing fast when the configuration cannot supply them
pub fn generate_due_dates(
    periodicity: &Periodicity,
    start: NaiveDate,
    count: u32,
) -> Result<Vec<NaiveDate>> {
    let dates: Vec<NaiveDate> = DueDates::new(periodicity, start)?
        .take(count as usize)
        .collect();

    if dates.len() < count as usize {
        return Err(LedgerError::configuration(format!(
            "periodicity '{}' cannot produce {} due dates from {} (stopped after {})",
            periodicity.name,
            count,
            start,
            dates.len()
        )));
    }

    Ok(dates)
}
