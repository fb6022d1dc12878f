use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

/// Per-task weekend-work policy. Saturday and Sunday are the only days a
/// task can opt in or out of; Monday through Friday always count as work.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeekendPolicy {
    pub work_saturday: bool,
    pub work_sunday: bool,
}

impl WeekendPolicy {
    pub fn new(work_saturday: bool, work_sunday: bool) -> Self {
        Self {
            work_saturday,
            work_sunday,
        }
    }
}

/// Check whether a date is excluded from work under the given policy.
pub fn is_non_working_day(date: NaiveDate, policy: WeekendPolicy) -> bool {
    match date.weekday() {
        Weekday::Sat => !policy.work_saturday,
        Weekday::Sun => !policy.work_sunday,
        _ => false,
    }
}

/// Advance `days` working days from `start`. The start date itself is day
/// zero: the loop moves to the next calendar day before counting, so a
/// one-day span starting on a Friday with weekends off ends on Monday.
pub fn add_business_days(start: NaiveDate, days: i64, policy: WeekendPolicy) -> NaiveDate {
    let mut current = start;
    let mut count = 0;
    while count < days {
        current = current + Duration::days(1);
        if !is_non_working_day(current, policy) {
            count += 1;
        }
    }
    current
}

/// `date` itself when it is a working day, otherwise the next working day.
pub fn next_working_day(date: NaiveDate, policy: WeekendPolicy) -> NaiveDate {
    let mut current = date;
    while is_non_working_day(current, policy) {
        current = current + Duration::days(1);
    }
    current
}

/// Count working days in `(start, end]`. Exact inverse of
/// [`add_business_days`]: stepping `n` working days forward and counting
/// back over the same interval always yields `n`.
pub fn business_days_between(start: NaiveDate, end: NaiveDate, policy: WeekendPolicy) -> i64 {
    let mut count = 0;
    let mut current = start;
    while current < end {
        current = current + Duration::days(1);
        if !is_non_working_day(current, policy) {
            count += 1;
        }
    }
    count
}
