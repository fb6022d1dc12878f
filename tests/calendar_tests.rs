use chrono::{Datelike, NaiveDate, Weekday};
use planboard::WeekendPolicy;
use planboard::calendar::{
    add_business_days, business_days_between, is_non_working_day, next_working_day,
};

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

#[test]
fn weekends_are_non_working_by_default() {
    let policy = WeekendPolicy::default();
    // 2025-01-04 is a Saturday, 2025-01-05 is a Sunday
    assert!(is_non_working_day(d(2025, 1, 4), policy));
    assert!(is_non_working_day(d(2025, 1, 5), policy));
    assert!(!is_non_working_day(d(2025, 1, 6), policy));
}

#[test]
fn weekend_flags_open_up_saturday_and_sunday_independently() {
    let saturdays = WeekendPolicy::new(true, false);
    assert!(!is_non_working_day(d(2025, 1, 4), saturdays));
    assert!(is_non_working_day(d(2025, 1, 5), saturdays));

    let sundays = WeekendPolicy::new(false, true);
    assert!(is_non_working_day(d(2025, 1, 4), sundays));
    assert!(!is_non_working_day(d(2025, 1, 5), sundays));
}

#[test]
fn friday_plus_one_day_lands_on_monday() {
    // The start date is day zero, so a one-day task starting Friday ends
    // on the next working day: Monday.
    let end = add_business_days(d(2025, 1, 3), 1, WeekendPolicy::default());
    assert_eq!(end, d(2025, 1, 6));
    assert_eq!(end.weekday(), Weekday::Mon);
}

#[test]
fn friday_plus_one_day_lands_on_saturday_when_saturdays_are_worked() {
    let end = add_business_days(d(2025, 1, 3), 1, WeekendPolicy::new(true, false));
    assert_eq!(end, d(2025, 1, 4));
}

#[test]
fn stepping_advances_before_counting() {
    // Monday + 4 working days reaches Friday of the same week; the fifth
    // step crosses the weekend and lands on the next Monday.
    let monday = d(2025, 1, 6);
    assert_eq!(
        add_business_days(monday, 4, WeekendPolicy::default()),
        d(2025, 1, 10)
    );
    assert_eq!(
        add_business_days(monday, 5, WeekendPolicy::default()),
        d(2025, 1, 13)
    );
}

#[test]
fn zero_days_returns_the_start_unchanged() {
    let start = d(2025, 1, 8);
    assert_eq!(add_business_days(start, 0, WeekendPolicy::default()), start);
}

#[test]
fn next_working_day_skips_the_weekend() {
    let policy = WeekendPolicy::default();
    assert_eq!(next_working_day(d(2025, 1, 4), policy), d(2025, 1, 6));
    assert_eq!(next_working_day(d(2025, 1, 5), policy), d(2025, 1, 6));
    // A working day is returned as-is.
    assert_eq!(next_working_day(d(2025, 1, 6), policy), d(2025, 1, 6));
}

#[test]
fn next_working_day_respects_weekend_flags() {
    assert_eq!(
        next_working_day(d(2025, 1, 4), WeekendPolicy::new(true, false)),
        d(2025, 1, 4)
    );
    assert_eq!(
        next_working_day(d(2025, 1, 5), WeekendPolicy::new(false, true)),
        d(2025, 1, 5)
    );
}

#[test]
fn business_days_between_inverts_add_business_days() {
    let policies = [
        WeekendPolicy::new(false, false),
        WeekendPolicy::new(true, false),
        WeekendPolicy::new(false, true),
        WeekendPolicy::new(true, true),
    ];
    let starts = [d(2025, 1, 6), d(2025, 1, 3), d(2025, 2, 12)];
    for policy in policies {
        for start in starts {
            for days in 1..=10 {
                let end = add_business_days(start, days, policy);
                assert_eq!(
                    business_days_between(start, end, policy),
                    days,
                    "round trip failed for start {start}, {days} days, {policy:?}"
                );
            }
        }
    }
}

#[test]
fn business_days_between_is_zero_for_empty_or_reversed_intervals() {
    let policy = WeekendPolicy::default();
    assert_eq!(business_days_between(d(2025, 1, 6), d(2025, 1, 6), policy), 0);
    assert_eq!(business_days_between(d(2025, 1, 10), d(2025, 1, 6), policy), 0);
}

#[test]
fn weekend_only_interval_counts_no_days() {
    // Friday -> Sunday spans only weekend days under the default policy.
    assert_eq!(
        business_days_between(d(2025, 1, 3), d(2025, 1, 5), WeekendPolicy::default()),
        0
    );
    assert_eq!(
        business_days_between(d(2025, 1, 3), d(2025, 1, 5), WeekendPolicy::new(true, true)),
        2
    );
}
