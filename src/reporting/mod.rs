/// Aggregate reporting over the time fact table
pub mod export;
mod manager;

pub use manager::ReportManager;

use chrono::{Datelike, Duration, NaiveDate};

/// Shift a from/to pair by the account's configured week start relative to
/// today's weekday. Weekdays count 0 = Sunday through 6 = Saturday.
pub fn adjust_for_week_start(
    from_date: NaiveDate,
    to_date: NaiveDate,
    week_start: i64,
    today: NaiveDate,
) -> (NaiveDate, NaiveDate) {
    let today_weekday = i64::from(today.weekday().num_days_from_sunday());

    let shift = if week_start <= today_weekday {
        week_start
    } else {
        week_start - 7
    };

    (
        from_date + Duration::days(shift),
        to_date + Duration::days(shift),
    )
}
