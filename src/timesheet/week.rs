/// Week-range math for timesheets
use chrono::{Datelike, Duration, NaiveDate, Utc, Weekday};
use chrono_tz::Tz;

/// Map the stored week-start index (0 = Sunday .. 6 = Saturday) to a weekday.
/// Anything out of range falls back to Monday.
pub fn weekday_from_index(week_start: i64) -> Weekday {
    match week_start {
        0 => Weekday::Sun,
        1 => Weekday::Mon,
        2 => Weekday::Tue,
        3 => Weekday::Wed,
        4 => Weekday::Thu,
        5 => Weekday::Fri,
        6 => Weekday::Sat,
        _ => {
            tracing::warn!(week_start, "invalid week start, using Monday");
            Weekday::Mon
        }
    }
}

/// Walk backwards one day at a time until the configured start weekday.
fn week_start_date(mut date: NaiveDate, week_start: Weekday) -> NaiveDate {
    while date.weekday() != week_start {
        date -= Duration::days(1);
    }
    date
}

/// Seven-day week containing `date`, starting on `week_start`.
pub fn week_range_from_date(date: NaiveDate, week_start: Weekday) -> (NaiveDate, NaiveDate) {
    let start = week_start_date(date, week_start);
    (start, start + Duration::days(6))
}

/// Week containing today in the given IANA timezone. An unknown zone falls
/// back to UTC; the request still succeeds.
pub fn current_week_range(timezone: &str, week_start: Weekday) -> (NaiveDate, NaiveDate) {
    let today = match timezone.parse::<Tz>() {
        Ok(tz) => Utc::now().with_timezone(&tz).date_naive(),
        Err(_) => {
            tracing::warn!(timezone, "could not load timezone, falling back to UTC");
            Utc::now().date_naive()
        }
    };

    week_range_from_date(today, week_start)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn date(value: &str) -> NaiveDate {
        NaiveDate::parse_from_str(value, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn week_range_table() {
        let cases = [
            // (reference, week start, expected start, expected end)
            ("2017-11-17", Weekday::Mon, "2017-11-13", "2017-11-19"),
            ("2017-11-17", Weekday::Sun, "2017-11-12", "2017-11-18"),
            ("2017-11-17", Weekday::Sat, "2017-11-11", "2017-11-17"),
            ("2017-11-19", Weekday::Mon, "2017-11-13", "2017-11-19"),
            ("2017-11-19", Weekday::Sun, "2017-11-19", "2017-11-25"),
            ("2017-11-19", Weekday::Sat, "2017-11-18", "2017-11-24"),
        ];

        for (reference, week_start, expected_start, expected_end) in cases {
            let (start, end) = week_range_from_date(date(reference), week_start);
            assert_eq!(start, date(expected_start), "start for {reference}");
            assert_eq!(end, date(expected_end), "end for {reference}");
        }
    }

    #[test]
    fn current_week_range_valid_zones() {
        for (timezone, week_start) in [
            ("America/New_York", Weekday::Mon),
            ("Africa/Monrovia", Weekday::Sun),
            ("Africa/Monrovia", Weekday::Sat),
            ("America/Tijuana", Weekday::Mon),
            // Unknown and empty zones fall back to UTC
            ("TwilightZone", Weekday::Mon),
            ("", Weekday::Mon),
        ] {
            let (start, end) = current_week_range(timezone, week_start);
            assert_eq!(start.weekday(), week_start);
            assert_eq!(end - start, Duration::days(6));
        }
    }

    #[test]
    fn weekday_index_mapping() {
        assert_eq!(weekday_from_index(0), Weekday::Sun);
        assert_eq!(weekday_from_index(6), Weekday::Sat);
        // Out of range falls back to Monday
        assert_eq!(weekday_from_index(7), Weekday::Mon);
        assert_eq!(weekday_from_index(-1), Weekday::Mon);
    }

    proptest! {
        /// Every range is exactly seven days, starts on the configured
        /// weekday and contains the reference date.
        #[test]
        fn week_range_properties(days in 0i64..20_000, week_start in 0i64..7) {
            let reference = date("1990-01-01") + Duration::days(days);
            let weekday = weekday_from_index(week_start);
            let (start, end) = week_range_from_date(reference, weekday);

            prop_assert_eq!(start.weekday(), weekday);
            prop_assert_eq!(end - start, Duration::days(6));
            prop_assert!(start <= reference && reference <= end);
        }
    }
}
