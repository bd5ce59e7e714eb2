// File: ./src/model/calendar.rs
// Calendar arithmetic used by monthly "Nth weekday" rules.
use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc, Weekday};

/// Converts epoch milliseconds into a date-time in the given zone.
/// Out-of-range values clamp to the epoch rather than panicking.
pub fn to_zoned<Tz: TimeZone>(millis: i64, tz: &Tz) -> DateTime<Tz> {
    let utc = DateTime::<Utc>::from_timestamp_millis(millis).unwrap_or_default();
    utc.with_timezone(tz)
}

/// Date-only value for `millis` in `tz`. Time of day is discarded.
pub fn date_value<Tz: TimeZone>(millis: i64, tz: &Tz) -> NaiveDate {
    to_zoned(millis, tz).date_naive()
}

/// Epoch milliseconds of the first instant of `date` in `tz`.
///
/// Ambiguous midnights resolve to the earlier instant. Zones that skip
/// midnight entirely fall back to UTC midnight.
pub fn start_of_day_millis<Tz: TimeZone>(date: NaiveDate, tz: &Tz) -> i64 {
    let midnight = date.and_hms_opt(0, 0, 0).unwrap_or_default();
    match tz.from_local_datetime(&midnight).earliest() {
        Some(dt) => dt.timestamp_millis(),
        None => midnight.and_utc().timestamp_millis(),
    }
}

pub fn weekday<Tz: TimeZone>(millis: i64, tz: &Tz) -> Weekday {
    date_value(millis, tz).weekday()
}

/// Ordinal occurrence of the date's weekday within its month (2nd Tuesday -> 2).
pub fn day_of_week_in_month(date: NaiveDate) -> u32 {
    (date.day() - 1) / 7 + 1
}

/// How many times the date's weekday occurs in its month (4 or 5).
pub fn max_day_of_week_in_month(date: NaiveDate) -> u32 {
    let last = days_in_month(date.year(), date.month());
    // Same weekday, stepping forward in weeks until the month runs out.
    let remaining_weeks = (last - date.day()) / 7;
    day_of_week_in_month(date) + remaining_weeks
}

pub fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|d| d.pred_opt())
        .map(|d| d.day())
        .unwrap_or(31)
}

pub fn day_of_week_in_month_at<Tz: TimeZone>(millis: i64, tz: &Tz) -> u32 {
    day_of_week_in_month(date_value(millis, tz))
}

pub fn max_day_of_week_in_month_at<Tz: TimeZone>(millis: i64, tz: &Tz) -> u32 {
    max_day_of_week_in_month(date_value(millis, tz))
}
