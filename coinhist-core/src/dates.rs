//! Date-range validation shared by every source adapter.
//!
//! Adapters never fail on bad dates: a missing, unparseable or future start
//! falls back to yesterday, and the same for the end date falls back to today.

use chrono::{Duration, Local, NaiveDate, NaiveTime};
use tracing::warn;

/// Calendar date format accepted from callers and sent to date-based APIs.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Parse `raw` under `format`, returning `None` for missing or malformed input.
pub fn check_date(raw: Option<&str>, format: &str) -> Option<NaiveDate> {
    let raw = raw?.trim();
    NaiveDate::parse_from_str(raw, format).ok()
}

/// Outcome of validating a single date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckedDate {
    pub date: NaiveDate,
    /// True when the caller's value was replaced by the fallback.
    pub defaulted: bool,
}

/// Validate one date against `format`, substituting `fallback` when the input
/// is missing, malformed, or later than `today`.
pub fn validate_date(
    raw: Option<&str>,
    format: &str,
    fallback: NaiveDate,
    today: NaiveDate,
) -> CheckedDate {
    match check_date(raw, format) {
        Some(date) if date <= today => CheckedDate {
            date,
            defaulted: false,
        },
        _ => CheckedDate {
            date: fallback,
            defaulted: true,
        },
    }
}

/// A validated, bounded date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub start_defaulted: bool,
    pub end_defaulted: bool,
}

impl DateRange {
    /// Resolve caller-supplied start/end strings relative to `today`.
    pub fn resolve(start: Option<&str>, end: Option<&str>, today: NaiveDate) -> Self {
        let yesterday = today - Duration::days(1);

        let checked_start = validate_date(start, DATE_FORMAT, yesterday, today);
        if checked_start.defaulted {
            warn!(
                supplied = start.unwrap_or("<none>"),
                "incorrect start date supplied, defaulting to {}",
                yesterday.format(DATE_FORMAT)
            );
        }

        let checked_end = validate_date(end, DATE_FORMAT, today, today);
        if checked_end.defaulted {
            warn!(
                supplied = end.unwrap_or("<none>"),
                "incorrect end date supplied, defaulting to {}",
                today.format(DATE_FORMAT)
            );
        }

        if checked_start.date > checked_end.date {
            warn!(
                start = %checked_start.date,
                end = %checked_end.date,
                "start date is after end date; the source will likely return no data"
            );
        }

        Self {
            start: checked_start.date,
            end: checked_end.date,
            start_defaulted: checked_start.defaulted,
            end_defaulted: checked_end.defaulted,
        }
    }

    pub fn start_str(&self) -> String {
        self.start.format(DATE_FORMAT).to_string()
    }

    pub fn end_str(&self) -> String {
        self.end.format(DATE_FORMAT).to_string()
    }

    /// Unix seconds at 00:00:00 UTC on the start date.
    pub fn start_epoch(&self) -> i64 {
        midnight_utc(self.start)
    }

    /// Unix seconds at 23:59:59 UTC on the end date, so the end is inclusive.
    pub fn end_epoch(&self) -> i64 {
        midnight_utc(self.end) + 86_399
    }
}

fn midnight_utc(date: NaiveDate) -> i64 {
    date.and_time(NaiveTime::MIN).and_utc().timestamp()
}

/// The local calendar date.
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn check_date_accepts_iso_dates() {
        assert_eq!(check_date(Some("2017-09-01"), DATE_FORMAT), Some(d(2017, 9, 1)));
        assert_eq!(check_date(Some(" 2017-09-01 "), DATE_FORMAT), Some(d(2017, 9, 1)));
    }

    #[test]
    fn check_date_rejects_garbage() {
        assert_eq!(check_date(None, DATE_FORMAT), None);
        assert_eq!(check_date(Some(""), DATE_FORMAT), None);
        assert_eq!(check_date(Some("01/09/2017"), DATE_FORMAT), None);
        assert_eq!(check_date(Some("2017-02-30"), DATE_FORMAT), None);
    }

    #[test]
    fn validate_date_flags_defaults() {
        let today = d(2024, 3, 10);
        let fallback = d(2024, 3, 9);

        let ok = validate_date(Some("2024-01-01"), DATE_FORMAT, fallback, today);
        assert_eq!(ok, CheckedDate { date: d(2024, 1, 1), defaulted: false });

        let bad = validate_date(Some("nope"), DATE_FORMAT, fallback, today);
        assert_eq!(bad, CheckedDate { date: fallback, defaulted: true });
    }

    #[test]
    fn today_itself_is_not_clamped() {
        let today = d(2024, 3, 10);
        let checked = validate_date(Some("2024-03-10"), DATE_FORMAT, d(2024, 3, 9), today);
        assert!(!checked.defaulted);
    }

    #[test]
    fn missing_dates_default_to_yesterday_and_today() {
        let today = d(2024, 3, 10);
        let range = DateRange::resolve(None, None, today);
        assert_eq!(range.start, d(2024, 3, 9));
        assert_eq!(range.end, today);
        assert!(range.start_defaulted && range.end_defaulted);
    }

    #[test]
    fn future_start_is_clamped_to_yesterday() {
        let today = d(2024, 3, 10);
        let range = DateRange::resolve(Some("2099-01-01"), None, today);
        assert_eq!(range.start, d(2024, 3, 9));
        assert_eq!(range.end, today);
    }

    #[test]
    fn future_end_is_clamped_to_today() {
        let today = d(2024, 3, 10);
        let range = DateRange::resolve(Some("2024-01-01"), Some("2030-01-01"), today);
        assert_eq!(range.start, d(2024, 1, 1));
        assert!(!range.start_defaulted);
        assert_eq!(range.end, today);
        assert!(range.end_defaulted);
    }

    #[test]
    fn year_boundary_yesterday() {
        let range = DateRange::resolve(None, None, d(2024, 1, 1));
        assert_eq!(range.start, d(2023, 12, 31));
    }

    #[test]
    fn epoch_bounds_cover_whole_days() {
        let range = DateRange::resolve(Some("2017-01-01"), Some("2017-01-02"), d(2024, 1, 1));
        assert_eq!(range.start_epoch(), 1_483_228_800);
        assert_eq!(range.end_epoch(), 1_483_228_800 + 2 * 86_400 - 1);
    }

    #[test]
    fn formats_back_to_iso() {
        let range = DateRange::resolve(Some("2017-09-01"), Some("2017-09-02"), d(2024, 1, 1));
        assert_eq!(range.start_str(), "2017-09-01");
        assert_eq!(range.end_str(), "2017-09-02");
    }
}
