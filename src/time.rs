//! Parsing and formatting of the dates and times accepted by the repositories.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::errors::WatObsErr;

/// Anything that can be interpreted as a UTC date and time.
///
/// Strings are parsed with [`parse_datetime`], so `"2021"`, `"20200101"`, `"2019-10-1"` and
/// `"2015-03-24T10:16:45.034Z"` all work.
pub trait ToDateTime {
    /// Interpret as a naive date time in UTC.
    fn to_datetime(&self) -> Result<NaiveDateTime, WatObsErr>;
}

impl ToDateTime for str {
    fn to_datetime(&self) -> Result<NaiveDateTime, WatObsErr> {
        parse_datetime(self)
    }
}

impl ToDateTime for &str {
    fn to_datetime(&self) -> Result<NaiveDateTime, WatObsErr> {
        parse_datetime(self)
    }
}

impl ToDateTime for String {
    fn to_datetime(&self) -> Result<NaiveDateTime, WatObsErr> {
        parse_datetime(self)
    }
}

impl ToDateTime for NaiveDateTime {
    fn to_datetime(&self) -> Result<NaiveDateTime, WatObsErr> {
        Ok(*self)
    }
}

impl ToDateTime for NaiveDate {
    fn to_datetime(&self) -> Result<NaiveDateTime, WatObsErr> {
        midnight(*self, &self.to_string())
    }
}

impl ToDateTime for DateTime<Utc> {
    fn to_datetime(&self) -> Result<NaiveDateTime, WatObsErr> {
        Ok(self.naive_utc())
    }
}

/// Parse a date or date and time. Times without an offset are taken as UTC.
pub fn parse_datetime(dt_str: &str) -> Result<NaiveDateTime, WatObsErr> {
    let trimmed = dt_str.trim();
    let invalid = || WatObsErr::InvalidDateTime(dt_str.to_owned());

    if trimmed.is_empty() {
        return Err(invalid());
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.naive_utc());
    }

    let without_zulu = trimmed.trim_end_matches(|c| c == 'Z' || c == 'z');
    const FORMATS: &[&str] = &[
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
        "%m/%d/%Y %H:%M:%S",
        "%m/%d/%Y %H:%M",
    ];
    for fmt in FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(without_zulu, fmt) {
            return Ok(dt);
        }
    }

    parse_date_only(without_zulu)
        .ok_or_else(invalid)
        .and_then(|date| midnight(date, dt_str))
}

/// Format as ISO 8601 with milliseconds and a trailing `Z`, e.g. `2015-03-24T10:16:45.034Z`.
pub fn format_iso_millis(dt: &NaiveDateTime) -> String {
    dt.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

/// Format as RFC 3339 in UTC without fractional seconds, e.g. `2019-10-01T00:00:00Z`.
pub fn format_rfc3339(dt: &NaiveDateTime) -> String {
    dt.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// Format as a compact date, e.g. `20191001`.
pub fn format_compact_date(dt: &NaiveDateTime) -> String {
    dt.format("%Y%m%d").to_string()
}

/// Check that `start` is not after `end`.
pub fn check_time_range(start: NaiveDateTime, end: NaiveDateTime) -> Result<(), WatObsErr> {
    if start > end {
        Err(WatObsErr::InvalidTimeRange { start, end })
    } else {
        Ok(())
    }
}

/// The current time in UTC.
pub fn now() -> NaiveDateTime {
    Utc::now().naive_utc()
}

/// Convert milliseconds since the unix epoch.
pub fn from_epoch_millis(millis: i64) -> Option<NaiveDateTime> {
    let secs = millis.div_euclid(1000);
    let nanos = (millis.rem_euclid(1000) * 1_000_000) as u32;
    NaiveDateTime::from_timestamp_opt(secs, nanos)
}

// Dates without a time: YYYY, YYYYMMDD, YYYY-MM, YYYY-M-D and MM/DD/YYYY.
fn parse_date_only(date_str: &str) -> Option<NaiveDate> {
    let all_digits = date_str.chars().all(|c| c.is_ascii_digit());

    if all_digits && date_str.len() == 4 {
        let year = date_str.parse().ok()?;
        return NaiveDate::from_ymd_opt(year, 1, 1);
    }

    if all_digits && date_str.len() == 8 {
        let year = date_str[0..4].parse().ok()?;
        let month = date_str[4..6].parse().ok()?;
        let day = date_str[6..8].parse().ok()?;
        return NaiveDate::from_ymd_opt(year, month, day);
    }

    let parts: Vec<&str> = date_str.split('-').collect();
    if parts.iter().all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit())) {
        match parts.as_slice() {
            [year, month] if year.len() == 4 => {
                return NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, 1);
            }
            [year, month, day] if year.len() == 4 => {
                return NaiveDate::from_ymd_opt(
                    year.parse().ok()?,
                    month.parse().ok()?,
                    day.parse().ok()?,
                );
            }
            _ => {}
        }
    }

    NaiveDate::parse_from_str(date_str, "%m/%d/%Y").ok()
}

fn midnight(date: NaiveDate, original: &str) -> Result<NaiveDateTime, WatObsErr> {
    date.and_hms_opt(0, 0, 0)
        .ok_or_else(|| WatObsErr::InvalidDateTime(original.to_owned()))
}

#[cfg(test)]
mod unit {
    use super::*;

    fn ymd_hms(y: i32, m: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, mi, s)
            .unwrap()
    }

    #[test]
    fn test_parse_datetime_valid() {
        let dt = parse_datetime("2023-05-15T14:30:00").unwrap();
        assert_eq!(format_iso_millis(&dt), "2023-05-15T14:30:00.000Z");
    }

    #[test]
    fn test_parse_datetime_invalid() {
        assert!(parse_datetime("2023-50-50").is_err());
        assert!(parse_datetime("").is_err());
        assert!(parse_datetime("yesterday").is_err());
    }

    #[test]
    fn test_parse_datetime_other_format() {
        let dt = parse_datetime("05/15/2023 14:30:00").unwrap();
        assert_eq!(format_iso_millis(&dt), "2023-05-15T14:30:00.000Z");
    }

    #[test]
    fn test_parse_datetime_with_offset() {
        let dt = parse_datetime("2015-03-24T12:16:45.034+02:00").unwrap();
        assert_eq!(format_iso_millis(&dt), "2015-03-24T10:16:45.034Z");

        let dt = parse_datetime("2015-03-24T10:16:45.034Z").unwrap();
        assert_eq!(format_iso_millis(&dt), "2015-03-24T10:16:45.034Z");
    }

    #[test]
    fn test_parse_date_only_forms() {
        let oct_first = ymd_hms(2019, 10, 1, 0, 0, 0);

        assert_eq!(parse_datetime("2019-10-1").unwrap(), oct_first);
        assert_eq!(parse_datetime("2019-10-01").unwrap(), oct_first);
        assert_eq!(parse_datetime("20191001").unwrap(), oct_first);
        assert_eq!(parse_datetime("2019-10").unwrap(), oct_first);
        assert_eq!(parse_datetime("2021").unwrap(), ymd_hms(2021, 1, 1, 0, 0, 0));
    }

    #[test]
    fn test_space_separated_with_millis() {
        let dt = parse_datetime("2021-01-04 15:30:45.051").unwrap();
        assert_eq!(format_iso_millis(&dt), "2021-01-04T15:30:45.051Z");
    }

    #[test]
    fn test_to_datetime_impls() {
        let expected = ymd_hms(2023, 5, 15, 0, 0, 0);

        assert_eq!("2023-05-15".to_datetime().unwrap(), expected);
        assert_eq!("2023-05-15".to_owned().to_datetime().unwrap(), expected);
        assert_eq!(expected.to_datetime().unwrap(), expected);
        assert_eq!(expected.date().to_datetime().unwrap(), expected);
    }

    #[test]
    fn test_compact_and_rfc3339() {
        let dt = ymd_hms(2019, 11, 1, 6, 0, 0);
        assert_eq!(format_compact_date(&dt), "20191101");
        assert_eq!(format_rfc3339(&dt), "2019-11-01T06:00:00Z");
    }

    #[test]
    fn test_check_time_range() {
        let early = ymd_hms(2019, 10, 1, 0, 0, 0);
        let late = ymd_hms(2019, 11, 1, 0, 0, 0);

        assert!(check_time_range(early, late).is_ok());
        assert!(check_time_range(early, early).is_ok());
        match check_time_range(late, early) {
            Err(WatObsErr::InvalidTimeRange { start, end }) => {
                assert_eq!(start, late);
                assert_eq!(end, early);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_from_epoch_millis() {
        let dt = from_epoch_millis(1679332722000).unwrap();
        assert_eq!(format_iso_millis(&dt), "2023-03-20T17:18:42.000Z");
    }
}
