//! Built-in conversion rules.
//!
//! Every rule returns `None` when the input is not a literal of its type;
//! none of them raise errors.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use std::time::Duration;

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d-%m-%Y"];

const DATE_TIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

const TIME_FORMATS: &[&str] = &["%H:%M:%S%.f", "%H:%M", "%H%M%S"];

/// Parse a duration literal such as `250ms`, `30s`, `5m`, `1h30m`, `2d` or `1w`.
///
/// A bare number is taken as milliseconds.
pub fn parse_duration(input: &str) -> Option<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }
    if let Ok(millis) = input.parse::<u64>() {
        return Some(Duration::from_millis(millis));
    }

    let mut total = Duration::ZERO;
    let mut rest = input;
    while !rest.is_empty() {
        let digits = rest.find(|c: char| !c.is_ascii_digit())?;
        if digits == 0 {
            return None;
        }
        let amount: u64 = rest[..digits].parse().ok()?;
        rest = &rest[digits..];

        let unit_len = rest.find(|c: char| c.is_ascii_digit()).unwrap_or(rest.len());
        let unit = &rest[..unit_len];
        rest = rest[unit_len..].trim_start();

        let seconds_per_unit = match unit.trim() {
            "ms" => {
                total = total.checked_add(Duration::from_millis(amount))?;
                continue;
            }
            "s" | "sec" | "secs" => 1,
            "m" | "min" | "mins" => 60,
            "h" | "hr" | "hrs" => 3_600,
            "d" | "day" | "days" => 86_400,
            "w" | "week" | "weeks" => 604_800,
            _ => return None,
        };
        total = total.checked_add(Duration::from_secs(amount.checked_mul(seconds_per_unit)?))?;
    }

    Some(total)
}

/// Period rule: duration literals as a `chrono::TimeDelta`.
pub fn parse_period(input: &str) -> Option<TimeDelta> {
    parse_duration(input).and_then(|d| TimeDelta::from_std(d).ok())
}

/// Date rule: ISO `2024-05-01` and a few common variants.
pub fn parse_date(input: &str) -> Option<NaiveDate> {
    let input = input.trim();
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(input, format).ok())
}

/// Date-time rule: ISO `2024-05-01T10:30:00` (optionally with fractional seconds).
pub fn parse_date_time(input: &str) -> Option<NaiveDateTime> {
    let input = input.trim();
    DATE_TIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(input, format).ok())
}

/// Time-of-day rule: `10:30:00`, `10:30` or `103000`.
pub fn parse_time(input: &str) -> Option<NaiveTime> {
    let input = input.trim();
    TIME_FORMATS
        .iter()
        .find_map(|format| NaiveTime::parse_from_str(input, format).ok())
}

/// Lenient boolean parsing used by the generic coercion.
pub fn parse_bool(input: &str) -> Option<bool> {
    match input.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration_units() {
        assert_eq!(parse_duration("5m"), Some(Duration::from_secs(300)));
        assert_eq!(parse_duration("30s"), Some(Duration::from_secs(30)));
        assert_eq!(parse_duration("250ms"), Some(Duration::from_millis(250)));
        assert_eq!(parse_duration("2d"), Some(Duration::from_secs(172_800)));
        assert_eq!(parse_duration("1w"), Some(Duration::from_secs(604_800)));
        assert_eq!(parse_duration("1500"), Some(Duration::from_millis(1500)));
    }

    #[test]
    fn test_parse_duration_compound() {
        assert_eq!(parse_duration("1h30m"), Some(Duration::from_secs(5_400)));
        assert_eq!(parse_duration("1h 30m"), Some(Duration::from_secs(5_400)));
        assert_eq!(parse_duration("1m500ms"), Some(Duration::from_millis(60_500)));
    }

    #[test]
    fn test_parse_duration_no_match() {
        assert_eq!(parse_duration(""), None);
        assert_eq!(parse_duration("soon"), None);
        assert_eq!(parse_duration("5 parsecs"), None);
        assert_eq!(parse_duration("m5"), None);
        assert_eq!(parse_duration("5"), Some(Duration::from_millis(5)));
    }

    #[test]
    fn test_parse_period() {
        assert_eq!(parse_period("5m"), Some(TimeDelta::minutes(5)));
        assert_eq!(parse_period("nope"), None);
    }

    #[test]
    fn test_parse_date() {
        let expected = NaiveDate::from_ymd_opt(2024, 5, 1);
        assert_eq!(parse_date("2024-05-01"), expected);
        assert_eq!(parse_date("2024/05/01"), expected);
        assert_eq!(parse_date("01-05-2024"), expected);
        assert_eq!(parse_date("yesterday"), None);
        assert_eq!(parse_date("2024-13-01"), None);
    }

    #[test]
    fn test_parse_date_time() {
        let expected = NaiveDate::from_ymd_opt(2024, 5, 1).and_then(|d| d.and_hms_opt(10, 30, 0));
        assert_eq!(parse_date_time("2024-05-01T10:30:00"), expected);
        assert_eq!(parse_date_time("2024-05-01 10:30:00"), expected);
        assert_eq!(parse_date_time("2024-05-01T10:30"), expected);
        assert_eq!(parse_date_time("2024-05-01"), None);
    }

    #[test]
    fn test_parse_time() {
        assert_eq!(parse_time("10:30:00"), NaiveTime::from_hms_opt(10, 30, 0));
        assert_eq!(parse_time("10:30"), NaiveTime::from_hms_opt(10, 30, 0));
        assert_eq!(parse_time("25:00"), None);
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }
}
