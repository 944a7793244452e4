//! `Date` header parsing.

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};

/// Formats tried after RFC 2822 and RFC 3339 fail, zone offset included.
const ZONED_FORMATS: &[&str] = &[
    "%d %b %Y %H:%M:%S %z",
    "%a, %d %b %Y %H:%M %z",
    "%d %b %Y %H:%M %z",
    "%a, %d %b %y %H:%M:%S %z",
    "%d %b %y %H:%M:%S %z",
    "%a %d %b %Y %H:%M:%S %z",
    "%Y-%m-%d %H:%M:%S %z",
];

/// Formats for values without zone, read as UTC.
const NAIVE_FORMATS: &[&str] = &[
    "%a, %d %b %Y %H:%M:%S",
    "%d %b %Y %H:%M:%S",
    "%a, %d %b %Y %H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
];

/// Parses a `Date` header. Returns `None` if no strategy succeeds.
pub fn parse(value: &str) -> Option<DateTime<FixedOffset>> {
    let value = value.trim();
    DateTime::parse_from_rfc2822(value)
        .or_else(|_| DateTime::parse_from_rfc3339(value))
        .ok()
        .or_else(|| parse_lenient(value))
}

fn parse_lenient(value: &str) -> Option<DateTime<FixedOffset>> {
    let cleaned = normalize(value);

    if let Some(parsed) = ZONED_FORMATS
        .iter()
        .find_map(|format| DateTime::parse_from_str(&cleaned, format).ok())
    {
        return Some(parsed);
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(&cleaned, format).ok())
        .map(|naive| Utc.from_utc_datetime(&naive).fixed_offset())
}

/// Drops comments, collapses whitespace and replaces a trailing zone name.
fn normalize(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut depth = 0usize;
    for c in value.chars() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            _ if depth == 0 => out.push(c),
            _ => {}
        }
    }

    let mut words: Vec<&str> = out.split_whitespace().collect();
    if let Some(last) = words.last().copied()
        && last.chars().all(|c| c.is_ascii_alphabetic())
    {
        words.pop();
        if matches!(last.to_ascii_uppercase().as_str(), "GMT" | "UT" | "UTC" | "Z") {
            words.push("+0000");
        }
    }
    words.join(" ")
}

/// Formats a zone offset as `UTC`, `UTC+2.0` or `UTC-5.5`.
pub fn timezone_label(offset: FixedOffset) -> String {
    let seconds = offset.local_minus_utc();
    if seconds == 0 {
        return "UTC".to_string();
    }
    let sign = if seconds < 0 { '-' } else { '+' };
    format!("UTC{sign}{:.1}", f64::from(seconds.abs()) / 3600.0)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{Datelike, Timelike};

    use super::*;

    #[test]
    fn test_rfc2822() {
        let date = parse("Tue, 1 Jul 2003 10:52:37 +0200").unwrap();
        assert_eq!((date.year(), date.month(), date.day()), (2003, 7, 1));
        assert_eq!(timezone_label(*date.offset()), "UTC+2.0");
    }

    #[test]
    fn test_rfc3339() {
        let date = parse("2024-03-05T08:00:00-05:30").unwrap();
        assert_eq!(date.hour(), 8);
        assert_eq!(timezone_label(*date.offset()), "UTC-5.5");
    }

    #[test]
    fn test_lenient_variants() {
        let no_weekday = parse("5 Mar 2024 08:00:00 +0000").unwrap();
        assert_eq!(no_weekday.day(), 5);

        let no_seconds = parse("Tue, 5 Mar 2024 08:00 +0100").unwrap();
        assert_eq!(no_seconds.minute(), 0);

        let zone_name = parse("Tue, 5 Mar 2024 08:00:00 GMT (Greenwich)").unwrap();
        assert_eq!(timezone_label(*zone_name.offset()), "UTC");

        let naive = parse("2024-03-05 08:00:00").unwrap();
        assert_eq!(naive.offset().local_minus_utc(), 0);
    }

    #[test]
    fn test_garbage_is_none() {
        assert!(parse("sometime last week").is_none());
        assert!(parse("").is_none());
    }
}
