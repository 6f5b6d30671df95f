//! Date helpers used by `timeFromStr`, `timeToStr` and `relativeTime`
//!
//! Compact formats use single-letter tokens: `Y` four-digit year, `y`
//! two-digit year, `m` month, `d` day, `H` hour, `M` minute, `S` second.
//! Every other character is matched literally.

use chrono::{
    DateTime, Datelike, Duration, FixedOffset, Local, NaiveDate, NaiveDateTime, TimeZone,
};
use regex::Regex;
use std::sync::OnceLock;

struct CompactFormat {
    pattern: String,
    has_year: bool,
    has_month: bool,
    has_day: bool,
    has_hour: bool,
    has_minute: bool,
}

fn translate(format: &str) -> CompactFormat {
    let mut compact = CompactFormat {
        pattern: String::with_capacity(format.len() * 2),
        has_year: false,
        has_month: false,
        has_day: false,
        has_hour: false,
        has_minute: false,
    };

    for c in format.chars() {
        match c {
            'Y' => {
                compact.pattern.push_str("%Y");
                compact.has_year = true;
            }
            'y' => {
                compact.pattern.push_str("%y");
                compact.has_year = true;
            }
            'm' => {
                compact.pattern.push_str("%m");
                compact.has_month = true;
            }
            'd' => {
                compact.pattern.push_str("%d");
                compact.has_day = true;
            }
            'H' => {
                compact.pattern.push_str("%H");
                compact.has_hour = true;
            }
            'M' => {
                compact.pattern.push_str("%M");
                compact.has_minute = true;
            }
            'S' => compact.pattern.push_str("%S"),
            '%' => compact.pattern.push_str("%%"),
            other => compact.pattern.push(other),
        }
    }
    compact
}

fn to_local(naive: NaiveDateTime) -> Option<DateTime<FixedOffset>> {
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.fixed_offset())
}

/// Parses `input` with a compact format in the local time zone
///
/// Date parts missing from the format default to today's date; missing time
/// parts default to zero.
pub fn parse_compact_time(format: &str, input: &str) -> Option<DateTime<FixedOffset>> {
    let compact = translate(format);
    let today = Local::now().date_naive();

    let mut pattern = compact.pattern;
    let mut value = input.to_string();

    if !compact.has_year {
        pattern = format!("%Y {}", pattern);
        value = format!("{} {}", today.year(), value);
    }
    if !compact.has_month {
        pattern = format!("%m {}", pattern);
        value = format!("{} {}", today.month(), value);
    }
    if !compact.has_day {
        pattern = format!("%d {}", pattern);
        value = format!("{} {}", today.day(), value);
    }
    if !compact.has_hour {
        pattern.push_str(" %H");
        value.push_str(" 0");
    }
    if !compact.has_minute {
        pattern.push_str(" %M");
        value.push_str(" 0");
    }

    NaiveDateTime::parse_from_str(&value, &pattern)
        .ok()
        .and_then(to_local)
}

/// Formats a timestamp with a named layout or a compact format
///
/// Named layouts: `RFC3339` and `RFC2822` (also spelled `RFC1123Z`, `RFC1123`,
/// `RFC822Z` or `RFC822`).
pub fn format_time(format: &str, time: &DateTime<FixedOffset>) -> String {
    match format {
        "RFC3339" => time.to_rfc3339(),
        "RFC2822" | "RFC1123Z" | "RFC1123" | "RFC822Z" | "RFC822" => time.to_rfc2822(),
        other => time.format(&translate(other).pattern).to_string(),
    }
}

/// Parses a timestamp in one of the common layouts
///
/// Tries RFC 3339, RFC 2822, then `Y-m-d H:M:S`, `Y-m-dTH:M:S`, `Y-m-d H:M`
/// and `Y-m-d` in the local time zone.
pub fn parse_timestamp(input: &str) -> Option<DateTime<FixedOffset>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Some(dt);
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(input) {
        return Some(dt);
    }
    for layout in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(input, layout) {
            return to_local(naive);
        }
    }
    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .and_then(to_local)
}

fn english_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"(?i)^(\d+)\s*(seconds?|secs?|minutes?|mins?|hours?|hrs?|days?|weeks?|months?|years?)\s+ago$",
        )
        .expect("static regex")
    })
}

fn chinese_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(\d+)\s*(秒钟?|分钟|小时|天|周|个月|月|年)前$").expect("static regex")
    })
}

fn unit_duration(unit: &str, n: i64) -> Option<Duration> {
    let unit = unit.to_lowercase();
    let d = if unit.starts_with("sec") || unit.starts_with('秒') {
        Duration::seconds(n)
    } else if unit.starts_with("min") || unit == "分钟" {
        Duration::minutes(n)
    } else if unit.starts_with("h") || unit == "小时" {
        Duration::hours(n)
    } else if unit.starts_with("day") || unit == "天" {
        Duration::days(n)
    } else if unit.starts_with("week") || unit == "周" {
        Duration::weeks(n)
    } else if unit.starts_with("month") || unit == "个月" || unit == "月" {
        Duration::days(30 * n)
    } else if unit.starts_with("year") || unit == "年" {
        Duration::days(365 * n)
    } else {
        return None;
    };
    Some(d)
}

/// Parses a relative phrase such as `3 hours ago` or `5分钟前` against `now`
pub fn parse_relative_time(
    input: &str,
    now: DateTime<FixedOffset>,
) -> Option<DateTime<FixedOffset>> {
    let phrase = input.trim();
    match phrase.to_lowercase().as_str() {
        "just now" | "now" | "today" | "刚刚" | "今天" => return Some(now),
        "yesterday" | "昨天" => return Some(now - Duration::days(1)),
        "前天" => return Some(now - Duration::days(2)),
        _ => {}
    }

    let caps = english_pattern()
        .captures(phrase)
        .or_else(|| chinese_pattern().captures(phrase))?;
    let n: i64 = caps.get(1)?.as_str().parse().ok()?;
    let unit = caps.get(2)?.as_str();
    unit_duration(unit, n).map(|d| now - d)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    fn fixed_now() -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339("2023-06-15T12:00:00+08:00").unwrap()
    }

    #[test]
    fn test_compact_parse_single_digit_parts() {
        let ts = parse_compact_time("Y-m-d H:M", "2021-11-1 4:20").unwrap();
        assert_eq!(ts.year(), 2021);
        assert_eq!(ts.month(), 11);
        assert_eq!(ts.day(), 1);
        assert_eq!(ts.hour(), 4);
        assert_eq!(ts.minute(), 20);
    }

    #[test]
    fn test_compact_parse_date_only() {
        let ts = parse_compact_time("Y/m/d", "2020/02/29").unwrap();
        assert_eq!((ts.month(), ts.day(), ts.hour()), (2, 29, 0));
    }

    #[test]
    fn test_compact_parse_missing_year_uses_current() {
        let ts = parse_compact_time("m-d", "03-04").unwrap();
        assert_eq!(ts.year(), Local::now().year());
        assert_eq!((ts.month(), ts.day()), (3, 4));
    }

    #[test]
    fn test_compact_parse_rejects_garbage() {
        assert!(parse_compact_time("Y-m-d", "not a date").is_none());
    }

    #[test]
    fn test_format_named_layouts() {
        let ts = fixed_now();
        assert_eq!(format_time("RFC3339", &ts), "2023-06-15T12:00:00+08:00");
        assert_eq!(format_time("RFC1123Z", &ts), "Thu, 15 Jun 2023 12:00:00 +0800");
        assert_eq!(format_time("Y.m.d", &ts), "2023.06.15");
    }

    #[test]
    fn test_parse_timestamp_layouts() {
        assert!(parse_timestamp("2023-06-15T12:00:00+08:00").is_some());
        assert!(parse_timestamp("Thu, 15 Jun 2023 12:00:00 +0800").is_some());
        assert!(parse_timestamp("2023-06-15 12:00:00").is_some());
        assert!(parse_timestamp("2023-06-15 12:00").is_some());
        assert!(parse_timestamp("2023-06-15").is_some());
        assert!(parse_timestamp("last tuesday").is_none());
    }

    #[test]
    fn test_relative_english() {
        let now = fixed_now();
        assert_eq!(
            parse_relative_time("3 hours ago", now),
            Some(now - Duration::hours(3))
        );
        assert_eq!(
            parse_relative_time("1 Day ago", now),
            Some(now - Duration::days(1))
        );
        assert_eq!(
            parse_relative_time("10 mins ago", now),
            Some(now - Duration::minutes(10))
        );
        assert_eq!(parse_relative_time("just now", now), Some(now));
        assert_eq!(
            parse_relative_time("yesterday", now),
            Some(now - Duration::days(1))
        );
    }

    #[test]
    fn test_relative_chinese() {
        let now = fixed_now();
        assert_eq!(
            parse_relative_time("5分钟前", now),
            Some(now - Duration::minutes(5))
        );
        assert_eq!(
            parse_relative_time("2 天前", now),
            Some(now - Duration::days(2))
        );
        assert_eq!(parse_relative_time("刚刚", now), Some(now));
    }

    #[test]
    fn test_relative_unknown_phrase() {
        assert!(parse_relative_time("sometime", fixed_now()).is_none());
    }
}
