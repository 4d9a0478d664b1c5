//! SCORM time serializations.
//!
//! SCORM 1.2 reports elapsed time as `HHHH:MM:SS.ss` (hours may exceed four
//! digits); SCORM 2004 reports an ISO-8601 duration (`PT1H30M5S`). Both are
//! converted to and from a canonical whole-seconds form. Parsers never panic:
//! a malformed string yields `None` and callers decide how to surface it.

use crate::core::ScormVersion;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref ISO8601_DURATION: Regex = Regex::new(
        r"(?x)^P
          (?:(\d+(?:\.\d+)?)Y)?
          (?:(\d+(?:\.\d+)?)M)?
          (?:(\d+(?:\.\d+)?)D)?
          (?:T
            (?:(\d+(?:\.\d+)?)H)?
            (?:(\d+(?:\.\d+)?)M)?
            (?:(\d+(?:\.\d+)?)S)?
          )?$"
    )
    .unwrap();
}

// Calendar units in a duration are interpreted with the fixed factors most
// LMS implementations use: a day is 86400s, a month 30 days, a year 365 days.
const SECONDS_PER_DAY: f64 = 86_400.0;
const SECONDS_PER_MONTH: f64 = 30.0 * SECONDS_PER_DAY;
const SECONDS_PER_YEAR: f64 = 365.0 * SECONDS_PER_DAY;

/// Parse a SCORM 1.2 `HHHH:MM:SS.ss` string into canonical seconds.
///
/// The hours field may be any width. Fractional seconds are rounded to the
/// nearest whole second. Returns `None` for anything non-numeric or with the
/// wrong number of segments.
pub fn parse_hhmmss(text: &str) -> Option<u64> {
    let mut parts = text.split(':');
    let hours: u64 = parts.next()?.parse().ok()?;
    let minutes: u64 = parts.next()?.parse().ok()?;
    let seconds_part = parts.next()?;
    if parts.next().is_some() {
        return None;
    }

    let (whole, frac) = match seconds_part.split_once('.') {
        Some((whole, frac)) => (whole, Some(frac)),
        None => (seconds_part, None),
    };
    let mut seconds: u64 = whole.parse().ok()?;
    if minutes > 59 || seconds > 59 {
        return None;
    }
    if let Some(frac) = frac {
        if frac.is_empty() || !frac.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        let fraction: f64 = format!("0.{frac}").parse().ok()?;
        if fraction >= 0.5 {
            seconds += 1;
        }
    }

    // An absurd hours field is still a malformed duration, not a panic.
    hours
        .checked_mul(3600)
        .and_then(|h| h.checked_add(minutes * 60 + seconds))
}

/// Format canonical seconds as a SCORM 1.2 time string.
///
/// Hours are zero-padded to four digits but grow wider when needed, so the
/// result always parses back to the same duration.
pub fn format_hhmmss(total_seconds: u64) -> String {
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    format!("{hours:04}:{minutes:02}:{seconds:02}.00")
}

/// Parse an ISO-8601 duration into canonical seconds.
///
/// Permissive: every unit is optional and defaults to zero, fractional values
/// are accepted anywhere. A string with no recognizable unit (including a
/// bare `P`) is rejected.
pub fn parse_iso8601(text: &str) -> Option<u64> {
    let captures = ISO8601_DURATION.captures(text)?;

    let unit = |index: usize| -> Option<f64> {
        captures
            .get(index)
            .map(|m| m.as_str().parse::<f64>().unwrap_or(0.0))
    };

    let units = [
        unit(1).map(|v| v * SECONDS_PER_YEAR),
        unit(2).map(|v| v * SECONDS_PER_MONTH),
        unit(3).map(|v| v * SECONDS_PER_DAY),
        unit(4).map(|v| v * 3600.0),
        unit(5).map(|v| v * 60.0),
        unit(6),
    ];
    if units.iter().all(Option::is_none) {
        return None;
    }

    let total: f64 = units.into_iter().flatten().sum();
    Some(total.round() as u64)
}

/// Format canonical seconds as an ISO-8601 duration (`PT…`), using only
/// hour/minute/second units so the value round-trips exactly.
pub fn format_iso8601(total_seconds: u64) -> String {
    if total_seconds == 0 {
        return "PT0S".to_string();
    }
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    let mut out = String::from("PT");
    if hours > 0 {
        out.push_str(&format!("{hours}H"));
    }
    if minutes > 0 {
        out.push_str(&format!("{minutes}M"));
    }
    if seconds > 0 {
        out.push_str(&format!("{seconds}S"));
    }
    out
}

/// Parse a time string in whichever serialization the given version uses.
pub fn parse_for(version: ScormVersion, text: &str) -> Option<u64> {
    match version {
        ScormVersion::V1_2 => parse_hhmmss(text),
        ScormVersion::V2004 => parse_iso8601(text),
    }
}

/// Format canonical seconds in whichever serialization the given version
/// expects, so a resumed session reads back a value consistent with what it
/// would have written.
pub fn format_for(version: ScormVersion, total_seconds: u64) -> String {
    match version {
        ScormVersion::V1_2 => format_hhmmss(total_seconds),
        ScormVersion::V2004 => format_iso8601(total_seconds),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_basic_hhmmss() {
        assert_eq!(parse_hhmmss("0000:04:30.00"), Some(270));
        assert_eq!(parse_hhmmss("0001:00:00"), Some(3600));
        assert_eq!(parse_hhmmss("12345:00:01"), Some(12345 * 3600 + 1));
    }

    #[test]
    fn rounds_fractional_seconds() {
        assert_eq!(parse_hhmmss("0000:00:01.49"), Some(1));
        assert_eq!(parse_hhmmss("0000:00:01.5"), Some(2));
    }

    #[test]
    fn rejects_malformed_hhmmss() {
        assert_eq!(parse_hhmmss(""), None);
        assert_eq!(parse_hhmmss("abc"), None);
        assert_eq!(parse_hhmmss("00:00"), None);
        assert_eq!(parse_hhmmss("00:00:00:00"), None);
        assert_eq!(parse_hhmmss("00:99:00"), None);
        assert_eq!(parse_hhmmss("00:00:7x"), None);
        assert_eq!(parse_hhmmss("00:00:01."), None);
    }

    #[test]
    fn rejects_hours_beyond_the_seconds_range() {
        assert_eq!(parse_hhmmss("18446744073709551615:00:00"), None);
        assert_eq!(parse_hhmmss("9999999999999999999:30:30"), None);
    }

    #[test]
    fn hhmmss_round_trips() {
        for seconds in [0, 1, 59, 60, 3599, 3600, 86_400, 500_000] {
            assert_eq!(parse_hhmmss(&format_hhmmss(seconds)), Some(seconds));
        }
    }

    #[test]
    fn parses_iso_durations() {
        assert_eq!(parse_iso8601("PT0S"), Some(0));
        assert_eq!(parse_iso8601("PT1H30M5S"), Some(5405));
        assert_eq!(parse_iso8601("PT90M"), Some(5400));
        assert_eq!(parse_iso8601("P1DT1H"), Some(90_000));
        assert_eq!(parse_iso8601("PT1.5S"), Some(2));
    }

    #[test]
    fn rejects_malformed_iso_durations() {
        assert_eq!(parse_iso8601(""), None);
        assert_eq!(parse_iso8601("P"), None);
        assert_eq!(parse_iso8601("PT"), None);
        assert_eq!(parse_iso8601("1H30M"), None);
        assert_eq!(parse_iso8601("PTxS"), None);
    }

    #[test]
    fn iso_round_trips() {
        for seconds in [0, 1, 59, 61, 3600, 5405, 86_400, 500_000] {
            assert_eq!(parse_iso8601(&format_iso8601(seconds)), Some(seconds));
        }
    }

    #[test]
    fn version_dispatch_uses_the_right_codec() {
        assert_eq!(parse_for(ScormVersion::V1_2, "0000:05:00.00"), Some(300));
        assert_eq!(parse_for(ScormVersion::V2004, "PT5M"), Some(300));
        assert_eq!(format_for(ScormVersion::V1_2, 300), "0000:05:00.00");
        assert_eq!(format_for(ScormVersion::V2004, 300), "PT5M");
    }
}
