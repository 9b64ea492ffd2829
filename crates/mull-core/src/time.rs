//! Millisecond-precision UTC date/time utilities (no chrono dependency).
//!
//! Uses Howard Hinnant's civil_from_days / days_from_civil algorithms for
//! Unix-to-date conversion and back. Timestamps persist as ISO-8601 strings;
//! the serde helper modules at the bottom do the field-level bridging.

use std::time::{SystemTime, UNIX_EPOCH};

/// A moment in time as Unix milliseconds.
pub type UnixMs = u64;

/// Current UTC time as Unix milliseconds.
pub fn now_unix_ms() -> UnixMs {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Convert Unix milliseconds to an ISO-8601 UTC string with a `.mmm` fraction.
pub fn unix_ms_to_iso8601(ms: UnixMs) -> String {
    let secs = ms / 1000;
    let millis = ms % 1000;
    let days = (secs / 86400) as i64;
    let time_of_day = secs % 86400;
    let hours = time_of_day / 3600;
    let minutes = (time_of_day % 3600) / 60;
    let seconds = time_of_day % 60;

    let (y, m, d) = civil_from_days(days);
    format!("{y:04}-{m:02}-{d:02}T{hours:02}:{minutes:02}:{seconds:02}.{millis:03}Z")
}

/// Parse an ISO-8601 UTC string back to Unix milliseconds.
///
/// Accepts both second precision (`...:07Z`) and fractional-second
/// precision (`...:07.250Z`). Returns `None` for anything malformed,
/// out of range, or before the Unix epoch.
pub fn iso8601_to_unix_ms(s: &str) -> Option<UnixMs> {
    let s = s.strip_suffix('Z')?;
    let (date, time) = s.split_once('T')?;

    let mut parts = date.split('-');
    let y: i64 = parts.next()?.parse().ok()?;
    let m: u64 = parts.next()?.parse().ok()?;
    let d: u64 = parts.next()?.parse().ok()?;
    // Four-digit years only. This also bounds every multiplication below:
    // year 9999 is ~2.9M epoch days, well inside u64 millisecond range.
    if parts.next().is_some()
        || !(0..=9999).contains(&y)
        || !(1..=12).contains(&m)
        || !(1..=31).contains(&d)
    {
        return None;
    }

    let (hms, frac) = match time.split_once('.') {
        Some((hms, frac)) => (hms, frac),
        None => (time, ""),
    };
    let mut parts = hms.split(':');
    let h: u64 = parts.next()?.parse().ok()?;
    let mi: u64 = parts.next()?.parse().ok()?;
    let sec: u64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() || h > 23 || mi > 59 || sec > 59 {
        return None;
    }

    let millis = if frac.is_empty() {
        0
    } else {
        if frac.len() > 9 || !frac.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        // Truncate to millisecond precision, right-padding short fractions.
        let mut padded = frac.to_string();
        while padded.len() < 3 {
            padded.push('0');
        }
        padded[..3].parse::<u64>().ok()?
    };

    let days = days_from_civil(y, m, d);
    if days < 0 {
        return None;
    }
    let secs = (days as u64) * 86400 + h * 3600 + mi * 60 + sec;
    Some(secs * 1000 + millis)
}

/// Howard Hinnant's civil_from_days: Unix epoch days → (year, month, day).
fn civil_from_days(days: i64) -> (i64, u64, u64) {
    let z = days + 719468;
    let era = if z >= 0 { z } else { z - 146096 } / 146097;
    let doe = (z - era * 146097) as u64;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
    let y = yoe as i64 + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = if mp < 10 { mp + 3 } else { mp - 9 };
    let y = if m <= 2 { y + 1 } else { y };
    (y, m, d)
}

/// Inverse of `civil_from_days`: (year, month, day) → Unix epoch days.
fn days_from_civil(y: i64, m: u64, d: u64) -> i64 {
    let y = if m <= 2 { y - 1 } else { y };
    let era = if y >= 0 { y } else { y - 399 } / 400;
    let yoe = (y - era * 400) as u64;
    let mp = if m > 2 { m - 3 } else { m + 9 };
    let doy = (153 * mp + 2) / 5 + d - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146097 + doe as i64 - 719468
}

/// Serde bridge: `UnixMs` field ↔ ISO-8601 string.
pub mod serde_iso {
    use serde::{Deserialize, Deserializer, Serializer, de};

    use super::{UnixMs, iso8601_to_unix_ms, unix_ms_to_iso8601};

    pub fn serialize<S: Serializer>(ms: &UnixMs, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&unix_ms_to_iso8601(*ms))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<UnixMs, D::Error> {
        let s = String::deserialize(deserializer)?;
        iso8601_to_unix_ms(&s)
            .ok_or_else(|| de::Error::custom(format!("invalid ISO-8601 timestamp: {s}")))
    }
}

/// Serde bridge: `Option<UnixMs>` field ↔ nullable ISO-8601 string.
pub mod serde_iso_opt {
    use serde::{Deserialize, Deserializer, Serializer, de};

    use super::{UnixMs, iso8601_to_unix_ms, unix_ms_to_iso8601};

    pub fn serialize<S: Serializer>(
        ms: &Option<UnixMs>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match ms {
            Some(ms) => serializer.serialize_some(&unix_ms_to_iso8601(*ms)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<UnixMs>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            Some(s) => iso8601_to_unix_ms(&s)
                .map(Some)
                .ok_or_else(|| de::Error::custom(format!("invalid ISO-8601 timestamp: {s}"))),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unix_epoch() {
        assert_eq!(unix_ms_to_iso8601(0), "1970-01-01T00:00:00.000Z");
    }

    #[test]
    fn test_known_date() {
        // 2026-02-21T00:00:00Z = 1771632000
        assert_eq!(unix_ms_to_iso8601(1771632000_000), "2026-02-21T00:00:00.000Z");
    }

    #[test]
    fn test_millis_rendered() {
        assert_eq!(unix_ms_to_iso8601(1771632000_250), "2026-02-21T00:00:00.250Z");
    }

    #[test]
    fn test_roundtrip_ms() {
        for ms in [0u64, 1_234, 1771632000_999, 4102444799_001] {
            let iso = unix_ms_to_iso8601(ms);
            assert_eq!(iso8601_to_unix_ms(&iso), Some(ms), "roundtrip of {iso}");
        }
    }

    #[test]
    fn test_parse_second_precision() {
        assert_eq!(iso8601_to_unix_ms("1970-01-01T00:00:01Z"), Some(1000));
        assert_eq!(
            iso8601_to_unix_ms("2026-02-21T00:00:00Z"),
            Some(1771632000_000)
        );
    }

    #[test]
    fn test_parse_short_fraction_pads() {
        assert_eq!(iso8601_to_unix_ms("1970-01-01T00:00:00.2Z"), Some(200));
    }

    #[test]
    fn test_parse_long_fraction_truncates() {
        assert_eq!(iso8601_to_unix_ms("1970-01-01T00:00:00.123456Z"), Some(123));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(iso8601_to_unix_ms(""), None);
        assert_eq!(iso8601_to_unix_ms("not-a-date"), None);
        assert_eq!(iso8601_to_unix_ms("2026-02-21T00:00:00"), None); // no Z
        assert_eq!(iso8601_to_unix_ms("2026-13-01T00:00:00Z"), None); // month 13
        assert_eq!(iso8601_to_unix_ms("2026-02-21T24:00:00Z"), None); // hour 24
        assert_eq!(iso8601_to_unix_ms("1950-01-01T00:00:00Z"), None); // pre-epoch
    }

    #[test]
    fn test_parse_rejects_out_of_range_years() {
        // Years beyond four digits must return None, not overflow.
        assert_eq!(iso8601_to_unix_ms("10000-01-01T00:00:00Z"), None);
        assert_eq!(iso8601_to_unix_ms("300000000000000-01-01T00:00:00Z"), None);
        assert_eq!(
            iso8601_to_unix_ms("9000000000000000000-01-01T00:00:00Z"),
            None
        );
        assert_eq!(iso8601_to_unix_ms("-5000-01-01T00:00:00Z"), None);

        // Edge of the accepted range still parses.
        assert!(iso8601_to_unix_ms("9999-12-31T23:59:59.999Z").is_some());
    }

    #[test]
    fn test_now_is_recent() {
        let ts = unix_ms_to_iso8601(now_unix_ms());
        assert!(ts.starts_with("202"), "timestamp should be in 2020s: {ts}");
    }

    #[test]
    fn test_days_from_civil_inverts() {
        for days in [0i64, 1, 365, 10_000, 20_500] {
            let (y, m, d) = civil_from_days(days);
            assert_eq!(days_from_civil(y, m, d), days);
        }
    }
}
