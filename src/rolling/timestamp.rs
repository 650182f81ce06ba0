//! Timestamp rendering and parsing for backup file names.
//!
//! Backup suffixes use a fixed-width ISO-8601 form, `YYYYMMDDThhmmss`
//! followed by a zone designator (`Z` or `±hhmm`). The width never varies,
//! which keeps the directory scanner's classification cheap and unambiguous.

use time::{format_description, Date, Month, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset};

const DATETIME_FORMAT: &str = "[year][month][day]T[hour][minute][second]";

/// Renders `secs` (Unix seconds) as `YYYYMMDDThhmmss` plus a zone designator,
/// using the current local offset when it can be determined and UTC otherwise.
///
/// Returns `None` if the instant is unrepresentable or formatting fails; the
/// caller is expected to fall back to decimal epoch seconds.
pub(crate) fn format_timestamp(secs: i64) -> Option<String> {
    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
    format_timestamp_at(secs, offset)
}

/// Renders `secs` at an explicit offset. A zero offset renders as `Z`.
pub(crate) fn format_timestamp_at(secs: i64, offset: UtcOffset) -> Option<String> {
    let datetime = OffsetDateTime::from_unix_timestamp(secs).ok()?.to_offset(offset);
    let format = format_description::parse(DATETIME_FORMAT).ok()?;
    let mut rendered = datetime.format(&format).ok()?;

    if offset == UtcOffset::UTC {
        rendered.push('Z');
    } else {
        let (hours, minutes, _) = offset.as_hms();
        rendered.push(if offset.whole_seconds() < 0 { '-' } else { '+' });
        rendered.push_str(&format!(
            "{:02}{:02}",
            hours.unsigned_abs(),
            minutes.unsigned_abs()
        ));
    }

    Some(rendered)
}

/// Parses `YYYYMMDDThhmmss` optionally followed by `Z` or `±hhmm` into Unix
/// seconds. A missing zone designator is read as UTC with no offset applied.
pub(crate) fn parse_timestamp(s: &str) -> Option<i64> {
    if s.len() < 15 || !s.is_ascii() {
        return None;
    }
    let (datetime, zone) = s.split_at(15);
    let bytes = datetime.as_bytes();
    if bytes[8] != b'T'
        || !bytes[..8].iter().all(u8::is_ascii_digit)
        || !bytes[9..].iter().all(u8::is_ascii_digit)
    {
        return None;
    }

    let year: i32 = datetime[..4].parse().ok()?;
    let month: u8 = datetime[4..6].parse().ok()?;
    let day: u8 = datetime[6..8].parse().ok()?;
    let hour: u8 = datetime[9..11].parse().ok()?;
    let minute: u8 = datetime[11..13].parse().ok()?;
    let second: u8 = datetime[13..15].parse().ok()?;

    let date = Date::from_calendar_date(year, Month::try_from(month).ok()?, day).ok()?;
    let time = Time::from_hms(hour, minute, second).ok()?;
    let as_utc = PrimitiveDateTime::new(date, time).assume_utc().unix_timestamp();

    let offset = parse_zone_offset(zone)?;
    Some(as_utc - offset)
}

/// Zone designator to offset seconds: `Z` and the empty string are zero,
/// `±hhmm` is `sign * (hh * 3600 + mm * 60)`.
fn parse_zone_offset(zone: &str) -> Option<i64> {
    if zone.is_empty() || zone == "Z" {
        return Some(0);
    }

    let bytes = zone.as_bytes();
    if bytes.len() != 5 || !bytes[1..].iter().all(u8::is_ascii_digit) {
        return None;
    }
    let sign = match bytes[0] {
        b'+' => 1,
        b'-' => -1,
        _ => return None,
    };
    let hours: i64 = zone[1..3].parse().ok()?;
    let minutes: i64 = zone[3..5].parse().ok()?;
    Some(sign * (hours * 3600 + minutes * 60))
}

/// Splits a path at its final `/`. A path with no separator lives in `.`.
pub(crate) fn split_path(path: &str) -> (&str, &str) {
    match path.rfind('/') {
        Some(pos) => (&path[..pos], &path[pos + 1..]),
        None => (".", path),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn formats_epoch_as_utc() {
        assert_eq!(
            format_timestamp_at(0, UtcOffset::UTC).unwrap(),
            "19700101T000000Z"
        );
    }

    #[test]
    fn formats_positive_offset() {
        let offset = UtcOffset::from_hms(8, 0, 0).unwrap();
        assert_eq!(
            format_timestamp_at(1_700_000_000, offset).unwrap(),
            "20231115T061320+0800"
        );
    }

    #[test]
    fn formats_negative_offset() {
        let offset = UtcOffset::from_hms(-5, -30, 0).unwrap();
        let rendered = format_timestamp_at(1_700_000_000, offset).unwrap();
        assert!(rendered.ends_with("-0530"), "got {}", rendered);
    }

    #[test]
    fn round_trips_through_parse() {
        let offsets = [
            UtcOffset::UTC,
            UtcOffset::from_hms(8, 0, 0).unwrap(),
            UtcOffset::from_hms(-5, -30, 0).unwrap(),
        ];
        // Zero, a recent instant, and an instant just before a DST boundary.
        for secs in [0, 1_700_000_000, 1_667_091_599] {
            for offset in offsets {
                let rendered = format_timestamp_at(secs, offset).unwrap();
                assert_eq!(parse_timestamp(&rendered), Some(secs), "via {}", rendered);
            }
        }
    }

    #[test]
    fn parses_missing_zone_as_utc() {
        assert_eq!(parse_timestamp("19700101T000000"), Some(0));
        assert_eq!(parse_timestamp("20231115T061320"), Some(1_700_028_800));
    }

    #[test]
    fn parses_explicit_offsets() {
        assert_eq!(parse_timestamp("20240115T120000Z"), Some(1_705_320_000));
        assert_eq!(parse_timestamp("20240115T120000+0800"), Some(1_705_291_200));
        assert_eq!(parse_timestamp("20240115T120000-0800"), Some(1_705_348_800));
    }

    #[test]
    fn rejects_malformed_input() {
        for s in [
            "",
            "2024",
            "20240115",
            "20240115T1200",
            "20240115T120000+08",
            "20240115T120000+08000",
            "20240115T120000X",
            "2024011ST12000Z",
            "yyyymmddThhmmssZ",
        ] {
            assert_eq!(parse_timestamp(s), None, "accepted {:?}", s);
        }
    }

    #[test]
    fn splits_paths_at_final_separator() {
        assert_eq!(split_path("/var/log/app.log"), ("/var/log", "app.log"));
        assert_eq!(split_path("logs/app.log"), ("logs", "app.log"));
        assert_eq!(split_path("app.log"), (".", "app.log"));
        assert_eq!(split_path("logs/"), ("logs", ""));
    }
}
