//! Classification of backup file-name suffixes.
//!
//! A backup of `app.log` is named `app.log.<suffix>`. Three suffix shapes
//! occur in a log directory:
//!
//! - `.20240115T120000Z` (optionally `.gz` etc. appended): an ISO-8601
//!   timestamp, the form produced by rotation.
//! - `.1705320000` (optionally `.gz` etc. appended): decimal epoch seconds,
//!   produced when timestamp rendering failed at rotation time. At least
//!   eight digits, which keeps epochs distinct from legacy indices.
//! - `.1`, `.2`, ...: a legacy index from an older rotation scheme. The
//!   scanner renames these to timestamp form using the file's mtime.
//!
//! The rules are tried in that order; each input matches at most one.

use crate::rolling::timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Suffix {
    /// A decoded ISO-8601 timestamp, in Unix seconds.
    Timestamp(i64),
    /// Bare epoch seconds.
    Epoch(i64),
    /// A legacy numeric index; the timestamp must come from the file's mtime.
    LegacyIndex(u64),
}

pub(crate) fn classify(suffix: &str) -> Option<Suffix> {
    if let Some(stamp) = extract_iso8601(suffix) {
        return timestamp::parse_timestamp(stamp).map(Suffix::Timestamp);
    }
    if let Some(digits) = extract_epoch_digits(suffix) {
        return digits.parse().ok().map(Suffix::Epoch);
    }
    if let Some(digits) = extract_index_digits(suffix) {
        return digits.parse().ok().map(Suffix::LegacyIndex);
    }
    None
}

/// Matches `.YYYYMMDDThhmmss(Z|±hhmm)` with an optional `.<anything>` tail
/// and returns the timestamp portion.
fn extract_iso8601(suffix: &str) -> Option<&str> {
    let rest = suffix.strip_prefix('.')?;
    let bytes = rest.as_bytes();
    if bytes.len() < 16
        || !bytes[..8].iter().all(u8::is_ascii_digit)
        || bytes[8] != b'T'
        || !bytes[9..15].iter().all(u8::is_ascii_digit)
    {
        return None;
    }
    match bytes[15] {
        b'Z' => (bytes.len() == 16 || bytes[16] == b'.').then(|| &rest[..16]),
        b'+' | b'-' => {
            if bytes.len() < 20 || !bytes[16..20].iter().all(u8::is_ascii_digit) {
                return None;
            }
            (bytes.len() == 20 || bytes[20] == b'.').then(|| &rest[..20])
        }
        _ => None,
    }
}

/// Matches `.<digits>` with at least eight digits and an optional
/// `.<anything>` tail.
fn extract_epoch_digits(suffix: &str) -> Option<&str> {
    let rest = suffix.strip_prefix('.')?;
    let end = rest
        .bytes()
        .position(|b| !b.is_ascii_digit())
        .unwrap_or(rest.len());
    if end < 8 {
        return None;
    }
    if end < rest.len() && rest.as_bytes()[end] != b'.' {
        return None;
    }
    Some(&rest[..end])
}

/// Matches `.<digits>` with no further segment.
fn extract_index_digits(suffix: &str) -> Option<&str> {
    let rest = suffix.strip_prefix('.')?;
    (!rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit())).then_some(rest)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn classifies_iso8601_suffixes() {
        assert_eq!(
            classify(".20240115T120000Z"),
            Some(Suffix::Timestamp(1_705_320_000))
        );
        assert_eq!(
            classify(".20240115T120000+0800"),
            Some(Suffix::Timestamp(1_705_291_200))
        );
        assert_eq!(
            classify(".20240115T120000Z.gz"),
            Some(Suffix::Timestamp(1_705_320_000))
        );
        assert_eq!(
            classify(".20240115T120000-0800.gz"),
            Some(Suffix::Timestamp(1_705_348_800))
        );
    }

    #[test]
    fn classifies_epoch_suffixes() {
        assert_eq!(classify(".1577836800"), Some(Suffix::Epoch(1_577_836_800)));
        assert_eq!(
            classify(".1577836800.gz"),
            Some(Suffix::Epoch(1_577_836_800))
        );
        // Exactly eight digits is an epoch, not a legacy index.
        assert_eq!(classify(".12345678"), Some(Suffix::Epoch(12_345_678)));
    }

    #[test]
    fn classifies_legacy_indices() {
        assert_eq!(classify(".1"), Some(Suffix::LegacyIndex(1)));
        assert_eq!(classify(".7"), Some(Suffix::LegacyIndex(7)));
        assert_eq!(classify(".1234567"), Some(Suffix::LegacyIndex(1_234_567)));
    }

    #[test]
    fn rejects_everything_else() {
        for suffix in [
            "",
            ".",
            ".gz",
            ".old",
            ".123.gz",          // too few digits for an epoch, tail bars an index
            ".20240115T120000", // timestamp without a zone designator
            ".20240115T120000ZZ",
            ".20240115T120000+08",
            ".1x2",
            "20240115T120000Z", // no leading dot
        ] {
            assert_eq!(classify(suffix), None, "accepted {:?}", suffix);
        }
    }

    #[test]
    fn iso8601_with_invalid_fields_is_not_reinterpreted() {
        // Shape-matches the timestamp rule, so the later rules must not see it.
        assert_eq!(classify(".20241399T996161Z"), None);
    }

    #[test]
    fn overflowing_digits_are_rejected() {
        assert_eq!(classify(".99999999999999999999999"), None);
    }
}
