//! Shared utility functions used across multiple modules.

use chrono::{DateTime, SubsecRound, Utc};

/// Current time truncated to millisecond precision.
///
/// Stored timestamps are Unix milliseconds, so every server-side stamp is
/// taken at that precision to compare equal after a round trip.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// Convert a timestamp to Unix milliseconds for storage.
pub fn to_millis(value: DateTime<Utc>) -> i64 {
    value.timestamp_millis()
}

/// Convert stored Unix milliseconds back into a timestamp.
///
/// Out-of-range values clamp to the Unix epoch.
pub fn from_millis(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

/// Normalize optional text by trimming whitespace and removing empties.
///
/// Returns `None` when the input is `None` or the trimmed value is empty.
pub fn normalize_text_option(value: Option<String>) -> Option<String> {
    let value = value?;
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_has_millisecond_precision() {
        let stamp = now();
        assert_eq!(from_millis(to_millis(stamp)), stamp);
    }

    #[test]
    fn from_millis_round_trips() {
        let stamp = from_millis(1_700_000_000_123);
        assert_eq!(to_millis(stamp), 1_700_000_000_123);
    }

    #[test]
    fn normalize_text_option_rejects_empty() {
        assert_eq!(normalize_text_option(None), None);
        assert_eq!(normalize_text_option(Some("   ".to_string())), None);
    }

    #[test]
    fn normalize_text_option_trims_value() {
        assert_eq!(
            normalize_text_option(Some(" work ".to_string())),
            Some("work".to_string())
        );
    }
}
