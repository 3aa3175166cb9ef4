//! Fire-epoch keys for the pending index.
//!
//! Keys are zero-padded integer milliseconds since the Unix epoch, so plain
//! string ordering matches chronological ordering.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Digits in an encoded epoch; wide enough for any `u64` millisecond count.
pub const EPOCH_WIDTH: usize = 20;

/// Separates the epoch from the schedule id inside an index key.
pub const ENTRY_SEPARATOR: char = '#';

/// Encode a point in time as a sortable epoch string.
///
/// Sub-millisecond precision is truncated. Times before 1970 clamp to zero.
pub fn epoch_key(time: SystemTime) -> String {
    let millis = time
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
        .min(u64::MAX as u128);
    format!("{millis:0width$}", width = EPOCH_WIDTH)
}

/// Decode an epoch string produced by [`epoch_key`].
pub fn parse_epoch_key(key: &str) -> Option<SystemTime> {
    if key.len() != EPOCH_WIDTH || !key.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let millis: u64 = key.parse().ok()?;
    UNIX_EPOCH.checked_add(Duration::from_millis(millis))
}

/// Index key for `id` firing at `time`: `<epoch>#<id>`.
pub fn entry_key(time: SystemTime, id: &str) -> String {
    format!("{}{ENTRY_SEPARATOR}{id}", epoch_key(time))
}

/// The epoch portion of an index key.
pub fn entry_epoch(key: &str) -> &str {
    key.split_once(ENTRY_SEPARATOR).map_or(key, |(epoch, _)| epoch)
}

/// Decode a fractional-seconds key such as `"1700000000.5"`.
///
/// Older indexes were keyed this way. Negative, non-finite and
/// out-of-range values are rejected.
pub fn parse_seconds_key(key: &str) -> Option<SystemTime> {
    let secs: f64 = key.trim().parse().ok()?;
    if !secs.is_finite() || secs < 0.0 {
        return None;
    }
    let offset = Duration::try_from_secs_f64(secs).ok()?;
    UNIX_EPOCH.checked_add(offset)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at_millis(millis: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_millis(millis)
    }

    #[test]
    fn keys_are_fixed_width() {
        assert_eq!(epoch_key(UNIX_EPOCH), "0".repeat(EPOCH_WIDTH));
        assert_eq!(epoch_key(at_millis(1_700_000_000_123)), "00000001700000000123");
    }

    #[test]
    fn string_order_matches_time_order() {
        // 9.5s vs 10s: naive float text would sort "10.0" before "9.5".
        let earlier = epoch_key(at_millis(9_500));
        let later = epoch_key(at_millis(10_000));
        assert!(earlier < later);
    }

    #[test]
    fn sub_millisecond_precision_truncates() {
        let time = UNIX_EPOCH + Duration::from_micros(1_999);
        assert_eq!(epoch_key(time), epoch_key(at_millis(1)));
    }

    #[test]
    fn pre_epoch_clamps_to_zero() {
        let before = UNIX_EPOCH - Duration::from_secs(60);
        assert_eq!(epoch_key(before), epoch_key(UNIX_EPOCH));
    }

    #[test]
    fn parse_inverts_encode() {
        let time = at_millis(1_234_567);
        assert_eq!(parse_epoch_key(&epoch_key(time)), Some(time));
        assert_eq!(parse_epoch_key("1700000000.5"), None);
        assert_eq!(parse_epoch_key(""), None);
    }

    #[test]
    fn entry_keys_carry_epoch_and_id() {
        let key = entry_key(at_millis(42), "7");
        assert_eq!(key, "00000000000000000042#7");
        assert_eq!(entry_epoch(&key), "00000000000000000042");
        assert_eq!(entry_epoch("00000000000000000042"), "00000000000000000042");
    }

    #[test]
    fn seconds_keys_parse_to_milliseconds() {
        let time = parse_seconds_key("1700000000.5").unwrap();
        assert_eq!(epoch_key(time), "00000001700000000500");
        assert_eq!(parse_seconds_key("42"), Some(at_millis(42_000)));
        assert_eq!(parse_seconds_key("-1.0"), None);
        assert_eq!(parse_seconds_key("NaN"), None);
        assert_eq!(parse_seconds_key("soon"), None);
    }
}
