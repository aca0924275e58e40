// SPDX-License-Identifier: MIT

//! Canonical timestamp helpers used anywhere a value feeds a checksum or a
//! replay comparison (§6: "UTC timestamps in ISO-8601 with millisecond
//! precision").

use chrono::{DateTime, SecondsFormat, Utc};

/// Render a timestamp as canonical millisecond-precision UTC ISO-8601.
pub fn to_canonical(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// `DateTime<Utc>` from epoch milliseconds, clamped to the Unix epoch on
/// underflow (never panics on attacker-controlled input).
pub fn from_epoch_ms(ms: u64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms as i64).unwrap_or_else(|| DateTime::from_timestamp(0, 0).unwrap())
}

/// Epoch milliseconds from a `DateTime<Utc>`.
pub fn to_epoch_ms(ts: DateTime<Utc>) -> u64 {
    ts.timestamp_millis().max(0) as u64
}

/// Total order over (timestamp, id) pairs, used to break timestamp ties by
/// lexicographic id order (§4.A: "equal timestamps break ties by id lex
/// order").
pub fn tie_break<'a>(
    a: (DateTime<Utc>, &'a str),
    b: (DateTime<Utc>, &'a str),
) -> std::cmp::Ordering {
    a.0.cmp(&b.0).then_with(|| a.1.cmp(b.1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_epoch_ms() {
        let ms = 1_700_000_123_456u64;
        assert_eq!(to_epoch_ms(from_epoch_ms(ms)), ms);
    }

    #[test]
    fn tie_break_prefers_earlier_timestamp_then_id() {
        let t0 = from_epoch_ms(1_000);
        let t1 = from_epoch_ms(2_000);
        assert_eq!(tie_break((t0, "b"), (t1, "a")), std::cmp::Ordering::Less);
        assert_eq!(tie_break((t0, "b"), (t0, "a")), std::cmp::Ordering::Greater);
    }
}
