//! Common time/conversion helpers for steplink_core.

use std::time::Duration;

/// Duration from a millisecond count, floored at 1 ms so loop periods never
/// degenerate into busy spins.
#[inline]
pub fn period(ms: u64) -> Duration {
    Duration::from_millis(ms.max(1))
}

/// Clamp an i64 into the i32 range.
#[inline]
pub fn saturate_i32(v: i64) -> i32 {
    i32::try_from(v).unwrap_or(if v < 0 { i32::MIN } else { i32::MAX })
}

/// Truncate a float step rate toward zero into i32, saturating at the range
/// ends. NaN maps to 0.
#[inline]
pub fn truncate_to_i32(x: f64) -> i32 {
    // `as` truncates toward zero and saturates; NaN becomes 0
    x as i32
}
