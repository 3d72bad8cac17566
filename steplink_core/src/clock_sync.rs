//! Host/device clock reconciliation.
//!
//! Captured once when the link comes up. Telemetry timestamps are re-based
//! onto "ms since link start" in the device's frame; input samples are
//! re-based onto the same origin in the host's frame, plus a fixed skew that
//! covers the input pipeline's processing latency.

/// Default skew added to input samples, in ms.
pub const DEFAULT_INPUT_SKEW_MS: i32 = 96;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClockOffset {
    /// Device timestamp of the first frame seen on the link.
    pub device_epoch_ms: u32,
    /// Host monotonic time (ms since session epoch) when that frame arrived.
    pub host_epoch_ms: i64,
}

impl ClockOffset {
    pub fn capture(device_epoch_ms: u32, host_epoch_ms: i64) -> Self {
        Self {
            device_epoch_ms,
            host_epoch_ms,
        }
    }

    /// `host - device`: add this to a device time to land on the host clock.
    pub fn offset(&self) -> i64 {
        self.host_epoch_ms - i64::from(self.device_epoch_ms)
    }

    /// Device timestamp -> ms since link start.
    pub fn correct_telemetry(&self, raw_timestamp: u32) -> i64 {
        i64::from(raw_timestamp) - i64::from(self.device_epoch_ms)
    }

    /// Host sample timestamp -> ms since link start, plus `skew_ms`.
    pub fn correct_input(&self, host_ms: i32, skew_ms: i32) -> i32 {
        let corrected = i64::from(host_ms) - self.host_epoch_ms + i64::from(skew_ms);
        crate::util::saturate_i32(corrected)
    }
}
