//! COBS framing over the serial byte stream.
//!
//! On the wire every frame is `COBS(payload) 0x00`. The stuffing guarantees
//! the delimiter never appears inside a frame, so after a partial read or a
//! corrupted byte the receiver resynchronises at the next `0x00`.

use tracing::warn;

use crate::error::LinkError;
use crate::packet::{self, CommandPacket, TelemetryPacket};

/// Frame terminator.
pub const DELIMITER: u8 = 0x00;

/// Largest stuffed frame the accumulator keeps before giving up on it.
/// Generous next to the 29-byte telemetry payload; only line noise gets here.
pub const DEFAULT_MAX_FRAME_LEN: usize = 512;

/// Stuff `payload` and append the terminator.
pub fn encode_frame(payload: &[u8]) -> Vec<u8> {
    let mut out = cobs::encode_vec(payload);
    out.push(DELIMITER);
    out
}

/// Reverse the stuffing of one frame (terminator already stripped).
pub fn decode_frame(frame: &[u8]) -> Result<Vec<u8>, LinkError> {
    // A COBS frame is never empty and never holds the delimiter
    if frame.is_empty() || frame.contains(&DELIMITER) {
        return Err(LinkError::FrameDecode);
    }
    cobs::decode_vec(frame).map_err(|_| LinkError::FrameDecode)
}

pub fn encode_command_frame(cmd: &CommandPacket) -> Vec<u8> {
    encode_frame(&packet::encode_command(cmd))
}

/// Unstuff and decode a telemetry frame.
pub fn decode_telemetry_frame(frame: &[u8]) -> Result<TelemetryPacket, LinkError> {
    let payload = decode_frame(frame)?;
    packet::decode_telemetry(&payload)
}

/// Accumulates raw bytes from the serial port and splits them into frames.
///
/// Partial frames are retained across calls to `extend`; bytes that run past
/// `max_len` without a delimiter are dropped so a babbling line can't grow the
/// buffer without bound.
#[derive(Debug)]
pub struct FrameAccumulator {
    buf: Vec<u8>,
    max_len: usize,
    overflows: u64,
}

impl Default for FrameAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameAccumulator {
    pub fn new() -> Self {
        Self::with_max_len(DEFAULT_MAX_FRAME_LEN)
    }

    pub fn with_max_len(max_len: usize) -> Self {
        Self {
            buf: Vec::with_capacity(max_len.min(4096)),
            max_len: max_len.max(1),
            overflows: 0,
        }
    }

    pub fn extend(&mut self, input: &[u8]) {
        self.buf.extend_from_slice(input);
        if self.buf.len() > self.max_len && !self.buf.contains(&DELIMITER) {
            warn!(
                dropped = self.buf.len(),
                max_len = self.max_len,
                "frame accumulator overflow, discarding partial frame"
            );
            self.buf.clear();
            self.overflows = self.overflows.saturating_add(1);
        }
    }

    /// Next complete frame (without its terminator), oldest first.
    pub fn next_frame(&mut self) -> Option<Vec<u8>> {
        let end = self.buf.iter().position(|&b| b == DELIMITER)?;
        let mut frame: Vec<u8> = self.buf.drain(..=end).collect();
        frame.pop();
        Some(frame)
    }

    /// Bytes held for a frame whose terminator has not arrived yet.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    pub fn overflows(&self) -> u64 {
        self.overflows
    }
}
