//! Fixed-layout binary payloads exchanged with the motor controller.
//!
//! All fields are little-endian. The layouts are versionless: the payload
//! length alone identifies the packet type.
//!
//! Command (host -> device), 20 bytes:
//! `i32 speed0 | i32 speed1 | i32 speed2 | i32 speed3 | i32 max_acceleration`
//!
//! Telemetry (device -> host), 29 bytes:
//! `u32 timestamp | i32 echo0..echo3 | i32 encoder_angle | i32 open_loop_angle | u8 state`

use crate::error::LinkError;

pub const COMMAND_SIZE: usize = 20;
pub const TELEMETRY_SIZE: usize = 29;

/// Acceleration limit sent when nothing else was configured (steps/s^2).
pub const DEFAULT_MAX_ACCELERATION: i32 = 10_000;

/// Speed setpoints for the four steppers plus the shared acceleration limit.
///
/// Speeds are step rates (steps/s). Callers clamp before encoding; the codec
/// performs no range checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandPacket {
    pub speed: [i32; 4],
    pub max_acceleration: i32,
}

impl Default for CommandPacket {
    fn default() -> Self {
        Self {
            speed: [0; 4],
            max_acceleration: DEFAULT_MAX_ACCELERATION,
        }
    }
}

/// Controller health as reported in every telemetry frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum SystemState {
    #[default]
    Ok = 0,
    EncoderError = 1,
    MotorError = 2,
    Unknown = 99,
}

impl SystemState {
    /// Unrecognized bytes collapse to `Unknown`.
    pub fn from_byte(b: u8) -> Self {
        match b {
            0 => Self::Ok,
            1 => Self::EncoderError,
            2 => Self::MotorError,
            _ => Self::Unknown,
        }
    }

    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

/// One decoded telemetry frame. `timestamp` is in device-clock milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TelemetryPacket {
    pub timestamp: u32,
    pub echo_speed: [i32; 4],
    pub encoder_angle: i32,
    pub open_loop_angle: i32,
    pub state: SystemState,
}

pub fn encode_command(cmd: &CommandPacket) -> [u8; COMMAND_SIZE] {
    let mut out = [0u8; COMMAND_SIZE];
    let fields = cmd.speed.iter().chain(std::iter::once(&cmd.max_acceleration));
    for (chunk, v) in out.chunks_exact_mut(4).zip(fields) {
        chunk.copy_from_slice(&v.to_le_bytes());
    }
    out
}

pub fn decode_command(bytes: &[u8]) -> Result<CommandPacket, LinkError> {
    if bytes.len() != COMMAND_SIZE {
        return Err(LinkError::SizeMismatch {
            expected: COMMAND_SIZE,
            actual: bytes.len(),
        });
    }
    Ok(CommandPacket {
        speed: [
            read_i32(bytes, 0),
            read_i32(bytes, 4),
            read_i32(bytes, 8),
            read_i32(bytes, 12),
        ],
        max_acceleration: read_i32(bytes, 16),
    })
}

pub fn encode_telemetry(p: &TelemetryPacket) -> [u8; TELEMETRY_SIZE] {
    let mut out = [0u8; TELEMETRY_SIZE];
    out[0..4].copy_from_slice(&p.timestamp.to_le_bytes());
    let fields = p
        .echo_speed
        .iter()
        .chain([&p.encoder_angle, &p.open_loop_angle]);
    for (chunk, v) in out[4..28].chunks_exact_mut(4).zip(fields) {
        chunk.copy_from_slice(&v.to_le_bytes());
    }
    out[28] = p.state.as_byte();
    out
}

pub fn decode_telemetry(bytes: &[u8]) -> Result<TelemetryPacket, LinkError> {
    if bytes.len() != TELEMETRY_SIZE {
        return Err(LinkError::SizeMismatch {
            expected: TELEMETRY_SIZE,
            actual: bytes.len(),
        });
    }
    Ok(TelemetryPacket {
        timestamp: u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
        echo_speed: [
            read_i32(bytes, 4),
            read_i32(bytes, 8),
            read_i32(bytes, 12),
            read_i32(bytes, 16),
        ],
        encoder_angle: read_i32(bytes, 20),
        open_loop_angle: read_i32(bytes, 24),
        state: SystemState::from_byte(bytes[28]),
    })
}

// Caller guarantees `at + 4 <= bytes.len()`.
#[inline]
fn read_i32(bytes: &[u8], at: usize) -> i32 {
    i32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_layout_is_little_endian_in_field_order() {
        let cmd = CommandPacket {
            speed: [1, -1, 0x0102_0304, 0],
            max_acceleration: 50_000,
        };
        let b = encode_command(&cmd);
        assert_eq!(&b[0..4], &[1, 0, 0, 0]);
        assert_eq!(&b[4..8], &[0xFF; 4]);
        assert_eq!(&b[8..12], &[4, 3, 2, 1]);
        assert_eq!(&b[16..20], &50_000i32.to_le_bytes());
    }

    #[test]
    fn telemetry_decodes_known_bytes() {
        let mut raw = [0u8; TELEMETRY_SIZE];
        raw[0..4].copy_from_slice(&1200u32.to_le_bytes());
        raw[8..12].copy_from_slice(&(-640i32).to_le_bytes());
        raw[24..28].copy_from_slice(&90i32.to_le_bytes());
        raw[28] = 2;
        let p = decode_telemetry(&raw).unwrap();
        assert_eq!(p.timestamp, 1200);
        assert_eq!(p.echo_speed, [0, -640, 0, 0]);
        assert_eq!(p.open_loop_angle, 90);
        assert_eq!(p.state, SystemState::MotorError);
    }

    #[test]
    fn wrong_length_is_size_mismatch() {
        let err = decode_telemetry(&[0u8; 28]).unwrap_err();
        assert_eq!(
            err,
            LinkError::SizeMismatch {
                expected: 29,
                actual: 28
            }
        );
        assert!(decode_command(&[0u8; 21]).is_err());
    }

    #[test]
    fn unknown_state_bytes_collapse() {
        assert_eq!(SystemState::from_byte(99), SystemState::Unknown);
        assert_eq!(SystemState::from_byte(7), SystemState::Unknown);
        assert_eq!(SystemState::Unknown.as_byte(), 99);
    }

    #[test]
    fn default_command_carries_default_acceleration() {
        let cmd = CommandPacket::default();
        assert_eq!(cmd.speed, [0; 4]);
        assert_eq!(cmd.max_acceleration, DEFAULT_MAX_ACCELERATION);
    }
}
