#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Host side of the stepper link (hardware-agnostic).
//!
//! All hardware goes through `steplink_traits::{PortOpener, SerialLink,
//! InputDevice}`, so everything here runs the same against a real port, the
//! simulated source, or the scripted mocks.
//!
//! ## Architecture
//!
//! - **Wire**: fixed-size little-endian packets (`packet`) inside
//!   COBS-stuffed, zero-terminated frames (`frame`)
//! - **Link**: discovery, probing and the read/write loops, with a simulated
//!   fallback (`transport`, `simulation`)
//! - **Input**: polled joystick samples on a drop-oldest queue (`sampler`)
//!   mixed into commands (`mixer`)
//! - **Time**: one `ClockOffset` per link puts telemetry and input on a
//!   shared axis (`clock_sync`)
//! - **Buffers**: fixed-capacity rings with oldest-first snapshots
//!   (`ring_buffer`)
//! - **Motion**: ramp and S-curve velocity profiles (`motion`)
//! - **Session**: the owned context tying it together (`session`)

pub mod clock_sync;
pub mod config;
pub mod conversions;
pub mod error;
pub mod frame;
pub mod hw_error;
pub mod mixer;
pub mod mocks;
pub mod motion;
pub mod packet;
pub mod queue;
pub mod ring_buffer;
pub mod sampler;
pub mod session;
pub mod simulation;
pub mod transport;
pub mod util;

pub use clock_sync::ClockOffset;
pub use error::{BuildError, LinkError, Result};
pub use mixer::{CommandMixer, GainsHandle, MixerGains};
pub use packet::{CommandPacket, SystemState, TelemetryPacket};
pub use ring_buffer::RingBuffer;
pub use sampler::{InputSample, InputSampler};
pub use session::{Session, SessionBuilder, TelemetrySample};
pub use transport::{Link, LinkState, LinkStats, SerialTransport};
