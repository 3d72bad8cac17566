//! Runtime configuration for the link, sampler, mixer and simulation.
//!
//! These are the plain structs the session is built from. They are separate
//! from the TOML-deserialized config in `steplink_config`; see
//! `conversions` for the bridge.

use std::time::Duration;

/// Serial link discovery and probing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkCfg {
    pub baud_rate: u32,
    /// Wait after opening a candidate before the probe read.
    pub settle: Duration,
    /// Bound on one blocking read; keeps worker loops responsive to stop.
    pub read_timeout: Duration,
    /// How long a probe may wait for its first complete frame.
    pub probe_timeout: Duration,
    /// Probe only this port instead of discovering candidates.
    pub port: Option<String>,
    pub force_simulation: bool,
}

impl Default for LinkCfg {
    fn default() -> Self {
        Self {
            baud_rate: 115_200,
            settle: Duration::from_millis(100),
            read_timeout: Duration::from_millis(100),
            probe_timeout: Duration::from_millis(500),
            port: None,
            force_simulation: false,
        }
    }
}

/// Queue and ring buffer capacities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferCfg {
    pub telemetry_capacity: usize,
    pub input_capacity: usize,
    pub rx_queue_capacity: usize,
    pub input_queue_capacity: usize,
}

impl Default for BufferCfg {
    fn default() -> Self {
        Self {
            telemetry_capacity: 256,
            input_capacity: 118,
            rx_queue_capacity: 256,
            input_queue_capacity: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplerCfg {
    pub period: Duration,
    /// Sleep between connection checks while no device is present.
    pub idle: Duration,
}

impl Default for SamplerCfg {
    fn default() -> Self {
        Self {
            period: Duration::from_millis(10),
            idle: Duration::from_millis(100),
        }
    }
}

/// Host-side velocity shaping applied between consecutive commands.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Shaping {
    #[default]
    None,
    /// Constant-acceleration ramp bounded by the command's max acceleration.
    Ramp,
    /// Jerk-limited ramp.
    SCurve { max_jerk: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MixerCfg {
    pub tx_period: Duration,
    pub shaping: Shaping,
}

impl Default for MixerCfg {
    fn default() -> Self {
        Self {
            tx_period: Duration::from_millis(30),
            shaping: Shaping::None,
        }
    }
}

/// Synthetic telemetry generator parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimCfg {
    pub tick: Duration,
    /// Delay before the first synthetic frame.
    pub startup_delay: Duration,
    pub noise_min: f64,
    pub noise_max: f64,
    pub wave_amplitude: f64,
    pub seed: Option<u64>,
}

impl Default for SimCfg {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(3),
            startup_delay: Duration::from_millis(300),
            noise_min: -7.0,
            noise_max: 16.0,
            wave_amplitude: 360.0,
            seed: None,
        }
    }
}
