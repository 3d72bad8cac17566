#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema for the steplink host.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//! - Every section is optional; a missing file or an empty document yields
//!   the defaults the hardware was tuned with.
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LinkCfg {
    pub baud_rate: u32,
    /// Wait after opening a candidate before attempting the probe read
    pub settle_ms: u64,
    /// Upper bound on a single blocking read
    pub read_timeout_ms: u64,
    /// How long a probe may wait for its first complete frame
    pub probe_timeout_ms: u64,
    /// Probe only this port instead of discovering candidates
    pub port: Option<String>,
    /// Skip discovery and run the simulated source
    pub force_simulation: bool,
}

impl Default for LinkCfg {
    fn default() -> Self {
        Self {
            baud_rate: 115_200,
            settle_ms: 100,
            read_timeout_ms: 100,
            probe_timeout_ms: 500,
            port: None,
            force_simulation: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct BuffersCfg {
    pub telemetry_capacity: usize,
    pub input_capacity: usize,
    pub rx_queue_capacity: usize,
    pub input_queue_capacity: usize,
}

impl Default for BuffersCfg {
    fn default() -> Self {
        Self {
            telemetry_capacity: 256,
            input_capacity: 118,
            rx_queue_capacity: 256,
            input_queue_capacity: 5,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SamplerCfg {
    pub period_ms: u64,
    /// Sleep between connection checks while no device is present
    pub idle_ms: u64,
}

impl Default for SamplerCfg {
    fn default() -> Self {
        Self {
            period_ms: 10,
            idle_ms: 100,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ShapingMode {
    #[default]
    None,
    Ramp,
    SCurve,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MixerCfg {
    pub speed0_scale: i32,
    pub speed1_scale: i32,
    pub speed23_scale: i32,
    /// steps/s^2, forwarded to the device in every command
    pub max_acceleration: i32,
    pub tx_period_ms: u64,
    pub shaping: ShapingMode,
    /// steps/s^3, only used by s_curve shaping
    pub max_jerk: f64,
}

impl Default for MixerCfg {
    fn default() -> Self {
        Self {
            speed0_scale: 3 * 800 * 8,
            speed1_scale: 800 * 8,
            speed23_scale: 800 * 8,
            max_acceleration: 50_000,
            tx_period_ms: 30,
            shaping: ShapingMode::None,
            max_jerk: 200_000.0,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ClockCfg {
    /// Added to corrected input timestamps to line them up with telemetry
    pub input_skew_ms: i32,
}

impl Default for ClockCfg {
    fn default() -> Self {
        Self { input_skew_ms: 96 }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SimulationCfg {
    pub tick_ms: u64,
    pub noise_min: f64,
    pub noise_max: f64,
    pub wave_amplitude: f64,
    pub seed: Option<u64>,
}

impl Default for SimulationCfg {
    fn default() -> Self {
        Self {
            tick_ms: 3,
            noise_min: -7.0,
            noise_max: 16.0,
            wave_amplitude: 360.0,
            seed: None,
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Config {
    pub link: LinkCfg,
    pub buffers: BuffersCfg,
    pub sampler: SamplerCfg,
    pub mixer: MixerCfg,
    pub clock: ClockCfg,
    pub simulation: SimulationCfg,
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

/// Read and parse a config file. A missing file yields the defaults.
pub fn load_file(path: &std::path::Path) -> eyre::Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let text = std::fs::read_to_string(path)
        .map_err(|e| eyre::eyre!("read config {:?}: {}", path, e))?;
    load_toml(&text).map_err(|e| eyre::eyre!("invalid configuration in {:?}: {}", path, e))
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Link
        if self.link.baud_rate == 0 {
            eyre::bail!("link.baud_rate must be > 0");
        }
        if self.link.read_timeout_ms == 0 {
            eyre::bail!("link.read_timeout_ms must be >= 1");
        }
        if self.link.probe_timeout_ms == 0 {
            eyre::bail!("link.probe_timeout_ms must be >= 1");
        }
        if self.link.settle_ms > 10_000 {
            eyre::bail!("link.settle_ms is unreasonably large (>10s)");
        }
        if let Some(port) = &self.link.port {
            if port.trim().is_empty() {
                eyre::bail!("link.port must not be empty when set");
            }
        }

        // Buffers
        if self.buffers.telemetry_capacity == 0 {
            eyre::bail!("buffers.telemetry_capacity must be >= 1");
        }
        if self.buffers.input_capacity == 0 {
            eyre::bail!("buffers.input_capacity must be >= 1");
        }
        if self.buffers.rx_queue_capacity == 0 {
            eyre::bail!("buffers.rx_queue_capacity must be >= 1");
        }
        if self.buffers.input_queue_capacity == 0 {
            eyre::bail!("buffers.input_queue_capacity must be >= 1");
        }

        // Sampler
        if self.sampler.period_ms == 0 {
            eyre::bail!("sampler.period_ms must be >= 1");
        }
        if self.sampler.idle_ms == 0 {
            eyre::bail!("sampler.idle_ms must be >= 1");
        }

        // Mixer
        if self.mixer.max_acceleration <= 0 {
            eyre::bail!("mixer.max_acceleration must be > 0");
        }
        if self.mixer.tx_period_ms == 0 {
            eyre::bail!("mixer.tx_period_ms must be >= 1");
        }
        if !(self.mixer.max_jerk.is_finite() && self.mixer.max_jerk > 0.0) {
            eyre::bail!("mixer.max_jerk must be a finite value > 0");
        }

        // Simulation
        if self.simulation.tick_ms == 0 {
            eyre::bail!("simulation.tick_ms must be >= 1");
        }
        if !(self.simulation.noise_min.is_finite() && self.simulation.noise_max.is_finite()) {
            eyre::bail!("simulation noise bounds must be finite");
        }
        if self.simulation.noise_min >= self.simulation.noise_max {
            eyre::bail!("simulation.noise_min must be < simulation.noise_max");
        }
        if !self.simulation.wave_amplitude.is_finite() {
            eyre::bail!("simulation.wave_amplitude must be finite");
        }

        // Logging
        if let Some(rot) = self.logging.rotation.as_deref() {
            if !matches!(rot, "never" | "daily" | "hourly") {
                eyre::bail!("logging.rotation must be one of never|daily|hourly");
            }
        }

        Ok(())
    }
}
