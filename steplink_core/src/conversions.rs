//! `From` implementations bridging `steplink_config` types to the runtime
//! structs in `config` and `mixer`.

use std::time::Duration;

use crate::config::{BufferCfg, LinkCfg, MixerCfg, SamplerCfg, Shaping, SimCfg};
use crate::mixer::MixerGains;

// ── LinkCfg ──────────────────────────────────────────────────────────────────

impl From<&steplink_config::LinkCfg> for LinkCfg {
    fn from(c: &steplink_config::LinkCfg) -> Self {
        Self {
            baud_rate: c.baud_rate,
            settle: Duration::from_millis(c.settle_ms),
            read_timeout: Duration::from_millis(c.read_timeout_ms),
            probe_timeout: Duration::from_millis(c.probe_timeout_ms),
            port: c.port.clone(),
            force_simulation: c.force_simulation,
        }
    }
}

// ── BufferCfg ────────────────────────────────────────────────────────────────

impl From<&steplink_config::BuffersCfg> for BufferCfg {
    fn from(c: &steplink_config::BuffersCfg) -> Self {
        Self {
            telemetry_capacity: c.telemetry_capacity,
            input_capacity: c.input_capacity,
            rx_queue_capacity: c.rx_queue_capacity,
            input_queue_capacity: c.input_queue_capacity,
        }
    }
}

// ── SamplerCfg ───────────────────────────────────────────────────────────────

impl From<&steplink_config::SamplerCfg> for SamplerCfg {
    fn from(c: &steplink_config::SamplerCfg) -> Self {
        Self {
            period: Duration::from_millis(c.period_ms),
            idle: Duration::from_millis(c.idle_ms),
        }
    }
}

// ── Mixer ────────────────────────────────────────────────────────────────────

impl From<&steplink_config::MixerCfg> for MixerCfg {
    fn from(c: &steplink_config::MixerCfg) -> Self {
        let shaping = match c.shaping {
            steplink_config::ShapingMode::None => Shaping::None,
            steplink_config::ShapingMode::Ramp => Shaping::Ramp,
            steplink_config::ShapingMode::SCurve => Shaping::SCurve {
                max_jerk: c.max_jerk,
            },
        };
        Self {
            tx_period: Duration::from_millis(c.tx_period_ms),
            shaping,
        }
    }
}

impl From<&steplink_config::MixerCfg> for MixerGains {
    fn from(c: &steplink_config::MixerCfg) -> Self {
        Self {
            speed0_scale: c.speed0_scale,
            speed1_scale: c.speed1_scale,
            speed23_scale: c.speed23_scale,
            max_acceleration: c.max_acceleration,
        }
    }
}

// ── SimCfg ───────────────────────────────────────────────────────────────────

impl From<&steplink_config::SimulationCfg> for SimCfg {
    fn from(c: &steplink_config::SimulationCfg) -> Self {
        Self {
            tick: Duration::from_millis(c.tick_ms),
            noise_min: c.noise_min,
            noise_max: c.noise_max,
            wave_amplitude: c.wave_amplitude,
            seed: c.seed,
            ..SimCfg::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toml_defaults_map_onto_runtime_defaults() {
        let cfg = steplink_config::Config::default();
        assert_eq!(LinkCfg::from(&cfg.link), LinkCfg::default());
        assert_eq!(BufferCfg::from(&cfg.buffers), BufferCfg::default());
        assert_eq!(SamplerCfg::from(&cfg.sampler), SamplerCfg::default());
        assert_eq!(MixerCfg::from(&cfg.mixer), MixerCfg::default());
        assert_eq!(MixerGains::from(&cfg.mixer), MixerGains::default());
        assert_eq!(SimCfg::from(&cfg.simulation), SimCfg::default());
    }

    #[test]
    fn s_curve_shaping_carries_jerk() {
        let cfg = steplink_config::load_toml("[mixer]\nshaping = \"s_curve\"\nmax_jerk = 1000.0\n")
            .unwrap();
        assert_eq!(
            MixerCfg::from(&cfg.mixer).shaping,
            Shaping::SCurve { max_jerk: 1000.0 }
        );
    }
}
