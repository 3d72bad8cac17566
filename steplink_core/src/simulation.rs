//! Synthetic telemetry for running without a device.
//!
//! The generator mimics a stepper rig loosely: stepper 1's echo wanders
//! around the commanded speed with a slow cosine swell plus bounded noise,
//! the other echoes repeat their commands, and the open-loop angle relaxes
//! toward the previous echo by a fifth of the gap each tick.
use crate::config::SimCfg;
use crate::packet::{CommandPacket, SystemState, TelemetryPacket};
use crate::util::truncate_to_i32;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Fraction of the angle error closed per tick.
const RELAX_DIVISOR: f64 = 5.0;

pub struct TelemetrySynth {
    cfg: SimCfg,
    rng: StdRng,
    prev_angle: i32,
    prev_open_loop: i32,
}

impl TelemetrySynth {
    pub fn new(cfg: SimCfg) -> Self {
        let rng = match cfg.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            cfg,
            rng,
            prev_angle: 0,
            prev_open_loop: 0,
        }
    }

    fn noise(&mut self) -> f64 {
        let (lo, hi) = (self.cfg.noise_min, self.cfg.noise_max);
        // Degenerate or non-finite bounds yield the lower bound
        if lo < hi && lo.is_finite() && hi.is_finite() {
            self.rng.random_range(lo..hi)
        } else if lo.is_finite() {
            lo
        } else {
            0.0
        }
    }

    /// One telemetry frame at `now_ms` (ms since the generator started),
    /// given the most recent command.
    pub fn next_packet(&mut self, cmd: &CommandPacket, now_ms: u32) -> TelemetryPacket {
        let swell = (self.cfg.wave_amplitude * (f64::from(now_ms) / 1000.0).cos()).abs();
        let echo1 = cmd.speed[1].saturating_add(truncate_to_i32(swell + self.noise()));

        let error = f64::from(self.prev_angle) - f64::from(self.prev_open_loop);
        let open_loop = truncate_to_i32(f64::from(self.prev_open_loop) + error / RELAX_DIVISOR);

        self.prev_angle = echo1;
        self.prev_open_loop = open_loop;

        TelemetryPacket {
            timestamp: now_ms,
            echo_speed: [cmd.speed[0], echo1, cmd.speed[2], cmd.speed[3]],
            encoder_angle: 0,
            open_loop_angle: open_loop,
            state: SystemState::Ok,
        }
    }

    pub fn prev_angle(&self) -> i32 {
        self.prev_angle
    }

    pub fn prev_open_loop(&self) -> i32 {
        self.prev_open_loop
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiet() -> SimCfg {
        SimCfg {
            noise_min: 0.0,
            noise_max: 0.0,
            wave_amplitude: 0.0,
            seed: Some(1),
            ..SimCfg::default()
        }
    }

    #[test]
    fn echoes_follow_command() {
        let mut s = TelemetrySynth::new(quiet());
        let cmd = CommandPacket {
            speed: [1, 2, 3, 4],
            max_acceleration: 9,
        };
        let p = s.next_packet(&cmd, 10);
        assert_eq!(p.timestamp, 10);
        assert_eq!(p.echo_speed, [1, 2, 3, 4]);
        assert_eq!(p.encoder_angle, 0);
        assert_eq!(p.state, SystemState::Ok);
    }

    #[test]
    fn open_loop_relaxes_toward_previous_echo() {
        let mut s = TelemetrySynth::new(quiet());
        let cmd = CommandPacket {
            speed: [0, 1000, 0, 0],
            max_acceleration: 1,
        };
        // Tick 1 sees prev angle 0, so open loop stays at 0
        assert_eq!(s.next_packet(&cmd, 0).open_loop_angle, 0);
        assert_eq!(s.prev_angle(), 1000);
        // Then 0 + (1000 - 0) / 5
        assert_eq!(s.next_packet(&cmd, 3).open_loop_angle, 200);
        // 200 + (1000 - 200) / 5
        assert_eq!(s.next_packet(&cmd, 6).open_loop_angle, 360);
    }

    #[test]
    fn noise_stays_in_bounds() {
        let mut s = TelemetrySynth::new(SimCfg {
            wave_amplitude: 0.0,
            seed: Some(7),
            ..SimCfg::default()
        });
        let cmd = CommandPacket::default();
        for t in 0..500 {
            let e = s.next_packet(&cmd, t).echo_speed[1];
            assert!((-7..16).contains(&e), "echo1 {e}");
        }
    }

    #[test]
    fn swell_peaks_at_amplitude() {
        let mut s = TelemetrySynth::new(SimCfg {
            noise_min: 0.0,
            noise_max: 0.0,
            ..SimCfg::default()
        });
        let p = s.next_packet(&CommandPacket::default(), 0);
        assert_eq!(p.echo_speed[1], 360);
    }

    #[test]
    fn same_seed_same_stream() {
        let cfg = SimCfg {
            seed: Some(42),
            ..SimCfg::default()
        };
        let mut a = TelemetrySynth::new(cfg);
        let mut b = TelemetrySynth::new(cfg);
        let cmd = CommandPacket::default();
        for t in 0..50 {
            assert_eq!(a.next_packet(&cmd, t), b.next_packet(&cmd, t));
        }
    }
}
