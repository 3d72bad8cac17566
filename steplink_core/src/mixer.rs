//! Input-to-command mixing.
//!
//! The left stick drives steppers 0 and 1 directly. The right stick is
//! rotated so that pushing it forward drives the coupled pair (2, 3) in the
//! same "forward" sense:
//!
//! ```text
//! vert  =  right_vert  / 1.4
//! horiz = -right_horiz / 1.4
//! s2 =  vert + horiz
//! s3 = -vert + horiz
//! ```
//!
//! Every speed is multiplied by its gain and truncated toward zero.
use crate::config::{MixerCfg, Shaping};
use crate::motion::{ramp_velocity, s_curve_velocity};
use crate::packet::CommandPacket;
use crate::sampler::InputSample;
use crate::util::truncate_to_i32;
use std::sync::Arc;
use std::sync::atomic::{AtomicI32, Ordering};

/// Axis order in `InputSample::axes`.
pub const LEFT_HORIZ: usize = 0;
pub const LEFT_VERT: usize = 1;
pub const RIGHT_HORIZ: usize = 2;
pub const RIGHT_VERT: usize = 3;

/// Divisor applied to both right-stick components before they are mixed.
pub const PAIR_DIVISOR: f64 = 1.4;

/// The four operator-tunable values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MixerGains {
    pub speed0_scale: i32,
    pub speed1_scale: i32,
    pub speed23_scale: i32,
    pub max_acceleration: i32,
}

impl Default for MixerGains {
    fn default() -> Self {
        Self {
            speed0_scale: 3 * 800 * 8,
            speed1_scale: 800 * 8,
            speed23_scale: 800 * 8,
            max_acceleration: 50_000,
        }
    }
}

/// Gains shared between the session and whoever tunes them (UI, CLI).
///
/// Each field is read and written independently; a reader may observe a
/// mix of old and new values while a `set` is in progress.
#[derive(Debug, Clone)]
pub struct GainsHandle {
    inner: Arc<[AtomicI32; 4]>,
}

impl GainsHandle {
    pub fn new(gains: MixerGains) -> Self {
        Self {
            inner: Arc::new([
                AtomicI32::new(gains.speed0_scale),
                AtomicI32::new(gains.speed1_scale),
                AtomicI32::new(gains.speed23_scale),
                AtomicI32::new(gains.max_acceleration),
            ]),
        }
    }

    pub fn get(&self) -> MixerGains {
        MixerGains {
            speed0_scale: self.inner[0].load(Ordering::Relaxed),
            speed1_scale: self.inner[1].load(Ordering::Relaxed),
            speed23_scale: self.inner[2].load(Ordering::Relaxed),
            max_acceleration: self.inner[3].load(Ordering::Relaxed),
        }
    }

    pub fn set(&self, gains: MixerGains) {
        self.inner[0].store(gains.speed0_scale, Ordering::Relaxed);
        self.inner[1].store(gains.speed1_scale, Ordering::Relaxed);
        self.inner[2].store(gains.speed23_scale, Ordering::Relaxed);
        self.inner[3].store(gains.max_acceleration, Ordering::Relaxed);
    }

    pub fn set_max_acceleration(&self, v: i32) {
        self.inner[3].store(v, Ordering::Relaxed);
    }
}

impl Default for GainsHandle {
    fn default() -> Self {
        Self::new(MixerGains::default())
    }
}

/// Pure mixing rule: axes in, command out.
pub fn mix(axes: [f32; 4], gains: &MixerGains) -> CommandPacket {
    let vert = f64::from(axes[RIGHT_VERT]) / PAIR_DIVISOR;
    let horiz = -f64::from(axes[RIGHT_HORIZ]) / PAIR_DIVISOR;

    let s0 = f64::from(axes[LEFT_HORIZ]);
    let s1 = f64::from(axes[LEFT_VERT]);
    let s2 = vert + horiz;
    let s3 = -vert + horiz;

    CommandPacket {
        speed: [
            truncate_to_i32(f64::from(gains.speed0_scale) * s0),
            truncate_to_i32(f64::from(gains.speed1_scale) * s1),
            truncate_to_i32(f64::from(gains.speed23_scale) * s2),
            truncate_to_i32(f64::from(gains.speed23_scale) * s3),
        ],
        max_acceleration: gains.max_acceleration,
    }
}

/// Stateful mixer: applies the current gains and optional shaping from the
/// previously produced command.
#[derive(Debug)]
pub struct CommandMixer {
    gains: GainsHandle,
    cfg: MixerCfg,
    previous: Option<CommandPacket>,
}

impl CommandMixer {
    pub fn new(gains: GainsHandle, cfg: MixerCfg) -> Self {
        Self {
            gains,
            cfg,
            previous: None,
        }
    }

    pub fn gains(&self) -> &GainsHandle {
        &self.gains
    }

    /// Command for the newest input sample.
    ///
    /// With shaping enabled each speed moves from the previous command
    /// toward the mixed target by at most what one tx period allows.
    pub fn next_command(&mut self, sample: &InputSample) -> CommandPacket {
        let gains = self.gains.get();
        let target = mix(sample.axes, &gains);
        let shaped = match self.previous {
            Some(prev) => shape(&prev, &target, self.cfg.shaping, self.cfg.tx_period.as_secs_f64()),
            None => target,
        };
        self.previous = Some(shaped);
        shaped
    }
}

fn shape(prev: &CommandPacket, target: &CommandPacket, shaping: Shaping, dt: f64) -> CommandPacket {
    let max_accel = f64::from(target.max_acceleration);
    if max_accel <= 0.0 {
        return *target;
    }
    let mut out = *target;
    for (i, slot) in out.speed.iter_mut().enumerate() {
        let from = f64::from(prev.speed[i]);
        let to = f64::from(target.speed[i]);
        let v = match shaping {
            Shaping::None => to,
            Shaping::Ramp => ramp_velocity(dt, from, to, max_accel),
            Shaping::SCurve { max_jerk } => s_curve_velocity(dt, from, 0.0, to, max_accel, max_jerk),
        };
        *slot = truncate_to_i32(v);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn sample(axes: [f32; 4]) -> InputSample {
        InputSample::new(0, axes)
    }

    #[test]
    fn default_gains_match_hardware_tuning() {
        let g = MixerGains::default();
        assert_eq!(g.speed0_scale, 19_200);
        assert_eq!(g.speed1_scale, 6_400);
        assert_eq!(g.speed23_scale, 6_400);
        assert_eq!(g.max_acceleration, 50_000);
    }

    #[test]
    fn left_stick_passes_straight_through() {
        let cmd = mix([0.5, -0.25, 0.0, 0.0], &MixerGains::default());
        assert_eq!(cmd.speed, [9_600, -1_600, 0, 0]);
        assert_eq!(cmd.max_acceleration, 50_000);
    }

    #[test]
    fn right_stick_forward_drives_pair_in_opposition() {
        let gains = MixerGains {
            speed23_scale: 1_400,
            ..MixerGains::default()
        };
        let cmd = mix([0.0, 0.0, 0.0, 1.0], &gains);
        assert_eq!(cmd.speed[2], 1_000);
        assert_eq!(cmd.speed[3], -1_000);
    }

    #[test]
    fn right_stick_sideways_drives_pair_together() {
        let gains = MixerGains {
            speed23_scale: 1_400,
            ..MixerGains::default()
        };
        let cmd = mix([0.0, 0.0, 1.0, 0.0], &gains);
        assert_eq!(cmd.speed[2], -1_000);
        assert_eq!(cmd.speed[3], -1_000);
    }

    #[test]
    fn speeds_truncate_toward_zero() {
        let gains = MixerGains {
            speed0_scale: 10,
            speed1_scale: 10,
            ..MixerGains::default()
        };
        let cmd = mix([0.19, -0.19, 0.0, 0.0], &gains);
        assert_eq!(cmd.speed[0], 1);
        assert_eq!(cmd.speed[1], -1);
    }

    #[test]
    fn gains_handle_is_shared_between_clones() {
        let a = GainsHandle::default();
        let b = a.clone();
        b.set_max_acceleration(123);
        assert_eq!(a.get().max_acceleration, 123);
    }

    #[test]
    fn mixer_picks_up_gain_changes() {
        let gains = GainsHandle::default();
        let mut m = CommandMixer::new(gains.clone(), MixerCfg::default());
        let s = sample([1.0, 0.0, 0.0, 0.0]);
        assert_eq!(m.next_command(&s).speed[0], 19_200);
        gains.set(MixerGains {
            speed0_scale: 100,
            ..MixerGains::default()
        });
        assert_eq!(m.next_command(&s).speed[0], 100);
    }

    #[test]
    fn ramp_shaping_limits_per_period_change() {
        let gains = GainsHandle::new(MixerGains {
            speed0_scale: 10_000,
            max_acceleration: 1_000,
            ..MixerGains::default()
        });
        let cfg = MixerCfg {
            tx_period: Duration::from_millis(100),
            shaping: Shaping::Ramp,
        };
        let mut m = CommandMixer::new(gains, cfg);
        // First command seeds the history unshaped
        assert_eq!(m.next_command(&sample([0.0; 4])).speed[0], 0);
        // 1000 steps/s^2 over 0.1 s allows 100 steps/s
        assert_eq!(m.next_command(&sample([1.0, 0.0, 0.0, 0.0])).speed[0], 100);
        assert_eq!(m.next_command(&sample([1.0, 0.0, 0.0, 0.0])).speed[0], 200);
    }

    #[test]
    fn s_curve_shaping_moves_toward_target_without_overshoot() {
        let gains = GainsHandle::new(MixerGains {
            speed0_scale: 10_000,
            max_acceleration: 50_000,
            ..MixerGains::default()
        });
        let cfg = MixerCfg {
            tx_period: Duration::from_millis(30),
            shaping: Shaping::SCurve { max_jerk: 200_000.0 },
        };
        let mut m = CommandMixer::new(gains, cfg);
        m.next_command(&sample([0.0; 4]));
        let mut last = 0;
        for _ in 0..200 {
            let v = m.next_command(&sample([1.0, 0.0, 0.0, 0.0])).speed[0];
            assert!(v >= last && v <= 10_000, "{v} after {last}");
            last = v;
        }
        assert_eq!(last, 10_000);
    }
}
