//! Velocity shaping for a single axis.
//!
//! Two strategies, both pure functions of elapsed time and boundary
//! conditions:
//!
//! - **Ramp**: constant acceleration from the start velocity to the target.
//! - **S-curve**: jerk-limited. Acceleration ramps up at `max_jerk`,
//!   optionally holds at `max_accel`, then ramps back down so the target is
//!   reached with zero acceleration.
//!
//! Limits are magnitudes; the direction comes from `target - start`.

/// Position/velocity/acceleration of one axis.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MotionState {
    pub position: f64,
    pub velocity: f64,
    pub acceleration: f64,
}

impl MotionState {
    pub fn at_rest(position: f64) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    /// Fixed-step semi-implicit Euler integration under the current acceleration.
    pub fn step(&mut self, dt: f64) {
        self.velocity += self.acceleration * dt;
        self.position += self.velocity * dt;
    }

    /// Follow an externally commanded velocity for one step of `dt`.
    /// Acceleration is the finite difference against the previous velocity.
    pub fn track(&mut self, velocity: f64, dt: f64) {
        if dt > 0.0 {
            self.acceleration = (velocity - self.velocity) / dt;
        }
        self.velocity = velocity;
        self.position += velocity * dt;
    }
}

/// Anything that yields a velocity for a time since the profile started.
pub trait VelocityProfile {
    fn velocity_at(&self, t: f64) -> f64;
    /// Time after which the profile holds its target. May be infinite.
    fn duration(&self) -> f64;
}

/// Constant-acceleration velocity ramp.
///
/// Returns `start_vel` for `t <= 0`, `start_vel ± max_accel * t` while
/// ramping, and exactly `target_vel` from the end of the ramp onwards.
pub fn ramp_velocity(t: f64, start_vel: f64, target_vel: f64, max_accel: f64) -> f64 {
    let dv = target_vel - start_vel;
    if dv == 0.0 {
        return target_vel;
    }
    if t <= 0.0 {
        return start_vel;
    }

    let accel = if dv > 0.0 {
        max_accel.abs()
    } else {
        -max_accel.abs()
    };
    let t_ramp = dv / accel;

    if t < t_ramp {
        start_vel + accel * t
    } else {
        target_vel
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RampProfile {
    pub start_vel: f64,
    pub target_vel: f64,
    pub max_accel: f64,
}

impl VelocityProfile for RampProfile {
    fn velocity_at(&self, t: f64) -> f64 {
        ramp_velocity(t, self.start_vel, self.target_vel, self.max_accel)
    }

    fn duration(&self) -> f64 {
        let dv = (self.target_vel - self.start_vel).abs();
        if dv == 0.0 {
            0.0
        } else {
            dv / self.max_accel.abs()
        }
    }
}

/// Which branch the S-curve planner took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileShape {
    /// Start already equals target.
    Flat,
    /// Acceleration peaks below `max_accel`; no cruise phase.
    Triangle,
    /// Acceleration reaches `max_accel` and holds it for a while.
    Trapezoid,
    /// A zero or non-finite limit; the axis can't leave its start velocity.
    Unreachable,
    /// The start acceleration alone would carry past the target, so the
    /// profile only ramps acceleration down to zero. The jerk for that ramp
    /// exceeds `max_jerk` so the velocity lands on the target instead of
    /// overshooting it.
    JerkDown,
}

/// A planned jerk-limited velocity change.
///
/// `accel_jerk`, `jerk` and `peak_accel` carry their own signs. `accel_jerk`
/// drives the first phase and is negative relative to the direction of the
/// change when the start acceleration is already above the limit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SCurveProfile {
    pub start_vel: f64,
    pub start_accel: f64,
    pub target_vel: f64,
    pub accel_jerk: f64,
    pub jerk: f64,
    pub peak_accel: f64,
    pub t_acc: f64,
    pub t_cruise: f64,
    pub t_dec: f64,
    pub shape: ProfileShape,
}

impl SCurveProfile {
    pub fn plan(
        start_vel: f64,
        start_accel: f64,
        target_vel: f64,
        max_accel: f64,
        max_jerk: f64,
    ) -> Self {
        let mut p = Self {
            start_vel,
            start_accel,
            target_vel,
            accel_jerk: 0.0,
            jerk: 0.0,
            peak_accel: 0.0,
            t_acc: 0.0,
            t_cruise: 0.0,
            t_dec: 0.0,
            shape: ProfileShape::Flat,
        };

        let v_error = target_vel - start_vel;
        if v_error == 0.0 {
            return p;
        }
        let limits_ok = max_accel.is_finite()
            && max_jerk.is_finite()
            && max_accel != 0.0
            && max_jerk != 0.0;
        if !limits_ok {
            p.shape = ProfileShape::Unreachable;
            p.t_acc = f64::INFINITY;
            return p;
        }

        let direction = v_error.signum();
        let a = max_accel.abs() * direction;
        let j = max_jerk.abs() * direction;
        p.jerk = j;

        // Bringing the start acceleration to zero at max_jerk already covers the change
        let coast = start_accel * start_accel / (2.0 * j.abs());
        if start_accel * direction > 0.0 && coast >= v_error.abs() {
            let t_dec = 2.0 * v_error / start_accel;
            p.peak_accel = start_accel;
            p.jerk = start_accel / t_dec;
            p.t_dec = t_dec;
            p.shape = ProfileShape::JerkDown;
            return p;
        }

        let v_min = (start_accel * start_accel + a * a) / (2.0 * j.abs());
        if v_error.abs() >= v_min {
            // Above the limit already: the first phase jerks down to it
            let accel_jerk = if (a - start_accel) * direction >= 0.0 { j } else { -j };
            let t_acc = (a - start_accel) / accel_jerk;
            let t_dec = a / j;
            let v_acc = (start_accel + a) * t_acc * 0.5;
            let v_dec = a * 0.5 * t_dec;
            let t_cruise = (v_error - v_acc - v_dec) / a;
            // Past v_min but the accel limit is still out of reach: that is a triangle too
            if t_cruise >= 0.0 {
                p.peak_accel = a;
                p.accel_jerk = accel_jerk;
                p.t_acc = t_acc;
                p.t_cruise = t_cruise;
                p.t_dec = t_dec;
                p.shape = ProfileShape::Trapezoid;
                return p;
            }
        }

        let peak =
            (v_error.abs() * j.abs() + 0.5 * start_accel * start_accel).sqrt() * direction;
        p.peak_accel = peak;
        p.accel_jerk = j;
        // Rounding can leave a hair below zero right at the jerk-down boundary
        p.t_acc = ((peak - start_accel) / j).max(0.0);
        p.t_dec = peak / j;
        p.shape = ProfileShape::Triangle;
        p
    }

    pub fn total_time(&self) -> f64 {
        self.t_acc + self.t_cruise + self.t_dec
    }

    /// Velocity gained over the jerk-up phase.
    fn v_acc(&self) -> f64 {
        (self.start_accel + self.peak_accel) * 0.5 * self.t_acc
    }

    pub fn acceleration_at(&self, t: f64) -> f64 {
        if t <= 0.0 {
            return self.start_accel;
        }
        if self.shape == ProfileShape::Unreachable || t >= self.total_time() {
            return 0.0;
        }
        if t <= self.t_acc {
            self.start_accel + self.accel_jerk * t
        } else if t <= self.t_acc + self.t_cruise {
            self.peak_accel
        } else {
            self.peak_accel - self.jerk * (t - self.t_acc - self.t_cruise)
        }
    }
}

impl VelocityProfile for SCurveProfile {
    fn velocity_at(&self, t: f64) -> f64 {
        if t <= 0.0 {
            return self.start_vel;
        }
        match self.shape {
            ProfileShape::Unreachable => return self.start_vel,
            ProfileShape::Flat => return self.target_vel,
            ProfileShape::Triangle | ProfileShape::Trapezoid | ProfileShape::JerkDown => {}
        }
        if t >= self.total_time() {
            return self.target_vel;
        }

        let v0 = self.start_vel;
        let a0 = self.start_accel;
        let j = self.jerk;
        let peak = self.peak_accel;

        if t <= self.t_acc {
            v0 + a0 * t + 0.5 * self.accel_jerk * t * t
        } else if t <= self.t_acc + self.t_cruise {
            v0 + self.v_acc() + peak * (t - self.t_acc)
        } else {
            let td = t - (self.t_acc + self.t_cruise);
            v0 + self.v_acc() + peak * self.t_cruise + peak * td - 0.5 * j * td * td
        }
    }

    fn duration(&self) -> f64 {
        self.total_time()
    }
}

/// Jerk-limited velocity at time `t` after the change was requested.
pub fn s_curve_velocity(
    t: f64,
    start_vel: f64,
    start_accel: f64,
    target_vel: f64,
    max_accel: f64,
    max_jerk: f64,
) -> f64 {
    SCurveProfile::plan(start_vel, start_accel, target_vel, max_accel, max_jerk).velocity_at(t)
}

/// One row of a tabulated profile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProfileSample {
    pub t: f64,
    pub position: f64,
    pub velocity: f64,
    pub acceleration: f64,
}

/// Drive a `MotionState` along `profile` at a fixed step and record each step.
///
/// Produces `floor(duration / dt) + 1` rows starting at t = 0.
pub fn sample_profile<P: VelocityProfile + ?Sized>(
    profile: &P,
    start: MotionState,
    dt: f64,
    duration: f64,
) -> Vec<ProfileSample> {
    if !(dt > 0.0 && dt.is_finite() && duration >= 0.0 && duration.is_finite()) {
        return Vec::new();
    }
    // Bounded by the finite checks above
    let steps = (duration / dt).floor() as usize;
    let mut state = start;
    state.velocity = profile.velocity_at(0.0);
    let mut out = Vec::with_capacity(steps + 1);
    out.push(ProfileSample {
        t: 0.0,
        position: state.position,
        velocity: state.velocity,
        acceleration: state.acceleration,
    });
    for i in 1..=steps {
        let t = i as f64 * dt;
        state.track(profile.velocity_at(t), dt);
        out.push(ProfileSample {
            t,
            position: state.position,
            velocity: state.velocity,
            acceleration: state.acceleration,
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn ramp_start_and_end() {
        assert_eq!(ramp_velocity(0.0, 5.0, 30.0, 10.0), 5.0);
        let t_ramp = (30.0 - 0.0) / 10.0;
        assert_eq!(ramp_velocity(t_ramp, 0.0, 30.0, 10.0), 30.0);
        assert_eq!(ramp_velocity(t_ramp + 5.0, 0.0, 30.0, 10.0), 30.0);
    }

    #[test]
    fn ramp_slope_matches_max_accel() {
        let v1 = ramp_velocity(0.5, 0.0, 30.0, 10.0);
        let v2 = ramp_velocity(1.0, 0.0, 30.0, 10.0);
        assert!(((v2 - v1) - 10.0 * 0.5).abs() < 1e-2 * 5.0);
    }

    #[test]
    fn ramp_equal_start_and_target_is_constant() {
        assert_eq!(ramp_velocity(10.0, 20.0, 20.0, 5.0), 20.0);
        assert_eq!(ramp_velocity(0.0, 20.0, 20.0, 5.0), 20.0);
    }

    #[test]
    fn ramp_downwards_decreases() {
        let v1 = ramp_velocity(0.5, 30.0, 0.0, 10.0);
        let v2 = ramp_velocity(1.0, 30.0, 0.0, 10.0);
        assert!(v2 < v1);
        assert_eq!(ramp_velocity(3.0, 30.0, 0.0, 10.0), 0.0);
    }

    #[test]
    fn ramp_with_zero_accel_never_moves() {
        assert_eq!(ramp_velocity(100.0, 1.0, 2.0, 0.0), 1.0);
    }

    #[test]
    fn s_curve_terminal_conditions() {
        let p = SCurveProfile::plan(0.0, 0.0, 30.0, 15.0, 10.0);
        assert_eq!(p.velocity_at(0.0), 0.0);
        assert_eq!(p.velocity_at(-1.0), 0.0);
        assert_eq!(p.velocity_at(p.total_time()), 30.0);
        assert_eq!(p.velocity_at(p.total_time() + 10.0), 30.0);
    }

    #[test]
    fn s_curve_small_change_is_triangle() {
        // v_min = (0 + 15^2) / (2 * 10) = 11.25
        let p = SCurveProfile::plan(0.0, 0.0, 5.0, 15.0, 10.0);
        assert_eq!(p.shape, ProfileShape::Triangle);
        assert_eq!(p.t_cruise, 0.0);
        assert!(p.peak_accel < 15.0);
        // Triangle peak: sqrt(|dv| * |j|) = sqrt(50)
        assert!((p.peak_accel - 50f64.sqrt()).abs() < EPS);
    }

    #[test]
    fn s_curve_large_change_is_trapezoid() {
        let p = SCurveProfile::plan(0.0, 0.0, 30.0, 15.0, 10.0);
        assert_eq!(p.shape, ProfileShape::Trapezoid);
        assert_eq!(p.peak_accel, 15.0);
        assert!(p.t_cruise > 0.0);
        let mid = p.t_acc + p.t_cruise / 2.0;
        assert!((p.acceleration_at(mid) - 15.0).abs() < EPS);
    }

    #[test]
    fn s_curve_is_continuous_at_phase_boundaries() {
        for p in [
            SCurveProfile::plan(2.0, 0.0, 30.0, 15.0, 10.0),
            SCurveProfile::plan(2.0, 1.0, 6.0, 15.0, 10.0),
            SCurveProfile::plan(40.0, 0.0, -10.0, 12.0, 30.0),
            SCurveProfile::plan(0.0, 10.0, 4.0, 15.0, 10.0),
            SCurveProfile::plan(0.0, 20.0, 100.0, 15.0, 10.0),
            SCurveProfile::plan(0.0, -12.0, 30.0, 15.0, 10.0),
        ] {
            assert!((p.velocity_at(1e-7) - p.start_vel).abs() < 1e-4, "{p:?} jumps at 0");
            for edge in [p.t_acc, p.t_acc + p.t_cruise, p.total_time()] {
                let before = p.velocity_at(edge - 1e-7);
                let after = p.velocity_at(edge + 1e-7);
                assert!((before - after).abs() < 1e-4, "{p:?} jumps at {edge}");
            }
        }
    }

    #[test]
    fn s_curve_downward_mirrors_upward() {
        let up = SCurveProfile::plan(0.0, 0.0, 30.0, 15.0, 10.0);
        let down = SCurveProfile::plan(0.0, 0.0, -30.0, 15.0, 10.0);
        assert_eq!(down.shape, ProfileShape::Trapezoid);
        for i in 0..50 {
            let t = i as f64 * 0.1;
            assert!((up.velocity_at(t) + down.velocity_at(t)).abs() < EPS);
        }
    }

    #[test]
    fn s_curve_gap_above_v_min_falls_back_to_triangle() {
        // v_min = 11.25 but reaching 15 and back takes 22.5; 15 sits in between
        let p = SCurveProfile::plan(0.0, 0.0, 15.0, 15.0, 10.0);
        assert_eq!(p.shape, ProfileShape::Triangle);
        assert!(p.peak_accel <= 15.0 + EPS);
        assert_eq!(p.velocity_at(p.total_time()), 15.0);
    }

    #[test]
    fn large_start_accel_only_jerks_down() {
        // Coasting a0 = 10 to zero at j = 10 gains 5, more than the 1 asked for
        let p = SCurveProfile::plan(0.0, 10.0, 1.0, 15.0, 10.0);
        assert_eq!(p.shape, ProfileShape::JerkDown);
        assert_eq!(p.t_acc, 0.0);
        assert!((p.t_dec - 0.2).abs() < EPS);
        assert!((p.velocity_at(1e-6) - 1e-5).abs() < 1e-6);
        let mut prev = 0.0;
        for i in 1..=20 {
            let v = p.velocity_at(i as f64 * 0.01);
            assert!(v >= prev && v <= 1.0 + EPS, "v={v} at step {i}");
            prev = v;
        }
        assert_eq!(p.velocity_at(0.2), 1.0);
        assert!((p.acceleration_at(0.1) - 5.0).abs() < EPS);
    }

    #[test]
    fn start_accel_above_limit_ramps_down_to_it() {
        let p = SCurveProfile::plan(0.0, 20.0, 100.0, 15.0, 10.0);
        assert_eq!(p.shape, ProfileShape::Trapezoid);
        assert!((p.t_acc - 0.5).abs() < EPS);
        assert!(p.accel_jerk < 0.0);
        assert!((p.acceleration_at(0.25) - 17.5).abs() < EPS);
        assert_eq!(p.velocity_at(p.total_time()), 100.0);
    }

    #[test]
    fn s_curve_flat_and_unreachable() {
        let flat = SCurveProfile::plan(3.0, 0.0, 3.0, 15.0, 10.0);
        assert_eq!(flat.shape, ProfileShape::Flat);
        assert_eq!(flat.velocity_at(1.0), 3.0);

        let stuck = SCurveProfile::plan(3.0, 0.0, 9.0, 0.0, 10.0);
        assert_eq!(stuck.shape, ProfileShape::Unreachable);
        assert_eq!(stuck.velocity_at(1e6), 3.0);
    }

    #[test]
    fn free_function_matches_plan() {
        let p = SCurveProfile::plan(1.0, 0.5, 20.0, 8.0, 4.0);
        for i in 0..40 {
            let t = i as f64 * 0.25;
            assert_eq!(s_curve_velocity(t, 1.0, 0.5, 20.0, 8.0, 4.0), p.velocity_at(t));
        }
    }

    #[test]
    fn integrator_steps_under_constant_acceleration() {
        let mut s = MotionState {
            position: 0.0,
            velocity: 0.0,
            acceleration: 2.0,
        };
        for _ in 0..10 {
            s.step(0.1);
        }
        assert!((s.velocity - 2.0).abs() < EPS);
        assert!(s.position > 0.0);
    }

    #[test]
    fn sample_profile_ends_on_target() {
        let ramp = RampProfile {
            start_vel: 0.0,
            target_vel: 30.0,
            max_accel: 10.0,
        };
        let rows = sample_profile(&ramp, MotionState::at_rest(0.0), 0.01, 5.0);
        assert_eq!(rows.len(), 501);
        assert_eq!(rows[0].velocity, 0.0);
        assert_eq!(rows.last().map(|r| r.velocity), Some(30.0));
        assert!(rows.windows(2).all(|w| w[1].position >= w[0].position));
    }

    #[test]
    fn sample_profile_rejects_bad_step() {
        let ramp = RampProfile {
            start_vel: 0.0,
            target_vel: 1.0,
            max_accel: 1.0,
        };
        assert!(sample_profile(&ramp, MotionState::default(), 0.0, 1.0).is_empty());
    }
}
