//! The `profile` command: tabulate a velocity profile as CSV.

use std::io::Write;
use std::path::Path;

use eyre::WrapErr;
use steplink_core::motion::{
    MotionState, RampProfile, SCurveProfile, VelocityProfile, sample_profile,
};

use crate::cli::ProfileKind;

#[derive(Debug, Clone, Copy)]
pub struct ProfileArgs {
    pub kind: ProfileKind,
    pub start: f64,
    pub target: f64,
    pub max_accel: f64,
    pub max_jerk: f64,
    pub start_accel: f64,
    pub dt: f64,
    pub duration: Option<f64>,
}

fn check(args: &ProfileArgs) -> eyre::Result<()> {
    if !(args.dt.is_finite() && args.dt > 0.0) {
        eyre::bail!("--dt must be a finite value > 0");
    }
    if !(args.max_accel.is_finite() && args.max_accel > 0.0) {
        eyre::bail!("--max-accel must be a finite value > 0");
    }
    if args.kind == ProfileKind::SCurve && !(args.max_jerk.is_finite() && args.max_jerk > 0.0) {
        eyre::bail!("--max-jerk must be a finite value > 0");
    }
    if !(args.start.is_finite() && args.target.is_finite() && args.start_accel.is_finite()) {
        eyre::bail!("velocities must be finite");
    }
    if args.duration.is_some_and(|d| !(d.is_finite() && d >= 0.0)) {
        eyre::bail!("--duration must be a finite value >= 0");
    }
    Ok(())
}

/// Write `t,position,velocity,acceleration` rows to `out`.
pub fn write_profile<W: Write>(args: &ProfileArgs, out: W) -> eyre::Result<usize> {
    check(args)?;
    let profile: Box<dyn VelocityProfile> = match args.kind {
        ProfileKind::Ramp => Box::new(RampProfile {
            start_vel: args.start,
            target_vel: args.target,
            max_accel: args.max_accel,
        }),
        ProfileKind::SCurve => Box::new(SCurveProfile::plan(
            args.start,
            args.start_accel,
            args.target,
            args.max_accel,
            args.max_jerk,
        )),
    };
    // One extra step so the table ends on the settled value
    let duration = args.duration.unwrap_or_else(|| profile.duration() + args.dt);
    if !duration.is_finite() {
        eyre::bail!("profile never settles; pass --duration");
    }

    let mut start = MotionState::at_rest(0.0);
    start.acceleration = if args.kind == ProfileKind::SCurve {
        args.start_accel
    } else {
        0.0
    };
    let rows = sample_profile(profile.as_ref(), start, args.dt, duration);

    let mut w = csv::Writer::from_writer(out);
    w.write_record(["t", "position", "velocity", "acceleration"])?;
    for r in &rows {
        w.write_record([
            format!("{:.6}", r.t),
            format!("{:.6}", r.position),
            format!("{:.6}", r.velocity),
            format!("{:.6}", r.acceleration),
        ])?;
    }
    w.flush()?;
    Ok(rows.len())
}

/// Write to `path`, or stdout when no path is given.
pub fn run(args: &ProfileArgs, path: Option<&Path>) -> eyre::Result<usize> {
    match path {
        Some(p) => {
            let file = std::fs::File::create(p)
                .wrap_err_with(|| format!("create {}", p.display()))?;
            write_profile(args, file)
        }
        None => write_profile(args, std::io::stdout().lock()),
    }
}
