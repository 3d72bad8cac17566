//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "steplink", version, about = "Host link for the stepper controller")]
pub struct Cli {
    /// Path to config TOML; a missing file means built-in defaults
    #[arg(long, value_name = "FILE", default_value = "etc/steplink.toml")]
    pub config: PathBuf,

    /// Log and report as JSON instead of pretty text
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Log level (error|warn|info|debug|trace); beats [logging].level, RUST_LOG beats both
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum ProfileKind {
    /// Constant acceleration
    Ramp,
    /// Jerk-limited
    SCurve,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Connect (or simulate), stream telemetry and send joystick commands
    Run {
        /// Stop after this many milliseconds (default: until Ctrl-C)
        #[arg(long, value_name = "MS")]
        duration_ms: Option<u64>,
        /// Skip port discovery and use the simulated device
        #[arg(long, action = ArgAction::SetTrue)]
        simulate: bool,
        /// Run without an input device (all commands are zero)
        #[arg(long, action = ArgAction::SetTrue)]
        no_input: bool,
        /// Log link statistics once per second
        #[arg(long, action = ArgAction::SetTrue)]
        stats: bool,
    },
    /// List serial ports that look like a controller
    Ports,
    /// Tabulate a velocity profile as CSV
    Profile {
        #[arg(long, value_enum, default_value = "ramp")]
        kind: ProfileKind,
        /// Start velocity (steps/s)
        #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
        start: f64,
        /// Target velocity (steps/s)
        #[arg(long, allow_hyphen_values = true)]
        target: f64,
        /// Acceleration limit (steps/s^2)
        #[arg(long, default_value_t = 50_000.0)]
        max_accel: f64,
        /// Jerk limit (steps/s^3), s-curve only
        #[arg(long, default_value_t = 200_000.0)]
        max_jerk: f64,
        /// Initial acceleration (steps/s^2), s-curve only
        #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
        start_accel: f64,
        /// Time step in seconds
        #[arg(long, default_value_t = 0.001)]
        dt: f64,
        /// Seconds to tabulate (default: the profile's own duration)
        #[arg(long)]
        duration: Option<f64>,
        /// Write CSV here instead of stdout
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
    },
    /// Validate config and exercise the wire codec
    SelfCheck,
}
