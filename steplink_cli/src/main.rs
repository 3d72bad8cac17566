#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]

mod cli;
mod error_fmt;
mod profile;
mod run;

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use clap::Parser;
use eyre::WrapErr;
use steplink_config::{Config, Logging};
use steplink_core::error::LinkError;
use steplink_core::frame::{decode_frame, encode_command_frame, encode_frame};
use steplink_core::packet::{
    CommandPacket, SystemState, TelemetryPacket, decode_command, decode_telemetry,
    encode_telemetry,
};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use crate::cli::{Cli, Commands, FILE_GUARD, JSON_MODE};
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};

fn main() {
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);
    if !cli.json {
        let _ = color_eyre::install();
    }

    if let Err(e) = real_main(cli) {
        if JSON_MODE.get().copied().unwrap_or(false) {
            eprintln!("{}", format_error_json(&e));
        } else {
            eprintln!("{}", humanize(&e));
        }
        std::process::exit(exit_code_for_error(&e));
    }
}

fn load_config(path: &Path) -> eyre::Result<Config> {
    let cfg = steplink_config::load_file(path)
        .map_err(|e| eyre::Report::new(LinkError::Config(e.to_string())))?;
    cfg.validate()
        .map_err(|e| eyre::Report::new(LinkError::Config(e.to_string())))?;
    Ok(cfg)
}

fn init_tracing(cli: &Cli, logging: &Logging) {
    let level = cli
        .log_level
        .as_deref()
        .or(logging.level.as_deref())
        .unwrap_or("info");
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // Console logs go to stderr; stdout carries command output
    let console = if cli.json {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .boxed()
    };

    let file_layer = logging.file.as_deref().map(|file| {
        let path = Path::new(file);
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let name = path
            .file_name()
            .map_or_else(|| "steplink.log".into(), |n| n.to_string_lossy().into_owned());
        let appender = match logging.rotation.as_deref() {
            Some("daily") => tracing_appender::rolling::daily(dir, name),
            Some("hourly") => tracing_appender::rolling::hourly(dir, name),
            _ => tracing_appender::rolling::never(dir, name),
        };
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let _ = FILE_GUARD.set(guard);
        fmt::layer().json().with_ansi(false).with_writer(writer).boxed()
    });

    let _ = tracing_subscriber::registry()
        .with(console)
        .with(file_layer)
        .with(filter)
        .try_init();
}

fn real_main(cli: Cli) -> eyre::Result<()> {
    let cfg = load_config(&cli.config)?;
    init_tracing(&cli, &cfg.logging);
    tracing::debug!(config = %cli.config.display(), "config loaded");

    match &cli.cmd {
        Commands::Run {
            duration_ms,
            simulate,
            no_input,
            stats,
        } => {
            let shutdown = Arc::new(AtomicBool::new(false));
            let flag = shutdown.clone();
            ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed))
                .wrap_err("installing Ctrl-C handler")?;
            let opts = run::RunOptions {
                duration: duration_ms.map(Duration::from_millis),
                simulate: *simulate,
                no_input: *no_input,
                stats: *stats,
            };
            let summary = run::run(&cfg, opts, &shutdown)?;
            println!("{}", run::render_summary(&summary, cli.json));
        }
        Commands::Ports => {
            let ports = run::candidate_ports(&cfg)?;
            if cli.json {
                println!("{}", serde_json::json!({ "ports": ports }));
            } else if ports.is_empty() {
                println!("no candidate ports found");
            } else {
                for p in &ports {
                    println!("{p}");
                }
            }
        }
        Commands::Profile {
            kind,
            start,
            target,
            max_accel,
            max_jerk,
            start_accel,
            dt,
            duration,
            out,
        } => {
            let args = profile::ProfileArgs {
                kind: *kind,
                start: *start,
                target: *target,
                max_accel: *max_accel,
                max_jerk: *max_jerk,
                start_accel: *start_accel,
                dt: *dt,
                duration: *duration,
            };
            let rows = profile::run(&args, out.as_deref())?;
            tracing::debug!(rows, "profile written");
        }
        Commands::SelfCheck => {
            self_check()?;
            if cli.json {
                println!("{}", serde_json::json!({ "self_check": "ok" }));
            } else {
                println!("self-check ok");
            }
        }
    }
    Ok(())
}

/// Push a command and a telemetry packet through the full codec and framing.
fn self_check() -> eyre::Result<()> {
    let cmd = CommandPacket {
        speed: [19_200, -6400, 4571, -4571],
        max_acceleration: 50_000,
    };
    let frame = encode_command_frame(&cmd);
    if frame.iter().filter(|&&b| b == 0).count() != 1 || frame.last() != Some(&0) {
        eyre::bail!("command frame is not zero-terminated");
    }
    let payload = decode_frame(&frame[..frame.len() - 1])?;
    if decode_command(&payload)? != cmd {
        eyre::bail!("command codec mismatch");
    }

    let telemetry = TelemetryPacket {
        timestamp: 123_456,
        echo_speed: [1, -2, 3, -4],
        encoder_angle: 360,
        open_loop_angle: -360,
        state: SystemState::MotorError,
    };
    let frame = encode_frame(&encode_telemetry(&telemetry));
    let payload = decode_frame(&frame[..frame.len() - 1])?;
    if decode_telemetry(&payload)? != telemetry {
        eyre::bail!("telemetry codec mismatch");
    }
    tracing::info!("codec self-check passed");
    Ok(())
}
