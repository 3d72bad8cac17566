//! The `run` and `ports` commands.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use eyre::WrapErr;
use steplink_config::Config;
use steplink_core::packet::CommandPacket;
use steplink_core::transport::{SourceKind, is_candidate_port};
use steplink_core::{LinkStats, Session};
use steplink_hardware::{DisconnectedJoystick, SimulatedJoystick, default_opener};

/// How often the foreground loop moves queued data into the buffers.
const PUMP_PERIOD: Duration = Duration::from_millis(15);
const STATS_PERIOD: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    pub duration: Option<Duration>,
    pub simulate: bool,
    pub no_input: bool,
    pub stats: bool,
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub state: String,
    pub source: String,
    pub simulated: bool,
    pub elapsed_ms: u64,
    pub telemetry: u64,
    pub input: u64,
    pub commands: u64,
    pub interrupted: bool,
    pub last_command: Option<CommandPacket>,
    pub last_telemetry_ms: Option<i64>,
    pub input_dropped: u64,
    pub stats: LinkStats,
}

fn source_label(kind: &SourceKind) -> String {
    match kind {
        SourceKind::Serial { port } => port.clone(),
        SourceKind::Simulated => "simulated".to_string(),
    }
}

/// Connect, then pump and transmit until `duration` elapses or `shutdown` is set.
pub fn run(cfg: &Config, opts: RunOptions, shutdown: &Arc<AtomicBool>) -> eyre::Result<RunSummary> {
    let mut cfg = cfg.clone();
    if opts.simulate {
        cfg.link.force_simulation = true;
    }

    let builder = Session::builder().with_config(&cfg).boxed_opener(default_opener());
    let builder = if opts.no_input {
        builder.input(DisconnectedJoystick)
    } else {
        builder.input(SimulatedJoystick::new())
    };
    let mut session = builder.build().wrap_err("failed to start session")?;

    tracing::info!(
        state = %session.link_state(),
        simulated = session.is_simulated(),
        offset_ms = session.offset().offset(),
        "session started"
    );

    let tx_period = Duration::from_millis(cfg.mixer.tx_period_ms);
    let start = Instant::now();
    let mut next_tx = start;
    let mut next_stats = start + STATS_PERIOD;
    let mut telemetry = 0u64;
    let mut input = 0u64;
    let mut commands = 0u64;
    let mut interrupted = false;

    loop {
        if shutdown.load(Ordering::Relaxed) {
            tracing::info!("interrupted");
            interrupted = true;
            break;
        }
        if opts.duration.is_some_and(|d| start.elapsed() >= d) {
            break;
        }

        let counts = session.pump();
        telemetry += counts.telemetry as u64;
        input += counts.input as u64;

        let now = Instant::now();
        if now >= next_tx {
            let cmd = session.send_command();
            commands += 1;
            tracing::trace!(speed = ?cmd.speed, "command");
            next_tx += tx_period;
            // Skip missed slots rather than bursting to catch up
            if next_tx < now {
                next_tx = now + tx_period;
            }
        }

        if opts.stats && now >= next_stats {
            let s = session.stats();
            tracing::info!(
                frames = s.frames,
                frame_errors = s.frame_errors,
                size_mismatches = s.size_mismatches,
                rx_dropped = s.rx_dropped,
                commands_written = s.commands_written,
                input_connected = session.input_connected(),
                "link stats"
            );
            next_stats = now + STATS_PERIOD;
        }

        std::thread::sleep(PUMP_PERIOD);
    }

    // Drain whatever arrived during the last sleep
    let counts = session.pump();
    telemetry += counts.telemetry as u64;
    input += counts.input as u64;

    session.shutdown();
    Ok(RunSummary {
        state: session.link_state().to_string(),
        source: source_label(session.source()),
        simulated: session.is_simulated(),
        elapsed_ms: u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
        telemetry,
        input,
        commands,
        interrupted,
        last_command: session.last_command(),
        last_telemetry_ms: session.latest_telemetry().map(|s| s.t_ms),
        input_dropped: session.input_dropped(),
        stats: session.stats(),
    })
}

fn command_json(cmd: &CommandPacket) -> serde_json::Value {
    serde_json::json!({
        "speed": cmd.speed,
        "max_acceleration": cmd.max_acceleration,
    })
}

pub fn summary_json(s: &RunSummary) -> serde_json::Value {
    serde_json::json!({
        "state": s.state,
        "source": s.source,
        "simulated": s.simulated,
        "elapsed_ms": s.elapsed_ms,
        "interrupted": s.interrupted,
        "telemetry": s.telemetry,
        "input": s.input,
        "commands": s.commands,
        "last_command": s.last_command.as_ref().map(command_json),
        "last_telemetry_ms": s.last_telemetry_ms,
        "input_dropped": s.input_dropped,
        "stats": {
            "frames": s.stats.frames,
            "frame_errors": s.stats.frame_errors,
            "size_mismatches": s.stats.size_mismatches,
            "rx_dropped": s.stats.rx_dropped,
            "oversized": s.stats.oversized,
            "read_errors": s.stats.read_errors,
            "commands_written": s.stats.commands_written,
            "write_failures": s.stats.write_failures,
        },
    })
}

pub fn render_summary(s: &RunSummary, json: bool) -> String {
    if json {
        return summary_json(s).to_string();
    }
    let mut out = format!(
        "source: {}\nstate: {}\nelapsed: {} ms\ntelemetry: {}\ninput: {}\ncommands: {}\n",
        s.source, s.state, s.elapsed_ms, s.telemetry, s.input, s.commands
    );
    if let Some(cmd) = s.last_command {
        out.push_str(&format!(
            "last command: {:?} @ {} steps/s^2\n",
            cmd.speed, cmd.max_acceleration
        ));
    }
    out.push_str(&format!(
        "frame errors: {} (size mismatches {}), rx dropped: {}",
        s.stats.frame_errors, s.stats.size_mismatches, s.stats.rx_dropped
    ));
    out
}

/// Candidate ports in the order the transport would probe them.
pub fn candidate_ports(cfg: &Config) -> eyre::Result<Vec<String>> {
    if let Some(port) = &cfg.link.port {
        return Ok(vec![port.clone()]);
    }
    let opener = default_opener();
    let all = opener
        .list_ports()
        .map_err(|e| eyre::eyre!("listing serial ports failed: {e}"))?;
    Ok(all.into_iter().filter(|p| is_candidate_port(p)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary() -> RunSummary {
        RunSummary {
            state: "stopped".into(),
            source: "simulated".into(),
            simulated: true,
            elapsed_ms: 120,
            telemetry: 30,
            input: 12,
            commands: 4,
            interrupted: false,
            last_command: Some(CommandPacket {
                speed: [9600, 0, 0, 0],
                max_acceleration: 50_000,
            }),
            last_telemetry_ms: Some(90),
            input_dropped: 0,
            stats: LinkStats::default(),
        }
    }

    #[test]
    fn json_summary_carries_counts() {
        let v: serde_json::Value = serde_json::from_str(&render_summary(&summary(), true)).unwrap();
        assert_eq!(v["source"], "simulated");
        assert_eq!(v["commands"], 4);
        assert_eq!(v["last_command"]["speed"][0], 9600);
        assert_eq!(v["stats"]["frame_errors"], 0);
    }

    #[test]
    fn text_summary_mentions_source_and_state() {
        let text = render_summary(&summary(), false);
        assert!(text.contains("source: simulated"));
        assert!(text.contains("state: stopped"));
        assert!(text.contains("[9600, 0, 0, 0]"));
    }

    #[test]
    fn configured_port_is_the_only_candidate() {
        let mut cfg = Config::default();
        cfg.link.port = Some("/dev/ttyUSB3".into());
        assert_eq!(candidate_ports(&cfg).unwrap(), vec!["/dev/ttyUSB3".to_string()]);
    }
}
