//! Serial link discovery, probing and streaming.
//!
//! `SerialTransport::connect` walks
//! `Discovering -> Probing(port) -> Linked(port) -> Streaming(port)` and
//! falls back to `Simulating` when no candidate answers. Either way the
//! caller gets a `Link` with the same queue-shaped API:
//!
//! - telemetry arrives on a bounded queue that discards incoming packets
//!   when full (`rx_next`, never blocks)
//! - commands go into a latest-wins slot (`queue_latest_tx`, never blocks)
//!
//! Malformed frames are logged, counted and dropped. Nothing in here
//! escalates past the `Link`.
use crate::clock_sync::ClockOffset;
use crate::config::{LinkCfg, SimCfg};
use crate::error::LinkError;
use crate::frame::{FrameAccumulator, decode_telemetry_frame, encode_command_frame};
use crate::hw_error::map_hw_error;
use crate::packet::{CommandPacket, TelemetryPacket};
use crate::queue::{self, OverflowPolicy, PushOutcome, QueueConsumer, QueueProducer};
use crate::simulation::TelemetrySynth;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use steplink_traits::{Clock, PortOpener, SerialLink};
use tracing::{debug, info, trace, warn};

/// Substrings (upper-cased) that mark an endpoint as a serial device.
const PORT_MARKERS: [&str; 3] = ["COM", "TTYUSB", "TTYACM"];

const READ_CHUNK: usize = 2048;

/// True when `name` looks like a serial device on Windows or Linux.
pub fn is_candidate_port(name: &str) -> bool {
    let upper = name.to_uppercase();
    PORT_MARKERS.iter().any(|m| upper.contains(m))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkState {
    Discovering,
    Probing(String),
    Linked(String),
    Streaming(String),
    Simulating,
    Stopped,
}

impl std::fmt::Display for LinkState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LinkState::Discovering => f.write_str("discovering"),
            LinkState::Probing(p) => write!(f, "probing {p}"),
            LinkState::Linked(p) => write!(f, "linked {p}"),
            LinkState::Streaming(p) => write!(f, "streaming {p}"),
            LinkState::Simulating => f.write_str("simulating"),
            LinkState::Stopped => f.write_str("stopped"),
        }
    }
}

/// Which telemetry source ended up behind a `Link`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceKind {
    Serial { port: String },
    Simulated,
}

/// Point-in-time copy of the link counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkStats {
    /// Telemetry packets delivered to the rx queue.
    pub frames: u64,
    pub frame_errors: u64,
    pub size_mismatches: u64,
    /// Telemetry discarded because the rx queue was full.
    pub rx_dropped: u64,
    /// Partial frames discarded for running past the max frame length.
    pub oversized: u64,
    pub read_errors: u64,
    pub commands_written: u64,
    pub write_failures: u64,
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    frames: AtomicU64,
    frame_errors: AtomicU64,
    size_mismatches: AtomicU64,
    rx_dropped: AtomicU64,
    oversized: AtomicU64,
    read_errors: AtomicU64,
    commands_written: AtomicU64,
    write_failures: AtomicU64,
}

impl Counters {
    fn bump(c: &AtomicU64) {
        c.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> LinkStats {
        LinkStats {
            frames: self.frames.load(Ordering::Relaxed),
            frame_errors: self.frame_errors.load(Ordering::Relaxed),
            size_mismatches: self.size_mismatches.load(Ordering::Relaxed),
            rx_dropped: self.rx_dropped.load(Ordering::Relaxed),
            oversized: self.oversized.load(Ordering::Relaxed),
            read_errors: self.read_errors.load(Ordering::Relaxed),
            commands_written: self.commands_written.load(Ordering::Relaxed),
            write_failures: self.write_failures.load(Ordering::Relaxed),
        }
    }

    /// Queue a telemetry packet, counting it as delivered or dropped.
    fn deliver(&self, rx: &QueueProducer<TelemetryPacket>, packet: TelemetryPacket) {
        match rx.push(packet) {
            PushOutcome::Rejected => {
                Self::bump(&self.rx_dropped);
                trace!("rx queue full, telemetry discarded");
            }
            _ => Self::bump(&self.frames),
        }
    }

    fn record_frame_error(&self, err: &LinkError) {
        match err {
            LinkError::SizeMismatch { expected, actual } => {
                Self::bump(&self.size_mismatches);
                warn!(expected, actual, "telemetry size mismatch, frame dropped");
            }
            other => {
                Self::bump(&self.frame_errors);
                warn!(error = %other, "telemetry frame decode failed, frame dropped");
            }
        }
    }
}

/// Channel ends and shared flags handed to a source when it starts.
pub struct SourceIo {
    pub rx: QueueProducer<TelemetryPacket>,
    pub tx: QueueConsumer<CommandPacket>,
    pub(crate) counters: Arc<Counters>,
    pub running: Arc<AtomicBool>,
}

/// Something that produces telemetry and consumes commands on worker
/// threads. Chosen once, when the link comes up.
pub trait TelemetrySource: Send {
    fn kind(&self) -> SourceKind;

    /// Start the worker loop(s). They must exit soon after `io.running`
    /// goes false.
    fn start(self: Box<Self>, io: SourceIo) -> Vec<JoinHandle<()>>;
}

/// Streams frames over a probed serial link.
pub struct SerialSource<C> {
    port: String,
    link: Box<dyn SerialLink>,
    acc: FrameAccumulator,
    read_timeout: Duration,
    clock: C,
}

impl<C: Clock + Clone + Send + Sync + 'static> SerialSource<C> {
    pub fn new(
        port: String,
        link: Box<dyn SerialLink>,
        acc: FrameAccumulator,
        read_timeout: Duration,
        clock: C,
    ) -> Self {
        Self {
            port,
            link,
            acc,
            read_timeout,
            clock,
        }
    }
}

struct ReadHalf<C> {
    port: String,
    link: Box<dyn SerialLink>,
    acc: FrameAccumulator,
    buf: Vec<u8>,
    read_timeout: Duration,
    clock: C,
}

impl<C: Clock> ReadHalf<C> {
    /// One bounded read plus whatever frames it completed.
    fn poll(&mut self, rx: &QueueProducer<TelemetryPacket>, counters: &Counters) {
        match self.link.read(&mut self.buf) {
            Ok(0) => {}
            Ok(n) => {
                trace!(port = %self.port, bytes = n, "serial read");
                let before = self.acc.overflows();
                self.acc.extend(&self.buf[..n]);
                if self.acc.overflows() != before {
                    Counters::bump(&counters.oversized);
                }
                while let Some(frame) = self.acc.next_frame() {
                    match decode_telemetry_frame(&frame) {
                        Ok(packet) => counters.deliver(rx, packet),
                        Err(e) => counters.record_frame_error(&e),
                    }
                }
            }
            Err(e) => match map_hw_error(e.as_ref(), Some(&self.port)) {
                LinkError::Timeout => {}
                err => {
                    Counters::bump(&counters.read_errors);
                    warn!(port = %self.port, error = %err, "serial read failed");
                    // Back off so an unplugged port doesn't spin the loop
                    self.clock.sleep(self.read_timeout);
                }
            },
        }
    }
}

fn write_command(link: &mut dyn SerialLink, port: &str, cmd: &CommandPacket, counters: &Counters) {
    let frame = encode_command_frame(cmd);
    match link.write_all(&frame) {
        Ok(()) => {
            Counters::bump(&counters.commands_written);
            trace!(port, bytes = frame.len(), "command written");
        }
        Err(e) => {
            Counters::bump(&counters.write_failures);
            warn!(port, error = %map_hw_error(e.as_ref(), Some(port)), "command write failed");
        }
    }
}

impl<C: Clock + Clone + Send + Sync + 'static> TelemetrySource for SerialSource<C> {
    fn kind(&self) -> SourceKind {
        SourceKind::Serial {
            port: self.port.clone(),
        }
    }

    fn start(self: Box<Self>, io: SourceIo) -> Vec<JoinHandle<()>> {
        let SourceIo {
            rx,
            tx,
            counters,
            running,
        } = io;
        let Self {
            port,
            link,
            acc,
            read_timeout,
            clock,
        } = *self;
        let writer = link.try_clone_link();
        let mut read = ReadHalf {
            port: port.clone(),
            link,
            acc,
            buf: vec![0u8; READ_CHUNK],
            read_timeout,
            clock,
        };

        match writer {
            Ok(mut write_link) => {
                let read_running = running.clone();
                let read_counters = counters.clone();
                let reader = std::thread::spawn(move || {
                    while read_running.load(Ordering::Relaxed) {
                        read.poll(&rx, &read_counters);
                    }
                    debug!(port = %read.port, "serial read loop exiting");
                });

                let writer = std::thread::spawn(move || {
                    while running.load(Ordering::Relaxed) {
                        // Bounded wait so a stop request is seen promptly
                        if let Some(cmd) = tx.next_timeout(read_timeout) {
                            write_command(write_link.as_mut(), &port, &cmd, &counters);
                        }
                    }
                    debug!(port = %port, "serial write loop exiting");
                });
                vec![reader, writer]
            }
            Err(e) => {
                warn!(port = %port, error = %e, "cannot split serial link, using a combined loop");
                let combined = std::thread::spawn(move || {
                    while running.load(Ordering::Relaxed) {
                        read.poll(&rx, &counters);
                        if let Some(cmd) = tx.try_next() {
                            write_command(read.link.as_mut(), &read.port, &cmd, &counters);
                        }
                    }
                    debug!(port = %read.port, "serial stream loop exiting");
                });
                vec![combined]
            }
        }
    }
}

/// Synthetic telemetry on a fixed tick, driven by the latest command.
pub struct SimulatedSource<C> {
    synth: TelemetrySynth,
    cfg: SimCfg,
    clock: C,
    epoch: Instant,
}

impl<C: Clock + Clone + Send + Sync + 'static> SimulatedSource<C> {
    /// Timestamps count milliseconds from `epoch`.
    pub fn new(cfg: SimCfg, clock: C, epoch: Instant) -> Self {
        Self {
            synth: TelemetrySynth::new(cfg),
            cfg,
            clock,
            epoch,
        }
    }
}

impl<C: Clock + Clone + Send + Sync + 'static> TelemetrySource for SimulatedSource<C> {
    fn kind(&self) -> SourceKind {
        SourceKind::Simulated
    }

    fn start(self: Box<Self>, io: SourceIo) -> Vec<JoinHandle<()>> {
        let Self {
            mut synth,
            cfg,
            clock,
            epoch,
        } = *self;
        let SourceIo {
            rx,
            tx,
            counters,
            running,
        } = io;
        let handle = std::thread::spawn(move || {
            clock.sleep(cfg.startup_delay);
            let mut latest = CommandPacket::default();
            while running.load(Ordering::Relaxed) {
                if let Some(cmd) = tx.try_next() {
                    latest = cmd;
                    Counters::bump(&counters.commands_written);
                }
                let now = u32::try_from(clock.ms_since(epoch)).unwrap_or(u32::MAX);
                counters.deliver(&rx, synth.next_packet(&latest, now));
                clock.sleep(cfg.tick);
            }
            debug!("simulation loop exiting");
        });
        vec![handle]
    }
}

/// A running link: queues, counters and the worker threads behind them.
pub struct Link {
    kind: SourceKind,
    state: LinkState,
    history: Vec<LinkState>,
    offset: ClockOffset,
    rx: QueueConsumer<TelemetryPacket>,
    tx: QueueProducer<CommandPacket>,
    counters: Arc<Counters>,
    running: Arc<AtomicBool>,
    handles: Vec<JoinHandle<()>>,
}

impl Link {
    /// Start `source` and wrap it. `history` is the state trail that led
    /// here; the final state is derived from the source kind.
    pub fn start(
        source: Box<dyn TelemetrySource>,
        offset: ClockOffset,
        rx_capacity: usize,
        history: Vec<LinkState>,
    ) -> Self {
        Self::start_with(source, offset, rx_capacity, history, None)
    }

    fn start_with(
        source: Box<dyn TelemetrySource>,
        offset: ClockOffset,
        rx_capacity: usize,
        mut history: Vec<LinkState>,
        first: Option<TelemetryPacket>,
    ) -> Self {
        let (rx_prod, rx) = queue::bounded(rx_capacity, OverflowPolicy::DropNewest);
        let (tx, tx_cons) = queue::latest_slot();
        let counters = Arc::new(Counters::default());
        let running = Arc::new(AtomicBool::new(true));

        if let Some(packet) = first {
            counters.deliver(&rx_prod, packet);
        }

        let kind = source.kind();
        let state = match &kind {
            SourceKind::Serial { port } => LinkState::Streaming(port.clone()),
            SourceKind::Simulated => LinkState::Simulating,
        };
        let handles = source.start(SourceIo {
            rx: rx_prod,
            tx: tx_cons,
            counters: counters.clone(),
            running: running.clone(),
        });
        info!(state = %state, offset_ms = offset.offset(), "link up");
        history.push(state.clone());

        Self {
            kind,
            state,
            history,
            offset,
            rx,
            tx,
            counters,
            running,
            handles,
        }
    }

    /// Next telemetry packet, oldest first. Never blocks.
    pub fn rx_next(&self) -> Option<TelemetryPacket> {
        self.rx.try_next()
    }

    /// Replace any unsent command with `cmd`. Never blocks.
    pub fn queue_latest_tx(&self, cmd: CommandPacket) {
        self.tx.push(cmd);
    }

    pub fn state(&self) -> &LinkState {
        &self.state
    }

    /// Every state this link has been in, oldest first.
    pub fn history(&self) -> &[LinkState] {
        &self.history
    }

    pub fn kind(&self) -> &SourceKind {
        &self.kind
    }

    pub fn is_simulated(&self) -> bool {
        self.kind == SourceKind::Simulated
    }

    pub fn offset(&self) -> ClockOffset {
        self.offset
    }

    pub fn stats(&self) -> LinkStats {
        self.counters.snapshot()
    }

    /// Stop the worker loops and join them. Idempotent.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        for handle in self.handles.drain(..) {
            if let Err(e) = handle.join() {
                warn!(?e, "link worker panicked during shutdown");
            }
        }
        if self.state != LinkState::Stopped {
            info!(from = %self.state, "link stopped");
            self.state = LinkState::Stopped;
            self.history.push(LinkState::Stopped);
        }
    }
}

impl Drop for Link {
    fn drop(&mut self) {
        self.stop();
    }
}

/// A candidate that answered with a valid frame.
pub struct Probe {
    pub port: String,
    pub link: Box<dyn SerialLink>,
    pub first: TelemetryPacket,
    /// Bytes read past the first frame.
    pub acc: FrameAccumulator,
    /// Malformed frames skipped before the first valid one.
    pub skipped: u64,
}

/// Finds a device and brings up a `Link`, or falls back to simulation.
pub struct SerialTransport<C> {
    opener: Box<dyn PortOpener>,
    link: LinkCfg,
    sim: SimCfg,
    rx_capacity: usize,
    clock: C,
    epoch: Instant,
}

impl<C: Clock + Clone + Send + Sync + 'static> SerialTransport<C> {
    /// `epoch` is the session's time origin; the link's `ClockOffset`
    /// host side is measured from it.
    pub fn new(
        opener: Box<dyn PortOpener>,
        link: LinkCfg,
        sim: SimCfg,
        rx_capacity: usize,
        clock: C,
        epoch: Instant,
    ) -> Self {
        Self {
            opener,
            link,
            sim,
            rx_capacity,
            clock,
            epoch,
        }
    }

    /// Candidate ports: the configured one, or every enumerated endpoint
    /// with a serial-device name.
    pub fn discover(&self) -> Vec<String> {
        if let Some(port) = &self.link.port {
            return vec![port.clone()];
        }
        match self.opener.list_ports() {
            Ok(ports) => ports.into_iter().filter(|p| is_candidate_port(p)).collect(),
            Err(e) => {
                warn!(error = %e, "port enumeration failed");
                Vec::new()
            }
        }
    }

    /// Open `port`, let it settle, and wait for one valid telemetry frame.
    ///
    /// Gives up after `probe_timeout`, measured on the clock and, for links
    /// that return early, as that many read timeouts without data.
    pub fn probe(&self, port: &str) -> Result<Probe, LinkError> {
        let mut link = self
            .opener
            .open(port, self.link.baud_rate, self.link.read_timeout)
            .map_err(|e| match map_hw_error(e.as_ref(), Some(port)) {
                LinkError::PortUnavailable { .. } | LinkError::Timeout => LinkError::PortUnavailable {
                    port: port.to_string(),
                    reason: e.to_string(),
                },
                other => other,
            })?;
        self.clock.sleep(self.link.settle);

        let started = self.clock.now();
        let read_timeout = self.link.read_timeout.max(Duration::from_millis(1));
        let max_idle = self.link.probe_timeout.as_millis() / read_timeout.as_millis();
        let mut idle: u128 = 0;
        let mut acc = FrameAccumulator::new();
        let mut buf = vec![0u8; READ_CHUNK];
        let mut skipped = 0u64;

        loop {
            match link.read(&mut buf) {
                Ok(0) => idle += 1,
                Ok(n) => acc.extend(&buf[..n]),
                Err(e) => match map_hw_error(e.as_ref(), Some(port)) {
                    LinkError::Timeout => idle += 1,
                    err => return Err(err),
                },
            }
            while let Some(frame) = acc.next_frame() {
                match decode_telemetry_frame(&frame) {
                    Ok(first) => {
                        return Ok(Probe {
                            port: port.to_string(),
                            link,
                            first,
                            acc,
                            skipped,
                        });
                    }
                    Err(e) => {
                        skipped += 1;
                        debug!(port, error = %e, "discarding malformed frame during probe");
                    }
                }
            }
            let elapsed = self.clock.now().saturating_duration_since(started);
            if elapsed >= self.link.probe_timeout || idle > max_idle {
                return Err(LinkError::Timeout);
            }
        }
    }

    /// Walk the candidates in order; the first that probes successfully
    /// becomes the link. With none, the simulated source takes over.
    pub fn connect(&self) -> Link {
        let mut history = Vec::new();
        if self.link.force_simulation {
            info!("simulation forced by configuration");
            return self.simulate(history);
        }

        history.push(LinkState::Discovering);
        let candidates = self.discover();
        info!(candidates = candidates.len(), "discovering serial ports");

        for port in candidates {
            history.push(LinkState::Probing(port.clone()));
            info!(port = %port, "probing");
            match self.probe(&port) {
                Ok(probe) => {
                    let host_ms = i64::try_from(self.clock.ms_since(self.epoch)).unwrap_or(i64::MAX);
                    let offset = ClockOffset::capture(probe.first.timestamp, host_ms);
                    history.push(LinkState::Linked(port.clone()));
                    info!(
                        port = %port,
                        device_epoch_ms = offset.device_epoch_ms,
                        host_epoch_ms = offset.host_epoch_ms,
                        skipped = probe.skipped,
                        "linked"
                    );
                    let source = SerialSource::new(
                        probe.port,
                        probe.link,
                        probe.acc,
                        self.link.read_timeout,
                        self.clock.clone(),
                    );
                    return Link::start_with(
                        Box::new(source),
                        offset,
                        self.rx_capacity,
                        history,
                        Some(probe.first),
                    );
                }
                Err(e) => warn!(port = %port, error = %e, "probe failed, trying next candidate"),
            }
        }

        warn!(error = %LinkError::LinkLost, "falling back to simulation");
        self.simulate(history)
    }

    fn simulate(&self, history: Vec<LinkState>) -> Link {
        let start = self.clock.now();
        let host_ms = i64::try_from(self.clock.ms_since(self.epoch)).unwrap_or(i64::MAX);
        let offset = ClockOffset::capture(0, host_ms);
        let source = SimulatedSource::new(self.sim, self.clock.clone(), start);
        Link::start(Box::new(source), offset, self.rx_capacity, history)
    }
}
