//! The owned session context.
//!
//! A `Session` bundles the link, the input sampler, the mixer and the two
//! ring buffers. It is the only writer of both ring buffers; readers get
//! chronologically ordered copies through the snapshot methods. Nothing here
//! blocks: `pump` drains whatever the worker threads have queued so far.

use steplink_traits::{Clock, InputDevice, MonotonicClock, PortOpener};

use crate::clock_sync::{ClockOffset, DEFAULT_INPUT_SKEW_MS};
use crate::config::{BufferCfg, LinkCfg, MixerCfg, SamplerCfg, SimCfg};
use crate::error::{BuildError, Result};
use crate::mixer::{CommandMixer, GainsHandle, MixerGains};
use crate::packet::{CommandPacket, TelemetryPacket};
use crate::ring_buffer::RingBuffer;
use crate::sampler::{InputSample, InputSampler};
use crate::transport::{Link, LinkState, LinkStats, SerialTransport, SourceKind};

/// A telemetry packet with its timestamp re-based to ms since link start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TelemetrySample {
    pub t_ms: i64,
    pub packet: TelemetryPacket,
}

/// Items moved into the ring buffers by one `pump`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PumpCounts {
    pub telemetry: usize,
    pub input: usize,
}

/// Builder for `Session`. Everything but the port opener has a default.
pub struct SessionBuilder<C> {
    opener: Option<Box<dyn PortOpener>>,
    input: Option<Box<dyn InputDevice + Send>>,
    link: LinkCfg,
    buffers: BufferCfg,
    sampler: SamplerCfg,
    mixer: MixerCfg,
    gains: MixerGains,
    sim: SimCfg,
    input_skew_ms: i32,
    clock: C,
}

impl SessionBuilder<MonotonicClock> {
    pub fn new() -> Self {
        Self {
            opener: None,
            input: None,
            link: LinkCfg::default(),
            buffers: BufferCfg::default(),
            sampler: SamplerCfg::default(),
            mixer: MixerCfg::default(),
            gains: MixerGains::default(),
            sim: SimCfg::default(),
            input_skew_ms: DEFAULT_INPUT_SKEW_MS,
            clock: MonotonicClock::new(),
        }
    }
}

impl Default for SessionBuilder<MonotonicClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock + Clone + Send + Sync + 'static> SessionBuilder<C> {
    pub fn opener(mut self, opener: impl PortOpener + 'static) -> Self {
        self.opener = Some(Box::new(opener));
        self
    }

    pub fn boxed_opener(mut self, opener: Box<dyn PortOpener>) -> Self {
        self.opener = Some(opener);
        self
    }

    /// Without an input device the input buffer stays at its defaults and
    /// mixed commands are all-zero.
    pub fn input(mut self, device: impl InputDevice + Send + 'static) -> Self {
        self.input = Some(Box::new(device));
        self
    }

    pub fn link(mut self, cfg: LinkCfg) -> Self {
        self.link = cfg;
        self
    }

    pub fn buffers(mut self, cfg: BufferCfg) -> Self {
        self.buffers = cfg;
        self
    }

    pub fn sampler(mut self, cfg: SamplerCfg) -> Self {
        self.sampler = cfg;
        self
    }

    pub fn mixer(mut self, cfg: MixerCfg) -> Self {
        self.mixer = cfg;
        self
    }

    pub fn gains(mut self, gains: MixerGains) -> Self {
        self.gains = gains;
        self
    }

    pub fn simulation(mut self, cfg: SimCfg) -> Self {
        self.sim = cfg;
        self
    }

    pub fn input_skew_ms(mut self, skew: i32) -> Self {
        self.input_skew_ms = skew;
        self
    }

    /// Apply every section of a loaded TOML config.
    pub fn with_config(self, cfg: &steplink_config::Config) -> Self {
        self.link(LinkCfg::from(&cfg.link))
            .buffers(BufferCfg::from(&cfg.buffers))
            .sampler(SamplerCfg::from(&cfg.sampler))
            .mixer(MixerCfg::from(&cfg.mixer))
            .gains(MixerGains::from(&cfg.mixer))
            .simulation(SimCfg::from(&cfg.simulation))
            .input_skew_ms(cfg.clock.input_skew_ms)
    }

    pub fn clock<C2: Clock + Clone + Send + Sync + 'static>(self, clock: C2) -> SessionBuilder<C2> {
        SessionBuilder {
            opener: self.opener,
            input: self.input,
            link: self.link,
            buffers: self.buffers,
            sampler: self.sampler,
            mixer: self.mixer,
            gains: self.gains,
            sim: self.sim,
            input_skew_ms: self.input_skew_ms,
            clock,
        }
    }

    fn validate(&self) -> std::result::Result<(), BuildError> {
        let b = &self.buffers;
        if b.telemetry_capacity == 0 {
            return Err(BuildError::InvalidConfig("telemetry_capacity must be >= 1"));
        }
        if b.input_capacity == 0 {
            return Err(BuildError::InvalidConfig("input_capacity must be >= 1"));
        }
        if b.rx_queue_capacity == 0 {
            return Err(BuildError::InvalidConfig("rx_queue_capacity must be >= 1"));
        }
        if b.input_queue_capacity == 0 {
            return Err(BuildError::InvalidConfig("input_queue_capacity must be >= 1"));
        }
        if self.gains.max_acceleration <= 0 {
            return Err(BuildError::InvalidConfig("max_acceleration must be > 0"));
        }
        if self.link.read_timeout.is_zero() {
            return Err(BuildError::InvalidConfig("read_timeout must be > 0"));
        }
        Ok(())
    }

    /// Bring the link up (or fall back to simulation) and start sampling.
    ///
    /// Fails only on a missing opener or invalid settings; a missing device
    /// is not an error.
    pub fn build(self) -> Result<Session> {
        self.validate().map_err(eyre::Report::new)?;
        let opener = self
            .opener
            .ok_or_else(|| eyre::Report::new(BuildError::MissingOpener))?;

        let epoch = self.clock.now();
        let transport = SerialTransport::new(
            opener,
            self.link,
            self.sim,
            self.buffers.rx_queue_capacity,
            self.clock.clone(),
            epoch,
        );
        let link = transport.connect();

        let sampler = self.input.map(|device| {
            InputSampler::spawn(
                device,
                self.sampler,
                self.buffers.input_queue_capacity,
                self.clock.clone(),
                epoch,
            )
        });

        Ok(Session {
            offset: link.offset(),
            link,
            sampler,
            mixer: CommandMixer::new(GainsHandle::new(self.gains), self.mixer),
            telemetry: RingBuffer::new(self.buffers.telemetry_capacity),
            input: RingBuffer::new(self.buffers.input_capacity),
            input_skew_ms: self.input_skew_ms,
            last_command: None,
        })
    }
}

pub struct Session {
    link: Link,
    sampler: Option<InputSampler>,
    mixer: CommandMixer,
    telemetry: RingBuffer<TelemetrySample>,
    input: RingBuffer<InputSample>,
    offset: ClockOffset,
    input_skew_ms: i32,
    last_command: Option<CommandPacket>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("state", self.link.state())
            .field("offset", &self.offset)
            .field("telemetry_pushed", &self.telemetry.total_pushed())
            .field("input_pushed", &self.input.total_pushed())
            .finish()
    }
}

impl Session {
    pub fn builder() -> SessionBuilder<MonotonicClock> {
        SessionBuilder::new()
    }

    /// Move everything queued by the workers into the ring buffers,
    /// correcting timestamps onto the shared session axis.
    pub fn pump(&mut self) -> PumpCounts {
        let mut counts = PumpCounts::default();
        while let Some(packet) = self.link.rx_next() {
            self.telemetry.push(TelemetrySample {
                t_ms: self.offset.correct_telemetry(packet.timestamp),
                packet,
            });
            counts.telemetry += 1;
        }
        if let Some(sampler) = &self.sampler {
            for mut sample in sampler.drain() {
                sample.timestamp_ms = self
                    .offset
                    .correct_input(sample.timestamp_ms, self.input_skew_ms);
                self.input.push(sample);
                counts.input += 1;
            }
        }
        if counts.telemetry > 0 || counts.input > 0 {
            tracing::trace!(telemetry = counts.telemetry, input = counts.input, "pumped");
        }
        counts
    }

    /// Mix the newest buffered input sample and queue the result.
    pub fn send_command(&mut self) -> CommandPacket {
        let sample = self.input.latest().unwrap_or_default();
        let cmd = self.mixer.next_command(&sample);
        self.send(cmd);
        cmd
    }

    /// Queue `cmd` as-is, replacing any unsent command.
    pub fn send(&mut self, cmd: CommandPacket) {
        self.link.queue_latest_tx(cmd);
        self.last_command = Some(cmd);
    }

    /// Telemetry buffer, oldest first.
    pub fn telemetry_snapshot(&self) -> Vec<TelemetrySample> {
        self.telemetry.snapshot()
    }

    /// Input buffer, oldest first.
    pub fn input_snapshot(&self) -> Vec<InputSample> {
        self.input.snapshot()
    }

    pub fn latest_telemetry(&self) -> Option<TelemetrySample> {
        self.telemetry.latest()
    }

    pub fn latest_input(&self) -> Option<InputSample> {
        self.input.latest()
    }

    /// The command most recently queued for the device.
    pub fn last_command(&self) -> Option<CommandPacket> {
        self.last_command
    }

    /// Shared, live-tunable gains.
    pub fn gains(&self) -> &GainsHandle {
        self.mixer.gains()
    }

    pub fn offset(&self) -> ClockOffset {
        self.offset
    }

    pub fn link_state(&self) -> &LinkState {
        self.link.state()
    }

    pub fn link_history(&self) -> &[LinkState] {
        self.link.history()
    }

    pub fn source(&self) -> &SourceKind {
        self.link.kind()
    }

    pub fn is_simulated(&self) -> bool {
        self.link.is_simulated()
    }

    pub fn stats(&self) -> LinkStats {
        self.link.stats()
    }

    pub fn input_connected(&self) -> bool {
        self.sampler.as_ref().is_some_and(InputSampler::is_connected)
    }

    /// Input samples displaced before `pump` could collect them.
    pub fn input_dropped(&self) -> u64 {
        self.sampler.as_ref().map_or(0, InputSampler::dropped)
    }

    /// Stop the sampler and the link, joining every worker. Idempotent.
    pub fn shutdown(&mut self) {
        // Dropping the sampler joins its thread
        self.sampler = None;
        self.link.stop();
    }
}
