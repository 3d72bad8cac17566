//! Background input sampling.
//!
//! Spawns a thread that owns the `InputDevice`, polls it at a fixed period,
//! tags each reading with host time and publishes it through a drop-oldest
//! queue. While no device is connected the thread idles instead of failing.
//!
//! Each `InputSampler` owns exactly one thread, shut down and joined when
//! the sampler is dropped.
use crate::config::SamplerCfg;
use crate::queue::{self, OverflowPolicy, PushOutcome, QueueConsumer};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;
use steplink_traits::{Clock, InputDevice};

/// One normalized reading of the four input axes.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct InputSample {
    /// Host ms since the session epoch; re-based by `ClockOffset` later.
    pub timestamp_ms: i32,
    pub axes: [f32; 4],
}

impl InputSample {
    pub fn new(timestamp_ms: i32, axes: [f32; 4]) -> Self {
        Self {
            timestamp_ms,
            axes: normalize_axes(axes),
        }
    }
}

/// Clamp each axis into [-1, 1]; non-finite readings become 0.
pub fn normalize_axes(axes: [f32; 4]) -> [f32; 4] {
    axes.map(|a| if a.is_finite() { a.clamp(-1.0, 1.0) } else { 0.0 })
}

pub struct InputSampler {
    rx: QueueConsumer<InputSample>,
    connected: Arc<AtomicBool>,
    read_errors: Arc<AtomicU64>,
    shutdown: Arc<AtomicBool>,
    join_handle: Option<std::thread::JoinHandle<()>>,
}

impl InputSampler {
    /// Start polling `device`. Timestamps are ms since `epoch` on `clock`.
    pub fn spawn<D, C>(
        mut device: D,
        cfg: SamplerCfg,
        queue_capacity: usize,
        clock: C,
        epoch: Instant,
    ) -> Self
    where
        D: InputDevice + Send + 'static,
        C: Clock + Send + Sync + 'static,
    {
        let (tx, rx) = queue::bounded(queue_capacity, OverflowPolicy::DropOldest);
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();
        let connected = Arc::new(AtomicBool::new(false));
        let connected_clone = connected.clone();
        let read_errors = Arc::new(AtomicU64::new(0));
        let read_errors_clone = read_errors.clone();

        let join_handle = std::thread::spawn(move || {
            loop {
                if shutdown_clone.load(Ordering::Relaxed) {
                    tracing::debug!("input sampler received shutdown signal");
                    break;
                }

                let axes = match device.read_axes() {
                    Ok(axes) => axes,
                    Err(e) => {
                        read_errors_clone.fetch_add(1, Ordering::Relaxed);
                        tracing::debug!(error = %e, "input device read failed");
                        None
                    }
                };

                let was_connected = connected_clone.swap(axes.is_some(), Ordering::Relaxed);
                match axes {
                    Some(axes) => {
                        if !was_connected {
                            tracing::info!("input device connected");
                        }
                        let ts = i32::try_from(clock.ms_since(epoch)).unwrap_or(i32::MAX);
                        let sample = InputSample::new(ts, axes);
                        if tx.push(sample) == PushOutcome::DisplacedOldest {
                            tracing::trace!(dropped = tx.dropped(), "input queue full, oldest sample displaced");
                        }
                        if shutdown_clone.load(Ordering::Relaxed) {
                            break;
                        }
                        clock.sleep(cfg.period);
                    }
                    None => {
                        if was_connected {
                            tracing::info!("input device disconnected, idling");
                        }
                        if shutdown_clone.load(Ordering::Relaxed) {
                            break;
                        }
                        clock.sleep(cfg.idle);
                    }
                }
            }
            tracing::trace!("input sampler thread exiting cleanly");
        });

        Self {
            rx,
            connected,
            read_errors,
            shutdown,
            join_handle: Some(join_handle),
        }
    }

    /// Newest available sample, discarding older queued ones. Never blocks.
    pub fn latest(&self) -> Option<InputSample> {
        self.rx.latest()
    }

    /// Every queued sample, oldest first. Never blocks.
    pub fn drain(&self) -> Vec<InputSample> {
        self.rx.drain().collect()
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    /// Samples displaced by newer ones before being consumed.
    pub fn dropped(&self) -> u64 {
        self.rx.dropped()
    }

    pub fn read_errors(&self) -> u64 {
        self.read_errors.load(Ordering::Relaxed)
    }
}

impl Drop for InputSampler {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.join_handle.take() {
            match handle.join() {
                Ok(()) => tracing::trace!("input sampler joined"),
                Err(e) => tracing::warn!(?e, "input sampler thread panicked during shutdown"),
            }
        }
    }
}
