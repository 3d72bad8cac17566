//! Hardware-facing seams for the steplink stack.
//!
//! Everything that touches the OS (serial ports, human-input devices, time)
//! sits behind one of these traits so the core can run against simulated or
//! scripted collaborators.
pub mod clock;

pub use clock::{Clock, ManualClock, MonotonicClock};

use std::time::Duration;

/// A byte-oriented, bidirectional serial channel.
pub trait SerialLink: Send {
    /// Read whatever bytes are available into `buf`.
    ///
    /// Implementations block for at most their configured read timeout and
    /// return `Ok(0)` when nothing arrived in that window.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Box<dyn std::error::Error + Send + Sync>>;

    fn write_all(&mut self, bytes: &[u8]) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    /// Second handle onto the same channel, so reads and writes can run on
    /// separate threads.
    fn try_clone_link(&self)
    -> Result<Box<dyn SerialLink>, Box<dyn std::error::Error + Send + Sync>>;
}

/// Enumerates and opens host serial endpoints.
pub trait PortOpener {
    /// Identifiers of every communication endpoint the host knows about,
    /// unfiltered.
    fn list_ports(&self) -> Result<Vec<String>, Box<dyn std::error::Error + Send + Sync>>;

    fn open(
        &self,
        port: &str,
        baud_rate: u32,
        read_timeout: Duration,
    ) -> Result<Box<dyn SerialLink>, Box<dyn std::error::Error + Send + Sync>>;
}

/// A human-input device with (at least) four analog axes.
pub trait InputDevice {
    /// Current value of the four axes, nominally in [-1, 1].
    ///
    /// `Ok(None)` means no device is connected right now.
    fn read_axes(&mut self) -> Result<Option<[f32; 4]>, Box<dyn std::error::Error + Send + Sync>>;
}

impl<T: InputDevice + ?Sized> InputDevice for Box<T> {
    fn read_axes(&mut self) -> Result<Option<[f32; 4]>, Box<dyn std::error::Error + Send + Sync>> {
        (**self).read_axes()
    }
}
