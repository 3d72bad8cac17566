//! Host-side device backends.
//!
//! The `hardware` feature pulls in the `serialport` backend. The simulated
//! collaborators below are always available so the rest of the stack can run
//! on a machine with no device attached.
pub mod error;
#[cfg(feature = "hardware")]
pub mod serial;

use std::time::{Duration, Instant};

use steplink_traits::{InputDevice, PortOpener, SerialLink};

use crate::error::HwError;

#[cfg(feature = "hardware")]
pub use serial::{SystemLink, SystemPorts};

/// An opener for a host without any serial endpoints.
///
/// Discovery through it always comes back empty, which sends the transport
/// straight to its simulated source.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPorts;

impl PortOpener for NoPorts {
    fn list_ports(&self) -> Result<Vec<String>, Box<dyn std::error::Error + Send + Sync>> {
        Ok(Vec::new())
    }

    fn open(
        &self,
        port: &str,
        _baud_rate: u32,
        _read_timeout: Duration,
    ) -> Result<Box<dyn SerialLink>, Box<dyn std::error::Error + Send + Sync>> {
        Err(Box::new(HwError::Open {
            port: port.to_string(),
            reason: "no serial backend compiled in".to_string(),
        }))
    }
}

/// Pick the opener for this build: real ports with `hardware`, none otherwise.
pub fn default_opener() -> Box<dyn PortOpener> {
    #[cfg(feature = "hardware")]
    {
        Box::new(SystemPorts::new())
    }
    #[cfg(not(feature = "hardware"))]
    {
        Box::new(NoPorts)
    }
}

/// Simulated gamepad: both sticks trace slow circles out of phase.
pub struct SimulatedJoystick {
    started: Instant,
    /// Seconds per revolution of the left stick
    period_s: f32,
}

impl SimulatedJoystick {
    pub fn new() -> Self {
        Self::with_period(Duration::from_secs(4))
    }

    pub fn with_period(period: Duration) -> Self {
        Self {
            started: Instant::now(),
            period_s: period.as_secs_f32().max(0.001),
        }
    }

    /// Axis values at `t` seconds after start.
    pub fn axes_at(&self, t: f32) -> [f32; 4] {
        let phase = t / self.period_s * std::f32::consts::TAU;
        [
            0.5 * phase.cos(),
            0.5 * phase.sin(),
            0.8 * (0.5 * phase).cos(),
            0.8 * (0.5 * phase).sin(),
        ]
    }
}

impl Default for SimulatedJoystick {
    fn default() -> Self {
        Self::new()
    }
}

impl InputDevice for SimulatedJoystick {
    fn read_axes(&mut self) -> Result<Option<[f32; 4]>, Box<dyn std::error::Error + Send + Sync>> {
        let t = self.started.elapsed().as_secs_f32();
        Ok(Some(self.axes_at(t)))
    }
}

/// An input slot with nothing plugged in.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisconnectedJoystick;

impl InputDevice for DisconnectedJoystick {
    fn read_axes(&mut self) -> Result<Option<[f32; 4]>, Box<dyn std::error::Error + Send + Sync>> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_ports_lists_nothing_and_refuses_open() {
        let opener = NoPorts;
        assert!(opener.list_ports().unwrap().is_empty());
        let err = opener
            .open("/dev/ttyUSB0", 115_200, Duration::from_millis(10))
            .err()
            .expect("open must fail");
        assert!(err.to_string().contains("/dev/ttyUSB0"));
    }

    #[rstest::rstest]
    #[case(Duration::from_millis(500))]
    #[case(Duration::from_secs(4))]
    #[case(Duration::ZERO)]
    fn simulated_joystick_stays_in_range(#[case] period: Duration) {
        let js = SimulatedJoystick::with_period(period);
        for i in 0..200 {
            let axes = js.axes_at(i as f32 * 0.01);
            assert!(axes.iter().all(|v| (-1.0..=1.0).contains(v)));
        }
    }

    #[test]
    fn simulated_joystick_is_connected() {
        let mut js = SimulatedJoystick::new();
        assert!(js.read_axes().unwrap().is_some());
    }

    #[test]
    fn disconnected_joystick_reports_none() {
        let mut js = DisconnectedJoystick;
        assert!(js.read_axes().unwrap().is_none());
    }
}
