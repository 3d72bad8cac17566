//! `serialport`-backed implementation of the serial seams.
use std::io::{Read, Write};
use std::time::Duration;

use steplink_traits::{PortOpener, SerialLink};
use tracing::{debug, trace};

use crate::error::HwError;

/// Opens real OS serial devices.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemPorts;

impl SystemPorts {
    pub fn new() -> Self {
        Self
    }
}

impl PortOpener for SystemPorts {
    fn list_ports(&self) -> Result<Vec<String>, Box<dyn std::error::Error + Send + Sync>> {
        let ports =
            serialport::available_ports().map_err(|e| HwError::Enumerate(e.to_string()))?;
        let names: Vec<String> = ports.into_iter().map(|p| p.port_name).collect();
        debug!(count = names.len(), "enumerated serial ports");
        Ok(names)
    }

    fn open(
        &self,
        port: &str,
        baud_rate: u32,
        read_timeout: Duration,
    ) -> Result<Box<dyn SerialLink>, Box<dyn std::error::Error + Send + Sync>> {
        let inner = serialport::new(port, baud_rate)
            .timeout(read_timeout)
            .open()
            .map_err(|e| HwError::Open {
                port: port.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Box::new(SystemLink {
            name: port.to_string(),
            inner,
        }))
    }
}

/// One open handle on an OS serial device.
pub struct SystemLink {
    name: String,
    inner: Box<dyn serialport::SerialPort>,
}

impl SerialLink for SystemLink {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Box<dyn std::error::Error + Send + Sync>> {
        match self.inner.read(buf) {
            Ok(n) => {
                trace!(port = %self.name, bytes = n, "serial read");
                Ok(n)
            }
            // A quiet line is not an error at this layer
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(0),
            Err(e) => Err(Box::new(HwError::Io(e))),
        }
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.inner.write_all(bytes).map_err(HwError::Io)?;
        self.inner.flush().map_err(HwError::Io)?;
        Ok(())
    }

    fn try_clone_link(
        &self,
    ) -> Result<Box<dyn SerialLink>, Box<dyn std::error::Error + Send + Sync>> {
        let inner = self.inner.try_clone().map_err(|e| HwError::Open {
            port: self.name.clone(),
            reason: e.to_string(),
        })?;
        Ok(Box::new(SystemLink {
            name: self.name.clone(),
            inner,
        }))
    }
}
