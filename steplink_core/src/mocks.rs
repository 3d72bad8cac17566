//! Scripted collaborators for tests, benches and demos.
//!
//! Handles share their state through `Arc<Mutex<..>>`, so a test can keep a
//! clone of a `ScriptedLink` to feed bytes and inspect writes while the link
//! itself runs inside a worker thread.
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use steplink_traits::{InputDevice, PortOpener, SerialLink};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Default)]
struct LinkScript {
    incoming: VecDeque<Result<Vec<u8>, std::io::ErrorKind>>,
    written: Vec<Vec<u8>>,
}

/// In-memory serial link. Reads replay queued chunks; writes are recorded.
#[derive(Debug, Clone)]
pub struct ScriptedLink {
    script: Arc<Mutex<LinkScript>>,
    splittable: bool,
    /// Pause on an empty read, standing in for the port's read timeout.
    idle: Duration,
}

impl Default for ScriptedLink {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedLink {
    pub fn new() -> Self {
        Self {
            script: Arc::new(Mutex::new(LinkScript::default())),
            splittable: true,
            idle: Duration::from_millis(1),
        }
    }

    /// A link whose `try_clone_link` fails.
    pub fn unsplittable() -> Self {
        Self {
            splittable: false,
            ..Self::new()
        }
    }

    fn lock(&self) -> MutexGuard<'_, LinkScript> {
        // A poisoned script only happens after a test already panicked
        self.script.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Queue bytes for a future read.
    pub fn feed(&self, bytes: &[u8]) {
        self.lock().incoming.push_back(Ok(bytes.to_vec()));
    }

    /// Queue a read that fails with `kind`.
    pub fn feed_error(&self, kind: std::io::ErrorKind) {
        self.lock().incoming.push_back(Err(kind));
    }

    /// Every buffer passed to `write_all`, in order.
    pub fn written(&self) -> Vec<Vec<u8>> {
        self.lock().written.clone()
    }

    pub fn pending_reads(&self) -> usize {
        self.lock().incoming.len()
    }
}

impl SerialLink for ScriptedLink {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, BoxError> {
        let next = self.lock().incoming.pop_front();
        match next {
            Some(Ok(mut chunk)) => {
                let n = chunk.len().min(buf.len());
                buf[..n].copy_from_slice(&chunk[..n]);
                if n < chunk.len() {
                    let rest = chunk.split_off(n);
                    self.lock().incoming.push_front(Ok(rest));
                }
                Ok(n)
            }
            Some(Err(kind)) => Err(Box::new(std::io::Error::from(kind))),
            None => {
                std::thread::sleep(self.idle);
                Ok(0)
            }
        }
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<(), BoxError> {
        self.lock().written.push(bytes.to_vec());
        Ok(())
    }

    fn try_clone_link(&self) -> Result<Box<dyn SerialLink>, BoxError> {
        if self.splittable {
            Ok(Box::new(self.clone()))
        } else {
            Err(Box::new(std::io::Error::other("link cannot be split")))
        }
    }
}

/// Opener over a fixed set of named ports.
///
/// Ports listed without a link fail to open.
#[derive(Debug, Clone, Default)]
pub struct ScriptedOpener {
    ports: Vec<String>,
    links: HashMap<String, ScriptedLink>,
    opened: Arc<Mutex<Vec<String>>>,
    fail_listing: bool,
}

impl ScriptedOpener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a port that opens onto `link`.
    pub fn with_port(mut self, name: &str, link: ScriptedLink) -> Self {
        self.ports.push(name.to_string());
        self.links.insert(name.to_string(), link);
        self
    }

    /// Add a port that is listed but refuses to open.
    pub fn with_dead_port(mut self, name: &str) -> Self {
        self.ports.push(name.to_string());
        self
    }

    pub fn failing_listing(mut self) -> Self {
        self.fail_listing = true;
        self
    }

    /// Ports opened so far, in order.
    pub fn opened(&self) -> Vec<String> {
        self.opened
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

impl PortOpener for ScriptedOpener {
    fn list_ports(&self) -> Result<Vec<String>, BoxError> {
        if self.fail_listing {
            return Err(Box::new(std::io::Error::other("enumeration unavailable")));
        }
        Ok(self.ports.clone())
    }

    fn open(
        &self,
        port: &str,
        _baud_rate: u32,
        _read_timeout: Duration,
    ) -> Result<Box<dyn SerialLink>, BoxError> {
        self.opened
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(port.to_string());
        match self.links.get(port) {
            Some(link) => Ok(Box::new(link.clone())),
            None => Err(Box::new(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no such port: {port}"),
            ))),
        }
    }
}

/// Input device that replays a script, then repeats its last entry.
#[derive(Debug, Clone)]
pub struct ScriptedInput {
    script: VecDeque<Option<[f32; 4]>>,
    last: Option<[f32; 4]>,
    reads: Arc<AtomicUsize>,
}

impl ScriptedInput {
    pub fn new(script: Vec<Option<[f32; 4]>>) -> Self {
        Self {
            script: script.into(),
            last: None,
            reads: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Always reports `axes`.
    pub fn constant(axes: [f32; 4]) -> Self {
        Self::new(vec![Some(axes)])
    }

    /// Never connected.
    pub fn disconnected() -> Self {
        Self::new(Vec::new())
    }

    /// Shared read counter, valid after the device moves into a sampler.
    pub fn read_counter(&self) -> Arc<AtomicUsize> {
        self.reads.clone()
    }
}

impl InputDevice for ScriptedInput {
    fn read_axes(&mut self) -> Result<Option<[f32; 4]>, BoxError> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        if let Some(next) = self.script.pop_front() {
            self.last = next;
        }
        Ok(self.last)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripted_link_splits_long_chunks() {
        let mut link = ScriptedLink::new();
        link.feed(&[1, 2, 3, 4, 5]);
        let mut buf = [0u8; 3];
        assert_eq!(link.read(&mut buf).unwrap(), 3);
        assert_eq!(buf, [1, 2, 3]);
        assert_eq!(link.read(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], &[4, 5]);
        assert_eq!(link.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn clones_share_writes() {
        let link = ScriptedLink::new();
        let mut writer = link.try_clone_link().unwrap();
        writer.write_all(&[9, 0]).unwrap();
        assert_eq!(link.written(), vec![vec![9, 0]]);
    }

    #[test]
    fn unsplittable_link_refuses_clone() {
        assert!(ScriptedLink::unsplittable().try_clone_link().is_err());
    }

    #[test]
    fn dead_ports_fail_to_open() {
        let opener = ScriptedOpener::new().with_dead_port("COM1");
        assert_eq!(opener.list_ports().unwrap(), vec!["COM1".to_string()]);
        assert!(opener.open("COM1", 115_200, Duration::from_millis(1)).is_err());
        assert_eq!(opener.opened(), vec!["COM1".to_string()]);
    }

    #[test]
    fn scripted_input_repeats_last_entry() {
        let mut dev = ScriptedInput::new(vec![None, Some([0.5; 4])]);
        assert_eq!(dev.read_axes().unwrap(), None);
        assert_eq!(dev.read_axes().unwrap(), Some([0.5; 4]));
        assert_eq!(dev.read_axes().unwrap(), Some([0.5; 4]));
        assert_eq!(dev.read_counter().load(Ordering::Relaxed), 3);
    }
}
