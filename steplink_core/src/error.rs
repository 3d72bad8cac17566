use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LinkError {
    #[error("frame decode error: malformed byte stuffing")]
    FrameDecode,
    #[error("size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },
    #[error("port unavailable: {port}: {reason}")]
    PortUnavailable { port: String, reason: String },
    #[error("link lost: no candidate port answered")]
    LinkLost,
    #[error("timeout waiting for a frame")]
    Timeout,
    #[error("io error: {0}")]
    Io(String),
    #[error("configuration error: {0}")]
    Config(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("missing port opener")]
    MissingOpener,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
