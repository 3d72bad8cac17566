use thiserror::Error;

#[derive(Debug, Error)]
pub enum HwError {
    #[error("port enumeration failed: {0}")]
    Enumerate(String),
    #[error("open port {port}: {reason}")]
    Open { port: String, reason: String },
    #[error("serial read timeout")]
    Timeout,
    #[error("input device error: {0}")]
    Input(String),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HwError>;
