//! Maps `Box<dyn Error>` from trait boundaries to typed `LinkError`.
//!
//! The traits in `steplink_traits` use `Box<dyn Error + Send + Sync>`; this
//! module converts those to our typed error enum, with an optional
//! feature-gated path for `steplink_hardware::HwError` downcasting.

use crate::error::LinkError;

/// Map a trait-boundary error to a typed `LinkError`.
///
/// `port` names the endpoint involved, if any, so open failures can be
/// reported as `PortUnavailable`.
pub fn map_hw_error(e: &(dyn std::error::Error + 'static), port: Option<&str>) -> LinkError {
    #[cfg(feature = "hardware-errors")]
    {
        use steplink_hardware::error::HwError;
        if let Some(hw) = e.downcast_ref::<HwError>() {
            return match hw {
                HwError::Timeout => LinkError::Timeout,
                HwError::Open { port, reason } => LinkError::PortUnavailable {
                    port: port.clone(),
                    reason: reason.clone(),
                },
                other => LinkError::Io(other.to_string()),
            };
        }
    }

    if let Some(io) = e.downcast_ref::<std::io::Error>() {
        if io.kind() == std::io::ErrorKind::TimedOut {
            return LinkError::Timeout;
        }
    }

    // Fallback: string-based detection
    let s = e.to_string();
    match port {
        Some(p) => LinkError::PortUnavailable {
            port: p.to_string(),
            reason: s,
        },
        None if s.to_lowercase().contains("timeout") => LinkError::Timeout,
        None => LinkError::Io(s),
    }
}
