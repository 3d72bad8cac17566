//! Human-readable error descriptions, exit codes and JSON error formatting.

use steplink_core::error::{BuildError, LinkError};

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingOpener => {
                "What happened: No port opener was provided to the session.\nLikely causes: The session builder was not given a serial backend.\nHow to fix: Pass an opener (e.g. steplink_hardware::default_opener()) to the builder.".to_string()
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid session settings ({msg}).\nLikely causes: Zero capacities or a non-positive acceleration limit.\nHow to fix: Edit the [buffers] and [mixer] sections, then rerun."
            ),
        };
    }

    if let Some(le) = err.downcast_ref::<LinkError>() {
        return match le {
            LinkError::Config(msg) => format!(
                "What happened: Configuration is invalid ({msg}).\nLikely causes: A malformed TOML file or an out-of-range value.\nHow to fix: Fix the config file (see etc/steplink.toml for every key), then rerun."
            ),
            LinkError::PortUnavailable { port, reason } => format!(
                "What happened: Serial port {port} could not be opened ({reason}).\nLikely causes: The device is unplugged, busy in another program, or you lack permission.\nHow to fix: Close other serial monitors; on Linux add yourself to the dialout group."
            ),
            other => format!(
                "What happened: {other}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    let msg = err.to_string();
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable exit codes: config 2, session build 3, anything else 1.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    if let Some(LinkError::Config(_)) = err.downcast_ref::<LinkError>() {
        return 2;
    }
    if err.downcast_ref::<BuildError>().is_some() {
        return 3;
    }
    1
}

fn reason_name(err: &eyre::Report) -> &'static str {
    if let Some(le) = err.downcast_ref::<LinkError>() {
        return match le {
            LinkError::Config(_) => "Config",
            LinkError::PortUnavailable { .. } => "PortUnavailable",
            LinkError::LinkLost => "LinkLost",
            LinkError::Timeout => "Timeout",
            LinkError::FrameDecode => "FrameDecode",
            LinkError::SizeMismatch { .. } => "SizeMismatch",
            LinkError::Io(_) => "Io",
        };
    }
    if err.downcast_ref::<BuildError>().is_some() {
        return "Build";
    }
    "Error"
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    serde_json::json!({
        "reason": reason_name(err),
        "exit_code": exit_code_for_error(err),
        "message": humanize(err),
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_errors_exit_with_two() {
        let err = eyre::Report::new(LinkError::Config("link.baud_rate must be > 0".into()));
        assert_eq!(exit_code_for_error(&err), 2);
        assert!(humanize(&err).contains("baud_rate"));
    }

    #[test]
    fn build_errors_exit_with_three() {
        let err = eyre::Report::new(BuildError::InvalidConfig("input_capacity must be >= 1"));
        assert_eq!(exit_code_for_error(&err), 3);
        let v: serde_json::Value = serde_json::from_str(&format_error_json(&err)).unwrap();
        assert_eq!(v["reason"], "Build");
        assert_eq!(v["exit_code"], 3);
    }

    #[test]
    fn untyped_errors_exit_with_one() {
        let err = eyre::eyre!("boom");
        assert_eq!(exit_code_for_error(&err), 1);
        assert!(humanize(&err).contains("boom"));
    }
}
