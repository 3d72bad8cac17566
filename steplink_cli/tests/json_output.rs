use assert_cmd::prelude::*;
use rstest::rstest;
use serde_json::Value;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use tempfile::tempdir;

fn write_valid_config(dir: &tempfile::TempDir) -> PathBuf {
    let toml = r#"
[link]
read_timeout_ms = 20
probe_timeout_ms = 50
settle_ms = 0

[simulation]
seed = 11
"#;
    let path = dir.path().join("cfg.toml");
    fs::write(&path, toml).unwrap();
    path
}

fn last_json_line(stdout: &[u8]) -> Value {
    let text = String::from_utf8_lossy(stdout);
    let line = text
        .lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .expect("no output");
    serde_json::from_str(line).expect("stdout is not JSON")
}

/// A short simulated run reports its counters as one JSON object.
#[rstest]
fn simulated_run_summary_schema() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    let mut cmd = Command::cargo_bin("steplink").unwrap();
    cmd.arg("--json")
        .arg("--log-level")
        .arg("warn")
        .arg("--config")
        .arg(&cfg)
        .args(["run", "--simulate", "--duration-ms", "600"]);

    let out = cmd.assert().success().get_output().stdout.clone();
    let v = last_json_line(&out);

    assert_eq!(v["source"], "simulated");
    assert_eq!(v["simulated"], true);
    assert_eq!(v["state"], "stopped");
    assert!(v["commands"].as_u64().unwrap() > 0);
    assert!(v["telemetry"].as_u64().unwrap() > 0);
    assert_eq!(v["stats"]["frame_errors"], 0);
    assert_eq!(v["last_command"]["max_acceleration"], 50_000);
    assert_eq!(v["last_command"]["speed"].as_array().unwrap().len(), 4);
}

/// With no candidate ports the run falls back to the simulator on its own.
#[rstest]
fn run_without_ports_falls_back_to_simulation() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    let mut cmd = Command::cargo_bin("steplink").unwrap();
    cmd.arg("--json")
        .arg("--log-level")
        .arg("warn")
        .arg("--config")
        .arg(&cfg)
        .args(["run", "--no-input", "--duration-ms", "500"]);

    let out = cmd.assert().success().get_output().stdout.clone();
    let v = last_json_line(&out);
    assert_eq!(v["simulated"], true);
    // No joystick means every command is all zeros
    assert_eq!(v["last_command"]["speed"], serde_json::json!([0, 0, 0, 0]));
}

/// Config errors come back as structured JSON on stderr with exit code 2.
#[rstest]
fn config_error_is_json() {
    let dir = tempdir().unwrap();
    let cfg = dir.path().join("bad.toml");
    fs::write(&cfg, "[mixer]\nmax_acceleration = -1\n").unwrap();

    let mut cmd = Command::cargo_bin("steplink").unwrap();
    cmd.arg("--json").arg("--config").arg(&cfg).arg("self-check");

    let out = cmd.assert().code(2).get_output().stderr.clone();
    let v = last_json_line(&out);
    assert_eq!(v["reason"], "Config");
    assert_eq!(v["exit_code"], 2);
    assert!(v["message"].as_str().unwrap().contains("max_acceleration"));
}

#[rstest]
fn ports_lists_configured_port() {
    let dir = tempdir().unwrap();
    let cfg = dir.path().join("port.toml");
    fs::write(&cfg, "[link]\nport = \"/dev/ttyACM7\"\n").unwrap();

    let mut cmd = Command::cargo_bin("steplink").unwrap();
    cmd.arg("--json").arg("--config").arg(&cfg).arg("ports");

    let out = cmd.assert().success().get_output().stdout.clone();
    let v = last_json_line(&out);
    assert_eq!(v["ports"], serde_json::json!(["/dev/ttyACM7"]));
}
