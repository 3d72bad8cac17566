use assert_cmd::prelude::*;
use predicates::prelude::*;
use rstest::rstest;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use tempfile::tempdir;

// Small buffers and a seeded simulator keep runs short and repeatable
fn write_valid_config(dir: &tempfile::TempDir) -> PathBuf {
    let toml = r#"
[link]
read_timeout_ms = 20
probe_timeout_ms = 50
settle_ms = 0

[buffers]
telemetry_capacity = 64
input_capacity = 32

[mixer]
tx_period_ms = 30

[simulation]
seed = 7
"#;
    let path = dir.path().join("cfg.toml");
    fs::write(&path, toml).unwrap();
    path
}

#[rstest]
#[case(&["--help"], 0, "Usage:", "stdout")]
#[case(&["self-check"], 0, "self-check ok", "stdout")]
#[case(&["profile", "--target", "100", "--max-accel", "1000", "--dt", "0.05"], 0, "t,position,velocity,acceleration", "stdout")]
#[case(&["profile"], 2, "required", "stderr")]
#[case(&["profile", "--target", "100", "--dt", "0"], 1, "--dt", "stderr")]
#[case(&["run", "--simulate", "--duration-ms", "400"], 0, "source: simulated", "stdout")]
#[case(&["bogus"], 2, "Usage:", "stderr")]
fn cli_table_cases(
    #[case] args: &[&str],
    #[case] exit_code: i32,
    #[case] needle: &str,
    #[case] stream: &str,
) {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    let mut cmd = Command::cargo_bin("steplink").unwrap();

    // Always include a valid config to avoid relying on default path
    cmd.arg("--config").arg(&cfg).arg("--log-level").arg("warn");

    for a in args {
        cmd.arg(a);
    }

    let assert = cmd.assert().code(exit_code);

    match stream {
        "stdout" => {
            assert.stdout(predicate::str::contains(needle));
        }
        "stderr" => {
            assert.stderr(predicate::str::contains(needle));
        }
        other => panic!("unknown stream: {other}"),
    }
}

#[rstest]
fn invalid_config_exits_with_two() {
    let dir = tempdir().unwrap();
    let cfg = dir.path().join("bad.toml");
    fs::write(&cfg, "[link]\nbaud_rate = 0\n").unwrap();

    let mut cmd = Command::cargo_bin("steplink").unwrap();
    cmd.arg("--config").arg(&cfg).arg("self-check");

    cmd.assert()
        .code(2)
        .stderr(predicate::str::contains("baud_rate"));
}

#[rstest]
fn malformed_toml_exits_with_two() {
    let dir = tempdir().unwrap();
    let cfg = dir.path().join("broken.toml");
    fs::write(&cfg, "[link\nbaud_rate = ").unwrap();

    let mut cmd = Command::cargo_bin("steplink").unwrap();
    cmd.arg("--config").arg(&cfg).arg("ports");

    cmd.assert()
        .code(2)
        .stderr(predicate::str::contains("Configuration is invalid"));
}

#[rstest]
fn missing_config_file_uses_defaults() {
    let dir = tempdir().unwrap();
    let mut cmd = Command::cargo_bin("steplink").unwrap();
    cmd.arg("--config")
        .arg(dir.path().join("absent.toml"))
        .arg("self-check");
    cmd.assert().success();
}

#[rstest]
fn profile_writes_csv_file() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);
    let out = dir.path().join("ramp.csv");

    let mut cmd = Command::cargo_bin("steplink").unwrap();
    cmd.arg("--config")
        .arg(&cfg)
        .args(["profile", "--kind", "s-curve", "--target", "-200"])
        .args(["--max-accel", "1000", "--max-jerk", "10000", "--dt", "0.01"])
        .arg("--out")
        .arg(&out);
    cmd.assert().success();

    let mut rdr = csv::Reader::from_path(&out).unwrap();
    let headers = rdr.headers().unwrap().clone();
    assert_eq!(
        headers.iter().collect::<Vec<_>>(),
        ["t", "position", "velocity", "acceleration"]
    );
    let rows: Vec<csv::StringRecord> = rdr.records().map(Result::unwrap).collect();
    assert!(rows.len() > 2);
    let last_v: f64 = rows.last().unwrap()[2].parse().unwrap();
    assert!((last_v + 200.0).abs() < 1e-3, "settled at {last_v}");
}
