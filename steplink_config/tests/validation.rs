use rstest::rstest;
use steplink_config::{load_file, load_toml};

#[rstest]
#[case("[link]\nbaud_rate = 0\n", "baud_rate must be > 0")]
#[case("[link]\nread_timeout_ms = 0\n", "read_timeout_ms must be >= 1")]
#[case("[link]\nprobe_timeout_ms = 0\n", "probe_timeout_ms must be >= 1")]
#[case("[link]\nport = \"  \"\n", "link.port must not be empty")]
#[case("[buffers]\ntelemetry_capacity = 0\n", "telemetry_capacity must be >= 1")]
#[case("[buffers]\ninput_queue_capacity = 0\n", "input_queue_capacity must be >= 1")]
#[case("[sampler]\nperiod_ms = 0\n", "sampler.period_ms must be >= 1")]
#[case("[mixer]\nmax_acceleration = 0\n", "max_acceleration must be > 0")]
#[case("[mixer]\nmax_jerk = -1.0\n", "max_jerk must be a finite value > 0")]
#[case("[simulation]\nnoise_min = 5.0\nnoise_max = 5.0\n", "noise_min must be <")]
#[case("[logging]\nrotation = \"weekly\"\n", "rotation must be one of")]
fn rejects_invalid_values(#[case] toml: &str, #[case] needle: &str) {
    let cfg = load_toml(toml).expect("parse TOML");
    let err = cfg.validate().expect_err("should reject");
    assert!(
        format!("{err}").contains(needle),
        "error {err} does not mention {needle}"
    );
}

#[test]
fn accepts_full_document() {
    let toml = r#"
[link]
baud_rate = 115200
settle_ms = 100
read_timeout_ms = 50
probe_timeout_ms = 400
port = "/dev/ttyACM0"

[buffers]
telemetry_capacity = 512
input_capacity = 118
rx_queue_capacity = 256
input_queue_capacity = 5

[sampler]
period_ms = 10
idle_ms = 100

[mixer]
speed0_scale = 19200
speed1_scale = 6400
speed23_scale = 6400
max_acceleration = 50000
tx_period_ms = 30
shaping = "ramp"

[clock]
input_skew_ms = 96

[simulation]
tick_ms = 3
noise_min = -7.0
noise_max = 16.0
seed = 7

[logging]
level = "debug"
rotation = "daily"
"#;
    let cfg = load_toml(toml).expect("parse TOML");
    cfg.validate().expect("valid");
    assert_eq!(cfg.link.port.as_deref(), Some("/dev/ttyACM0"));
    assert_eq!(cfg.simulation.seed, Some(7));
    assert_eq!(cfg.buffers.telemetry_capacity, 512);
}

#[test]
fn unknown_shaping_is_a_parse_error() {
    assert!(load_toml("[mixer]\nshaping = \"cubic\"\n").is_err());
}

#[test]
fn load_file_reports_parse_errors() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("bad.toml");
    std::fs::write(&path, "[link\nbaud_rate = ").expect("write");
    let err = load_file(&path).expect_err("should fail");
    assert!(format!("{err}").contains("invalid configuration"));
}

#[test]
fn load_file_reads_values() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("ok.toml");
    std::fs::write(&path, "[link]\nforce_simulation = true\n").expect("write");
    let cfg = load_file(&path).expect("load");
    assert!(cfg.link.force_simulation);
}
