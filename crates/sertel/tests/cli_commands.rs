#![cfg(all(unix, feature = "cli"))]

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use bytes::BytesMut;
use sertel::frame::{encode_frame, FrameLayout, Packet, DEFAULT_FRAME_SIZE};

fn sertel(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_sertel"))
        .arg("--log-level")
        .arg("error")
        .args(args)
        .output()
        .expect("sertel should run")
}

fn write_config(dir: &Path, streams: &str) -> PathBuf {
    let path = dir.join("sertel.toml");
    let text = format!(
        r#"
[sampler]
collector = "127.0.0.1:8089"

{streams}
"#
    );
    std::fs::write(&path, text).expect("config should be writable");
    path
}

fn stream(name: &str, dir: &Path, extra: &str) -> String {
    format!(
        r#"
[[streams]]
name = "{name}"
port = "/dev/ttyACM0"
raw_log = "{dir}/{name}_raw.log"
calibrated_log = "{dir}/{name}_cal.log"
{extra}
"#,
        dir = dir.display()
    )
}

#[test]
fn check_prints_summary_for_valid_config() {
    let dir = tempfile::tempdir().unwrap();
    let streams = format!("{}{}", stream("hv", dir.path(), ""), stream("lv", dir.path(), ""));
    let config = write_config(dir.path(), &streams);

    let output = sertel(&["--format", "json", "check", "--config", config.to_str().unwrap()]);

    assert!(output.status.success(), "{output:?}");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("\"valid\":true"));
    assert!(stdout.contains("\"name\":\"hv\""));
    assert!(stdout.contains("\"name\":\"lv\""));
    assert!(stdout.contains("\"frame_size\":42"));
}

#[test]
fn check_rejects_invalid_config_with_60() {
    let dir = tempfile::tempdir().unwrap();
    let streams = format!("{}{}", stream("hv", dir.path(), ""), stream("hv", dir.path(), ""));
    let config = write_config(dir.path(), &streams);

    let output = sertel(&["check", "--config", config.to_str().unwrap()]);

    assert_eq!(output.status.code(), Some(60));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("duplicate stream name: hv"), "{stderr}");
}

#[test]
fn check_missing_config_fails() {
    let output = sertel(&["check", "--config", "/nonexistent/sertel.toml"]);
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn decode_replays_capture_and_reports_framing_error() {
    let dir = tempfile::tempdir().unwrap();
    let streams = stream(
        "hv",
        dir.path(),
        "scale = [2.0, 2.0, 2.0, 2.0, 2.0, 2.0, 2.0, 2.0]",
    );
    let config = write_config(dir.path(), &streams);

    let layout = FrameLayout::default();
    let mut wire = BytesMut::new();
    wire.extend_from_slice(b"\r\n");
    for sequence in 1..=3u32 {
        let packet = Packet {
            sequence,
            timestamp: 1000 + sequence,
            readings: [sequence as f32; 8],
        };
        encode_frame(&packet, &layout, &mut wire);
    }
    // Break the stop marker of frame 2.
    wire[2 + 2 * DEFAULT_FRAME_SIZE - 2] = b'?';
    let capture = dir.path().join("capture.bin");
    std::fs::write(&capture, &wire).unwrap();

    let output = sertel(&[
        "--format",
        "json",
        "decode",
        "--config",
        config.to_str().unwrap(),
        "--stream",
        "hv",
        capture.to_str().unwrap(),
    ]);

    assert!(output.status.success(), "{output:?}");
    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 4, "{stdout}");
    assert!(lines[0].contains("\"event\":\"packet\""));
    assert!(lines[0].contains("\"sequence\":1"));
    assert!(lines[0].contains("\"readings\":[2.0,"));
    assert!(lines[1].contains("\"event\":\"framing_error\""));
    assert!(lines[2].contains("\"sequence\":3"));
    assert!(lines[3].contains("\"framing_errors\":1"));
    assert!(!stdout.contains("\"sequence\":2"));
}

#[test]
fn decode_raw_skips_calibration() {
    let dir = tempfile::tempdir().unwrap();
    let streams = stream("hv", dir.path(), "offset = [5.0, 5.0, 5.0, 5.0, 5.0, 5.0, 5.0, 5.0]");
    let config = write_config(dir.path(), &streams);

    let layout = FrameLayout::default();
    let mut wire = BytesMut::new();
    wire.extend_from_slice(b"\r\n");
    let packet = Packet {
        sequence: 9,
        timestamp: 0,
        readings: [1.5; 8],
    };
    encode_frame(&packet, &layout, &mut wire);
    let capture = dir.path().join("capture.bin");
    std::fs::write(&capture, &wire).unwrap();

    let output = sertel(&[
        "--format",
        "pretty",
        "decode",
        "-c",
        config.to_str().unwrap(),
        "-s",
        "hv",
        "--raw",
        capture.to_str().unwrap(),
    ]);

    assert!(output.status.success(), "{output:?}");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("stream=hv seq=9 ts=0 values=1.50,1.50"), "{stdout}");
}

#[test]
fn decode_unknown_stream_is_usage_error() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), &stream("hv", dir.path(), ""));
    let capture = dir.path().join("capture.bin");
    std::fs::write(&capture, b"").unwrap();

    let output = sertel(&[
        "decode",
        "--config",
        config.to_str().unwrap(),
        "--stream",
        "mv",
        capture.to_str().unwrap(),
    ]);

    assert_eq!(output.status.code(), Some(64));
}

#[test]
fn version_prints_package_version() {
    let output = sertel(&["version"]);
    assert!(output.status.success());
    assert_eq!(
        String::from_utf8_lossy(&output.stdout).trim(),
        format!("sertel {}", env!("CARGO_PKG_VERSION"))
    );
}
