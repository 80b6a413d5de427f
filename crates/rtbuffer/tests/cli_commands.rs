#![cfg(all(unix, feature = "cli"))]

use std::io::{BufRead, BufReader};
use std::process::{Child, Command, Stdio};

use rtbuffer::{BufferClient, DataBlock, DataType, Event, HeaderSpec};

struct Server {
    child: Child,
    addr: String,
}

impl Drop for Server {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn start_server() -> Server {
    let mut child = Command::new(env!("CARGO_BIN_EXE_rtbuffer"))
        .args(["--log-level", "error", "--format", "json"])
        .args(["serve", "--listen", "127.0.0.1:0"])
        .env_remove("RTBUFFER_CONFIG")
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("serve should start");

    let stdout = child.stdout.take().expect("stdout is piped");
    let mut line = String::new();
    BufReader::new(stdout)
        .read_line(&mut line)
        .expect("serve should announce its endpoint");
    let announced: serde_json::Value =
        serde_json::from_str(&line).expect("announcement should be json");
    assert_eq!(announced["event"], "listening");
    let addr = announced["endpoint"]
        .as_str()
        .expect("endpoint should be a string")
        .to_string();
    Server { child, addr }
}

fn rtbuffer(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_rtbuffer"))
        .args(["--log-level", "error", "--format", "json"])
        .args(args)
        .env_remove("RTBUFFER_ADDR")
        .output()
        .expect("rtbuffer should run")
}

#[test]
fn header_wait_and_events_against_running_server() {
    let server = start_server();

    let missing = rtbuffer(&["header", "--addr", &server.addr]);
    assert_eq!(missing.status.code(), Some(40));

    let mut producer = BufferClient::connect(&server.addr).expect("producer should connect");
    producer
        .put_header(&HeaderSpec::new(DataType::Float32, 4, 1000.0))
        .expect("header");
    producer
        .put_data(&DataBlock::from_samples(4, &[0.5f32; 400]).expect("block"))
        .expect("data");
    producer
        .put_events(&[Event::new(10, "stim", "A"), Event::new(60, "resp", "B")])
        .expect("events");

    let header = rtbuffer(&["header", "--addr", &server.addr]);
    assert!(header.status.success());
    let header: serde_json::Value =
        serde_json::from_slice(&header.stdout).expect("header output should be json");
    assert_eq!(header["datatype"], "float32");
    assert_eq!(header["channel_count"], 4);
    assert_eq!(header["sample_count"], 100);
    assert_eq!(header["event_count"], 2);

    let satisfied = rtbuffer(&["wait", "--addr", &server.addr, "--samples", "100", "--events", "2"]);
    assert_eq!(satisfied.status.code(), Some(0));
    assert!(String::from_utf8_lossy(&satisfied.stdout).contains("\"outcome\":\"satisfied\""));

    let timed_out = rtbuffer(&[
        "wait", "--addr", &server.addr, "--samples", "150", "--timeout", "50ms",
    ]);
    assert_eq!(timed_out.status.code(), Some(124));
    let reply: serde_json::Value =
        serde_json::from_slice(&timed_out.stdout).expect("wait output should be json");
    assert_eq!(reply["outcome"], "timeout");
    assert_eq!(reply["samples"], 100);

    let events = rtbuffer(&["events", "--addr", &server.addr, "--begin", "1"]);
    assert!(events.status.success());
    let stdout = String::from_utf8_lossy(&events.stdout);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains("\"type\":\"resp\""));
    assert!(lines[0].contains("\"index\":1"));
}

#[test]
fn unreachable_server_is_transport_error() {
    let output = rtbuffer(&["header", "--addr", "127.0.0.1:1"]);
    assert_eq!(output.status.code(), Some(3));
    assert!(String::from_utf8_lossy(&output.stderr).contains("connect to 127.0.0.1:1 failed"));
}

#[test]
fn bad_config_file_is_usage_error() {
    let path = std::env::temp_dir().join(format!("rtbuffer-bad-config-{}.json", std::process::id()));
    std::fs::write(&path, "{\"unknown\": true}").expect("config should be writable");

    let output = Command::new(env!("CARGO_BIN_EXE_rtbuffer"))
        .args(["--log-level", "error", "serve", "--listen", "127.0.0.1:0", "--config"])
        .arg(&path)
        .output()
        .expect("serve should run");
    assert_eq!(output.status.code(), Some(64));

    let _ = std::fs::remove_file(&path);
}

#[test]
fn version_prints_package_version() {
    let output = rtbuffer(&["version"]);
    assert!(output.status.success());
    assert_eq!(
        String::from_utf8_lossy(&output.stdout).trim(),
        format!("rtbuffer {}", env!("CARGO_PKG_VERSION"))
    );
}
