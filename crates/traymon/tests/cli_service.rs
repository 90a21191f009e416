#![cfg(all(unix, feature = "cli"))]

use std::io::{self, BufRead, BufReader};
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use traymon_frame::decode_record;
use traymon_transport::{IpcStream, UnixDomainSocket};

fn wait_for_connect(path: &Path, timeout: Duration) -> io::Result<IpcStream> {
    let start = Instant::now();
    loop {
        match UnixDomainSocket::connect(path) {
            Ok(stream) => return Ok(stream),
            Err(err) => {
                if start.elapsed() >= timeout {
                    return Err(io::Error::other(format!("connect timeout: {err}")));
                }
                thread::sleep(Duration::from_millis(25));
            }
        }
    }
}

fn spawn_service(endpoint: &Path) -> Child {
    Command::new(env!("CARGO_BIN_EXE_traymon"))
        .arg("--log-level")
        .arg("error")
        .arg("--endpoint")
        .arg(endpoint)
        .arg("service")
        .arg("--interval")
        .arg("100ms")
        .arg("--publish-interval")
        .arg("100ms")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("service should start")
}

#[test]
fn service_publishes_well_formed_records() {
    let dir = tempfile::tempdir().expect("temp dir");
    let endpoint = dir.path().join("svc.sock");
    let mut child = spawn_service(&endpoint);

    let stream = wait_for_connect(&endpoint, Duration::from_secs(5)).expect("service endpoint");
    stream
        .set_read_timeout(Some(Duration::from_secs(5)))
        .expect("read timeout");
    let mut reader = BufReader::new(stream);

    for _ in 0..2 {
        let mut line = String::new();
        reader.read_line(&mut line).expect("record line");
        assert!(line.starts_with("{\"time\":\""), "unexpected line {line:?}");
        let snapshot = decode_record(line.as_bytes()).expect("record should decode");
        assert_eq!(snapshot.time.len(), 5);
        assert_eq!(snapshot.time.as_bytes()[2], b':');
        assert!(snapshot.cpu_load <= 100);
        assert!(snapshot.volume <= 100);
    }

    let _ = child.kill();
    let _ = child.wait();
}

#[test]
fn service_serves_next_reader_after_disconnect() {
    let dir = tempfile::tempdir().expect("temp dir");
    let endpoint = dir.path().join("again.sock");
    let mut child = spawn_service(&endpoint);

    for _ in 0..2 {
        let stream =
            wait_for_connect(&endpoint, Duration::from_secs(5)).expect("service endpoint");
        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .expect("read timeout");
        let mut line = String::new();
        BufReader::new(stream)
            .read_line(&mut line)
            .expect("record line");
        assert!(decode_record(line.as_bytes()).is_ok());
    }

    let _ = child.kill();
    let _ = child.wait();
}

#[test]
fn second_service_on_same_endpoint_fails() {
    let dir = tempfile::tempdir().expect("temp dir");
    let endpoint = dir.path().join("owned.sock");
    let mut first = spawn_service(&endpoint);
    let _first = wait_for_connect(&endpoint, Duration::from_secs(5)).expect("first service");

    let output = Command::new(env!("CARGO_BIN_EXE_traymon"))
        .arg("--endpoint")
        .arg(&endpoint)
        .arg("service")
        .output()
        .expect("second service should run");

    assert_eq!(output.status.code(), Some(3));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("already served"), "stderr: {stderr}");

    let _ = first.kill();
    let _ = first.wait();
}
