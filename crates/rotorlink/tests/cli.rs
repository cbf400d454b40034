#![cfg(all(unix, feature = "cli"))]

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use rotorlink_frame::{FrameConfig, PacketSink, PacketSource, PacketType, StreamChannel};
use rotorlink_port::{connect, CommandData, GroundReport, Payload, PortConfig, PortListener};

fn unique_temp_dir(tag: &str) -> PathBuf {
    let dir = PathBuf::from(format!(
        "/tmp/rlcli-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

fn blocking(timeout: Duration) -> FrameConfig {
    FrameConfig {
        nonblocking: false,
        read_timeout: Some(timeout),
        write_timeout: Some(timeout),
    }
}

/// The listener accepts exactly one station, so the connection used to
/// wait for it is the one the test keeps.
fn connect_when_ready(path: &Path, timeout: Duration) -> StreamChannel {
    let start = Instant::now();
    loop {
        if let Ok(channel) = connect(path, blocking(Duration::from_secs(3))) {
            return channel;
        }
        if start.elapsed() >= timeout {
            panic!("connect timeout");
        }
        thread::sleep(Duration::from_millis(25));
    }
}

fn rotorlink() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_rotorlink"));
    cmd.arg("--log-level").arg("error");
    cmd
}

#[test]
fn version_prints_package_version() {
    let output = rotorlink()
        .arg("version")
        .output()
        .expect("version should run");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn listen_dispatches_and_answers_with_reports() {
    let dir = unique_temp_dir("listen");
    let sock_path = dir.join("port.sock");

    let child = rotorlink()
        .arg("--format")
        .arg("json")
        .arg("listen")
        .arg(&sock_path)
        .arg("--count")
        .arg("2")
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("listen command should start");

    let mut station = connect_when_ready(&sock_path, Duration::from_secs(3));
    let command = CommandData {
        roll: 1,
        pitch: -2,
        yaw: 3,
        z: 400,
    };
    station
        .send(PacketType::CommandData, &command.encode())
        .expect("command data should send");

    let report = station.receive().expect("ground report should arrive");
    assert_eq!(report.packet_type, PacketType::GroundReport);
    let report = GroundReport::decode(&report.payload).expect("report should decode");
    assert_eq!(report.offsets, command);

    station
        .send(PacketType::IdleLimit, &[0x01, 0x2C])
        .expect("idle limit should send");

    let output = child.wait_with_output().expect("listen should finish");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 3, "{stdout}");
    assert!(lines[0].contains("\"packet_type\":\"COMMAND_DATA\""));
    assert!(lines[0].contains("\"action\":\"stored\""));
    assert!(lines[0].contains("\"z\":400"));
    assert!(lines[1].contains("\"control\":\"idle_limit\""));
    assert!(lines[1].contains("\"value\":300"));
    assert!(lines[2].contains("\"stats\""));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn listen_exits_on_shutdown_packet() {
    let dir = unique_temp_dir("shutdown");
    let sock_path = dir.join("port.sock");

    let child = rotorlink()
        .arg("--format")
        .arg("json")
        .arg("listen")
        .arg(&sock_path)
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("listen command should start");

    let mut station = connect_when_ready(&sock_path, Duration::from_secs(3));
    station
        .send(PacketType::ShutDown, &[])
        .expect("shutdown should send");

    let output = child.wait_with_output().expect("listen should finish");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("\"control\":\"shut_down\""), "{stdout}");

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn listen_stops_on_interrupt_before_any_station_connects() {
    let dir = unique_temp_dir("interrupt");
    let sock_path = dir.join("port.sock");

    let mut child = rotorlink()
        .arg("listen")
        .arg(&sock_path)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("listen command should start");

    let start = Instant::now();
    while !sock_path.exists() {
        assert!(start.elapsed() < Duration::from_secs(3), "socket never appeared");
        thread::sleep(Duration::from_millis(25));
    }
    // The handler is installed right after bind.
    thread::sleep(Duration::from_millis(200));

    let pid = libc::pid_t::try_from(child.id()).expect("pid should fit pid_t");
    // SAFETY: `pid` is our own live child process.
    let rc = unsafe { libc::kill(pid, libc::SIGINT) };
    assert_eq!(rc, 0);

    let start = Instant::now();
    let status = loop {
        if let Some(status) = child.try_wait().expect("child should be waitable") {
            break status;
        }
        if start.elapsed() >= Duration::from_secs(3) {
            let _ = child.kill();
            panic!("listen ignored the interrupt while waiting for a station");
        }
        thread::sleep(Duration::from_millis(25));
    };
    assert!(status.success());

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn send_delivers_one_packet_and_waits_for_reply() {
    let dir = unique_temp_dir("send");
    let sock_path = dir.join("board.sock");
    let listener = PortListener::bind(&sock_path)
        .expect("bind should succeed")
        .with_config(PortConfig {
            frame: blocking(Duration::from_secs(3)),
            ..PortConfig::default()
        });

    let board = thread::spawn(move || {
        let mut channel = listener.accept().expect("accept should succeed");
        let packet = channel.receive().expect("packet should arrive");
        channel
            .send(PacketType::StateMode, &[2, 1])
            .expect("reply should send");
        packet
    });

    let output = rotorlink()
        .arg("--format")
        .arg("json")
        .arg("send")
        .arg(&sock_path)
        .arg("--type")
        .arg("yaw_params")
        .arg("--json")
        .arg(r#"{"kp":10,"ki":0,"kd":-5,"kdd":1}"#)
        .arg("--wait")
        .output()
        .expect("send should run");

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("\"packet_type\":\"STATE_MODE\""), "{stdout}");

    let packet = board.join().expect("board thread should finish");
    assert_eq!(packet.packet_type, PacketType::YawParams);
    assert_eq!(
        packet.payload.as_ref(),
        &[0x00, 0x0A, 0x00, 0x00, 0xFF, 0xFB, 0x00, 0x01]
    );

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn send_rejects_unknown_type() {
    let output = rotorlink()
        .arg("send")
        .arg("/tmp/rlcli-unused.sock")
        .arg("--type")
        .arg("warp_drive")
        .output()
        .expect("send should run");
    assert_eq!(output.status.code(), Some(64));
}

#[test]
fn send_to_missing_socket_is_transport_error() {
    let dir = unique_temp_dir("missing");
    let missing = dir.join("none.sock");
    let output = rotorlink()
        .arg("send")
        .arg(&missing)
        .arg("--type")
        .arg("shut_down")
        .output()
        .expect("send should run");
    assert_eq!(output.status.code(), Some(3));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn estimate_converges_on_constant_altitude() {
    let mut child = rotorlink()
        .arg("--format")
        .arg("raw")
        .arg("estimate")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("estimate should start");

    {
        let mut stdin = child.stdin.take().expect("stdin should be piped");
        for _ in 0..500 {
            writeln!(stdin, "100,0,0.01").expect("sample should write");
        }
    }

    let output = child.wait_with_output().expect("estimate should finish");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let last = stdout.lines().last().expect("estimate should print rows");
    let position: f64 = last
        .split_whitespace()
        .next()
        .and_then(|field| field.parse().ok())
        .expect("position should be numeric");
    assert!((position - 100.0).abs() < 1e-3, "{position}");
}

#[test]
fn estimate_rejects_bad_input() {
    let dir = unique_temp_dir("estimate");
    let input = dir.join("samples.csv");
    std::fs::write(&input, "# z,ddz,dt\n1,0,0.01\n1,zero,0.01\n").expect("samples should write");

    let output = rotorlink()
        .arg("estimate")
        .arg("--input")
        .arg(&input)
        .output()
        .expect("estimate should run");
    assert_eq!(output.status.code(), Some(60));
    assert!(String::from_utf8_lossy(&output.stderr).contains("line 3"));

    let _ = std::fs::remove_dir_all(&dir);
}
