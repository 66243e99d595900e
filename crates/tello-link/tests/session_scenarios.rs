//! End-to-end scenarios against a loopback "drone"
//!
//! Each test binds its own UDP socket standing in for the drone and points a
//! fresh session at it, so tests run in parallel without sharing ports.

use std::net::UdpSocket;
use std::sync::{Arc, Barrier};
use std::time::{Duration, Instant};

use tello_link::video::{encode_jpeg, MockVideoDecoder};
use tello_link::{
    CommandError, Direction, DroneConfig, DroneSession, ModeError, RawFrame, StreamError,
    TelloConfig, VideoConfig, VideoDecoder, VideoStatus,
};

// =============================================================================
// Helpers
// =============================================================================

struct FakeDrone {
    socket: UdpSocket,
}

impl FakeDrone {
    fn new() -> Self {
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        socket
            .set_read_timeout(Some(Duration::from_millis(300)))
            .unwrap();
        Self { socket }
    }

    fn config(&self) -> TelloConfig {
        TelloConfig {
            drone: DroneConfig {
                address: self.socket.local_addr().unwrap(),
                local_port: 0,
                receive_timeout_ms: 200,
                ..DroneConfig::default()
            },
            video: VideoConfig {
                source: "mock://feed".to_string(),
                read_retry_ms: 5,
                encode_retry_ms: 5,
                ..VideoConfig::default()
            },
            ..TelloConfig::default()
        }
    }

    /// Every datagram received until the socket goes quiet
    fn drain(&self) -> Vec<String> {
        let mut out = Vec::new();
        let mut buf = [0u8; 256];
        while let Ok((len, _)) = self.socket.recv_from(&mut buf) {
            out.push(String::from_utf8_lossy(&buf[..len]).into_owned());
        }
        out
    }
}

fn session_with_mock(drone: &FakeDrone) -> (DroneSession, MockVideoDecoder) {
    let decoder = MockVideoDecoder::new();
    let session = DroneSession::new(
        &drone.config(),
        Some(Arc::new(decoder.clone()) as Arc<dyn VideoDecoder>),
    );
    (session, decoder)
}

fn wait_for(mut check: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(3);
    while Instant::now() < deadline {
        if check() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    false
}

// =============================================================================
// Command path
// =============================================================================

#[test]
fn happy_path_logs_command_then_takeoff() {
    let drone = FakeDrone::new();
    let (session, _) = session_with_mock(&drone);

    session.channel().start().unwrap();
    session.gate().ensure_command_mode().unwrap();
    assert!(session.channel().send_command("takeoff"));

    assert_eq!(drone.drain(), vec!["command", "takeoff"]);
    let lines = session.log().read_from(0).lines;
    let command = lines.iter().position(|l| l.ends_with(">>> command")).unwrap();
    let takeoff = lines.iter().position(|l| l.ends_with(">>> takeoff")).unwrap();
    assert!(command < takeoff);

    session.shutdown();
}

#[test]
fn rejected_move_never_reaches_the_wire() {
    let drone = FakeDrone::new();
    let (session, _) = session_with_mock(&drone);

    let err = session.gate().send("right 50").unwrap_err();
    assert_eq!(err, CommandError::Mode(ModeError::NotEngaged));
    assert!(drone.drain().is_empty());
    assert!(!session
        .log()
        .read_from(0)
        .lines
        .iter()
        .any(|l| l.contains(">>> right 50")));
}

#[test]
fn acknowledgements_are_logged_uncorrelated() {
    let drone = FakeDrone::new();
    let (session, _) = session_with_mock(&drone);
    session.gate().ensure_command_mode().unwrap();

    let mut buf = [0u8; 64];
    let (_, tester) = drone.socket.recv_from(&mut buf).unwrap();
    drone.socket.send_to(b"ok", tester).unwrap();
    drone.socket.send_to(b"error", tester).unwrap();

    assert!(wait_for(|| session.log().texts(Direction::Received).len() == 2));
    assert_eq!(session.log().texts(Direction::Received), vec!["ok", "error"]);
    session.shutdown();
}

#[test]
fn log_polling_delivers_each_line_once() {
    let drone = FakeDrone::new();
    let (session, _) = session_with_mock(&drone);

    session.gate().ensure_command_mode().unwrap();
    let first = session.log().read_from(0);
    session.gate().send("land").unwrap();
    let second = session.log().read_from(first.next);

    let mut all = first.lines.clone();
    all.extend(second.lines.clone());
    assert_eq!(all, session.log().read_from(0).lines);
    assert!(second.lines.iter().any(|l| l.ends_with(">>> land")));
    session.shutdown();
}

#[test]
fn stop_without_start_is_harmless() {
    let drone = FakeDrone::new();
    let (session, _) = session_with_mock(&drone);
    session.video().stop();
    session.channel().stop();
    session.shutdown();
    assert!(drone.drain().is_empty());
}

// =============================================================================
// Video path
// =============================================================================

#[test]
fn video_requires_decoder() {
    let drone = FakeDrone::new();
    let session = DroneSession::new(&drone.config(), None);
    session.gate().ensure_command_mode().unwrap();

    let err = session.video().start().unwrap_err();
    assert_eq!(err.to_string(), "OpenH264 not installed. Video disabled.");
    assert_eq!(drone.drain(), vec!["command"]);
    session.shutdown();
}

#[test]
fn video_requires_command_mode() {
    let drone = FakeDrone::new();
    let (session, decoder) = session_with_mock(&drone);

    let err = session.video().start().unwrap_err();
    assert_eq!(err, StreamError::CommandModeRequired);
    assert_eq!(
        err.to_string(),
        "Enter command mode before starting the video stream."
    );
    assert!(!session.video().is_streaming());
    assert_eq!(decoder.opened(), 0);
    assert!(drone.drain().is_empty());
}

#[test]
fn second_start_reuses_running_capture() {
    let drone = FakeDrone::new();
    let (session, decoder) = session_with_mock(&drone);
    session.gate().ensure_command_mode().unwrap();

    assert_eq!(session.video().start().unwrap(), VideoStatus::Starting);
    assert_eq!(
        session.video().start().unwrap(),
        VideoStatus::AlreadyRunning
    );
    assert!(wait_for(|| decoder.opened() == 1));
    assert_eq!(decoder.live_captures(), 1);
    assert_eq!(drone.drain(), vec!["command", "streamon"]);

    session.video().stop();
    assert_eq!(decoder.live_captures(), 0);
}

#[test]
fn cache_holds_freshest_frame_and_survives_stop() {
    let drone = FakeDrone::new();
    let (session, decoder) = session_with_mock(&drone);
    session.gate().ensure_command_mode().unwrap();
    assert!(session.video().frame().is_none());

    let frames: Vec<RawFrame> = [[255, 0, 0], [0, 255, 0], [0, 0, 255]]
        .into_iter()
        .map(|c| RawFrame::solid(16, 16, c))
        .collect();
    for frame in &frames {
        decoder.push_frame(frame.clone());
    }

    session.video().start().unwrap();
    assert!(wait_for(|| session
        .video()
        .latest()
        .is_some_and(|f| f.sequence == 3)));

    let expected = encode_jpeg(&frames[2], 80).unwrap();
    assert_eq!(session.video().frame().unwrap().as_ref(), expected.as_slice());

    session.video().stop();
    assert!(!session.video().is_streaming());
    assert!(!session.video().stream_enabled());
    assert_eq!(session.video().frame().unwrap().as_ref(), expected.as_slice());
    assert_eq!(drone.drain(), vec!["command", "streamon", "streamoff"]);
}

#[test]
fn source_failure_rearms_streamon() {
    let drone = FakeDrone::new();
    let (session, decoder) = session_with_mock(&drone);
    session.gate().ensure_command_mode().unwrap();
    decoder.set_fail_open(true);

    assert_eq!(session.video().start().unwrap(), VideoStatus::Starting);
    assert!(wait_for(|| !session.video().is_streaming()
        && !session.video().stream_enabled()));
    assert!(session
        .log()
        .texts(Direction::Info)
        .iter()
        .any(|t| t.starts_with("Unable to open the video stream")));

    decoder.set_fail_open(false);
    assert_eq!(session.video().start().unwrap(), VideoStatus::Starting);
    assert!(wait_for(|| decoder.opened() == 1));
    assert_eq!(drone.drain(), vec!["command", "streamon", "streamon"]);

    session.shutdown();
}

#[test]
fn concurrent_starts_spawn_one_capture() {
    let drone = FakeDrone::new();
    let (session, decoder) = session_with_mock(&drone);
    session.gate().ensure_command_mode().unwrap();
    let barrier = Barrier::new(8);

    let results: Vec<VideoStatus> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                s.spawn(|| {
                    barrier.wait();
                    session.video().start().unwrap()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let starting = results
        .iter()
        .filter(|r| **r == VideoStatus::Starting)
        .count();
    assert_eq!(starting, 1);
    assert!(wait_for(|| decoder.opened() == 1));
    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(decoder.opened(), 1);
    assert_eq!(decoder.live_captures(), 1);
    assert_eq!(drone.drain(), vec!["command", "streamon"]);

    session.video().stop();
}

#[test]
fn detached_capture_failure_leaves_newer_stream_alone() {
    let drone = FakeDrone::new();
    let mut config = drone.config();
    config.video.join_timeout_ms = 100;
    let decoder = MockVideoDecoder::new();
    let session = DroneSession::new(
        &config,
        Some(Arc::new(decoder.clone()) as Arc<dyn VideoDecoder>),
    );
    session.gate().ensure_command_mode().unwrap();

    // First open outlives stop()'s join and then fails
    decoder.set_fail_open(true);
    decoder.set_open_delay(Duration::from_millis(500));
    session.video().start().unwrap();
    assert!(wait_for(|| session
        .log()
        .texts(Direction::Info)
        .iter()
        .any(|t| t == "Connecting to video feed...")));
    std::thread::sleep(Duration::from_millis(50));
    session.video().stop();

    decoder.set_fail_open(false);
    decoder.set_open_delay(Duration::ZERO);
    assert_eq!(session.video().start().unwrap(), VideoStatus::Starting);
    assert!(wait_for(|| decoder.opened() == 1));

    assert!(wait_for(|| session
        .log()
        .texts(Direction::Info)
        .iter()
        .any(|t| t.starts_with("Unable to open the video stream"))));
    std::thread::sleep(Duration::from_millis(50));
    assert!(session.video().is_streaming());
    assert!(session.video().stream_enabled());

    session.video().stop();
    assert_eq!(
        drone.drain(),
        vec!["command", "streamon", "streamoff", "streamon", "streamoff"]
    );
}

#[test]
fn reset_disengages_and_closes() {
    let drone = FakeDrone::new();
    let (session, _) = session_with_mock(&drone);
    session.gate().ensure_command_mode().unwrap();
    session.video().start().unwrap();

    session.reset();
    assert!(!session.gate().in_command_mode());
    assert!(!session.channel().is_listening());
    assert!(!session.video().is_streaming());
    assert_eq!(drone.drain(), vec!["command", "streamon", "streamoff"]);

    assert!(matches!(
        session.gate().send("takeoff"),
        Err(CommandError::Mode(ModeError::NotEngaged))
    ));
}
