// These tests start real engine sessions on loopback; with the `audio`
// feature a session also needs capture and playback devices.
#![cfg(not(feature = "audio"))]

use std::net::UdpSocket;
use std::thread;
use std::time::{Duration, Instant};

use voice_chat::engine::status;
use voice_chat::{
    BitratePolicy, EngineConfig, SessionController, SessionState, TransportEngine, UdpEngine,
};

fn test_config() -> EngineConfig {
    EngineConfig {
        keepalive_interval: Duration::from_millis(20),
        receive_timeout: Duration::from_millis(20),
        max_receive_errors: 2,
        ..EngineConfig::default()
    }
}

fn server() -> UdpSocket {
    let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
    socket
        .set_read_timeout(Some(Duration::from_secs(2)))
        .unwrap();
    socket
}

fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    condition()
}

#[test]
fn test_started_session_sends_keepalives() {
    let server = server();
    let port = server.local_addr().unwrap().port();

    let mut engine = UdpEngine::new(test_config());
    let mut session = engine.create("127.0.0.1", port).unwrap();
    assert_eq!(session.server_addr().port(), port);
    assert!(!session.is_running());

    assert_eq!(engine.start(&mut session), status::SUCCESS);
    assert!(session.is_running());

    let mut buf = [0u8; 16];
    let (size, _) = server.recv_from(&mut buf).unwrap();
    assert_eq!(&buf[..size], &[0u8]);
    assert!(wait_until(Duration::from_secs(2), || {
        session.stats().keepalives_sent >= 1
    }));

    engine.stop(&mut session);
    assert!(!session.is_running());
    engine.destroy(session);
}

#[test]
fn test_voice_packets_are_counted_and_keepalive_echoes_ignored() {
    let server = server();
    let port = server.local_addr().unwrap().port();

    let mut engine = UdpEngine::new(test_config());
    let mut session = engine.create("127.0.0.1", port).unwrap();
    assert_eq!(engine.start(&mut session), status::SUCCESS);

    let mut buf = [0u8; 16];
    let (_, client_addr) = server.recv_from(&mut buf).unwrap();

    server.send_to(&[0u8], client_addr).unwrap();
    server.send_to(&[7u8; 40], client_addr).unwrap();

    assert!(wait_until(Duration::from_secs(2), || {
        session.stats().packets_received == 1
    }));

    // The echo arrived first and was not counted
    thread::sleep(Duration::from_millis(50));
    assert_eq!(session.stats().packets_received, 1);

    engine.stop(&mut session);
    engine.destroy(session);
}

#[test]
fn test_set_bitrate_range() {
    let server = server();
    let port = server.local_addr().unwrap().port();

    let mut engine = UdpEngine::new(test_config());
    let mut session = engine.create("127.0.0.1", port).unwrap();
    assert_eq!(session.stats().bitrate, 64000);

    assert_eq!(engine.set_bitrate(&mut session, 32000), status::SUCCESS);
    assert_eq!(session.stats().bitrate, 32000);

    assert_eq!(
        engine.set_bitrate(&mut session, 1000),
        status::INVALID_AUDIO_PARAM
    );
    assert_eq!(
        engine.set_bitrate(&mut session, 1_000_000),
        status::INVALID_AUDIO_PARAM
    );
    assert_eq!(session.stats().bitrate, 32000);

    engine.destroy(session);
}

#[test]
fn test_start_twice_and_stop_twice() {
    let server = server();
    let port = server.local_addr().unwrap().port();

    let mut engine = UdpEngine::new(test_config());
    let mut session = engine.create("127.0.0.1", port).unwrap();

    assert_eq!(engine.start(&mut session), status::SUCCESS);
    assert_eq!(engine.start(&mut session), status::ALREADY_RUNNING);

    engine.stop(&mut session);
    engine.stop(&mut session);
    assert!(!session.is_running());

    engine.destroy(session);
}

#[test]
fn test_transmitting_flag_is_reported() {
    let server = server();
    let port = server.local_addr().unwrap().port();

    let mut engine = UdpEngine::new(test_config());
    let mut session = engine.create("127.0.0.1", port).unwrap();

    engine.set_transmitting(&mut session, true);
    assert!(session.stats().transmitting);
    engine.set_transmitting(&mut session, false);
    assert!(!session.stats().transmitting);

    engine.destroy(session);
}

#[test]
fn test_closed_server_port_marks_session_dead() {
    let port = {
        let closed = UdpSocket::bind("127.0.0.1:0").unwrap();
        closed.local_addr().unwrap().port()
    };

    let mut engine = UdpEngine::new(test_config());
    let mut session = engine.create("127.0.0.1", port).unwrap();
    assert!(engine.is_alive(&session));
    assert_eq!(engine.start(&mut session), status::SUCCESS);

    assert!(wait_until(Duration::from_secs(3), || !engine.is_alive(&session)));

    engine.stop(&mut session);
    engine.destroy(session);
}

#[test]
fn test_controller_over_udp_engine() {
    let server = server();
    let port = server.local_addr().unwrap().port();

    let mut ctl = SessionController::new(UdpEngine::new(test_config()), BitratePolicy::default());

    ctl.connect("127.0.0.1", port).unwrap();
    assert_eq!(ctl.state(), SessionState::Connected);
    assert_eq!(ctl.inspect_session(|s| s.stats().bitrate), Some(64000));
    assert_eq!(ctl.inspect_session(|s| s.is_running()), Some(true));

    ctl.begin_transmit();
    assert_eq!(ctl.inspect_session(|s| s.stats().transmitting), Some(true));

    ctl.set_bitrate(32000).unwrap();
    assert_eq!(ctl.inspect_session(|s| s.stats().bitrate), Some(32000));

    assert_eq!(ctl.check_connection(), Ok(()));

    ctl.disconnect();
    assert_eq!(ctl.state(), SessionState::Disconnected);
    assert_eq!(ctl.inspect_session(|s| s.is_running()), None);
}

#[test]
fn test_controller_loses_connection_to_closed_port() {
    let port = {
        let closed = UdpSocket::bind("127.0.0.1:0").unwrap();
        closed.local_addr().unwrap().port()
    };

    let mut ctl = SessionController::new(UdpEngine::new(test_config()), BitratePolicy::default());
    ctl.connect("127.0.0.1", port).unwrap();

    assert!(wait_until(Duration::from_secs(3), || {
        ctl.check_connection().is_err()
    }));
    assert_eq!(ctl.state(), SessionState::Disconnected);
    assert!(!ctl.has_session());
}
