// Built-in UDP transport engine
//
// One connected UDP socket per session. Worker threads:
// - receiver: drops keep-alives, feeds voice packets to playback
// - keep-alive: sends a single zero byte while the microphone is idle
// - audio (feature "audio"): cpal capture/playback with Opus coding

use std::collections::VecDeque;
use std::io::{self, ErrorKind};
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, ToSocketAddrs, UdpSocket};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::status::{self, StatusCode};
use super::TransportEngine;

/// Lowest bitrate the Opus encoder accepts
pub const MIN_BITRATE: u32 = 6_000;

/// Highest bitrate the Opus encoder accepts
pub const MAX_BITRATE: u32 = 510_000;

const MAX_PACKET_SIZE: usize = 4000;
const KEEPALIVE_PACKET: [u8; 1] = [0];

/// Configuration for the UDP engine
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Capture/playback sample rate in Hz (Opus supports 8k/12k/16k/24k/48k)
    pub sample_rate: u32,

    /// Samples per encoded frame (480 = 10ms at 48kHz)
    pub frame_size: usize,

    /// Maximum audio held in the playback buffer
    pub playback_buffer_ms: u32,

    /// Interval between keep-alive packets while not transmitting
    pub keepalive_interval: Duration,

    /// Socket read timeout; bounds how long stop() waits on the receiver
    pub receive_timeout: Duration,

    /// Consecutive receive errors before the session is reported dead
    pub max_receive_errors: u32,

    /// Encoder bitrate before the first set_bitrate call
    pub initial_bitrate: u32,

    /// Input device name (None for system default)
    pub input_device: Option<String>,

    /// Output device name (None for system default)
    pub output_device: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            frame_size: 480,
            playback_buffer_ms: 200,
            keepalive_interval: Duration::from_secs(1),
            receive_timeout: Duration::from_millis(100),
            max_receive_errors: 50,
            initial_bitrate: 64000,
            input_device: None,
            output_device: None,
        }
    }
}

impl EngineConfig {
    /// Playback buffer capacity in samples
    pub fn playback_capacity(&self) -> usize {
        (self.sample_rate as usize * self.playback_buffer_ms as usize) / 1000
    }
}

/// State shared between the session handle and its worker threads
pub(crate) struct Shared {
    pub(crate) running: AtomicBool,
    pub(crate) transmitting: AtomicBool,
    pub(crate) alive: AtomicBool,
    pub(crate) bitrate: AtomicU32,
    pub(crate) packets_received: AtomicU64,
    pub(crate) packets_sent: AtomicU64,
    pub(crate) keepalives_sent: AtomicU64,
    pub(crate) playback: Mutex<VecDeque<f32>>,
}

impl Shared {
    fn new(config: &EngineConfig) -> Self {
        Self {
            running: AtomicBool::new(false),
            transmitting: AtomicBool::new(false),
            alive: AtomicBool::new(true),
            bitrate: AtomicU32::new(config.initial_bitrate),
            packets_received: AtomicU64::new(0),
            packets_sent: AtomicU64::new(0),
            keepalives_sent: AtomicU64::new(0),
            playback: Mutex::new(VecDeque::with_capacity(config.playback_capacity())),
        }
    }
}

/// Counters for one UDP session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UdpSessionStats {
    pub running: bool,
    pub transmitting: bool,
    pub bitrate: u32,
    pub packets_received: u64,
    pub packets_sent: u64,
    pub keepalives_sent: u64,
    pub playback_buffered_samples: usize,
}

/// Engine handle for one UDP voice session
pub struct UdpSession {
    socket: Arc<UdpSocket>,
    server_addr: SocketAddr,
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
}

impl UdpSession {
    /// Remote voice server address
    pub fn server_addr(&self) -> SocketAddr {
        self.server_addr
    }

    /// Local socket address
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> UdpSessionStats {
        let buffered = self
            .shared
            .playback
            .lock()
            .map(|buf| buf.len())
            .unwrap_or(0);

        UdpSessionStats {
            running: self.is_running(),
            transmitting: self.shared.transmitting.load(Ordering::SeqCst),
            bitrate: self.shared.bitrate.load(Ordering::Relaxed),
            packets_received: self.shared.packets_received.load(Ordering::Relaxed),
            packets_sent: self.shared.packets_sent.load(Ordering::Relaxed),
            keepalives_sent: self.shared.keepalives_sent.load(Ordering::Relaxed),
            playback_buffered_samples: buffered,
        }
    }
}

impl Drop for UdpSession {
    fn drop(&mut self) {
        UdpEngine::shutdown(self);
    }
}

/// UDP transport engine
pub struct UdpEngine {
    config: EngineConfig,
}

impl UdpEngine {
    pub fn new(config: EngineConfig) -> Self {
        info!(
            "UDP engine initialized ({}Hz, {} samples/frame, audio {})",
            config.sample_rate,
            config.frame_size,
            if cfg!(feature = "audio") { "enabled" } else { "disabled" }
        );
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Signal workers to exit and join them. Safe to call repeatedly.
    fn shutdown(session: &mut UdpSession) {
        session.shared.running.store(false, Ordering::SeqCst);
        session.shared.transmitting.store(false, Ordering::SeqCst);

        for worker in session.workers.drain(..) {
            worker.thread().unpark();
            let name = worker.thread().name().unwrap_or("worker").to_string();
            if worker.join().is_err() {
                error!("Voice {} thread panicked", name);
            }
        }
    }
}

impl Default for UdpEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl TransportEngine for UdpEngine {
    type Handle = UdpSession;

    fn create(&mut self, host: &str, port: u16) -> Option<UdpSession> {
        let host = host.trim();
        if host.is_empty() || port == 0 {
            warn!("Invalid server address: {:?}:{}", host, port);
            return None;
        }

        info!("Creating voice session for {}:{}", host, port);

        let server_addr = match (host, port).to_socket_addrs().map(|mut addrs| addrs.next()) {
            Ok(Some(addr)) => addr,
            Ok(None) => {
                error!("No address found for {}", host);
                return None;
            }
            Err(e) => {
                error!("Failed to resolve {}: {}", host, e);
                return None;
            }
        };

        let local: SocketAddr = if server_addr.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };

        let socket = match UdpSocket::bind(local) {
            Ok(s) => s,
            Err(e) => {
                error!("Socket bind error: {}", e);
                return None;
            }
        };

        if let Err(e) = socket.connect(server_addr) {
            error!("Socket connect error: {}", e);
            return None;
        }

        if let Err(e) = socket.set_read_timeout(Some(self.config.receive_timeout)) {
            error!("Failed to set socket read timeout: {}", e);
            return None;
        }

        match socket.local_addr() {
            Ok(addr) => debug!("Socket local address: {}", addr),
            Err(e) => warn!("Failed to get local address: {}", e),
        }

        Some(UdpSession {
            socket: Arc::new(socket),
            server_addr,
            shared: Arc::new(Shared::new(&self.config)),
            workers: Vec::new(),
        })
    }

    fn start(&mut self, session: &mut UdpSession) -> StatusCode {
        if session.shared.running.swap(true, Ordering::SeqCst) {
            warn!("Voice session already running");
            return status::ALREADY_RUNNING;
        }
        session.shared.alive.store(true, Ordering::SeqCst);

        info!("Starting voice session with {}", session.server_addr);

        #[cfg(feature = "audio")]
        match super::audio::spawn(
            &self.config,
            Arc::clone(&session.socket),
            Arc::clone(&session.shared),
        ) {
            Ok(worker) => session.workers.push(worker),
            Err(code) => {
                Self::shutdown(session);
                return code;
            }
        }

        let receiver = {
            let socket = Arc::clone(&session.socket);
            let shared = Arc::clone(&session.shared);
            let config = self.config.clone();
            thread::Builder::new()
                .name("voice-rx".to_string())
                .spawn(move || receive_loop(socket, shared, config))
        };

        match receiver {
            Ok(worker) => session.workers.push(worker),
            Err(e) => {
                error!("Failed to spawn receiver thread: {}", e);
                Self::shutdown(session);
                return status::WORKER_SPAWN_FAILED;
            }
        }

        let keepalive = {
            let socket = Arc::clone(&session.socket);
            let shared = Arc::clone(&session.shared);
            let interval = self.config.keepalive_interval;
            thread::Builder::new()
                .name("voice-keepalive".to_string())
                .spawn(move || keepalive_loop(socket, shared, interval))
        };

        match keepalive {
            Ok(worker) => session.workers.push(worker),
            Err(e) => {
                error!("Failed to spawn keep-alive thread: {}", e);
                Self::shutdown(session);
                return status::WORKER_SPAWN_FAILED;
            }
        }

        info!("Voice session fully started");
        status::SUCCESS
    }

    fn set_transmitting(&mut self, session: &mut UdpSession, transmitting: bool) {
        session.shared.transmitting.store(transmitting, Ordering::SeqCst);
        info!("Transmitting: {}", transmitting);
    }

    fn set_bitrate(&mut self, session: &mut UdpSession, bits_per_second: u32) -> StatusCode {
        if !(MIN_BITRATE..=MAX_BITRATE).contains(&bits_per_second) {
            warn!("Bitrate {} bps outside {}..={}", bits_per_second, MIN_BITRATE, MAX_BITRATE);
            return status::INVALID_AUDIO_PARAM;
        }

        // Picked up by the encoder on its next frame
        session.shared.bitrate.store(bits_per_second, Ordering::Relaxed);
        info!("Bitrate set to {} bps", bits_per_second);

        status::SUCCESS
    }

    fn stop(&mut self, session: &mut UdpSession) {
        if !session.is_running() && session.workers.is_empty() {
            return;
        }

        info!("Stopping voice session");
        Self::shutdown(session);
        info!("Voice session stopped");
    }

    fn destroy(&mut self, session: UdpSession) {
        info!("Voice session for {} released", session.server_addr);
        drop(session);
    }

    fn is_alive(&self, session: &UdpSession) -> bool {
        session.shared.alive.load(Ordering::SeqCst)
    }

    fn name(&self) -> &str {
        "UDP"
    }
}

fn receive_loop(socket: Arc<UdpSocket>, shared: Arc<Shared>, config: EngineConfig) {
    info!("Audio receiver thread started");

    let mut inbound = InboundVoice::new(&config);
    let mut buf = [0u8; MAX_PACKET_SIZE];
    let mut consecutive_errors = 0u32;
    let mut last_receive = Instant::now();

    while shared.running.load(Ordering::SeqCst) {
        match socket.recv(&mut buf) {
            Ok(size) => {
                consecutive_errors = 0;

                // Keep-alive echo
                if size <= 1 {
                    continue;
                }

                let count = shared.packets_received.fetch_add(1, Ordering::Relaxed) + 1;
                inbound.deliver(&buf[..size], &shared);

                if count % 50 == 0 {
                    let now = Instant::now();
                    debug!(
                        "Received packet #{}, size: {}b, delay: {:?}",
                        count,
                        size,
                        now.duration_since(last_receive)
                    );
                    last_receive = now;
                }
            }
            Err(ref e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {}
            Err(e) => {
                consecutive_errors += 1;
                warn!("Receive error ({}/{}): {}", consecutive_errors, config.max_receive_errors, e);

                if consecutive_errors >= config.max_receive_errors {
                    error!("Too many receive errors, marking voice session dead");
                    shared.alive.store(false, Ordering::SeqCst);
                    break;
                }

                // Errors like ECONNREFUSED return immediately
                thread::sleep(config.receive_timeout);
            }
        }
    }

    info!("Audio receiver thread stopped");
}

fn keepalive_loop(socket: Arc<UdpSocket>, shared: Arc<Shared>, interval: Duration) {
    info!("Keep-alive thread started");

    while shared.running.load(Ordering::SeqCst) {
        if !shared.transmitting.load(Ordering::SeqCst) {
            match socket.send(&KEEPALIVE_PACKET) {
                Ok(_) => {
                    let count = shared.keepalives_sent.fetch_add(1, Ordering::Relaxed) + 1;
                    if count % 10 == 0 {
                        debug!("Sent keep-alive packet #{}", count);
                    }
                }
                Err(e) => warn!("Keep-alive send error: {}", e),
            }
        }

        // Park until the next tick; stop() unparks us
        let deadline = Instant::now() + interval;
        while shared.running.load(Ordering::SeqCst) {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            thread::park_timeout(deadline - now);
        }
    }

    info!("Keep-alive thread stopped");
}

/// Delivers received voice packets to playback
struct InboundVoice {
    #[cfg(feature = "audio")]
    decoder: Option<super::codec::VoiceDecoder>,
    #[cfg(feature = "audio")]
    capacity: usize,
}

impl InboundVoice {
    #[cfg(feature = "audio")]
    fn new(config: &EngineConfig) -> Self {
        let decoder = match super::codec::VoiceDecoder::new(config.sample_rate) {
            Ok(d) => Some(d),
            Err(e) => {
                error!("Decoder creation error: {}", e);
                None
            }
        };

        Self {
            decoder,
            capacity: config.playback_capacity(),
        }
    }

    #[cfg(not(feature = "audio"))]
    fn new(_config: &EngineConfig) -> Self {
        Self {}
    }

    #[cfg(feature = "audio")]
    fn deliver(&mut self, packet: &[u8], shared: &Shared) {
        let Some(decoder) = self.decoder.as_mut() else {
            return;
        };

        let samples = match decoder.decode(packet) {
            Ok(samples) => samples,
            Err(e) => {
                warn!("Decoding error: {}", e);
                return;
            }
        };

        let Ok(mut playback) = shared.playback.lock() else {
            return;
        };

        playback.extend(samples);
        while playback.len() > self.capacity {
            playback.pop_front();
        }
    }

    #[cfg(not(feature = "audio"))]
    fn deliver(&mut self, packet: &[u8], _shared: &Shared) {
        tracing::trace!("Dropping {}-byte voice packet (built without audio)", packet.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_config_default_matches_voice_format() {
        let config = EngineConfig::default();

        assert_eq!(config.sample_rate, 48000);
        assert_eq!(config.frame_size, 480, "10ms frames at 48kHz");
        assert_eq!(config.playback_capacity(), 9600, "200ms at 48kHz");
        assert_eq!(config.initial_bitrate, 64000);
    }

    #[test]
    fn test_create_rejects_empty_host_and_zero_port() {
        let mut engine = UdpEngine::default();

        assert!(engine.create("", 9000).is_none());
        assert!(engine.create("   ", 9000).is_none());
        assert!(engine.create("127.0.0.1", 0).is_none());
    }
}
