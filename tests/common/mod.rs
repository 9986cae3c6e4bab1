// Recording transport engine shared by the integration tests
//
// Every engine call is appended to a shared log so tests can assert on the
// exact sequence (and count) of effects a controller produced.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use voice_chat::engine::status::{StatusCode, SUCCESS};
use voice_chat::TransportEngine;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Create(String, u16),
    Start(u32),
    SetTransmitting(u32, bool),
    SetBitrate(u32, u32),
    Stop(u32),
    Destroy(u32),
}

/// Scripted engine behaviour
#[derive(Debug, Clone)]
pub struct Script {
    pub fail_create: bool,
    pub start_code: StatusCode,
    /// Bitrate the engine refuses, with the code it returns
    pub reject_bitrate: Option<(u32, StatusCode)>,
    /// How long `start` blocks before answering
    pub start_delay: Option<Duration>,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            fail_create: false,
            start_code: SUCCESS,
            reject_bitrate: None,
            start_delay: None,
        }
    }
}

pub struct MockHandle {
    pub id: u32,
}

pub struct MockEngine {
    calls: Arc<Mutex<Vec<Call>>>,
    script: Arc<Mutex<Script>>,
    alive: Arc<AtomicBool>,
    next_id: u32,
}

/// Test-side view of a MockEngine
#[derive(Clone)]
pub struct Recorder {
    calls: Arc<Mutex<Vec<Call>>>,
    script: Arc<Mutex<Script>>,
    alive: Arc<AtomicBool>,
}

impl MockEngine {
    pub fn new() -> (Self, Recorder) {
        Self::with_script(Script::default())
    }

    pub fn with_script(script: Script) -> (Self, Recorder) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let script = Arc::new(Mutex::new(script));
        let alive = Arc::new(AtomicBool::new(true));

        let recorder = Recorder {
            calls: Arc::clone(&calls),
            script: Arc::clone(&script),
            alive: Arc::clone(&alive),
        };

        (
            Self {
                calls,
                script,
                alive,
                next_id: 1,
            },
            recorder,
        )
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

impl Recorder {
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| pred(c)).count()
    }

    pub fn creates(&self) -> usize {
        self.count(|c| matches!(c, Call::Create(..)))
    }

    pub fn destroys(&self) -> usize {
        self.count(|c| matches!(c, Call::Destroy(_)))
    }

    pub fn update(&self, f: impl FnOnce(&mut Script)) {
        f(&mut self.script.lock().unwrap());
    }

    pub fn set_alive(&self, alive: bool) {
        self.alive.store(alive, Ordering::SeqCst);
    }
}

impl TransportEngine for MockEngine {
    type Handle = MockHandle;

    fn create(&mut self, host: &str, port: u16) -> Option<MockHandle> {
        self.record(Call::Create(host.to_string(), port));
        if self.script.lock().unwrap().fail_create {
            return None;
        }

        let id = self.next_id;
        self.next_id += 1;
        Some(MockHandle { id })
    }

    fn start(&mut self, handle: &mut MockHandle) -> StatusCode {
        self.record(Call::Start(handle.id));
        let (delay, code) = {
            let script = self.script.lock().unwrap();
            (script.start_delay, script.start_code)
        };
        if let Some(delay) = delay {
            thread::sleep(delay);
        }
        code
    }

    fn set_transmitting(&mut self, handle: &mut MockHandle, transmitting: bool) {
        self.record(Call::SetTransmitting(handle.id, transmitting));
    }

    fn set_bitrate(&mut self, handle: &mut MockHandle, bits_per_second: u32) -> StatusCode {
        self.record(Call::SetBitrate(handle.id, bits_per_second));
        match self.script.lock().unwrap().reject_bitrate {
            Some((bps, code)) if bps == bits_per_second => code,
            _ => SUCCESS,
        }
    }

    fn stop(&mut self, handle: &mut MockHandle) {
        self.record(Call::Stop(handle.id));
    }

    fn destroy(&mut self, handle: MockHandle) {
        self.record(Call::Destroy(handle.id));
    }

    fn is_alive(&self, _handle: &MockHandle) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    fn name(&self) -> &str {
        "mock"
    }
}
