use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::bitrate::{format_bitrate, BitratePolicy};
use super::command::Command;
use super::error::SessionError;
use super::handle::SessionHandle;
use super::state::SessionState;
use super::status::SessionStatus;
use crate::engine::status::SUCCESS;
use crate::engine::TransportEngine;

/// Push-to-talk session state machine
///
/// Owns at most one engine session at a time and sequences every engine call
/// against it. Commands take `&mut self`, so one controller is driven by one
/// caller at a time; observers read snapshots through `subscribe()`.
///
/// Dropping the controller disconnects.
pub struct SessionController<E: TransportEngine> {
    /// Engine performing the actual network/audio work
    engine: E,

    /// Supported bitrates and the per-connection default
    policy: BitratePolicy,

    /// Current lifecycle state
    state: SessionState,

    /// The only live engine session; `None` exactly when disconnected
    handle: Option<SessionHandle<E::Handle>>,

    /// Bitrate last confirmed by the engine
    bitrate: u32,

    /// Most recent command failure
    last_error: Option<SessionError>,

    /// Human-readable outcome of the most recent command
    message: String,

    /// Status snapshots for observers
    status_tx: watch::Sender<SessionStatus>,
}

impl<E: TransportEngine> SessionController<E> {
    pub fn new(engine: E, policy: BitratePolicy) -> Self {
        let bitrate = policy.default;
        let (status_tx, _) = watch::channel(SessionStatus::initial(bitrate));

        info!(
            "Session controller ready ({} engine, bitrates {:?}, default {})",
            engine.name(),
            policy.supported,
            bitrate
        );

        Self {
            engine,
            policy,
            state: SessionState::Disconnected,
            handle: None,
            bitrate,
            last_error: None,
            message: "Not connected".to_string(),
            status_tx,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn bitrate(&self) -> u32 {
        self.bitrate
    }

    pub fn last_error(&self) -> Option<&SessionError> {
        self.last_error.as_ref()
    }

    pub fn policy(&self) -> &BitratePolicy {
        &self.policy
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Whether an engine session is currently held
    pub fn has_session(&self) -> bool {
        self.handle.is_some()
    }

    /// Run `f` against the live engine session without letting the borrow escape
    pub fn inspect_session<R>(&self, f: impl FnOnce(&E::Handle) -> R) -> Option<R> {
        self.handle.as_ref().map(|h| f(h.engine()))
    }

    /// Current status snapshot
    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            state: self.state,
            bitrate: self.bitrate,
            last_error: self.last_error.as_ref().map(|e| e.to_string()),
            message: self.message.clone(),
            remote: self.handle.as_ref().map(|h| h.remote()),
            session_id: self.handle.as_ref().map(|h| h.id()),
            connected_at: self.handle.as_ref().map(|h| h.created_at()),
        }
    }

    /// Receive a new snapshot after every state change
    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.status_tx.subscribe()
    }

    /// Create and start an engine session for `host:port`.
    ///
    /// Fails with `InvalidState` unless disconnected; reconnecting requires an
    /// explicit `disconnect` first.
    pub fn connect(&mut self, host: &str, port: u16) -> Result<(), SessionError> {
        if self.state != SessionState::Disconnected {
            return Err(self.fail(SessionError::InvalidState(self.state)));
        }

        let host = host.trim();
        if host.is_empty() {
            return Err(self.fail(SessionError::InvalidAddress("host is empty".to_string())));
        }
        if port == 0 {
            return Err(self.fail(SessionError::InvalidAddress(
                "port must be greater than zero".to_string(),
            )));
        }

        info!("Connecting to {}:{} ({} engine)", host, port, self.engine.name());
        self.state = SessionState::Connecting;
        self.message = format!("Connecting to {}:{}...", host, port);
        self.publish();

        let Some(mut engine_handle) = self.engine.create(host, port) else {
            self.state = SessionState::Disconnected;
            return Err(self.fail(SessionError::EngineCreateFailed));
        };

        let code = self.engine.start(&mut engine_handle);
        if code != SUCCESS {
            self.engine.destroy(engine_handle);
            self.state = SessionState::Disconnected;
            return Err(self.fail(SessionError::EngineStartFailed(code)));
        }

        // Apply the default so the reported bitrate is one the engine confirmed
        let default = self.policy.default;
        let code = self.engine.set_bitrate(&mut engine_handle, default);
        if code != SUCCESS {
            self.engine.stop(&mut engine_handle);
            self.engine.destroy(engine_handle);
            self.state = SessionState::Disconnected;
            return Err(self.fail(SessionError::BitrateRejected(code)));
        }

        let handle = SessionHandle::new(host.to_string(), port, engine_handle);
        info!("Connected to {} (session {})", handle.remote(), handle.id());

        self.message = format!("Connected to {}", handle.remote());
        self.handle = Some(handle);
        self.state = SessionState::Connected;
        self.bitrate = default;
        self.last_error = None;
        self.publish();

        Ok(())
    }

    /// Tear down the current session. No-op when already disconnected.
    ///
    /// Releases the microphone first, then stops and destroys the engine
    /// session. Every failure path and `Drop` ends here.
    pub fn disconnect(&mut self) {
        if self.teardown() {
            self.message = "Disconnected from server".to_string();
            self.publish();
        }
    }

    /// Push-to-talk pressed. Ignored unless connected.
    pub fn begin_transmit(&mut self) {
        self.set_transmitting(true);
    }

    /// Push-to-talk released. Ignored unless connected.
    pub fn end_transmit(&mut self) {
        self.set_transmitting(false);
    }

    /// Ask the engine for a new encoder bitrate.
    ///
    /// The reported bitrate only changes once the engine accepted the value.
    pub fn set_bitrate(&mut self, bits_per_second: u32) -> Result<(), SessionError> {
        if !self.state.is_connected() {
            return Err(self.fail(SessionError::InvalidState(self.state)));
        }

        if !self.policy.is_supported(bits_per_second) {
            return Err(self.fail(SessionError::UnsupportedBitrate(bits_per_second)));
        }

        let Some(handle) = self.handle.as_mut() else {
            self.repair_missing_handle("set_bitrate");
            return Err(self.fail(SessionError::InvalidState(self.state)));
        };

        let code = self.engine.set_bitrate(handle.engine_mut(), bits_per_second);
        if code != SUCCESS {
            return Err(self.fail(SessionError::BitrateRejected(code)));
        }

        info!("Bitrate changed to {} bps", bits_per_second);
        self.bitrate = bits_per_second;
        self.message = format!("Bitrate changed to {}", format_bitrate(bits_per_second));
        self.publish();

        Ok(())
    }

    /// Tear down the session if the engine reports it dead.
    ///
    /// Meant to be polled by the command surface (e.g. once a second).
    pub fn check_connection(&mut self) -> Result<(), SessionError> {
        let alive = match &self.handle {
            Some(handle) => self.engine.is_alive(handle.engine()),
            None => return Ok(()),
        };

        if alive {
            return Ok(());
        }

        warn!("{} engine reported the session dead", self.engine.name());
        self.teardown();
        Err(self.fail(SessionError::ConnectionLost))
    }

    /// Dispatch a parsed command and return the resulting status
    pub fn execute(&mut self, command: Command) -> Result<SessionStatus, SessionError> {
        debug!("Executing {:?}", command);

        match command {
            Command::Connect { host, port } => self.connect(&host, port)?,
            Command::Disconnect => self.disconnect(),
            Command::BeginTransmit => self.begin_transmit(),
            Command::EndTransmit => self.end_transmit(),
            Command::SetBitrate(bps) => self.set_bitrate(bps)?,
            Command::Status => {}
        }

        Ok(self.status())
    }

    fn set_transmitting(&mut self, transmitting: bool) {
        if !self.state.is_connected() {
            debug!("Ignoring transmit={} while {}", transmitting, self.state);
            return;
        }

        let target = if transmitting {
            SessionState::Transmitting
        } else {
            SessionState::Connected
        };
        if self.state == target {
            return;
        }

        let Some(handle) = self.handle.as_mut() else {
            self.repair_missing_handle("set_transmitting");
            return;
        };

        self.engine.set_transmitting(handle.engine_mut(), transmitting);
        self.state = target;
        self.message = if transmitting {
            "Microphone activated".to_string()
        } else {
            "Microphone deactivated".to_string()
        };
        self.publish();
    }

    /// The single teardown path. Returns whether a session was released.
    fn teardown(&mut self) -> bool {
        let Some(mut handle) = self.handle.take() else {
            if self.state != SessionState::Disconnected {
                self.repair_missing_handle("teardown");
            }
            return false;
        };

        info!("Disconnecting from {} (session {})", handle.remote(), handle.id());

        if self.state == SessionState::Transmitting {
            self.engine.set_transmitting(handle.engine_mut(), false);
        }
        self.engine.stop(handle.engine_mut());
        self.engine.destroy(handle.into_engine());

        self.state = SessionState::Disconnected;
        true
    }

    /// State claims a session but the slot is empty: log and fall back to disconnected
    fn repair_missing_handle(&mut self, operation: &str) {
        error!(
            "Invariant violation in {}: state is {} but no session handle is held",
            operation, self.state
        );
        self.state = SessionState::Disconnected;
        self.publish();
    }

    fn fail(&mut self, err: SessionError) -> SessionError {
        warn!("Session command failed: {}", err);
        self.message = err.to_string();
        self.last_error = Some(err.clone());
        self.publish();
        err
    }

    fn publish(&mut self) {
        self.status_tx.send_replace(self.status());
    }
}

impl<E: TransportEngine> Drop for SessionController<E> {
    fn drop(&mut self) {
        if self.handle.is_some() {
            info!("Session controller dropped while connected");
        }
        self.disconnect();
    }
}
