use crate::config::ServerConfig;
use crate::engine::TransportEngine;
use crate::session::{SessionController, SessionStatus};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};

/// Shared application state for HTTP handlers
pub struct AppState<E: TransportEngine> {
    /// The session driven by this API (one controller, serialized by the mutex)
    pub controller: Arc<Mutex<SessionController<E>>>,

    /// Latest published status; readable while a command holds the controller
    pub status_rx: watch::Receiver<SessionStatus>,

    /// Server used when a connect request omits host or port
    pub defaults: ServerConfig,
}

impl<E: TransportEngine> AppState<E> {
    pub fn new(controller: SessionController<E>, defaults: ServerConfig) -> Self {
        let status_rx = controller.subscribe();
        Self {
            controller: Arc::new(Mutex::new(controller)),
            status_rx,
            defaults,
        }
    }

    /// Current status snapshot without waiting for the controller
    pub fn status(&self) -> SessionStatus {
        self.status_rx.borrow().clone()
    }
}

// Manual impl: derive would require E: Clone
impl<E: TransportEngine> Clone for AppState<E> {
    fn clone(&self) -> Self {
        Self {
            controller: Arc::clone(&self.controller),
            status_rx: self.status_rx.clone(),
            defaults: self.defaults.clone(),
        }
    }
}
