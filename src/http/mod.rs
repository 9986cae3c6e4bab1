//! HTTP API for controlling the voice session (local UIs, hotkey daemons)
//!
//! This module provides a REST API over one `SessionController`:
//! - GET /health - Health check
//! - GET /session/status - Status snapshot
//! - POST /session/connect - Connect (optional {host, port})
//! - POST /session/disconnect - Disconnect
//! - POST /session/transmit/begin, /session/transmit/end - Push-to-talk
//! - PUT /session/bitrate - Change encoder bitrate ({bitrate})

mod handlers;
mod routes;
mod state;

pub use handlers::{error_status, BitrateRequest, ConnectRequest, ErrorResponse};
pub use routes::create_router;
pub use state::AppState;

use crate::engine::TransportEngine;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::warn;

/// Periodically tear down the session if the engine reports it dead
pub fn spawn_connection_monitor<E: TransportEngine>(
    state: AppState<E>,
    every: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;

            let mut controller = Arc::clone(&state.controller).lock_owned().await;
            let checked = tokio::task::spawn_blocking(move || controller.check_connection()).await;

            match checked {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("Connection monitor: {}", e),
                Err(e) => warn!("Connection monitor task failed: {}", e),
            }
        }
    })
}
