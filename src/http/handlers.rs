use super::state::AppState;
use crate::engine::TransportEngine;
use crate::session::{SessionController, SessionError, SessionStatus};
use axum::{body::Bytes, extract::State, http::StatusCode, response::Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct ConnectRequest {
    /// Voice server host (defaults to server.host from config)
    pub host: Option<String>,

    /// Voice server port (defaults to server.port from config)
    pub port: Option<u16>,
}

#[derive(Debug, Deserialize)]
pub struct BitrateRequest {
    /// Target bitrate in bits per second
    pub bitrate: u32,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,

    /// Session status after the failed command
    pub status: Option<SessionStatus>,
}

pub type ApiResult = Result<Json<SessionStatus>, (StatusCode, Json<ErrorResponse>)>;

/// HTTP status for a failed session command
pub fn error_status(err: &SessionError) -> StatusCode {
    match err {
        SessionError::InvalidState(_) => StatusCode::CONFLICT,
        SessionError::InvalidAddress(_) | SessionError::UnsupportedBitrate(_) => {
            StatusCode::BAD_REQUEST
        }
        SessionError::EngineCreateFailed
        | SessionError::EngineStartFailed(_)
        | SessionError::BitrateRejected(_) => StatusCode::BAD_GATEWAY,
        SessionError::ConnectionLost => StatusCode::GONE,
    }
}

/// Run a command on the blocking pool; engine start/stop may join threads
async fn run_command<E, F>(state: &AppState<E>, command: F) -> ApiResult
where
    E: TransportEngine,
    F: FnOnce(&mut SessionController<E>) -> Result<(), SessionError> + Send + 'static,
{
    let mut controller = Arc::clone(&state.controller).lock_owned().await;

    let joined = tokio::task::spawn_blocking(move || {
        let result = command(&mut controller);
        (result, controller.status())
    })
    .await;

    match joined {
        Ok((Ok(()), status)) => Ok(Json(status)),
        Ok((Err(err), status)) => Err((
            error_status(&err),
            Json(ErrorResponse {
                error: err.to_string(),
                status: Some(status),
            }),
        )),
        Err(e) => {
            error!("Session command task failed: {}", e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "session command failed unexpectedly".to_string(),
                    status: None,
                }),
            ))
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /health
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// GET /session/status
/// Served from the published snapshot, so it never waits on a running command
pub async fn get_status<E: TransportEngine>(State(state): State<AppState<E>>) -> Json<SessionStatus> {
    Json(state.status())
}

/// POST /session/connect
/// Empty body uses the configured server; missing fields fall back to it too
pub async fn connect<E: TransportEngine>(
    State(state): State<AppState<E>>,
    body: Bytes,
) -> ApiResult {
    let req = if body.iter().all(u8::is_ascii_whitespace) {
        ConnectRequest::default()
    } else {
        match serde_json::from_slice::<ConnectRequest>(&body) {
            Ok(req) => req,
            Err(e) => {
                warn!("Rejected connect request: {}", e);
                return Err((
                    StatusCode::BAD_REQUEST,
                    Json(ErrorResponse {
                        error: format!("invalid connect request: {}", e),
                        status: Some(state.status()),
                    }),
                ));
            }
        }
    };
    let host = req.host.unwrap_or_else(|| state.defaults.host.clone());
    let port = req.port.unwrap_or(state.defaults.port);

    info!("HTTP connect request for {}:{}", host, port);
    run_command(&state, move |c| c.connect(&host, port)).await
}

/// POST /session/disconnect
pub async fn disconnect<E: TransportEngine>(State(state): State<AppState<E>>) -> ApiResult {
    run_command(&state, |c| {
        c.disconnect();
        Ok(())
    })
    .await
}

/// POST /session/transmit/begin
pub async fn begin_transmit<E: TransportEngine>(State(state): State<AppState<E>>) -> ApiResult {
    run_command(&state, |c| {
        c.begin_transmit();
        Ok(())
    })
    .await
}

/// POST /session/transmit/end
pub async fn end_transmit<E: TransportEngine>(State(state): State<AppState<E>>) -> ApiResult {
    run_command(&state, |c| {
        c.end_transmit();
        Ok(())
    })
    .await
}

/// PUT /session/bitrate
pub async fn set_bitrate<E: TransportEngine>(
    State(state): State<AppState<E>>,
    Json(req): Json<BitrateRequest>,
) -> ApiResult {
    run_command(&state, move |c| c.set_bitrate(req.bitrate)).await
}
