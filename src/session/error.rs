use thiserror::Error;

use super::state::SessionState;
use crate::engine::status::{self, StatusCode};

/// Errors reported by session commands
///
/// All of them are recoverable: the controller is back in a well-defined
/// state by the time one is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("command not allowed while {0}")]
    InvalidState(SessionState),

    #[error("invalid server address: {0}")]
    InvalidAddress(String),

    #[error("engine could not create a session")]
    EngineCreateFailed,

    #[error("engine failed to start: {} (code {})", status::describe(*.0), .0)]
    EngineStartFailed(StatusCode),

    #[error("bitrate {0} bps is not supported")]
    UnsupportedBitrate(u32),

    #[error("engine rejected bitrate: {} (code {})", status::describe(*.0), .0)]
    BitrateRejected(StatusCode),

    #[error("connection to the voice server was lost")]
    ConnectionLost,
}
