use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::state::SessionState;

/// Read-only snapshot of a session controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStatus {
    /// Current lifecycle state
    pub state: SessionState,

    /// Bitrate last confirmed by the engine (the default before the first connection)
    pub bitrate: u32,

    /// Most recent command failure, cleared by the next successful connect
    pub last_error: Option<String>,

    /// Human-readable outcome of the most recent command
    pub message: String,

    /// "host:port" of the connected server
    pub remote: Option<String>,

    /// Identifier of the current connection
    pub session_id: Option<Uuid>,

    /// When the current connection was established
    pub connected_at: Option<DateTime<Utc>>,
}

impl SessionStatus {
    pub(crate) fn initial(bitrate: u32) -> Self {
        Self {
            state: SessionState::Disconnected,
            bitrate,
            last_error: None,
            message: "Not connected".to_string(),
            remote: None,
            session_id: None,
            connected_at: None,
        }
    }

    /// One-line summary for status bars and console output
    pub fn summary(&self) -> String {
        let mut line = format!("[{}] {}", self.state, self.message);
        if let Some(err) = &self.last_error {
            if !self.message.contains(err.as_str()) {
                line.push_str(&format!(" (last error: {})", err));
            }
        }
        line
    }
}
