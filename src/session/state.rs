use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle state of a voice session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No engine session exists
    #[default]
    Disconnected,
    /// Engine session created, start call outstanding
    Connecting,
    /// Engine running, microphone inactive
    Connected,
    /// Engine running, microphone active
    Transmitting,
}

impl SessionState {
    /// Whether an engine session is established (commands like set_bitrate are legal)
    pub fn is_connected(self) -> bool {
        matches!(self, SessionState::Connected | SessionState::Transmitting)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Connecting => "connecting",
            SessionState::Connected => "connected",
            SessionState::Transmitting => "transmitting",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
