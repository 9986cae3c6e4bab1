//! Push-to-talk session management
//!
//! This module provides the `SessionController` state machine that manages:
//! - Connecting to and disconnecting from a voice server through a transport engine
//! - Microphone arbitration (push-to-talk begin/end)
//! - Encoder bitrate negotiation (confirm-then-display)
//! - Status snapshots and change notification for command surfaces

mod bitrate;
mod command;
mod controller;
mod error;
mod handle;
mod state;
mod status;

pub use bitrate::{format_bitrate, BitratePolicy};
pub use command::Command;
pub use controller::SessionController;
pub use error::SessionError;
pub use handle::SessionHandle;
pub use state::SessionState;
pub use status::SessionStatus;
