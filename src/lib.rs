pub mod config;
pub mod console;
pub mod engine;
pub mod ffi;
pub mod http;
pub mod session;

pub use config::Config;
pub use engine::{EngineConfig, ForeignEngine, TransportEngine, UdpEngine, UdpSession};
pub use http::{create_router, AppState};
pub use session::{
    BitratePolicy, Command, SessionController, SessionError, SessionHandle, SessionState,
    SessionStatus,
};
