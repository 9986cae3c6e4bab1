use chrono::{DateTime, Utc};
use uuid::Uuid;

/// One engine session bound to a remote (host, port)
///
/// Owned exclusively by the controller's handle slot. The engine resource
/// can only leave through `into_engine`, which consumes the handle.
pub struct SessionHandle<H> {
    id: Uuid,
    host: String,
    port: u16,
    created_at: DateTime<Utc>,
    engine: H,
}

impl<H> SessionHandle<H> {
    pub(crate) fn new(host: String, port: u16, engine: H) -> Self {
        Self {
            id: Uuid::new_v4(),
            host,
            port,
            created_at: Utc::now(),
            engine,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// "host:port" for display
    pub fn remote(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub(crate) fn engine(&self) -> &H {
        &self.engine
    }

    pub(crate) fn engine_mut(&mut self) -> &mut H {
        &mut self.engine
    }

    pub(crate) fn into_engine(self) -> H {
        self.engine
    }
}
