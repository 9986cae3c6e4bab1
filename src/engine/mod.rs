pub mod ffi;
pub mod status;
pub mod udp;

#[cfg(feature = "audio")]
pub mod audio;
#[cfg(feature = "audio")]
pub mod codec;

pub use ffi::{EngineVTable, ForeignEngine, ForeignHandle};
pub use status::StatusCode;
pub use udp::{EngineConfig, UdpEngine, UdpSession, UdpSessionStats};

/// Transport engine driven by the session controller
///
/// The engine does the real work (sockets, audio capture/playback, codec)
/// on threads it owns. The controller only sequences these calls.
///
/// Implementations:
/// - `UdpEngine`: built-in UDP transport (Opus audio with the `audio` feature)
/// - `ForeignEngine`: any engine exposed through the C ABI vtable
pub trait TransportEngine: Send + 'static {
    /// Engine-side session resources. Consumed by `destroy`.
    type Handle: Send + 'static;

    /// Create a session for `host:port`. `None` means creation failed.
    fn create(&mut self, host: &str, port: u16) -> Option<Self::Handle>;

    /// Establish the network session and start engine threads.
    ///
    /// Returns `status::SUCCESS` (0) or a diagnostic code.
    fn start(&mut self, handle: &mut Self::Handle) -> StatusCode;

    /// Enable or disable microphone capture+send
    fn set_transmitting(&mut self, handle: &mut Self::Handle, transmitting: bool);

    /// Set the encoder target bitrate in bits per second
    fn set_bitrate(&mut self, handle: &mut Self::Handle, bits_per_second: u32) -> StatusCode;

    /// Stop engine threads for this session
    fn stop(&mut self, handle: &mut Self::Handle);

    /// Release the session. Taking the handle by value makes a second call impossible.
    fn destroy(&mut self, handle: Self::Handle);

    /// Whether the session is still healthy. Engines that cannot tell report `true`.
    fn is_alive(&self, _handle: &Self::Handle) -> bool {
        true
    }

    /// Engine name for logging
    fn name(&self) -> &str;
}
