//! Engine status codes
//!
//! Engines report results as plain integers so they can cross the C ABI.
//! Zero is success, everything else is diagnostic.

pub type StatusCode = i32;

pub const SUCCESS: StatusCode = 0;
pub const NULL_HANDLE: StatusCode = -1;

// Reserved by the C ABI for foreign engines. UdpEngine reports create
// failures as a null session and never returns these.
pub const INVALID_ADDRESS: StatusCode = -2;
pub const SOCKET_BIND_FAILED: StatusCode = -3;
pub const SOCKET_CONNECT_FAILED: StatusCode = -5;

pub const NO_INPUT_DEVICE: StatusCode = -6;
pub const NO_OUTPUT_DEVICE: StatusCode = -7;
pub const ENCODER_INIT_FAILED: StatusCode = -8;
pub const INPUT_STREAM_FAILED: StatusCode = -9;
pub const OUTPUT_STREAM_FAILED: StatusCode = -10;
pub const INVALID_AUDIO_PARAM: StatusCode = -11;
/// Reserved by the C ABI; UdpEngine accepts every call on a stopped session
pub const NOT_RUNNING: StatusCode = -12;
pub const UNSUPPORTED_SAMPLE_FORMAT: StatusCode = -13;
pub const ALREADY_RUNNING: StatusCode = -14;
pub const WORKER_SPAWN_FAILED: StatusCode = -15;

/// Human-readable description of a status code
pub fn describe(code: StatusCode) -> &'static str {
    match code {
        SUCCESS => "success",
        NULL_HANDLE => "no session handle",
        INVALID_ADDRESS => "invalid server address",
        SOCKET_BIND_FAILED => "could not bind local socket",
        SOCKET_CONNECT_FAILED => "could not connect socket to server",
        NO_INPUT_DEVICE => "no input device available",
        NO_OUTPUT_DEVICE => "no output device available",
        ENCODER_INIT_FAILED => "audio encoder initialisation failed",
        INPUT_STREAM_FAILED => "could not open microphone stream",
        OUTPUT_STREAM_FAILED => "could not open speaker stream",
        INVALID_AUDIO_PARAM => "audio parameter out of range",
        NOT_RUNNING => "engine is not running",
        UNSUPPORTED_SAMPLE_FORMAT => "audio device does not support 48 kHz mono f32",
        ALREADY_RUNNING => "engine is already running",
        WORKER_SPAWN_FAILED => "could not spawn engine worker",
        _ => "unknown engine error",
    }
}
