//! C ABI for loading the built-in UDP engine from UI hosts (cdylib).
//! All functions are no-ops or return an error code when given a null session.

use std::ffi::{c_void, CStr};
use std::os::raw::{c_char, c_int};

use tracing::warn;

use crate::engine::status;
use crate::engine::{EngineVTable, TransportEngine, UdpEngine, UdpSession};

/// Session plus the engine that created it
struct VoiceClient {
    engine: UdpEngine,
    session: UdpSession,
}

unsafe fn client<'a>(ptr: *mut c_void) -> Option<&'a mut VoiceClient> {
    (ptr as *mut VoiceClient).as_mut()
}

/// Create a session for `server_ip:server_port`. Returns an opaque handle or null on failure.
///
/// # Safety
/// `server_ip` must be null or a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn voice_client_new(server_ip: *const c_char, server_port: u16) -> *mut c_void {
    if server_ip.is_null() {
        warn!("voice_client_new: server_ip is null");
        return std::ptr::null_mut();
    }

    let host = match CStr::from_ptr(server_ip).to_str() {
        Ok(h) => h,
        Err(_) => {
            warn!("voice_client_new: server_ip is not UTF-8");
            return std::ptr::null_mut();
        }
    };

    let mut engine = UdpEngine::default();
    match engine.create(host, server_port) {
        Some(session) => Box::into_raw(Box::new(VoiceClient { engine, session })) as *mut c_void,
        None => std::ptr::null_mut(),
    }
}

/// Start the session. Returns 0 on success or a negative status code.
///
/// # Safety
/// `client` must be null or a live pointer from `voice_client_new`.
#[no_mangle]
pub unsafe extern "C" fn voice_client_start(client_ptr: *mut c_void) -> c_int {
    match client(client_ptr) {
        Some(c) => c.engine.start(&mut c.session),
        None => status::NULL_HANDLE,
    }
}

/// # Safety
/// `client` must be null or a live pointer from `voice_client_new`.
#[no_mangle]
pub unsafe extern "C" fn voice_client_set_transmitting(client_ptr: *mut c_void, transmitting: bool) {
    if let Some(c) = client(client_ptr) {
        c.engine.set_transmitting(&mut c.session, transmitting);
    }
}

/// Returns 0 on success or a negative status code.
///
/// # Safety
/// `client` must be null or a live pointer from `voice_client_new`.
#[no_mangle]
pub unsafe extern "C" fn voice_client_set_bitrate(client_ptr: *mut c_void, bitrate: u32) -> c_int {
    match client(client_ptr) {
        Some(c) => c.engine.set_bitrate(&mut c.session, bitrate),
        None => status::NULL_HANDLE,
    }
}

/// # Safety
/// `client` must be null or a live pointer from `voice_client_new`.
#[no_mangle]
pub unsafe extern "C" fn voice_client_stop(client_ptr: *mut c_void) {
    if let Some(c) = client(client_ptr) {
        c.engine.stop(&mut c.session);
    }
}

/// Stop and release the session. The pointer is invalid afterwards.
///
/// # Safety
/// `client` must be null or a live pointer from `voice_client_new`, freed at most once.
#[no_mangle]
pub unsafe extern "C" fn voice_client_free(client_ptr: *mut c_void) {
    if client_ptr.is_null() {
        return;
    }

    let VoiceClient { mut engine, session } = *Box::from_raw(client_ptr as *mut VoiceClient);
    engine.destroy(session);
}

/// Vtable over the exported functions, for driving this engine through `ForeignEngine`
pub fn udp_engine_vtable() -> EngineVTable {
    EngineVTable {
        create: voice_client_new,
        start: voice_client_start,
        set_transmitting: voice_client_set_transmitting,
        set_bitrate: voice_client_set_bitrate,
        stop: voice_client_stop,
        destroy: voice_client_free,
    }
}
