//! Drive a transport engine exposed through a C ABI.
//! The host fills an `EngineVTable` with its `extern "C"` entry points.

use std::ffi::{c_void, CString};
use std::os::raw::{c_char, c_int};
use std::ptr::NonNull;

use tracing::{error, warn};

use super::status::StatusCode;
use super::TransportEngine;

/// C entry points of a foreign engine
#[repr(C)]
#[derive(Clone, Copy)]
pub struct EngineVTable {
    /// Returns an opaque session pointer, or null on failure
    pub create: unsafe extern "C" fn(host: *const c_char, port: u16) -> *mut c_void,
    /// Returns 0 on success
    pub start: unsafe extern "C" fn(session: *mut c_void) -> c_int,
    pub set_transmitting: unsafe extern "C" fn(session: *mut c_void, transmitting: bool),
    /// Returns 0 on success
    pub set_bitrate: unsafe extern "C" fn(session: *mut c_void, bits_per_second: u32) -> c_int,
    pub stop: unsafe extern "C" fn(session: *mut c_void),
    /// Must be called exactly once per created session
    pub destroy: unsafe extern "C" fn(session: *mut c_void),
}

/// Session pointer returned by a foreign engine's `create`
pub struct ForeignHandle(NonNull<c_void>);

// The vtable contract requires sessions to be usable from any thread, one caller at a time.
unsafe impl Send for ForeignHandle {}

impl ForeignHandle {
    pub fn as_ptr(&self) -> *mut c_void {
        self.0.as_ptr()
    }
}

/// Transport engine backed by a C ABI vtable
pub struct ForeignEngine {
    vtable: EngineVTable,
    name: String,
}

// Function pointers only; see the contract on `ForeignEngine::new`.
unsafe impl Send for ForeignEngine {}

impl ForeignEngine {
    /// Wrap a foreign engine.
    ///
    /// # Safety
    /// Every function in `vtable` must be safe to call with pointers it
    /// returned from `create` (until `destroy`), from any single thread at a
    /// time, and `create` must accept a NUL-terminated string.
    pub unsafe fn new(vtable: EngineVTable, name: impl Into<String>) -> Self {
        Self {
            vtable,
            name: name.into(),
        }
    }
}

impl TransportEngine for ForeignEngine {
    type Handle = ForeignHandle;

    fn create(&mut self, host: &str, port: u16) -> Option<ForeignHandle> {
        let host = match CString::new(host) {
            Ok(h) => h,
            Err(_) => {
                warn!("Host contains an interior NUL byte");
                return None;
            }
        };

        let raw = unsafe { (self.vtable.create)(host.as_ptr(), port) };
        match NonNull::new(raw) {
            Some(ptr) => Some(ForeignHandle(ptr)),
            None => {
                error!("{} engine returned a null session", self.name);
                None
            }
        }
    }

    fn start(&mut self, handle: &mut ForeignHandle) -> StatusCode {
        unsafe { (self.vtable.start)(handle.as_ptr()) }
    }

    fn set_transmitting(&mut self, handle: &mut ForeignHandle, transmitting: bool) {
        unsafe { (self.vtable.set_transmitting)(handle.as_ptr(), transmitting) }
    }

    fn set_bitrate(&mut self, handle: &mut ForeignHandle, bits_per_second: u32) -> StatusCode {
        unsafe { (self.vtable.set_bitrate)(handle.as_ptr(), bits_per_second) }
    }

    fn stop(&mut self, handle: &mut ForeignHandle) {
        unsafe { (self.vtable.stop)(handle.as_ptr()) }
    }

    fn destroy(&mut self, handle: ForeignHandle) {
        unsafe { (self.vtable.destroy)(handle.as_ptr()) }
    }

    fn name(&self) -> &str {
        &self.name
    }
}
