//! Host-published FFI surface.
//!
//! These exports are the only host symbols the isolation bridge passes
//! through to modules. `HOST_BRIDGE_SYMBOLS` in `kernel::constants`
//! enumerates them, and the per-module context refuses entry points that
//! collide with one.

use std::ffi::CStr;
use std::os::raw::c_char;

/// Shell version as a NUL-terminated string, for modules that check the
/// host at run time rather than at load time.
#[no_mangle]
pub extern "C" fn keel_shell_version() -> *const c_char {
    static VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), "\0");
    VERSION.as_ptr() as *const c_char
}

/// Forward a module-emitted line into the host's logging facade.
///
/// # Safety
/// `message` must be null or a valid NUL-terminated string that stays
/// alive for the duration of the call.
#[no_mangle]
pub unsafe extern "C" fn keel_shell_log_line(message: *const c_char) {
    if message.is_null() {
        return;
    }
    match unsafe { CStr::from_ptr(message) }.to_str() {
        Ok(text) => log::info!(target: "module", "{}", text),
        Err(_) => log::warn!(target: "module", "dropped a non-UTF-8 log line"),
    }
}
