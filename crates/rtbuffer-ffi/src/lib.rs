//! rtbuffer-ffi: C-ABI exports in the shape of the classic buffer
//! `interface.h` (`start_server`, `open_connection`, `read_header`, ...).
//!
//! Every function returns an `int`: non-negative on success, a negative
//! `RTB_ERR_*` code on failure. The message of the last failure on the
//! calling thread is available from [`rtb_last_error`].

mod args;
mod connection;
mod error;
mod server;
mod types;

use std::panic::AssertUnwindSafe;

pub use connection::{
    close_connection, open_connection, read_data, read_header, wait_data, write_data,
    write_header,
};
pub use server::{rtb_stop_server, start_server};
pub use types::{
    buffer_error, RTB_ERR_DISCONNECTED, RTB_ERR_FRAME, RTB_ERR_INTERNAL, RTB_ERR_INVALID_ARGUMENT,
    RTB_ERR_MALFORMED, RTB_ERR_NO_HEADER, RTB_ERR_PROTOCOL, RTB_ERR_RANGE, RTB_ERR_RESPONSE_TOO_LARGE,
    RTB_ERR_SERVER_INTERNAL, RTB_ERR_TRANSPORT, RTB_ERR_TYPE_MISMATCH, RTB_ERR_UNKNOWN_DATATYPE,
    RTB_ERR_UNKNOWN_HANDLE, RTB_ERR_UNSUPPORTED, RTB_OK,
};

fn ffi_boundary<T>(on_panic: T, f: impl FnOnce() -> T) -> T {
    match std::panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => value,
        Err(_) => {
            error::set_panic_error();
            on_panic
        }
    }
}

/// Clear the calling thread's last error message.
#[no_mangle]
pub extern "C" fn rtb_clear_error() {
    ffi_boundary((), error::clear_error_state);
}

/// Message of the calling thread's last failure; empty if none.
///
/// The pointer stays valid until the next call on this thread.
#[no_mangle]
pub extern "C" fn rtb_last_error() -> *const std::ffi::c_char {
    ffi_boundary(std::ptr::null(), error::last_error_ptr)
}
