use std::cell::RefCell;
use std::ffi::{c_char, CString};

use rtbuffer_server::ServerError;

use crate::types::{
    buffer_error, RTB_ERR_DISCONNECTED, RTB_ERR_FRAME, RTB_ERR_INTERNAL, RTB_ERR_INVALID_ARGUMENT,
    RTB_ERR_PROTOCOL, RTB_ERR_TRANSPORT,
};

thread_local! {
    static LAST_ERROR: RefCell<CString> = RefCell::new(CString::default());
}

pub(crate) fn clear_error_state() {
    LAST_ERROR.with(|state| *state.borrow_mut() = CString::default());
}

pub(crate) fn set_error_message(message: impl Into<String>) {
    let sanitized = message.into().replace('\0', "?");
    LAST_ERROR.with(|state| {
        *state.borrow_mut() = CString::new(sanitized).unwrap_or_default();
    });
}

pub(crate) fn set_invalid_argument(message: impl Into<String>) -> i32 {
    set_error_message(message);
    RTB_ERR_INVALID_ARGUMENT
}

pub(crate) fn set_panic_error() {
    set_error_message("panic across FFI boundary");
}

pub(crate) fn map_server_error(err: &ServerError) -> i32 {
    set_error_message(err.to_string());
    match err {
        ServerError::Transport(_) => RTB_ERR_TRANSPORT,
        ServerError::Frame(_) => RTB_ERR_FRAME,
        ServerError::Disconnected(_) => RTB_ERR_DISCONNECTED,
        ServerError::Remote { code, .. } => buffer_error(*code),
        ServerError::Store(err) => buffer_error(err.code()),
        ServerError::UnexpectedResponse { .. } => RTB_ERR_PROTOCOL,
        ServerError::Config(_) => RTB_ERR_INVALID_ARGUMENT,
    }
}

pub(crate) fn internal(message: impl Into<String>) -> i32 {
    set_error_message(message);
    RTB_ERR_INTERNAL
}

pub(crate) fn last_error_ptr() -> *const c_char {
    LAST_ERROR.with(|state| state.borrow().as_ptr())
}
