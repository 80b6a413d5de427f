use std::ffi::{c_char, CStr};

use crate::error;

/// Convert a required C string argument into UTF-8 `&str`.
///
/// # Safety
/// `value` must be null or point to a valid NUL-terminated C string.
pub(crate) unsafe fn required_str_arg<'a>(value: *const c_char, name: &str) -> Option<&'a str> {
    if value.is_null() {
        let _ = error::set_invalid_argument(format!("{name} cannot be null"));
        return None;
    }

    // SAFETY: The caller guarantees `value` points to a valid NUL-terminated C string.
    let as_cstr = unsafe { CStr::from_ptr(value) };
    match as_cstr.to_str() {
        Ok(v) => Some(v),
        Err(_) => {
            let _ = error::set_invalid_argument(format!("{name} must be valid UTF-8"));
            None
        }
    }
}

/// A TCP port argument; 0 is allowed only where `allow_zero` says so.
pub(crate) fn port_arg(port: i32, allow_zero: bool) -> Option<u16> {
    match u16::try_from(port) {
        Ok(0) if !allow_zero => {
            let _ = error::set_invalid_argument("port cannot be 0");
            None
        }
        Ok(port) => Some(port),
        Err(_) => {
            let _ = error::set_invalid_argument(format!("port {port} out of range"));
            None
        }
    }
}

/// Borrow `len` bytes the caller passed in.
///
/// # Safety
/// If `len > 0`, `data` must be non-null and readable for `len` bytes.
pub(crate) unsafe fn bytes_arg<'a>(data: *const u8, len: usize, name: &str) -> Option<&'a [u8]> {
    if len == 0 {
        return Some(&[]);
    }
    if data.is_null() {
        let _ = error::set_invalid_argument(format!("{name} cannot be null"));
        return None;
    }

    // SAFETY: Pointer and length are validated above and owned by caller for the call duration.
    Some(unsafe { std::slice::from_raw_parts(data, len) })
}

/// Store `value` through an optional out-pointer.
///
/// # Safety
/// `out` must be null or valid for a write of `T`.
pub(crate) unsafe fn write_out<T>(out: *mut T, value: T) {
    if !out.is_null() {
        // SAFETY: Checked non-null; the caller guarantees validity.
        unsafe { out.write(value) };
    }
}
