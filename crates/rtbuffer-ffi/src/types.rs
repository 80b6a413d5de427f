//! Return codes shared by every exported function.
//!
//! Non-negative values are successes (a handle, a port, a wait outcome).
//! Buffer errors reported by the server map to `-(10 + code)`.

use rtbuffer_core::ErrorCode;

pub const RTB_OK: i32 = 0;
pub const RTB_ERR_INVALID_ARGUMENT: i32 = -1;
pub const RTB_ERR_TRANSPORT: i32 = -2;
pub const RTB_ERR_FRAME: i32 = -3;
pub const RTB_ERR_DISCONNECTED: i32 = -4;
pub const RTB_ERR_UNKNOWN_HANDLE: i32 = -5;
pub const RTB_ERR_PROTOCOL: i32 = -6;
pub const RTB_ERR_INTERNAL: i32 = -9;

pub const RTB_ERR_UNKNOWN_DATATYPE: i32 = buffer_error(ErrorCode::UnknownDataType);
pub const RTB_ERR_MALFORMED: i32 = buffer_error(ErrorCode::MalformedMessage);
pub const RTB_ERR_NO_HEADER: i32 = buffer_error(ErrorCode::NoHeader);
pub const RTB_ERR_TYPE_MISMATCH: i32 = buffer_error(ErrorCode::TypeMismatch);
pub const RTB_ERR_RANGE: i32 = buffer_error(ErrorCode::RangeError);
pub const RTB_ERR_UNSUPPORTED: i32 = buffer_error(ErrorCode::UnsupportedCommand);
pub const RTB_ERR_SERVER_INTERNAL: i32 = buffer_error(ErrorCode::Internal);
pub const RTB_ERR_RESPONSE_TOO_LARGE: i32 = buffer_error(ErrorCode::ResponseTooLarge);

pub const fn buffer_error(code: ErrorCode) -> i32 {
    -10 - code as i32
}
