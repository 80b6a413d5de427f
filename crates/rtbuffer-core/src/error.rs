use crate::datatype::DataType;

/// Failures of buffer operations.
///
/// Every variant is recoverable for the server: it is reported to the
/// requesting client and the session continues.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    /// The datatype tag is not one of the known element types.
    #[error("unknown datatype tag {0}")]
    UnknownDataType(u32),

    /// Declared lengths disagree with the bytes available.
    #[error("malformed message: {0}")]
    MalformedMessage(String),

    /// The operation needs a header and none has been written yet.
    #[error("no header has been written")]
    NoHeader,

    /// Written data disagrees with the established header.
    #[error(
        "data ({got_type}, {got_channels} channels) does not match header ({expected_type}, {expected_channels} channels)"
    )]
    TypeMismatch {
        expected_type: DataType,
        expected_channels: u32,
        got_type: DataType,
        got_channels: u32,
    },

    /// Requested range `[beg, end)` is inverted or beyond the current count.
    #[error("range [{beg}, {end}) out of bounds (have {available})")]
    RangeError { beg: u64, end: u64, available: u64 },

    /// The header values themselves are unusable.
    #[error("invalid header: {0}")]
    InvalidHeader(String),

    /// The reply to a valid read would not fit in one frame.
    #[error("response of {size} bytes exceeds the {max} byte limit; read a smaller range")]
    ResponseTooLarge { size: u64, max: u64 },
}

impl StoreError {
    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        StoreError::MalformedMessage(message.into())
    }

    /// Wire error code for this failure.
    pub fn code(&self) -> ErrorCode {
        match self {
            StoreError::UnknownDataType(_) => ErrorCode::UnknownDataType,
            StoreError::MalformedMessage(_) | StoreError::InvalidHeader(_) => {
                ErrorCode::MalformedMessage
            }
            StoreError::NoHeader => ErrorCode::NoHeader,
            StoreError::TypeMismatch { .. } => ErrorCode::TypeMismatch,
            StoreError::RangeError { .. } => ErrorCode::RangeError,
            StoreError::ResponseTooLarge { .. } => ErrorCode::ResponseTooLarge,
        }
    }
}

/// Error codes carried in `*_ERR` responses.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    UnknownDataType = 1,
    MalformedMessage = 2,
    NoHeader = 3,
    TypeMismatch = 4,
    RangeError = 5,
    UnsupportedCommand = 6,
    Internal = 7,
    ResponseTooLarge = 8,
}

impl ErrorCode {
    /// Numeric wire value.
    pub fn as_u32(self) -> u32 {
        self as u32
    }

    /// Map a wire value back; unknown values read as `Internal`.
    pub fn from_u32(code: u32) -> Self {
        match code {
            1 => ErrorCode::UnknownDataType,
            2 => ErrorCode::MalformedMessage,
            3 => ErrorCode::NoHeader,
            4 => ErrorCode::TypeMismatch,
            5 => ErrorCode::RangeError,
            6 => ErrorCode::UnsupportedCommand,
            8 => ErrorCode::ResponseTooLarge,
            _ => ErrorCode::Internal,
        }
    }

    /// Stable lowercase name, used in logs and CLI output.
    pub fn name(self) -> &'static str {
        match self {
            ErrorCode::UnknownDataType => "unknown_datatype",
            ErrorCode::MalformedMessage => "malformed_message",
            ErrorCode::NoHeader => "no_header",
            ErrorCode::TypeMismatch => "type_mismatch",
            ErrorCode::RangeError => "range_error",
            ErrorCode::UnsupportedCommand => "unsupported_command",
            ErrorCode::Internal => "internal",
            ErrorCode::ResponseTooLarge => "response_too_large",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
