use rtbuffer_core::{ErrorCode, StoreError};

/// Errors seen by servers and clients.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] rtbuffer_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] rtbuffer_frame::FrameError),

    /// Local buffer or codec failure.
    #[error("buffer error: {0}")]
    Store(#[from] StoreError),

    /// The server answered with an error response.
    #[error("server error ({code}): {message}")]
    Remote { code: ErrorCode, message: String },

    /// The server answered with a command the request does not expect.
    #[error("unexpected response {got:#06x} to {request}")]
    UnexpectedResponse { request: &'static str, got: u16 },

    /// The connection went away mid-exchange.
    #[error("disconnected: {0}")]
    Disconnected(String),

    /// Configuration could not be loaded.
    #[error("config error: {0}")]
    Config(String),
}

impl ServerError {
    /// The buffer error code, for errors that carry one.
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            ServerError::Remote { code, .. } => Some(*code),
            ServerError::Store(err) => Some(err.code()),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;
