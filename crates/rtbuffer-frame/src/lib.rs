//! Message envelope framing for the rtbuffer protocol.
//!
//! Every request and response is framed with an 8-byte header:
//! - A 2-byte little-endian protocol version
//! - A 2-byte little-endian command code
//! - A 4-byte little-endian payload length
//!
//! Readers always hand out complete messages; partial reads are handled here.

pub mod command;
pub mod codec;
pub mod error;
pub mod reader;
pub mod writer;

pub use codec::{
    decode_frame, encode_envelope, encode_frame, Frame, FrameConfig, DEFAULT_MAX_PAYLOAD,
    HEADER_SIZE, VERSION,
};
pub use command::{
    command_name, GET_DAT, GET_ERR, GET_EVT, GET_HDR, GET_OK, PUT_DAT, PUT_ERR, PUT_EVT, PUT_HDR,
    PUT_OK, WAIT_DAT, WAIT_ERR, WAIT_OK,
};
pub use error::{FrameError, Result};
pub use reader::FrameReader;
pub use writer::FrameWriter;
