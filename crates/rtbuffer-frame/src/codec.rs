use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// Frame header: version (2) + command (2) + length (4) = 8 bytes.
pub const HEADER_SIZE: usize = 8;

/// Protocol version written into every frame.
pub const VERSION: u16 = 1;

/// Default maximum payload size: 64 MiB.
///
/// Sample blocks are the big messages; 64 MiB holds several seconds of a
/// high-density float64 recording.
pub const DEFAULT_MAX_PAYLOAD: usize = 64 * 1024 * 1024;

/// A framed protocol message.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Command code (see [`crate::command`]).
    pub command: u16,
    /// The message payload.
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame.
    pub fn new(command: u16, payload: impl Into<Bytes>) -> Self {
        Self {
            command,
            payload: payload.into(),
        }
    }

    /// A frame without payload.
    pub fn empty(command: u16) -> Self {
        Self::new(command, Bytes::new())
    }

    /// The total wire size of this frame (header + payload).
    pub fn wire_size(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }
}

/// Encode a frame into the wire format.
///
/// Wire format:
/// ```text
/// ┌──────────────┬──────────────┬──────────────┬─────────────────┐
/// │ Version (2B) │ Command (2B) │ Length (4B)  │ Payload         │
/// │ LE, = 1      │ LE           │ LE           │ (Length bytes)  │
/// └──────────────┴──────────────┴──────────────┴─────────────────┘
/// ```
pub fn encode_frame(command: u16, payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    let envelope = encode_envelope(command, payload.len())?;
    dst.reserve(HEADER_SIZE + payload.len());
    dst.put_slice(&envelope);
    dst.put_slice(payload);
    Ok(())
}

/// The 8-byte envelope announcing `payload_len` bytes under `command`.
pub fn encode_envelope(command: u16, payload_len: usize) -> Result<[u8; HEADER_SIZE]> {
    let len = u32::try_from(payload_len).map_err(|_| FrameError::PayloadTooLarge {
        size: payload_len,
        max: u32::MAX as usize,
    })?;
    let mut envelope = [0u8; HEADER_SIZE];
    envelope[0..2].copy_from_slice(&VERSION.to_le_bytes());
    envelope[2..4].copy_from_slice(&command.to_le_bytes());
    envelope[4..8].copy_from_slice(&len.to_le_bytes());
    Ok(envelope)
}

/// Decode a frame from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet.
/// On success, consumes the frame bytes from the buffer.
pub fn decode_frame(src: &mut BytesMut, max_payload: usize) -> Result<Option<Frame>> {
    if src.len() < HEADER_SIZE {
        return Ok(None);
    }

    let mut header = &src[..HEADER_SIZE];
    let version = header.get_u16_le();
    let command = header.get_u16_le();
    let payload_len = header.get_u32_le() as usize;

    if version != VERSION {
        return Err(FrameError::UnsupportedVersion(version));
    }

    if payload_len > max_payload {
        return Err(FrameError::PayloadTooLarge {
            size: payload_len,
            max: max_payload,
        });
    }

    let total = HEADER_SIZE + payload_len;
    if src.len() < total {
        src.reserve(total - src.len());
        return Ok(None);
    }

    src.advance(HEADER_SIZE);
    let payload = src.split_to(payload_len).freeze();

    Ok(Some(Frame { command, payload }))
}

/// Configuration for the frame codec.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum payload size in bytes. Default: 64 MiB.
    pub max_payload_size: usize,
    /// Read timeout for blocking operations.
    pub read_timeout: Option<std::time::Duration>,
    /// Write timeout for blocking operations.
    pub write_timeout: Option<std::time::Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            read_timeout: None,
            write_timeout: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{GET_HDR, PUT_DAT, PUT_OK};

    #[test]
    fn test_encode_layout() {
        let mut buf = BytesMut::new();
        encode_frame(PUT_DAT, b"abc", &mut buf).unwrap();

        assert_eq!(
            buf.as_ref(),
            &[0x01, 0x00, 0x02, 0x01, 0x03, 0x00, 0x00, 0x00, b'a', b'b', b'c']
        );
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let mut buf = BytesMut::new();
        let payload = b"sample block";

        encode_frame(PUT_DAT, payload, &mut buf).unwrap();
        assert_eq!(buf.len(), HEADER_SIZE + payload.len());

        let frame = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .unwrap();

        assert_eq!(frame.command, PUT_DAT);
        assert_eq!(frame.payload.as_ref(), payload);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_decode_incomplete_header() {
        let mut buf = BytesMut::from(&[0x01, 0x00, 0x01][..]);
        let result = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_decode_incomplete_payload() {
        let mut buf = BytesMut::new();
        encode_frame(PUT_DAT, b"hello", &mut buf).unwrap();
        buf.truncate(HEADER_SIZE + 2);

        let result = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD).unwrap();
        assert!(result.is_none());
        assert_eq!(buf.len(), HEADER_SIZE + 2, "partial frame must stay buffered");
    }

    #[test]
    fn test_decode_wrong_version() {
        let mut buf = BytesMut::from(&[0x02, 0x00, 0x01, 0x02, 0x00, 0x00, 0x00, 0x00][..]);
        let result = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD);
        assert!(matches!(result, Err(FrameError::UnsupportedVersion(2))));
    }

    #[test]
    fn test_decode_payload_too_large() {
        let mut buf = BytesMut::new();
        buf.put_u16_le(VERSION);
        buf.put_u16_le(PUT_DAT);
        buf.put_u32_le(1024 * 1024 * 128);

        let result = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD);
        assert!(matches!(result, Err(FrameError::PayloadTooLarge { .. })));
    }

    #[test]
    fn test_multiple_frames() {
        let mut buf = BytesMut::new();
        encode_frame(GET_HDR, b"", &mut buf).unwrap();
        encode_frame(PUT_OK, b"second", &mut buf).unwrap();

        let f1 = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .unwrap();
        assert_eq!(f1, Frame::empty(GET_HDR));

        let f2 = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .unwrap();
        assert_eq!(f2.command, PUT_OK);
        assert_eq!(f2.payload.as_ref(), b"second");

        assert!(buf.is_empty());
    }

    #[test]
    fn test_frame_wire_size() {
        let frame = Frame::new(PUT_DAT, Bytes::from_static(b"test"));
        assert_eq!(frame.wire_size(), HEADER_SIZE + 4);
    }
}
