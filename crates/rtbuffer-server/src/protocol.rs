//! Request and response payloads of the buffer protocol.
//!
//! | Request  | Payload                                   | OK payload                        |
//! |----------|-------------------------------------------|-----------------------------------|
//! | PUT_HDR  | header record                             | header record as stored           |
//! | PUT_DAT  | data block                                | `sample_count u64`                |
//! | PUT_EVT  | event records                             | `first u64, end u64`              |
//! | GET_HDR  | (empty)                                   | header record                     |
//! | GET_DAT  | `beg u64, end u64` or empty for all       | data block                        |
//! | GET_EVT  | `beg u64, end u64` or empty for all       | event records                     |
//! | WAIT_DAT | `min_samples u64, min_events u64, ms u32` | `samples u64, events u64, outcome u32` |
//!
//! Error responses carry `code u32` followed by a UTF-8 message.

use std::ops::Range;
use std::time::Duration;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use rtbuffer_core::codec;
use rtbuffer_core::{
    DataBlock, ErrorCode, Event, HeaderSpec, StoreError, WaitOutcome, WaitResult, WaitThreshold,
};
use rtbuffer_frame::{
    command_name, Frame, GET_DAT, GET_EVT, GET_HDR, PUT_DAT, PUT_EVT, PUT_HDR, WAIT_DAT,
};

/// A decoded client request.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    PutHeader(HeaderSpec),
    PutData(DataBlock),
    PutEvents(Vec<Event>),
    GetHeader,
    /// `None` asks for every sample written so far.
    GetData(Option<Range<u64>>),
    /// `None` asks for every event written so far.
    GetEvents(Option<Range<u64>>),
    WaitData {
        threshold: WaitThreshold,
        timeout: Duration,
    },
}

impl Request {
    /// Command code this request is sent under.
    pub fn command(&self) -> u16 {
        match self {
            Request::PutHeader(_) => PUT_HDR,
            Request::PutData(_) => PUT_DAT,
            Request::PutEvents(_) => PUT_EVT,
            Request::GetHeader => GET_HDR,
            Request::GetData(_) => GET_DAT,
            Request::GetEvents(_) => GET_EVT,
            Request::WaitData { .. } => WAIT_DAT,
        }
    }

    pub fn name(&self) -> &'static str {
        command_name(self.command())
    }

    /// Encode the payload. Fails only for records whose lengths do not fit
    /// their `u32` fields.
    pub fn encode(&self) -> std::result::Result<Bytes, StoreError> {
        let mut buf = BytesMut::new();
        match self {
            Request::PutHeader(spec) => codec::encode_header_spec(spec, &mut buf)?,
            Request::PutData(block) => codec::encode_data_block(block, &mut buf),
            Request::PutEvents(events) => codec::encode_events(events, &mut buf)?,
            Request::GetHeader => {}
            Request::GetData(range) | Request::GetEvents(range) => {
                if let Some(range) = range {
                    buf.put_u64_le(range.start);
                    buf.put_u64_le(range.end);
                }
            }
            Request::WaitData { threshold, timeout } => {
                buf.put_u64_le(threshold.min_samples);
                buf.put_u64_le(threshold.min_events);
                buf.put_u32_le(u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX));
            }
        }
        Ok(buf.freeze())
    }

    /// Decode a request frame.
    ///
    /// Unknown commands yield `UnsupportedCommand`; bad payloads yield the
    /// codec's error.
    pub fn decode(frame: &Frame) -> std::result::Result<Self, ErrorReply> {
        let mut payload = frame.payload.clone();
        let request = match frame.command {
            PUT_HDR => Request::PutHeader(codec::decode_header_spec(&mut payload)?),
            PUT_DAT => Request::PutData(codec::decode_data_block(&mut payload)?),
            PUT_EVT => {
                return Ok(Request::PutEvents(codec::decode_events(payload)?));
            }
            GET_HDR => Request::GetHeader,
            GET_DAT => Request::GetData(decode_range(&mut payload)?),
            GET_EVT => Request::GetEvents(decode_range(&mut payload)?),
            WAIT_DAT => {
                if payload.remaining() != 20 {
                    return Err(StoreError::MalformedMessage(format!(
                        "WAIT_DAT payload must be 20 bytes, got {}",
                        payload.remaining()
                    ))
                    .into());
                }
                let min_samples = payload.get_u64_le();
                let min_events = payload.get_u64_le();
                let timeout = Duration::from_millis(payload.get_u32_le() as u64);
                Request::WaitData {
                    threshold: WaitThreshold::new(min_samples, min_events),
                    timeout,
                }
            }
            other => {
                return Err(ErrorReply::new(
                    ErrorCode::UnsupportedCommand,
                    format!("unsupported command {other:#06x}"),
                ))
            }
        };
        codec::expect_end(&payload)?;
        Ok(request)
    }
}

fn decode_range(payload: &mut Bytes) -> std::result::Result<Option<Range<u64>>, StoreError> {
    match payload.remaining() {
        0 => Ok(None),
        16 => {
            let beg = payload.get_u64_le();
            let end = payload.get_u64_le();
            Ok(Some(beg..end))
        }
        n => Err(StoreError::MalformedMessage(format!(
            "range payload must be empty or 16 bytes, got {n}"
        ))),
    }
}

/// Payload of a `*_ERR` response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorReply {
    pub code: ErrorCode,
    pub message: String,
}

impl ErrorReply {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(4 + self.message.len());
        buf.put_u32_le(self.code.as_u32());
        buf.put_slice(self.message.as_bytes());
        buf.freeze()
    }

    /// Lenient: a short payload reads as `Internal`, invalid UTF-8 is replaced.
    pub fn decode(payload: &[u8]) -> Self {
        if payload.len() < 4 {
            return Self::new(ErrorCode::Internal, "truncated error response");
        }
        let mut code = [0u8; 4];
        code.copy_from_slice(&payload[..4]);
        Self {
            code: ErrorCode::from_u32(u32::from_le_bytes(code)),
            message: String::from_utf8_lossy(&payload[4..]).into_owned(),
        }
    }
}

impl From<StoreError> for ErrorReply {
    fn from(err: StoreError) -> Self {
        Self::new(err.code(), err.to_string())
    }
}

/// Payload of a WAIT_OK response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitReply {
    pub samples: u64,
    pub events: u64,
    pub outcome: WaitOutcome,
}

impl WaitReply {
    /// `None` for a cancelled wait, which is never answered.
    pub fn from_result(result: &WaitResult) -> Option<Self> {
        result.outcome.wire_code()?;
        Some(Self {
            samples: result.counts.samples,
            events: result.counts.events,
            outcome: result.outcome,
        })
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(20);
        buf.put_u64_le(self.samples);
        buf.put_u64_le(self.events);
        buf.put_u32_le(self.outcome.wire_code().unwrap_or(u32::MAX));
        buf.freeze()
    }

    pub fn decode(mut payload: Bytes) -> std::result::Result<Self, StoreError> {
        if payload.remaining() != 20 {
            return Err(StoreError::MalformedMessage(format!(
                "WAIT_OK payload must be 20 bytes, got {}",
                payload.remaining()
            )));
        }
        let samples = payload.get_u64_le();
        let events = payload.get_u64_le();
        let code = payload.get_u32_le();
        let outcome = WaitOutcome::from_wire_code(code).ok_or_else(|| {
            StoreError::MalformedMessage(format!("unknown wait outcome {code}"))
        })?;
        Ok(Self {
            samples,
            events,
            outcome,
        })
    }
}

/// PUT_DAT ok payload.
pub fn encode_sample_count(samples: u64) -> Bytes {
    Bytes::copy_from_slice(&samples.to_le_bytes())
}

pub fn decode_sample_count(mut payload: Bytes) -> std::result::Result<u64, StoreError> {
    if payload.remaining() != 8 {
        return Err(StoreError::MalformedMessage(format!(
            "PUT_DAT response must be 8 bytes, got {}",
            payload.remaining()
        )));
    }
    Ok(payload.get_u64_le())
}

/// PUT_EVT ok payload.
pub fn encode_event_range(range: &Range<u64>) -> Bytes {
    let mut buf = BytesMut::with_capacity(16);
    buf.put_u64_le(range.start);
    buf.put_u64_le(range.end);
    buf.freeze()
}

pub fn decode_event_range(mut payload: Bytes) -> std::result::Result<Range<u64>, StoreError> {
    match decode_range(&mut payload)? {
        Some(range) => Ok(range),
        None => Err(StoreError::MalformedMessage(
            "PUT_EVT response is empty".to_string(),
        )),
    }
}
