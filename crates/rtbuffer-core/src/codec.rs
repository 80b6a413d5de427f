//! Little-endian binary records for headers, sample blocks and events.
//!
//! Encoders append to a [`BytesMut`]; decoders consume from a [`Bytes`]
//! cursor so that element bytes are sliced rather than copied.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::datatype::DataType;
use crate::error::{Result, StoreError};
use crate::model::{DataBlock, Event, EventField, Header, HeaderSpec};

/// Fixed part of a header record.
pub const HEADER_RECORD_SIZE: usize = 40;

/// Fixed part of a data block.
pub const DATA_BLOCK_HEADER_SIZE: usize = 24;

/// Fixed part of an event record.
pub const EVENT_RECORD_SIZE: usize = 40;

fn need(buf: &Bytes, n: usize, what: &str) -> Result<()> {
    if buf.remaining() < n {
        return Err(StoreError::malformed(format!(
            "{what}: need {n} bytes, have {}",
            buf.remaining()
        )));
    }
    Ok(())
}

fn take(buf: &mut Bytes, len: u64, what: &str) -> Result<Bytes> {
    let len = usize::try_from(len)
        .map_err(|_| StoreError::malformed(format!("{what}: length {len} too large")))?;
    need(buf, len, what)?;
    Ok(buf.split_to(len))
}

/// Fail if anything is left after the last record.
pub fn expect_end(buf: &Bytes) -> Result<()> {
    if buf.has_remaining() {
        return Err(StoreError::malformed(format!(
            "{} trailing bytes",
            buf.remaining()
        )));
    }
    Ok(())
}

/// A length as the `u32` the record format carries.
pub(crate) fn wire_len(len: usize, what: &str) -> Result<u32> {
    u32::try_from(len)
        .map_err(|_| StoreError::malformed(format!("{what} of {len} bytes exceeds the u32 length field")))
}

// --- header ---

pub fn encode_header(header: &Header, dst: &mut BytesMut) -> Result<()> {
    let chunks_len = wire_len(header.chunks.len(), "header chunks")?;
    dst.reserve(HEADER_RECORD_SIZE + header.chunks.len());
    dst.put_u32_le(header.channel_count);
    dst.put_u64_le(header.sample_count);
    dst.put_u64_le(header.event_count);
    dst.put_f32_le(header.sample_rate);
    dst.put_u32_le(header.datatype.tag());
    dst.put_u64_le(header.generation);
    dst.put_u32_le(chunks_len);
    dst.put_slice(&header.chunks);
    Ok(())
}

/// Encode a producer's header; counts and generation go out as zero.
pub fn encode_header_spec(spec: &HeaderSpec, dst: &mut BytesMut) -> Result<()> {
    encode_header(&Header::from_spec(spec.clone(), 0), dst)
}

/// Decode one header record, counts and generation included.
pub fn decode_header(buf: &mut Bytes) -> Result<Header> {
    need(buf, HEADER_RECORD_SIZE, "header record")?;
    let channel_count = buf.get_u32_le();
    let sample_count = buf.get_u64_le();
    let event_count = buf.get_u64_le();
    let sample_rate = buf.get_f32_le();
    let datatype = DataType::from_tag(buf.get_u32_le())?;
    let generation = buf.get_u64_le();
    let chunks_len = buf.get_u32_le();
    let chunks = take(buf, chunks_len as u64, "header chunks")?;
    Ok(Header {
        datatype,
        channel_count,
        sample_rate,
        sample_count,
        event_count,
        generation,
        chunks,
    })
}

/// Decode a header record as written by a producer: only the format fields
/// and chunks are kept.
pub fn decode_header_spec(buf: &mut Bytes) -> Result<HeaderSpec> {
    decode_header(buf).map(|header| header.spec())
}

// --- samples ---

/// Encoded size of a data block carrying `data_len` sample bytes.
pub fn data_block_len(data_len: usize) -> usize {
    DATA_BLOCK_HEADER_SIZE.saturating_add(data_len)
}

pub fn encode_data_block(block: &DataBlock, dst: &mut BytesMut) {
    dst.reserve(DATA_BLOCK_HEADER_SIZE + block.data.len());
    dst.put_u32_le(block.channel_count);
    dst.put_u64_le(block.sample_count);
    dst.put_u32_le(block.datatype.tag());
    dst.put_u64_le(block.data.len() as u64);
    dst.put_slice(&block.data);
}

/// Decode one data block; `byte_len` must match the declared geometry.
pub fn decode_data_block(buf: &mut Bytes) -> Result<DataBlock> {
    need(buf, DATA_BLOCK_HEADER_SIZE, "data block")?;
    let channel_count = buf.get_u32_le();
    let sample_count = buf.get_u64_le();
    let datatype = DataType::from_tag(buf.get_u32_le())?;
    let byte_len = buf.get_u64_le();
    let block = DataBlock {
        datatype,
        channel_count,
        sample_count,
        data: Bytes::new(),
    };
    if block.expected_len() != Some(byte_len) {
        return Err(StoreError::malformed(format!(
            "data block byte_len {byte_len} disagrees with {channel_count} channels x {sample_count} samples of {datatype}"
        )));
    }
    let data = take(buf, byte_len, "data block bytes")?;
    Ok(DataBlock { data, ..block })
}

// --- events ---

/// Encoded size of one event record.
pub fn event_record_len(event: &Event) -> usize {
    EVENT_RECORD_SIZE
        .saturating_add(event.event_type.bytes.len())
        .saturating_add(event.event_value.bytes.len())
        .saturating_add(event.payload.len())
}

pub fn encode_event(event: &Event, dst: &mut BytesMut) -> Result<()> {
    let payload_len = wire_len(event.payload.len(), "event payload")?;
    dst.reserve(event_record_len(event));
    dst.put_u64_le(event.sample);
    dst.put_i32_le(event.offset);
    dst.put_i32_le(event.duration);
    dst.put_u32_le(event.event_type.datatype.tag());
    dst.put_u32_le(event.event_type.numel);
    dst.put_u32_le(event.event_value.datatype.tag());
    dst.put_u32_le(event.event_value.numel);
    dst.put_u32_le(payload_len);
    dst.put_u32_le(0);
    dst.put_slice(&event.event_type.bytes);
    dst.put_slice(&event.event_value.bytes);
    dst.put_slice(&event.payload);
    Ok(())
}

pub fn encode_events(events: &[Event], dst: &mut BytesMut) -> Result<()> {
    for event in events {
        encode_event(event, dst)?;
    }
    Ok(())
}

fn decode_field(buf: &mut Bytes, datatype: DataType, numel: u32, what: &str) -> Result<EventField> {
    let len = numel as u64 * datatype.width() as u64;
    let bytes = take(buf, len, what)?;
    Ok(EventField {
        datatype,
        numel,
        bytes,
    })
}

pub fn decode_event(buf: &mut Bytes) -> Result<Event> {
    need(buf, EVENT_RECORD_SIZE, "event record")?;
    let sample = buf.get_u64_le();
    let offset = buf.get_i32_le();
    let duration = buf.get_i32_le();
    let type_datatype = DataType::from_tag(buf.get_u32_le())?;
    let type_numel = buf.get_u32_le();
    let value_datatype = DataType::from_tag(buf.get_u32_le())?;
    let value_numel = buf.get_u32_le();
    let payload_len = buf.get_u32_le();
    let _reserved = buf.get_u32_le();

    let event_type = decode_field(buf, type_datatype, type_numel, "event type")?;
    let event_value = decode_field(buf, value_datatype, value_numel, "event value")?;
    let payload = take(buf, payload_len as u64, "event payload")?;
    Ok(Event {
        sample,
        offset,
        duration,
        event_type,
        event_value,
        payload,
    })
}

/// Decode a concatenation of event records filling the whole buffer.
pub fn decode_events(mut buf: Bytes) -> Result<Vec<Event>> {
    let mut events = Vec::new();
    while buf.has_remaining() {
        events.push(decode_event(&mut buf)?);
    }
    Ok(events)
}
