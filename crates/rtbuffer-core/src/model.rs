//! Buffer contents: header, sample blocks, events.

use bytes::{Bytes, BytesMut};
use serde::Serialize;

use crate::datatype::{DataType, Element};
use crate::error::{Result, StoreError};

/// What a producer supplies to (re)initialise the buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct HeaderSpec {
    pub datatype: DataType,
    pub channel_count: u32,
    pub sample_rate: f32,
    /// Opaque extension bytes (channel names, resolutions, ...), kept verbatim.
    pub chunks: Bytes,
}

impl HeaderSpec {
    pub fn new(datatype: DataType, channel_count: u32, sample_rate: f32) -> Self {
        Self {
            datatype,
            channel_count,
            sample_rate,
            chunks: Bytes::new(),
        }
    }

    pub fn with_chunks(mut self, chunks: impl Into<Bytes>) -> Self {
        self.chunks = chunks.into();
        self
    }

    /// Reject zero channels, non-positive or non-finite sample rates, and
    /// chunks too long for the record's length field.
    pub fn validate(&self) -> Result<()> {
        if self.channel_count == 0 {
            return Err(StoreError::InvalidHeader(
                "channel_count must be greater than zero".to_string(),
            ));
        }
        if !self.sample_rate.is_finite() || self.sample_rate <= 0.0 {
            return Err(StoreError::InvalidHeader(format!(
                "sample_rate must be positive and finite, got {}",
                self.sample_rate
            )));
        }
        if u32::try_from(self.chunks.len()).is_err() {
            return Err(StoreError::InvalidHeader(format!(
                "{} bytes of chunks exceed the u32 length field",
                self.chunks.len()
            )));
        }
        Ok(())
    }
}

/// The buffer header as seen by readers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Header {
    pub datatype: DataType,
    pub channel_count: u32,
    pub sample_rate: f32,
    pub sample_count: u64,
    pub event_count: u64,
    /// Starts at 1 and grows by one on every header replacement.
    pub generation: u64,
    #[serde(skip)]
    pub chunks: Bytes,
}

impl Header {
    pub(crate) fn from_spec(spec: HeaderSpec, generation: u64) -> Self {
        Self {
            datatype: spec.datatype,
            channel_count: spec.channel_count,
            sample_rate: spec.sample_rate,
            sample_count: 0,
            event_count: 0,
            generation,
            chunks: spec.chunks,
        }
    }

    /// Bytes occupied by one sample (all channels).
    pub fn bytes_per_sample(&self) -> usize {
        self.channel_count as usize * self.datatype.width()
    }

    /// The producer-settable part of this header.
    pub fn spec(&self) -> HeaderSpec {
        HeaderSpec {
            datatype: self.datatype,
            channel_count: self.channel_count,
            sample_rate: self.sample_rate,
            chunks: self.chunks.clone(),
        }
    }

    pub fn counts(&self) -> Counts {
        Counts {
            generation: self.generation,
            samples: self.sample_count,
            events: self.event_count,
        }
    }
}

/// Snapshot of the growing counts of one header generation.
///
/// `generation == 0` means no header has been written yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Counts {
    pub generation: u64,
    pub samples: u64,
    pub events: u64,
}

/// A block of samples, time-major, with type-erased element bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct DataBlock {
    pub datatype: DataType,
    pub channel_count: u32,
    pub sample_count: u64,
    pub data: Bytes,
}

impl DataBlock {
    /// Build a block, checking that `data` holds exactly
    /// `channel_count × sample_count` elements.
    pub fn new(
        datatype: DataType,
        channel_count: u32,
        sample_count: u64,
        data: impl Into<Bytes>,
    ) -> Result<Self> {
        let block = Self {
            datatype,
            channel_count,
            sample_count,
            data: data.into(),
        };
        block.check_len()?;
        Ok(block)
    }

    /// Build a block from typed values laid out sample after sample.
    pub fn from_samples<T: Element>(channel_count: u32, values: &[T]) -> Result<Self> {
        if channel_count == 0 || values.len() % channel_count as usize != 0 {
            return Err(StoreError::malformed(format!(
                "{} values do not fill whole samples of {} channels",
                values.len(),
                channel_count
            )));
        }
        let mut data = BytesMut::with_capacity(values.len() * T::DATATYPE.width());
        for value in values {
            value.put_le(&mut data);
        }
        Ok(Self {
            datatype: T::DATATYPE,
            channel_count,
            sample_count: (values.len() / channel_count as usize) as u64,
            data: data.freeze(),
        })
    }

    /// Interpret the element bytes as `T`.
    pub fn to_vec<T: Element>(&self) -> Result<Vec<T>> {
        if T::DATATYPE != self.datatype {
            return Err(StoreError::TypeMismatch {
                expected_type: self.datatype,
                expected_channels: self.channel_count,
                got_type: T::DATATYPE,
                got_channels: self.channel_count,
            });
        }
        Ok(self
            .data
            .chunks_exact(self.datatype.width())
            .map(T::from_le_slice)
            .collect())
    }

    /// `channel_count × sample_count × width`, or `None` on overflow.
    pub fn expected_len(&self) -> Option<u64> {
        (self.channel_count as u64)
            .checked_mul(self.sample_count)?
            .checked_mul(self.datatype.width() as u64)
    }

    pub(crate) fn check_len(&self) -> Result<()> {
        match self.expected_len() {
            Some(expected) if expected == self.data.len() as u64 => Ok(()),
            expected => Err(StoreError::malformed(format!(
                "data block carries {} bytes, header fields require {}",
                self.data.len(),
                expected.map_or_else(|| "more than u64::MAX".to_string(), |n| n.to_string())
            ))),
        }
    }
}

/// A typed event attribute (type or value): `numel` elements of `datatype`.
#[derive(Debug, Clone, PartialEq)]
pub struct EventField {
    pub datatype: DataType,
    pub numel: u32,
    pub bytes: Bytes,
}

impl EventField {
    /// A `char` field holding a string.
    ///
    /// Strings longer than `u32::MAX` bytes get a saturated `numel` and are
    /// rejected when the event is stored.
    pub fn text(text: &str) -> Self {
        Self {
            datatype: DataType::Char,
            numel: u32::try_from(text.len()).unwrap_or(u32::MAX),
            bytes: Bytes::copy_from_slice(text.as_bytes()),
        }
    }

    /// A single numeric element.
    pub fn scalar<T: Element>(value: T) -> Self {
        let mut bytes = BytesMut::with_capacity(T::DATATYPE.width());
        value.put_le(&mut bytes);
        Self {
            datatype: T::DATATYPE,
            numel: 1,
            bytes: bytes.freeze(),
        }
    }

    /// The field as a string, if it is a UTF-8 `char` field.
    pub fn as_text(&self) -> Option<&str> {
        if self.datatype != DataType::Char {
            return None;
        }
        std::str::from_utf8(&self.bytes).ok()
    }

    /// The field as a single numeric element of type `T`.
    pub fn as_scalar<T: Element>(&self) -> Option<T> {
        (self.datatype == T::DATATYPE && self.numel == 1).then(|| T::from_le_slice(&self.bytes))
    }

    pub(crate) fn check_len(&self, what: &str) -> Result<()> {
        let expected = self.numel as u64 * self.datatype.width() as u64;
        if expected != self.bytes.len() as u64 {
            return Err(StoreError::malformed(format!(
                "event {what} declares {} {} elements but carries {} bytes",
                self.numel,
                self.datatype,
                self.bytes.len()
            )));
        }
        Ok(())
    }
}

impl std::fmt::Display for EventField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(text) = self.as_text() {
            return f.write_str(text);
        }
        let width = self.datatype.width();
        let render = |chunk: &[u8]| -> String {
            match self.datatype {
                DataType::Char => (chunk[0] as char).to_string(),
                DataType::Uint8 => u8::from_le_slice(chunk).to_string(),
                DataType::Uint16 => u16::from_le_slice(chunk).to_string(),
                DataType::Uint32 => u32::from_le_slice(chunk).to_string(),
                DataType::Uint64 => u64::from_le_slice(chunk).to_string(),
                DataType::Int8 => i8::from_le_slice(chunk).to_string(),
                DataType::Int16 => i16::from_le_slice(chunk).to_string(),
                DataType::Int32 => i32::from_le_slice(chunk).to_string(),
                DataType::Int64 => i64::from_le_slice(chunk).to_string(),
                DataType::Float32 => f32::from_le_slice(chunk).to_string(),
                DataType::Float64 => f64::from_le_slice(chunk).to_string(),
            }
        };
        let parts: Vec<String> = self.bytes.chunks_exact(width).map(render).collect();
        f.write_str(&parts.join(","))
    }
}

/// A discrete marker anchored to a sample index.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// Sample index the event refers to.
    pub sample: u64,
    /// Offset in samples relative to `sample`.
    pub offset: i32,
    /// Duration in samples; 0 for instantaneous events.
    pub duration: i32,
    pub event_type: EventField,
    pub event_value: EventField,
    /// Optional opaque attachment.
    pub payload: Bytes,
}

impl Event {
    /// An instantaneous event with string type and value.
    pub fn new(sample: u64, event_type: &str, event_value: &str) -> Self {
        Self::typed(sample, EventField::text(event_type), EventField::text(event_value))
    }

    pub fn typed(sample: u64, event_type: EventField, event_value: EventField) -> Self {
        Self {
            sample,
            offset: 0,
            duration: 0,
            event_type,
            event_value,
            payload: Bytes::new(),
        }
    }

    pub fn with_payload(mut self, payload: impl Into<Bytes>) -> Self {
        self.payload = payload.into();
        self
    }

    pub fn with_timing(mut self, offset: i32, duration: i32) -> Self {
        self.offset = offset;
        self.duration = duration;
        self
    }

    pub(crate) fn check(&self) -> Result<()> {
        self.event_type.check_len("type")?;
        self.event_value.check_len("value")?;
        if u32::try_from(self.payload.len()).is_err() {
            return Err(StoreError::malformed(format!(
                "event payload of {} bytes exceeds the u32 length field",
                self.payload.len()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_spec_validation() {
        assert!(HeaderSpec::new(DataType::Float32, 4, 1000.0).validate().is_ok());
        assert!(matches!(
            HeaderSpec::new(DataType::Float32, 0, 1000.0).validate(),
            Err(StoreError::InvalidHeader(_))
        ));
        assert!(HeaderSpec::new(DataType::Float32, 1, 0.0).validate().is_err());
        assert!(HeaderSpec::new(DataType::Float32, 1, -5.0).validate().is_err());
        assert!(HeaderSpec::new(DataType::Float32, 1, f32::NAN).validate().is_err());
    }

    #[test]
    fn data_block_length_checked() {
        assert!(DataBlock::new(DataType::Int16, 2, 3, vec![0u8; 12]).is_ok());
        assert!(matches!(
            DataBlock::new(DataType::Int16, 2, 3, vec![0u8; 11]),
            Err(StoreError::MalformedMessage(_))
        ));
    }

    #[test]
    fn data_block_typed_roundtrip() {
        let block = DataBlock::from_samples(2, &[1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        assert_eq!(block.datatype, DataType::Float32);
        assert_eq!(block.sample_count, 3);
        assert_eq!(block.data.len(), 24);
        assert_eq!(block.to_vec::<f32>().unwrap(), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert!(matches!(
            block.to_vec::<f64>(),
            Err(StoreError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn data_block_rejects_ragged_values() {
        assert!(DataBlock::from_samples(3, &[1i32, 2, 3, 4]).is_err());
        assert!(DataBlock::from_samples(0, &[1i32]).is_err());
    }

    #[test]
    fn event_fields() {
        let event = Event::new(12, "trigger", "S  1").with_timing(0, 5);
        assert_eq!(event.event_type.as_text(), Some("trigger"));
        assert_eq!(event.event_value.to_string(), "S  1");
        assert_eq!(event.duration, 5);
        assert!(event.check().is_ok());

        let numeric = EventField::scalar(42i32);
        assert_eq!(numeric.as_scalar::<i32>(), Some(42));
        assert_eq!(numeric.as_text(), None);
        assert_eq!(numeric.to_string(), "42");
    }

    #[test]
    fn event_field_length_mismatch_is_malformed() {
        let bad = EventField {
            datatype: DataType::Int32,
            numel: 2,
            bytes: Bytes::from_static(&[0, 0, 0, 0]),
        };
        let event = Event::typed(0, bad, EventField::text("x"));
        assert!(matches!(event.check(), Err(StoreError::MalformedMessage(_))));
    }

    #[test]
    fn header_exposes_counts_and_stride() {
        let header = Header::from_spec(HeaderSpec::new(DataType::Float64, 8, 250.0), 3);
        assert_eq!(header.bytes_per_sample(), 64);
        assert_eq!(
            header.counts(),
            Counts {
                generation: 3,
                samples: 0,
                events: 0
            }
        );
        assert_eq!(header.spec(), HeaderSpec::new(DataType::Float64, 8, 250.0));
    }
}
