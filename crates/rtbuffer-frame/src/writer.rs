use std::io::{ErrorKind, Write};

use bytes::BytesMut;
use rtbuffer_transport::BufferStream;
use tracing::trace;

use crate::codec::{encode_envelope, Frame, FrameConfig};
use crate::command::command_name;
use crate::error::{FrameError, Result};
use crate::reader::transport_to_frame_error;

/// Payloads up to this size are copied next to their envelope and sent in
/// one write; larger ones (sample blocks) go out straight from the caller's
/// buffer.
const COALESCE_LIMIT: usize = 64 * 1024;

/// Writes complete frames to any `Write` stream.
pub struct FrameWriter<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Write> FrameWriter<T> {
    /// Create a new frame writer with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame writer with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::new(),
            config,
        }
    }

    /// True if a payload of `payload_len` bytes may be sent in one frame.
    pub fn fits(&self, payload_len: usize) -> bool {
        payload_len <= self.config.max_payload_size && u32::try_from(payload_len).is_ok()
    }

    /// Write a complete frame (blocking).
    pub fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        self.send(frame.command, frame.payload.as_ref())
    }

    /// Encode and send a payload under a command code.
    ///
    /// Nothing is written if the payload does not [`fit`](Self::fits).
    pub fn send(&mut self, command: u16, payload: &[u8]) -> Result<()> {
        if !self.fits(payload.len()) {
            return Err(FrameError::PayloadTooLarge {
                size: payload.len(),
                max: self.config.max_payload_size,
            });
        }
        let envelope = encode_envelope(command, payload.len())?;

        if payload.len() <= COALESCE_LIMIT {
            self.buf.clear();
            self.buf.extend_from_slice(&envelope);
            self.buf.extend_from_slice(payload);
            let frame = std::mem::take(&mut self.buf);
            let written = self.write_all(&frame);
            self.buf = frame;
            written?;
        } else {
            self.write_all(&envelope)?;
            self.write_all(payload)?;
        }
        trace!(
            command = command_name(command),
            payload_len = payload.len(),
            "frame sent"
        );
        self.flush()
    }

    fn write_all(&mut self, mut bytes: &[u8]) -> Result<()> {
        while !bytes.is_empty() {
            match self.inner.write(bytes) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => bytes = &bytes[n..],
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
        Ok(())
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current frame writer configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl FrameWriter<BufferStream> {
    /// Create a frame writer for a `BufferStream` and apply the write timeout from config.
    pub fn with_config_stream(inner: BufferStream, config: FrameConfig) -> Result<Self> {
        inner
            .set_write_timeout(config.write_timeout)
            .map_err(transport_to_frame_error)?;
        Ok(Self::with_config(inner, config))
    }
}
