use std::ops::Range;
use std::time::Duration;

use bytes::Bytes;
use rtbuffer_core::codec;
use rtbuffer_core::{DataBlock, Event, Header, HeaderSpec, WaitThreshold};
use rtbuffer_frame::command::error_response_for;
use rtbuffer_frame::{FrameConfig, FrameError, FrameReader, FrameWriter, GET_OK, PUT_OK, WAIT_OK};
use rtbuffer_transport::BufferStream;
use tracing::debug;

use crate::error::{Result, ServerError};
use crate::protocol::{decode_event_range, decode_sample_count, ErrorReply, Request, WaitReply};
use crate::server::Endpoint;

/// Blocking client: one request in flight at a time.
pub struct BufferClient {
    reader: FrameReader<BufferStream>,
    writer: FrameWriter<BufferStream>,
}

impl BufferClient {
    /// Connect to `host:port`, `unix:/path` or an absolute socket path.
    pub fn connect(addr: &str) -> Result<Self> {
        let endpoint: Endpoint = addr
            .parse()
            .map_err(|err: String| ServerError::Config(format!("invalid endpoint {addr:?}: {err}")))?;
        Self::connect_endpoint(&endpoint)
    }

    pub fn connect_endpoint(endpoint: &Endpoint) -> Result<Self> {
        Self::from_stream(endpoint.connect()?, FrameConfig::default())
    }

    /// Wrap an already connected stream.
    pub fn from_stream(stream: BufferStream, config: FrameConfig) -> Result<Self> {
        let reader_stream = stream.try_clone()?;
        Ok(Self {
            reader: FrameReader::with_config_stream(reader_stream, config.clone())?,
            writer: FrameWriter::with_config_stream(stream, config)?,
        })
    }

    fn exchange(&mut self, request: Request, ok: u16) -> Result<Bytes> {
        let command = request.command();
        let name = request.name();
        self.writer.send(command, &request.encode()?)?;
        let frame = self.reader.read_frame().map_err(|err| match err {
            FrameError::ConnectionClosed => {
                ServerError::Disconnected(format!("server closed the connection during {name}"))
            }
            other => ServerError::Frame(other),
        })?;
        debug!(request = name, response = frame.command, "response");

        if frame.command == ok {
            Ok(frame.payload)
        } else if frame.command == error_response_for(command) {
            let reply = ErrorReply::decode(&frame.payload);
            Err(ServerError::Remote {
                code: reply.code,
                message: reply.message,
            })
        } else {
            Err(ServerError::UnexpectedResponse {
                request: name,
                got: frame.command,
            })
        }
    }

    /// Define (or replace) the buffer's header; returns it as stored.
    pub fn put_header(&mut self, spec: &HeaderSpec) -> Result<Header> {
        let mut payload = self.exchange(Request::PutHeader(spec.clone()), PUT_OK)?;
        Ok(codec::decode_header(&mut payload)?)
    }

    pub fn get_header(&mut self) -> Result<Header> {
        let mut payload = self.exchange(Request::GetHeader, GET_OK)?;
        Ok(codec::decode_header(&mut payload)?)
    }

    /// Append samples; returns the buffer's new sample count.
    pub fn put_data(&mut self, block: &DataBlock) -> Result<u64> {
        let payload = self.exchange(Request::PutData(block.clone()), PUT_OK)?;
        Ok(decode_sample_count(payload)?)
    }

    /// Samples `[beg, end)`.
    pub fn get_data(&mut self, beg: u64, end: u64) -> Result<DataBlock> {
        self.fetch_data(Some(beg..end))
    }

    /// Every sample written so far.
    pub fn get_all_data(&mut self) -> Result<DataBlock> {
        self.fetch_data(None)
    }

    fn fetch_data(&mut self, range: Option<Range<u64>>) -> Result<DataBlock> {
        let mut payload = self.exchange(Request::GetData(range), GET_OK)?;
        Ok(codec::decode_data_block(&mut payload)?)
    }

    /// Append events; returns the indices they were given.
    pub fn put_events(&mut self, events: &[Event]) -> Result<Range<u64>> {
        let payload = self.exchange(Request::PutEvents(events.to_vec()), PUT_OK)?;
        Ok(decode_event_range(payload)?)
    }

    /// Events `[beg, end)`.
    pub fn get_events(&mut self, beg: u64, end: u64) -> Result<Vec<Event>> {
        self.fetch_events(Some(beg..end))
    }

    pub fn get_all_events(&mut self) -> Result<Vec<Event>> {
        self.fetch_events(None)
    }

    fn fetch_events(&mut self, range: Option<Range<u64>>) -> Result<Vec<Event>> {
        let payload = self.exchange(Request::GetEvents(range), GET_OK)?;
        Ok(codec::decode_events(payload)?)
    }

    /// Block until the buffer holds at least the threshold's samples and
    /// events, the header is replaced, or `timeout` passes.
    ///
    /// Timeouts longer than `u32::MAX` milliseconds are clamped.
    pub fn wait_data(&mut self, threshold: WaitThreshold, timeout: Duration) -> Result<WaitReply> {
        let payload = self.exchange(Request::WaitData { threshold, timeout }, WAIT_OK)?;
        Ok(WaitReply::decode(payload)?)
    }
}

impl std::fmt::Debug for BufferClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferClient")
            .field("peer", &self.writer.get_ref().peer_label())
            .finish()
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::os::unix::net::UnixStream;
    use std::sync::Arc;
    use std::thread;

    use rtbuffer_core::{BufferStore, DataType, ErrorCode};
    use rtbuffer_frame::{GET_HDR, PUT_HDR};

    use super::*;
    use crate::session::Session;

    fn connected() -> (BufferClient, thread::JoinHandle<Result<u64>>) {
        let (server, client) = UnixStream::pair().unwrap();
        let session = Session::new(
            "session-1",
            BufferStream::from_unix(server),
            Arc::new(BufferStore::default()),
            FrameConfig::default(),
        )
        .unwrap();
        let handle = thread::spawn(move || session.run());
        let client =
            BufferClient::from_stream(BufferStream::from_unix(client), FrameConfig::default())
                .unwrap();
        (client, handle)
    }

    #[test]
    fn remote_errors_carry_code() {
        let (mut client, _session) = connected();
        match client.get_header() {
            Err(ServerError::Remote { code, .. }) => assert_eq!(code, ErrorCode::NoHeader),
            other => panic!("expected remote error, got {other:?}"),
        }
    }

    #[test]
    fn header_events_roundtrip() {
        let (mut client, session) = connected();
        let header = client
            .put_header(&HeaderSpec::new(DataType::Uint8, 3, 64.0).with_chunks(&b"ab"[..]))
            .unwrap();
        assert_eq!(header.generation, 1);
        assert_eq!(client.get_header().unwrap(), header);

        let range = client
            .put_events(&[Event::new(0, "a", "1"), Event::new(1, "b", "2")])
            .unwrap();
        assert_eq!(range, 0..2);
        let events = client.get_all_events().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(client.get_events(1, 2).unwrap()[0].event_value.as_text(), Some("2"));

        drop(client);
        assert_eq!(session.join().unwrap().unwrap(), 5);
    }

    #[test]
    fn mismatched_response_is_reported() {
        let (server, client) = UnixStream::pair().unwrap();
        let fake = thread::spawn(move || {
            let stream = BufferStream::from_unix(server);
            let mut reader = FrameReader::new(stream.try_clone().unwrap());
            let mut writer = FrameWriter::new(stream);
            let frame = reader.read_frame().unwrap();
            assert_eq!(frame.command, GET_HDR);
            writer.send(PUT_HDR, &[]).unwrap();
        });
        let mut client =
            BufferClient::from_stream(BufferStream::from_unix(client), FrameConfig::default())
                .unwrap();
        assert!(matches!(
            client.get_header(),
            Err(ServerError::UnexpectedResponse { .. })
        ));
        fake.join().unwrap();
    }
}
