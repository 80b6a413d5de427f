//! One client connection.
//!
//! A session runs on its own thread and handles requests strictly one at a
//! time: `AwaitingRequest -> Processing -> Responding -> AwaitingRequest`,
//! until the peer hangs up or the transport fails (`Closed`). Bad requests
//! and buffer failures are answered with an error response and the session
//! carries on.

use std::sync::Arc;

use bytes::BytesMut;
use rtbuffer_core::codec;
use rtbuffer_core::{BufferStore, StoreError};
use rtbuffer_frame::command::error_response_for;
use rtbuffer_frame::{
    command_name, Frame, FrameConfig, FrameError, FrameReader, FrameWriter, GET_OK, PUT_OK,
    WAIT_OK,
};
use rtbuffer_transport::BufferStream;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::protocol::{encode_event_range, encode_sample_count, ErrorReply, Request, WaitReply};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    AwaitingRequest,
    Processing,
    Responding,
    Closed,
}

/// Request loop of a single connection.
pub struct Session {
    id: String,
    store: Arc<BufferStore>,
    reader: FrameReader<BufferStream>,
    writer: FrameWriter<BufferStream>,
    state: SessionState,
    served: u64,
}

impl Session {
    pub fn new(
        id: impl Into<String>,
        stream: BufferStream,
        store: Arc<BufferStore>,
        frame_config: FrameConfig,
    ) -> Result<Self> {
        let reader_stream = stream.try_clone()?;
        Ok(Self {
            id: id.into(),
            store,
            reader: FrameReader::with_config_stream(reader_stream, frame_config.clone())?,
            writer: FrameWriter::with_config_stream(stream, frame_config)?,
            state: SessionState::AwaitingRequest,
            served: 0,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Requests answered so far.
    pub fn served(&self) -> u64 {
        self.served
    }

    /// Serve requests until the peer disconnects.
    ///
    /// A clean hang-up (including one during a blocked wait) returns `Ok`
    /// with the number of requests answered; transport and framing failures
    /// return `Err`. Either way the session ends in `Closed`.
    pub fn run(mut self) -> Result<u64> {
        let peer = self.reader.get_ref().peer_label();
        debug!(session = %self.id, %peer, "session started");
        let result = self.serve();
        self.state = SessionState::Closed;
        match &result {
            Ok(served) => info!(session = %self.id, %peer, served, "session closed"),
            Err(err) => warn!(session = %self.id, %peer, error = %err, "session ended with error"),
        }
        result
    }

    fn serve(&mut self) -> Result<u64> {
        loop {
            self.state = SessionState::AwaitingRequest;
            let frame = match self.reader.read_frame() {
                Ok(frame) => frame,
                Err(FrameError::ConnectionClosed) if !self.reader.has_buffered() => {
                    return Ok(self.served)
                }
                Err(err) => return Err(err.into()),
            };

            self.state = SessionState::Processing;
            let Some(response) = self.process(&frame) else {
                debug!(session = %self.id, "peer left during wait");
                return Ok(self.served);
            };

            self.state = SessionState::Responding;
            self.writer.write_frame(&response)?;
            self.served += 1;
        }
    }

    /// Turn one request frame into its response frame.
    ///
    /// Returns `None` only when a wait was abandoned because the peer went
    /// away, in which case nothing should be sent.
    pub fn process(&self, frame: &Frame) -> Option<Frame> {
        let request = match Request::decode(frame) {
            Ok(request) => request,
            Err(reply) => return Some(self.error_frame(frame.command, reply)),
        };
        debug!(session = %self.id, request = request.name(), "request");

        match self.dispatch(request) {
            Ok(Some(response)) if !self.writer.fits(response.payload.len()) => {
                let err = StoreError::ResponseTooLarge {
                    size: response.payload.len() as u64,
                    max: self.writer.config().max_payload_size as u64,
                };
                Some(self.error_frame(frame.command, err.into()))
            }
            Ok(response) => response,
            Err(err) => Some(self.error_frame(frame.command, err.into())),
        }
    }

    fn error_frame(&self, request: u16, reply: ErrorReply) -> Frame {
        let command = error_response_for(request);
        debug!(
            session = %self.id,
            request = command_name(request),
            code = %reply.code,
            message = %reply.message,
            "request failed"
        );
        Frame::new(command, reply.encode())
    }

    fn dispatch(&self, request: Request) -> std::result::Result<Option<Frame>, StoreError> {
        let mut buf = BytesMut::new();
        let limit = self.writer.config().max_payload_size;
        let frame = match request {
            Request::PutHeader(spec) => {
                let header = self.store.put_header(spec)?;
                codec::encode_header(&header, &mut buf)?;
                Frame::new(PUT_OK, buf.freeze())
            }
            Request::PutData(block) => {
                let samples = self.store.put_data(&block)?;
                Frame::new(PUT_OK, encode_sample_count(samples))
            }
            Request::PutEvents(events) => {
                let range = self.store.put_events(events)?;
                Frame::new(PUT_OK, encode_event_range(&range))
            }
            Request::GetHeader => {
                codec::encode_header(&self.store.get_header()?, &mut buf)?;
                Frame::new(GET_OK, buf.freeze())
            }
            Request::GetData(range) => {
                let block = self.store.get_data_within(range, limit)?;
                codec::encode_data_block(&block, &mut buf);
                Frame::new(GET_OK, buf.freeze())
            }
            Request::GetEvents(range) => {
                let events = self.store.get_events_within(range, limit)?;
                codec::encode_events(&events, &mut buf)?;
                Frame::new(GET_OK, buf.freeze())
            }
            Request::WaitData { threshold, timeout } => {
                let stream = self.reader.get_ref();
                let result = self
                    .store
                    .wait_until(threshold, timeout, || stream.peer_closed())?;
                let Some(reply) = WaitReply::from_result(&result) else {
                    return Ok(None);
                };
                Frame::new(WAIT_OK, reply.encode())
            }
        };
        Ok(Some(frame))
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("served", &self.served)
            .finish()
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::os::unix::net::UnixStream;
    use std::thread;
    use std::time::{Duration, Instant};

    use rtbuffer_core::{DataBlock, DataType, ErrorCode, HeaderSpec, StoreConfig, WaitThreshold};
    use rtbuffer_frame::{GET_DAT, GET_ERR, GET_HDR, PUT_DAT, PUT_ERR, WAIT_ERR};

    use super::*;

    type ClientHalves = (FrameReader<BufferStream>, FrameWriter<BufferStream>);

    fn session_pair(store: Arc<BufferStore>) -> (Session, ClientHalves) {
        session_pair_with(store, FrameConfig::default())
    }

    fn session_pair_with(store: Arc<BufferStore>, config: FrameConfig) -> (Session, ClientHalves) {
        let (server, client) = UnixStream::pair().unwrap();
        let session = Session::new(
            "session-test",
            BufferStream::from_unix(server),
            store,
            config,
        )
        .unwrap();
        let client = BufferStream::from_unix(client);
        let reader = FrameReader::new(client.try_clone().unwrap());
        let writer = FrameWriter::new(client);
        (session, (reader, writer))
    }

    fn fast_store() -> Arc<BufferStore> {
        Arc::new(BufferStore::new(StoreConfig {
            wait_poll_interval_ms: 10,
            ..StoreConfig::default()
        }))
    }

    fn request(session: &Session, request: Request) -> Frame {
        session
            .process(&Frame::new(request.command(), request.encode().unwrap()))
            .unwrap()
    }

    #[test]
    fn errors_use_the_request_group() {
        let (session, _client) = session_pair(fast_store());

        let put = request(
            &session,
            Request::PutData(DataBlock::from_samples(1, &[1u8]).unwrap()),
        );
        assert_eq!(put.command, PUT_ERR);
        assert_eq!(ErrorReply::decode(&put.payload).code, ErrorCode::NoHeader);

        let get = request(&session, Request::GetHeader);
        assert_eq!(get.command, GET_ERR);

        let wait = request(
            &session,
            Request::WaitData {
                threshold: WaitThreshold::samples(1),
                timeout: Duration::ZERO,
            },
        );
        assert_eq!(wait.command, WAIT_ERR);
        assert_eq!(ErrorReply::decode(&wait.payload).code, ErrorCode::NoHeader);

        let unknown = session.process(&Frame::empty(0x0777)).unwrap();
        assert_eq!(unknown.command, GET_ERR);
        assert_eq!(
            ErrorReply::decode(&unknown.payload).code,
            ErrorCode::UnsupportedCommand
        );
    }

    #[test]
    fn put_and_get_through_dispatch() {
        let (session, _client) = session_pair(fast_store());

        let ok = request(
            &session,
            Request::PutHeader(HeaderSpec::new(DataType::Int16, 2, 512.0)),
        );
        assert_eq!(ok.command, PUT_OK);
        let header = codec::decode_header(&mut ok.payload.clone()).unwrap();
        assert_eq!(header.generation, 1);

        let ok = request(
            &session,
            Request::PutData(DataBlock::from_samples(2, &[1i16, 2, 3, 4]).unwrap()),
        );
        assert_eq!(crate::protocol::decode_sample_count(ok.payload).unwrap(), 2);

        let ok = request(&session, Request::GetData(None));
        assert_eq!(ok.command, GET_OK);
        let block = codec::decode_data_block(&mut ok.payload.clone()).unwrap();
        assert_eq!(block.to_vec::<i16>().unwrap(), vec![1, 2, 3, 4]);

        let err = request(&session, Request::GetData(Some(0..3)));
        assert_eq!(err.command, GET_ERR);
        assert_eq!(ErrorReply::decode(&err.payload).code, ErrorCode::RangeError);

        let err = request(
            &session,
            Request::PutData(DataBlock::from_samples(1, &[1i16]).unwrap()),
        );
        assert_eq!(ErrorReply::decode(&err.payload).code, ErrorCode::TypeMismatch);
    }

    #[test]
    fn run_answers_until_hangup() {
        let (session, (mut reader, mut writer)) = session_pair(fast_store());
        let server = thread::spawn(move || session.run());

        writer.send(GET_HDR, &[]).unwrap();
        assert_eq!(reader.read_frame().unwrap().command, GET_ERR);

        // corrupt payload keeps the session alive
        writer.send(PUT_DAT, b"nonsense").unwrap();
        let err = reader.read_frame().unwrap();
        assert_eq!(err.command, PUT_ERR);
        assert_eq!(
            ErrorReply::decode(&err.payload).code,
            ErrorCode::MalformedMessage
        );

        writer.send(GET_DAT, &[]).unwrap();
        assert_eq!(reader.read_frame().unwrap().command, GET_ERR);

        drop(writer);
        drop(reader);
        assert_eq!(server.join().unwrap().unwrap(), 3);
    }

    #[test]
    fn hangup_during_wait_cancels_it() {
        let store = fast_store();
        store
            .put_header(HeaderSpec::new(DataType::Float32, 1, 100.0))
            .unwrap();
        let (session, (reader, mut writer)) = session_pair(Arc::clone(&store));
        let server = thread::spawn(move || session.run());

        let wait = Request::WaitData {
            threshold: WaitThreshold::samples(1),
            timeout: Duration::from_secs(30),
        };
        writer.send(wait.command(), &wait.encode().unwrap()).unwrap();
        thread::sleep(Duration::from_millis(50));

        let started = Instant::now();
        drop(writer);
        drop(reader);
        assert_eq!(server.join().unwrap().unwrap(), 0);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    fn small_frames() -> FrameConfig {
        FrameConfig {
            max_payload_size: 64,
            ..FrameConfig::default()
        }
    }

    #[test]
    fn oversized_read_answered_with_error_and_session_survives() {
        let store = fast_store();
        store
            .put_header(HeaderSpec::new(DataType::Uint8, 1, 250.0))
            .unwrap();
        store
            .put_data(&DataBlock::from_samples(1, &[3u8; 50]).unwrap())
            .unwrap();
        let (session, (mut reader, mut writer)) = session_pair_with(store, small_frames());
        let server = thread::spawn(move || session.run());

        writer.send(GET_DAT, &[]).unwrap();
        let err = reader.read_frame().unwrap();
        assert_eq!(err.command, GET_ERR);
        assert_eq!(
            ErrorReply::decode(&err.payload).code,
            ErrorCode::ResponseTooLarge
        );

        let smaller = Request::GetData(Some(0..20));
        writer
            .send(smaller.command(), &smaller.encode().unwrap())
            .unwrap();
        let ok = reader.read_frame().unwrap();
        assert_eq!(ok.command, GET_OK);
        let block = codec::decode_data_block(&mut ok.payload.clone()).unwrap();
        assert_eq!(block.sample_count, 20);

        writer.send(GET_HDR, &[]).unwrap();
        assert_eq!(reader.read_frame().unwrap().command, GET_OK);

        drop(writer);
        drop(reader);
        assert_eq!(server.join().unwrap().unwrap(), 3);
    }

    #[test]
    fn oversized_header_reply_becomes_error() {
        let store = fast_store();
        store
            .put_header(HeaderSpec::new(DataType::Uint8, 1, 250.0).with_chunks(vec![0u8; 100]))
            .unwrap();
        let (session, _client) = session_pair_with(store, small_frames());

        let err = request(&session, Request::GetHeader);
        assert_eq!(err.command, GET_ERR);
        let reply = ErrorReply::decode(&err.payload);
        assert_eq!(reply.code, ErrorCode::ResponseTooLarge);
        assert!(reply.message.contains("64"));
    }

    #[test]
    fn bad_version_ends_session() {
        use std::io::Write;

        let (session, (_reader, writer)) = session_pair(fast_store());
        let server = thread::spawn(move || session.run());
        let mut raw = writer.into_inner();
        raw.write_all(&[9, 0, 0x01, 0x02, 0, 0, 0, 0]).unwrap();
        assert!(server.join().unwrap().is_err());
    }
}
