//! Stream transports for the rtbuffer protocol.
//!
//! Every connection, whatever its endpoint type, is handed out as a
//! [`BufferStream`]:
//! - TCP (`host:port`), the default for acquisition setups spread over hosts
//! - Unix domain sockets, for producer and consumers on the same machine
//!
//! This is the lowest layer of rtbuffer. Framing and the buffer protocol
//! live in the crates above.

pub mod error;
pub mod stream;
pub mod tcp;

#[cfg(unix)]
pub mod uds;

pub use error::{Result, TransportError};
pub use stream::BufferStream;
pub use tcp::{host_port, TcpEndpoint, DEFAULT_PORT};

#[cfg(unix)]
pub use uds::UnixDomainSocket;
