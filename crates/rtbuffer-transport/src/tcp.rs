use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::stream::BufferStream;

/// Port the buffer listens on when none is given.
pub const DEFAULT_PORT: u16 = 1972;

/// TCP transport.
///
/// Provides bind/accept/connect over `host:port` addresses.
pub struct TcpEndpoint {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl TcpEndpoint {
    /// Bind and listen on the given address (`"0.0.0.0:1972"`, `"localhost:0"`, ...).
    pub fn bind(addr: &str) -> Result<Self> {
        let listener = TcpListener::bind(addr).map_err(|e| TransportError::BindAddr {
            addr: addr.to_string(),
            source: e,
        })?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| TransportError::BindAddr {
                addr: addr.to_string(),
                source: e,
            })?;

        info!(%local_addr, "listening on tcp");

        Ok(Self {
            listener,
            local_addr,
        })
    }

    /// Accept an incoming connection (blocking).
    pub fn accept(&self) -> Result<BufferStream> {
        let (stream, peer) = self.listener.accept().map_err(TransportError::Accept)?;
        debug!(%peer, "accepted connection");
        Ok(BufferStream::from_tcp(stream))
    }

    /// Connect to a listening buffer (blocking).
    pub fn connect(addr: &str) -> Result<BufferStream> {
        let stream = TcpStream::connect(addr).map_err(|e| TransportError::Connect {
            addr: addr.to_string(),
            source: e,
        })?;
        debug!(addr, "connected over tcp");
        Ok(BufferStream::from_tcp(stream))
    }

    /// Connect, giving up after `timeout` per resolved address.
    pub fn connect_timeout(addr: &str, timeout: Duration) -> Result<BufferStream> {
        let addrs = addr.to_socket_addrs().map_err(|e| TransportError::Connect {
            addr: addr.to_string(),
            source: e,
        })?;

        let mut last_err = std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "address resolved to nothing",
        );
        for resolved in addrs {
            match TcpStream::connect_timeout(&resolved, timeout) {
                Ok(stream) => {
                    debug!(addr, %resolved, "connected over tcp");
                    return Ok(BufferStream::from_tcp(stream));
                }
                Err(err) => last_err = err,
            }
        }

        Err(TransportError::Connect {
            addr: addr.to_string(),
            source: last_err,
        })
    }

    /// The address actually bound (resolves port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        "tcp"
    }
}

/// Join a host and port into a connectable address, bracketing IPv6 literals.
pub fn host_port(host: &str, port: u16) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}
