use std::io::{Read, Write};
use std::net::TcpStream;
use std::time::Duration;

use crate::error::Result;

/// A connected buffer stream that implements Read + Write.
///
/// This is the I/O type returned by every transport. Sessions and clients
/// only ever see this type, never the concrete socket.
pub struct BufferStream {
    inner: BufferStreamInner,
}

enum BufferStreamInner {
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(std::os::unix::net::UnixStream),
}

impl Read for BufferStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            BufferStreamInner::Tcp(stream) => stream.read(buf),
            #[cfg(unix)]
            BufferStreamInner::Unix(stream) => stream.read(buf),
        }
    }
}

impl Write for BufferStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            BufferStreamInner::Tcp(stream) => stream.write(buf),
            #[cfg(unix)]
            BufferStreamInner::Unix(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.inner {
            BufferStreamInner::Tcp(stream) => stream.flush(),
            #[cfg(unix)]
            BufferStreamInner::Unix(stream) => stream.flush(),
        }
    }
}

impl BufferStream {
    /// Wrap a connected TCP stream.
    ///
    /// Nagle is disabled: requests are small and latency bound.
    pub fn from_tcp(stream: TcpStream) -> Self {
        let _ = stream.set_nodelay(true);
        Self {
            inner: BufferStreamInner::Tcp(stream),
        }
    }

    /// Wrap a connected Unix domain socket stream.
    #[cfg(unix)]
    pub fn from_unix(stream: std::os::unix::net::UnixStream) -> Self {
        Self {
            inner: BufferStreamInner::Unix(stream),
        }
    }

    /// Set read timeout on the underlying stream.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        match &self.inner {
            BufferStreamInner::Tcp(stream) => stream.set_read_timeout(timeout).map_err(Into::into),
            #[cfg(unix)]
            BufferStreamInner::Unix(stream) => stream.set_read_timeout(timeout).map_err(Into::into),
        }
    }

    /// Set write timeout on the underlying stream.
    pub fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        match &self.inner {
            BufferStreamInner::Tcp(stream) => stream.set_write_timeout(timeout).map_err(Into::into),
            #[cfg(unix)]
            BufferStreamInner::Unix(stream) => {
                stream.set_write_timeout(timeout).map_err(Into::into)
            }
        }
    }

    /// Try to clone this stream (creates a new file descriptor).
    pub fn try_clone(&self) -> Result<Self> {
        match &self.inner {
            BufferStreamInner::Tcp(stream) => Ok(Self {
                inner: BufferStreamInner::Tcp(stream.try_clone()?),
            }),
            #[cfg(unix)]
            BufferStreamInner::Unix(stream) => Ok(Self::from_unix(stream.try_clone()?)),
        }
    }

    /// Human-readable remote endpoint, for logs.
    pub fn peer_label(&self) -> String {
        match &self.inner {
            BufferStreamInner::Tcp(stream) => stream
                .peer_addr()
                .map(|addr| addr.to_string())
                .unwrap_or_else(|_| "tcp:unknown".to_string()),
            #[cfg(unix)]
            BufferStreamInner::Unix(_) => "unix".to_string(),
        }
    }

    /// Transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        match &self.inner {
            BufferStreamInner::Tcp(_) => "tcp",
            #[cfg(unix)]
            BufferStreamInner::Unix(_) => "unix-domain-socket",
        }
    }

    /// Probe whether the remote side has closed the connection.
    ///
    /// Never blocks and never consumes bytes: pending request bytes count as
    /// an open connection.
    #[cfg(unix)]
    pub fn peer_closed(&self) -> bool {
        use std::os::fd::AsRawFd;

        let fd = match &self.inner {
            BufferStreamInner::Tcp(stream) => stream.as_raw_fd(),
            BufferStreamInner::Unix(stream) => stream.as_raw_fd(),
        };

        let mut probe = [0u8; 1];
        // SAFETY: `probe` is a valid writable buffer of the given length and `fd`
        // is an open socket descriptor owned by this stream.
        let rc = unsafe {
            libc::recv(
                fd,
                probe.as_mut_ptr().cast::<libc::c_void>(),
                probe.len(),
                libc::MSG_PEEK | libc::MSG_DONTWAIT,
            )
        };

        match rc {
            0 => true,
            n if n > 0 => false,
            _ => {
                let err = std::io::Error::last_os_error();
                !matches!(
                    err.kind(),
                    std::io::ErrorKind::WouldBlock | std::io::ErrorKind::Interrupted
                )
            }
        }
    }

    /// Probe whether the remote side has closed the connection.
    #[cfg(not(unix))]
    pub fn peer_closed(&self) -> bool {
        let BufferStreamInner::Tcp(stream) = &self.inner;
        if stream.set_nonblocking(true).is_err() {
            return false;
        }
        let mut probe = [0u8; 1];
        let closed = match stream.peek(&mut probe) {
            Ok(0) => true,
            Ok(_) => false,
            Err(err) => !matches!(
                err.kind(),
                std::io::ErrorKind::WouldBlock | std::io::ErrorKind::Interrupted
            ),
        };
        let _ = stream.set_nonblocking(false);
        closed
    }
}

impl std::fmt::Debug for BufferStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferStream")
            .field("type", &self.transport_name())
            .finish()
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::io::{Read, Write};
    use std::os::unix::net::UnixStream;

    use super::*;

    #[test]
    fn open_idle_peer_is_not_closed() {
        let (left, _right) = UnixStream::pair().unwrap();
        let stream = BufferStream::from_unix(left);
        assert!(!stream.peer_closed());
    }

    #[test]
    fn dropped_peer_is_detected() {
        let (left, right) = UnixStream::pair().unwrap();
        let stream = BufferStream::from_unix(left);
        drop(right);
        assert!(stream.peer_closed());
    }

    #[test]
    fn pending_bytes_are_not_consumed_by_probe() {
        let (left, mut right) = UnixStream::pair().unwrap();
        let mut stream = BufferStream::from_unix(left);
        right.write_all(b"x").unwrap();

        assert!(!stream.peer_closed());
        let mut buf = [0u8; 1];
        stream.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"x");
    }

    #[test]
    fn debug_names_transport() {
        let (left, _right) = UnixStream::pair().unwrap();
        let stream = BufferStream::from_unix(left);
        assert!(format!("{stream:?}").contains("unix-domain-socket"));
    }
}
