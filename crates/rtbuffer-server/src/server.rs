//! Accept loop: one thread per connection, all sharing one store.

use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use rtbuffer_core::BufferStore;
use rtbuffer_transport::{BufferStream, TcpEndpoint, TransportError};
#[cfg(unix)]
use rtbuffer_transport::UnixDomainSocket;
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::error::Result;
use crate::session::Session;

/// Where a server listens or a client connects.
///
/// Parsed from `host:port`, `unix:/path/to.sock`, or a bare absolute path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Tcp(String),
    #[cfg(unix)]
    Unix(PathBuf),
}

impl Endpoint {
    pub fn tcp(addr: impl Into<String>) -> Self {
        Endpoint::Tcp(addr.into())
    }

    /// Open a client connection to this endpoint.
    pub fn connect(&self) -> Result<BufferStream> {
        let stream = match self {
            Endpoint::Tcp(addr) => TcpEndpoint::connect(addr)?,
            #[cfg(unix)]
            Endpoint::Unix(path) => UnixDomainSocket::connect(path)?,
        };
        Ok(stream)
    }
}

impl FromStr for Endpoint {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err("empty endpoint".to_string());
        }
        #[cfg(unix)]
        {
            if let Some(path) = s.strip_prefix("unix:") {
                return Ok(Endpoint::Unix(PathBuf::from(path)));
            }
            if s.starts_with('/') {
                return Ok(Endpoint::Unix(PathBuf::from(s)));
            }
        }
        Ok(Endpoint::Tcp(s.to_string()))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Tcp(addr) => f.write_str(addr),
            #[cfg(unix)]
            Endpoint::Unix(path) => write!(f, "unix:{}", path.display()),
        }
    }
}

enum Listener {
    Tcp(TcpEndpoint),
    #[cfg(unix)]
    Unix(UnixDomainSocket),
}

impl Listener {
    fn accept(&self) -> std::result::Result<BufferStream, TransportError> {
        match self {
            Listener::Tcp(endpoint) => endpoint.accept(),
            #[cfg(unix)]
            Listener::Unix(socket) => socket.accept(),
        }
    }

    /// Address a client on this host can reach the listener at.
    fn reachable(&self) -> Endpoint {
        match self {
            Listener::Tcp(endpoint) => {
                let mut addr = endpoint.local_addr();
                if addr.ip().is_unspecified() {
                    match addr {
                        SocketAddr::V4(_) => addr.set_ip(Ipv4Addr::LOCALHOST.into()),
                        SocketAddr::V6(_) => addr.set_ip(Ipv6Addr::LOCALHOST.into()),
                    }
                }
                Endpoint::Tcp(addr.to_string())
            }
            #[cfg(unix)]
            Listener::Unix(socket) => Endpoint::Unix(socket.path().to_path_buf()),
        }
    }
}

/// Stops a running [`BufferServer`] from another thread.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    running: Arc<AtomicBool>,
    wake: Endpoint,
}

impl ShutdownHandle {
    /// Stop accepting connections. Open sessions run until their peers
    /// disconnect.
    pub fn shutdown(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            // unblock the accept call
            let _ = self.wake.connect();
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// A buffer server: one store, many sessions.
pub struct BufferServer {
    listener: Listener,
    store: Arc<BufferStore>,
    config: ServerConfig,
    running: Arc<AtomicBool>,
    next_session: AtomicU64,
}

impl BufferServer {
    /// Bind to `endpoint` with a fresh, empty store.
    pub fn bind(endpoint: &Endpoint, config: ServerConfig) -> Result<Self> {
        let store = Arc::new(BufferStore::new(config.store.clone()));
        Self::bind_with_store(endpoint, config, store)
    }

    /// Bind to `endpoint`, serving an existing store.
    pub fn bind_with_store(
        endpoint: &Endpoint,
        config: ServerConfig,
        store: Arc<BufferStore>,
    ) -> Result<Self> {
        let listener = match endpoint {
            Endpoint::Tcp(addr) => Listener::Tcp(TcpEndpoint::bind(addr)?),
            #[cfg(unix)]
            Endpoint::Unix(path) => Listener::Unix(UnixDomainSocket::bind(path)?),
        };
        Ok(Self {
            listener,
            store,
            config,
            running: Arc::new(AtomicBool::new(true)),
            next_session: AtomicU64::new(1),
        })
    }

    pub fn store(&self) -> Arc<BufferStore> {
        Arc::clone(&self.store)
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Where clients on this host can connect (port 0 resolved).
    pub fn endpoint(&self) -> Endpoint {
        self.listener.reachable()
    }

    /// The bound TCP address, if listening on TCP.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        match &self.listener {
            Listener::Tcp(endpoint) => Some(endpoint.local_addr()),
            #[cfg(unix)]
            Listener::Unix(_) => None,
        }
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            running: Arc::clone(&self.running),
            wake: self.endpoint(),
        }
    }

    /// Accept connections until shut down, one session thread each.
    ///
    /// Failed accepts are logged and skipped; a single bad connection never
    /// stops the server.
    pub fn serve(self) -> Result<()> {
        info!(endpoint = %self.endpoint(), "buffer server running");
        while self.running.load(Ordering::SeqCst) {
            let stream = match self.listener.accept() {
                Ok(stream) => stream,
                Err(err) => {
                    if !self.running.load(Ordering::SeqCst) {
                        break;
                    }
                    warn!(error = %err, "accept failed");
                    continue;
                }
            };
            if !self.running.load(Ordering::SeqCst) {
                break;
            }
            self.spawn_session(stream);
        }
        info!("buffer server stopped");
        Ok(())
    }

    /// Run [`serve`](Self::serve) on a background thread.
    pub fn spawn(self) -> Result<(ShutdownHandle, JoinHandle<Result<()>>)> {
        let handle = self.shutdown_handle();
        let join = thread::Builder::new()
            .name("rtbuffer-accept".to_string())
            .spawn(move || self.serve())
            .map_err(TransportError::Io)?;
        Ok((handle, join))
    }

    fn spawn_session(&self, stream: BufferStream) {
        let id = format!(
            "session-{}",
            self.next_session.fetch_add(1, Ordering::Relaxed)
        );
        debug!(session = %id, peer = %stream.peer_label(), "accepted");
        let session = match Session::new(
            id.clone(),
            stream,
            Arc::clone(&self.store),
            self.config.frame_config(),
        ) {
            Ok(session) => session,
            Err(err) => {
                warn!(session = %id, error = %err, "session setup failed");
                return;
            }
        };
        let spawned = thread::Builder::new()
            .name(id.clone())
            .spawn(move || session.run());
        if let Err(err) = spawned {
            warn!(session = %id, error = %err, "could not start session thread");
        }
    }
}

impl fmt::Debug for BufferServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferServer")
            .field("endpoint", &self.endpoint())
            .field("running", &self.running.load(Ordering::SeqCst))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_endpoints() {
        assert_eq!(
            "127.0.0.1:1972".parse::<Endpoint>().unwrap(),
            Endpoint::tcp("127.0.0.1:1972")
        );
        #[cfg(unix)]
        {
            assert_eq!(
                "unix:/tmp/rtb.sock".parse::<Endpoint>().unwrap(),
                Endpoint::Unix(PathBuf::from("/tmp/rtb.sock"))
            );
            assert_eq!(
                "/tmp/rtb.sock".parse::<Endpoint>().unwrap(),
                Endpoint::Unix(PathBuf::from("/tmp/rtb.sock"))
            );
            assert_eq!(
                Endpoint::Unix(PathBuf::from("/tmp/rtb.sock")).to_string(),
                "unix:/tmp/rtb.sock"
            );
        }
        assert!("  ".parse::<Endpoint>().is_err());
    }

    #[test]
    fn unspecified_bind_is_reachable_on_loopback() {
        let server = BufferServer::bind(&Endpoint::tcp("0.0.0.0:0"), ServerConfig::default()).unwrap();
        let Endpoint::Tcp(addr) = server.endpoint() else {
            panic!("expected tcp endpoint");
        };
        assert!(addr.starts_with("127.0.0.1:"));
        assert_ne!(server.local_addr().unwrap().port(), 0);
    }

    #[test]
    fn shutdown_stops_accept_loop() {
        let server = BufferServer::bind(&Endpoint::tcp("127.0.0.1:0"), ServerConfig::default()).unwrap();
        let (handle, join) = server.spawn().unwrap();
        assert!(handle.is_running());
        handle.shutdown();
        join.join().unwrap().unwrap();
        assert!(!handle.is_running());
    }

    #[cfg(unix)]
    #[test]
    fn serves_over_unix_socket() {
        let dir = std::env::temp_dir().join(format!("rtb-srv-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("buffer.sock");

        let server = BufferServer::bind(&Endpoint::Unix(path.clone()), ServerConfig::default()).unwrap();
        let (handle, join) = server.spawn().unwrap();

        let mut client = crate::BufferClient::connect_endpoint(&Endpoint::Unix(path)).unwrap();
        assert!(client.get_header().is_err());
        drop(client);

        handle.shutdown();
        join.join().unwrap().unwrap();
        let _ = std::fs::remove_dir_all(dir);
    }
}
