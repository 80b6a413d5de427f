//! Network side of rtbuffer: the server that owns a [`BufferStore`] and
//! answers framed requests, and the blocking client that talks to it.
//!
//! ```no_run
//! use rtbuffer_core::{DataBlock, DataType, HeaderSpec};
//! use rtbuffer_server::BufferClient;
//!
//! let mut client = BufferClient::connect("127.0.0.1:1972")?;
//! client.put_header(&HeaderSpec::new(DataType::Float32, 4, 1000.0))?;
//! client.put_data(&DataBlock::from_samples(4, &[0.0f32; 40])?)?;
//! # Ok::<(), rtbuffer_server::ServerError>(())
//! ```
//!
//! [`BufferStore`]: rtbuffer_core::BufferStore

pub mod client;
pub mod config;
pub mod error;
pub mod protocol;
pub mod server;
pub mod session;

pub use client::BufferClient;
pub use config::ServerConfig;
pub use error::{Result, ServerError};
pub use protocol::{ErrorReply, Request, WaitReply};
pub use server::{BufferServer, Endpoint, ShutdownHandle};
pub use session::{Session, SessionState};
