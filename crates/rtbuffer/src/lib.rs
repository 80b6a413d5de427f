//! A real-time streaming buffer for multichannel samples and events.
//!
//! One producer writes a header and then appends sample blocks and events;
//! any number of consumers read slices of what has been written so far, or
//! block until a given amount of new data has arrived.
//!
//! # Crate Structure
//!
//! - [`transport`]: TCP and Unix domain socket streams
//! - [`frame`]: the 8-byte message envelope
//! - [`buffer`]: datatypes, binary records, the store and blocking waits
//! - [`server`]: server, sessions and the blocking client (behind `server` feature)

/// Re-export transport types.
pub mod transport {
    pub use rtbuffer_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use rtbuffer_frame::*;
}

/// Re-export buffer engine types.
pub mod buffer {
    pub use rtbuffer_core::*;
}

/// Re-export server and client types (requires `server` feature).
#[cfg(feature = "server")]
pub mod server {
    pub use rtbuffer_server::*;
}

pub use rtbuffer_core::{DataBlock, DataType, Event, Header, HeaderSpec, WaitOutcome, WaitThreshold};

#[cfg(feature = "server")]
pub use rtbuffer_server::{BufferClient, BufferServer, Endpoint, ServerConfig};
