//! The buffer engine behind rtbuffer.
//!
//! - [`datatype`]: element datatype tags and their widths
//! - [`model`]: headers, sample blocks and events
//! - [`codec`]: little-endian binary encoding of the model
//! - [`store`]: the shared append-only buffer
//! - [`wait`]: blocking waits on sample/event thresholds
//!
//! Nothing here performs network I/O; the server crate drives it.

pub mod codec;
pub mod config;
pub mod datatype;
pub mod error;
pub mod model;
pub mod store;
pub mod wait;

pub use config::StoreConfig;
pub use datatype::{width_of, DataType, Element};
pub use error::{ErrorCode, Result, StoreError};
pub use model::{Counts, DataBlock, Event, EventField, Header, HeaderSpec};
pub use store::BufferStore;
pub use wait::{WaitCoordinator, WaitOutcome, WaitResult, WaitThreshold};
