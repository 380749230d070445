//! framekv - a networked key-value store over framed binary messages
//!
//! Clients hold a persistent TCP connection and exchange binary-framed,
//! tagged-union encoded get/set requests and responses. The library
//! provides:
//! - A concurrent in-memory storage engine with optional WAL durability
//! - A binary frame codec and explicit request/response envelopes
//! - One independent session per connection with per-session error
//!   containment (no per-request error can take down the process)
//! - An async client speaking the same protocol

pub mod client;
pub mod error;
pub mod frame;
pub mod protocol;
pub mod router;
pub mod server;
mod session;
pub mod store;
pub mod wal;

pub use client::Client;
pub use error::{FrameError, KvError, Result};
pub use protocol::{ErrorCode, Request, Response};
pub use server::{Server, ServerConfig};
pub use store::{MemoryStore, Store};
