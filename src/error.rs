//! Error types for framekv

use std::io;
use thiserror::Error;

/// Result type alias for framekv operations
pub type Result<T> = std::result::Result<T, KvError>;

/// Custom error types for framekv
#[derive(Error, Debug)]
pub enum KvError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),

    #[error("Unknown request type")]
    UnknownRequestType,

    #[error("Server error: {0}")]
    Server(String),

    #[error("Client error: {0}")]
    Client(String),

    #[error("WAL error: {0}")]
    Wal(String),
}

/// Failures at the message framing layer.
///
/// Any of these means the byte stream can no longer be trusted, so the
/// session carrying it is closed. Other sessions are unaffected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("truncated frame header")]
    TruncatedHeader,

    #[error("unsupported frame kind 0x{0:02x}, only binary frames are accepted")]
    UnsupportedKind(u8),

    #[error("unknown frame kind 0x{0:02x}")]
    UnknownKind(u8),

    #[error("frame payload of {0} bytes exceeds the frame size limit")]
    Oversized(usize),
}
