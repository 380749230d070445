//! Wire envelope definitions for framekv
//!
//! Requests and responses are explicit sum types so that every operation is
//! matched exhaustively; an envelope that fits neither variant is an error
//! value, never a silent nil case.

use crate::error::{KvError, Result};
use serde::{Deserialize, Serialize};

/// Request envelope: exactly one operation per message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Request {
    Set { key: String, value: String },
    Get { key: String },
}

/// Response envelope, mirroring the request variant that produced it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Response {
    Set,
    Get { key: String, value: String },
    Error { code: ErrorCode, message: String },
}

/// Machine-readable error classification carried in `Response::Error`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    KeyNotFound,
    UnknownRequestType,
    Malformed,
}

impl Response {
    /// Build an error response from a code and a human-readable message
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Response::Error {
            code,
            message: message.into(),
        }
    }
}

/// Serialize a request envelope into frame payload bytes
pub fn encode_request(request: &Request) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(request)?)
}

/// Decode a request envelope from frame payload bytes.
///
/// Distinguishes two failure classes: payload that parses but matches no
/// known request variant yields `KvError::UnknownRequestType` (the client is
/// told and the connection stays usable), while payload that is not even
/// well-formed yields a serialization error (framing trust is lost and the
/// session closes).
pub fn decode_request(bytes: &[u8]) -> Result<Request> {
    match serde_json::from_slice(bytes) {
        Ok(request) => Ok(request),
        Err(err) if err.is_data() => Err(KvError::UnknownRequestType),
        Err(err) => Err(err.into()),
    }
}

/// Serialize a response envelope into frame payload bytes
pub fn encode_response(response: &Response) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(response)?)
}

/// Decode a response envelope from frame payload bytes
pub fn decode_response(bytes: &[u8]) -> Result<Response> {
    Ok(serde_json::from_slice(bytes)?)
}
