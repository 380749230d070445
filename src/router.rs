//! Request routing: decode-side dispatch from envelope to storage operation
//!
//! Pure dispatch logic: one storage call and one response per request, no
//! retained state. A lookup miss becomes a typed error response for the
//! client, never a failure of the serving process.

use crate::error::Result;
use crate::protocol::{ErrorCode, Request, Response};
use crate::store::Store;

/// Dispatch one request against the storage engine and build its response.
///
/// Client-facing conditions (a missing key) come back as `Response::Error`;
/// an `Err` from this function means the engine itself failed (for example a
/// WAL write error) and the caller decides what to do with the session.
pub async fn dispatch<S: Store>(store: &S, request: Request) -> Result<Response> {
    match request {
        Request::Set { key, value } => {
            store.set(key, value).await?;
            Ok(Response::Set)
        }
        Request::Get { key } => match store.get(&key).await? {
            Some(value) => Ok(Response::Get { key, value }),
            None => Ok(Response::error(
                ErrorCode::KeyNotFound,
                format!("key not found: {}", key),
            )),
        },
    }
}
