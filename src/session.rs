//! Per-connection session handling
//!
//! A session owns one client's transport channel exclusively and runs the
//! request loop: read one binary frame, decode the request envelope,
//! dispatch, write the response frame. Errors are contained to the session:
//! a missing key or unrecognized request answers the client and keeps the
//! connection open, loss of framing trust or a transport failure closes
//! this session only, with the reason recorded for observability.

use crate::error::{FrameError, KvError};
use crate::frame;
use crate::protocol::{self, ErrorCode, Response};
use crate::router;
use crate::server::SessionRegistry;
use crate::store::MemoryStore;
use log::{debug, error, info, warn};
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncWrite, BufReader, BufWriter};
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tokio::time::timeout;

/// Why a session left its active loop
#[derive(Debug)]
pub(crate) enum CloseReason {
    ClientDisconnect,
    IdleTimeout,
    Shutdown,
    UnsupportedFrame(u8),
    MalformedFrame(FrameError),
    MalformedEnvelope(String),
    Transport(String),
    Engine(String),
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseReason::ClientDisconnect => write!(f, "client disconnected"),
            CloseReason::IdleTimeout => write!(f, "idle timeout"),
            CloseReason::Shutdown => write!(f, "server shutting down"),
            CloseReason::UnsupportedFrame(kind) => {
                write!(f, "unsupported frame kind 0x{:02x}", kind)
            }
            CloseReason::MalformedFrame(err) => write!(f, "malformed frame: {}", err),
            CloseReason::MalformedEnvelope(msg) => write!(f, "malformed envelope: {}", msg),
            CloseReason::Transport(msg) => write!(f, "transport error: {}", msg),
            CloseReason::Engine(msg) => write!(f, "storage engine failure: {}", msg),
        }
    }
}

/// One client connection, from accept to close
pub(crate) struct Session {
    id: u64,
    peer: SocketAddr,
    stream: TcpStream,
    store: Arc<MemoryStore>,
    registry: SessionRegistry,
    idle_timeout: Duration,
}

impl Session {
    pub(crate) fn new(
        id: u64,
        peer: SocketAddr,
        stream: TcpStream,
        store: Arc<MemoryStore>,
        registry: SessionRegistry,
        idle_timeout: Duration,
    ) -> Self {
        Self {
            id,
            peer,
            stream,
            store,
            registry,
            idle_timeout,
        }
    }

    /// Drive the session to completion and deregister it.
    ///
    /// Every exit path funnels through here, so the registry entry is
    /// released no matter how the serve loop ends.
    pub(crate) async fn run(mut self, shutdown_rx: broadcast::Receiver<()>) {
        let reason = self.serve(shutdown_rx).await;

        match &reason {
            CloseReason::ClientDisconnect | CloseReason::Shutdown => {
                debug!("session {} ({}) closed: {}", self.id, self.peer, reason)
            }
            CloseReason::IdleTimeout => {
                info!("session {} ({}) closed: {}", self.id, self.peer, reason)
            }
            _ => warn!("session {} ({}) closed: {}", self.id, self.peer, reason),
        }

        self.registry.write().await.remove(&self.id);
    }

    async fn serve(&mut self, mut shutdown_rx: broadcast::Receiver<()>) -> CloseReason {
        let idle_timeout = self.idle_timeout;
        let (read_half, write_half) = self.stream.split();
        let mut reader = BufReader::new(read_half);
        let mut writer = BufWriter::new(write_half);

        loop {
            let payload = tokio::select! {
                result = timeout(idle_timeout, frame::read_frame(&mut reader)) => match result {
                    Err(_) => return CloseReason::IdleTimeout,
                    Ok(Ok(Some(payload))) => payload,
                    Ok(Ok(None)) => return CloseReason::ClientDisconnect,
                    Ok(Err(KvError::Frame(err))) => {
                        // Tell the client why before dropping the connection
                        let response = Response::error(ErrorCode::Malformed, err.to_string());
                        let _ = send_response(&mut writer, &response).await;
                        return match err {
                            FrameError::UnsupportedKind(kind) => CloseReason::UnsupportedFrame(kind),
                            other => CloseReason::MalformedFrame(other),
                        };
                    }
                    Ok(Err(err)) => return CloseReason::Transport(err.to_string()),
                },
                _ = shutdown_rx.recv() => return CloseReason::Shutdown,
            };

            let request = match protocol::decode_request(&payload) {
                Ok(request) => request,
                Err(KvError::UnknownRequestType) => {
                    // Recoverable: answer and keep serving this client
                    let response =
                        Response::error(ErrorCode::UnknownRequestType, "unknown request type");
                    if let Err(err) = send_response(&mut writer, &response).await {
                        return CloseReason::Transport(err.to_string());
                    }
                    continue;
                }
                Err(err) => {
                    let response = Response::error(
                        ErrorCode::Malformed,
                        format!("malformed request envelope: {}", err),
                    );
                    let _ = send_response(&mut writer, &response).await;
                    return CloseReason::MalformedEnvelope(err.to_string());
                }
            };

            debug!("session {}: {:?}", self.id, request);

            let response = match router::dispatch(self.store.as_ref(), request).await {
                Ok(response) => response,
                Err(err) => {
                    error!("session {}: storage engine failure: {}", self.id, err);
                    return CloseReason::Engine(err.to_string());
                }
            };

            if let Err(err) = send_response(&mut writer, &response).await {
                return CloseReason::Transport(err.to_string());
            }
        }
    }
}

/// Encode a response envelope and write it as one binary frame
async fn send_response<W>(writer: &mut W, response: &Response) -> crate::error::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let payload = protocol::encode_response(response)?;
    frame::write_frame(writer, &payload).await
}
