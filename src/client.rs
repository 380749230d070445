//! Client library for connecting to a framekv server
//!
//! Speaks the same binary frame and envelope encoding as the server, with
//! strict one-request-one-response pairing.

use crate::error::{KvError, Result};
use crate::frame;
use crate::protocol::{self, ErrorCode, Request, Response};
use tokio::io::{BufReader, BufWriter};
use tokio::net::TcpStream;

/// Client for connecting to a framekv server
pub struct Client {
    reader: BufReader<tokio::net::tcp::OwnedReadHalf>,
    writer: BufWriter<tokio::net::tcp::OwnedWriteHalf>,
}

impl Client {
    /// Connect to a framekv server
    pub async fn connect(addr: &str) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        let (read_half, write_half) = stream.into_split();

        Ok(Self {
            reader: BufReader::new(read_half),
            writer: BufWriter::new(write_half),
        })
    }

    /// Send one request frame and read the matching response frame
    async fn round_trip(&mut self, request: &Request) -> Result<Response> {
        let payload = protocol::encode_request(request)?;
        frame::write_frame(&mut self.writer, &payload).await?;

        match frame::read_frame(&mut self.reader).await? {
            Some(payload) => protocol::decode_response(&payload),
            None => Err(KvError::Client(
                "server closed the connection".to_string(),
            )),
        }
    }

    /// Set a key-value pair
    pub async fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let request = Request::Set {
            key: key.to_string(),
            value: value.to_string(),
        };

        match self.round_trip(&request).await? {
            Response::Set => Ok(()),
            Response::Error { message, .. } => Err(KvError::Server(message)),
            other => Err(KvError::Client(format!(
                "unexpected response for SET: {:?}",
                other
            ))),
        }
    }

    /// Get a value by key, `None` if the key is absent
    pub async fn get(&mut self, key: &str) -> Result<Option<String>> {
        let request = Request::Get {
            key: key.to_string(),
        };

        match self.round_trip(&request).await? {
            Response::Get { value, .. } => Ok(Some(value)),
            Response::Error {
                code: ErrorCode::KeyNotFound,
                ..
            } => Ok(None),
            Response::Error { message, .. } => Err(KvError::Server(message)),
            other => Err(KvError::Client(format!(
                "unexpected response for GET: {:?}",
                other
            ))),
        }
    }

    /// Close the connection
    pub async fn close(mut self) -> Result<()> {
        use tokio::io::AsyncWriteExt;
        self.writer.shutdown().await?;
        Ok(())
    }
}
