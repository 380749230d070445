//! Binary message framing for framekv
//!
//! Each message on the wire is one frame: a 1-byte frame kind, a u32
//! big-endian payload length, and the payload bytes. Only binary frames
//! carry envelopes; text frames are recognized and rejected, anything else
//! is malformed. The header is parsed with nom.

use crate::error::{FrameError, KvError, Result};
use nom::{
    number::complete::{be_u32, be_u8},
    sequence::tuple,
    IResult,
};
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Frame kind byte for binary payloads
pub const KIND_BINARY: u8 = 0x2;
/// Frame kind byte for text payloads (recognized, never accepted)
pub const KIND_TEXT: u8 = 0x1;

/// Wire size of a frame header: kind byte plus u32 payload length
pub const HEADER_LEN: usize = 5;

/// Upper bound on a single frame payload (16 MiB)
pub const MAX_PAYLOAD_LEN: usize = 16 * 1024 * 1024;

/// Raw header parser: kind byte followed by payload length
fn header_parser(input: &[u8]) -> IResult<&[u8], (u8, u32)> {
    tuple((be_u8, be_u32))(input)
}

/// Parse and validate a frame header, returning the payload length.
///
/// Rejects text frames with `FrameError::UnsupportedKind`, unrecognized kind
/// bytes with `FrameError::UnknownKind`, and lengths over `MAX_PAYLOAD_LEN`
/// with `FrameError::Oversized`.
pub fn parse_header(input: &[u8]) -> Result<usize> {
    let (_, (kind, len)) =
        header_parser(input).map_err(|_| KvError::Frame(FrameError::TruncatedHeader))?;

    match kind {
        KIND_BINARY => {}
        KIND_TEXT => return Err(FrameError::UnsupportedKind(kind).into()),
        other => return Err(FrameError::UnknownKind(other).into()),
    }

    let len = len as usize;
    if len > MAX_PAYLOAD_LEN {
        return Err(FrameError::Oversized(len).into());
    }

    Ok(len)
}

/// Read one binary frame, returning its payload.
///
/// Returns `Ok(None)` on a clean end of stream at a frame boundary. End of
/// stream in the middle of a frame is a transport error.
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Vec<u8>>>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; HEADER_LEN];
    match reader.read_exact(&mut header).await {
        Ok(_) => {}
        Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(err) => return Err(err.into()),
    }

    let len = parse_header(&header)?;

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    Ok(Some(payload))
}

/// Write one binary frame carrying the given payload and flush it
pub async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(FrameError::Oversized(payload.len()).into());
    }

    let mut header = [0u8; HEADER_LEN];
    header[0] = KIND_BINARY;
    header[1..].copy_from_slice(&(payload.len() as u32).to_be_bytes());

    writer.write_all(&header).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}
