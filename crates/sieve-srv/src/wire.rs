//! DNS message framing and response metadata helpers.

use hickory_proto::op::Message;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::SrvError;

/// `Cache-Control` max-age when a response carries no records.
pub const DEFAULT_MAX_AGE: u32 = 3600;

/// Lower bound on the advertised max-age.
pub const MIN_MAX_AGE: u32 = 10;

/// Read one length-prefixed DNS message (RFC 1035 section 4.2.2).
///
/// Returns `Ok(None)` on a clean EOF before the length prefix.
pub async fn read_frame<R>(reader: &mut R) -> crate::Result<Option<Vec<u8>>>
where
    R: AsyncRead + Unpin,
{
    let mut len = [0u8; 2];
    match reader.read_exact(&mut len).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = usize::from(u16::from_be_bytes(len));
    if len == 0 {
        return Err(SrvError::Wire("zero-length frame".into()));
    }

    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).await?;
    Ok(Some(buf))
}

/// Write one length-prefixed DNS message and flush.
pub async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> crate::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let len = u16::try_from(payload.len())
        .map_err(|_| SrvError::Wire(format!("message too large: {} bytes", payload.len())))?;
    let mut frame = Vec::with_capacity(payload.len() + 2);
    frame.extend_from_slice(&len.to_be_bytes());
    frame.extend_from_slice(payload);
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

/// Decode a DNS message.
pub fn decode(bytes: &[u8]) -> crate::Result<Message> {
    Message::from_vec(bytes).map_err(|e| SrvError::Wire(format!("malformed DNS message: {e}")))
}

/// Encode a DNS message.
pub fn encode(message: &Message) -> crate::Result<Vec<u8>> {
    message
        .to_vec()
        .map_err(|e| SrvError::Wire(format!("cannot encode DNS message: {e}")))
}

/// Max-age for an HTTP response carrying `message`.
///
/// Smallest TTL across the answer, authority and additional sections,
/// [`DEFAULT_MAX_AGE`] when there are none, never below [`MIN_MAX_AGE`].
#[must_use]
pub fn cache_control_max_age(message: &Message) -> u32 {
    message
        .answers()
        .iter()
        .chain(message.name_servers())
        .chain(message.additionals())
        .map(hickory_proto::rr::Record::ttl)
        .min()
        .unwrap_or(DEFAULT_MAX_AGE)
        .max(MIN_MAX_AGE)
}
