//! One-shot frame I/O helpers.
//!
//! The client connection's reader loop uses a
//! [`FrameBuffer`](crate::protocol::FrameBuffer) over raw reads; the solver
//! connections exchange single frames at a time and use these helpers
//! instead. Reads loop until the declared length is fully received
//! (`read_exact`); a short read never yields a truncated frame.

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{GrailError, Result};
use crate::protocol::{Frame, MAX_FRAME_LEN};

/// Write one message: 4-byte big-endian payload length, then the payload.
///
/// The payload must already start with its control code.
pub async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(&(payload.len() as u32).to_be_bytes()).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one message and split off its control code.
pub async fn read_frame<R>(reader: &mut R) -> Result<Frame>
where
    R: AsyncRead + Unpin,
{
    let mut prefix = [0u8; 4];
    reader.read_exact(&mut prefix).await?;

    let declared = u32::from_be_bytes(prefix) as usize;
    if declared == 0 {
        return Err(GrailError::Decode(
            "frame with zero-length payload".to_string(),
        ));
    }
    if declared > MAX_FRAME_LEN {
        return Err(GrailError::Decode(format!(
            "frame length {declared} exceeds maximum {MAX_FRAME_LEN}"
        )));
    }

    let mut payload = vec![0u8; declared];
    reader.read_exact(&mut payload).await?;

    let mut body = Bytes::from(payload);
    let control = body.split_to(1)[0];
    Ok(Frame::new(control, body))
}
