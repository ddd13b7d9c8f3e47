//! The plaintext version handshake that precedes normal framing.
//!
//! Each side sends `len(protocol_string)[4B] + protocol_string +
//! version[2B]` and reads back the same byte count from the peer. The two
//! buffers are compared byte-for-byte; any difference is reported as
//! [`GrailError::HandshakeMismatch`] with the offending offset. The caller
//! decides what to do with the socket; a mismatch marks the connection
//! not-connected but does not tear the stream down.
//!
//! Clients and solver→world-model connections send first and then read;
//! aggregator and distributor connections read first and then send.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{GrailError, Result};
use crate::protocol::control::PROTOCOL_VERSION;

/// Build the handshake buffer for a protocol role string.
pub fn handshake_bytes(protocol: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(4 + protocol.len() + 2);
    buf.extend_from_slice(&(protocol.len() as u32).to_be_bytes());
    buf.extend_from_slice(protocol.as_bytes());
    buf.extend_from_slice(&PROTOCOL_VERSION.to_be_bytes());
    buf
}

/// Send our handshake, then read and verify the peer's.
pub async fn initiate_handshake<S>(stream: &mut S, protocol: &str) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let ours = handshake_bytes(protocol);
    stream.write_all(&ours).await?;
    stream.flush().await?;
    read_and_compare(stream, &ours).await
}

/// Read and verify the peer's handshake, then send ours.
pub async fn await_handshake<S>(stream: &mut S, protocol: &str) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let ours = handshake_bytes(protocol);
    read_and_compare(stream, &ours).await?;
    stream.write_all(&ours).await?;
    stream.flush().await?;
    Ok(())
}

async fn read_and_compare<S>(stream: &mut S, ours: &[u8]) -> Result<()>
where
    S: AsyncRead + Unpin,
{
    let mut theirs = vec![0u8; ours.len()];
    stream.read_exact(&mut theirs).await?;

    for (offset, (sent, received)) in ours.iter().zip(theirs.iter()).enumerate() {
        if sent != received {
            tracing::warn!(offset, sent = *sent, received = *received, "handshake mismatch");
            return Err(GrailError::HandshakeMismatch { offset });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::control::CLIENT_PROTOCOL;
    use tokio::io::duplex;

    #[test]
    fn test_handshake_bytes_layout() {
        let buf = handshake_bytes("abc");
        assert_eq!(buf, [0, 0, 0, 3, b'a', b'b', b'c', 0, 0]);
    }

    #[tokio::test]
    async fn test_matching_handshake() {
        let (mut client, mut server) = duplex(256);

        let server_task = tokio::spawn(async move {
            await_handshake(&mut server, CLIENT_PROTOCOL).await
        });

        initiate_handshake(&mut client, CLIENT_PROTOCOL).await.unwrap();
        server_task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_mismatched_byte_reports_offset() {
        let (mut client, mut server) = duplex(256);

        let mut reply = handshake_bytes(CLIENT_PROTOCOL);
        let flipped = reply.len() - 1;
        reply[flipped] = 9;

        let server_task = tokio::spawn(async move {
            let mut buf = vec![0u8; reply.len()];
            server.read_exact(&mut buf).await.unwrap();
            server.write_all(&reply).await.unwrap();
            server.flush().await.unwrap();
            // Keep the stream open so the failure is not an I/O error.
            server
        });

        let err = initiate_handshake(&mut client, CLIENT_PROTOCOL)
            .await
            .unwrap_err();
        match err {
            GrailError::HandshakeMismatch { offset } => assert_eq!(offset, flipped),
            other => panic!("expected handshake mismatch, got {other}"),
        }
        server_task.await.unwrap();
    }
}
