//! Error types for grail-client.

use thiserror::Error;

/// Main error type for all client and solver operations.
#[derive(Debug, Error)]
pub enum GrailError {
    /// I/O error on the underlying socket.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The peer's handshake did not match ours byte-for-byte.
    ///
    /// The connection is marked unusable but the socket is left open.
    #[error("handshake mismatch at byte {offset}")]
    HandshakeMismatch { offset: usize },

    /// Malformed wire data: truncated length, unresolved alias,
    /// out-of-range count.
    #[error("decode error: {0}")]
    Decode(String),

    /// A value cannot be represented in the wire format.
    #[error("encode error: {0}")]
    Encode(String),

    /// A future/stream was polled for data when none was buffered.
    #[error("no buffered result for ticket {0}")]
    NoData(u32),

    /// The connection never completed its handshake or has been closed.
    #[error("not connected")]
    NotConnected,

    /// A failure recorded against one request ticket.
    #[error("request failed: {0}")]
    Request(#[from] RequestError),
}

/// Per-ticket failure, stored in the multiplexer's error table.
///
/// Unlike [`GrailError`] this is `Clone`: the non-blocking peeks hand out a
/// copy while the table keeps the original until the ticket is drained.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    /// A response frame for this ticket could not be decoded.
    #[error("decode failure: {0}")]
    Decode(String),

    /// The server reported a failure for this request.
    #[error("server error: {0}")]
    Protocol(String),

    /// The connection died while this request was pending.
    #[error("connection lost: {0}")]
    Transport(String),
}

/// Result type alias using GrailError.
pub type Result<T> = std::result::Result<T, GrailError>;
