//! Transport module - length-prefixed framing and the version handshake.
//!
//! The transport treats the socket as an opaque reliable byte stream.
//! Everything here is generic over `AsyncRead`/`AsyncWrite` so tests can
//! drive connections over `tokio::io::duplex`.

mod framing;
mod handshake;

pub use framing::{read_frame, write_frame};
pub use handshake::{await_handshake, handshake_bytes, initiate_handshake};
