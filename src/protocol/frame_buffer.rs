//! Frame buffer for accumulating partial reads.
//!
//! Every message on the wire is a 4-byte big-endian payload length followed
//! by the payload, whose first byte is the control code. A single socket
//! read may return any fragment of that, so the reader loop feeds raw
//! chunks into this buffer and takes out whole frames.
//!
//! Uses `bytes::BytesMut` and a two-state machine:
//! - `WaitingForLength`: need the 4-byte prefix
//! - `WaitingForPayload`: prefix parsed, need N more payload bytes

use bytes::{Buf, BytesMut};

use super::Frame;
use crate::error::{GrailError, Result};

/// Length-prefix size in bytes.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Maximum accepted payload length. A frame claiming more than this is
/// treated as a decode error rather than an allocation request.
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

#[derive(Debug, Clone, Copy)]
enum State {
    WaitingForLength,
    WaitingForPayload { declared: usize },
}

/// Buffer for accumulating incoming bytes and extracting complete frames.
pub struct FrameBuffer {
    buffer: BytesMut,
    state: State,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(64 * 1024),
            state: State::WaitingForLength,
        }
    }

    /// Push data into the buffer and extract all complete frames.
    ///
    /// Partial data is kept internally for the next push. Returns an error
    /// on a zero-length or oversized frame declaration.
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<Frame>> {
        self.buffer.extend_from_slice(data);

        let mut frames = Vec::new();
        while let Some(frame) = self.try_extract_one()? {
            frames.push(frame);
        }
        Ok(frames)
    }

    fn try_extract_one(&mut self) -> Result<Option<Frame>> {
        match self.state {
            State::WaitingForLength => {
                if self.buffer.len() < LENGTH_PREFIX_SIZE {
                    return Ok(None);
                }

                let declared = self.buffer.get_u32() as usize;
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

                self.state = State::WaitingForPayload { declared };
                self.try_extract_one()
            }

            State::WaitingForPayload { declared } => {
                if self.buffer.len() < declared {
                    return Ok(None);
                }

                let mut payload = self.buffer.split_to(declared).freeze();
                let control = payload.split_to(1)[0];
                self.state = State::WaitingForLength;

                Ok(Some(Frame::new(control, payload)))
            }
        }
    }

    /// Buffered but not yet framed byte count.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}
