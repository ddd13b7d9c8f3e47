//! Frame struct shared by the reader loop and the transport helpers.
//!
//! A frame is one length-delimited message with the leading control code
//! already split off. Uses `bytes::Bytes` for zero-copy payload sharing.

use bytes::Bytes;

/// A complete protocol frame.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Control code, the first payload byte on the wire.
    pub control: u8,
    /// Everything after the control code.
    pub body: Bytes,
}

impl Frame {
    pub fn new(control: u8, body: Bytes) -> Self {
        Self { control, body }
    }

    /// Body length in bytes (control code excluded).
    #[inline]
    pub fn body_len(&self) -> usize {
        self.body.len()
    }
}
