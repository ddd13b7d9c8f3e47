//! Primitive wire encodings.
//!
//! The protocol predates self-describing serialization formats, so every
//! field is hand-packed:
//!
//! - 64-bit unsigned values are two big-endian 32-bit halves; decoding
//!   reconstructs `high * 2^32 + low`.
//! - 128-bit identifiers zero-pad the high 64 bits and carry only the low
//!   64 bits. This is lossy and intentional: widening the format on one
//!   side only would break wire compatibility.
//! - Strings are "widened": each character is emitted as a zero byte
//!   followed by its byte value. This is not UTF-16: there are no
//!   surrogate pairs, so only characters up to U+00FF are representable.
//! - A *sized string* is a 4-byte big-endian byte length followed by the
//!   widened bytes.
//!
//! Decoding is strict: any declared length that exceeds the remaining
//! buffer is a [`GrailError::Decode`], never an out-of-bounds read or a
//! silent truncation. [`WireReader`] enforces this for every primitive.

use bytes::BufMut;

use crate::error::{GrailError, Result};

/// Append a big-endian u32.
#[inline]
pub fn put_u32(buf: &mut Vec<u8>, val: u32) {
    buf.put_u32(val);
}

/// Append a u64 as two big-endian 32-bit halves.
#[inline]
pub fn put_u64(buf: &mut Vec<u8>, val: u64) {
    buf.put_u32((val >> 32) as u32);
    buf.put_u32(val as u32);
}

/// Append a u128 as eight zero bytes followed by its low 64 bits.
///
/// Values above `u64::MAX` lose their high bits on the wire.
#[inline]
pub fn put_u128(buf: &mut Vec<u8>, val: u128) {
    buf.put_u64(0);
    put_u64(buf, val as u64);
}

/// Widen a string: a zero byte before each character byte.
///
/// Fails for characters outside the single-byte-per-code-unit domain.
pub fn widen_str(s: &str) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(s.len() * 2);
    for c in s.chars() {
        let code = c as u32;
        if code > 0xFF {
            return Err(GrailError::Encode(format!(
                "character {c:?} is outside the widened string domain"
            )));
        }
        out.push(0);
        out.push(code as u8);
    }
    Ok(out)
}

/// Append a widened (unsized) string.
pub fn put_widened(buf: &mut Vec<u8>, s: &str) -> Result<()> {
    buf.extend_from_slice(&widen_str(s)?);
    Ok(())
}

/// Append a sized string: 4-byte big-endian byte length, then the widened
/// bytes.
pub fn put_sized_str(buf: &mut Vec<u8>, s: &str) -> Result<()> {
    let widened = widen_str(s)?;
    buf.put_u32(widened.len() as u32);
    buf.extend_from_slice(&widened);
    Ok(())
}

/// Wire size of a sized string, in bytes.
#[inline]
pub fn sized_len(s: &str) -> usize {
    4 + s.chars().count() * 2
}

/// Decode a widened byte run back into a string.
///
/// The high byte of each pair is assumed zero and ignored, matching the
/// encoder. An odd byte count is malformed.
pub fn decode_widened(bytes: &[u8]) -> Result<String> {
    if bytes.len() % 2 != 0 {
        return Err(GrailError::Decode(format!(
            "widened string has odd byte count {}",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(2)
        .map(|pair| char::from(pair[1]))
        .collect())
}

/// Consume one sized string from the front of a buffer, returning the
/// string and the remainder.
///
/// A zero-length field yields an empty string and the buffer past the
/// length prefix.
pub fn split_uri(buf: &[u8]) -> Result<(String, &[u8])> {
    let mut reader = WireReader::new(buf);
    let uri = reader.sized_str()?;
    Ok((uri, reader.rest()))
}

/// Bounds-checked cursor over a received payload.
///
/// Every read either yields a value or fails with a decode error naming
/// what was truncated; no method ever reads past the end of the buffer.
#[derive(Debug, Clone)]
pub struct WireReader<'a> {
    buf: &'a [u8],
}

impl<'a> WireReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    /// Bytes not yet consumed.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Consume `len` raw bytes.
    pub fn take(&mut self, len: usize, what: &str) -> Result<&'a [u8]> {
        if self.buf.len() < len {
            return Err(GrailError::Decode(format!(
                "{what}: need {len} bytes, {} remain",
                self.buf.len()
            )));
        }
        let (head, rest) = self.buf.split_at(len);
        self.buf = rest;
        Ok(head)
    }

    pub fn u8(&mut self, what: &str) -> Result<u8> {
        Ok(self.take(1, what)?[0])
    }

    pub fn u32(&mut self, what: &str) -> Result<u32> {
        let b = self.take(4, what)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Two big-endian 32-bit halves, `high * 2^32 + low`.
    pub fn u64(&mut self, what: &str) -> Result<u64> {
        let high = self.u32(what)?;
        let low = self.u32(what)?;
        Ok(u64::from(high) << 32 | u64::from(low))
    }

    /// 128-bit identifier: the high 64 bits are padding and discarded.
    pub fn u128(&mut self, what: &str) -> Result<u128> {
        self.take(8, what)?;
        Ok(u128::from(self.u64(what)?))
    }

    /// Big-endian double (aggregator timestamps).
    pub fn f64(&mut self, what: &str) -> Result<f64> {
        let b = self.take(8, what)?;
        Ok(f64::from_be_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }

    /// Big-endian float (aggregator signal strength).
    pub fn f32(&mut self, what: &str) -> Result<f32> {
        let b = self.take(4, what)?;
        Ok(f32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// One sized string: 4-byte length, then that many widened bytes.
    pub fn sized_str(&mut self) -> Result<String> {
        let len = self.u32("sized string length")? as usize;
        if len == 0 {
            return Ok(String::new());
        }
        let bytes = self.take(len, "sized string body")?;
        decode_widened(bytes)
    }

    /// Everything left, consuming the reader.
    pub fn rest(self) -> &'a [u8] {
        self.buf
    }
}
