//! Codec module - the primitive wire encodings shared by every channel.
//!
//! All multi-byte integers on the wire are big endian. 64-bit values travel
//! as two 32-bit halves, 128-bit identifiers carry only their low 64 bits,
//! and strings use a naive widened encoding (one zero byte before each
//! character byte). See [`wire`] for the exact rules.

pub mod wire;

pub use wire::{
    decode_widened, put_sized_str, put_u128, put_u32, put_u64, put_widened, sized_len, split_uri,
    widen_str, WireReader,
};
