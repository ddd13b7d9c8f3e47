//! Protocol module - control codes, framing, and message payloads.
//!
//! This module implements the GRAIL binary protocol proper:
//! - control-code tables for each channel
//! - frame buffer for accumulating partial reads
//! - request payload encoders and response payload decoders
//! - the alias tables that compress attribute/origin names on the wire

pub mod control;

mod alias;
mod frame;
mod frame_buffer;
pub mod request;
pub mod response;

pub use alias::{AliasRegistry, AliasTable};
pub use frame::Frame;
pub use frame_buffer::{FrameBuffer, LENGTH_PREFIX_SIZE, MAX_FRAME_LEN};
