//! Protocol module - wire format, framing, and message types.
//!
//! This module implements the binary session protocol:
//! - 5-byte frame header (big-endian length + type byte)
//! - Frame struct with typed accessors
//! - Message enum with body encoding/decoding

mod frame;
mod message;
mod wire_format;

pub use frame::Frame;
pub use message::Message;
pub use wire_format::{
    decode_length_prefix, encode_frame_header, validate_frame_length, MessageType,
    FRAME_HEADER_SIZE, LENGTH_PREFIX_SIZE, MAX_FRAME_BYTES, PROTOCOL_VERSION,
};
