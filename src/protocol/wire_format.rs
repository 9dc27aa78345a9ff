//! Wire format encoding and decoding.
//!
//! Every frame on the session socket is:
//! ```text
//! ┌──────────┬──────────┬─────────────────┐
//! │ Length   │ Type     │ Body            │
//! │ 4 bytes  │ 1 byte   │ length - 1 bytes│
//! │ uint32 BE│          │                 │
//! └──────────┴──────────┴─────────────────┘
//! ```
//!
//! `Length` counts the type byte and the body, never the prefix itself.

use crate::error::{CubeWireError, Result};

/// Protocol version spoken by this client. Handshakes must match exactly.
pub const PROTOCOL_VERSION: u32 = 1;

/// Size of the big-endian length prefix.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Length prefix plus the message type byte.
pub const FRAME_HEADER_SIZE: usize = LENGTH_PREFIX_SIZE + 1;

/// Hard upper bound for a frame length (100 MiB).
pub const MAX_FRAME_BYTES: u32 = 100 * 1024 * 1024;

/// Message type byte values.
///
/// Request/response pairs use adjacent values, query traffic lives in the
/// `0x1_` range and `Error` (`0xFF`) may answer any request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    HandshakeRequest = 0x01,
    HandshakeResponse = 0x02,
    AuthRequest = 0x03,
    AuthResponse = 0x04,
    QueryRequest = 0x10,
    QueryResponseSchema = 0x11,
    QueryResponseBatch = 0x12,
    QueryComplete = 0x13,
    Error = 0xFF,
}

impl MessageType {
    /// Map a raw type byte to a known message type.
    pub fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            0x01 => MessageType::HandshakeRequest,
            0x02 => MessageType::HandshakeResponse,
            0x03 => MessageType::AuthRequest,
            0x04 => MessageType::AuthResponse,
            0x10 => MessageType::QueryRequest,
            0x11 => MessageType::QueryResponseSchema,
            0x12 => MessageType::QueryResponseBatch,
            0x13 => MessageType::QueryComplete,
            0xFF => MessageType::Error,
            _ => return None,
        })
    }

    #[inline]
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            MessageType::HandshakeRequest => "HandshakeRequest",
            MessageType::HandshakeResponse => "HandshakeResponse",
            MessageType::AuthRequest => "AuthRequest",
            MessageType::AuthResponse => "AuthResponse",
            MessageType::QueryRequest => "QueryRequest",
            MessageType::QueryResponseSchema => "QueryResponseSchema",
            MessageType::QueryResponseBatch => "QueryResponseBatch",
            MessageType::QueryComplete => "QueryComplete",
            MessageType::Error => "Error",
        }
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}(0x{:02x})", self.name(), self.as_u8())
    }
}

/// Encode the 5-byte frame header for a body of `body_len` bytes.
///
/// Returns an error if the resulting frame length would exceed `max_frame_bytes`.
pub fn encode_frame_header(
    message_type: u8,
    body_len: usize,
    max_frame_bytes: u32,
) -> Result<[u8; FRAME_HEADER_SIZE]> {
    let length = body_len
        .checked_add(1)
        .and_then(|l| u32::try_from(l).ok())
        .unwrap_or(u32::MAX);
    validate_frame_length(length, max_frame_bytes)?;

    let mut buf = [0u8; FRAME_HEADER_SIZE];
    buf[..LENGTH_PREFIX_SIZE].copy_from_slice(&length.to_be_bytes());
    buf[LENGTH_PREFIX_SIZE] = message_type;
    Ok(buf)
}

/// Decode the big-endian length prefix.
#[inline]
pub fn decode_length_prefix(buf: [u8; LENGTH_PREFIX_SIZE]) -> u32 {
    u32::from_be_bytes(buf)
}

/// Check `0 < length <= max_frame_bytes`.
pub fn validate_frame_length(length: u32, max_frame_bytes: u32) -> Result<()> {
    if length == 0 || length > max_frame_bytes {
        return Err(CubeWireError::InvalidFrameLength {
            length,
            max: max_frame_bytes,
        });
    }
    Ok(())
}
