//! Frame struct with typed accessors.
//!
//! A frame is one length-prefixed unit on the session socket. The payload
//! uses `bytes::Bytes` so that message bodies can be sliced without copying.
//!
//! # Example
//!
//! ```
//! use cubewire::protocol::{Frame, MessageType};
//! use bytes::Bytes;
//!
//! let frame = Frame::new(MessageType::QueryComplete.as_u8(), Bytes::from_static(&[0; 8]));
//! assert_eq!(frame.kind(), Some(MessageType::QueryComplete));
//! assert_eq!(frame.length(), 9);
//! ```

use bytes::Bytes;

use super::wire_format::{MessageType, FRAME_HEADER_SIZE};

/// A complete protocol frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Raw message type byte (may be unknown to this client).
    pub message_type: u8,
    /// Body bytes following the type byte.
    pub payload: Bytes,
}

impl Frame {
    pub fn new(message_type: u8, payload: Bytes) -> Self {
        Self {
            message_type,
            payload,
        }
    }

    /// Create a frame from raw bytes (copies data).
    pub fn from_parts(message_type: u8, payload: &[u8]) -> Self {
        Self::new(message_type, Bytes::copy_from_slice(payload))
    }

    /// Known message type, if any.
    #[inline]
    pub fn kind(&self) -> Option<MessageType> {
        MessageType::from_u8(self.message_type)
    }

    /// Value of the length prefix on the wire (type byte + body).
    #[inline]
    pub fn length(&self) -> usize {
        self.payload.len() + 1
    }

    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Total bytes on the wire including the prefix.
    #[inline]
    pub fn wire_size(&self) -> usize {
        FRAME_HEADER_SIZE + self.payload.len()
    }

    #[inline]
    pub fn is_error(&self) -> bool {
        self.message_type == MessageType::Error.as_u8()
    }
}
