//! Typed session messages.
//!
//! [`Message`] is the tagged union carried inside frames. `encode` produces
//! the body (without the frame header); `decode` parses a received frame.

use bytes::Bytes;

use super::frame::Frame;
use super::wire_format::MessageType;
use crate::codec::{BodyReader, BodyWriter};
use crate::error::DecodeError;

/// A decoded session protocol message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    HandshakeRequest { version: u32 },
    HandshakeResponse { version: u32, server_version: String },
    AuthRequest { token: String, database: String },
    AuthResponse { success: bool, session_id: String },
    QueryRequest { sql: String },
    /// Arrow IPC bytes for the result schema.
    QueryResponseSchema { ipc_schema: Bytes },
    /// Arrow IPC bytes for one or more record batches.
    QueryResponseBatch { ipc_batch: Bytes },
    /// `rows_affected == -1` means unknown or not applicable.
    QueryComplete { rows_affected: i64 },
    Error { code: String, message: String },
}

impl Message {
    pub fn message_type(&self) -> MessageType {
        match self {
            Message::HandshakeRequest { .. } => MessageType::HandshakeRequest,
            Message::HandshakeResponse { .. } => MessageType::HandshakeResponse,
            Message::AuthRequest { .. } => MessageType::AuthRequest,
            Message::AuthResponse { .. } => MessageType::AuthResponse,
            Message::QueryRequest { .. } => MessageType::QueryRequest,
            Message::QueryResponseSchema { .. } => MessageType::QueryResponseSchema,
            Message::QueryResponseBatch { .. } => MessageType::QueryResponseBatch,
            Message::QueryComplete { .. } => MessageType::QueryComplete,
            Message::Error { .. } => MessageType::Error,
        }
    }

    /// Size of the encoded body in bytes, without building it.
    pub fn encoded_len(&self) -> usize {
        fn field(len: usize) -> usize {
            4usize.saturating_add(len)
        }

        match self {
            Message::HandshakeRequest { .. } => 4,
            Message::HandshakeResponse { server_version, .. } => 4 + field(server_version.len()),
            Message::AuthRequest { token, database } => {
                field(token.len()).saturating_add(field(database.len()))
            }
            Message::AuthResponse { session_id, .. } => 1 + field(session_id.len()),
            Message::QueryRequest { sql } => field(sql.len()),
            Message::QueryResponseSchema { ipc_schema } => field(ipc_schema.len()),
            Message::QueryResponseBatch { ipc_batch } => field(ipc_batch.len()),
            Message::QueryComplete { .. } => 8,
            Message::Error { code, message } => {
                field(code.len()).saturating_add(field(message.len()))
            }
        }
    }

    /// Encode the message body.
    ///
    /// # Panics
    ///
    /// Panics if a string or byte field exceeds `u32::MAX` bytes. Use
    /// [`encoded_len`](Self::encoded_len) to check first;
    /// `FrameTransport::send` does.
    pub fn encode(&self) -> Bytes {
        let mut w = BodyWriter::new();
        match self {
            Message::HandshakeRequest { version } => {
                w.put_u32(*version);
            }
            Message::HandshakeResponse {
                version,
                server_version,
            } => {
                w.put_u32(*version).put_string(server_version);
            }
            Message::AuthRequest { token, database } => {
                w.put_string(token).put_string(database);
            }
            Message::AuthResponse {
                success,
                session_id,
            } => {
                w.put_bool(*success).put_string(session_id);
            }
            Message::QueryRequest { sql } => {
                w.put_string(sql);
            }
            Message::QueryResponseSchema { ipc_schema } => {
                w.put_bytes(ipc_schema);
            }
            Message::QueryResponseBatch { ipc_batch } => {
                w.put_bytes(ipc_batch);
            }
            Message::QueryComplete { rows_affected } => {
                w.put_i64(*rows_affected);
            }
            Message::Error { code, message } => {
                w.put_string(code).put_string(message);
            }
        }
        w.finish()
    }

    /// Encode into a frame ready for the transport.
    pub fn to_frame(&self) -> Frame {
        Frame::new(self.message_type().as_u8(), self.encode())
    }

    /// Decode a frame into a message.
    ///
    /// Unknown type bytes and bodies with trailing data are `MalformedBody`.
    pub fn decode(frame: &Frame) -> Result<Self, DecodeError> {
        let kind = frame.kind().ok_or_else(|| {
            DecodeError::malformed(format!("unknown message type 0x{:02x}", frame.message_type))
        })?;
        let mut r = BodyReader::new(frame.payload());

        let message = match kind {
            MessageType::HandshakeRequest => Message::HandshakeRequest {
                version: r.get_u32()?,
            },
            MessageType::HandshakeResponse => Message::HandshakeResponse {
                version: r.get_u32()?,
                server_version: r.get_string()?,
            },
            MessageType::AuthRequest => Message::AuthRequest {
                token: r.get_string()?,
                database: r.get_string()?,
            },
            MessageType::AuthResponse => Message::AuthResponse {
                success: r.get_bool()?,
                session_id: r.get_string()?,
            },
            MessageType::QueryRequest => Message::QueryRequest {
                sql: r.get_string()?,
            },
            MessageType::QueryResponseSchema => Message::QueryResponseSchema {
                ipc_schema: slice_field(frame, r.get_bytes()?),
            },
            MessageType::QueryResponseBatch => Message::QueryResponseBatch {
                ipc_batch: slice_field(frame, r.get_bytes()?),
            },
            MessageType::QueryComplete => Message::QueryComplete {
                rows_affected: r.get_i64()?,
            },
            MessageType::Error => Message::Error {
                code: r.get_string()?,
                message: r.get_string()?,
            },
        };

        r.finish()?;
        Ok(message)
    }
}

/// Zero-copy view of a byte field that was read from `frame.payload`.
fn slice_field(frame: &Frame, field: &[u8]) -> Bytes {
    frame.payload.slice_ref(field)
}
