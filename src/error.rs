//! Error types for cubewire.

use thiserror::Error;

/// Failures while decoding an Arrow IPC stream.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// A length or offset points past the end of the buffer.
    #[error("truncated message: needed {needed} bytes, {available} available")]
    TruncatedMessage { needed: usize, available: usize },

    /// The schema or batch uses a type or feature this decoder does not read.
    #[error("unsupported type: {0}")]
    UnsupportedType(String),

    /// The message is structurally invalid.
    #[error("malformed body: {0}")]
    MalformedBody(String),
}

impl DecodeError {
    pub(crate) fn truncated(needed: usize, available: usize) -> Self {
        DecodeError::TruncatedMessage { needed, available }
    }

    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        DecodeError::MalformedBody(msg.into())
    }
}

/// Main error type for all cubewire operations.
#[derive(Debug, Error)]
pub enum CubeWireError {
    /// I/O error on the socket.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The peer closed the connection (zero-byte read).
    #[error("Connection closed")]
    ConnectionClosed,

    /// A frame announced a length of zero or above the configured maximum.
    #[error("Invalid frame length {length} (max {max})")]
    InvalidFrameLength { length: u32, max: u32 },

    /// Handshake returned a different protocol version.
    #[error("Protocol version mismatch: client {client}, server {server}")]
    ProtocolVersionMismatch { client: u32, server: u32 },

    /// Unexpected message type or malformed control message.
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    /// Server rejected the credentials.
    #[error("Authentication failed")]
    AuthenticationFailed,

    /// Server reported a query error.
    #[error("Query error [{code}]: {message}")]
    QueryFailed { code: String, message: String },

    /// Arrow IPC decoding failed.
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Operation called out of sequence.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Schema requested before the stream was initialized.
    #[error("Stream not initialized")]
    NotInitialized,
}

impl CubeWireError {
    pub(crate) fn invalid_state(msg: impl Into<String>) -> Self {
        CubeWireError::InvalidState(msg.into())
    }

    pub(crate) fn violation(msg: impl Into<String>) -> Self {
        CubeWireError::ProtocolViolation(msg.into())
    }

    /// Whether the session that produced this error is still usable.
    ///
    /// Only credential and server-side query errors leave the session intact.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            CubeWireError::AuthenticationFailed | CubeWireError::QueryFailed { .. }
        )
    }

    /// Frame length, version and message-sequence errors.
    pub fn is_protocol_error(&self) -> bool {
        matches!(
            self,
            CubeWireError::InvalidFrameLength { .. }
                | CubeWireError::ProtocolVersionMismatch { .. }
                | CubeWireError::ProtocolViolation(_)
        )
    }
}

/// Result type alias using CubeWireError.
pub type Result<T> = std::result::Result<T, CubeWireError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_classification() {
        assert!(CubeWireError::AuthenticationFailed.is_recoverable());
        assert!(CubeWireError::QueryFailed {
            code: "42".into(),
            message: "boom".into()
        }
        .is_recoverable());
        assert!(!CubeWireError::ConnectionClosed.is_recoverable());
        assert!(!CubeWireError::ProtocolVersionMismatch { client: 1, server: 2 }.is_recoverable());
    }

    #[test]
    fn test_protocol_error_grouping() {
        assert!(CubeWireError::InvalidFrameLength { length: 0, max: 10 }.is_protocol_error());
        assert!(CubeWireError::violation("bad").is_protocol_error());
        assert!(!CubeWireError::NotInitialized.is_protocol_error());
    }

    #[test]
    fn test_display_messages() {
        let err = CubeWireError::QueryFailed {
            code: "42".into(),
            message: "boom".into(),
        };
        assert_eq!(err.to_string(), "Query error [42]: boom");

        let err: CubeWireError = DecodeError::truncated(16, 4).into();
        assert!(err.to_string().contains("needed 16 bytes, 4 available"));
    }
}
