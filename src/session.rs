//! Protocol session: handshake and authentication state machine.
//!
//! ```text
//! Disconnected ──handshake──► Connected ──authenticate──► Authenticated
//!       │                        │  ▲ auth rejected            │
//!       │                        └──┘                          │
//!       └──────────── fatal error ──► Failed ◄─────────────────┘
//!                 close() from any state ──► Closed
//! ```
//!
//! A session is never handed to the caller before its handshake completed.
//! Fatal errors (I/O, protocol, malformed control messages) move it to
//! `Failed`: the socket stays open until `close()` but every other operation
//! reports `InvalidState`.

use std::fmt;
use std::io::{Read, Write};
use std::net::TcpStream;

use crate::config::SessionConfig;
use crate::error::{CubeWireError, Result};
use crate::executor::QueryExecutor;
use crate::observe::ObserverHandle;
use crate::protocol::{Message, PROTOCOL_VERSION};
use crate::transport::{tcp, FrameTransport};

/// Lifecycle state of a [`ProtocolSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Socket open, handshake not yet completed.
    Disconnected,
    /// Handshake completed.
    Connected,
    Authenticated,
    /// A fatal error occurred; only `close()` is allowed.
    Failed,
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Connected => "connected",
            SessionState::Authenticated => "authenticated",
            SessionState::Failed => "failed",
            SessionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// One logical connection to the server.
///
/// Not shareable between threads by reference: every operation takes
/// `&mut self`, and queries borrow the session for their whole duration.
pub struct ProtocolSession<S: Read + Write = TcpStream> {
    transport: Option<FrameTransport<S>>,
    state: SessionState,
    server_version: String,
    session_id: String,
    protocol_version: u32,
    pub(crate) observer: ObserverHandle,
}

impl ProtocolSession<TcpStream> {
    /// Connect over TCP and perform the handshake.
    pub fn connect(host: &str, port: u16, config: &SessionConfig) -> Result<Self> {
        tracing::debug!(host, port, "connecting");
        let stream = tcp::connect(host, port, config)?;
        Self::handshake_over(stream, config)
    }
}

impl<S: Read + Write> ProtocolSession<S> {
    /// Perform the handshake over an already connected stream.
    pub fn handshake_over(stream: S, config: &SessionConfig) -> Result<Self> {
        let mut session = Self {
            transport: Some(FrameTransport::with_config(stream, config)),
            state: SessionState::Disconnected,
            server_version: String::new(),
            session_id: String::new(),
            protocol_version: 0,
            observer: config.observer.clone(),
        };

        let result = session.handshake();
        if let Err(e) = result {
            session.close();
            return Err(e);
        }
        Ok(session)
    }

    fn handshake(&mut self) -> Result<()> {
        let response = self.exchange(&Message::HandshakeRequest {
            version: PROTOCOL_VERSION,
        })?;

        match response {
            Message::HandshakeResponse {
                version,
                server_version,
            } => {
                if version != PROTOCOL_VERSION {
                    return Err(CubeWireError::ProtocolVersionMismatch {
                        client: PROTOCOL_VERSION,
                        server: version,
                    });
                }
                tracing::debug!(%server_version, version, "handshake complete");
                self.server_version = server_version;
                self.protocol_version = version;
                self.set_state(SessionState::Connected);
                Ok(())
            }
            Message::Error { code, message } => Err(CubeWireError::violation(format!(
                "handshake rejected [{code}]: {message}"
            ))),
            other => Err(CubeWireError::violation(format!(
                "expected HandshakeResponse, got {}",
                other.message_type()
            ))),
        }
    }

    /// Authenticate with a token against `database`.
    ///
    /// Rejected credentials return [`CubeWireError::AuthenticationFailed`]
    /// and leave the session `Connected`, so a retry is allowed.
    pub fn authenticate(&mut self, token: &str, database: &str) -> Result<()> {
        match self.state {
            SessionState::Connected => {}
            SessionState::Authenticated => {
                return Err(CubeWireError::invalid_state("already authenticated"))
            }
            other => {
                return Err(CubeWireError::invalid_state(format!(
                    "cannot authenticate in state {other}"
                )))
            }
        }

        let result = self.exchange(&Message::AuthRequest {
            token: token.to_string(),
            database: database.to_string(),
        });
        let response = self.settle(result)?;

        match response {
            Message::AuthResponse {
                success: true,
                session_id,
            } => {
                tracing::debug!(%session_id, "authenticated");
                self.session_id = session_id;
                self.set_state(SessionState::Authenticated);
                Ok(())
            }
            Message::AuthResponse { success: false, .. } => {
                tracing::debug!("authentication rejected");
                Err(CubeWireError::AuthenticationFailed)
            }
            Message::Error { code, message } => {
                tracing::debug!(%code, %message, "authentication rejected with error");
                Err(CubeWireError::AuthenticationFailed)
            }
            other => {
                let err = CubeWireError::violation(format!(
                    "expected AuthResponse, got {}",
                    other.message_type()
                ));
                self.settle(Err(err))
            }
        }
    }

    /// Borrow the session for one query. Requires `Authenticated`.
    pub fn executor(&mut self) -> Result<QueryExecutor<'_, S>> {
        self.require_authenticated()?;
        Ok(QueryExecutor::new(self))
    }

    /// Release the socket. Idempotent and valid from any state.
    pub fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        self.transport = None;
        self.session_id.clear();
        self.server_version.clear();
        self.set_state(SessionState::Closed);
    }

    #[inline]
    pub fn state(&self) -> SessionState {
        self.state
    }

    #[inline]
    pub fn is_authenticated(&self) -> bool {
        self.state == SessionState::Authenticated
    }

    pub fn server_version(&self) -> &str {
        &self.server_version
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Version agreed during the handshake (0 before it completes).
    pub fn protocol_version(&self) -> u32 {
        self.protocol_version
    }

    /// Frames sent and received on this session so far.
    pub fn frame_counts(&self) -> (u64, u64) {
        self.transport
            .as_ref()
            .map(|t| (t.frames_sent(), t.frames_received()))
            .unwrap_or((0, 0))
    }

    /// The underlying stream, if the session is not closed.
    pub fn stream_ref(&self) -> Option<&S> {
        self.transport.as_ref().map(|t| t.get_ref())
    }

    pub(crate) fn require_authenticated(&self) -> Result<()> {
        if self.state != SessionState::Authenticated {
            return Err(CubeWireError::invalid_state(format!(
                "query requires an authenticated session (state: {})",
                self.state
            )));
        }
        Ok(())
    }

    fn transport_mut(&mut self) -> Result<&mut FrameTransport<S>> {
        self.transport
            .as_mut()
            .ok_or_else(|| CubeWireError::invalid_state("session is closed"))
    }

    pub(crate) fn send(&mut self, message: &Message) -> Result<()> {
        self.transport_mut()?.send(message)
    }

    pub(crate) fn receive(&mut self) -> Result<Message> {
        self.transport_mut()?.receive()
    }

    /// Send a request and decode the single response frame.
    fn exchange(&mut self, request: &Message) -> Result<Message> {
        self.send(request)?;
        self.receive()
    }

    /// Mark the session failed when `result` carries a fatal error.
    pub(crate) fn settle<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            if !e.is_recoverable() && self.state != SessionState::Closed {
                tracing::debug!(error = %e, "session failed");
                self.set_state(SessionState::Failed);
            }
        }
        result
    }

    fn set_state(&mut self, next: SessionState) {
        if self.state == next {
            return;
        }
        let previous = self.state;
        self.state = next;
        tracing::debug!(from = %previous, to = %next, "session state");
        self.observer.on_state_change(previous, next);
    }
}

impl<S: Read + Write> Drop for ProtocolSession<S> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<S: Read + Write> fmt::Debug for ProtocolSession<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProtocolSession")
            .field("state", &self.state)
            .field("server_version", &self.server_version)
            .field("session_id", &self.session_id)
            .field("protocol_version", &self.protocol_version)
            .finish()
    }
}
