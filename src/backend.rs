//! Query execution backends.
//!
//! A [`Connection`](crate::client::Connection) runs every query through a
//! [`QueryBackend`]. The native backend speaks the binary protocol; callers
//! that need a general-purpose SQL client implement the trait themselves and
//! inject it with [`Connection::with_backend`](crate::client::Connection::with_backend).

use std::io::{Read, Write};
use std::net::TcpStream;

use crate::config::{ConnectOptions, SessionConfig};
use crate::error::{CubeWireError, Result};
use crate::executor::ColumnarPayload;
use crate::session::ProtocolSession;

/// Executes SQL and returns the result as an Arrow IPC payload.
pub trait QueryBackend: Send {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    fn query(&mut self, sql: &str) -> Result<ColumnarPayload>;

    fn server_version(&self) -> &str {
        ""
    }

    fn session_id(&self) -> &str {
        ""
    }

    /// Release the underlying connection. Must be idempotent.
    fn close(&mut self);
}

/// Backend over an authenticated [`ProtocolSession`].
pub struct NativeBackend<S: Read + Write = TcpStream> {
    session: ProtocolSession<S>,
}

impl NativeBackend<TcpStream> {
    /// Connect, handshake and authenticate.
    pub fn connect(options: &ConnectOptions, config: &SessionConfig) -> Result<Self> {
        let mut session = ProtocolSession::connect(&options.host, options.port, config)?;
        session.authenticate(&options.token, &options.database)?;
        Ok(Self { session })
    }
}

impl<S: Read + Write> NativeBackend<S> {
    /// Wrap a session that is already authenticated.
    pub fn from_session(session: ProtocolSession<S>) -> Result<Self> {
        if !session.is_authenticated() {
            return Err(CubeWireError::invalid_state(format!(
                "native backend requires an authenticated session (state: {})",
                session.state()
            )));
        }
        Ok(Self { session })
    }

    pub fn session(&self) -> &ProtocolSession<S> {
        &self.session
    }
}

impl<S: Read + Write + Send> QueryBackend for NativeBackend<S> {
    fn name(&self) -> &'static str {
        "native"
    }

    fn query(&mut self, sql: &str) -> Result<ColumnarPayload> {
        self.session.executor()?.execute(sql)
    }

    fn server_version(&self) -> &str {
        self.session.server_version()
    }

    fn session_id(&self) -> &str {
        self.session.session_id()
    }

    fn close(&mut self) {
        self.session.close();
    }
}
