//! Connection facade.
//!
//! [`ConnectionBuilder`] connects, handshakes and authenticates in one call
//! and returns a [`Connection`] whose queries yield [`BatchStream`]s.
//!
//! # Example
//!
//! ```no_run
//! use cubewire::{ConnectOptions, Connection, SessionConfig};
//! use std::time::Duration;
//!
//! fn main() -> cubewire::Result<()> {
//!     let options = ConnectOptions::new("localhost", 4445)
//!         .token("secret")
//!         .database("analytics");
//!     let config = SessionConfig::new().read_timeout(Some(Duration::from_secs(30)));
//!
//!     let mut conn = Connection::builder(options).config(config).connect()?;
//!     for batch in conn.query("SELECT status, count(*) FROM orders GROUP BY 1")? {
//!         println!("{} rows", batch?.num_rows());
//!     }
//!     conn.close();
//!     Ok(())
//! }
//! ```

use std::fmt;

use crate::backend::{NativeBackend, QueryBackend};
use crate::config::{BackendKind, ConnectOptions, SessionConfig};
use crate::error::{CubeWireError, Result};
use crate::stream::BatchStream;

/// Builder for a [`Connection`].
pub struct ConnectionBuilder {
    options: ConnectOptions,
    config: SessionConfig,
    backend: Option<Box<dyn QueryBackend>>,
}

impl ConnectionBuilder {
    pub fn new(options: ConnectOptions) -> Self {
        Self {
            options,
            config: SessionConfig::default(),
            backend: None,
        }
    }

    /// Socket and protocol settings for the native backend.
    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Backend used when the options select [`BackendKind::External`].
    pub fn external_backend(mut self, backend: Box<dyn QueryBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Open the connection with the backend selected in the options.
    pub fn connect(self) -> Result<Connection> {
        let backend: Box<dyn QueryBackend> = match self.options.backend {
            BackendKind::Native => {
                tracing::debug!(
                    host = %self.options.host,
                    port = self.options.port,
                    "opening native connection"
                );
                Box::new(NativeBackend::connect(&self.options, &self.config)?)
            }
            BackendKind::External => self.backend.ok_or_else(|| {
                CubeWireError::invalid_state("external backend selected but none was supplied")
            })?,
        };
        Ok(Connection::with_backend(backend))
    }
}

/// An open connection.
pub struct Connection {
    backend: Box<dyn QueryBackend>,
    closed: bool,
}

impl Connection {
    pub fn builder(options: ConnectOptions) -> ConnectionBuilder {
        ConnectionBuilder::new(options)
    }

    /// Run queries through a caller-supplied backend.
    pub fn with_backend(backend: Box<dyn QueryBackend>) -> Self {
        Self {
            backend,
            closed: false,
        }
    }

    /// Execute `sql` and stream the result batches.
    pub fn query(&mut self, sql: &str) -> Result<BatchStream> {
        self.ensure_open()?;
        let payload = self.backend.query(sql)?;
        payload.into_stream()
    }

    /// Execute a statement and return the rows affected (`-1` if unknown).
    pub fn execute_update(&mut self, sql: &str) -> Result<i64> {
        self.ensure_open()?;
        let payload = self.backend.query(sql)?;
        Ok(payload.rows_affected())
    }

    pub fn server_version(&self) -> &str {
        self.backend.server_version()
    }

    pub fn session_id(&self) -> &str {
        self.backend.session_id()
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Close the connection. Idempotent.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        tracing::debug!(backend = self.backend.name(), "closing connection");
        self.backend.close();
        self.closed = true;
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(CubeWireError::invalid_state("connection is closed"));
        }
        Ok(())
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("backend", &self.backend.name())
            .field("closed", &self.closed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use bytes::Bytes;

    use super::*;
    use crate::error::DecodeError;
    use crate::executor::ColumnarPayload;
    use crate::ipc::testing::{ipc_stream, sample_batch};

    /// Serves a fixed IPC stream and counts closes.
    struct FixedBackend {
        data: Bytes,
        closes: Arc<AtomicUsize>,
    }

    impl QueryBackend for FixedBackend {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn query(&mut self, sql: &str) -> Result<ColumnarPayload> {
            if sql.starts_with("UPDATE") {
                return Ok(ColumnarPayload::new(Bytes::new(), 4));
            }
            if sql == "BAD" {
                return Err(CubeWireError::QueryFailed {
                    code: "XX000".into(),
                    message: "bad query".into(),
                });
            }
            Ok(ColumnarPayload::new(self.data.clone(), -1))
        }

        fn close(&mut self) {
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn fixed(closes: &Arc<AtomicUsize>) -> Box<dyn QueryBackend> {
        Box::new(FixedBackend {
            data: Bytes::from(ipc_stream(&[sample_batch(0, 4)])),
            closes: Arc::clone(closes),
        })
    }

    #[test]
    fn test_external_backend_requires_injection() {
        let options = ConnectOptions::new("localhost", 1).backend(BackendKind::External);
        let err = Connection::builder(options).connect().unwrap_err();
        assert!(matches!(err, CubeWireError::InvalidState(_)));
    }

    #[test]
    fn test_external_backend_query() {
        let closes = Arc::new(AtomicUsize::new(0));
        let options = ConnectOptions::new("localhost", 1).backend(BackendKind::External);
        let mut conn = Connection::builder(options)
            .external_backend(fixed(&closes))
            .connect()
            .unwrap();
        assert_eq!(conn.backend_name(), "fixed");
        assert_eq!(conn.server_version(), "");

        let batches = conn.query("SELECT *").unwrap().collect_batches().unwrap();
        assert_eq!(batches, vec![sample_batch(0, 4)]);
        assert_eq!(conn.execute_update("UPDATE t").unwrap(), 4);
    }

    #[test]
    fn test_query_without_result_set() {
        let closes = Arc::new(AtomicUsize::new(0));
        let mut conn = Connection::with_backend(fixed(&closes));
        assert!(matches!(
            conn.query("UPDATE t"),
            Err(CubeWireError::Decode(DecodeError::MalformedBody(_)))
        ));
    }

    #[test]
    fn test_query_error_keeps_connection_usable() {
        let closes = Arc::new(AtomicUsize::new(0));
        let mut conn = Connection::with_backend(fixed(&closes));
        assert!(matches!(
            conn.query("BAD"),
            Err(CubeWireError::QueryFailed { .. })
        ));
        assert!(conn.query("SELECT 1").is_ok());
    }

    #[test]
    fn test_close_is_idempotent_and_runs_on_drop() {
        let closes = Arc::new(AtomicUsize::new(0));
        let mut conn = Connection::with_backend(fixed(&closes));
        conn.close();
        conn.close();
        assert!(conn.is_closed());
        assert!(matches!(
            conn.execute_update("UPDATE t"),
            Err(CubeWireError::InvalidState(_))
        ));
        drop(conn);
        assert_eq!(closes.load(Ordering::SeqCst), 1);

        let conn = Connection::with_backend(fixed(&closes));
        drop(conn);
        assert_eq!(closes.load(Ordering::SeqCst), 2);
    }
}
