//! Single-query execution over an authenticated session.
//!
//! The executor sends one `QueryRequest` and collects the server's reply
//! sequence into one contiguous Arrow IPC buffer:
//!
//! ```text
//! QueryRequest ─► QueryResponseSchema, QueryResponseBatch*, QueryComplete
//!                 └──────────── or Error at any point ────────────┘
//! ```

use std::fmt;
use std::io::{Read, Write};

use bytes::{Bytes, BytesMut};

use crate::error::{CubeWireError, Result};
use crate::ipc::ColumnarStreamDecoder;
use crate::protocol::Message;
use crate::session::ProtocolSession;
use crate::stream::BatchStream;

/// Runs exactly one query on a borrowed session.
///
/// Obtained from [`ProtocolSession::executor`]. `execute` consumes the
/// executor, and the mutable borrow prevents a second query from starting on
/// the same session while this one is in flight.
pub struct QueryExecutor<'a, S: Read + Write> {
    session: &'a mut ProtocolSession<S>,
}

impl<'a, S: Read + Write> QueryExecutor<'a, S> {
    pub(crate) fn new(session: &'a mut ProtocolSession<S>) -> Self {
        Self { session }
    }

    /// Send `sql` and collect the full result.
    ///
    /// A server `Error` message yields [`CubeWireError::QueryFailed`] and
    /// leaves the session authenticated. Any other failure marks the session
    /// failed.
    pub fn execute(self, sql: &str) -> Result<ColumnarPayload> {
        self.session.require_authenticated()?;
        tracing::debug!(sql_len = sql.len(), "executing query");

        let result = collect(self.session, sql);
        let payload = self.session.settle(result)?;

        tracing::debug!(
            bytes = payload.data.len(),
            batch_messages = payload.batch_messages,
            rows_affected = payload.rows_affected,
            "query complete"
        );
        self.session.observer.on_payload(&payload.data);
        Ok(payload)
    }
}

fn collect<S: Read + Write>(session: &mut ProtocolSession<S>, sql: &str) -> Result<ColumnarPayload> {
    session.send(&Message::QueryRequest {
        sql: sql.to_string(),
    })?;

    let mut buf = BytesMut::new();
    let mut has_schema = false;
    let mut batch_messages = 0usize;

    loop {
        match session.receive()? {
            Message::QueryResponseSchema { ipc_schema } => {
                if has_schema {
                    return Err(CubeWireError::violation("schema received twice"));
                }
                if batch_messages > 0 {
                    return Err(CubeWireError::violation("schema received after batch"));
                }
                buf.extend_from_slice(&ipc_schema);
                has_schema = true;
            }
            Message::QueryResponseBatch { ipc_batch } => {
                if !has_schema {
                    return Err(CubeWireError::violation("batch received before schema"));
                }
                buf.extend_from_slice(&ipc_batch);
                batch_messages += 1;
            }
            Message::QueryComplete { rows_affected } => {
                return Ok(ColumnarPayload {
                    data: buf.freeze(),
                    rows_affected,
                    batch_messages,
                    has_schema,
                });
            }
            Message::Error { code, message } => {
                tracing::debug!(%code, %message, "query rejected by server");
                return Err(CubeWireError::QueryFailed { code, message });
            }
            other => {
                return Err(CubeWireError::violation(format!(
                    "unexpected {} during query",
                    other.message_type()
                )));
            }
        }
    }
}

/// The raw result of one query: a complete Arrow IPC stream plus the
/// completion metadata.
#[derive(Clone, PartialEq, Eq)]
pub struct ColumnarPayload {
    data: Bytes,
    rows_affected: i64,
    batch_messages: usize,
    has_schema: bool,
}

impl ColumnarPayload {
    pub fn new(data: Bytes, rows_affected: i64) -> Self {
        Self {
            has_schema: !data.is_empty(),
            data,
            rows_affected,
            batch_messages: 0,
        }
    }

    /// Concatenated schema and batch IPC bytes, in arrival order.
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Rows affected as reported by `QueryComplete`; `-1` if unknown.
    pub fn rows_affected(&self) -> i64 {
        self.rows_affected
    }

    /// Number of `QueryResponseBatch` messages received.
    pub fn batch_messages(&self) -> usize {
        self.batch_messages
    }

    pub fn has_schema(&self) -> bool {
        self.has_schema
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn into_bytes(self) -> Bytes {
        self.data
    }

    /// Hand the buffer to a decoder and initialize it.
    ///
    /// Fails with `MalformedBody` when the query produced no IPC data.
    pub fn into_stream(self) -> Result<BatchStream> {
        let mut decoder = ColumnarStreamDecoder::new(self.data);
        decoder.init()?;
        Ok(BatchStream::new(decoder).with_rows_affected(self.rows_affected))
    }
}

impl fmt::Debug for ColumnarPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColumnarPayload")
            .field("len", &self.data.len())
            .field("rows_affected", &self.rows_affected)
            .field("batch_messages", &self.batch_messages)
            .field("has_schema", &self.has_schema)
            .finish()
    }
}
