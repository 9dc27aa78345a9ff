//! # cubewire
//!
//! Blocking client for the Cube SQL native protocol. Query results arrive as
//! Apache Arrow IPC streams and are handed out as Arrow
//! [`RecordBatch`](arrow::record_batch::RecordBatch)es.
//!
//! ## Architecture
//!
//! - **Transport**: length-prefixed frames over a TCP socket
//! - **Session**: handshake and token authentication state machine
//! - **Executor**: one query at a time, collecting schema and batch messages
//! - **Decoder**: Arrow IPC stream to record batches, zero-copy over one buffer
//!
//! ## Example
//!
//! ```no_run
//! use cubewire::{ConnectOptions, Connection};
//!
//! fn main() -> cubewire::Result<()> {
//!     let options = ConnectOptions::new("localhost", 4445).token("secret");
//!     let mut conn = Connection::builder(options).connect()?;
//!
//!     let stream = conn.query("SELECT 1 AS one")?;
//!     println!("schema: {:?}", stream.schema()?);
//!     for batch in stream {
//!         println!("{} rows", batch?.num_rows());
//!     }
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod executor;
pub mod ipc;
pub mod observe;
pub mod protocol;
pub mod session;
pub mod stream;
pub mod transport;

pub use backend::{NativeBackend, QueryBackend};
pub use client::{Connection, ConnectionBuilder};
pub use config::{BackendKind, ConnectOptions, SessionConfig};
pub use error::{CubeWireError, DecodeError, Result};
pub use executor::{ColumnarPayload, QueryExecutor};
pub use ipc::ColumnarStreamDecoder;
pub use observe::{NoopObserver, Observer};
pub use session::{ProtocolSession, SessionState};
pub use stream::BatchStream;
