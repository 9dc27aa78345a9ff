//! Arrow IPC stream decoding.
//!
//! A query result is the concatenation of the schema message and every batch
//! message the server sent, i.e. an Arrow IPC *stream*:
//!
//! ```text
//! ┌────────────┬─────────────┬──────────────────┬─────────┬──────┐
//! │ 0xFFFFFFFF │ len (i32 LE)│ flatbuffer meta  │ pad → 8 │ body │ ...
//! └────────────┴─────────────┴──────────────────┴─────────┴──────┘
//! ```
//!
//! Every message starts on an 8-byte boundary relative to the start of the
//! stream. A message with `len == 0` marks the end of the stream.
//!
//! [`ColumnarStreamDecoder`] reads the schema once, then one
//! [`RecordBatch`](arrow::record_batch::RecordBatch) per call. Column buffers
//! are slices of a single shared allocation.

mod decoder;
mod envelope;
mod layout;

pub use decoder::{ColumnarStreamDecoder, DecoderState};
pub use envelope::{CONTINUATION_MARKER, IPC_ALIGNMENT};

#[cfg(test)]
pub(crate) mod testing;
