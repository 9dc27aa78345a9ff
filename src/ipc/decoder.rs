//! Schema-driven Arrow IPC stream decoder.

use std::fmt;
use std::sync::Arc;

use arrow::buffer::Buffer;
use arrow::datatypes::SchemaRef;
use arrow::ipc::convert::fb_to_schema;
use arrow::ipc::MessageHeader;
use arrow::record_batch::RecordBatch;
use bytes::Bytes;

use super::envelope::read_envelope;
use super::layout::{ensure_supported, read_record_batch};
use crate::error::{CubeWireError, DecodeError, Result};

/// Decoder lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderState {
    /// `init` has not run.
    Uninitialized,
    /// Schema read; batches may follow.
    Streaming,
    /// End of stream reached. `next_batch` keeps returning `None`.
    Exhausted,
    /// A decode error was reported. `next_batch` returns `None`.
    Failed,
}

/// Reads an Arrow IPC stream from one contiguous buffer.
///
/// # Example
///
/// ```no_run
/// # fn demo(data: bytes::Bytes) -> cubewire::Result<()> {
/// use cubewire::ipc::ColumnarStreamDecoder;
///
/// let mut decoder = ColumnarStreamDecoder::new(data);
/// let schema = decoder.init()?;
/// println!("{} columns", schema.fields().len());
/// while let Some(batch) = decoder.next_batch()? {
///     println!("{} rows", batch.num_rows());
/// }
/// # Ok(())
/// # }
/// ```
pub struct ColumnarStreamDecoder {
    data: Buffer,
    pos: usize,
    schema: Option<SchemaRef>,
    state: DecoderState,
    batches_decoded: usize,
}

impl ColumnarStreamDecoder {
    pub fn new(data: Bytes) -> Self {
        Self {
            data: Buffer::from(data),
            pos: 0,
            schema: None,
            state: DecoderState::Uninitialized,
            batches_decoded: 0,
        }
    }

    /// Read the schema message at the front of the buffer.
    ///
    /// Fails if any field, at any nesting depth, has a type this decoder
    /// cannot read. May only be called once.
    pub fn init(&mut self) -> Result<SchemaRef> {
        if self.state != DecoderState::Uninitialized {
            return Err(CubeWireError::invalid_state("decoder already initialized"));
        }

        match self.read_schema() {
            Ok(schema) => {
                tracing::debug!(
                    fields = schema.fields().len(),
                    bytes = self.data.len(),
                    "IPC schema decoded"
                );
                self.schema = Some(Arc::clone(&schema));
                self.state = DecoderState::Streaming;
                Ok(schema)
            }
            Err(e) => {
                self.state = DecoderState::Failed;
                Err(e.into())
            }
        }
    }

    /// Decode the next record batch, or `None` at end of stream.
    ///
    /// After end of stream, or after a decode error has been returned once,
    /// every call returns `Ok(None)`.
    pub fn next_batch(&mut self) -> Result<Option<RecordBatch>> {
        match self.state {
            DecoderState::Uninitialized => return Err(CubeWireError::NotInitialized),
            DecoderState::Exhausted | DecoderState::Failed => return Ok(None),
            DecoderState::Streaming => {}
        }

        match self.read_batch() {
            Ok(Some(batch)) => {
                self.batches_decoded += 1;
                Ok(Some(batch))
            }
            Ok(None) => {
                tracing::debug!(batches = self.batches_decoded, "IPC stream exhausted");
                self.state = DecoderState::Exhausted;
                Ok(None)
            }
            Err(e) => {
                tracing::debug!(error = %e, pos = self.pos, "IPC decode failed");
                self.state = DecoderState::Failed;
                Err(e.into())
            }
        }
    }

    /// The decoded schema. `NotInitialized` before a successful `init`.
    pub fn schema(&self) -> Result<SchemaRef> {
        self.schema.clone().ok_or(CubeWireError::NotInitialized)
    }

    #[inline]
    pub fn state(&self) -> DecoderState {
        self.state
    }

    /// Offset of the next unread message.
    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn batches_decoded(&self) -> usize {
        self.batches_decoded
    }

    fn read_schema(&mut self) -> std::result::Result<SchemaRef, DecodeError> {
        if self.data.is_empty() {
            return Err(DecodeError::malformed("empty IPC buffer"));
        }

        let envelope = read_envelope(self.data.as_slice(), self.pos)?
            .ok_or_else(|| DecodeError::malformed("IPC buffer has no schema message"))?;
        let header = envelope.message.header_type();
        if header != MessageHeader::Schema {
            return Err(DecodeError::malformed(format!(
                "expected Schema message, got {header:?}"
            )));
        }
        let fb_schema = envelope
            .message
            .header_as_schema()
            .ok_or_else(|| DecodeError::malformed("Schema message without header"))?;

        let schema = fb_to_schema(fb_schema);
        for field in schema.fields() {
            ensure_supported(field.data_type())?;
        }

        self.pos = envelope.next;
        Ok(Arc::new(schema))
    }

    fn read_batch(&mut self) -> std::result::Result<Option<RecordBatch>, DecodeError> {
        let Some(schema) = self.schema.clone() else {
            return Err(DecodeError::malformed("schema missing"));
        };

        let Some(envelope) = read_envelope(self.data.as_slice(), self.pos)? else {
            return Ok(None);
        };

        match envelope.message.header_type() {
            MessageHeader::RecordBatch => {}
            MessageHeader::DictionaryBatch => {
                return Err(DecodeError::UnsupportedType("dictionary batch".to_string()))
            }
            other => {
                return Err(DecodeError::malformed(format!(
                    "expected RecordBatch message, got {other:?}"
                )))
            }
        }
        let message = envelope
            .message
            .header_as_record_batch()
            .ok_or_else(|| DecodeError::malformed("RecordBatch message without header"))?;

        let body = self
            .data
            .slice_with_length(envelope.body.start, envelope.body.len());
        let batch = read_record_batch(&schema, message, &body)?;

        self.pos = envelope.next;
        Ok(Some(batch))
    }
}

impl fmt::Debug for ColumnarStreamDecoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColumnarStreamDecoder")
            .field("len", &self.data.len())
            .field("pos", &self.pos)
            .field("state", &self.state)
            .field("batches_decoded", &self.batches_decoded)
            .finish()
    }
}
