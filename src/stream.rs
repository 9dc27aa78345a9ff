//! Caller-facing iterator over decoded record batches.

use std::fmt;

use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;

use crate::error::{CubeWireError, Result};
use crate::ipc::ColumnarStreamDecoder;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamState {
    Open,
    /// End of stream was returned once.
    Finished,
    Released,
}

/// Owns a query's IPC buffer and hands out record batches.
///
/// `next_batch` returns `None` exactly once. The buffer is dropped at that
/// point, and any further call is an `InvalidState` error. `release` drops
/// the buffer early.
pub struct BatchStream {
    decoder: Option<ColumnarStreamDecoder>,
    schema: Option<SchemaRef>,
    rows_affected: i64,
    state: StreamState,
}

impl BatchStream {
    /// Wrap a decoder. The schema is captured if the decoder is initialized.
    pub fn new(decoder: ColumnarStreamDecoder) -> Self {
        Self {
            schema: decoder.schema().ok(),
            decoder: Some(decoder),
            rows_affected: -1,
            state: StreamState::Open,
        }
    }

    pub(crate) fn with_rows_affected(mut self, rows_affected: i64) -> Self {
        self.rows_affected = rows_affected;
        self
    }

    /// Result schema. `NotInitialized` if the decoder never read one.
    pub fn schema(&self) -> Result<SchemaRef> {
        self.schema.clone().ok_or(CubeWireError::NotInitialized)
    }

    /// Rows affected reported by the server; `-1` if unknown.
    pub fn rows_affected(&self) -> i64 {
        self.rows_affected
    }

    pub fn next_batch(&mut self) -> Result<Option<RecordBatch>> {
        match self.state {
            StreamState::Open => {}
            StreamState::Finished => {
                return Err(CubeWireError::invalid_state("batch stream already finished"))
            }
            StreamState::Released => {
                return Err(CubeWireError::invalid_state("batch stream released"))
            }
        }

        let decoder = self
            .decoder
            .as_mut()
            .ok_or_else(|| CubeWireError::invalid_state("batch stream has no decoder"))?;
        match decoder.next_batch()? {
            Some(batch) => Ok(Some(batch)),
            None => {
                self.decoder = None;
                self.state = StreamState::Finished;
                Ok(None)
            }
        }
    }

    /// Drop the underlying buffer. Idempotent.
    pub fn release(&mut self) {
        if self.state == StreamState::Released {
            return;
        }
        self.decoder = None;
        self.state = StreamState::Released;
    }

    /// Whether the stream still holds its buffer.
    pub fn is_open(&self) -> bool {
        self.state == StreamState::Open
    }

    /// Drain the remaining batches.
    pub fn collect_batches(mut self) -> Result<Vec<RecordBatch>> {
        let mut batches = Vec::new();
        while let Some(batch) = self.next_batch()? {
            batches.push(batch);
        }
        Ok(batches)
    }
}

impl Iterator for BatchStream {
    type Item = Result<RecordBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.state != StreamState::Open {
            return None;
        }
        self.next_batch().transpose()
    }
}

impl fmt::Debug for BatchStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchStream")
            .field("state", &self.state)
            .field("rows_affected", &self.rows_affected)
            .field("decoder", &self.decoder)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::error::DecodeError;
    use crate::ipc::testing::{ipc_stream, sample_batch, sample_schema, split_messages};

    fn stream_of(batches: &[RecordBatch]) -> BatchStream {
        let mut decoder = ColumnarStreamDecoder::new(Bytes::from(ipc_stream(batches)));
        decoder.init().unwrap();
        BatchStream::new(decoder)
    }

    #[test]
    fn test_none_exactly_once() {
        let mut stream = stream_of(&[sample_batch(0, 2)]);
        assert_eq!(stream.schema().unwrap(), sample_schema());
        assert_eq!(stream.next_batch().unwrap().unwrap(), sample_batch(0, 2));
        assert!(stream.next_batch().unwrap().is_none());
        assert!(!stream.is_open());
        assert!(matches!(
            stream.next_batch(),
            Err(CubeWireError::InvalidState(_))
        ));
        // Schema remains readable after the buffer is gone.
        assert_eq!(stream.schema().unwrap(), sample_schema());
    }

    #[test]
    fn test_release_is_idempotent() {
        let mut stream = stream_of(&[sample_batch(0, 2)]);
        stream.release();
        stream.release();
        assert!(stream.decoder.is_none());
        assert!(matches!(
            stream.next_batch(),
            Err(CubeWireError::InvalidState(_))
        ));
    }

    #[test]
    fn test_uninitialized_decoder() {
        let decoder = ColumnarStreamDecoder::new(Bytes::from(ipc_stream(&[sample_batch(0, 1)])));
        let mut stream = BatchStream::new(decoder);
        assert!(matches!(stream.schema(), Err(CubeWireError::NotInitialized)));
        assert!(matches!(
            stream.next_batch(),
            Err(CubeWireError::NotInitialized)
        ));
    }

    #[test]
    fn test_iterator() {
        let stream = stream_of(&[sample_batch(0, 2), sample_batch(2, 3)]);
        let rows: usize = stream.map(|b| b.unwrap().num_rows()).sum();
        assert_eq!(rows, 5);
    }

    #[test]
    fn test_iterator_surfaces_decode_error_once() {
        let data = ipc_stream(&[sample_batch(0, 8)]);
        let messages = split_messages(&data);
        let cut = data[..messages[1].body.end - 8].to_vec();
        let mut decoder = ColumnarStreamDecoder::new(Bytes::from(cut));
        decoder.init().unwrap();

        let results: Vec<_> = BatchStream::new(decoder).collect();
        assert_eq!(results.len(), 1);
        assert!(matches!(
            results[0],
            Err(CubeWireError::Decode(DecodeError::TruncatedMessage { .. }))
        ));
    }

    #[test]
    fn test_collect_batches() {
        let stream = stream_of(&[sample_batch(0, 1), sample_batch(1, 1)]).with_rows_affected(2);
        assert_eq!(stream.rows_affected(), 2);
        let batches = stream.collect_batches().unwrap();
        assert_eq!(batches, vec![sample_batch(0, 1), sample_batch(1, 1)]);
    }
}
