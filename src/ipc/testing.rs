//! Arrow IPC fixtures for unit tests.

use std::ops::Range;
use std::sync::Arc;

use arrow::array::{ArrayRef, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::ipc::root_as_message;
use arrow::ipc::writer::StreamWriter;
use arrow::record_batch::RecordBatch;
use bytes::Bytes;

pub fn sample_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::Int64, false),
        Field::new("name", DataType::Utf8, true),
    ]))
}

/// `rows` rows with ids from `start`; every third name is null.
pub fn sample_batch(start: i64, rows: usize) -> RecordBatch {
    let ids: Vec<i64> = (start..start + rows as i64).collect();
    let names: Vec<Option<String>> = ids
        .iter()
        .map(|i| (i % 3 != 2).then(|| format!("row-{i}")))
        .collect();
    let columns: Vec<ArrayRef> = vec![
        Arc::new(Int64Array::from(ids)),
        Arc::new(StringArray::from(names)),
    ];
    RecordBatch::try_new(sample_schema(), columns).unwrap()
}

/// A complete IPC stream, terminated by the end-of-stream marker.
pub fn ipc_stream_for(schema: &Schema, batches: &[RecordBatch]) -> Vec<u8> {
    let mut writer = StreamWriter::try_new(Vec::new(), schema).unwrap();
    for batch in batches {
        writer.write(batch).unwrap();
    }
    writer.finish().unwrap();
    writer.into_inner().unwrap()
}

pub fn ipc_stream(batches: &[RecordBatch]) -> Vec<u8> {
    ipc_stream_for(&batches[0].schema(), batches)
}

/// Byte ranges of one message inside a stream.
#[derive(Debug, Clone)]
pub struct RawMessage {
    pub start: usize,
    pub metadata: Range<usize>,
    pub body: Range<usize>,
    pub end: usize,
}

/// Split a well-formed stream into messages, stopping at end-of-stream.
pub fn split_messages(buf: &[u8]) -> Vec<RawMessage> {
    let mut out = Vec::new();
    let mut pos = 0;
    while pos + 8 <= buf.len() {
        let len = i32::from_le_bytes(buf[pos + 4..pos + 8].try_into().unwrap()) as usize;
        if len == 0 {
            break;
        }
        let metadata = pos + 8..pos + 8 + len;
        let body_len = root_as_message(&buf[metadata.clone()])
            .unwrap()
            .bodyLength() as usize;
        let body_start = (metadata.end + 7) & !7;
        let body = body_start..body_start + body_len;
        let end = (body.end + 7) & !7;
        out.push(RawMessage {
            start: pos,
            metadata,
            body,
            end,
        });
        pos = end;
    }
    out
}

/// The schema message and each batch message as separate buffers, the way
/// the server ships them in `QueryResponseSchema` / `QueryResponseBatch`.
pub fn ipc_messages(batches: &[RecordBatch]) -> (Bytes, Vec<Bytes>) {
    let stream = ipc_stream(batches);
    let mut parts = split_messages(&stream)
        .into_iter()
        .map(|m| Bytes::copy_from_slice(&stream[m.start..m.end]));
    let schema = parts.next().unwrap();
    (schema, parts.collect())
}

/// Rewrite every message with three junk bytes appended to its metadata,
/// giving an odd metadata length followed by padding to the next boundary.
pub fn reframe_with_odd_metadata(buf: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    for m in split_messages(buf) {
        let metadata = &buf[m.metadata.clone()];
        out.extend_from_slice(&[0xFF; 4]);
        out.extend_from_slice(&(metadata.len() as i32 + 3).to_le_bytes());
        out.extend_from_slice(metadata);
        out.extend_from_slice(&[0xAB; 3]);
        out.resize((out.len() + 7) & !7, 0);
        out.extend_from_slice(&buf[m.body.clone()]);
        out.resize((out.len() + 7) & !7, 0);
    }
    out
}
