//! Buffer layouts per Arrow type and record batch reconstruction.
//!
//! Field nodes and buffers are listed depth-first: a field's node and its own
//! buffers come before those of its children.

use std::sync::Arc;

use arrow::array::{make_array, ArrayData, ArrayDataBuilder, ArrayRef};
use arrow::buffer::Buffer;
use arrow::datatypes::{DataType, Fields, SchemaRef};
use arrow::ipc::RecordBatch as RecordBatchMessage;
use arrow::record_batch::{RecordBatch, RecordBatchOptions};

use crate::error::DecodeError;

/// How a type's values are laid out in buffers (after the validity bitmap).
enum Layout<'a> {
    /// No buffers at all, not even validity.
    Null,
    /// One values buffer.
    FixedWidth,
    /// Offsets of `offset_width` bytes, then data.
    VariableWidth { offset_width: usize },
    /// Offsets, then one child array.
    List {
        child: &'a DataType,
        offset_width: usize,
    },
    FixedSizeList(&'a DataType),
    Struct(&'a Fields),
}

fn layout(data_type: &DataType) -> Result<Layout<'_>, DecodeError> {
    use DataType::*;

    let layout = match data_type {
        Null => Layout::Null,
        Boolean | Int8 | Int16 | Int32 | Int64 | UInt8 | UInt16 | UInt32 | UInt64 | Float16
        | Float32 | Float64 | Date32 | Date64 | Time32(_) | Time64(_) | Timestamp(_, _)
        | Duration(_) | Interval(_) | Decimal128(_, _) | Decimal256(_, _)
        | FixedSizeBinary(_) => Layout::FixedWidth,
        Utf8 | Binary => Layout::VariableWidth { offset_width: 4 },
        LargeUtf8 | LargeBinary => Layout::VariableWidth { offset_width: 8 },
        List(field) | Map(field, _) => Layout::List {
            child: field.data_type(),
            offset_width: 4,
        },
        LargeList(field) => Layout::List {
            child: field.data_type(),
            offset_width: 8,
        },
        FixedSizeList(field, _) => Layout::FixedSizeList(field.data_type()),
        Struct(fields) => Layout::Struct(fields),
        other => return Err(DecodeError::UnsupportedType(other.to_string())),
    };
    Ok(layout)
}

/// Check that `data_type` and every nested child type can be decoded.
pub(crate) fn ensure_supported(data_type: &DataType) -> Result<(), DecodeError> {
    match layout(data_type)? {
        Layout::List { child, .. } | Layout::FixedSizeList(child) => ensure_supported(child),
        Layout::Struct(fields) => fields
            .iter()
            .try_for_each(|f| ensure_supported(f.data_type())),
        _ => Ok(()),
    }
}

/// Rebuild one record batch from its metadata and body.
///
/// Every buffer is a zero-copy slice of `body`.
pub(crate) fn read_record_batch(
    schema: &SchemaRef,
    message: RecordBatchMessage<'_>,
    body: &Buffer,
) -> Result<RecordBatch, DecodeError> {
    if message.compression().is_some() {
        return Err(DecodeError::UnsupportedType(
            "compressed record batch".to_string(),
        ));
    }

    let rows = usize::try_from(message.length())
        .map_err(|_| DecodeError::malformed(format!("negative row count {}", message.length())))?;
    let nodes: Vec<(i64, i64)> = message
        .nodes()
        .map(|v| v.iter().map(|n| (n.length(), n.null_count())).collect())
        .unwrap_or_default();
    let buffers: Vec<(i64, i64)> = message
        .buffers()
        .map(|v| v.iter().map(|b| (b.offset(), b.length())).collect())
        .unwrap_or_default();

    let mut reader = BodyReader {
        body,
        nodes,
        buffers,
        next_node: 0,
        next_buffer: 0,
    };

    let mut columns: Vec<ArrayRef> = Vec::with_capacity(schema.fields().len());
    for field in schema.fields() {
        let data = reader.read_array(field.data_type())?;
        if data.len() != rows {
            return Err(DecodeError::malformed(format!(
                "column '{}' has {} values, batch has {rows} rows",
                field.name(),
                data.len()
            )));
        }
        columns.push(make_array(data));
    }
    reader.finish()?;

    let options = RecordBatchOptions::new().with_row_count(Some(rows));
    RecordBatch::try_new_with_options(Arc::clone(schema), columns, &options)
        .map_err(|e| DecodeError::malformed(e.to_string()))
}

/// Cursor over the field nodes and buffer descriptors of one batch.
struct BodyReader<'a> {
    body: &'a Buffer,
    nodes: Vec<(i64, i64)>,
    buffers: Vec<(i64, i64)>,
    next_node: usize,
    next_buffer: usize,
}

impl BodyReader<'_> {
    fn read_array(&mut self, data_type: &DataType) -> Result<ArrayData, DecodeError> {
        let (len, null_count) = self.node()?;
        let builder = ArrayData::builder(data_type.clone()).len(len);

        let builder = match layout(data_type)? {
            Layout::Null => builder,
            Layout::FixedWidth => {
                let validity = self.validity(len, null_count)?;
                let values = self.buffer()?;
                builder.null_bit_buffer(validity).add_buffer(values)
            }
            Layout::VariableWidth { offset_width } => {
                let validity = self.validity(len, null_count)?;
                let offsets = self.offsets(len, offset_width)?;
                let data = self.buffer()?;
                builder
                    .null_bit_buffer(validity)
                    .buffers(vec![offsets, data])
            }
            Layout::List {
                child,
                offset_width,
            } => {
                let validity = self.validity(len, null_count)?;
                let offsets = self.offsets(len, offset_width)?;
                let child = self.read_array(child)?;
                builder
                    .null_bit_buffer(validity)
                    .add_buffer(offsets)
                    .add_child_data(child)
            }
            Layout::FixedSizeList(child) => {
                let validity = self.validity(len, null_count)?;
                let child = self.read_array(child)?;
                builder.null_bit_buffer(validity).add_child_data(child)
            }
            Layout::Struct(fields) => {
                let validity = self.validity(len, null_count)?;
                let children = fields
                    .iter()
                    .map(|f| self.read_array(f.data_type()))
                    .collect::<Result<Vec<_>, _>>()?;
                builder.null_bit_buffer(validity).child_data(children)
            }
        };

        build(builder)
    }

    fn node(&mut self) -> Result<(usize, usize), DecodeError> {
        let (length, null_count) = *self
            .nodes
            .get(self.next_node)
            .ok_or_else(|| DecodeError::malformed("fewer field nodes than fields"))?;
        self.next_node += 1;

        let length = usize::try_from(length)
            .map_err(|_| DecodeError::malformed(format!("negative node length {length}")))?;
        let null_count = usize::try_from(null_count)
            .map_err(|_| DecodeError::malformed(format!("negative null count {null_count}")))?;
        Ok((length, null_count))
    }

    fn buffer(&mut self) -> Result<Buffer, DecodeError> {
        let (offset, length) = *self
            .buffers
            .get(self.next_buffer)
            .ok_or_else(|| DecodeError::malformed("fewer buffers than the schema requires"))?;
        self.next_buffer += 1;

        let offset = usize::try_from(offset)
            .map_err(|_| DecodeError::malformed(format!("negative buffer offset {offset}")))?;
        let length = usize::try_from(length)
            .map_err(|_| DecodeError::malformed(format!("negative buffer length {length}")))?;
        let end = offset.saturating_add(length);
        if end > self.body.len() {
            return Err(DecodeError::truncated(end, self.body.len()));
        }
        Ok(self.body.slice_with_length(offset, length))
    }

    /// Validity bitmap, or `None` when the node reports no nulls.
    fn validity(&mut self, len: usize, null_count: usize) -> Result<Option<Buffer>, DecodeError> {
        let buffer = self.buffer()?;
        if null_count == 0 {
            return Ok(None);
        }
        let needed = len.div_ceil(8);
        if buffer.len() < needed {
            return Err(DecodeError::truncated(needed, buffer.len()));
        }
        Ok(Some(buffer.slice_with_length(0, needed)))
    }

    fn offsets(&mut self, len: usize, width: usize) -> Result<Buffer, DecodeError> {
        let buffer = self.buffer()?;
        // Writers may omit the single zero offset of an empty array.
        if len == 0 && buffer.is_empty() {
            return Ok(Buffer::from_vec(vec![0u8; width]));
        }
        Ok(buffer)
    }

    fn finish(&self) -> Result<(), DecodeError> {
        if self.next_node != self.nodes.len() {
            return Err(DecodeError::malformed(format!(
                "{} field nodes for {} fields",
                self.nodes.len(),
                self.next_node
            )));
        }
        if self.next_buffer != self.buffers.len() {
            return Err(DecodeError::malformed(format!(
                "{} buffers, schema uses {}",
                self.buffers.len(),
                self.next_buffer
            )));
        }
        Ok(())
    }
}

fn build(builder: ArrayDataBuilder) -> Result<ArrayData, DecodeError> {
    builder
        .align_buffers(true)
        .build()
        .map_err(|e| DecodeError::malformed(e.to_string()))
}
