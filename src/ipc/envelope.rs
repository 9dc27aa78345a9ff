//! Message envelopes: continuation marker, metadata length, padding, body.

use std::ops::Range;

use arrow::ipc::{root_as_message, Message};

use crate::error::DecodeError;

/// Marker preceding every message's metadata length.
pub const CONTINUATION_MARKER: u32 = 0xFFFF_FFFF;

/// Messages and bodies start on multiples of this, relative to the stream start.
pub const IPC_ALIGNMENT: usize = 8;

const PREFIX_SIZE: usize = 8;

/// One parsed message: flatbuffer metadata plus the location of its body.
pub(crate) struct Envelope<'a> {
    pub message: Message<'a>,
    pub body: Range<usize>,
    /// Start of the following message.
    pub next: usize,
}

#[inline]
pub(crate) fn align(pos: usize) -> usize {
    (pos + IPC_ALIGNMENT - 1) & !(IPC_ALIGNMENT - 1)
}

/// Parse the message starting at `pos`.
///
/// Returns `None` at the exact end of `buf`, when the next four bytes are not
/// the continuation marker, or on the zero-length end-of-stream message.
pub(crate) fn read_envelope(buf: &[u8], pos: usize) -> Result<Option<Envelope<'_>>, DecodeError> {
    let available = buf.len().saturating_sub(pos);
    if available == 0 {
        return Ok(None);
    }
    if available < 4 {
        return Err(DecodeError::truncated(4, available));
    }

    let marker = u32::from_le_bytes([buf[pos], buf[pos + 1], buf[pos + 2], buf[pos + 3]]);
    if marker != CONTINUATION_MARKER {
        tracing::debug!(pos, marker, "no continuation marker, treating as end of stream");
        return Ok(None);
    }
    if available < PREFIX_SIZE {
        return Err(DecodeError::truncated(PREFIX_SIZE, available));
    }

    let len = i32::from_le_bytes([buf[pos + 4], buf[pos + 5], buf[pos + 6], buf[pos + 7]]);
    if len == 0 {
        return Ok(None);
    }
    let len = usize::try_from(len)
        .map_err(|_| DecodeError::malformed(format!("negative metadata length {len}")))?;

    let meta_start = pos + PREFIX_SIZE;
    let meta_end = meta_start + len;
    if meta_end > buf.len() {
        return Err(DecodeError::truncated(PREFIX_SIZE + len, available));
    }
    let body_start = align(meta_end);
    if body_start > buf.len() {
        return Err(DecodeError::truncated(body_start - pos, available));
    }

    let message = root_as_message(&buf[meta_start..meta_end])
        .map_err(|e| DecodeError::malformed(format!("invalid message metadata: {e}")))?;

    let body_len = usize::try_from(message.bodyLength()).map_err(|_| {
        DecodeError::malformed(format!("negative body length {}", message.bodyLength()))
    })?;
    let body_end = body_start
        .checked_add(body_len)
        .filter(|end| *end <= buf.len())
        .ok_or_else(|| {
            DecodeError::truncated((body_start - pos).saturating_add(body_len), available)
        })?;

    let mut next = align(body_end);
    if next > buf.len() {
        // An unpadded final body is accepted; leftover bytes are not.
        if body_end != buf.len() {
            return Err(DecodeError::truncated(next - pos, available));
        }
        next = body_end;
    }

    Ok(Some(Envelope {
        message,
        body: body_start..body_end,
        next,
    }))
}
