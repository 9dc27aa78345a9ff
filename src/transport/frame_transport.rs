//! Blocking frame transport over any `Read + Write` stream.
//!
//! Writes use scatter/gather I/O: the 5-byte header and the payload go out in
//! one `write_vectored` call when the kernel accepts everything, otherwise the
//! remaining slices are rebuilt and the write continues. Reads pull the
//! 4-byte length prefix, validate it, then pull exactly `length` bytes.
//!
//! `Interrupted` is retried in both directions. A zero-byte read is
//! [`CubeWireError::ConnectionClosed`]; no partial frame is ever returned.

use std::io::{self, ErrorKind, IoSlice, Read, Write};

use bytes::Bytes;

use crate::config::SessionConfig;
use crate::error::{CubeWireError, Result};
use crate::observe::ObserverHandle;
use crate::protocol::{
    decode_length_prefix, encode_frame_header, validate_frame_length, Frame, Message,
    LENGTH_PREFIX_SIZE, MAX_FRAME_BYTES,
};

/// Reads and writes length-prefixed frames.
pub struct FrameTransport<S> {
    stream: S,
    max_frame_bytes: u32,
    observer: ObserverHandle,
    frames_sent: u64,
    frames_received: u64,
}

impl<S: Read + Write> FrameTransport<S> {
    /// Wrap a connected stream with default limits and no observer.
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            max_frame_bytes: MAX_FRAME_BYTES,
            observer: ObserverHandle::noop(),
            frames_sent: 0,
            frames_received: 0,
        }
    }

    pub fn with_config(stream: S, config: &SessionConfig) -> Self {
        Self {
            stream,
            max_frame_bytes: config.max_frame_bytes.min(MAX_FRAME_BYTES),
            observer: config.observer.clone(),
            frames_sent: 0,
            frames_received: 0,
        }
    }

    /// Write one frame. The frame is rejected before any byte is sent if it
    /// would exceed the configured maximum.
    pub fn write_frame(&mut self, message_type: u8, payload: &[u8]) -> Result<()> {
        let header = encode_frame_header(message_type, payload.len(), self.max_frame_bytes)?;
        write_frame_parts(&mut self.stream, &header, payload)?;

        self.frames_sent += 1;
        tracing::trace!(
            message_type,
            length = payload.len() + 1,
            "frame sent"
        );
        if let Some(kind) = crate::protocol::MessageType::from_u8(message_type) {
            self.observer.on_frame_sent(kind, payload.len() + 1);
        }
        Ok(())
    }

    /// Read one complete frame.
    pub fn read_frame(&mut self) -> Result<Frame> {
        let mut prefix = [0u8; LENGTH_PREFIX_SIZE];
        read_full(&mut self.stream, &mut prefix)?;

        let length = decode_length_prefix(prefix);
        if let Err(e) = validate_frame_length(length, self.max_frame_bytes) {
            tracing::warn!(length, max = self.max_frame_bytes, "rejecting frame");
            return Err(e);
        }

        let mut body = vec![0u8; length as usize];
        read_full(&mut self.stream, &mut body)?;

        let mut payload = Bytes::from(body);
        let type_byte = payload.split_to(1);
        let frame = Frame::new(type_byte[0], payload);

        self.frames_received += 1;
        tracing::trace!(
            message_type = frame.message_type,
            length,
            "frame received"
        );
        self.observer
            .on_frame_received(frame.message_type, length as usize);
        Ok(frame)
    }

    /// Encode and send a typed message.
    ///
    /// The encoded size is checked against the frame limit before the body is
    /// built.
    pub fn send(&mut self, message: &Message) -> Result<()> {
        let length = message.encoded_len().saturating_add(1);
        if length > self.max_frame_bytes as usize {
            return Err(CubeWireError::InvalidFrameLength {
                length: u32::try_from(length).unwrap_or(u32::MAX),
                max: self.max_frame_bytes,
            });
        }
        let body = message.encode();
        self.write_frame(message.message_type().as_u8(), &body)
    }

    /// Read one frame and decode it as a typed message.
    ///
    /// A type byte outside the protocol is a [`CubeWireError::ProtocolViolation`].
    pub fn receive(&mut self) -> Result<Message> {
        let frame = self.read_frame()?;
        if frame.kind().is_none() {
            return Err(CubeWireError::violation(format!(
                "unknown message type 0x{:02x}",
                frame.message_type
            )));
        }
        Ok(Message::decode(&frame)?)
    }

    pub fn frames_sent(&self) -> u64 {
        self.frames_sent
    }

    pub fn frames_received(&self) -> u64 {
        self.frames_received
    }

    pub fn max_frame_bytes(&self) -> u32 {
        self.max_frame_bytes
    }

    pub fn get_ref(&self) -> &S {
        &self.stream
    }

    pub fn get_mut(&mut self) -> &mut S {
        &mut self.stream
    }

    pub fn into_inner(self) -> S {
        self.stream
    }
}

/// Fill `buf` completely, retrying on `Interrupted`.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<()> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => return Err(CubeWireError::ConnectionClosed),
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(CubeWireError::Io(e)),
        }
    }
    Ok(())
}

/// Write header and payload, continuing after short writes.
fn write_frame_parts<W: Write>(writer: &mut W, header: &[u8], payload: &[u8]) -> Result<()> {
    let total_size = header.len() + payload.len();
    let mut total_written = 0;

    while total_written < total_size {
        let slices = remaining_slices(header, payload, total_written);
        match writer.write_vectored(&slices) {
            Ok(0) => {
                return Err(CubeWireError::Io(io::Error::new(
                    ErrorKind::WriteZero,
                    "write_vectored returned 0",
                )))
            }
            Ok(n) => total_written += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(CubeWireError::Io(e)),
        }
    }

    loop {
        match writer.flush() {
            Ok(()) => return Ok(()),
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(CubeWireError::Io(e)),
        }
    }
}

/// Build IoSlices for the bytes not yet written.
fn remaining_slices<'a>(header: &'a [u8], payload: &'a [u8], skip: usize) -> Vec<IoSlice<'a>> {
    let mut slices = Vec::with_capacity(2);
    if skip < header.len() {
        slices.push(IoSlice::new(&header[skip..]));
        if !payload.is_empty() {
            slices.push(IoSlice::new(payload));
        }
    } else {
        let start = skip - header.len();
        if start < payload.len() {
            slices.push(IoSlice::new(&payload[start..]));
        }
    }
    slices
}
