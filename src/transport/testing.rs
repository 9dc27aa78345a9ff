//! In-memory streams for unit tests.

use std::io::{self, Cursor, ErrorKind, Read, Write};

use crate::protocol::{Message, FRAME_HEADER_SIZE};

/// Encode a frame exactly as it appears on the wire.
pub fn frame_bytes(message_type: u8, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(FRAME_HEADER_SIZE + payload.len());
    out.extend_from_slice(&(payload.len() as u32 + 1).to_be_bytes());
    out.push(message_type);
    out.extend_from_slice(payload);
    out
}

/// Concatenate the wire encoding of several server messages.
pub fn script(messages: &[Message]) -> Vec<u8> {
    messages
        .iter()
        .flat_map(|m| frame_bytes(m.message_type().as_u8(), &m.encode()))
        .collect()
}

/// Reads scripted input, records output.
#[derive(Default)]
pub struct MockStream {
    pub input: Cursor<Vec<u8>>,
    pub output: Vec<u8>,
    fail: Option<ErrorKind>,
}

impl MockStream {
    pub fn with_input(input: Vec<u8>) -> Self {
        Self {
            input: Cursor::new(input),
            ..Default::default()
        }
    }

    /// Every read and write fails with `kind`.
    pub fn failing(kind: ErrorKind) -> Self {
        Self {
            fail: Some(kind),
            ..Default::default()
        }
    }

    /// Messages written by the client, decoded.
    pub fn sent_messages(&self) -> Vec<Message> {
        let mut out = Vec::new();
        let mut rest = &self.output[..];
        while rest.len() >= FRAME_HEADER_SIZE {
            let len = u32::from_be_bytes([rest[0], rest[1], rest[2], rest[3]]) as usize;
            let frame = crate::protocol::Frame::from_parts(rest[4], &rest[5..4 + len]);
            out.push(Message::decode(&frame).expect("client sent a malformed frame"));
            rest = &rest[4 + len..];
        }
        out
    }
}

impl Read for MockStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if let Some(kind) = self.fail {
            return Err(io::Error::new(kind, "mock failure"));
        }
        self.input.read(buf)
    }
}

impl Write for MockStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if let Some(kind) = self.fail {
            return Err(io::Error::new(kind, "mock failure"));
        }
        self.output.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Moves at most `chunk` bytes per call and raises `Interrupted` before
/// every successful call.
pub struct ChunkedStream {
    input: Vec<u8>,
    pos: usize,
    pub written: Vec<u8>,
    chunk: usize,
    interrupt_next: bool,
}

impl ChunkedStream {
    pub fn new(input: Vec<u8>, chunk: usize) -> Self {
        Self {
            input,
            pos: 0,
            written: Vec::new(),
            chunk,
            interrupt_next: true,
        }
    }

    fn interrupted(&mut self) -> bool {
        let fire = self.interrupt_next;
        self.interrupt_next = !self.interrupt_next;
        fire
    }
}

impl Read for ChunkedStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.interrupted() {
            return Err(ErrorKind::Interrupted.into());
        }
        let n = self.chunk.min(buf.len()).min(self.input.len() - self.pos);
        buf[..n].copy_from_slice(&self.input[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

impl Write for ChunkedStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.interrupted() {
            return Err(ErrorKind::Interrupted.into());
        }
        let n = self.chunk.min(buf.len());
        self.written.extend_from_slice(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
