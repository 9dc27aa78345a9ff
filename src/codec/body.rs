//! Bounds-checked reader and writer for message bodies.
//!
//! The reader never panics on short input: every primitive checks the
//! remaining length before touching the buffer.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::DecodeError;

/// Builds a message body.
#[derive(Debug, Default)]
pub struct BodyWriter {
    buf: BytesMut,
}

impl BodyWriter {
    /// Create an empty body writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a writer with pre-allocated capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
        }
    }

    pub fn put_u32(&mut self, value: u32) -> &mut Self {
        self.buf.put_u32(value);
        self
    }

    pub fn put_i64(&mut self, value: i64) -> &mut Self {
        self.buf.put_i64(value);
        self
    }

    pub fn put_bool(&mut self, value: bool) -> &mut Self {
        self.buf.put_u8(u8::from(value));
        self
    }

    /// Length-prefixed UTF-8 string.
    pub fn put_string(&mut self, value: &str) -> &mut Self {
        self.put_bytes(value.as_bytes())
    }

    /// Length-prefixed raw bytes.
    ///
    /// # Panics
    ///
    /// Panics if `value` is longer than `u32::MAX` bytes.
    pub fn put_bytes(&mut self, value: &[u8]) -> &mut Self {
        let len = u32::try_from(value.len()).expect("body field longer than u32::MAX");
        self.buf.reserve(4 + value.len());
        self.buf.put_u32(len);
        self.buf.put_slice(value);
        self
    }

    /// Current encoded length.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Freeze the body into immutable bytes.
    pub fn finish(self) -> Bytes {
        self.buf.freeze()
    }
}

/// Reads primitives from a message body.
#[derive(Debug)]
pub struct BodyReader<'a> {
    buf: &'a [u8],
}

impl<'a> BodyReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    /// Bytes not yet consumed.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    fn ensure(&self, needed: usize) -> Result<(), DecodeError> {
        if self.buf.remaining() < needed {
            return Err(DecodeError::truncated(needed, self.buf.remaining()));
        }
        Ok(())
    }

    pub fn get_u32(&mut self) -> Result<u32, DecodeError> {
        self.ensure(4)?;
        Ok(self.buf.get_u32())
    }

    pub fn get_i64(&mut self) -> Result<i64, DecodeError> {
        self.ensure(8)?;
        Ok(self.buf.get_i64())
    }

    pub fn get_bool(&mut self) -> Result<bool, DecodeError> {
        self.ensure(1)?;
        match self.buf.get_u8() {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(DecodeError::malformed(format!(
                "invalid boolean byte 0x{other:02x}"
            ))),
        }
    }

    /// Length-prefixed raw bytes, borrowed from the body.
    pub fn get_bytes(&mut self) -> Result<&'a [u8], DecodeError> {
        let len = self.get_u32()? as usize;
        self.ensure(len)?;
        let (head, tail) = self.buf.split_at(len);
        self.buf = tail;
        Ok(head)
    }

    /// Length-prefixed UTF-8 string.
    pub fn get_string(&mut self) -> Result<String, DecodeError> {
        let raw = self.get_bytes()?;
        std::str::from_utf8(raw)
            .map(str::to_owned)
            .map_err(|e| DecodeError::malformed(format!("invalid UTF-8 string: {e}")))
    }

    /// Assert the whole body was consumed.
    pub fn finish(self) -> Result<(), DecodeError> {
        if self.buf.is_empty() {
            Ok(())
        } else {
            Err(DecodeError::malformed(format!(
                "{} trailing bytes after message body",
                self.buf.len()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitives_are_big_endian() {
        let mut writer = BodyWriter::new();
        writer.put_u32(0x01020304).put_i64(-2).put_bool(true);
        let body = writer.finish();

        assert_eq!(&body[..4], &[1, 2, 3, 4]);
        assert_eq!(&body[4..12], &(-2i64).to_be_bytes());
        assert_eq!(body[12], 1);
    }

    #[test]
    fn test_string_is_length_prefixed() {
        let mut writer = BodyWriter::new();
        writer.put_string("abc");
        let body = writer.finish();

        assert_eq!(&body[..], &[0, 0, 0, 3, b'a', b'b', b'c']);
    }

    #[test]
    fn test_read_back_mixed_fields() {
        let mut writer = BodyWriter::with_capacity(64);
        writer
            .put_u32(7)
            .put_string("cube")
            .put_bool(false)
            .put_bytes(&[0xFF, 0x00])
            .put_i64(i64::MIN);
        let body = writer.finish();

        let mut reader = BodyReader::new(&body);
        assert_eq!(reader.get_u32().unwrap(), 7);
        assert_eq!(reader.get_string().unwrap(), "cube");
        assert!(!reader.get_bool().unwrap());
        assert_eq!(reader.get_bytes().unwrap(), &[0xFF, 0x00]);
        assert_eq!(reader.get_i64().unwrap(), i64::MIN);
        assert!(reader.finish().is_ok());
    }

    #[test]
    fn test_short_buffer_is_truncated_not_panic() {
        let mut reader = BodyReader::new(&[0, 0]);
        assert_eq!(
            reader.get_u32(),
            Err(DecodeError::TruncatedMessage {
                needed: 4,
                available: 2
            })
        );
    }

    #[test]
    fn test_string_length_past_end() {
        // Claims 100 bytes, carries 2.
        let mut reader = BodyReader::new(&[0, 0, 0, 100, b'h', b'i']);
        assert!(matches!(
            reader.get_string(),
            Err(DecodeError::TruncatedMessage { needed: 100, .. })
        ));
    }

    #[test]
    fn test_invalid_bool_byte() {
        let mut reader = BodyReader::new(&[2]);
        assert!(matches!(
            reader.get_bool(),
            Err(DecodeError::MalformedBody(_))
        ));
    }

    #[test]
    fn test_invalid_utf8() {
        let mut reader = BodyReader::new(&[0, 0, 0, 2, 0xC3, 0x28]);
        assert!(matches!(
            reader.get_string(),
            Err(DecodeError::MalformedBody(_))
        ));
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let reader = BodyReader::new(&[1]);
        assert!(reader.finish().is_err());
    }
}
