//! Codec module - body encoding for session protocol messages.
//!
//! Every message body is a sequence of big-endian primitives:
//!
//! | Primitive | Encoding                         |
//! |-----------|----------------------------------|
//! | `u32`     | 4 bytes BE                       |
//! | `i64`     | 8 bytes BE                       |
//! | `bool`    | 1 byte, `0` or `1`               |
//! | `string`  | `u32` length + UTF-8 bytes       |
//! | `bytes`   | `u32` length + raw bytes         |
//!
//! # Example
//!
//! ```
//! use cubewire::codec::{BodyReader, BodyWriter};
//!
//! let mut writer = BodyWriter::new();
//! writer.put_u32(1).put_string("hello");
//! let body = writer.finish();
//!
//! let mut reader = BodyReader::new(&body);
//! assert_eq!(reader.get_u32().unwrap(), 1);
//! assert_eq!(reader.get_string().unwrap(), "hello");
//! reader.finish().unwrap();
//! ```

mod body;

pub use body::{BodyReader, BodyWriter};
