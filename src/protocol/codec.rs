//! PostgreSQL wire protocol encoding and decoding primitives.
//!
//! PostgreSQL uses big-endian (network byte order) for all integers.
//!
//! Every message except the startup message is framed as:
//!
//! ```text
//! ┌──────┬───────────────┬──────────────────┐
//! │ type │ length (i32)  │ payload          │
//! │ u8   │ counts itself │ length - 4 bytes │
//! └──────┴───────────────┴──────────────────┘
//! ```

use zerocopy::FromBytes;
use zerocopy::byteorder::big_endian::{I16, I32, U16, U32};

use crate::error::{Error, Result};

/// Size of a typed message header: type byte + length field.
pub const HEADER_LEN: usize = 5;

/// Largest payload accepted from the server (1 GiB, the server's own limit).
pub const MAX_MESSAGE_LEN: usize = 1 << 30;

/// Decode a typed message header.
///
/// Returns `Ok(None)` if fewer than [`HEADER_LEN`] bytes are available,
/// otherwise the type byte and the payload length (declared length - 4).
/// A declared length below 4 or a payload above [`MAX_MESSAGE_LEN`] is a
/// protocol error, raised before anything is reserved for the payload.
#[inline]
pub fn read_header(data: &[u8]) -> Result<Option<(u8, usize)>> {
    let Some(header) = data.get(..HEADER_LEN) else {
        return Ok(None);
    };
    let (len, _) = read_i32(&header[1..])?;
    if len < 4 || (len - 4) as usize > MAX_MESSAGE_LEN {
        return Err(Error::Protocol(format!(
            "invalid length {} for message '{}'",
            len, header[0] as char
        )));
    }
    Ok(Some((header[0], (len - 4) as usize)))
}

/// Read 1-byte unsigned integer.
#[inline]
pub fn read_u8(data: &[u8]) -> Result<(u8, &[u8])> {
    match data.split_first() {
        Some((value, rest)) => Ok((*value, rest)),
        None => Err(Error::Protocol("read_u8: empty buffer".into())),
    }
}

/// Read 2-byte big-endian signed integer.
#[inline]
pub fn read_i16(data: &[u8]) -> Result<(i16, &[u8])> {
    let (value, rest) = I16::read_from_prefix(data)
        .map_err(|_| Error::Protocol(format!("read_i16: buffer too short: {} < 2", data.len())))?;
    Ok((value.get(), rest))
}

/// Read 2-byte big-endian unsigned integer.
#[inline]
pub fn read_u16(data: &[u8]) -> Result<(u16, &[u8])> {
    let (value, rest) = U16::read_from_prefix(data)
        .map_err(|_| Error::Protocol(format!("read_u16: buffer too short: {} < 2", data.len())))?;
    Ok((value.get(), rest))
}

/// Read 4-byte big-endian signed integer.
#[inline]
pub fn read_i32(data: &[u8]) -> Result<(i32, &[u8])> {
    let (value, rest) = I32::read_from_prefix(data)
        .map_err(|_| Error::Protocol(format!("read_i32: buffer too short: {} < 4", data.len())))?;
    Ok((value.get(), rest))
}

/// Read 4-byte big-endian unsigned integer.
#[inline]
pub fn read_u32(data: &[u8]) -> Result<(u32, &[u8])> {
    let (value, rest) = U32::read_from_prefix(data)
        .map_err(|_| Error::Protocol(format!("read_u32: buffer too short: {} < 4", data.len())))?;
    Ok((value.get(), rest))
}

/// Read fixed-length bytes.
#[inline]
pub fn read_bytes(data: &[u8], len: usize) -> Result<(&[u8], &[u8])> {
    data.split_at_checked(len).ok_or_else(|| {
        Error::Protocol(format!(
            "read_bytes: buffer too short: {} < {}",
            data.len(),
            len
        ))
    })
}

/// Read null-terminated string (PostgreSQL String type).
/// Returns the string bytes (without the null terminator) and remaining data.
#[inline]
pub fn read_cstring(data: &[u8]) -> Result<(&[u8], &[u8])> {
    match memchr::memchr(0, data) {
        Some(pos) => Ok((&data[..pos], &data[pos + 1..])),
        None => Err(Error::Protocol(
            "read_cstring: no null terminator found".into(),
        )),
    }
}

/// Read null-terminated string as &str.
#[inline]
pub fn read_cstr(data: &[u8]) -> Result<(&str, &[u8])> {
    let (bytes, rest) = read_cstring(data)?;
    let s = simdutf8::compat::from_utf8(bytes)
        .map_err(|e| Error::Protocol(format!("read_cstr: invalid UTF-8: {e}")))?;
    Ok((s, rest))
}

/// Message builder helper that handles the length field.
///
/// PostgreSQL message format:
/// - Type byte (1 byte) - NOT included in length
/// - Length (4 bytes) - includes itself
/// - Payload (Length - 4 bytes)
pub struct MessageBuilder<'a> {
    buf: &'a mut Vec<u8>,
    start: usize,
}

impl<'a> MessageBuilder<'a> {
    /// Start building a message with a type byte.
    pub fn new(buf: &'a mut Vec<u8>, type_byte: u8) -> Self {
        buf.push(type_byte);
        let start = buf.len();
        buf.extend_from_slice(&[0, 0, 0, 0]); // Placeholder for length
        Self { buf, start }
    }

    /// Start building a startup message (no type byte).
    pub fn new_startup(buf: &'a mut Vec<u8>) -> Self {
        let start = buf.len();
        buf.extend_from_slice(&[0, 0, 0, 0]); // Placeholder for length
        Self { buf, start }
    }

    /// Write a u8.
    pub fn write_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    /// Write an i32.
    pub fn write_i32(&mut self, value: i32) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    /// Write raw bytes.
    pub fn write_bytes(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Write null-terminated string.
    pub fn write_cstr(&mut self, s: &str) {
        self.buf.extend_from_slice(s.as_bytes());
        self.buf.push(0);
    }

    /// Finish building the message and fill in the length field.
    pub fn finish(self) {
        let len = (self.buf.len() - self.start) as i32;
        self.buf[self.start..self.start + 4].copy_from_slice(&len.to_be_bytes());
    }
}
