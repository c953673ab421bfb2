//! Little-endian field codec for event payloads.
//!
//! Variable-size fields are length-prefixed with a u32; strings are raw
//! UTF-8 bytes with no terminator.

use convi::ExpectInto as _;
use snafu::{Location, ResultExt as _, Snafu};

use crate::IpAddress;
use crate::id::ForumId;

#[derive(Debug, Snafu)]
pub enum WireError {
    #[snafu(display("Event data ended before the expected field"))]
    Truncated {
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("Event data carries a string that is not valid UTF-8"))]
    InvalidUtf8 {
        source: std::str::Utf8Error,
        #[snafu(implicit)]
        location: Location,
    },
}

pub type WireResult<T> = std::result::Result<T, WireError>;

/// Appends fields to a buffer pre-sized by the caller.
pub struct BlobWriter {
    buf: Vec<u8>,
}

impl BlobWriter {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.buf
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn write_u16(&mut self, value: u16) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_i16(&mut self, value: i16) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_u64(&mut self, value: u64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_i64(&mut self, value: i64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_id(&mut self, id: ForumId) {
        self.buf.extend_from_slice(id.as_slice());
    }

    pub fn write_ip(&mut self, ip: IpAddress) {
        self.buf.extend_from_slice(&ip.to_bytes());
    }

    /// u32 length prefix followed by the raw bytes.
    pub fn write_lp_bytes(&mut self, bytes: &[u8]) {
        self.write_u32(bytes.len().expect_into());
        self.buf.extend_from_slice(bytes);
    }

    pub fn write_lp_str(&mut self, s: &str) {
        self.write_lp_bytes(s.as_bytes());
    }
}

/// The size a length-prefixed field occupies on the wire.
pub fn lp_size(len: usize) -> usize {
    size_of::<u32>() + len
}

/// Checked reader over one event payload.
pub struct BlobReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> BlobReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn take(&mut self, len: usize) -> WireResult<&'a [u8]> {
        if self.remaining() < len {
            return TruncatedSnafu.fail();
        }
        let slice = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    pub fn read_u8(&mut self) -> WireResult<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16(&mut self) -> WireResult<u16> {
        Ok(u16::from_le_bytes(
            self.take(2)?.try_into().expect("Fixed size"),
        ))
    }

    pub fn read_i16(&mut self) -> WireResult<i16> {
        Ok(i16::from_le_bytes(
            self.take(2)?.try_into().expect("Fixed size"),
        ))
    }

    pub fn read_u32(&mut self) -> WireResult<u32> {
        Ok(u32::from_le_bytes(
            self.take(4)?.try_into().expect("Fixed size"),
        ))
    }

    pub fn read_u64(&mut self) -> WireResult<u64> {
        Ok(u64::from_le_bytes(
            self.take(8)?.try_into().expect("Fixed size"),
        ))
    }

    pub fn read_i64(&mut self) -> WireResult<i64> {
        Ok(i64::from_le_bytes(
            self.take(8)?.try_into().expect("Fixed size"),
        ))
    }

    pub fn read_id(&mut self) -> WireResult<ForumId> {
        Ok(ForumId::from_bytes(
            self.take(ForumId::SIZE)?.try_into().expect("Fixed size"),
        ))
    }

    pub fn read_ip(&mut self) -> WireResult<IpAddress> {
        Ok(IpAddress::from_bytes(
            self.take(IpAddress::SIZE)?.try_into().expect("Fixed size"),
        ))
    }

    pub fn read_lp_bytes(&mut self) -> WireResult<&'a [u8]> {
        let len = self.read_u32()?;
        self.take(len.expect_into())
    }

    pub fn read_lp_str(&mut self) -> WireResult<&'a str> {
        std::str::from_utf8(self.read_lp_bytes()?).context(InvalidUtf8Snafu)
    }
}
