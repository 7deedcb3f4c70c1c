//! Wire-level primitives: varints, wire types, tags, and the byte cursor that message decoding
//! reads through.

use core::cmp::min;
use core::convert::TryFrom;
use core::fmt;

use bytes::{Buf, BufMut, Bytes};

use crate::DecodeError;
use crate::DecodeErrorKind::{Oversize, Truncated, UnknownWireType, VarintOverlong};

mod fixed;
mod varint;

pub use fixed::{Fixed32Value, Fixed64Value};
pub use varint::{i32_to_zigzag, i64_to_zigzag, zigzag_to_i32, zigzag_to_i64, VarintValue};

/// The longest a varint may be: 10 bytes of 7 bits each covers all 64 bits.
pub const MAX_VARINT_LEN: usize = 10;

/// Encodes an integer value into LEB128 variable length format, and writes it to the buffer. The
/// buffer must have enough remaining space (maximum 10 bytes).
#[inline]
pub fn encode_varint<B: BufMut + ?Sized>(mut value: u64, buf: &mut B) {
    loop {
        if value < 0x80 {
            buf.put_u8(value as u8);
            break;
        }
        buf.put_u8(((value & 0x7F) | 0x80) as u8);
        value >>= 7;
    }
}

/// Returns the encoded length of the value in LEB128 variable length format.
/// The returned value will be between 1 and 10, inclusive.
#[inline]
pub fn encoded_len_varint(value: u64) -> usize {
    // Based on [VarintSize64][1].
    // [1]: https://github.com/google/protobuf/blob/3.3.x/src/google/protobuf/io/coded_stream.h#L1301-L1309
    ((((value | 1).leading_zeros() ^ 63) * 9 + 73) / 64) as usize
}

/// Decodes a LEB128-encoded variable length integer from the buffer.
///
/// Bits beyond the 64th, which only the tenth byte can carry, are discarded.
#[inline]
pub fn decode_varint<B: Buf + ?Sized>(buf: &mut B) -> Result<u64, DecodeError> {
    let bytes = buf.chunk();
    let len = bytes.len();
    if len == 0 {
        return Err(DecodeError::new(Truncated));
    }

    let byte = bytes[0];
    if byte < 0x80 {
        buf.advance(1);
        Ok(u64::from(byte))
    } else if len >= MAX_VARINT_LEN || bytes[len - 1] < 0x80 {
        let (value, advance) = decode_varint_slice(bytes)?;
        buf.advance(advance);
        Ok(value)
    } else {
        decode_varint_slow(buf)
    }
}

/// Decodes a LEB128-encoded variable length integer from the slice, returning the value and the
/// number of bytes read.
///
/// The caller must ensure that `bytes` is non-empty and either `bytes.len() >= 10` or the last
/// element in bytes is < `0x80`; otherwise a truncated varint is reported as overlong.
#[inline]
fn decode_varint_slice(bytes: &[u8]) -> Result<(u64, usize), DecodeError> {
    debug_assert!(!bytes.is_empty());
    debug_assert!(bytes.len() >= MAX_VARINT_LEN || bytes[bytes.len() - 1] < 0x80);

    let mut value = 0u64;
    for (count, &byte) in bytes.iter().take(MAX_VARINT_LEN).enumerate() {
        value |= u64::from(byte & 0x7F) << (count * 7);
        if byte < 0x80 {
            return Ok((value, count + 1));
        }
    }
    Err(DecodeError::new(VarintOverlong))
}

/// Decodes a LEB128-encoded variable length integer from the buffer one byte at a time, for
/// varints that straddle chunks of a non-contiguous buffer.
#[inline(never)]
#[cold]
fn decode_varint_slow<B: Buf + ?Sized>(buf: &mut B) -> Result<u64, DecodeError> {
    let mut value = 0;
    let limit = min(MAX_VARINT_LEN, buf.remaining());
    for count in 0..limit {
        let byte = buf.get_u8();
        value |= u64::from(byte & 0x7F) << (count * 7);
        if byte < 0x80 {
            return Ok(value);
        }
    }
    // Every byte so far had its high bit set. Either we read all ten bytes a varint may have, or
    // the buffer ran out first.
    if limit == MAX_VARINT_LEN {
        Err(DecodeError::new(VarintOverlong))
    } else {
        Err(DecodeError::new(Truncated))
    }
}

/// The encoding of the bytes that follow a tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum WireType {
    Varint = 0,
    I64 = 1,
    Len = 2,
    I32 = 5,
}

impl TryFrom<u64> for WireType {
    type Error = DecodeError;

    #[inline]
    fn try_from(value: u64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(WireType::Varint),
            1 => Ok(WireType::I64),
            2 => Ok(WireType::Len),
            5 => Ok(WireType::I32),
            // 3 and 4 are the deprecated group delimiters, which are not supported.
            _ => Err(DecodeError::new(UnknownWireType)),
        }
    }
}

impl fmt::Display for WireType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            WireType::Varint => "VARINT",
            WireType::I64 => "I64",
            WireType::Len => "LEN",
            WireType::I32 => "I32",
        })
    }
}

/// A field key: the field number and the wire type of the value that follows it.
///
/// Field numbers are not required to be unique or ordered within a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Tag {
    pub field_num: u64,
    pub wire_type: WireType,
}

impl Tag {
    /// The largest field number that fits in a tag alongside its 3-bit wire type.
    pub const MAX_FIELD_NUM: u64 = u64::MAX >> 3;

    pub const fn new(field_num: u64, wire_type: WireType) -> Self {
        Self {
            field_num,
            wire_type,
        }
    }

    /// Splits a decoded key varint into its field number (upper bits) and wire type (low 3 bits).
    #[inline]
    pub fn from_key(key: u64) -> Result<Self, DecodeError> {
        Ok(Self {
            field_num: key >> 3,
            wire_type: WireType::try_from(key & 0b111)?,
        })
    }

    /// The key varint this tag is encoded as.
    ///
    /// Panics if the field number is greater than `Tag::MAX_FIELD_NUM`.
    #[inline]
    pub fn key(&self) -> u64 {
        assert!(
            self.field_num <= Self::MAX_FIELD_NUM,
            "field number {} is too large to encode",
            self.field_num
        );
        (self.field_num << 3) | (self.wire_type as u64)
    }

    /// Encodes the tag into the buffer.
    #[inline]
    pub fn encode<B: BufMut + ?Sized>(&self, buf: &mut B) {
        encode_varint(self.key(), buf);
    }

    /// Returns the encoded length of the tag.
    #[inline]
    pub fn encoded_len(&self) -> usize {
        encoded_len_varint(self.key())
    }
}

/// A read position over an immutable input buffer, with an optional cap short of the buffer's end.
///
/// The cap is soft: reading through the wrapped buffer doesn't invoke extra work, only checking the
/// remaining bytes does. Every read that goes through the cursor itself is checked against the cap.
pub struct Cursor<'a, B: 'a + Buf + ?Sized> {
    buf: &'a mut B,
    extra_bytes_remaining: usize,
    /// Bytes remaining in the buffer when the outermost cursor was created, for reporting offsets.
    start_remaining: usize,
}

impl<'a, B: 'a + Buf + ?Sized> Cursor<'a, B> {
    /// Creates a cursor with its cap at the very end of the given buffer.
    pub fn new(buf: &'a mut B) -> Self {
        let start_remaining = buf.remaining();
        Self {
            buf,
            extra_bytes_remaining: 0,
            start_remaining,
        }
    }

    /// Reads a length from the beginning of the given buffer, then returns a cursor with its cap
    /// at the end of the delimited range.
    pub fn new_length_delimited(buf: &'a mut B) -> Result<Self, DecodeError> {
        let start_remaining = buf.remaining();
        let len = decode_length(&mut *buf)?;
        let remaining = buf.remaining();
        if len > remaining {
            return Err(DecodeError::new(Truncated));
        }
        Ok(Self {
            buf,
            extra_bytes_remaining: remaining - len,
            start_remaining,
        })
    }

    /// Returns the number of bytes left before the cap.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.buf
            .remaining()
            .saturating_sub(self.extra_bytes_remaining)
    }

    /// Returns true when no bytes are left before the cap.
    #[inline]
    pub fn at_end(&self) -> bool {
        self.remaining() == 0
    }

    /// Returns the number of bytes read since the outermost cursor was created.
    #[inline]
    pub fn position(&self) -> usize {
        self.start_remaining - self.buf.remaining()
    }

    /// Returns the next byte without consuming it.
    #[inline]
    pub fn peek(&self) -> Option<u8> {
        if self.at_end() {
            None
        } else {
            self.buf.chunk().first().copied()
        }
    }

    /// Consumes the next `n` bytes.
    pub fn consume(&mut self, n: usize) -> Result<Bytes, DecodeError> {
        if n > self.remaining() {
            return Err(DecodeError::new(Truncated));
        }
        Ok(self.buf.copy_to_bytes(n))
    }

    /// Consumes exactly `N` bytes into an array.
    #[inline]
    pub fn consume_array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        if N > self.remaining() {
            return Err(DecodeError::new(Truncated));
        }
        let mut out = [0u8; N];
        self.buf.copy_to_slice(&mut out);
        Ok(out)
    }

    /// Decodes a varint, failing with `Truncated` if it would run past the cap.
    #[inline]
    pub fn decode_varint(&mut self) -> Result<u64, DecodeError> {
        if self.extra_bytes_remaining == 0 {
            decode_varint(self.buf)
        } else {
            let limit = self.remaining();
            decode_varint(&mut (&mut *self.buf).take(limit))
        }
    }

    /// Decodes a tag.
    #[inline]
    pub fn decode_tag(&mut self) -> Result<Tag, DecodeError> {
        Tag::from_key(self.decode_varint()?)
    }

    /// Decodes a length delimiter and consumes that many bytes.
    pub fn decode_length_delimited(&mut self) -> Result<Bytes, DecodeError> {
        let len = usize::try_from(self.decode_varint()?)
            .map_err(|_| DecodeError::new(Oversize))?;
        self.consume(len)
    }

    /// Consumes the cursor as an iterator that calls `read_with` until the cap is reached.
    #[inline]
    pub fn consume_all<F, R>(self, read_with: F) -> CursorConsumer<'a, B, F>
    where
        F: FnMut(&mut Cursor<B>) -> Result<R, DecodeError>,
    {
        CursorConsumer::new(self, read_with)
    }
}

fn decode_length<B: Buf + ?Sized>(buf: &mut B) -> Result<usize, DecodeError> {
    usize::try_from(decode_varint(buf)?).map_err(|_| DecodeError::new(Oversize))
}

/// Iterator returned by [`Cursor::consume_all`].
pub struct CursorConsumer<'a, B: Buf + ?Sized, F> {
    cursor: Cursor<'a, B>,
    reader: F,
}

impl<'a, B: Buf + ?Sized, F> CursorConsumer<'a, B, F> {
    fn new(cursor: Cursor<'a, B>, reader: F) -> Self {
        Self { cursor, reader }
    }
}

impl<'a, B: Buf + ?Sized, T, F> Iterator for CursorConsumer<'a, B, F>
where
    F: FnMut(&mut Cursor<B>) -> Result<T, DecodeError>,
{
    type Item = Result<T, DecodeError>;

    fn next(&mut self) -> Option<Result<T, DecodeError>> {
        if self.cursor.at_end() {
            return None;
        }
        let res = (self.reader)(&mut self.cursor);
        if res.is_ok() && self.cursor.buf.remaining() < self.cursor.extra_bytes_remaining {
            return Some(Err(DecodeError::new(Truncated)));
        }
        Some(res)
    }
}
