use core::fmt;

use bytes::Buf;

use crate::encoding::Cursor;
use crate::{DecodeError, ZigZagUnrepresentable};

/// Zig-zag encoding: These functions implement storing signed in unsigned integers by encoding the
/// sign bit in the least significant bit.

#[inline]
pub fn i32_to_zigzag(value: i32) -> u32 {
    ((value << 1) ^ (value >> 31)) as u32
}

#[inline]
pub fn zigzag_to_i32(value: u32) -> i32 {
    ((value >> 1) as i32) ^ (-((value & 1) as i32))
}

#[inline]
pub fn i64_to_zigzag(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

/// Zig-zag decodes `value`, or returns `None` when the result cannot be held by an `i64`.
///
/// Odd values decode to `-((value >> 1) + 1)`. The largest odd value, `u64::MAX`, has a magnitude
/// of 2^63, which is not a positive `i64`, so it is the single value reported as unrepresentable.
#[inline]
pub fn zigzag_to_i64(value: u64) -> Option<i64> {
    let half = i64::try_from(value >> 1).ok()?;
    if value & 1 == 0 {
        Some(half)
    } else {
        half.checked_add(1).map(|magnitude| -magnitude)
    }
}

/// The raw payload of a varint field.
///
/// Only the raw 64 bits are stored; every other view is computed from them on demand.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct VarintValue(u64);

impl VarintValue {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Decodes one varint from the cursor.
    #[inline]
    pub fn decode<B: Buf + ?Sized>(cursor: &mut Cursor<B>) -> Result<Self, DecodeError> {
        cursor.decode_varint().map(Self)
    }

    /// The raw value, as used by `uint64`, `uint32` and enum fields.
    #[inline]
    pub const fn as_unsigned(&self) -> u64 {
        self.0
    }

    /// The low 32 bits as a two's-complement `i32`, as used by `int32` fields. Higher bits are
    /// truncated, not range checked.
    #[inline]
    pub const fn as_twos_compliment32(&self) -> i32 {
        self.0 as u32 as i32
    }

    /// All 64 bits as a two's-complement `i64`, as used by `int64` fields.
    #[inline]
    pub const fn as_twos_compliment64(&self) -> i64 {
        self.0 as i64
    }

    /// The zig-zag decoded value, as used by `sint64` fields.
    #[inline]
    pub fn as_zigzag(&self) -> Result<i64, ZigZagUnrepresentable> {
        zigzag_to_i64(self.0).ok_or(ZigZagUnrepresentable::new(self.0))
    }

    /// The zig-zag decoding of the low 32 bits, as used by `sint32` fields.
    #[inline]
    pub fn as_zigzag32(&self) -> i32 {
        zigzag_to_i32(self.0 as u32)
    }

    /// Whether the value is non-zero, as used by `bool` fields.
    #[inline]
    pub const fn as_bool(&self) -> bool {
        self.0 != 0
    }
}

impl From<u64> for VarintValue {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Debug for VarintValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("VarintValue");
        s.field("unsigned", &self.as_unsigned())
            .field("twos_compliment32", &self.as_twos_compliment32())
            .field("twos_compliment64", &self.as_twos_compliment64());
        match self.as_zigzag() {
            Ok(zigzag) => s.field("zigzag", &zigzag),
            Err(_) => s.field("zigzag", &format_args!("<unrepresentable>")),
        };
        s.finish()
    }
}
