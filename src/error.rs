//! Wire decoding and encoding errors.

use core::fmt;

/// Wire decoding error types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum DecodeErrorKind {
    /// The input ended inside a varint, a fixed-width value, or a length-delimited payload.
    Truncated,
    /// A varint ran past 10 bytes without a terminating byte.
    VarintOverlong,
    /// A tag's low 3 bits did not name a supported wire type.
    UnknownWireType,
    /// A length or the input itself exceeds what is supported on this platform or what the decode
    /// options allow.
    Oversize,
    /// The message has more fields than the decode options allow.
    TooManyFields,
}

use DecodeErrorKind::*;

impl fmt::Display for DecodeErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Truncated => "message or region truncated",
            VarintOverlong => "varint longer than 10 bytes",
            UnknownWireType => "unknown wire type",
            Oversize => "region too large to decode",
            TooManyFields => "too many fields",
        })
    }
}

/// Where in the input a decoding error was detected.
#[cfg(feature = "detailed-errors")]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct Location {
    /// Byte offset of the start of the field being decoded.
    offset: usize,
    /// Field number of the field being decoded, if its tag was read successfully.
    field_num: Option<u64>,
}

/// A wire decoding error.
///
/// `DecodeError` indicates that the input buffer does not hold a complete, well-formed sequence of
/// tag/value pairs. No partially decoded message is ever returned alongside it.
///
/// With the "detailed-errors" feature the error also carries the byte offset where the failing
/// field began and, when the field's tag could be read, its field number.
#[derive(Clone, PartialEq, Eq)]
pub struct DecodeError {
    /// A 'best effort' root cause description.
    kind: DecodeErrorKind,
    #[cfg(feature = "detailed-errors")]
    location: Option<Location>,
}

impl DecodeError {
    /// Creates a new `DecodeError` with a 'best effort' root cause description.
    #[cold]
    pub fn new(kind: DecodeErrorKind) -> DecodeError {
        DecodeError {
            kind,
            #[cfg(feature = "detailed-errors")]
            location: None,
        }
    }

    /// Returns the kind of this error.
    pub fn kind(&self) -> DecodeErrorKind {
        self.kind
    }

    /// Returns the byte offset of the field that failed to decode, if known.
    pub fn offset(&self) -> Option<usize> {
        #[cfg(feature = "detailed-errors")]
        return self.location.map(|loc| loc.offset);
        #[cfg(not(feature = "detailed-errors"))]
        None
    }

    /// Returns the field number of the field that failed to decode, if its tag had been read.
    pub fn field_num(&self) -> Option<u64> {
        #[cfg(feature = "detailed-errors")]
        return self.location.and_then(|loc| loc.field_num);
        #[cfg(not(feature = "detailed-errors"))]
        None
    }

    /// Records the location of the field being decoded when the error was raised. The first
    /// location recorded wins.
    #[allow(unused_mut)]
    pub(crate) fn at(mut self, offset: usize, field_num: Option<u64>) -> DecodeError {
        #[cfg(feature = "detailed-errors")]
        if self.location.is_none() {
            self.location = Some(Location { offset, field_num });
        }
        _ = (offset, field_num);
        self
    }
}

impl From<DecodeErrorKind> for DecodeError {
    fn from(kind: DecodeErrorKind) -> Self {
        DecodeError::new(kind)
    }
}

impl fmt::Debug for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("DecodeError");
        s.field("description", &self.kind);
        #[cfg(feature = "detailed-errors")]
        s.field("location", &self.location);
        s.finish()
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("failed to decode wire message: ")?;
        #[cfg(feature = "detailed-errors")]
        if let Some(location) = &self.location {
            write!(f, "at offset {}", location.offset)?;
            if let Some(field_num) = location.field_num {
                write!(f, " (field {})", field_num)?;
            }
            f.write_str(": ")?;
        }
        self.kind.fmt(f)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for DecodeError {}

#[cfg(feature = "std")]
impl From<DecodeError> for std::io::Error {
    fn from(error: DecodeError) -> std::io::Error {
        std::io::Error::new(std::io::ErrorKind::InvalidData, error)
    }
}

/// Returned by [`VarintValue::as_zigzag`][crate::encoding::VarintValue::as_zigzag] when the raw
/// value's zig-zag decoding does not fit in an `i64`.
///
/// This is not a decoding failure: the raw value is still available and authoritative.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ZigZagUnrepresentable {
    raw: u64,
}

impl ZigZagUnrepresentable {
    pub(crate) fn new(raw: u64) -> Self {
        Self { raw }
    }

    /// The raw varint value that could not be zig-zag decoded.
    pub fn raw(&self) -> u64 {
        self.raw
    }
}

impl fmt::Display for ZigZagUnrepresentable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "zig-zag decoding of varint {} is not representable as a 64-bit signed integer",
            self.raw
        )
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ZigZagUnrepresentable {}

/// A wire message encoding error.
///
/// `EncodeError` always indicates that a message failed to encode because the
/// provided buffer had insufficient capacity. Message encoding is otherwise
/// infallible.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct EncodeError {
    required: usize,
    remaining: usize,
}

impl EncodeError {
    /// Creates a new `EncodeError`.
    pub(crate) fn new(required: usize, remaining: usize) -> EncodeError {
        EncodeError {
            required,
            remaining,
        }
    }

    /// Returns the required buffer capacity to encode the message.
    pub fn required_capacity(&self) -> usize {
        self.required
    }

    /// Returns the remaining length in the provided buffer at the time of encoding.
    pub fn remaining(&self) -> usize {
        self.remaining
    }
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "failed to encode wire message; insufficient buffer capacity \
            (required: {}, remaining: {})",
            self.required, self.remaining
        )
    }
}

#[cfg(feature = "std")]
impl std::error::Error for EncodeError {}

#[cfg(feature = "std")]
impl From<EncodeError> for std::io::Error {
    fn from(error: EncodeError) -> std::io::Error {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, error)
    }
}
