#![no_std]
#![doc(html_root_url = "https://docs.rs/pbwire/0.1.0-dev")]
#![doc = include_str!("../README.md")]

extern crate alloc;
#[cfg(feature = "std")]
extern crate std;

/// Re-export of the bytes crate, whose buffer types appear throughout the API.
pub use bytes;

mod error;
mod message;

pub mod encoding;

pub use crate::encoding::{Fixed32Value, Fixed64Value, Tag, VarintValue, WireType};
pub use crate::error::{DecodeError, DecodeErrorKind, EncodeError, ZigZagUnrepresentable};
pub use crate::message::{DecodeOptions, Message, TagAndValue, Value};

use bytes::{Buf, BufMut};

use crate::encoding::{decode_varint, encode_varint, encoded_len_varint};

/// Decodes a complete protobuf wire message from `buf`, without a schema.
///
/// Every byte must belong to some field: the result is either the full ordered list of fields or
/// an error, never a partial message.
///
/// ```
/// let message = pbwire::parse(&[0x08, 0x96, 0x01]).unwrap();
/// assert_eq!(message.len(), 1);
/// assert_eq!(message[0].field_num(), 1);
/// assert_eq!(message[0].value().as_varint().unwrap().as_unsigned(), 150);
/// ```
pub fn parse(buf: &[u8]) -> Result<Message, DecodeError> {
    Message::decode(buf)
}

/// Encodes a length delimiter to the buffer.
///
/// See [Message::encode_length_delimited] for more info.
///
/// An error will be returned if the buffer does not have sufficient capacity to encode the
/// delimiter.
#[inline]
pub fn encode_length_delimiter<B>(length: usize, buf: &mut B) -> Result<(), EncodeError>
where
    B: BufMut + ?Sized,
{
    let length = length as u64;
    let required = encoded_len_varint(length);
    let remaining = buf.remaining_mut();
    if required > remaining {
        return Err(EncodeError::new(required, remaining));
    }
    encode_varint(length, buf);
    Ok(())
}

/// Returns the encoded length of a length delimiter.
///
/// Applications may use this method to ensure sufficient buffer capacity before calling
/// `encode_length_delimiter`. The returned size will be between 1 and 10, inclusive.
#[inline(always)]
pub fn length_delimiter_len(length: usize) -> usize {
    encoded_len_varint(length as u64)
}

/// Decodes a length delimiter from the buffer.
///
/// This method allows the length delimiter to be decoded independently of the message, when the
/// message is encoded with [Message::encode_length_delimited].
///
/// An error may be returned in two cases:
///
///  * If the supplied buffer contains fewer than 10 bytes, then an error indicates that more
///    input is required to decode the full delimiter.
///  * If the supplied buffer contains 10 or more bytes, then the buffer contains an invalid
///    delimiter, and typically the buffer should be considered corrupt.
#[inline(always)]
pub fn decode_length_delimiter<B: Buf>(mut buf: B) -> Result<usize, DecodeError> {
    usize::try_from(decode_varint(&mut buf)?)
        .map_err(|_| DecodeError::new(DecodeErrorKind::Oversize))
}
