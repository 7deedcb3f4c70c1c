use alloc::vec::Vec;
use core::fmt;
use core::ops::Deref;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::encoding::{
    encode_varint, encoded_len_varint, i32_to_zigzag, i64_to_zigzag, Cursor, Fixed32Value,
    Fixed64Value, Tag, VarintValue, WireType,
};
use crate::DecodeErrorKind::{Oversize, TooManyFields};
use crate::{encode_length_delimiter, length_delimiter_len, DecodeError, EncodeError};

/// The value of one field, in the shape its wire type dictates.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Value {
    Varint(VarintValue),
    I64(Fixed64Value),
    /// The payload of a length-delimited field. It is kept opaque: strings, bytes, nested messages
    /// and packed repeated fields all look the same on the wire.
    Len(Bytes),
    I32(Fixed32Value),
}
use Value::*;

impl Value {
    pub fn varint_u64(value: u64) -> Self {
        Varint(VarintValue::new(value))
    }

    /// An `int64` value, stored as its two's-complement bits.
    pub fn varint_i64(value: i64) -> Self {
        Varint(VarintValue::new(value as u64))
    }

    /// An `int32` value. Negative values are sign-extended to 64 bits, as protobuf does.
    pub fn varint_i32(value: i32) -> Self {
        Varint(VarintValue::new(value as i64 as u64))
    }

    /// A `sint64` value, zig-zag encoded.
    pub fn sint64(value: i64) -> Self {
        Varint(VarintValue::new(i64_to_zigzag(value)))
    }

    /// A `sint32` value, zig-zag encoded.
    pub fn sint32(value: i32) -> Self {
        Varint(VarintValue::new(i32_to_zigzag(value).into()))
    }

    pub fn bool(value: bool) -> Self {
        Varint(VarintValue::new(value.into()))
    }

    pub fn fixed_u32(value: u32) -> Self {
        I32(Fixed32Value::from_unsigned(value))
    }

    pub fn fixed_i32(value: i32) -> Self {
        I32(Fixed32Value::from_le_bytes(value.to_le_bytes()))
    }

    pub fn float(value: f32) -> Self {
        I32(Fixed32Value::from_unsigned(value.to_bits()))
    }

    pub fn fixed_u64(value: u64) -> Self {
        I64(Fixed64Value::from_unsigned(value))
    }

    pub fn fixed_i64(value: i64) -> Self {
        I64(Fixed64Value::from_le_bytes(value.to_le_bytes()))
    }

    pub fn double(value: f64) -> Self {
        I64(Fixed64Value::from_unsigned(value.to_bits()))
    }

    pub fn bytes<B: Into<Bytes>>(value: B) -> Self {
        Len(value.into())
    }

    pub fn wire_type(&self) -> WireType {
        match self {
            Varint(_) => WireType::Varint,
            I64(_) => WireType::I64,
            Len(_) => WireType::Len,
            I32(_) => WireType::I32,
        }
    }

    pub fn as_varint(&self) -> Option<&VarintValue> {
        match self {
            Varint(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<&Fixed32Value> {
        match self {
            I32(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<&Fixed64Value> {
        match self {
            I64(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_len(&self) -> Option<&Bytes> {
        match self {
            Len(value) => Some(value),
            _ => None,
        }
    }

    /// Decodes the value that follows a tag of the given wire type.
    pub fn decode<B: Buf + ?Sized>(
        wire_type: WireType,
        cursor: &mut Cursor<B>,
    ) -> Result<Self, DecodeError> {
        match wire_type {
            WireType::Varint => VarintValue::decode(cursor).map(Varint),
            WireType::I64 => Fixed64Value::decode(cursor).map(I64),
            WireType::Len => cursor.decode_length_delimited().map(Len),
            WireType::I32 => Fixed32Value::decode(cursor).map(I32),
        }
    }

    fn encode_raw<B: BufMut + ?Sized>(&self, buf: &mut B) {
        match self {
            Varint(value) => encode_varint(value.as_unsigned(), buf),
            I64(value) => buf.put_slice(&value.to_le_bytes()),
            Len(value) => {
                encode_varint(value.len() as u64, buf);
                buf.put_slice(value);
            }
            I32(value) => buf.put_slice(&value.to_le_bytes()),
        }
    }

    fn encoded_len(&self) -> usize {
        match self {
            Varint(value) => encoded_len_varint(value.as_unsigned()),
            I64(_) => 8,
            Len(value) => encoded_len_varint(value.len() as u64) + value.len(),
            I32(_) => 4,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Varint(value) => write!(f, "{}", value.as_unsigned()),
            I64(value) => write!(f, "0x{:016x}", value.as_unsigned()),
            Len(value) => write!(f, "\"{}\"", value.escape_ascii()),
            I32(value) => write!(f, "0x{:08x}", value.as_unsigned()),
        }
    }
}

/// One field of a message: a field number and its value. The wire type of the field's tag is
/// always the one its value variant implies.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TagAndValue {
    field_num: u64,
    value: Value,
}

impl TagAndValue {
    /// Panics if `field_num` is greater than `Tag::MAX_FIELD_NUM`.
    pub fn new(field_num: u64, value: Value) -> Self {
        assert!(
            field_num <= Tag::MAX_FIELD_NUM,
            "field number {} is too large to encode",
            field_num
        );
        Self { field_num, value }
    }

    pub fn tag(&self) -> Tag {
        Tag::new(self.field_num, self.value.wire_type())
    }

    pub fn field_num(&self) -> u64 {
        self.field_num
    }

    pub fn wire_type(&self) -> WireType {
        self.value.wire_type()
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn into_value(self) -> Value {
        self.value
    }

    /// Decodes one tag and the value it introduces.
    pub fn decode<B: Buf + ?Sized>(cursor: &mut Cursor<B>) -> Result<Self, DecodeError> {
        let start = cursor.position();
        let tag = cursor.decode_tag().map_err(|err| err.at(start, None))?;
        let value =
            Value::decode(tag.wire_type, cursor).map_err(|err| err.at(start, Some(tag.field_num)))?;
        #[cfg(feature = "tracing")]
        tracing::trace!(
            field_num = tag.field_num,
            wire_type = %tag.wire_type,
            offset = start,
            "decoded field"
        );
        Ok(Self {
            field_num: tag.field_num,
            value,
        })
    }

    fn encode_raw<B: BufMut + ?Sized>(&self, buf: &mut B) {
        self.tag().encode(buf);
        self.value.encode_raw(buf);
    }

    fn encoded_len(&self) -> usize {
        self.tag().encoded_len() + self.value.encoded_len()
    }
}

/// Limits applied while decoding a message.
///
/// The default imposes no limits; decoding cost is linear in the input length either way.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DecodeOptions {
    max_len: Option<usize>,
    max_fields: Option<usize>,
}

impl DecodeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects inputs longer than `max_len` bytes with `Oversize` before reading anything.
    pub fn max_len(mut self, max_len: usize) -> Self {
        self.max_len = Some(max_len);
        self
    }

    /// Rejects messages with more than `max_fields` fields with `TooManyFields`.
    pub fn max_fields(mut self, max_fields: usize) -> Self {
        self.max_fields = Some(max_fields);
        self
    }
}

/// A decoded message: its fields in the order they appeared on the wire.
///
/// Field numbers may repeat and appear in any order; nothing is merged, deduplicated or sorted.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Message(Vec<TagAndValue>);

impl Message {
    pub fn new(fields: Vec<TagAndValue>) -> Self {
        Self(fields)
    }

    /// Decodes a message from the whole buffer.
    pub fn decode<B: Buf>(buf: B) -> Result<Self, DecodeError> {
        Self::decode_with(buf, &DecodeOptions::default())
    }

    /// Decodes a message from the whole buffer, applying the given limits.
    pub fn decode_with<B: Buf>(mut buf: B, options: &DecodeOptions) -> Result<Self, DecodeError> {
        if options.max_len.map_or(false, |max_len| buf.remaining() > max_len) {
            return Err(DecodeError::new(Oversize).at(0, None));
        }
        Self::decode_fields(Cursor::new(&mut buf), options)
    }

    /// Decodes a length-delimited message from the buffer, leaving whatever follows it.
    pub fn decode_length_delimited<B: Buf>(mut buf: B) -> Result<Self, DecodeError> {
        let cursor = Cursor::new_length_delimited(&mut buf).map_err(|err| err.at(0, None))?;
        Self::decode_fields(cursor, &DecodeOptions::default())
    }

    fn decode_fields<B: Buf + ?Sized>(
        cursor: Cursor<B>,
        options: &DecodeOptions,
    ) -> Result<Self, DecodeError> {
        let max_fields = options.max_fields.unwrap_or(usize::MAX);
        let mut count = 0usize;
        cursor
            .consume_all(|cursor| {
                if count == max_fields {
                    return Err(DecodeError::new(TooManyFields).at(cursor.position(), None));
                }
                count += 1;
                TagAndValue::decode(cursor)
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
            .map_err(|err| {
                #[cfg(feature = "tracing")]
                tracing::debug!(
                    kind = %err.kind(),
                    offset = ?err.offset(),
                    field_num = ?err.field_num(),
                    "failed to decode message"
                );
                err
            })
    }

    /// Returns the fields with the given field number, in wire order.
    pub fn fields(&self, field_num: u64) -> impl Iterator<Item = &TagAndValue> + '_ {
        self.0
            .iter()
            .filter(move |field| field.field_num == field_num)
    }

    pub fn into_fields(self) -> Vec<TagAndValue> {
        self.0
    }

    /// Returns the encoded length of the message without a length delimiter.
    pub fn encoded_len(&self) -> usize {
        self.0.iter().map(TagAndValue::encoded_len).sum()
    }

    /// Encodes the message to a buffer.
    ///
    /// An error will be returned if the buffer does not have sufficient capacity.
    pub fn encode<B: BufMut + ?Sized>(&self, buf: &mut B) -> Result<(), EncodeError> {
        let required = self.encoded_len();
        let remaining = buf.remaining_mut();
        if required > remaining {
            return Err(EncodeError::new(required, remaining));
        }
        self.encode_raw(buf);
        Ok(())
    }

    /// Encodes the message to a newly allocated buffer.
    pub fn encode_to_vec(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.encoded_len());
        self.encode_raw(&mut buf);
        buf
    }

    /// Encodes the message to a `Bytes` buffer.
    pub fn encode_to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.encode_raw(&mut buf);
        buf.freeze()
    }

    /// Encodes the message with a length-delimiter to a buffer.
    ///
    /// An error will be returned if the buffer does not have sufficient capacity.
    pub fn encode_length_delimited<B: BufMut + ?Sized>(
        &self,
        buf: &mut B,
    ) -> Result<(), EncodeError> {
        let len = self.encoded_len();
        let required = len + length_delimiter_len(len);
        let remaining = buf.remaining_mut();
        if required > remaining {
            return Err(EncodeError::new(required, remaining));
        }
        encode_length_delimiter(len, buf)?;
        self.encode_raw(buf);
        Ok(())
    }

    /// Encodes the message with a length-delimiter to a newly allocated buffer.
    pub fn encode_length_delimited_to_vec(&self) -> Vec<u8> {
        let len = self.encoded_len();
        let mut buf = Vec::with_capacity(len + length_delimiter_len(len));
        encode_varint(len as u64, &mut buf);
        self.encode_raw(&mut buf);
        buf
    }

    fn encode_raw<B: BufMut + ?Sized>(&self, buf: &mut B) {
        for field in &self.0 {
            field.encode_raw(buf);
        }
    }
}

impl Deref for Message {
    type Target = [TagAndValue];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Vec<TagAndValue>> for Message {
    fn from(fields: Vec<TagAndValue>) -> Self {
        Self(fields)
    }
}

impl FromIterator<TagAndValue> for Message {
    fn from_iter<T: IntoIterator<Item = TagAndValue>>(iter: T) -> Self {
        Self(Vec::from_iter(iter))
    }
}

impl FromIterator<(u64, Value)> for Message {
    fn from_iter<T: IntoIterator<Item = (u64, Value)>>(iter: T) -> Self {
        iter.into_iter()
            .map(|(field_num, value)| TagAndValue::new(field_num, value))
            .collect()
    }
}

impl IntoIterator for Message {
    type Item = TagAndValue;
    type IntoIter = alloc::vec::IntoIter<TagAndValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Message {
    type Item = &'a TagAndValue;
    type IntoIter = core::slice::Iter<'a, TagAndValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Writes one `field_num: value` line per field, in wire order. Varints print unsigned, fixed-width
/// values print as hex, and length-delimited payloads print as escaped strings.
impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for field in &self.0 {
            writeln!(f, "{}: {}", field.field_num, field.value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use alloc::string::ToString;
    use alloc::vec;

    use itertools::Itertools;
    use proptest::prelude::*;
    use static_assertions::assert_impl_all;

    use super::*;
    use crate::DecodeErrorKind;

    assert_impl_all!(Message: Send, Sync);
    assert_impl_all!(TagAndValue: Send, Sync);
    assert_impl_all!(DecodeError: Send, Sync);

    fn decode(bytes: &[u8]) -> Result<Message, DecodeError> {
        Message::decode(bytes)
    }

    fn kind<T: fmt::Debug>(result: Result<T, DecodeError>) -> DecodeErrorKind {
        result.expect_err("decoding succeeded").kind()
    }

    #[test]
    fn fields_keep_wire_order() {
        // 2: 1, 1: 3, 2: 0, 1: 150
        let encoded: &[u8] = &[0x10, 0x01, 0x08, 0x03, 0x10, 0x00, 0x08, 0x96, 0x01];
        let message = decode(encoded).expect("decoding failed");
        assert_eq!(
            message.iter().map(TagAndValue::field_num).collect_vec(),
            vec![2, 1, 2, 1]
        );
        assert_eq!(
            message
                .fields(1)
                .map(|field| field.value().as_varint().map(VarintValue::as_unsigned))
                .collect_vec(),
            vec![Some(3), Some(150)]
        );
    }

    #[test]
    fn every_wire_type() {
        let encoded: &[u8] = &[
            0x08, 0x96, 0x01, // 1: varint 150
            0x11, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0xF0, 0x3F, // 2: I64
            0x1A, 0x03, b'a', b'b', b'c', // 3: LEN "abc"
            0x25, 0x00, 0x00, 0x80, 0x3F, // 4: I32 1.0f32
            0x2A, 0x00, // 5: empty LEN
        ];
        let message = Message::decode(encoded).expect("decoding failed");
        assert_eq!(message.len(), 5);
        assert_eq!(
            message.iter().map(TagAndValue::wire_type).collect_vec(),
            vec![
                WireType::Varint,
                WireType::I64,
                WireType::Len,
                WireType::I32,
                WireType::Len
            ]
        );
        assert_eq!(message[0].value().as_varint().unwrap().as_zigzag(), Ok(75));
        assert_eq!(
            message[1].value().as_i64().unwrap().as_unsigned(),
            4607182418800017409
        );
        assert_eq!(message[2].value(), &Value::bytes("abc"));
        assert_eq!(message[3].value().as_i32().unwrap().as_float(), 1.0);
        assert!(message[4].value().as_len().unwrap().is_empty());
        assert_eq!(
            message
                .clone()
                .into_fields()
                .into_iter()
                .map(TagAndValue::into_value)
                .collect_vec()[2],
            Value::bytes("abc")
        );
        // Exactly one view of each value is present.
        assert!(message[0].value().as_i32().is_none());
        assert!(message[2].value().as_varint().is_none());
    }

    #[test]
    fn len_payload_is_not_recursed() {
        // The payload is itself a valid message, but stays opaque bytes.
        let encoded: &[u8] = &[0x0A, 0x02, 0x08, 0x01];
        let message = decode(encoded).expect("decoding failed");
        assert_eq!(
            message[0].value(),
            &Value::bytes(Bytes::from_static(&[0x08, 0x01]))
        );
        // An invalid payload is fine too.
        assert!(decode(&[0x0A, 0x01, 0xFF]).is_ok());
    }

    #[test]
    fn empty_input() {
        assert_eq!(Message::decode(Bytes::new()), Ok(Message::default()));
        assert!(decode(&[]).expect("decoding failed").is_empty());
    }

    #[test]
    fn unknown_wire_types() {
        // Group start and end, and the unassigned codes 6 and 7.
        for key in [0x0B, 0x0C, 0x0E, 0x0F] {
            let encoded = [0x08, 0x01, key, 0x00];
            let err = decode(&encoded).expect_err("decoding succeeded");
            assert_eq!(err.kind(), DecodeErrorKind::UnknownWireType);
            #[cfg(feature = "detailed-errors")]
            assert_eq!(err.offset(), Some(2));
        }
    }

    #[test]
    fn truncated() {
        // Inside a tag.
        assert_eq!(kind(decode(&[0xC0])), DecodeErrorKind::Truncated);
        // After a tag.
        assert_eq!(kind(decode(&[0x08])), DecodeErrorKind::Truncated);
        // Inside a varint value.
        assert_eq!(
            kind(decode(&[0x08, 0x96])),
            DecodeErrorKind::Truncated
        );
        // Short fixed-width values.
        assert_eq!(
            kind(decode(&[0x0D, 0x00, 0x00, 0x80])),
            DecodeErrorKind::Truncated
        );
        assert_eq!(
            kind(decode(&[0x09, 0, 0, 0, 0, 0, 0, 0])),
            DecodeErrorKind::Truncated
        );
        // A payload shorter than its declared length.
        assert_eq!(
            kind(decode(&[0x0A, 0x03, b'a', b'b'])),
            DecodeErrorKind::Truncated
        );
    }

    #[test]
    fn oversize_length() {
        // A declared length no buffer could satisfy.
        let mut encoded = vec![0x0A];
        encode_varint(u64::MAX, &mut encoded);
        let err = decode(&encoded).expect_err("decoding succeeded");
        assert!(matches!(
            err.kind(),
            DecodeErrorKind::Truncated | DecodeErrorKind::Oversize
        ));
    }

    #[test]
    #[cfg(feature = "detailed-errors")]
    fn error_location() {
        let encoded: &[u8] = &[0x08, 0x01, 0xC0, 0x3E, 0x96];
        let err = decode(encoded).expect_err("decoding succeeded");
        assert_eq!(err.kind(), DecodeErrorKind::Truncated);
        assert_eq!(err.offset(), Some(2));
        assert_eq!(err.field_num(), Some(1000));
        assert_eq!(
            err.to_string(),
            "failed to decode wire message: at offset 2 (field 1000): message or region truncated"
        );
    }

    #[test]
    fn decode_options() {
        let encoded: &[u8] = &[0x08, 0x01, 0x10, 0x02, 0x18, 0x03];
        assert_eq!(
            kind(Message::decode_with(
                encoded,
                &DecodeOptions::new().max_len(5)
            )),
            DecodeErrorKind::Oversize
        );
        assert_eq!(
            kind(Message::decode_with(
                encoded,
                &DecodeOptions::new().max_fields(2)
            )),
            DecodeErrorKind::TooManyFields
        );
        let message = Message::decode_with(
            encoded,
            &DecodeOptions::new().max_len(6).max_fields(3),
        )
        .expect("decoding within limits failed");
        assert_eq!(message.len(), 3);
    }

    #[test]
    fn length_delimited_stream() {
        let first: Message = [(1u64, Value::varint_u64(150))].into_iter().collect();
        let second: Message = [(2u64, Value::bytes("hi")), (1, Value::sint64(-1))]
            .into_iter()
            .collect();
        let mut stream = first.encode_length_delimited_to_vec();
        second
            .encode_length_delimited(&mut stream)
            .expect("vec has room");

        let mut buf = stream.as_slice();
        assert_eq!(Message::decode_length_delimited(&mut buf), Ok(first));
        assert_eq!(Message::decode_length_delimited(&mut buf), Ok(second));
        assert!(buf.is_empty());
    }

    #[test]
    fn encode_insufficient_capacity() {
        let message: Message = [(1u64, Value::fixed_u64(7))].into_iter().collect();
        let mut storage = [0u8; 4];
        let err = message
            .encode(&mut storage.as_mut_slice())
            .expect_err("encoding into a short buffer succeeded");
        assert_eq!(err.required_capacity(), 9);
        assert_eq!(err.remaining(), 4);
    }

    #[test]
    fn constructors() {
        assert_eq!(
            Value::varint_i32(-1).as_varint().unwrap().as_unsigned(),
            u64::MAX
        );
        assert_eq!(Value::varint_i64(-150).as_varint().unwrap().as_unsigned(), u64::MAX - 149);
        assert_eq!(Value::sint32(-150).as_varint().unwrap().as_unsigned(), 299);
        assert_eq!(Value::sint64(150).as_varint().unwrap().as_unsigned(), 300);
        assert_eq!(Value::bool(true).as_varint().unwrap().as_unsigned(), 1);
        assert_eq!(
            Value::fixed_i32(-150).as_i32().unwrap().as_unsigned(),
            4294967146
        );
        assert_eq!(Value::float(-2.0).as_i32().unwrap().as_unsigned(), 3221225472);
        assert_eq!(
            Value::fixed_i64(-150).as_i64().unwrap().as_twos_compliment(),
            -150
        );
        assert_eq!(Value::double(1.0).as_i64().unwrap().as_double(), 1.0);
    }

    #[test]
    #[should_panic(expected = "too large to encode")]
    fn field_num_too_large() {
        TagAndValue::new(Tag::MAX_FIELD_NUM + 1, Value::bool(false));
    }

    #[test]
    fn display() {
        let message: Message = [
            (1u64, Value::varint_u64(150)),
            (2, Value::fixed_u32(1)),
            (3, Value::fixed_u64(u64::MAX)),
            (4, Value::bytes(Bytes::from_static(b"a\"b\n"))),
        ]
        .into_iter()
        .collect();
        assert_eq!(
            message.to_string(),
            "1: 150\n2: 0x00000001\n3: 0xffffffffffffffff\n4: \"a\\\"b\\n\"\n"
        );
    }

    fn arb_value() -> impl Strategy<Value = Value> {
        prop_oneof![
            any::<u64>().prop_map(Value::varint_u64),
            any::<u32>().prop_map(Value::fixed_u32),
            any::<u64>().prop_map(Value::fixed_u64),
            proptest::collection::vec(any::<u8>(), 0..20).prop_map(Value::bytes),
        ]
    }

    fn arb_message() -> impl Strategy<Value = Message> {
        proptest::collection::vec((0u64..=Tag::MAX_FIELD_NUM, arb_value()), 0..10)
            .prop_map(|fields| fields.into_iter().collect())
    }

    proptest! {
        #[test]
        fn encode_decode(message in arb_message()) {
            let encoded = message.encode_to_bytes();
            prop_assert_eq!(encoded.len(), message.encoded_len());
            prop_assert_eq!(Message::decode(encoded), Ok(message));
        }
    }
}
