use core::fmt;

use bytes::Buf;

use crate::encoding::Cursor;
use crate::DecodeError;

/// Macro which emits a fixed-width value type: the raw little-endian bytes of an `I32` or `I64`
/// field, with integer and IEEE-754 views of the same bits.
macro_rules! fixed_width_value {
    (
        $(#[$attr:meta])*
        $name:ident,
        width: $width:literal,
        unsigned: $unsigned:ty,
        signed: $signed:ty,
        float: $float:ty,
        float_view: $float_view:ident
    ) => {
        $(#[$attr])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
        pub struct $name([u8; $width]);

        impl $name {
            pub const fn from_le_bytes(bytes: [u8; $width]) -> Self {
                Self(bytes)
            }

            pub const fn from_unsigned(value: $unsigned) -> Self {
                Self(value.to_le_bytes())
            }

            /// Consumes exactly the value's width from the cursor.
            #[inline]
            pub fn decode<B: Buf + ?Sized>(cursor: &mut Cursor<B>) -> Result<Self, DecodeError> {
                cursor.consume_array::<$width>().map(Self)
            }

            /// The bytes as they appeared on the wire.
            #[inline]
            pub const fn to_le_bytes(&self) -> [u8; $width] {
                self.0
            }

            #[inline]
            pub const fn as_unsigned(&self) -> $unsigned {
                <$unsigned>::from_le_bytes(self.0)
            }

            #[inline]
            pub const fn as_twos_compliment(&self) -> $signed {
                <$signed>::from_le_bytes(self.0)
            }

            /// The bits reinterpreted as an IEEE-754 value. NaN payloads, infinities and signed
            /// zeros come through exactly as stored.
            #[inline]
            pub fn $float_view(&self) -> $float {
                <$float>::from_bits(self.as_unsigned())
            }
        }

        impl From<$unsigned> for $name {
            fn from(value: $unsigned) -> Self {
                Self::from_unsigned(value)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_struct(stringify!($name))
                    .field("unsigned", &self.as_unsigned())
                    .field("twos_compliment", &self.as_twos_compliment())
                    .field(stringify!($float_view), &self.$float_view())
                    .finish()
            }
        }
    };
}

fixed_width_value!(
    /// The raw payload of an `I32` field (`fixed32`, `sfixed32` and `float`).
    Fixed32Value,
    width: 4,
    unsigned: u32,
    signed: i32,
    float: f32,
    float_view: as_float
);

fixed_width_value!(
    /// The raw payload of an `I64` field (`fixed64`, `sfixed64` and `double`).
    Fixed64Value,
    width: 8,
    unsigned: u64,
    signed: i64,
    float: f64,
    float_view: as_double
);
