//! Field-level wire encoding.
//!
//! Every field type on the wire implements [`WireEncode`] and [`WireDecode`].
//! The per-type encodings are fixed and part of the compatibility contract
//! between host and peer builds:
//!
//! | Type            | Encoding                                   |
//! |-----------------|--------------------------------------------|
//! | `bool`          | 1 byte, `0` or `1`                         |
//! | `u8`..`u32`, `i8`..`i32` | fixed width, little-endian        |
//! | `f32`           | IEEE-754 bits, little-endian               |
//! | `String`        | `u16` byte length, then UTF-8              |
//! | `Vec2`          | two `f32` (x, y)                           |
//! | `Vec<T>`        | `u16` element count, then each `T`         |
//! | flag groups     | the backing integer, one bit per flag      |
//!
//! Records are encoded field by field in declaration order with no padding
//! and no per-field tags. [`wire_record!`](crate::wire_record) generates
//! both impls for a record from its field list.

use crate::{Kind, ProtocolError};

/// Largest length a 2-byte length or count prefix can describe.
pub const MAX_PREFIXED_LEN: usize = u16::MAX as usize;

// ---------------------------------------------------------------------------
// Writer / reader
// ---------------------------------------------------------------------------

/// Append-only byte buffer that fields encode into.
#[derive(Debug, Default)]
pub struct WireWriter {
    buf: Vec<u8>,
}

impl WireWriter {
    /// Creates an empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes raw bytes.
    pub fn put(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Writes a 2-byte length/count prefix, rejecting lengths that don't fit.
    pub fn put_len(&mut self, len: usize) -> Result<(), ProtocolError> {
        let len16 = u16::try_from(len).map_err(|_| ProtocolError::FieldTooLong {
            len,
            max: MAX_PREFIXED_LEN,
        })?;
        self.put(&len16.to_le_bytes());
        Ok(())
    }

    /// Number of bytes written so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Returns `true` if nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Consumes the writer and returns the encoded bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

/// Cursor over an inbound buffer.
///
/// Carries the kind being decoded (once known) so a short read can report
/// which packet it belonged to.
#[derive(Debug)]
pub struct WireReader<'a> {
    buf: &'a [u8],
    pos: usize,
    kind: Option<Kind>,
}

impl<'a> WireReader<'a> {
    /// Creates a reader at the start of `buf`.
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0, kind: None }
    }

    /// Sets the kind reported in subsequent errors.
    pub fn set_kind(&mut self, kind: Kind) {
        self.kind = Some(kind);
    }

    /// Takes exactly `n` bytes or fails with `PacketTooSmall`.
    pub fn take(&mut self, n: usize) -> Result<&'a [u8], ProtocolError> {
        let remaining = self.remaining();
        if n > remaining {
            return Err(ProtocolError::PacketTooSmall {
                kind: self.kind,
                needed: n,
                remaining,
            });
        }
        let bytes = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    /// Takes a fixed-size array.
    pub fn take_array<const N: usize>(&mut self) -> Result<[u8; N], ProtocolError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    /// Reads a 2-byte length/count prefix.
    pub fn take_len(&mut self) -> Result<usize, ProtocolError> {
        Ok(u16::from_le_bytes(self.take_array()?) as usize)
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Fails with `PacketTooLarge` if any bytes are left.
    pub fn finish(&self, kind: Kind) -> Result<(), ProtocolError> {
        match self.remaining() {
            0 => Ok(()),
            trailing => Err(ProtocolError::PacketTooLarge { kind, trailing }),
        }
    }
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// A value that can be written to the wire.
pub trait WireEncode {
    /// Appends this value's encoding to `w`.
    fn write_to(&self, w: &mut WireWriter) -> Result<(), ProtocolError>;
}

/// A value that can be read back from the wire.
pub trait WireDecode: Sized {
    /// Reads one value from `r`, advancing it.
    fn read_from(r: &mut WireReader<'_>) -> Result<Self, ProtocolError>;
}

// ---------------------------------------------------------------------------
// Primitive impls
// ---------------------------------------------------------------------------

macro_rules! impl_wire_le {
    ($($ty:ty),* $(,)?) => {
        $(
            impl WireEncode for $ty {
                fn write_to(&self, w: &mut WireWriter) -> Result<(), ProtocolError> {
                    w.put(&self.to_le_bytes());
                    Ok(())
                }
            }

            impl WireDecode for $ty {
                fn read_from(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
                    Ok(<$ty>::from_le_bytes(r.take_array()?))
                }
            }
        )*
    };
}

impl_wire_le!(u8, u16, u32, i8, i16, i32, f32);

impl WireEncode for bool {
    fn write_to(&self, w: &mut WireWriter) -> Result<(), ProtocolError> {
        w.put(&[u8::from(*self)]);
        Ok(())
    }
}

impl WireDecode for bool {
    fn read_from(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        match u8::read_from(r)? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(ProtocolError::InvalidBool(other)),
        }
    }
}

impl WireEncode for String {
    fn write_to(&self, w: &mut WireWriter) -> Result<(), ProtocolError> {
        w.put_len(self.len())?;
        w.put(self.as_bytes());
        Ok(())
    }
}

impl WireDecode for String {
    fn read_from(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        let len = r.take_len()?;
        let bytes = r.take(len)?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| ProtocolError::InvalidUtf8)
    }
}

impl<T: WireEncode> WireEncode for Vec<T> {
    fn write_to(&self, w: &mut WireWriter) -> Result<(), ProtocolError> {
        w.put_len(self.len())?;
        for item in self {
            item.write_to(w)?;
        }
        Ok(())
    }
}

impl<T: WireDecode> WireDecode for Vec<T> {
    fn read_from(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        let count = r.take_len()?;
        // Cap the pre-allocation by what the buffer could possibly hold so a
        // forged count can't make us allocate 65k elements up front.
        let mut items = Vec::with_capacity(count.min(r.remaining()));
        for _ in 0..count {
            items.push(T::read_from(r)?);
        }
        Ok(items)
    }
}

// ---------------------------------------------------------------------------
// Record / flag macros
// ---------------------------------------------------------------------------

/// Declares a wire record: a struct plus its `WireEncode`/`WireDecode` impls.
///
/// Fields are written and read in the order they are listed. Struct literal
/// fields evaluate in source order, which is what keeps decode in step with
/// encode.
#[macro_export]
macro_rules! wire_record {
    (
        $(#[$meta:meta])*
        pub struct $name:ident {
            $( $(#[$fmeta:meta])* pub $field:ident : $ty:ty ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq)]
        pub struct $name {
            $( $(#[$fmeta])* pub $field: $ty, )*
        }

        impl $crate::wire::WireEncode for $name {
            fn write_to(
                &self,
                w: &mut $crate::wire::WireWriter,
            ) -> Result<(), $crate::ProtocolError> {
                $( $crate::wire::WireEncode::write_to(&self.$field, w)?; )*
                Ok(())
            }
        }

        impl $crate::wire::WireDecode for $name {
            fn read_from(
                r: &mut $crate::wire::WireReader<'_>,
            ) -> Result<Self, $crate::ProtocolError> {
                Ok(Self {
                    $( $field: <$ty as $crate::wire::WireDecode>::read_from(r)?, )*
                })
            }
        }
    };
}

/// Implements the wire traits for a `bitflags` type via its backing integer.
///
/// Unknown bits are a decode error rather than being truncated, so a
/// decoded value always re-encodes to the same bytes.
macro_rules! impl_wire_flags {
    ($($flags:ty : $bits:ty),* $(,)?) => {
        $(
            impl $crate::wire::WireEncode for $flags {
                fn write_to(&self, w: &mut $crate::wire::WireWriter) -> Result<(), $crate::ProtocolError> {
                    $crate::wire::WireEncode::write_to(&self.bits(), w)
                }
            }

            impl $crate::wire::WireDecode for $flags {
                fn read_from(r: &mut $crate::wire::WireReader<'_>) -> Result<Self, $crate::ProtocolError> {
                    let bits = <$bits as $crate::wire::WireDecode>::read_from(r)?;
                    <$flags>::from_bits(bits).ok_or($crate::ProtocolError::InvalidFlags {
                        field: stringify!($flags),
                        bits: u32::from(bits),
                    })
                }
            }
        )*
    };
}

pub(crate) use impl_wire_flags;

#[cfg(test)]
mod tests {
    use super::*;

    fn encode<T: WireEncode>(value: &T) -> Vec<u8> {
        let mut w = WireWriter::new();
        value.write_to(&mut w).unwrap();
        w.into_bytes()
    }

    fn decode<T: WireDecode>(bytes: &[u8]) -> Result<T, ProtocolError> {
        T::read_from(&mut WireReader::new(bytes))
    }

    #[test]
    fn test_integers_are_little_endian() {
        assert_eq!(encode(&0x0102u16), vec![0x02, 0x01]);
        assert_eq!(encode(&0x0102_0304u32), vec![0x04, 0x03, 0x02, 0x01]);
        assert_eq!(encode(&-1i16), vec![0xff, 0xff]);
    }

    #[test]
    fn test_f32_preserves_bits() {
        let odd_nan = f32::from_bits(0x7fc0_1234);
        let bytes = encode(&odd_nan);
        let back: f32 = decode(&bytes).unwrap();
        assert_eq!(back.to_bits(), 0x7fc0_1234);
    }

    #[test]
    fn test_bool_rejects_non_binary_byte() {
        assert_eq!(decode::<bool>(&[1]), Ok(true));
        assert_eq!(decode::<bool>(&[2]), Err(ProtocolError::InvalidBool(2)));
    }

    #[test]
    fn test_string_is_length_prefixed_utf8() {
        assert_eq!(encode(&"hé".to_string()), vec![3, 0, b'h', 0xc3, 0xa9]);
    }

    #[test]
    fn test_string_invalid_utf8_is_error() {
        assert_eq!(decode::<String>(&[1, 0, 0xff]), Err(ProtocolError::InvalidUtf8));
    }

    #[test]
    fn test_string_length_past_end_is_too_small() {
        let err = decode::<String>(&[5, 0, b'a']).unwrap_err();
        assert_eq!(
            err,
            ProtocolError::PacketTooSmall {
                kind: None,
                needed: 5,
                remaining: 1
            }
        );
    }

    #[test]
    fn test_string_over_u16_max_fails_to_encode() {
        let long = "x".repeat(MAX_PREFIXED_LEN + 1);
        let mut w = WireWriter::new();
        let err = long.write_to(&mut w).unwrap_err();
        assert!(matches!(err, ProtocolError::FieldTooLong { len, .. } if len == MAX_PREFIXED_LEN + 1));
    }

    #[test]
    fn test_vec_is_count_prefixed() {
        assert_eq!(encode(&vec![7u8, 8, 9]), vec![3, 0, 7, 8, 9]);
        assert_eq!(decode::<Vec<u8>>(&[0, 0]), Ok(vec![]));
    }

    #[test]
    fn test_vec_forged_count_fails_without_huge_allocation() {
        let err = decode::<Vec<u32>>(&[0xff, 0xff, 1, 2]).unwrap_err();
        assert!(matches!(err, ProtocolError::PacketTooSmall { .. }));
    }

    #[test]
    fn test_finish_reports_trailing_bytes() {
        let r = WireReader::new(&[1, 2, 3]);
        assert_eq!(
            r.finish(Kind::PlayerLeft),
            Err(ProtocolError::PacketTooLarge {
                kind: Kind::PlayerLeft,
                trailing: 3
            })
        );
    }
}
