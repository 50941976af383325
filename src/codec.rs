//! Fixed-width integer codec.
//!
//! Every field ultimately reduces to scalars: 8, 16, 32 or 64 bit integers, signed or
//! unsigned, in one of two byte orders. The `nx_` family is network order (big-endian),
//! the plain family is little-endian. A single packet may mix both.

use crate::error::{DeserializeError, FieldError};
use crate::value::Value;
use byteorder::{BigEndian, ByteOrder, LittleEndian};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endianness {
    Big,
    Little,
}

/// Width, signedness and byte order of one integer field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScalarType {
    bits: u8,
    signed: bool,
    endianness: Endianness,
}

const fn scalar(bits: u8, signed: bool, endianness: Endianness) -> ScalarType {
    ScalarType {
        bits,
        signed,
        endianness,
    }
}

impl ScalarType {
    pub const NX_U8: ScalarType = scalar(8, false, Endianness::Big);
    pub const NX_I8: ScalarType = scalar(8, true, Endianness::Big);
    pub const NX_U16: ScalarType = scalar(16, false, Endianness::Big);
    pub const NX_I16: ScalarType = scalar(16, true, Endianness::Big);
    pub const NX_U32: ScalarType = scalar(32, false, Endianness::Big);
    pub const NX_I32: ScalarType = scalar(32, true, Endianness::Big);
    pub const NX_U64: ScalarType = scalar(64, false, Endianness::Big);
    pub const NX_I64: ScalarType = scalar(64, true, Endianness::Big);
    pub const U8: ScalarType = scalar(8, false, Endianness::Little);
    pub const I8: ScalarType = scalar(8, true, Endianness::Little);
    pub const U16: ScalarType = scalar(16, false, Endianness::Little);
    pub const I16: ScalarType = scalar(16, true, Endianness::Little);
    pub const U32: ScalarType = scalar(32, false, Endianness::Little);
    pub const I32: ScalarType = scalar(32, true, Endianness::Little);
    pub const U64: ScalarType = scalar(64, false, Endianness::Little);
    pub const I64: ScalarType = scalar(64, true, Endianness::Little);

    const ALL: [ScalarType; 16] = [
        Self::NX_U8,
        Self::NX_I8,
        Self::NX_U16,
        Self::NX_I16,
        Self::NX_U32,
        Self::NX_I32,
        Self::NX_U64,
        Self::NX_I64,
        Self::U8,
        Self::I8,
        Self::U16,
        Self::I16,
        Self::U32,
        Self::I32,
        Self::U64,
        Self::I64,
    ];

    /// Look up a scalar by its schema name (`nx_u16`, `i32`, ...).
    pub fn from_name(name: &str) -> Option<ScalarType> {
        Self::ALL.iter().copied().find(|t| t.name() == name)
    }

    pub fn name(&self) -> &'static str {
        match (self.endianness, self.signed, self.bits) {
            (Endianness::Big, false, 8) => "nx_u8",
            (Endianness::Big, true, 8) => "nx_i8",
            (Endianness::Big, false, 16) => "nx_u16",
            (Endianness::Big, true, 16) => "nx_i16",
            (Endianness::Big, false, 32) => "nx_u32",
            (Endianness::Big, true, 32) => "nx_i32",
            (Endianness::Big, false, _) => "nx_u64",
            (Endianness::Big, true, _) => "nx_i64",
            (Endianness::Little, false, 8) => "u8",
            (Endianness::Little, true, 8) => "i8",
            (Endianness::Little, false, 16) => "u16",
            (Endianness::Little, true, 16) => "i16",
            (Endianness::Little, false, 32) => "u32",
            (Endianness::Little, true, 32) => "i32",
            (Endianness::Little, false, _) => "u64",
            (Endianness::Little, true, _) => "i64",
        }
    }

    pub fn bits(&self) -> u8 {
        self.bits
    }

    pub fn is_signed(&self) -> bool {
        self.signed
    }

    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    /// Serialized size in bytes, `ceil(bits / 8)`.
    pub const fn size(&self) -> usize {
        (self.bits as usize + 7) / 8
    }

    pub fn min(&self) -> i128 {
        if self.signed {
            -(1i128 << (self.bits - 1))
        } else {
            0
        }
    }

    pub fn max(&self) -> i128 {
        if self.signed {
            (1i128 << (self.bits - 1)) - 1
        } else {
            (1i128 << self.bits) - 1
        }
    }

    /// Zero in this type's value variant.
    pub fn zero(&self) -> Value {
        self.make(0)
    }

    /// `n` in this type's value variant, if it is in range.
    pub fn from_i128(&self, n: i128) -> Option<Value> {
        (self.min()..=self.max()).contains(&n).then(|| self.make(n))
    }

    /// Range-check an integer value and convert it to this type's variant.
    pub fn coerce(&self, field: &str, v: &Value) -> Result<Value, FieldError> {
        let n = v.as_i128().ok_or_else(|| FieldError::TypeMismatch {
            field: field.to_string(),
            expected: self.name().to_string(),
            found: v.kind(),
        })?;
        self.from_i128(n).ok_or_else(|| FieldError::OutOfRange {
            field: field.to_string(),
            value: n,
            ty: self.name().to_string(),
        })
    }

    fn make(&self, n: i128) -> Value {
        match (self.signed, self.bits) {
            (false, 8) => Value::U8(n as u8),
            (false, 16) => Value::U16(n as u16),
            (false, 32) => Value::U32(n as u32),
            (false, _) => Value::U64(n as u64),
            (true, 8) => Value::I8(n as i8),
            (true, 16) => Value::I16(n as i16),
            (true, 32) => Value::I32(n as i32),
            (true, _) => Value::I64(n as i64),
        }
    }

    /// Append the encoding of `v` to `out`. Values wider than the type are truncated to
    /// its low bits; callers coerce on assignment so stored values always fit.
    pub fn write(&self, v: &Value, out: &mut Vec<u8>) {
        let n = v.as_i128().unwrap_or(0);
        match self.endianness {
            Endianness::Big => self.encode::<BigEndian>(n, out),
            Endianness::Little => self.encode::<LittleEndian>(n, out),
        }
    }

    fn encode<B: ByteOrder>(&self, n: i128, out: &mut Vec<u8>) {
        let mut buf = [0u8; 8];
        let len = self.size();
        match self.bits {
            8 => buf[0] = n as u8,
            16 => B::write_u16(&mut buf[..2], n as u16),
            32 => B::write_u32(&mut buf[..4], n as u32),
            _ => B::write_u64(&mut buf, n as u64),
        }
        out.extend_from_slice(&buf[..len]);
    }

    /// Decode one value at `pos`. Returns the value and the position after it.
    pub fn read(&self, field: &str, buf: &[u8], pos: usize) -> Result<(Value, usize), DeserializeError> {
        let len = self.size();
        let available = buf.len().saturating_sub(pos);
        if available < len {
            return Err(DeserializeError::InsufficientBytes {
                field: field.to_string(),
                expected: len,
                available,
            });
        }
        let raw = &buf[pos..pos + len];
        let v = match self.endianness {
            Endianness::Big => self.decode::<BigEndian>(raw),
            Endianness::Little => self.decode::<LittleEndian>(raw),
        };
        Ok((v, pos + len))
    }

    fn decode<B: ByteOrder>(&self, raw: &[u8]) -> Value {
        match (self.signed, self.bits) {
            (false, 8) => Value::U8(raw[0]),
            (true, 8) => Value::I8(raw[0] as i8),
            (false, 16) => Value::U16(B::read_u16(raw)),
            (true, 16) => Value::I16(B::read_i16(raw)),
            (false, 32) => Value::U32(B::read_u32(raw)),
            (true, 32) => Value::I32(B::read_i32(raw)),
            (false, _) => Value::U64(B::read_u64(raw)),
            (true, _) => Value::I64(B::read_i64(raw)),
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded(ty: ScalarType, v: impl Into<Value>) -> Vec<u8> {
        let mut out = Vec::new();
        ty.write(&v.into(), &mut out);
        out
    }

    #[test]
    fn names_round_trip_for_every_type() {
        for ty in ScalarType::ALL {
            assert_eq!(ScalarType::from_name(ty.name()), Some(ty));
        }
        assert_eq!(ScalarType::from_name("int"), None);
        assert_eq!(ScalarType::from_name("nx_u24"), None);
    }

    #[test]
    fn size_is_width_in_bytes() {
        assert_eq!(ScalarType::NX_U8.size(), 1);
        assert_eq!(ScalarType::I16.size(), 2);
        assert_eq!(ScalarType::NX_I32.size(), 4);
        assert_eq!(ScalarType::U64.size(), 8);
    }

    #[test]
    fn network_order_is_big_endian() {
        assert_eq!(encoded(ScalarType::NX_U32, 12345u32), vec![0x00, 0x00, 0x30, 0x39]);
        assert_eq!(encoded(ScalarType::NX_U16, 0x0102u16), vec![0x01, 0x02]);
    }

    #[test]
    fn host_order_is_little_endian() {
        assert_eq!(encoded(ScalarType::U32, 12345u32), vec![0x39, 0x30, 0x00, 0x00]);
        assert_eq!(encoded(ScalarType::U16, 0x0102u16), vec![0x02, 0x01]);
    }

    #[test]
    fn signed_values_use_twos_complement() {
        assert_eq!(encoded(ScalarType::NX_I16, -2i16), vec![0xFF, 0xFE]);
        assert_eq!(encoded(ScalarType::I8, -1i8), vec![0xFF]);
        let (v, pos) = ScalarType::NX_I16.read("x", &[0xFF, 0xFE], 0).unwrap();
        assert_eq!(v, Value::I16(-2));
        assert_eq!(pos, 2);
    }

    #[test]
    fn read_at_offset() {
        let buf = [0xAA, 0x39, 0x30, 0x00, 0x00];
        let (v, pos) = ScalarType::U32.read("t", &buf, 1).unwrap();
        assert_eq!(v, Value::U32(12345));
        assert_eq!(pos, 5);
    }

    #[test]
    fn read_reports_insufficient_bytes() {
        let err = ScalarType::NX_U32.read("timestamp", &[0, 1, 2], 1).unwrap_err();
        assert_eq!(
            err,
            DeserializeError::InsufficientBytes {
                field: "timestamp".to_string(),
                expected: 4,
                available: 2,
            }
        );
        assert!(ScalarType::NX_U8.read("h", &[1], 5).is_err());
    }

    #[test]
    fn coerce_range_checks() {
        assert_eq!(ScalarType::NX_U8.coerce("h", &Value::I64(255)), Ok(Value::U8(255)));
        assert!(matches!(
            ScalarType::NX_U8.coerce("h", &Value::I64(256)),
            Err(FieldError::OutOfRange { value: 256, .. })
        ));
        assert!(matches!(
            ScalarType::U16.coerce("h", &Value::I8(-1)),
            Err(FieldError::OutOfRange { .. })
        ));
        assert_eq!(ScalarType::I64.coerce("h", &Value::U8(7)), Ok(Value::I64(7)));
        assert!(matches!(
            ScalarType::I64.coerce("h", &Value::Bytes(vec![])),
            Err(FieldError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn limits_cover_full_width() {
        assert_eq!(ScalarType::NX_U64.max(), u64::MAX as i128);
        assert_eq!(ScalarType::I64.min(), i64::MIN as i128);
        assert_eq!(ScalarType::NX_I8.max(), 127);
        assert_eq!(
            encoded(ScalarType::U64, u64::MAX),
            vec![0xFF; 8]
        );
    }
}
