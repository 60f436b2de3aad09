//! Pluggable value/wire codecs shared by both decoding engines.
//!
//! A [Transformer] converts between the raw decoded wire value and its
//! interpreted form. Decode is used by both engines; encode is the write-back
//! half of the byte-level contract (synchsafe sizes are re-encodable).

use crate::errors::DecodeError;
use crate::value::Value;

/// A value/wire codec: `decode` interprets a raw wire value, `encode`
/// produces the wire value back.
pub trait Transformer: std::fmt::Debug {
    fn decode(&self, wire: Value) -> Result<Value, DecodeError>;
    fn encode(&self, value: Value) -> Result<Value, DecodeError>;
}

/// A closed enumeration of valid integer codes.
///
/// Used as the bit engine's enum cast and as a byte-level transformer.
/// Decoding a code outside the set fails with
/// [DecodeError::InvalidEnumValue]; codes the domain treats as valid
/// sentinels (e.g. "reserved") simply appear in the set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnumSpec {
    pub name: &'static str,
    pub codes: &'static [u64],
}

impl EnumSpec {
    pub const fn new(name: &'static str, codes: &'static [u64]) -> Self {
        EnumSpec { name, codes }
    }

    pub fn contains(&self, value: u64) -> bool {
        self.codes.contains(&value)
    }
}

impl Transformer for EnumSpec {
    fn decode(&self, wire: Value) -> Result<Value, DecodeError> {
        let value = wire.as_uint().ok_or(DecodeError::UnexpectedShape {
            field: "",
            expected: "integer",
        })?;
        if !self.contains(value) {
            return Err(DecodeError::InvalidEnumValue {
                field: "",
                offset: 0,
                value,
                enumeration: self.name,
            });
        }
        Ok(Value::UInt(value))
    }

    fn encode(&self, value: Value) -> Result<Value, DecodeError> {
        // Wire form and decoded form coincide for validated codes.
        self.decode(value)
    }
}

/// N-byte synchsafe unsigned integer: 7 value bits per byte, high bit always
/// zero, most-significant byte first. Used for ID3v2 tag sizes so that tag
/// data can never contain a false MPEG sync word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Synchsafe {
    pub size: usize,
}

impl Synchsafe {
    pub const fn new(size: usize) -> Self {
        Synchsafe { size }
    }
}

impl Transformer for Synchsafe {
    /// Concatenates the low 7 bits of each byte, MSB-first.
    fn decode(&self, wire: Value) -> Result<Value, DecodeError> {
        let bytes = wire.as_bytes().ok_or(DecodeError::UnexpectedShape {
            field: "",
            expected: "bytes",
        })?;
        let mut res = 0u64;
        for b in bytes {
            res = (res << 7) | (b & 0x7f) as u64;
        }
        Ok(Value::UInt(res))
    }

    /// Splits the value into 7-bit groups LSB-first, then reverses to
    /// MSB-first order, zero-padding to the fixed byte count.
    fn encode(&self, value: Value) -> Result<Value, DecodeError> {
        let mut v = value.as_uint().ok_or(DecodeError::UnexpectedShape {
            field: "",
            expected: "integer",
        })?;
        let mut groups = Vec::with_capacity(self.size);
        for _ in 0..self.size {
            groups.push((v & 0x7f) as u8);
            v >>= 7;
        }
        groups.reverse();
        Ok(Value::Bytes(groups))
    }
}

/// Fills in the field name and offset on errors raised below field level.
pub(crate) fn locate(err: DecodeError, field: &'static str, offset: usize) -> DecodeError {
    match err {
        DecodeError::InvalidEnumValue {
            field: "",
            value,
            enumeration,
            ..
        } => DecodeError::InvalidEnumValue {
            field,
            offset,
            value,
            enumeration,
        },
        DecodeError::UnexpectedShape {
            field: "",
            expected,
        } => DecodeError::UnexpectedShape { field, expected },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const MODES: EnumSpec = EnumSpec::new("mode", &[0, 1, 2, 3]);

    #[test]
    fn test_enum_decode_valid() {
        assert_eq!(MODES.decode(Value::UInt(2)).unwrap(), Value::UInt(2));
    }

    #[test]
    fn test_enum_decode_invalid() {
        assert!(matches!(
            MODES.decode(Value::UInt(9)).unwrap_err(),
            DecodeError::InvalidEnumValue { value: 9, .. }
        ));
    }

    #[test]
    fn test_synchsafe_decode() {
        let t = Synchsafe::new(4);
        // The ID3v2 tag-size example: 00 00 02 01 -> 257.
        let v = t.decode(Value::Bytes(vec![0x00, 0x00, 0x02, 0x01])).unwrap();
        assert_eq!(v, Value::UInt(257));
    }

    #[test]
    fn test_synchsafe_encode() {
        let t = Synchsafe::new(4);
        let v = t.encode(Value::UInt(257)).unwrap();
        assert_eq!(v, Value::Bytes(vec![0x00, 0x00, 0x02, 0x01]));
    }

    #[test]
    fn test_synchsafe_encode_pads_to_size() {
        let t = Synchsafe::new(4);
        assert_eq!(
            t.encode(Value::UInt(1)).unwrap(),
            Value::Bytes(vec![0, 0, 0, 1])
        );
    }

    proptest! {
        #[test]
        fn synchsafe_round_trips(v in 0u64..(1 << 28)) {
            let t = Synchsafe::new(4);
            let wire = t.encode(Value::UInt(v)).unwrap();
            prop_assert_eq!(t.decode(wire).unwrap(), Value::UInt(v));
        }
    }
}
