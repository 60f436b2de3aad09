//! Decoded values, records, and the per-field offset/length audit log.

use crate::errors::DecodeError;

/// Offset and length of one decoded field, for diagnostics.
///
/// Units are bits for bit-level records and bytes for byte-level records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct LogEntry {
    pub offset: usize,
    pub size: usize,
}

/// A value produced by decoding a field.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Value {
    UInt(u64),
    Bool(bool),
    /// Raw bytes, from byte-level fixed-length string items.
    Bytes(Vec<u8>),
    /// Shaped fields nest arrays row-major, outermost dimension first.
    Array(Vec<Value>),
    /// A nested sub-record.
    Record(Record),
}

impl Value {
    pub fn as_uint(&self) -> Option<u64> {
        match self {
            Value::UInt(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Record(v) => Some(v),
            _ => None,
        }
    }
}

/// One decoded field: name, value, and where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Entry {
    pub name: &'static str,
    pub value: Value,
    pub log: LogEntry,
}

/// An ordered mapping of field names to decoded values, plus the audit log.
///
/// Entries appear in schema declaration order, which is also wire order.
/// `consumed` is the total the decode advanced by: bits for bit-level
/// records, bytes for byte-level records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Record {
    entries: Vec<Entry>,
    consumed: usize,
}

impl Record {
    pub(crate) fn new() -> Self {
        Record::default()
    }

    pub(crate) fn push(&mut self, name: &'static str, value: Value, log: LogEntry) {
        self.entries.push(Entry { name, value, log });
    }

    pub(crate) fn set_consumed(&mut self, consumed: usize) {
        self.consumed = consumed;
    }

    /// Total bits (bit-level) or bytes (byte-level) this record consumed.
    pub fn consumed(&self) -> usize {
        self.consumed
    }

    /// Decoded fields in declaration order.
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .map(|e| &e.value)
    }

    /// Offset/length log entry for a field, if present.
    pub fn log(&self, name: &str) -> Option<LogEntry> {
        self.entries.iter().find(|e| e.name == name).map(|e| e.log)
    }

    fn require(&self, name: &'static str) -> Result<&Value, DecodeError> {
        self.get(name).ok_or(DecodeError::MissingField(name))
    }

    pub fn uint(&self, name: &'static str) -> Result<u64, DecodeError> {
        self.require(name)?
            .as_uint()
            .ok_or(DecodeError::UnexpectedShape {
                field: name,
                expected: "integer",
            })
    }

    pub fn boolean(&self, name: &'static str) -> Result<bool, DecodeError> {
        self.require(name)?
            .as_bool()
            .ok_or(DecodeError::UnexpectedShape {
                field: name,
                expected: "boolean",
            })
    }

    pub fn bytes(&self, name: &'static str) -> Result<&[u8], DecodeError> {
        self.require(name)?
            .as_bytes()
            .ok_or(DecodeError::UnexpectedShape {
                field: name,
                expected: "bytes",
            })
    }

    pub fn array(&self, name: &'static str) -> Result<&[Value], DecodeError> {
        self.require(name)?
            .as_array()
            .ok_or(DecodeError::UnexpectedShape {
                field: name,
                expected: "array",
            })
    }

    pub fn record(&self, name: &'static str) -> Result<&Record, DecodeError> {
        self.require(name)?
            .as_record()
            .ok_or(DecodeError::UnexpectedShape {
                field: name,
                expected: "record",
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Record {
        let mut rec = Record::new();
        rec.push("id", Value::UInt(7), LogEntry { offset: 0, size: 8 });
        rec.push(
            "flag",
            Value::Bool(true),
            LogEntry { offset: 8, size: 1 },
        );
        rec.set_consumed(9);
        rec
    }

    #[test]
    fn test_get_and_log() {
        let rec = sample();
        assert_eq!(rec.uint("id").unwrap(), 7);
        assert_eq!(rec.boolean("flag").unwrap(), true);
        assert_eq!(rec.log("flag").unwrap(), LogEntry { offset: 8, size: 1 });
        assert_eq!(rec.consumed(), 9);
    }

    #[test]
    fn test_missing_field() {
        let rec = sample();
        assert_eq!(
            rec.uint("nope").unwrap_err(),
            DecodeError::MissingField("nope")
        );
    }

    #[test]
    fn test_wrong_shape() {
        let rec = sample();
        assert_eq!(
            rec.bytes("id").unwrap_err(),
            DecodeError::UnexpectedShape {
                field: "id",
                expected: "bytes"
            }
        );
    }

    #[test]
    fn test_entries_keep_declaration_order() {
        let rec = sample();
        let names: Vec<_> = rec.entries().iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["id", "flag"]);
    }
}
