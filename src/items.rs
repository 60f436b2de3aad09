//! The byte-level structure engine: ordered fixed-width or functional items
//! decoded sequentially from a byte buffer into a [Record].

use crate::errors::{DecodeError, SchemaError};
use crate::transform::{Transformer, locate};
use crate::value::{LogEntry, Record, Value};

/// Fixed-width encoding of one item. Big-endian integers and fixed-length
/// byte strings cover the wire formats the decoders need.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fmt {
    U8,
    U16Be,
    U32Be,
    /// Fixed-length byte string, materialized as an independent copy.
    Bytes(usize),
}

impl Fmt {
    pub fn size(&self) -> usize {
        match self {
            Fmt::U8 => 1,
            Fmt::U16Be => 2,
            Fmt::U32Be => 4,
            Fmt::Bytes(n) => *n,
        }
    }

    fn unpack(&self, data: &[u8], offset: usize, field: &'static str) -> Result<Value, DecodeError> {
        let size = self.size();
        let slice = data
            .get(offset..offset + size)
            .ok_or(DecodeError::TruncatedBuffer {
                field,
                offset,
                requested: size,
                available: data.len().saturating_sub(offset),
            })?;
        Ok(match self {
            Fmt::Bytes(_) => Value::Bytes(slice.to_vec()),
            _ => Value::UInt(slice.iter().fold(0u64, |acc, b| (acc << 8) | *b as u64)),
        })
    }
}

/// A functional item: given `(buffer, offset)`, returns the decoded value and
/// how many bytes it consumed. Enables variable-length or conditional fields.
pub type ItemFn = fn(&[u8], usize) -> Result<(Value, usize), DecodeError>;

/// A single named item in a byte-level schema. Declaration order is wire
/// order.
#[derive(Debug)]
pub struct Item {
    pub name: &'static str,
    kind: ItemKind,
}

#[derive(Debug)]
enum ItemKind {
    Fixed {
        fmt: Fmt,
        transform: Option<Box<dyn Transformer + Send + Sync>>,
        no_advance: bool,
    },
    Func(ItemFn),
}

impl Item {
    /// A fixed-width item.
    pub fn fixed(name: &'static str, fmt: Fmt) -> Self {
        Item {
            name,
            kind: ItemKind::Fixed {
                fmt,
                transform: None,
                no_advance: false,
            },
        }
    }

    /// A variable-length item decoded by `f`.
    pub fn func(name: &'static str, f: ItemFn) -> Self {
        Item {
            name,
            kind: ItemKind::Func(f),
        }
    }

    /// Applies a transformer to the raw value after unpacking.
    pub fn with_transform<T: Transformer + Send + Sync + 'static>(mut self, t: T) -> Self {
        if let ItemKind::Fixed { transform, .. } = &mut self.kind {
            *transform = Some(Box::new(t));
        }
        self
    }

    /// Marks the item zero-width: it is decoded but the cursor does not move,
    /// so its bytes are also consumed by a later, more specific item.
    pub fn no_advance(mut self) -> Self {
        if let ItemKind::Fixed { no_advance, .. } = &mut self.kind {
            *no_advance = true;
        }
        self
    }
}

/// A compiled byte-level schema.
#[derive(Debug)]
pub struct ByteSchema {
    items: Vec<Item>,
}

impl ByteSchema {
    /// Compiles an ordered item list; item names must be unique.
    pub fn compile(items: Vec<Item>) -> Result<Self, SchemaError> {
        for (i, item) in items.iter().enumerate() {
            if items[..i].iter().any(|other| other.name == item.name) {
                return Err(SchemaError::DuplicateName(item.name));
            }
        }
        Ok(ByteSchema { items })
    }

    /// Decodes `data` sequentially from byte 0. The record's consumed count is
    /// the running offset after the last item, i.e. how many bytes the
    /// structure occupies.
    pub fn parse(&self, data: &[u8]) -> Result<Record, DecodeError> {
        let mut offset = 0usize;
        let mut rec = Record::new();

        for item in &self.items {
            let (value, consumed) = match &item.kind {
                ItemKind::Fixed {
                    fmt,
                    transform,
                    no_advance,
                } => {
                    let mut value = fmt.unpack(data, offset, item.name)?;
                    if let Some(t) = transform {
                        value = t.decode(value).map_err(|e| locate(e, item.name, offset))?;
                    }
                    (value, if *no_advance { 0 } else { fmt.size() })
                }
                ItemKind::Func(f) => f(data, offset)?,
            };
            rec.push(
                item.name,
                value,
                LogEntry {
                    offset,
                    size: consumed,
                },
            );
            offset += consumed;
        }

        rec.set_consumed(offset);
        Ok(rec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::Synchsafe;

    #[test]
    fn test_fixed_widths() {
        let schema = ByteSchema::compile(vec![
            Item::fixed("a", Fmt::U8),
            Item::fixed("b", Fmt::U16Be),
            Item::fixed("c", Fmt::U32Be),
            Item::fixed("d", Fmt::Bytes(3)),
        ])
        .unwrap();

        let data = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, b'I', b'D', b'3'];
        let rec = schema.parse(&data).unwrap();
        assert_eq!(rec.uint("a").unwrap(), 0x01);
        assert_eq!(rec.uint("b").unwrap(), 0x0203);
        assert_eq!(rec.uint("c").unwrap(), 0x04050607);
        assert_eq!(rec.bytes("d").unwrap(), b"ID3");
        assert_eq!(rec.consumed(), 10);
        assert_eq!(rec.log("c").unwrap(), LogEntry { offset: 3, size: 4 });
    }

    #[test]
    fn test_transform_applied() {
        let schema = ByteSchema::compile(vec![
            Item::fixed("size", Fmt::Bytes(4)).with_transform(Synchsafe::new(4)),
        ])
        .unwrap();
        let rec = schema.parse(&[0x00, 0x00, 0x02, 0x01]).unwrap();
        assert_eq!(rec.uint("size").unwrap(), 257);
    }

    #[test]
    fn test_no_advance_overlays_later_item() {
        // `peek` reads the same byte that `full` then consumes as part of a
        // wider integer.
        let schema = ByteSchema::compile(vec![
            Item::fixed("peek", Fmt::U8).no_advance(),
            Item::fixed("full", Fmt::U16Be),
        ])
        .unwrap();
        let rec = schema.parse(&[0xAB, 0xCD]).unwrap();
        assert_eq!(rec.uint("peek").unwrap(), 0xAB);
        assert_eq!(rec.uint("full").unwrap(), 0xABCD);
        assert_eq!(rec.consumed(), 2);
        assert_eq!(rec.log("peek").unwrap(), LogEntry { offset: 0, size: 0 });
    }

    #[test]
    fn test_functional_item() {
        fn length_prefixed(data: &[u8], offset: usize) -> Result<(Value, usize), DecodeError> {
            let len = *data.get(offset).ok_or(DecodeError::TruncatedBuffer {
                field: "blob",
                offset,
                requested: 1,
                available: 0,
            })? as usize;
            let body = data
                .get(offset + 1..offset + 1 + len)
                .ok_or(DecodeError::TruncatedBuffer {
                    field: "blob",
                    offset: offset + 1,
                    requested: len,
                    available: data.len().saturating_sub(offset + 1),
                })?;
            Ok((Value::Bytes(body.to_vec()), 1 + len))
        }

        let schema = ByteSchema::compile(vec![
            Item::func("blob", length_prefixed),
            Item::fixed("tail", Fmt::U8),
        ])
        .unwrap();
        let rec = schema.parse(&[0x02, 0xAA, 0xBB, 0x7F]).unwrap();
        assert_eq!(rec.bytes("blob").unwrap(), [0xAA, 0xBB]);
        assert_eq!(rec.uint("tail").unwrap(), 0x7F);
        assert_eq!(rec.consumed(), 4);
        assert_eq!(rec.log("blob").unwrap(), LogEntry { offset: 0, size: 3 });
    }

    #[test]
    fn test_truncated_names_item() {
        let schema = ByteSchema::compile(vec![Item::fixed("wide", Fmt::U32Be)]).unwrap();
        let err = schema.parse(&[0x01, 0x02]).unwrap_err();
        assert_eq!(
            err,
            DecodeError::TruncatedBuffer {
                field: "wide",
                offset: 0,
                requested: 4,
                available: 2,
            }
        );
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let err = ByteSchema::compile(vec![
            Item::fixed("x", Fmt::U8),
            Item::fixed("x", Fmt::U8),
        ])
        .unwrap_err();
        assert_eq!(err, SchemaError::DuplicateName("x"));
    }
}
