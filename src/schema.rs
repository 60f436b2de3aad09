//! The bit-level structure engine: compiled field schemas parsed against a
//! [crate::bits::BitCursor] into a [Record] with an offset/length log.

use crate::bits::{BitBuffer, BitCursor};
use crate::errors::{DecodeError, SchemaError};
use crate::field::{Cast, Field, FieldKind};
use crate::value::{LogEntry, Record, Value};

/// A compiled bit-level schema. Build with [BitSchema::compile], then decode
/// byte buffers with [BitSchema::parse] or share a cursor with
/// [BitSchema::parse_cursor] for nested decodes.
#[derive(Debug, Clone)]
pub struct BitSchema {
    fields: Vec<CompiledField>,
    total_bits: usize,
}

#[derive(Debug, Clone)]
struct CompiledField {
    name: &'static str,
    shape: Vec<usize>,
    n_elems: usize,
    whole_bits: usize,
    kind: CompiledKind,
}

#[derive(Debug, Clone)]
enum CompiledKind {
    Uint { bits: usize, cast: Cast },
    Struct(BitSchema),
    Switch {
        on: &'static str,
        arms: Vec<(u64, BitSchema)>,
    },
}

impl BitSchema {
    /// Compiles an ordered field list, validating widths, shapes, name
    /// uniqueness, and that every switch selects on an earlier scalar integer
    /// field with equally wide arms.
    pub fn compile(fields: Vec<Field>) -> Result<Self, SchemaError> {
        let mut compiled: Vec<CompiledField> = Vec::with_capacity(fields.len());
        let mut total_bits = 0;

        for field in fields {
            if compiled.iter().any(|c| c.name == field.name) {
                return Err(SchemaError::DuplicateName(field.name));
            }

            let mut n_elems = 1usize;
            for &dim in &field.shape {
                if dim == 0 {
                    return Err(SchemaError::InvalidShape { field: field.name });
                }
                n_elems *= dim;
            }

            let kind = match field.kind {
                FieldKind::Uint { bits, cast } => {
                    if bits == 0 || bits > 64 {
                        return Err(SchemaError::InvalidFieldWidth {
                            field: field.name,
                            bits,
                        });
                    }
                    CompiledKind::Uint { bits, cast }
                }
                FieldKind::Struct(sub) => CompiledKind::Struct(BitSchema::compile(sub)?),
                FieldKind::Switch { on, arms } => {
                    let selector_ok = compiled.iter().any(|c| {
                        c.name == on
                            && c.shape.is_empty()
                            && matches!(c.kind, CompiledKind::Uint { .. })
                    });
                    if !selector_ok {
                        return Err(SchemaError::UnknownSelector {
                            field: field.name,
                            selector: on,
                        });
                    }
                    if arms.is_empty() {
                        return Err(SchemaError::EmptySwitch(field.name));
                    }

                    let mut compiled_arms = Vec::with_capacity(arms.len());
                    let mut first_width = None;
                    for (code, sub) in arms {
                        let sub = BitSchema::compile(sub)?;
                        match first_width {
                            None => first_width = Some(sub.total_bits),
                            Some(w) if w != sub.total_bits => {
                                return Err(SchemaError::SwitchArmWidthMismatch {
                                    field: field.name,
                                    first: w,
                                    other: sub.total_bits,
                                });
                            }
                            Some(_) => {}
                        }
                        compiled_arms.push((code, sub));
                    }
                    CompiledKind::Switch {
                        on,
                        arms: compiled_arms,
                    }
                }
            };

            let elem_bits = match &kind {
                CompiledKind::Uint { bits, .. } => *bits,
                CompiledKind::Struct(sub) => sub.total_bits,
                CompiledKind::Switch { arms, .. } => arms[0].1.total_bits,
            };
            let whole_bits = elem_bits * n_elems;
            total_bits += whole_bits;

            compiled.push(CompiledField {
                name: field.name,
                shape: field.shape,
                n_elems,
                whole_bits,
                kind,
            });
        }

        Ok(BitSchema {
            fields: compiled,
            total_bits,
        })
    }

    /// Total bits one decode of this schema consumes, fixed regardless of
    /// which switch arms are taken.
    pub fn total_bits(&self) -> usize {
        self.total_bits
    }

    /// Bytes occupied by one decode, rounded up to a whole byte.
    pub fn total_bytes(&self) -> usize {
        (self.total_bits + 7) / 8
    }

    /// Decodes `data` from its first byte.
    pub fn parse(&self, data: &[u8]) -> Result<Record, DecodeError> {
        let buf = BitBuffer::with_len(data, 0, self.total_bytes());
        let mut cur = BitCursor::new(buf);
        self.parse_cursor(&mut cur)
    }

    /// Decodes from an existing cursor, consuming exactly
    /// [total_bits](BitSchema::total_bits) on success. Nested decodes advance
    /// the same cursor.
    pub fn parse_cursor(&self, cur: &mut BitCursor<'_>) -> Result<Record, DecodeError> {
        let base = cur.position();
        let mut rec = Record::new();

        for field in &self.fields {
            let start = cur.position();
            let value = if field.shape.is_empty() {
                self.decode_element(field, cur, &rec)?
            } else {
                let mut flat = Vec::with_capacity(field.n_elems);
                for _ in 0..field.n_elems {
                    flat.push(self.decode_element(field, cur, &rec)?);
                }
                reshape(flat, &field.shape)
            };
            rec.push(
                field.name,
                value,
                LogEntry {
                    offset: start,
                    size: field.whole_bits,
                },
            );
        }

        rec.set_consumed(cur.position() - base);
        Ok(rec)
    }

    fn decode_element(
        &self,
        field: &CompiledField,
        cur: &mut BitCursor<'_>,
        rec: &Record,
    ) -> Result<Value, DecodeError> {
        let offset = cur.position();
        match &field.kind {
            CompiledKind::Uint { bits, cast } => {
                let raw = cur
                    .get(*bits)
                    .map_err(|e| DecodeError::for_field(e, field.name))?;
                match cast {
                    Cast::None => Ok(Value::UInt(raw)),
                    Cast::Bool => Ok(Value::Bool(raw != 0)),
                    Cast::Enum(spec) => {
                        if spec.contains(raw) {
                            Ok(Value::UInt(raw))
                        } else {
                            Err(DecodeError::InvalidEnumValue {
                                field: field.name,
                                offset,
                                value: raw,
                                enumeration: spec.name,
                            })
                        }
                    }
                }
            }
            CompiledKind::Struct(sub) => Ok(Value::Record(sub.parse_cursor(cur)?)),
            CompiledKind::Switch { on, arms } => {
                let selector = match rec.get(on) {
                    Some(Value::UInt(v)) => *v,
                    Some(Value::Bool(b)) => *b as u64,
                    _ => return Err(DecodeError::MissingField(on)),
                };
                let arm = arms
                    .iter()
                    .find(|(code, _)| *code == selector)
                    .map(|(_, schema)| schema)
                    .ok_or(DecodeError::InvalidEnumValue {
                        field: on,
                        offset,
                        value: selector,
                        enumeration: field.name,
                    })?;
                Ok(Value::Record(arm.parse_cursor(cur)?))
            }
        }
    }
}

/// Converts a flat element list into nested arrays matching `shape`,
/// row-major: the outermost dimension varies slowest.
fn reshape(vals: Vec<Value>, shape: &[usize]) -> Value {
    if shape.len() <= 1 {
        return Value::Array(vals);
    }
    let chunk: usize = shape[1..].iter().product();
    let mut out = Vec::with_capacity(shape[0]);
    let mut it = vals.into_iter();
    for _ in 0..shape[0] {
        let sub: Vec<Value> = it.by_ref().take(chunk).collect();
        out.push(reshape(sub, &shape[1..]));
    }
    Value::Array(out)
}
