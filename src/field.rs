//! Definition of the declarative bit-level fields used to build a
//! [crate::schema::BitSchema].

use crate::transform::EnumSpec;

/// A single named field in a bit-level schema.
///
/// Declaration order is wire order: fields consume bits sequentially from one
/// shared cursor. A non-empty `shape` repeats the element
/// `product(shape)` times and reshapes the results row-major.
#[derive(Debug, Clone)]
pub struct Field {
    /// Name used in the decoded record.
    pub name: &'static str,
    /// What one element of this field is.
    pub kind: FieldKind,
    /// Dimension sizes; empty means scalar.
    pub shape: Vec<usize>,
}

/// What a field element decodes to.
#[derive(Debug, Clone)]
pub enum FieldKind {
    /// `bits` consumed as an unsigned integer, optionally cast.
    Uint { bits: usize, cast: Cast },
    /// A nested sub-record consuming bits from the same cursor.
    Struct(Vec<Field>),
    /// A decode-time branch: the sub-schema is selected by the value of an
    /// earlier field (`on`) in the same record. All arms must consume the
    /// same number of bits, so structure size is fixed regardless of branch.
    Switch {
        on: &'static str,
        arms: Vec<(u64, Vec<Field>)>,
    },
}

/// Value transform applied to a decoded integer element.
#[derive(Debug, Clone)]
pub enum Cast {
    None,
    /// Nonzero becomes `true`.
    Bool,
    /// Validated against a closed code set.
    Enum(EnumSpec),
}

impl Field {
    /// A plain unsigned integer field of `bits` bits.
    pub fn uint(name: &'static str, bits: usize) -> Self {
        Field {
            name,
            kind: FieldKind::Uint {
                bits,
                cast: Cast::None,
            },
            shape: Vec::new(),
        }
    }

    /// A single-bit boolean flag.
    pub fn flag(name: &'static str) -> Self {
        Field {
            name,
            kind: FieldKind::Uint {
                bits: 1,
                cast: Cast::Bool,
            },
            shape: Vec::new(),
        }
    }

    /// An integer field validated against `spec`.
    pub fn enumerated(name: &'static str, bits: usize, spec: EnumSpec) -> Self {
        Field {
            name,
            kind: FieldKind::Uint {
                bits,
                cast: Cast::Enum(spec),
            },
            shape: Vec::new(),
        }
    }

    /// A nested sub-record field.
    pub fn structure(name: &'static str, fields: Vec<Field>) -> Self {
        Field {
            name,
            kind: FieldKind::Struct(fields),
            shape: Vec::new(),
        }
    }

    /// A conditional field whose layout is chosen by the earlier field `on`.
    pub fn switch(name: &'static str, on: &'static str, arms: Vec<(u64, Vec<Field>)>) -> Self {
        Field {
            name,
            kind: FieldKind::Switch { on, arms },
            shape: Vec::new(),
        }
    }

    /// Repeats the element into the given multi-dimensional shape.
    pub fn with_shape(mut self, shape: &[usize]) -> Self {
        self.shape = shape.to_vec();
        self
    }
}
