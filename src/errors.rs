//! Error types for schema compilation, raw bit access, and structure decoding.

use thiserror::Error;

/// Errors produced when compiling a field or item list into a schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// Scalar field width is 0 or greater than 64 bits.
    #[error("field `{field}` has invalid width of {bits} bits")]
    InvalidFieldWidth { field: &'static str, bits: usize },
    /// A shape dimension is zero.
    #[error("field `{field}` has a zero-sized shape dimension")]
    InvalidShape { field: &'static str },
    /// Two fields or items share the same name.
    #[error("duplicate field name `{0}`")]
    DuplicateName(&'static str),
    /// A switch field refers to a selector that is not an earlier integer field.
    #[error("switch `{field}` selects on `{selector}`, which is not an earlier integer field")]
    UnknownSelector {
        field: &'static str,
        selector: &'static str,
    },
    /// A switch field has no arms.
    #[error("switch `{0}` has no arms")]
    EmptySwitch(&'static str),
    /// Switch arms do not all consume the same number of bits.
    #[error("switch `{field}` arms differ in width ({first} vs {other} bits)")]
    SwitchArmWidthMismatch {
        field: &'static str,
        first: usize,
        other: usize,
    },
}

/// Errors produced when reading bits from a [crate::bits::BitBuffer].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ReadError {
    /// Requested bit range is beyond the end of the backing bytes.
    #[error("bit range [{offset}, {offset}+{requested}) is beyond the {available} available bits")]
    OutOfBounds {
        offset: usize,
        requested: usize,
        available: usize,
    },
    /// More than 64 bits were requested in a single integer conversion.
    #[error("cannot convert {0} bits to an integer (max 64)")]
    TooManyBits(usize),
    /// Integer conversion attempted on a buffer of unknown bit length.
    #[error("cannot convert a bit range of unknown length to an integer")]
    UnknownLength,
    /// A non-contiguous (stepped) slice was requested.
    #[error("bit slices with step {0} are not supported")]
    UnsupportedStep(usize),
}

/// Errors produced while decoding a structure against a schema.
///
/// Decoding is deterministic: a failure on given bytes always recurs, so none
/// of these are retried. Each carries the field name and the bit or byte
/// offset where detection occurred.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Fewer bits or bytes were available than the schema requires.
    #[error("field `{field}`: needed {requested} at offset {offset}, only {available} available")]
    TruncatedBuffer {
        field: &'static str,
        offset: usize,
        requested: usize,
        available: usize,
    },
    /// The decoded integer has no matching variant in the declared enumeration.
    #[error("field `{field}`: value {value} at offset {offset} is not a valid `{enumeration}` code")]
    InvalidEnumValue {
        field: &'static str,
        offset: usize,
        value: u64,
        enumeration: &'static str,
    },
    /// A reserved or invalid lookup index was used to derive a dependent value.
    #[error("`{table}` index {index} is reserved or invalid")]
    InvalidTableIndex { table: &'static str, index: u64 },
    /// A structural precondition was violated (e.g. a missing magic literal).
    #[error("malformed header: {0}")]
    MalformedHeader(String),
    /// A raw bit read failed outside any field context.
    #[error(transparent)]
    Read(#[from] ReadError),
    /// A caller asked a decoded record for a field it does not contain.
    #[error("field `{0}` is missing from the decoded record")]
    MissingField(&'static str),
    /// A decoded field does not have the value shape the caller expected.
    #[error("field `{field}` does not have the expected {expected} shape")]
    UnexpectedShape {
        field: &'static str,
        expected: &'static str,
    },
}

impl DecodeError {
    /// Attaches a field name to a raw read failure.
    pub(crate) fn for_field(err: ReadError, field: &'static str) -> Self {
        match err {
            ReadError::OutOfBounds {
                offset,
                requested,
                available,
            } => DecodeError::TruncatedBuffer {
                field,
                offset,
                requested,
                available,
            },
            other => DecodeError::Read(other),
        }
    }
}
