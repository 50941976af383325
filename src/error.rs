//! Error types for schema definition, decoding and field assignment.

/// Raised while a schema is being defined. No partially valid schema is ever produced.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    #[error("Syntax: {0}")]
    Syntax(String),
    #[error("field #{index}: missing name or type")]
    MissingNameOrType { index: usize },
    #[error("field {field}: invalid field type `{ty}`")]
    InvalidFieldType { field: String, ty: String },
    #[error("duplicate field name: {0}")]
    DuplicateFieldName(String),
    #[error("length field {0} cannot have a default")]
    LengthWithDefault(String),
    #[error("only the last field may have undefined length ({0})")]
    UnboundedNotLast(String),
    #[error("length field {field} refers to unknown field {target}")]
    UnknownLengthTarget { field: String, target: String },
    #[error("length field {field} cannot describe {target}: not an array, list or bytes field")]
    InvalidLengthTarget { field: String, target: String },
    #[error("field {target} has more than one length field")]
    DuplicateLengthTarget { target: String },
    #[error("length field {field} must precede its target {target}")]
    LengthAfterTarget { field: String, target: String },
    #[error("length field {field} is too narrow for the {length} elements of {target}")]
    LengthTooNarrow {
        field: String,
        target: String,
        length: usize,
    },
    #[error("field {0}: serialized size overflows usize")]
    SizeOverflow(String),
    #[error("field {field}: elements must have a fixed, non-zero size")]
    UnsizedElement { field: String },
    #[error("field {field}: invalid default: {reason}")]
    InvalidDefault { field: String, reason: String },
    #[error("duplicate packet name: {0}")]
    DuplicatePacket(String),
    #[error("IO: {0}")]
    Io(String),
}

impl From<std::io::Error> for SchemaError {
    fn from(err: std::io::Error) -> Self {
        SchemaError::Io(err.to_string())
    }
}

/// Raised by a single deserialize call. The packet keeps whatever was decoded before the
/// failing field.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeserializeError {
    #[error("{field}: insufficient bytes: expected {expected}, available {available}")]
    InsufficientBytes {
        field: String,
        expected: usize,
        available: usize,
    },
    #[error("{0}: unknown length")]
    UnknownLength(String),
    #[error("{field}: invalid length of data (position {pos}, {len} bytes)")]
    InvalidLength { field: String, pos: usize, len: usize },
    #[error("{field}: negative length {value}")]
    NegativeLength { field: String, value: i64 },
}

/// Raised when a value is assigned to, or appended into, a packet field.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FieldError {
    #[error("unknown field: {0}")]
    UnknownField(String),
    #[error("cannot assign {found} to field {field} of type {expected}")]
    TypeMismatch {
        field: String,
        expected: String,
        found: String,
    },
    #[error("value {value} out of range for field {field} of type {ty}")]
    OutOfRange {
        field: String,
        value: i128,
        ty: String,
    },
    #[error("field {0} is derived from its target and cannot be assigned")]
    DerivedField(String),
    #[error("field {field} cannot hold more than {max} elements")]
    CapacityExceeded { field: String, max: usize },
    #[error("field {0} is not an array, list or bytes field")]
    NotASequence(String),
}
