//! Unvalidated packet definitions, as written in the schema DSL or assembled in code.
//!
//! Nothing here is checked: a [`FieldDecl`] may lack a name or a type, and a
//! [`TypeSpec::Named`] may name nothing at all. The validator in [`crate::schema`] turns
//! these into [`Schema`](crate::schema::Schema)s or rejects them.

use crate::codec::ScalarType;
use crate::schema::Schema;
use std::fmt;
use std::sync::Arc;

/// Root of a parsed DSL source: packets in definition order.
#[derive(Debug, Clone, Default)]
pub struct Protocol {
    pub packets: Vec<PacketSection>,
}

#[derive(Debug, Clone)]
pub struct PacketSection {
    pub name: String,
    pub fields: Vec<FieldDecl>,
}

/// One proposed field: name, type and default, any of which may be missing.
#[derive(Debug, Clone, Default)]
pub struct FieldDecl {
    pub name: Option<String>,
    pub type_spec: Option<TypeSpec>,
    pub default: Option<Literal>,
}

impl FieldDecl {
    pub fn new(name: impl Into<String>, type_spec: TypeSpec) -> Self {
        FieldDecl {
            name: Some(name.into()),
            type_spec: Some(type_spec),
            default: None,
        }
    }

    pub fn with_default(mut self, default: impl Into<Literal>) -> Self {
        self.default = Some(default.into());
        self
    }
}

/// Field type specification.
#[derive(Debug, Clone)]
pub enum TypeSpec {
    /// A scalar or packet referred to by name, resolved during validation.
    Named(String),
    Scalar(ScalarType),
    /// `length_of<T>(field)`: a scalar holding the element count of `field`.
    LengthOf(Box<TypeSpec>, String),
    /// `array<T, n>`
    Array(Box<TypeSpec>, u64),
    /// `list<T>`
    List(Box<TypeSpec>),
    /// `bytes` or `bytes(n)`
    Bytes(Option<u64>),
    Packet(Arc<Schema>),
}

impl TypeSpec {
    pub fn named(name: impl Into<String>) -> Self {
        TypeSpec::Named(name.into())
    }

    pub fn length_of(scalar: ScalarType, target: impl Into<String>) -> Self {
        TypeSpec::LengthOf(Box::new(TypeSpec::Scalar(scalar)), target.into())
    }

    pub fn array(element: TypeSpec, length: u64) -> Self {
        TypeSpec::Array(Box::new(element), length)
    }

    pub fn list(element: TypeSpec) -> Self {
        TypeSpec::List(Box::new(element))
    }

    pub fn bytes(length: Option<u64>) -> Self {
        TypeSpec::Bytes(length)
    }

    pub fn packet(schema: &Arc<Schema>) -> Self {
        TypeSpec::Packet(Arc::clone(schema))
    }
}

impl From<ScalarType> for TypeSpec {
    fn from(t: ScalarType) -> Self {
        TypeSpec::Scalar(t)
    }
}

impl fmt::Display for TypeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeSpec::Named(n) => f.write_str(n),
            TypeSpec::Scalar(t) => write!(f, "{}", t),
            TypeSpec::LengthOf(t, target) => write!(f, "length_of<{}>({})", t, target),
            TypeSpec::Array(t, n) => write!(f, "array<{}, {}>", t, n),
            TypeSpec::List(t) => write!(f, "list<{}>", t),
            TypeSpec::Bytes(Some(n)) => write!(f, "bytes({})", n),
            TypeSpec::Bytes(None) => f.write_str("bytes"),
            TypeSpec::Packet(s) => f.write_str(s.name()),
        }
    }
}

/// Default value as written in the source.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i128),
    /// Hex digits without the `0x` prefix; kept as text so byte sequences keep leading zeros.
    Hex(String),
    List(Vec<Literal>),
}

impl Literal {
    pub fn as_i128(&self) -> Option<i128> {
        match self {
            Literal::Int(i) => Some(*i),
            Literal::Hex(h) if h.len() <= 32 => u128::from_str_radix(h, 16)
                .ok()
                .and_then(|v| i128::try_from(v).ok()),
            _ => None,
        }
    }

    /// Bytes of a hex literal, most significant first. An odd digit count gets a leading zero.
    pub fn hex_bytes(&self) -> Option<Vec<u8>> {
        match self {
            Literal::Hex(h) if h.len() % 2 == 1 => hex::decode(format!("0{}", h)).ok(),
            Literal::Hex(h) => hex::decode(h).ok(),
            _ => None,
        }
    }
}

impl From<i64> for Literal {
    fn from(v: i64) -> Self {
        Literal::Int(v as i128)
    }
}

impl From<u64> for Literal {
    fn from(v: u64) -> Self {
        Literal::Int(v as i128)
    }
}

impl From<i32> for Literal {
    fn from(v: i32) -> Self {
        Literal::Int(v as i128)
    }
}

impl From<Vec<u8>> for Literal {
    fn from(v: Vec<u8>) -> Self {
        Literal::List(v.into_iter().map(|b| Literal::Int(b as i128)).collect())
    }
}
