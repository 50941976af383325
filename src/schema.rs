//! Schema validation: turns field declarations into an immutable [`Schema`].
//!
//! Validation runs once, eagerly, when the schema is defined. Per declaration, in order:
//!
//! 1. name and type must both be present,
//! 2. the type must resolve (scalar name, `length_of`, `array`, `list`, `bytes`, or a
//!    known packet),
//! 3. the name must not repeat,
//! 4. a length field must not carry a default,
//! 5. an unbounded field must be last, or be a list or byte field with a length field.
//!    A nested packet is unbounded only when its own schema is open-ended.
//!
//! Then length links are resolved to field indices and defaults are converted to values.
//! The resulting schema is shared read-only (`Arc<Schema>`) by every packet built from it.

use crate::ast::{FieldDecl, Literal, Protocol, TypeSpec};
use crate::codec::ScalarType;
use crate::error::SchemaError;
use crate::field::{ElementType, LengthLink};
use crate::packet::Slot;
use crate::value::Value;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::debug;

/// Resolved type of one field.
#[derive(Debug, Clone)]
pub enum FieldType {
    Scalar(ScalarType),
    Length(LengthLink),
    Array { element: ElementType, length: usize },
    List(ElementType),
    /// Byte sequence, fixed length when `Some`.
    Bytes(Option<usize>),
    Nested(Arc<Schema>),
}

impl FieldType {
    /// Bytes this field always occupies; 0 for unbounded fields.
    pub fn minimal_size(&self) -> usize {
        match self {
            FieldType::Scalar(t) => t.size(),
            FieldType::Length(link) => link.scalar().size(),
            FieldType::Array { element, length } => element.size().saturating_mul(*length),
            FieldType::List(_) => 0,
            FieldType::Bytes(n) => n.unwrap_or(0),
            FieldType::Nested(s) => s.minimal_size(),
        }
    }

    /// Serialized size if it never varies.
    pub fn fixed_size(&self) -> Option<usize> {
        match self {
            FieldType::List(_) | FieldType::Bytes(None) => None,
            FieldType::Nested(s) => s.fixed_size(),
            _ => Some(self.minimal_size()),
        }
    }

    /// Lists, variable byte sequences, and nested packets that end in one with no length
    /// field. Such a field stops at the end of the buffer unless a length field bounds it.
    pub fn is_unbounded(&self) -> bool {
        match self {
            FieldType::List(_) | FieldType::Bytes(None) => true,
            FieldType::Nested(s) => s.is_open_ended(),
            _ => false,
        }
    }

    /// Arrays, lists and byte sequences: the fields a length link may describe.
    pub fn is_sequence(&self) -> bool {
        matches!(
            self,
            FieldType::Array { .. } | FieldType::List(_) | FieldType::Bytes(_)
        )
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Scalar(t) => write!(f, "{}", t),
            FieldType::Length(link) => write!(f, "length_of<{}>({})", link.scalar(), link.target()),
            FieldType::Array { element, length } => write!(f, "array<{}, {}>", element, length),
            FieldType::List(element) => write!(f, "list<{}>", element),
            FieldType::Bytes(Some(n)) => write!(f, "bytes({})", n),
            FieldType::Bytes(None) => f.write_str("bytes"),
            FieldType::Nested(s) => f.write_str(s.name()),
        }
    }
}

/// One validated field. The default, if any, is already converted to the field's type.
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    pub name: String,
    pub ty: FieldType,
    pub default: Option<Value>,
}

/// Position of a field within its schema; resolve once with [`Schema::field_id`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldId(pub(crate) usize);

impl FieldId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Immutable, validated packet layout.
#[derive(Debug)]
pub struct Schema {
    name: String,
    fields: Vec<FieldDescriptor>,
    index: HashMap<String, usize>,
    /// Length field index -> target index.
    length_target: Vec<Option<usize>>,
    /// Target index -> length field index.
    length_source: Vec<Option<usize>>,
    minimal_size: usize,
    fixed_size: Option<usize>,
    open_ended: bool,
}

impl Schema {
    /// Validate `fields` into a schema. Packets can be nested with [`TypeSpec::Packet`];
    /// use [`SchemaSet`] to refer to them by name.
    pub fn new(name: impl Into<String>, fields: Vec<FieldDecl>) -> Result<Arc<Schema>, SchemaError> {
        validate(name.into(), fields, &|_: &str| None).map(Arc::new)
    }

    pub fn builder(name: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn field(&self, id: FieldId) -> &FieldDescriptor {
        &self.fields[id.0]
    }

    pub fn field_id(&self, name: &str) -> Option<FieldId> {
        self.index.get(name).copied().map(FieldId)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Sum of every field's minimal size; unbounded fields count as 0. A buffer shorter
    /// than this can never hold a complete packet.
    pub fn minimal_size(&self) -> usize {
        self.minimal_size
    }

    /// Serialized size of every packet of this schema, if no field is unbounded.
    pub fn fixed_size(&self) -> Option<usize> {
        self.fixed_size
    }

    /// True when the last field is unbounded and no length field describes it: a packet
    /// of this schema runs to the end of its buffer.
    pub fn is_open_ended(&self) -> bool {
        self.open_ended
    }

    /// For a length field, the field whose element count it carries.
    pub fn length_target(&self, id: FieldId) -> Option<FieldId> {
        self.length_target.get(id.0).copied().flatten().map(FieldId)
    }

    /// For a length-linked field, the length field that carries its element count.
    pub fn length_source(&self, id: FieldId) -> Option<FieldId> {
        self.length_source.get(id.0).copied().flatten().map(FieldId)
    }

    /// All `(length field, target)` pairs in declaration order.
    pub fn dependencies(&self) -> impl Iterator<Item = (FieldId, FieldId)> + '_ {
        self.length_target
            .iter()
            .enumerate()
            .filter_map(|(i, t)| t.map(|t| (FieldId(i), FieldId(t))))
    }

    /// Maximum element count of a length-linked field: what its link's scalar can hold.
    pub(crate) fn capacity(&self, index: usize) -> Option<usize> {
        let source = self.length_source.get(index).copied().flatten()?;
        match &self.fields[source].ty {
            FieldType::Length(link) => Some(link.capacity()),
            _ => None,
        }
    }
}

/// Collects field declarations for [`Schema::new`].
#[derive(Debug, Clone)]
pub struct SchemaBuilder {
    name: String,
    fields: Vec<FieldDecl>,
}

impl SchemaBuilder {
    pub fn field(mut self, name: impl Into<String>, type_spec: impl Into<TypeSpec>) -> Self {
        self.fields.push(FieldDecl::new(name, type_spec.into()));
        self
    }

    pub fn field_with_default(
        mut self,
        name: impl Into<String>,
        type_spec: impl Into<TypeSpec>,
        default: impl Into<Literal>,
    ) -> Self {
        self.fields
            .push(FieldDecl::new(name, type_spec.into()).with_default(default));
        self
    }

    pub fn decl(mut self, decl: FieldDecl) -> Self {
        self.fields.push(decl);
        self
    }

    pub fn build(self) -> Result<Arc<Schema>, SchemaError> {
        Schema::new(self.name, self.fields)
    }
}

type PacketLookup<'a> = dyn Fn(&str) -> Option<Arc<Schema>> + 'a;

fn validate(name: String, decls: Vec<FieldDecl>, lookup: &PacketLookup<'_>) -> Result<Schema, SchemaError> {
    let count = decls.len();
    let mut resolved: Vec<(String, FieldType, Option<Literal>)> = Vec::with_capacity(count);
    let mut index = HashMap::with_capacity(count);
    // target name -> length field index
    let mut linked: HashMap<String, usize> = HashMap::new();
    // unbounded sequences before the last field; each needs a length field
    let mut pending: Vec<String> = Vec::new();

    for (i, decl) in decls.into_iter().enumerate() {
        let (field, spec) = match (decl.name, decl.type_spec) {
            (Some(n), Some(t)) if !n.is_empty() => (n, t),
            _ => return Err(SchemaError::MissingNameOrType { index: i }),
        };
        let ty = resolve_type(&field, &spec, lookup)?;
        if index.contains_key(&field) {
            return Err(SchemaError::DuplicateFieldName(field));
        }
        if let FieldType::Length(link) = &ty {
            if decl.default.is_some() {
                return Err(SchemaError::LengthWithDefault(field));
            }
            if linked.insert(link.target().to_string(), i).is_some() {
                return Err(SchemaError::DuplicateLengthTarget {
                    target: link.target().to_string(),
                });
            }
        }
        if ty.is_unbounded() && i + 1 != count {
            if !ty.is_sequence() {
                return Err(SchemaError::UnboundedNotLast(field));
            }
            pending.push(field.clone());
        }
        index.insert(field.clone(), i);
        resolved.push((field, ty, decl.default));
    }
    if let Some(field) = pending.into_iter().find(|f| !linked.contains_key(f)) {
        return Err(SchemaError::UnboundedNotLast(field));
    }

    let mut length_target = vec![None; count];
    let mut length_source = vec![None; count];
    for (source, (field, ty, _)) in resolved.iter().enumerate() {
        let FieldType::Length(link) = ty else {
            continue;
        };
        let target = *index
            .get(link.target())
            .ok_or_else(|| SchemaError::UnknownLengthTarget {
                field: field.clone(),
                target: link.target().to_string(),
            })?;
        let target_ty = &resolved[target].1;
        if !target_ty.is_sequence() {
            return Err(SchemaError::InvalidLengthTarget {
                field: field.clone(),
                target: link.target().to_string(),
            });
        }
        let fixed = match target_ty {
            FieldType::Array { length, .. } => Some(*length),
            FieldType::Bytes(n) => *n,
            _ => None,
        };
        // a variable target is read with the count, so the count must come first
        if target < source && fixed.is_none() {
            return Err(SchemaError::LengthAfterTarget {
                field: field.clone(),
                target: link.target().to_string(),
            });
        }
        if let Some(length) = fixed.filter(|n| *n > link.capacity()) {
            return Err(SchemaError::LengthTooNarrow {
                field: field.clone(),
                target: link.target().to_string(),
                length,
            });
        }
        length_target[source] = Some(target);
        length_source[target] = Some(source);
    }

    let mut minimal_size = 0usize;
    let mut fixed_size = Some(0usize);
    for (field, ty, _) in &resolved {
        let overflow = || SchemaError::SizeOverflow(field.clone());
        minimal_size = minimal_size.checked_add(ty.minimal_size()).ok_or_else(overflow)?;
        fixed_size = match (fixed_size, ty.fixed_size()) {
            (Some(total), Some(n)) => Some(total.checked_add(n).ok_or_else(overflow)?),
            _ => None,
        };
    }
    let open_ended = resolved
        .last()
        .is_some_and(|(_, ty, _)| ty.is_unbounded() && length_source[count - 1].is_none());

    let capacity: Vec<Option<usize>> = length_source
        .iter()
        .map(|s| match s.map(|s| &resolved[s].1) {
            Some(FieldType::Length(link)) => Some(link.capacity()),
            _ => None,
        })
        .collect();
    let mut fields = Vec::with_capacity(count);
    for (i, (field, ty, default)) in resolved.into_iter().enumerate() {
        let default = default
            .map(|lit| default_value(&field, &ty, &lit, capacity[i]))
            .transpose()?;
        fields.push(FieldDescriptor {
            name: field,
            ty,
            default,
        });
    }


    #[cfg(feature = "logging")]
    debug!(
        "validated schema {} ({} fields, minimal size {})",
        name, count, minimal_size
    );

    Ok(Schema {
        name,
        fields,
        index,
        length_target,
        length_source,
        minimal_size,
        fixed_size,
        open_ended,
    })
}

fn resolve_type(field: &str, spec: &TypeSpec, lookup: &PacketLookup<'_>) -> Result<FieldType, SchemaError> {
    let invalid = || SchemaError::InvalidFieldType {
        field: field.to_string(),
        ty: spec.to_string(),
    };
    match spec {
        TypeSpec::Named(n) => match ScalarType::from_name(n) {
            Some(t) => Ok(FieldType::Scalar(t)),
            None => lookup(n.as_str()).map(FieldType::Nested).ok_or_else(invalid),
        },
        TypeSpec::Scalar(t) => Ok(FieldType::Scalar(*t)),
        TypeSpec::LengthOf(inner, target) => match resolve_type(field, inner, lookup) {
            Ok(FieldType::Scalar(t)) => Ok(FieldType::Length(LengthLink::new(t, target.clone()))),
            _ => Err(invalid()),
        },
        TypeSpec::Array(inner, n) => {
            let element = resolve_element(field, inner, lookup)?;
            let length = usize::try_from(*n).map_err(|_| invalid())?;
            if element.size().checked_mul(length).is_none() {
                return Err(SchemaError::SizeOverflow(field.to_string()));
            }
            Ok(FieldType::Array { element, length })
        }
        TypeSpec::List(inner) => Ok(FieldType::List(resolve_element(field, inner, lookup)?)),
        TypeSpec::Bytes(n) => n
            .map(usize::try_from)
            .transpose()
            .map(FieldType::Bytes)
            .map_err(|_| invalid()),
        TypeSpec::Packet(s) => Ok(FieldType::Nested(Arc::clone(s))),
    }
}

/// Array and list elements: a scalar, or a non-empty packet whose every instance has the
/// same size.
fn resolve_element(field: &str, spec: &TypeSpec, lookup: &PacketLookup<'_>) -> Result<ElementType, SchemaError> {
    match resolve_type(field, spec, lookup)? {
        FieldType::Scalar(t) => Ok(ElementType::Scalar(t)),
        FieldType::Nested(s) if s.fixed_size().is_some_and(|n| n > 0) => Ok(ElementType::Packet(s)),
        FieldType::Nested(_) => Err(SchemaError::UnsizedElement {
            field: field.to_string(),
        }),
        _ => Err(SchemaError::InvalidFieldType {
            field: field.to_string(),
            ty: spec.to_string(),
        }),
    }
}

/// Convert a default literal and check it by assigning it to an empty field of the same type.
fn default_value(
    field: &str,
    ty: &FieldType,
    lit: &Literal,
    capacity: Option<usize>,
) -> Result<Value, SchemaError> {
    let invalid = |reason: String| SchemaError::InvalidDefault {
        field: field.to_string(),
        reason,
    };
    let value = literal_value(ty, lit).map_err(|r| invalid(r.to_string()))?;
    let mut slot = Slot::empty(field, ty, capacity);
    slot.assign(field, value).map_err(|e| invalid(e.to_string()))?;
    let value = slot.value();
    let stored = match &value {
        Value::List(items) => items.len(),
        Value::Bytes(b) => b.len(),
        _ => 0,
    };
    let fixed = match ty {
        FieldType::Array { length, .. } => Some(*length),
        FieldType::Bytes(n) => *n,
        _ => None,
    };
    if let Some(max) = fixed.filter(|&n| stored > n) {
        return Err(invalid(format!("more than {} elements", max)));
    }
    Ok(value)
}

fn literal_value(ty: &FieldType, lit: &Literal) -> Result<Value, &'static str> {
    match (ty, lit) {
        (FieldType::Scalar(_), _) => lit
            .as_i128()
            .and_then(int_value)
            .ok_or("expected an integer"),
        (FieldType::Nested(_), _) => Err("nested packets cannot have defaults"),
        (
            FieldType::Array {
                element: ElementType::Packet(_),
                ..
            }
            | FieldType::List(ElementType::Packet(_)),
            _,
        ) => Err("packet elements cannot have defaults"),
        (FieldType::Array { .. } | FieldType::List(_) | FieldType::Bytes(_), Literal::List(items)) => items
            .iter()
            .map(|l| l.as_i128().and_then(int_value).ok_or("expected a list of integers"))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::List),
        (FieldType::Array { .. } | FieldType::List(_) | FieldType::Bytes(_), Literal::Hex(_)) => lit
            .hex_bytes()
            .map(Value::Bytes)
            .ok_or("invalid hex literal"),
        (FieldType::Bytes(len), Literal::Int(n)) => u128::try_from(*n)
            .ok()
            .and_then(|n| be_bytes(n, *len))
            .map(Value::Bytes)
            .ok_or("integer does not fit the byte sequence"),
        _ => Err("literal does not match the field type"),
    }
}

fn int_value(n: i128) -> Option<Value> {
    match i64::try_from(n) {
        Ok(v) => Some(Value::I64(v)),
        Err(_) => u64::try_from(n).ok().map(Value::U64),
    }
}

/// Big-endian bytes of `n`: exactly `len` bytes when given, otherwise the fewest that hold it.
pub(crate) fn be_bytes(n: u128, len: Option<usize>) -> Option<Vec<u8>> {
    let raw = n.to_be_bytes();
    let significant = raw.len() - (n.leading_zeros() as usize / 8);
    let len = match len {
        Some(len) if len < significant => return None,
        Some(len) => len,
        None => significant.max(1),
    };
    let mut out = Vec::new();
    out.try_reserve_exact(len).ok()?;
    out.resize(len.saturating_sub(raw.len()), 0);
    out.extend_from_slice(&raw[raw.len() - len.min(raw.len())..]);
    Some(out)
}

/// Packets of one protocol, by name. Later packets may nest earlier ones.
#[derive(Debug, Clone, Default)]
pub struct SchemaSet {
    schemas: Vec<Arc<Schema>>,
    index: HashMap<String, usize>,
}

impl SchemaSet {
    /// Validate every packet section in order.
    pub fn resolve(protocol: Protocol) -> Result<Self, SchemaError> {
        let mut set = SchemaSet::default();
        for section in protocol.packets {
            if set.index.contains_key(&section.name) {
                return Err(SchemaError::DuplicatePacket(section.name));
            }
            let schema = validate(section.name, section.fields, &|n: &str| set.get(n).cloned())?;
            set.index.insert(schema.name.clone(), set.schemas.len());
            set.schemas.push(Arc::new(schema));
        }
        Ok(set)
    }

    /// Parse and validate DSL source.
    pub fn from_source(src: &str) -> Result<Self, SchemaError> {
        Self::resolve(crate::parser::parse(src)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, SchemaError> {
        let src = std::fs::read_to_string(path)?;
        Self::from_source(&src)
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Schema>> {
        self.index.get(name).map(|&i| &self.schemas[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Schema>> {
        self.schemas.iter()
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point() -> Arc<Schema> {
        Schema::builder("Point")
            .field("x", ScalarType::NX_I32)
            .field("y", ScalarType::NX_I32)
            .build()
            .unwrap()
    }

    #[test]
    fn links_are_resolved_both_ways() {
        let s = Schema::builder("P")
            .field("header", ScalarType::NX_U8)
            .field("length", TypeSpec::length_of(ScalarType::NX_U8, "data"))
            .field("data", TypeSpec::list(ScalarType::NX_U16.into()))
            .field("tail", ScalarType::NX_U8)
            .build()
            .unwrap();
        let length = s.field_id("length").unwrap();
        let data = s.field_id("data").unwrap();
        assert_eq!(s.length_target(length), Some(data));
        assert_eq!(s.length_source(data), Some(length));
        assert_eq!(s.dependencies().collect::<Vec<_>>(), vec![(length, data)]);
        assert_eq!(s.capacity(data.index()), Some(255));
        assert_eq!(s.minimal_size(), 3);
        assert_eq!(s.fixed_size(), None);
    }

    #[test]
    fn fixed_schema_has_fixed_size() {
        let p = point();
        assert_eq!(p.fixed_size(), Some(8));
        let s = Schema::builder("Path")
            .field("points", TypeSpec::array(TypeSpec::packet(&p), 3))
            .field("tag", TypeSpec::bytes(Some(2)))
            .build()
            .unwrap();
        assert_eq!(s.fixed_size(), Some(26));
        assert_eq!(s.minimal_size(), 26);
    }

    #[test]
    fn unbounded_field_must_be_last_unless_linked() {
        let err = Schema::builder("P")
            .field("data", TypeSpec::list(ScalarType::U8.into()))
            .field("tail", ScalarType::U8)
            .build()
            .unwrap_err();
        assert_eq!(err, SchemaError::UnboundedNotLast("data".to_string()));

        let err = Schema::builder("P")
            .field("data", TypeSpec::list(ScalarType::U8.into()))
            .field("n", TypeSpec::length_of(ScalarType::U8, "data"))
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            SchemaError::LengthAfterTarget {
                field: "n".to_string(),
                target: "data".to_string(),
            }
        );
    }

    #[test]
    fn length_after_fixed_target_is_accepted() {
        let s = Schema::builder("P")
            .field("data", TypeSpec::array(ScalarType::U8.into(), 2))
            .field("n", TypeSpec::length_of(ScalarType::U8, "data"))
            .field("tag", TypeSpec::bytes(Some(3)))
            .field("m", TypeSpec::length_of(ScalarType::U8, "tag"))
            .build()
            .unwrap();
        let n = s.field_id("n").unwrap();
        assert_eq!(s.length_target(n), s.field_id("data"));
        assert_eq!(s.fixed_size(), Some(7));
    }

    #[test]
    fn nested_packet_is_unbounded_only_when_open_ended() {
        let framed = Schema::builder("Framed")
            .field("n", TypeSpec::length_of(ScalarType::NX_U8, "data"))
            .field("data", TypeSpec::list(ScalarType::NX_U8.into()))
            .build()
            .unwrap();
        let open = Schema::builder("Open")
            .field("data", TypeSpec::bytes(None))
            .build()
            .unwrap();
        assert!(!framed.is_open_ended());
        assert!(open.is_open_ended());
        assert_eq!(framed.fixed_size(), None);

        let s = Schema::builder("Outer")
            .field("inner", TypeSpec::packet(&framed))
            .field("crc", ScalarType::NX_U16)
            .build()
            .unwrap();
        assert!(!s.is_open_ended());
        assert_eq!(s.minimal_size(), 3);

        let err = Schema::builder("Outer")
            .field("inner", TypeSpec::packet(&open))
            .field("crc", ScalarType::NX_U16)
            .build()
            .unwrap_err();
        assert_eq!(err, SchemaError::UnboundedNotLast("inner".to_string()));

        let tail = Schema::builder("Tail")
            .field("crc", ScalarType::NX_U16)
            .field("inner", TypeSpec::packet(&open))
            .build()
            .unwrap();
        assert!(tail.is_open_ended());
    }

    #[test]
    fn oversized_layouts_are_rejected() {
        let err = Schema::builder("P")
            .field("a", TypeSpec::array(ScalarType::NX_U64.into(), u64::MAX / 4))
            .build()
            .unwrap_err();
        assert_eq!(err, SchemaError::SizeOverflow("a".to_string()));

        let err = Schema::builder("P")
            .field("a", TypeSpec::bytes(Some(u64::MAX)))
            .field("b", ScalarType::U8)
            .build()
            .unwrap_err();
        assert_eq!(err, SchemaError::SizeOverflow("b".to_string()));
    }

    #[test]
    fn narrow_length_for_fixed_target_is_rejected() {
        let err = Schema::builder("P")
            .field("n", TypeSpec::length_of(ScalarType::U8, "data"))
            .field("data", TypeSpec::bytes(Some(300)))
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaError::LengthTooNarrow { length: 300, .. }));
    }

    #[test]
    fn unsized_elements_are_rejected() {
        let open = Schema::builder("Open")
            .field("data", TypeSpec::list(ScalarType::U8.into()))
            .build()
            .unwrap();
        let err = Schema::builder("P")
            .field("items", TypeSpec::list(TypeSpec::packet(&open)))
            .build()
            .unwrap_err();
        assert_eq!(err, SchemaError::UnsizedElement { field: "items".to_string() });
    }

    #[test]
    fn defaults_are_converted_to_the_field_type() {
        let s = Schema::builder("P")
            .field_with_default("h", ScalarType::NX_U8, 7)
            .field_with_default("tag", TypeSpec::bytes(Some(4)), 0x0102u64)
            .field_with_default("arr", TypeSpec::array(ScalarType::NX_U16.into(), 2), vec![1u8, 2])
            .build()
            .unwrap();
        assert_eq!(s.fields()[0].default, Some(Value::U8(7)));
        assert_eq!(s.fields()[1].default, Some(Value::Bytes(vec![0, 0, 1, 2])));
        assert_eq!(
            s.fields()[2].default,
            Some(Value::List(vec![Value::U16(1), Value::U16(2)]))
        );
    }

    #[test]
    fn out_of_range_default_is_rejected() {
        let err = Schema::builder("P")
            .field_with_default("h", ScalarType::NX_U8, 256)
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaError::InvalidDefault { .. }));
    }

    #[test]
    fn be_bytes_pads_and_rejects_overflow() {
        assert_eq!(be_bytes(0x0102, Some(4)), Some(vec![0, 0, 1, 2]));
        assert_eq!(be_bytes(0x0102, None), Some(vec![1, 2]));
        assert_eq!(be_bytes(0, None), Some(vec![0]));
        assert_eq!(be_bytes(0x010203, Some(2)), None);
        assert_eq!(be_bytes(1, Some(20)).map(|b| b.len()), Some(20));
    }
}
