//! Packet instances: one slot per schema field, serialized and parsed in declaration order.

use crate::codec::ScalarType;
use crate::error::{DeserializeError, FieldError};
use crate::field::{ByteString, Count, FixedArray, LengthLink, VarList};
use crate::schema::{FieldId, FieldType, Schema};
use crate::value::Value;
use std::fmt;
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::debug;

/// Storage for one field of a packet instance.
#[derive(Debug, Clone)]
pub(crate) enum Slot {
    Scalar { ty: ScalarType, value: Value },
    /// Holds nothing; the value is the target's element count.
    Length(LengthLink),
    Array(FixedArray),
    List(VarList),
    Bytes(ByteString),
    Nested(Packet),
}

impl Slot {
    /// Zero-valued slot for a field of type `ty`.
    pub(crate) fn empty(name: &str, ty: &FieldType, capacity: Option<usize>) -> Slot {
        match ty {
            FieldType::Scalar(t) => Slot::Scalar {
                ty: *t,
                value: t.zero(),
            },
            FieldType::Length(link) => Slot::Length(link.clone()),
            FieldType::Array { element, length } => {
                Slot::Array(FixedArray::new(name, element.clone(), *length))
            }
            FieldType::List(element) => Slot::List(VarList::new(name, element.clone(), capacity)),
            FieldType::Bytes(length) => Slot::Bytes(ByteString::new(name, *length, capacity)),
            FieldType::Nested(schema) => Slot::Nested(Packet::new(schema)),
        }
    }

    pub(crate) fn assign(&mut self, field: &str, v: Value) -> Result<(), FieldError> {
        match self {
            Slot::Scalar { ty, value } => {
                *value = ty.coerce(field, &v)?;
                Ok(())
            }
            Slot::Length(_) => Err(FieldError::DerivedField(field.to_string())),
            Slot::Array(a) => a.assign(v),
            Slot::List(l) => l.assign(v),
            Slot::Bytes(b) => b.assign(v),
            Slot::Nested(p) => match v {
                Value::Packet(q) if Arc::ptr_eq(p.schema(), q.schema()) => {
                    *p = q;
                    Ok(())
                }
                other => Err(FieldError::TypeMismatch {
                    field: field.to_string(),
                    expected: p.schema().name().to_string(),
                    found: other.kind(),
                }),
            },
        }
    }

    /// Stored value. Length slots store nothing and read as zero here.
    pub(crate) fn value(&self) -> Value {
        match self {
            Slot::Scalar { value, .. } => value.clone(),
            Slot::Length(link) => link.scalar().zero(),
            Slot::Array(a) => Value::List(a.items().to_vec()),
            Slot::List(l) => Value::List(l.items().to_vec()),
            Slot::Bytes(b) => Value::Bytes(b.to_vec()),
            Slot::Nested(p) => Value::Packet(p.clone()),
        }
    }

    /// Count a length link writes for this slot.
    fn element_count(&self) -> Option<usize> {
        match self {
            Slot::Array(a) => Some(a.length()),
            Slot::List(l) => Some(l.len()),
            Slot::Bytes(b) => Some(b.element_count()),
            _ => None,
        }
    }

    fn serialized_size(&self) -> usize {
        match self {
            Slot::Scalar { ty, .. } => ty.size(),
            Slot::Length(link) => link.serialized_size(),
            Slot::Array(a) => a.serialized_size(),
            Slot::List(l) => l.serialized_size(),
            Slot::Bytes(b) => b.serialized_size(),
            Slot::Nested(p) => p.serialized_size(),
        }
    }

    /// Bytes a read of this slot consumes at least, given the resolved count.
    fn required_size(&self, count: Count) -> usize {
        let counted = |element_size: usize| match count {
            Count::Exactly(n) => n.saturating_mul(element_size),
            Count::Unknown | Count::Remainder => 0,
        };
        match self {
            Slot::List(l) => counted(l.element().size()),
            Slot::Bytes(b) if b.fixed_length().is_none() => counted(1),
            Slot::Nested(p) => p.schema().minimal_size(),
            _ => self.serialized_size(),
        }
    }
}

/// A mutable instance of a [`Schema`].
///
/// Two packets are equal when they serialize to the same bytes. `Display` renders those
/// bytes as uppercase hex.
#[derive(Clone)]
pub struct Packet {
    schema: Arc<Schema>,
    slots: Vec<Slot>,
}

impl Packet {
    /// Instance holding every field's default, or zero/empty where there is none.
    pub fn new(schema: &Arc<Schema>) -> Self {
        let slots = schema
            .fields()
            .iter()
            .enumerate()
            .map(|(i, desc)| {
                let mut slot = Slot::empty(&desc.name, &desc.ty, schema.capacity(i));
                if let Some(default) = &desc.default {
                    // defaults were checked against this same slot type by the validator
                    let assigned = slot.assign(&desc.name, default.clone());
                    debug_assert!(assigned.is_ok(), "default of {}: {:?}", desc.name, assigned);
                }
                slot
            })
            .collect();
        Packet {
            schema: Arc::clone(schema),
            slots,
        }
    }

    /// Instance with defaults, then the given values assigned in order.
    pub fn with_values<I, K, V>(schema: &Arc<Schema>, values: I) -> Result<Self, FieldError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        let mut p = Packet::new(schema);
        for (name, v) in values {
            p.set(name.as_ref(), v)?;
        }
        Ok(p)
    }

    /// Parse `data` from its start into a new instance.
    pub fn from_bytes(schema: &Arc<Schema>, data: &[u8]) -> Result<Self, DeserializeError> {
        let mut p = Packet::new(schema);
        p.deserialize(data, 0)?;
        Ok(p)
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn field_id(&self, name: &str) -> Result<FieldId, FieldError> {
        self.schema
            .field_id(name)
            .ok_or_else(|| FieldError::UnknownField(name.to_string()))
    }

    fn name_of(&self, id: FieldId) -> &str {
        &self.schema.fields()[id.0].name
    }

    /// Current value of a field. A length field reads as its target's live element count.
    pub fn get(&self, name: &str) -> Result<Value, FieldError> {
        Ok(self.get_by_id(self.field_id(name)?))
    }

    pub fn get_by_id(&self, id: FieldId) -> Value {
        match &self.slots[id.0] {
            Slot::Length(link) => {
                let count = self.target_count(id.0);
                link.scalar()
                    .from_i128(count as i128)
                    .unwrap_or_else(|| link.scalar().zero())
            }
            slot => slot.value(),
        }
    }

    /// Assign a field. Integers are range-checked, sequences coerced element by element,
    /// nested packets must be of the very same schema. Length fields cannot be assigned.
    pub fn set(&mut self, name: &str, v: impl Into<Value>) -> Result<(), FieldError> {
        let id = self.field_id(name)?;
        self.set_by_id(id, v)
    }

    pub fn set_by_id(&mut self, id: FieldId, v: impl Into<Value>) -> Result<(), FieldError> {
        let name = self.schema.fields()[id.0].name.clone();
        self.slots[id.0].assign(&name, v.into())
    }

    /// Iterate `(name, value)` in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, Value)> + '_ {
        self.schema
            .fields()
            .iter()
            .enumerate()
            .map(move |(i, desc)| (desc.name.as_str(), self.get_by_id(FieldId(i))))
    }

    pub fn array(&self, name: &str) -> Result<&FixedArray, FieldError> {
        match &self.slots[self.field_id(name)?.0] {
            Slot::Array(a) => Ok(a),
            _ => Err(FieldError::NotASequence(name.to_string())),
        }
    }

    pub fn array_mut(&mut self, name: &str) -> Result<&mut FixedArray, FieldError> {
        let id = self.field_id(name)?;
        match &mut self.slots[id.0] {
            Slot::Array(a) => Ok(a),
            _ => Err(FieldError::NotASequence(name.to_string())),
        }
    }

    pub fn list(&self, name: &str) -> Result<&VarList, FieldError> {
        match &self.slots[self.field_id(name)?.0] {
            Slot::List(l) => Ok(l),
            _ => Err(FieldError::NotASequence(name.to_string())),
        }
    }

    pub fn list_mut(&mut self, name: &str) -> Result<&mut VarList, FieldError> {
        let id = self.field_id(name)?;
        match &mut self.slots[id.0] {
            Slot::List(l) => Ok(l),
            _ => Err(FieldError::NotASequence(name.to_string())),
        }
    }

    pub fn bytes(&self, name: &str) -> Result<&ByteString, FieldError> {
        match &self.slots[self.field_id(name)?.0] {
            Slot::Bytes(b) => Ok(b),
            _ => Err(FieldError::NotASequence(name.to_string())),
        }
    }

    pub fn bytes_mut(&mut self, name: &str) -> Result<&mut ByteString, FieldError> {
        let id = self.field_id(name)?;
        match &mut self.slots[id.0] {
            Slot::Bytes(b) => Ok(b),
            _ => Err(FieldError::NotASequence(name.to_string())),
        }
    }

    pub fn nested(&self, name: &str) -> Result<&Packet, FieldError> {
        let id = self.field_id(name)?;
        match &self.slots[id.0] {
            Slot::Nested(p) => Ok(p),
            _ => Err(self.not_nested(id)),
        }
    }

    pub fn nested_mut(&mut self, name: &str) -> Result<&mut Packet, FieldError> {
        let id = self.field_id(name)?;
        let err = self.not_nested(id);
        match &mut self.slots[id.0] {
            Slot::Nested(p) => Ok(p),
            _ => Err(err),
        }
    }

    fn not_nested(&self, id: FieldId) -> FieldError {
        FieldError::TypeMismatch {
            field: self.name_of(id).to_string(),
            expected: "packet".to_string(),
            found: self.schema.field(id).ty.to_string(),
        }
    }

    /// Element count of an array, list or byte field, as a length link would write it.
    pub fn element_count(&self, name: &str) -> Result<usize, FieldError> {
        self.slots[self.field_id(name)?.0]
            .element_count()
            .ok_or_else(|| FieldError::NotASequence(name.to_string()))
    }

    fn target_count(&self, length_index: usize) -> usize {
        self.schema
            .length_target(FieldId(length_index))
            .and_then(|t| self.slots[t.0].element_count())
            .unwrap_or(0)
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.serialized_size());
        self.serialize_into(&mut out);
        out
    }

    /// Append the encoding to `out`. Length fields write their target's live count.
    pub fn serialize_into(&self, out: &mut Vec<u8>) {
        for (i, slot) in self.slots.iter().enumerate() {
            match slot {
                Slot::Scalar { ty, value } => ty.write(value, out),
                Slot::Length(link) => link.serialize(self.target_count(i), out),
                Slot::Array(a) => a.serialize(out),
                Slot::List(l) => l.serialize(out),
                Slot::Bytes(b) => b.serialize(out),
                Slot::Nested(p) => p.serialize_into(out),
            }
        }
    }

    /// Current size in bytes, reflecting live element counts.
    pub fn serialized_size(&self) -> usize {
        self.slots.iter().map(Slot::serialized_size).sum()
    }

    /// Parse fields in order from `data[start..]`, overwriting this instance. Returns the
    /// position after the last byte consumed.
    ///
    /// Running out of data is fine only at the last field when it is a list or byte field:
    /// it is left empty. Fields that need zero bytes (empty linked sequences and the like)
    /// may also sit at the very end. On error the fields parsed so far keep their new values.
    pub fn deserialize(&mut self, data: &[u8], start: usize) -> Result<usize, DeserializeError> {
        let schema = Arc::clone(&self.schema);
        let last = self.slots.len().saturating_sub(1);
        let mut counts: Vec<Option<usize>> = vec![None; self.slots.len()];
        let mut pos = start;

        for (i, slot) in self.slots.iter_mut().enumerate() {
            let name = schema.fields()[i].name.as_str();
            let count = match schema.length_source(FieldId(i)) {
                Some(src) => counts[src.0].map_or(Count::Unknown, Count::Exactly),
                None if i == last => Count::Remainder,
                None => Count::Unknown,
            };

            if pos >= data.len() {
                if i == last && matches!(slot, Slot::List(_) | Slot::Bytes(_)) {
                    match slot {
                        Slot::List(l) => l.clear(),
                        Slot::Bytes(b) => b.clear(),
                        _ => {}
                    }
                    #[cfg(feature = "logging")]
                    debug!(
                        "{}: data ends before trailing field {}, left empty",
                        schema.name(),
                        name
                    );
                    return Ok(pos);
                }
                if slot.required_size(count) > 0 {
                    return Err(DeserializeError::InvalidLength {
                        field: name.to_string(),
                        pos,
                        len: data.len(),
                    });
                }
            }

            pos = match slot {
                Slot::Scalar { ty, value } => {
                    let (v, next) = ty.read(name, data, pos)?;
                    *value = v;
                    next
                }
                Slot::Length(link) => {
                    let (n, next) = link.deserialize(name, data, pos)?;
                    counts[i] = Some(n);
                    next
                }
                Slot::Array(a) => a.deserialize(data, pos)?,
                Slot::List(l) => l.deserialize(data, pos, count)?,
                Slot::Bytes(b) => b.deserialize(data, pos, count)?,
                Slot::Nested(p) => p.deserialize(data, pos)?,
            };

            if pos > data.len() {
                return Err(DeserializeError::InvalidLength {
                    field: name.to_string(),
                    pos,
                    len: data.len(),
                });
            }
        }
        Ok(pos)
    }
}

impl PartialEq for Packet {
    fn eq(&self, other: &Self) -> bool {
        self.serialize() == other.serialize()
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode_upper(self.serialize()))
    }
}

impl fmt::Debug for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct(self.schema.name());
        for (name, v) in self.fields() {
            d.field(name, &v);
        }
        d.finish()
    }
}
