//! Sequence fields and the length link.
//!
//! [`FixedArray`] and [`VarList`] hold homogeneous elements of an [`ElementType`]; a
//! [`ByteString`] is one of the two over `nx_u8`, read as a big-endian integer. How many
//! elements a [`VarList`] decodes is decided by the packet engine and passed in as a
//! [`Count`].

use crate::codec::ScalarType;
use crate::error::{DeserializeError, FieldError};
use crate::packet::Packet;
use crate::schema::{be_bytes, Schema};
use crate::value::Value;
use std::fmt;
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::warn;

/// Element of an array or list. Always of fixed serialized size.
#[derive(Debug, Clone)]
pub enum ElementType {
    Scalar(ScalarType),
    Packet(Arc<Schema>),
}

impl ElementType {
    pub fn size(&self) -> usize {
        match self {
            ElementType::Scalar(t) => t.size(),
            ElementType::Packet(s) => s.fixed_size().unwrap_or(0),
        }
    }

    /// Element used for padding and for growing storage before a read.
    pub fn default_value(&self) -> Value {
        match self {
            ElementType::Scalar(t) => t.zero(),
            ElementType::Packet(s) => Value::Packet(Packet::new(s)),
        }
    }

    pub fn coerce(&self, field: &str, v: &Value) -> Result<Value, FieldError> {
        match (self, v) {
            (ElementType::Scalar(t), _) => t.coerce(field, v),
            (ElementType::Packet(s), Value::Packet(p)) if Arc::ptr_eq(s, p.schema()) => Ok(v.clone()),
            (ElementType::Packet(s), _) => Err(FieldError::TypeMismatch {
                field: field.to_string(),
                expected: s.name().to_string(),
                found: v.kind(),
            }),
        }
    }

    pub fn write(&self, v: &Value, out: &mut Vec<u8>) {
        match (self, v) {
            (ElementType::Scalar(t), _) => t.write(v, out),
            (ElementType::Packet(_), Value::Packet(p)) => p.serialize_into(out),
            (ElementType::Packet(_), _) => {}
        }
    }

    pub fn read(&self, field: &str, buf: &[u8], pos: usize) -> Result<(Value, usize), DeserializeError> {
        match self {
            ElementType::Scalar(t) => t.read(field, buf, pos),
            ElementType::Packet(s) => {
                let mut p = Packet::new(s);
                let end = p.deserialize(buf, pos)?;
                Ok((Value::Packet(p), end))
            }
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementType::Scalar(t) => write!(f, "{}", t),
            ElementType::Packet(s) => f.write_str(s.name()),
        }
    }
}

/// How many elements a variable list should decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Count {
    /// No length is known; decoding fails.
    Unknown,
    /// Consume the rest of the buffer. Only the last field of a packet gets this.
    Remainder,
    /// Supplied by a length link.
    Exactly(usize),
}

/// A scalar field carrying the element count of a later sequence field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LengthLink {
    scalar: ScalarType,
    target: String,
}

impl LengthLink {
    pub fn new(scalar: ScalarType, target: impl Into<String>) -> Self {
        LengthLink {
            scalar,
            target: target.into(),
        }
    }

    pub fn scalar(&self) -> ScalarType {
        self.scalar
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Largest count the scalar can carry.
    pub fn capacity(&self) -> usize {
        usize::try_from(self.scalar.max()).unwrap_or(usize::MAX)
    }

    pub fn serialize(&self, count: usize, out: &mut Vec<u8>) {
        self.scalar.write(&Value::U64(count as u64), out);
    }

    pub fn serialized_size(&self) -> usize {
        self.scalar.size()
    }

    /// Read the count. Returns it with the position after the field.
    pub fn deserialize(&self, field: &str, buf: &[u8], pos: usize) -> Result<(usize, usize), DeserializeError> {
        let (v, pos) = self.scalar.read(field, buf, pos)?;
        let n = v.as_i128().unwrap_or(0);
        if n < 0 {
            return Err(DeserializeError::NegativeLength {
                field: field.to_string(),
                value: n as i64,
            });
        }
        Ok((usize::try_from(n).unwrap_or(usize::MAX), pos))
    }
}

fn coerce_items(field: &str, element: &ElementType, v: Value) -> Result<Vec<Value>, FieldError> {
    match v {
        Value::List(items) => items.iter().map(|x| element.coerce(field, x)).collect(),
        Value::Bytes(b) => b
            .into_iter()
            .map(|x| element.coerce(field, &Value::U8(x)))
            .collect(),
        other => Err(FieldError::TypeMismatch {
            field: field.to_string(),
            expected: format!("sequence of {}", element),
            found: other.kind(),
        }),
    }
}

fn read_items(
    field: &str,
    element: &ElementType,
    buf: &[u8],
    mut pos: usize,
    items: &mut [Value],
) -> Result<usize, DeserializeError> {
    for item in items.iter_mut() {
        let (v, next) = element.read(field, buf, pos)?;
        *item = v;
        pos = next;
    }
    Ok(pos)
}

/// Exactly `length` elements on the wire, whatever is stored.
#[derive(Debug, Clone)]
pub struct FixedArray {
    name: String,
    element: ElementType,
    length: usize,
    items: Vec<Value>,
}

impl FixedArray {
    pub fn new(name: impl Into<String>, element: ElementType, length: usize) -> Self {
        FixedArray {
            name: name.into(),
            element,
            length,
            items: Vec::new(),
        }
    }

    pub fn element(&self) -> &ElementType {
        &self.element
    }

    /// Configured length; this is what a length link reports.
    pub fn length(&self) -> usize {
        self.length
    }

    /// Stored element count, which may differ from [`length`](Self::length).
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[Value] {
        &self.items
    }

    pub fn get(&self, i: usize) -> Option<&Value> {
        self.items.get(i)
    }

    pub fn push(&mut self, v: impl Into<Value>) -> Result<(), FieldError> {
        let v = self.element.coerce(&self.name, &v.into())?;
        self.items.push(v);
        Ok(())
    }

    /// Replace element `i`; growing past the stored count pads with defaults.
    pub fn set(&mut self, i: usize, v: impl Into<Value>) -> Result<(), FieldError> {
        let v = self.element.coerce(&self.name, &v.into())?;
        if i >= self.items.len() {
            let pad = self.element.default_value();
            self.items.resize(i + 1, pad);
        }
        self.items[i] = v;
        Ok(())
    }

    /// Replace all elements with a list or byte value.
    pub fn assign(&mut self, v: Value) -> Result<(), FieldError> {
        self.items = coerce_items(&self.name, &self.element, v)?;
        Ok(())
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn serialized_size(&self) -> usize {
        self.element.size().saturating_mul(self.length)
    }

    /// Write `length` elements: short storage is padded with defaults for this call only,
    /// excess elements are dropped with a warning.
    pub fn serialize(&self, out: &mut Vec<u8>) {
        if self.items.len() > self.length {
            #[cfg(feature = "logging")]
            warn!(
                "array {} holds {} elements but has length {}; extra elements not serialized",
                self.name,
                self.items.len(),
                self.length
            );
        }
        for v in self.items.iter().take(self.length) {
            self.element.write(v, out);
        }
        if self.items.len() < self.length {
            let pad = self.element.default_value();
            for _ in self.items.len()..self.length {
                self.element.write(&pad, out);
            }
        }
    }

    /// Resize storage to exactly `length` and read every element.
    pub fn deserialize(&mut self, buf: &[u8], pos: usize) -> Result<usize, DeserializeError> {
        let needed = self.serialized_size();
        let available = buf.len().saturating_sub(pos);
        if available < needed {
            return Err(DeserializeError::InsufficientBytes {
                field: self.name.clone(),
                expected: needed,
                available,
            });
        }
        let pad = self.element.default_value();
        self.items.resize(self.length, pad);
        read_items(&self.name, &self.element, buf, pos, &mut self.items)
    }
}

/// Elements whose count is only known at runtime.
#[derive(Debug, Clone)]
pub struct VarList {
    name: String,
    element: ElementType,
    capacity: Option<usize>,
    items: Vec<Value>,
}

impl VarList {
    /// `capacity` bounds the element count when a length link describes this list.
    pub fn new(name: impl Into<String>, element: ElementType, capacity: Option<usize>) -> Self {
        VarList {
            name: name.into(),
            element,
            capacity,
            items: Vec::new(),
        }
    }

    pub fn element(&self) -> &ElementType {
        &self.element
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[Value] {
        &self.items
    }

    pub fn get(&self, i: usize) -> Option<&Value> {
        self.items.get(i)
    }

    fn check_capacity(&self, len: usize) -> Result<(), FieldError> {
        match self.capacity {
            Some(max) if len > max => Err(FieldError::CapacityExceeded {
                field: self.name.clone(),
                max,
            }),
            _ => Ok(()),
        }
    }

    /// Coerce `v` to the element type and add it at the end.
    pub fn append(&mut self, v: impl Into<Value>) -> Result<(), FieldError> {
        self.check_capacity(self.items.len() + 1)?;
        let v = self.element.coerce(&self.name, &v.into())?;
        self.items.push(v);
        Ok(())
    }

    pub fn extend<I, V>(&mut self, values: I) -> Result<(), FieldError>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        for v in values {
            self.append(v)?;
        }
        Ok(())
    }

    pub fn set(&mut self, i: usize, v: impl Into<Value>) -> Result<(), FieldError> {
        let v = self.element.coerce(&self.name, &v.into())?;
        match self.items.get_mut(i) {
            Some(slot) => {
                *slot = v;
                Ok(())
            }
            None => Err(FieldError::OutOfRange {
                field: self.name.clone(),
                value: i as i128,
                ty: format!("list of {} elements", self.items.len()),
            }),
        }
    }

    pub fn pop(&mut self) -> Option<Value> {
        self.items.pop()
    }

    pub fn truncate(&mut self, len: usize) {
        self.items.truncate(len);
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Replace all elements with a list or byte value.
    pub fn assign(&mut self, v: Value) -> Result<(), FieldError> {
        let items = coerce_items(&self.name, &self.element, v)?;
        self.check_capacity(items.len())?;
        self.items = items;
        Ok(())
    }

    pub fn serialized_size(&self) -> usize {
        self.element.size() * self.items.len()
    }

    pub fn serialize(&self, out: &mut Vec<u8>) {
        for v in &self.items {
            self.element.write(v, out);
        }
    }

    pub fn deserialize(&mut self, buf: &[u8], pos: usize, count: Count) -> Result<usize, DeserializeError> {
        let size = self.element.size();
        let available = buf.len().saturating_sub(pos);
        let n = match count {
            Count::Unknown => return Err(DeserializeError::UnknownLength(self.name.clone())),
            Count::Remainder => available.checked_div(size).unwrap_or(0),
            Count::Exactly(n) => {
                let expected = n.saturating_mul(size);
                if expected > available {
                    return Err(DeserializeError::InsufficientBytes {
                        field: self.name.clone(),
                        expected,
                        available,
                    });
                }
                n
            }
        };
        self.items.clear();
        self.items.resize(n, self.element.default_value());
        read_items(&self.name, &self.element, buf, pos, &mut self.items)
    }
}

#[derive(Debug, Clone)]
enum Storage {
    Fixed(FixedArray),
    Variable(VarList),
}

/// Bytes read as one big-endian unsigned integer, first byte most significant.
#[derive(Debug, Clone)]
pub struct ByteString {
    storage: Storage,
}

impl ByteString {
    /// Fixed when `length` is given, otherwise variable with the optional `capacity`.
    pub fn new(name: impl Into<String>, length: Option<usize>, capacity: Option<usize>) -> Self {
        let element = ElementType::Scalar(ScalarType::NX_U8);
        let storage = match length {
            Some(n) => Storage::Fixed(FixedArray::new(name, element, n)),
            None => Storage::Variable(VarList::new(name, element, capacity)),
        };
        ByteString { storage }
    }

    /// Fixed length, if any.
    pub fn fixed_length(&self) -> Option<usize> {
        match &self.storage {
            Storage::Fixed(a) => Some(a.length()),
            Storage::Variable(_) => None,
        }
    }

    fn items(&self) -> &[Value] {
        match &self.storage {
            Storage::Fixed(a) => a.items(),
            Storage::Variable(l) => l.items(),
        }
    }

    /// Stored byte count.
    pub fn len(&self) -> usize {
        self.items().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items().is_empty()
    }

    /// Count a length link reports: the fixed length, or the stored byte count.
    pub fn element_count(&self) -> usize {
        self.fixed_length().unwrap_or_else(|| self.len())
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.items()
            .iter()
            .map(|v| v.as_u64().unwrap_or(0) as u8)
            .collect()
    }

    /// Integer value of the stored bytes; `None` past 128 significant bits.
    pub fn value(&self) -> Option<u128> {
        self.to_vec().iter().try_fold(0u128, |acc, &b| {
            acc.checked_mul(256).map(|acc| acc | b as u128)
        })
    }

    pub fn append(&mut self, byte: u8) -> Result<(), FieldError> {
        match &mut self.storage {
            Storage::Fixed(a) => a.push(byte),
            Storage::Variable(l) => l.append(byte),
        }
    }

    /// Replace the contents. Integers are stored as their big-endian bytes: padded to the
    /// fixed length, or as few as hold the value.
    pub fn assign(&mut self, v: Value) -> Result<(), FieldError> {
        let v = match v.as_i128() {
            Some(n) => {
                let len = self.fixed_length();
                let bytes = u128::try_from(n).ok().and_then(|n| be_bytes(n, len));
                match bytes {
                    Some(b) => Value::Bytes(b),
                    None => {
                        return Err(FieldError::OutOfRange {
                            field: self.name().to_string(),
                            value: n,
                            ty: self.type_name(),
                        })
                    }
                }
            }
            None => v,
        };
        match &mut self.storage {
            Storage::Fixed(a) => a.assign(v),
            Storage::Variable(l) => l.assign(v),
        }
    }

    fn name(&self) -> &str {
        match &self.storage {
            Storage::Fixed(a) => &a.name,
            Storage::Variable(l) => &l.name,
        }
    }

    fn type_name(&self) -> String {
        match self.fixed_length() {
            Some(n) => format!("bytes({})", n),
            None => "bytes".to_string(),
        }
    }

    pub fn clear(&mut self) {
        match &mut self.storage {
            Storage::Fixed(a) => a.clear(),
            Storage::Variable(l) => l.clear(),
        }
    }

    pub fn serialized_size(&self) -> usize {
        match &self.storage {
            Storage::Fixed(a) => a.serialized_size(),
            Storage::Variable(l) => l.serialized_size(),
        }
    }

    pub fn serialize(&self, out: &mut Vec<u8>) {
        match &self.storage {
            Storage::Fixed(a) => a.serialize(out),
            Storage::Variable(l) => l.serialize(out),
        }
    }

    /// `count` only matters for variable sequences.
    pub fn deserialize(&mut self, buf: &[u8], pos: usize, count: Count) -> Result<usize, DeserializeError> {
        match &mut self.storage {
            Storage::Fixed(a) => a.deserialize(buf, pos),
            Storage::Variable(l) => l.deserialize(buf, pos, count),
        }
    }
}

impl fmt::Display for ByteString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = hex::encode_upper(self.to_vec());
        let width = self.serialized_size() * 2;
        write!(f, "{:0>width$}", digits, width = width)
    }
}

impl PartialEq<u128> for ByteString {
    fn eq(&self, other: &u128) -> bool {
        self.value() == Some(*other)
    }
}

impl PartialEq<u64> for ByteString {
    fn eq(&self, other: &u64) -> bool {
        self.value() == Some(*other as u128)
    }
}
