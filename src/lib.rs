//! # packetdef: Declarative Binary Packet Codec
//!
//! Describe a message layout as an ordered list of typed fields and get byte-exact
//! serialization and parsing for it. Formats are positional: no tags, no framing, no
//! padding between fields. Each field picks its own byte order.
//!
//! ## Field types
//!
//! - Scalars: `nx_u8` .. `nx_i64` (network order, big-endian), `u8` .. `i64` (little-endian)
//! - `length_of<T>(field)`: scalar carrying the element count of a later sequence field
//! - `array<T, n>`: exactly `n` elements, padded with zeros when fewer are stored
//! - `list<T>`: variable element count, from a length field or the rest of the buffer
//! - `bytes(n)` / `bytes`: byte sequence read as one big-endian unsigned integer
//! - Any earlier packet, nested inline
//!
//! Only the last field may be unbounded, unless a length field describes it.
//!
//! ## Example DSL
//!
//! ```text
//! packet Point {
//!     x: nx_i32;
//!     y: nx_i32;
//! }
//!
//! packet Track {
//!     header: nx_u8 = 0x7E;
//!     count: length_of<nx_u8>(points);
//!     points: list<Point>;
//!     key: bytes(6);
//!     tail: bytes;
//! }
//! ```
//!
//! ## Usage
//!
//! ```
//! use packetdef::{Packet, SchemaSet};
//!
//! let set = SchemaSet::from_source(
//!     "packet Msg { header: nx_u8; n: length_of<nx_u8>(data); data: list<nx_u8>; }",
//! )
//! .unwrap();
//! let schema = set.get("Msg").unwrap();
//! let mut msg = Packet::with_values(schema, [("header", 1u8)]).unwrap();
//! msg.list_mut("data").unwrap().extend([1u8, 2, 3]).unwrap();
//! assert_eq!(msg.to_string(), "0103010203");
//!
//! let parsed = Packet::from_bytes(schema, &msg.serialize()).unwrap();
//! assert_eq!(parsed, msg);
//! ```

pub mod ast;
pub mod codec;
pub mod error;
pub mod field;
pub mod packet;
pub mod parser;
pub mod schema;
pub mod value;

pub use ast::{FieldDecl, Literal, PacketSection, Protocol, TypeSpec};
pub use codec::{Endianness, ScalarType};
pub use error::{DeserializeError, FieldError, SchemaError};
pub use field::{ByteString, Count, ElementType, FixedArray, LengthLink, VarList};
pub use packet::Packet;
pub use parser::parse;
pub use schema::{FieldDescriptor, FieldId, FieldType, Schema, SchemaBuilder, SchemaSet};
pub use value::Value;
