//! DSL tests: syntax (parse success/failure) and schema validation (resolve, references, errors).

use packetdef::{parse, FieldType, Literal, SchemaError, SchemaSet, TypeSpec};

fn resolve(src: &str) -> Result<SchemaSet, SchemaError> {
    SchemaSet::from_source(src)
}

// ==================== Syntax ====================

#[test]
fn parse_empty_source() {
    let p = parse("").expect("empty source can parse");
    assert!(p.packets.is_empty());
    assert!(resolve("  // nothing here\n").expect("resolve").is_empty());
}

#[test]
fn parse_minimal_packet() {
    let p = parse("packet M { x: u8; }").expect("parse");
    assert_eq!(p.packets.len(), 1);
    assert_eq!(p.packets[0].name, "M");
    assert_eq!(p.packets[0].fields.len(), 1);
    assert_eq!(p.packets[0].fields[0].name.as_deref(), Some("x"));
}

#[test]
fn parse_all_scalar_names() {
    let names = [
        "nx_u8", "nx_i8", "nx_u16", "nx_i16", "nx_u32", "nx_i32", "nx_u64", "nx_i64", "u8", "i8", "u16",
        "i16", "u32", "i32", "u64", "i64",
    ];
    let body: String = names
        .iter()
        .enumerate()
        .map(|(i, n)| format!("f{}: {};\n", i, n))
        .collect();
    let set = resolve(&format!("packet All {{\n{}}}", body)).expect("resolve");
    let schema = set.get("All").expect("All");
    assert_eq!(schema.len(), 16);
    assert_eq!(schema.minimal_size(), 2 * (1 + 2 + 4 + 8));
    for (field, name) in schema.fields().iter().zip(names) {
        assert!(matches!(&field.ty, FieldType::Scalar(t) if t.name() == name));
    }
}

#[test]
fn parse_nested_type_specs() {
    let p = parse("packet P { n: length_of<u16>(xs); xs: list<array<u8, 2>>; }").expect("parse");
    match &p.packets[0].fields[1].type_spec {
        Some(TypeSpec::List(inner)) => assert!(matches!(**inner, TypeSpec::Array(_, 2))),
        other => panic!("unexpected type {:?}", other),
    }
}

#[test]
fn parse_literals() {
    let p = parse("packet P { a: i8 = -128; b: u64 = 0xFFFFFFFFFFFFFFFF; c: array<u8, 2> = []; }")
        .expect("parse");
    let f = &p.packets[0].fields;
    assert_eq!(f[0].default, Some(Literal::Int(-128)));
    assert_eq!(f[1].default, Some(Literal::Hex("FFFFFFFFFFFFFFFF".to_string())));
    assert_eq!(f[2].default, Some(Literal::List(vec![])));
}

#[test]
fn parse_failures() {
    for src in [
        "packet",
        "packet P",
        "packet P { x: u8 ",
        "packet P { x: list<u8; }",
        "packet P { x: array<u8>; }",
        "packet P { x: bytes(); }",
        "packet P { x: u8 = ; }",
        "message P { x: u8; }",
        "packet P { x: u8 = 0x; }",
    ] {
        assert!(
            matches!(parse(src), Err(SchemaError::Syntax(_))),
            "expected syntax error for {:?}",
            src
        );
    }
}

// ==================== Validation ====================

#[test]
fn duplicate_field_name() {
    assert_eq!(
        resolve("packet P { a: u8; b: u8; a: u16; }").unwrap_err(),
        SchemaError::DuplicateFieldName("a".to_string())
    );
    assert!(resolve("packet P { a: u8; b: u8; }").is_ok());
}

#[test]
fn length_default_value() {
    assert_eq!(
        resolve("packet P { n: length_of<u8>(d) = 3; d: list<u8>; }").unwrap_err(),
        SchemaError::LengthWithDefault("n".to_string())
    );
    assert!(resolve("packet P { n: length_of<u8>(d); d: list<u8>; }").is_ok());
}

#[test]
fn missing_field_name_or_type() {
    assert_eq!(
        resolve("packet P { a: u8; : u8; }").unwrap_err(),
        SchemaError::MissingNameOrType { index: 1 }
    );
    assert_eq!(
        resolve("packet P { a; }").unwrap_err(),
        SchemaError::MissingNameOrType { index: 0 }
    );
    assert_eq!(
        resolve("packet P { = 5; }").unwrap_err(),
        SchemaError::MissingNameOrType { index: 0 }
    );
}

#[test]
fn invalid_field_type() {
    assert_eq!(
        resolve("packet P { a: int; }").unwrap_err(),
        SchemaError::InvalidFieldType {
            field: "a".to_string(),
            ty: "int".to_string(),
        }
    );
    assert!(matches!(
        resolve("packet P { a: list<list<u8>>; }").unwrap_err(),
        SchemaError::InvalidFieldType { .. }
    ));
    assert!(matches!(
        resolve("packet Q { x: u8; } packet P { n: length_of<Q>(d); d: list<u8>; }").unwrap_err(),
        SchemaError::InvalidFieldType { .. }
    ));
}

#[test]
fn undefined_length_list() {
    assert_eq!(
        resolve("packet P { d: list<u8>; t: u8; }").unwrap_err(),
        SchemaError::UnboundedNotLast("d".to_string())
    );
    assert_eq!(
        resolve("packet P { d: bytes; t: u8; }").unwrap_err(),
        SchemaError::UnboundedNotLast("d".to_string())
    );
    assert!(resolve("packet P { t: u8; d: list<u8>; }").is_ok());
    assert!(resolve("packet P { n: length_of<u8>(d); d: bytes; t: u8; }").is_ok());
}

#[test]
fn unbounded_nested_packet_must_be_last() {
    let src = "packet Open { h: u8; rest: list<u8>; } packet P { o: Open; t: u8; }";
    assert_eq!(
        resolve(src).unwrap_err(),
        SchemaError::UnboundedNotLast("o".to_string())
    );
    assert!(resolve("packet Open { h: u8; rest: list<u8>; } packet P { t: u8; o: Open; }").is_ok());
}

#[test]
fn self_delimiting_nested_packet_may_sit_anywhere() {
    let set = resolve(
        "packet Inner { n: length_of<nx_u8>(data); data: list<nx_u8>; } packet Outer { inner: Inner; crc: nx_u16; }",
    )
    .expect("resolve");
    let outer = set.get("Outer").expect("Outer");
    assert!(!outer.is_open_ended());
    assert_eq!(outer.minimal_size(), 3);

    let set = resolve("packet Inner { h: u8; n: length_of<u8>(d); d: bytes; } packet Outer { a: Inner; b: Inner; }")
        .expect("resolve");
    assert!(!set.get("Outer").expect("Outer").is_open_ended());
}

#[test]
fn length_after_fixed_target() {
    let set = resolve("packet P { data: array<nx_u8, 2>; n: length_of<nx_u8>(data); }").expect("resolve");
    let p = set.get("P").expect("P");
    assert_eq!(p.fixed_size(), Some(3));
    assert!(resolve("packet P { tag: bytes(4); n: length_of<u16>(tag); }").is_ok());
}

#[test]
fn size_overflow() {
    assert_eq!(
        resolve("packet P { a: array<nx_u64, 4611686018427387904>; }").unwrap_err(),
        SchemaError::SizeOverflow("a".to_string())
    );
    assert_eq!(
        resolve("packet P { a: bytes(18446744073709551615); b: u8; }").unwrap_err(),
        SchemaError::SizeOverflow("b".to_string())
    );
    assert_eq!(
        resolve(
            "packet Big { a: array<u8, 9223372036854775807>; } packet P { x: Big; y: Big; z: Big; }"
        )
        .unwrap_err(),
        SchemaError::SizeOverflow("z".to_string())
    );
}

#[test]
fn length_link_errors() {
    assert_eq!(
        resolve("packet P { n: length_of<u8>(nope); d: list<u8>; }").unwrap_err(),
        SchemaError::UnknownLengthTarget {
            field: "n".to_string(),
            target: "nope".to_string(),
        }
    );
    assert_eq!(
        resolve("packet P { n: length_of<u8>(t); t: u8; }").unwrap_err(),
        SchemaError::InvalidLengthTarget {
            field: "n".to_string(),
            target: "t".to_string(),
        }
    );
    assert_eq!(
        resolve("packet P { n: length_of<u8>(d); m: length_of<u8>(d); d: list<u8>; }").unwrap_err(),
        SchemaError::DuplicateLengthTarget {
            target: "d".to_string()
        }
    );
    assert_eq!(
        resolve("packet P { d: list<u8>; n: length_of<u8>(d); }").unwrap_err(),
        SchemaError::LengthAfterTarget {
            field: "n".to_string(),
            target: "d".to_string(),
        }
    );
    assert!(matches!(
        resolve("packet P { d: bytes; n: length_of<u8>(d); t: u8; }").unwrap_err(),
        SchemaError::LengthAfterTarget { .. }
    ));
    assert!(matches!(
        resolve("packet P { n: length_of<nx_u8>(d); d: array<u8, 256>; }").unwrap_err(),
        SchemaError::LengthTooNarrow { length: 256, .. }
    ));
}

#[test]
fn invalid_defaults() {
    for src in [
        "packet P { a: u8 = 256; }",
        "packet P { a: i8 = -129; }",
        "packet P { a: u8 = [1]; }",
        "packet P { a: array<u8, 2> = [1, 300]; }",
        "packet P { a: bytes(2) = 0x010203; }",
        "packet Q { x: u8; } packet P { q: Q = 1; }",
        "packet Q { x: u8; } packet P { qs: list<Q> = [1]; }",
    ] {
        let err = resolve(src);
        assert!(
            matches!(err, Err(SchemaError::InvalidDefault { .. })),
            "expected invalid default for {:?}, got {:?}",
            src,
            err
        );
    }
}

#[test]
fn linked_default_must_fit_capacity() {
    let items = vec!["0"; 300].join(", ");
    let src = format!(
        "packet P {{ n: length_of<u8>(d); d: list<u8> = [{}]; }}",
        items
    );
    assert!(matches!(
        resolve(&src).unwrap_err(),
        SchemaError::InvalidDefault { .. }
    ));
}

#[test]
fn packet_references() {
    let set = resolve("packet A { x: u8; } packet B { a: A; list: list<A>; }").expect("resolve");
    let b = set.get("B").expect("B");
    let a = set.get("A").expect("A");
    match &b.fields()[0].ty {
        FieldType::Nested(s) => assert!(std::sync::Arc::ptr_eq(s, a)),
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(
        resolve("packet B { a: A; } packet A { x: u8; }").unwrap_err(),
        SchemaError::InvalidFieldType {
            field: "a".to_string(),
            ty: "A".to_string(),
        }
    );
    assert_eq!(
        resolve("packet A { x: u8; } packet A { y: u8; }").unwrap_err(),
        SchemaError::DuplicatePacket("A".to_string())
    );
}

#[test]
fn unsized_elements() {
    assert_eq!(
        resolve("packet Open { rest: list<u8>; } packet P { items: list<Open>; }").unwrap_err(),
        SchemaError::UnsizedElement {
            field: "items".to_string()
        }
    );
    assert_eq!(
        resolve("packet Empty { } packet P { items: array<Empty, 2>; }").unwrap_err(),
        SchemaError::UnsizedElement {
            field: "items".to_string()
        }
    );
}
