//! Deserialize fuzz target: parse arbitrary bytes with a schema covering every field kind.
//! Deserialization must not panic, and whatever it accepts must serialize back without panicking.
//! Build with: cargo fuzz run deserialize_fuzz (requires nightly and cargo fuzz).

#![cfg_attr(fuzzing, no_main)]

#[cfg(fuzzing)]
use libfuzzer_sys::fuzz_target;

#[cfg(fuzzing)]
const SCHEMA: &str = r#"
packet Point { x: nx_i32; y: i16; }
packet Fuzz {
    header: nx_u8;
    origin: Point;
    n: length_of<u16>(points);
    points: list<Point>;
    m: length_of<nx_u8>(key);
    key: bytes;
    samples: array<nx_i64, 3>;
    tail: list<u32>;
}
"#;

#[cfg(fuzzing)]
fuzz_target!(|data: &[u8]| {
    let set = packetdef::SchemaSet::from_source(SCHEMA).expect("schema");
    let schema = set.get("Fuzz").expect("Fuzz");
    let mut p = packetdef::Packet::new(schema);
    if p.deserialize(data, 0).is_ok() {
        let _ = p.serialize();
    }
});

#[cfg(not(fuzzing))]
fn main() {
    eprintln!("Build with: cargo fuzz run deserialize_fuzz");
}
