//! Round trips over real byte backends and unusual buffer capacities.

use std::io::{Seek, SeekFrom, Write};

use exabin::{Codec, Decode, Encode};

#[derive(Encode, Decode, Debug, PartialEq)]
struct Record {
    pub id: u64,
    pub payload: Vec<u8>,
    pub note: Option<String>,
}

fn sample() -> Record {
    Record {
        id: 0xDEADBEEF,
        payload: (0..=255).collect(),
        note: Some("a record".to_string()),
    }
}

#[test]
fn file_backend_round_trip() {
    let codec = Codec::new();
    let file = tempfile::tempfile().unwrap();

    let mut file = codec.write_value(file, &sample()).unwrap();
    file.flush().unwrap();
    file.seek(SeekFrom::Start(0)).unwrap();

    let decoded: Record = codec.read_value(file).unwrap();
    assert_eq!(decoded, sample());
}

#[test]
fn tiny_buffer_capacity_round_trip() {
    // Capacity clamps to the minimum; every multi-byte value crosses a
    // buffer boundary somewhere.
    let codec = Codec::new().with_capacity(1);
    let bytes = codec.to_vec(&sample()).unwrap();
    assert_eq!(codec.from_slice::<Record>(&bytes).unwrap(), sample());
}

#[test]
fn buffer_capacity_does_not_change_the_bytes() {
    let big = Codec::new().with_capacity(1 << 20);
    let small = Codec::new().with_capacity(1);
    assert_eq!(
        big.to_vec(&sample()).unwrap(),
        small.to_vec(&sample()).unwrap()
    );
}

#[test]
fn string_payload_larger_than_the_buffer() {
    let codec = Codec::new().with_capacity(32);
    let value = "x".repeat(10_000);
    let bytes = codec.to_vec(&value).unwrap();
    assert_eq!(bytes.len(), 2 + 10_000);
    assert_eq!(codec.from_slice::<String>(&bytes).unwrap(), value);
}

#[test]
fn back_to_back_values_share_a_sink() {
    let codec = Codec::new();
    let sink = codec.write_value(Vec::new(), &1u16).unwrap();
    let sink = codec.write_value(sink, &2u16).unwrap();
    assert_eq!(sink, vec![1, 0, 2, 0]);
}
