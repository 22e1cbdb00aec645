//! Sequence semantics: streaming encode, eager nested decode, lazy
//! top-level decode.

use std::io::Cursor;

use exabin::{Codec, Decode, Encode, Error, Result, Sequence};

#[test]
fn top_level_counted_run_decodes_lazily() {
    let codec = Codec::new();
    let bytes = codec.to_vec(&vec![1u32, 2, 3]).unwrap();

    let mut iter = codec.read_values::<u32, _>(Cursor::new(bytes)).unwrap();
    assert_eq!(iter.size_hint(), (3, Some(3)));
    assert_eq!(iter.next().unwrap().unwrap(), 1);
    assert_eq!(iter.next().unwrap().unwrap(), 2);
    assert_eq!(iter.next().unwrap().unwrap(), 3);
    assert!(iter.next().is_none());
}

#[test]
fn top_level_streaming_run_decodes_lazily() {
    let codec = Codec::new();
    let seq = Sequence::streaming(10u8..13);
    let bytes = codec.to_vec(&seq).unwrap();
    assert_eq!(bytes[..4], [0xFE, 0xFF, 0xFF, 0xFF]);

    let items: Result<Vec<u8>> = codec
        .read_values::<u8, _>(Cursor::new(bytes))
        .unwrap()
        .collect();
    assert_eq!(items.unwrap(), vec![10, 11, 12]);
}

#[test]
fn errors_finish_the_iterator() {
    // Streaming run whose second element is cut off.
    let bytes = vec![0xFE, 0xFF, 0xFF, 0xFF, 0x01, 0x07, 0x01];
    let mut iter = exabin::read_values::<u32, _>(Cursor::new(bytes)).unwrap();
    assert!(matches!(iter.next(), Some(Err(Error::Truncated { .. }))));
    assert!(iter.next().is_none());
}

#[test]
fn into_source_returns_the_reader() {
    let codec = Codec::new();
    let bytes = codec.to_vec(&vec![5u8]).unwrap();
    let iter = codec
        .read_values::<u8, _>(Cursor::new(bytes))
        .unwrap();
    let _source: Cursor<Vec<u8>> = iter.into_source();
}

// ============================================================================
// Sequences inside composites
// ============================================================================

#[derive(Encode, Decode, Debug)]
struct Batch {
    pub label: String,
    pub items: Sequence<u32>,
}

#[test]
fn nested_sequences_materialize_eagerly() {
    let codec = Codec::new();
    let batch = Batch {
        label: "b1".to_string(),
        items: Sequence::streaming(vec![4u32, 5].into_iter()),
    };
    let bytes = codec.to_vec(&batch).unwrap();

    let decoded: Batch = codec.from_slice(&bytes).unwrap();
    assert_eq!(decoded.label, "b1");
    // Decoded nested sequences always carry a known count.
    assert_eq!(decoded.items.known_len(), Some(2));
    assert_eq!(decoded.items.into_vec().unwrap(), vec![4, 5]);
}

#[test]
fn nullable_sequences_use_the_count_channel() {
    let codec = Codec::new();
    let bytes = codec.to_vec(&None::<Sequence<u8>>).unwrap();
    assert_eq!(bytes, vec![0xFF, 0xFF, 0xFF, 0xFF]);

    let decoded: Option<Sequence<u8>> = codec.from_slice(&bytes).unwrap();
    assert!(decoded.is_none());

    let bytes = codec
        .to_vec(&Some(Sequence::from(vec![9u8])))
        .unwrap();
    assert_eq!(bytes, vec![0x01, 0x00, 0x00, 0x00, 9]);
}

#[test]
fn counted_sequences_prefer_the_counted_form() {
    let codec = Codec::new();
    // Built from a Vec, the count is known, so no streaming sentinel even
    // though the value is a Sequence.
    let bytes = codec.to_vec(&Sequence::from(vec![1u8, 2])).unwrap();
    assert_eq!(bytes, vec![0x02, 0x00, 0x00, 0x00, 1, 2]);
}
