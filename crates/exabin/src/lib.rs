//! A compact, positional binary object codec.
//!
//! Values encode as a flat byte stream with no tags, no member names and
//! no padding: the byte stream is meaningful only to a reader that knows
//! the same type, and the order of members is the contract. In exchange
//! the format is small and fast to move.
//!
//! # Wire format
//!
//! - Fixed-width integers and floats: little-endian, floats as raw
//!   IEEE-754 bits. `bool` is one byte, nonzero meaning true.
//! - `char`: one raw byte under a single-byte encoding, otherwise a
//!   one-byte length plus the encoded bytes.
//! - Strings: u16 byte-length prefix (`0xFFFF` null, `0` empty) plus the
//!   encoded bytes.
//! - Composites: members in declaration order. The nullable form
//!   (`Option<T>`) prepends a one-byte presence flag; the value form does
//!   not.
//! - Arrays, collections and sequences: a signed 32-bit count (`-1` null,
//!   `0` empty, `-2` streaming) followed by the elements. Scalar elements
//!   travel as one flat run.
//!
//! # Plans
//!
//! Encoding and decoding run through compiled *plans*: closures built once
//! per `(value type, backend type)` pair and cached in a [`PlanRegistry`].
//! Member selection happens when the plan is built, never per value.
//!
//! # Example
//!
//! ```ignore
//! use exabin::{Codec, Decode, Encode};
//!
//! #[derive(Encode, Decode, PartialEq, Debug)]
//! struct Point {
//!     pub x: i32,
//!     pub y: i32,
//! }
//!
//! let codec = Codec::new();
//! let bytes = codec.to_vec(&Point { x: 1, y: 2 })?;
//! let point: Point = codec.from_slice(&bytes)?;
//! # exabin::Result::Ok(())
//! ```
//!
//! # Marker modes
//!
//! Which members of a composite participate is governed by the type's
//! marker mode; see the [`Encode`](macro@Encode) derive and the
//! [`exabin_layout`] policy crate. By default only `pub` fields
//! participate; `#[pack(serializable)]` takes every field, and
//! `#[pack(contract)]` takes exactly the fields tagged `#[pack(member)]`.

// Allow derive-generated code to reference `::exabin` from this crate's
// own tests.
extern crate self as exabin;

pub mod decode;
pub mod encode;
pub mod encoding;
pub mod entry;
pub mod error;
pub mod plan;
pub mod reader;
pub mod scalar;
pub mod sequence;
pub mod wire;
pub mod writer;

pub use decode::{Decode, DecodeNullable};
pub use encode::{Encode, EncodeNullable};
pub use encoding::TextEncoding;
pub use entry::{from_slice, read_value, read_values, to_vec, write_value, Codec};
pub use error::{Error, FormatError, Result};
// Layout model, shared with the derive macros.
pub use exabin_layout::{
    Described, LevelInfo, Member, MemberAttrs, MemberKind, MarkerMode,
};
pub use plan::{DecodePlan, EncodePlan, PlanRegistry};
pub use reader::ReadBuffer;
pub use scalar::Scalar;
pub use sequence::{Sequence, SequenceIter};
pub use writer::WriteBuffer;
// Derive macros.
pub use exabin_derive::{Decode, Described, Encode};
