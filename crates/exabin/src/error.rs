//! Error types for encoding and decoding.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Anything that can go wrong while encoding or decoding a value.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The byte stream violates the wire format.
    #[error(transparent)]
    Format(#[from] FormatError),

    /// The source ended before a complete value was read.
    #[error("source ended early: needed {needed} bytes, only {got} available")]
    Truncated { needed: usize, got: usize },

    /// The type has no representation in the wire format.
    #[error("`{type_name}` has no wire representation: {reason}")]
    UnsupportedShape {
        type_name: &'static str,
        reason: &'static str,
    },

    /// An API contract was violated by the caller.
    #[error("contract violation: {0}")]
    Contract(&'static str),

    /// The underlying source or sink failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A well-formed read of a malformed stream.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FormatError {
    /// A collection count below the streaming sentinel.
    #[error("invalid collection count {0}")]
    InvalidCount(i32),

    /// A char length prefix of zero; every encoded char occupies at least
    /// one byte.
    #[error("char length prefix is zero")]
    ZeroCharLength,

    /// Bytes that do not decode under the configured text encoding.
    #[error("text payload is not valid in the configured encoding")]
    InvalidText,

    /// An enum discriminant with no matching variant.
    #[error("unknown discriminant {value} for enum `{type_name}`")]
    UnknownDiscriminant {
        type_name: &'static str,
        value: i64,
    },

    /// A null sentinel in a position where the decoded type is not
    /// nullable.
    #[error("null value where a non-nullable value was expected")]
    UnexpectedNull,

    /// A string whose encoded form does not fit the u16 length prefix.
    #[error("encoded string length {0} exceeds the u16 length prefix")]
    StringTooLong(usize),

    /// A char outside the configured encoding's repertoire.
    #[error("char U+{0:04X} is not representable in the configured encoding")]
    Unencodable(u32),
}
