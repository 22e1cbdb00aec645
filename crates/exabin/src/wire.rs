//! Sentinel constants of the wire format.
//!
//! Collections are prefixed by a signed 32-bit little-endian count. Three
//! sentinels share that channel:
//!
//! - [`NULL_COUNT`] (`-1`): the collection itself is absent;
//! - `0`: present but empty;
//! - [`STREAMING_COUNT`] (`-2`): the count was unknown when encoding
//!   started; elements follow as `(0x01, element)*` terminated by `0x00`.
//!
//! Any count at or below `-3` is malformed. Strings use a separate unsigned
//! 16-bit length prefix where [`NULL_STRING`] marks absence and `0` marks
//! the empty string.

/// Count prefix marking an absent collection.
pub const NULL_COUNT: i32 = -1;

/// Count prefix marking a collection of unknown length, followed by
/// flag-prefixed elements.
pub const STREAMING_COUNT: i32 = -2;

/// Length prefix marking an absent string.
pub const NULL_STRING: u16 = 0xFFFF;
