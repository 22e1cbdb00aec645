//! The [`Decode`] trait and its implementations for wire-format types.
//!
//! Mirrors [`encode`](crate::encode): implementations build a
//! [`DecodePlan`] once and the plan decodes every subsequent value. The
//! count-prefix sentinels are interpreted here: `-1` is null (an error for
//! non-nullable target types), `0` is empty, a positive count is a counted
//! run, `-2` is a flag-terminated streaming run, and anything at or below
//! `-3` is malformed. Nested streaming runs always materialize eagerly;
//! only the top-level entry point ([`Codec::read_values`]) decodes lazily.
//!
//! [`Codec::read_values`]: crate::entry::Codec::read_values

use std::io::Read;

use crate::{
    error::{FormatError, Result},
    plan::{DecodePlan, PlanRegistry},
    reader::ReadBuffer,
    sequence::Sequence,
    wire,
};

/// A type that can be decoded from the wire format.
///
/// `build_decoder` is called at most once per `(Self, R)` pair per
/// registry; the returned plan is cached and reused. See
/// [`PlanRegistry::decoder`].
pub trait Decode: Sized + 'static {
    /// Compiles the decode plan for this type over source type `R`.
    fn build_decoder<R: Read + 'static>(registry: &PlanRegistry) -> Result<DecodePlan<R, Self>>;
}

/// The decode half of [`EncodeNullable`](crate::encode::EncodeNullable):
/// each nullable type supplies its own `Option` plan, and the blanket impl
/// below turns it into `Decode for Option<T>`.
pub trait DecodeNullable: Decode {
    /// Compiles the decode plan for `Option<Self>` over source type `R`.
    fn build_option_decoder<R: Read + 'static>(
        registry: &PlanRegistry,
    ) -> Result<DecodePlan<R, Option<Self>>>;
}

impl<T: DecodeNullable> Decode for Option<T> {
    fn build_decoder<R: Read + 'static>(registry: &PlanRegistry) -> Result<DecodePlan<R, Self>> {
        T::build_option_decoder(registry)
    }
}

/// Reads a count prefix and the elements it announces. `None` is the null
/// sentinel; a streaming run is materialized in full.
pub(crate) fn read_elements<R: Read + 'static, T: 'static>(
    elem: &DecodePlan<R, T>,
    src: &mut ReadBuffer<R>,
) -> Result<Option<Vec<T>>> {
    match src.read_count()? {
        wire::NULL_COUNT => Ok(None),
        0 => Ok(Some(Vec::new())),
        wire::STREAMING_COUNT => {
            let mut items = Vec::new();
            while src.read_bool()? {
                items.push(elem.run(src)?);
            }
            Ok(Some(items))
        }
        count if count > 0 => Ok(Some(elem.run_vec(src, count as usize)?)),
        bad => Err(FormatError::InvalidCount(bad).into()),
    }
}

fn null_not_allowed<T>() -> Result<T> {
    Err(FormatError::UnexpectedNull.into())
}

// ============================================================================
// Scalars
// ============================================================================

macro_rules! impl_decode_scalar {
    ($($ty:ty),* $(,)?) => {$(
        impl Decode for $ty {
            fn build_decoder<R: Read + 'static>(
                _registry: &PlanRegistry,
            ) -> Result<DecodePlan<R, Self>> {
                Ok(DecodePlan::with_bulk(
                    |src: &mut ReadBuffer<R>| src.read_scalar::<$ty>(),
                    |src: &mut ReadBuffer<R>, count| src.read_scalar_vec::<$ty>(count),
                ))
            }
        }
    )*};
}

impl_decode_scalar!(bool, u8, i8, u16, i16, u32, i32, u64, i64, f32, f64);

impl Decode for char {
    fn build_decoder<R: Read + 'static>(_registry: &PlanRegistry) -> Result<DecodePlan<R, Self>> {
        Ok(DecodePlan::new(|src: &mut ReadBuffer<R>| src.read_char()))
    }
}

// ============================================================================
// Strings
// ============================================================================

impl Decode for String {
    fn build_decoder<R: Read + 'static>(_registry: &PlanRegistry) -> Result<DecodePlan<R, Self>> {
        Ok(DecodePlan::new(|src: &mut ReadBuffer<R>| {
            match src.read_string()? {
                Some(text) => Ok(text),
                None => null_not_allowed(),
            }
        }))
    }
}

impl DecodeNullable for String {
    fn build_option_decoder<R: Read + 'static>(
        _registry: &PlanRegistry,
    ) -> Result<DecodePlan<R, Option<String>>> {
        Ok(DecodePlan::new(|src: &mut ReadBuffer<R>| src.read_string()))
    }
}

// ============================================================================
// Collections
// ============================================================================

impl<T: Decode> Decode for Vec<T> {
    fn build_decoder<R: Read + 'static>(registry: &PlanRegistry) -> Result<DecodePlan<R, Self>> {
        let elem = registry.decoder::<T, R>()?;
        Ok(DecodePlan::new(move |src: &mut ReadBuffer<R>| {
            match read_elements(&elem, src)? {
                Some(items) => Ok(items),
                None => null_not_allowed(),
            }
        }))
    }
}

impl<T: Decode> DecodeNullable for Vec<T> {
    fn build_option_decoder<R: Read + 'static>(
        registry: &PlanRegistry,
    ) -> Result<DecodePlan<R, Option<Vec<T>>>> {
        let elem = registry.decoder::<T, R>()?;
        Ok(DecodePlan::new(move |src: &mut ReadBuffer<R>| {
            read_elements(&elem, src)
        }))
    }
}

impl<T: Decode> Decode for Box<[T]> {
    /// Unlike the encode side, arrays of composite elements decode fine;
    /// the counted loop needs no flat run.
    fn build_decoder<R: Read + 'static>(registry: &PlanRegistry) -> Result<DecodePlan<R, Self>> {
        let elem = registry.decoder::<T, R>()?;
        Ok(DecodePlan::new(move |src: &mut ReadBuffer<R>| {
            match read_elements(&elem, src)? {
                Some(items) => Ok(items.into_boxed_slice()),
                None => null_not_allowed(),
            }
        }))
    }
}

impl<T: Decode> DecodeNullable for Box<[T]> {
    fn build_option_decoder<R: Read + 'static>(
        registry: &PlanRegistry,
    ) -> Result<DecodePlan<R, Option<Box<[T]>>>> {
        let elem = registry.decoder::<T, R>()?;
        Ok(DecodePlan::new(move |src: &mut ReadBuffer<R>| {
            Ok(read_elements(&elem, src)?.map(Vec::into_boxed_slice))
        }))
    }
}

// ============================================================================
// Sequences
// ============================================================================

impl<T: Decode> Decode for Sequence<T> {
    /// Nested sequences materialize eagerly, whichever wire form they
    /// arrived in.
    fn build_decoder<R: Read + 'static>(registry: &PlanRegistry) -> Result<DecodePlan<R, Self>> {
        let elem = registry.decoder::<T, R>()?;
        Ok(DecodePlan::new(move |src: &mut ReadBuffer<R>| {
            match read_elements(&elem, src)? {
                Some(items) => Ok(Sequence::from(items)),
                None => null_not_allowed(),
            }
        }))
    }
}

impl<T: Decode> DecodeNullable for Sequence<T> {
    fn build_option_decoder<R: Read + 'static>(
        registry: &PlanRegistry,
    ) -> Result<DecodePlan<R, Option<Sequence<T>>>> {
        let elem = registry.decoder::<T, R>()?;
        Ok(DecodePlan::new(move |src: &mut ReadBuffer<R>| {
            Ok(read_elements(&elem, src)?.map(Sequence::from))
        }))
    }
}

// ============================================================================
// Pointers
// ============================================================================

impl<T: Decode> Decode for Box<T> {
    fn build_decoder<R: Read + 'static>(registry: &PlanRegistry) -> Result<DecodePlan<R, Self>> {
        let inner = registry.decoder::<T, R>()?;
        Ok(DecodePlan::new(move |src: &mut ReadBuffer<R>| {
            Ok(Box::new(inner.run(src)?))
        }))
    }
}

impl<T: Decode> DecodeNullable for Box<T> {
    fn build_option_decoder<R: Read + 'static>(
        registry: &PlanRegistry,
    ) -> Result<DecodePlan<R, Option<Box<T>>>> {
        let inner = registry.lazy_decoder::<T, R>();
        Ok(DecodePlan::new(move |src: &mut ReadBuffer<R>| {
            if src.read_bool()? {
                Ok(Some(Box::new(inner.run(src)?)))
            } else {
                Ok(None)
            }
        }))
    }
}

impl<T: Decode> Decode for std::sync::Arc<T> {
    fn build_decoder<R: Read + 'static>(registry: &PlanRegistry) -> Result<DecodePlan<R, Self>> {
        let inner = registry.decoder::<T, R>()?;
        Ok(DecodePlan::new(move |src: &mut ReadBuffer<R>| {
            Ok(std::sync::Arc::new(inner.run(src)?))
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{encoding::TextEncoding, error::Error};

    fn decode<T: Decode>(bytes: &[u8]) -> Result<T> {
        let registry = PlanRegistry::new();
        let plan = registry.decoder::<T, std::io::Cursor<Vec<u8>>>().unwrap();
        let mut src = ReadBuffer::new(
            std::io::Cursor::new(bytes.to_vec()),
            TextEncoding::Utf8,
            64,
        );
        plan.run(&mut src)
    }

    #[test]
    fn counted_vec() {
        let decoded: Vec<u16> = decode(&[0x03, 0x00, 0x00, 0x00, 1, 0, 2, 0, 3, 0]).unwrap();
        assert_eq!(decoded, vec![1, 2, 3]);
    }

    #[test]
    fn empty_and_null_collections() {
        let empty: Vec<u8> = decode(&[0x00, 0x00, 0x00, 0x00]).unwrap();
        assert!(empty.is_empty());

        let null: Option<Vec<u8>> = decode(&[0xFF, 0xFF, 0xFF, 0xFF]).unwrap();
        assert_eq!(null, None);

        let rejected: Result<Vec<u8>> = decode(&[0xFF, 0xFF, 0xFF, 0xFF]);
        assert!(matches!(
            rejected,
            Err(Error::Format(FormatError::UnexpectedNull))
        ));
    }

    #[test]
    fn nested_streaming_run_materializes() {
        // -2 sentinel, then flagged elements 5 and 6, then the stop flag.
        let decoded: Vec<u8> =
            decode(&[0xFE, 0xFF, 0xFF, 0xFF, 0x01, 5, 0x01, 6, 0x00]).unwrap();
        assert_eq!(decoded, vec![5, 6]);
    }

    #[test]
    fn counts_below_the_streaming_sentinel_are_malformed() {
        let result: Result<Vec<u8>> = decode(&[0xFD, 0xFF, 0xFF, 0xFF]);
        assert!(matches!(
            result,
            Err(Error::Format(FormatError::InvalidCount(-3)))
        ));
    }

    #[test]
    fn composite_array_decodes() {
        let decoded: Box<[String]> =
            decode(&[0x02, 0x00, 0x00, 0x00, 0x01, 0x00, b'a', 0x01, 0x00, b'b']).unwrap();
        assert_eq!(&*decoded, &["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn optional_box_presence_flag() {
        let present: Option<Box<u8>> = decode(&[0x01, 7]).unwrap();
        assert_eq!(present, Some(Box::new(7)));

        let absent: Option<Box<u8>> = decode(&[0x00]).unwrap();
        assert_eq!(absent, None);
    }

    #[test]
    fn null_string_only_decodes_into_option() {
        let null: Option<String> = decode(&[0xFF, 0xFF]).unwrap();
        assert_eq!(null, None);

        let rejected: Result<String> = decode(&[0xFF, 0xFF]);
        assert!(matches!(
            rejected,
            Err(Error::Format(FormatError::UnexpectedNull))
        ));
    }
}
