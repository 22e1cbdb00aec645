//! The [`Encode`] trait and its implementations for wire-format types.
//!
//! Implementations do not encode values directly; they *build* an
//! [`EncodePlan`] once, and the plan encodes every subsequent value. The
//! derive macro generates `build_encoder` for user composites; the
//! implementations here cover the scalar, text, collection and pointer
//! shapes of the format.
//!
//! Nullability is spelled `Option` and routed through [`EncodeNullable`]:
//! `String` uses the `0xFFFF` length sentinel, collections and sequences
//! the `-1` count, and `Box<T>` (plus derived user composites) the
//! one-byte presence flag. Types with no wire category (`usize`, 128-bit
//! integers, maps) implement nothing and are rejected at compile time.

use std::io::Write;

use crate::{
    error::{Error, Result},
    plan::{EncodePlan, PlanRegistry},
    sequence::Sequence,
    wire,
    writer::WriteBuffer,
};

/// A type that can be encoded into the wire format.
///
/// `build_encoder` is called at most once per `(Self, W)` pair per
/// registry; the returned plan is cached and reused. See
/// [`PlanRegistry::encoder`].
pub trait Encode: Sized + 'static {
    /// Compiles the encode plan for this type over sink type `W`.
    fn build_encoder<W: Write + 'static>(registry: &PlanRegistry) -> Result<EncodePlan<W, Self>>;
}

/// A type whose `Option` has a wire form.
///
/// The format spells null differently per category, so each nullable type
/// supplies its own `Option` plan and the one blanket impl below turns it
/// into `Encode for Option<T>`. Keeping the `Option` impl behind a trait
/// on `Self` also lets the derive macro participate from other crates,
/// where an impl directly on `Option` would be rejected as foreign.
pub trait EncodeNullable: Encode {
    /// Compiles the encode plan for `Option<Self>` over sink type `W`.
    fn build_option_encoder<W: Write + 'static>(
        registry: &PlanRegistry,
    ) -> Result<EncodePlan<W, Option<Self>>>;
}

impl<T: EncodeNullable> Encode for Option<T> {
    fn build_encoder<W: Write + 'static>(registry: &PlanRegistry) -> Result<EncodePlan<W, Self>> {
        T::build_option_encoder(registry)
    }
}

fn write_len_prefix<W: Write>(out: &mut WriteBuffer<W>, len: usize) -> Result<()> {
    let count = i32::try_from(len)
        .map_err(|_| Error::Contract("collection length exceeds i32::MAX"))?;
    out.write_count(count)
}

// ============================================================================
// Scalars
// ============================================================================

macro_rules! impl_encode_scalar {
    ($($ty:ty),* $(,)?) => {$(
        impl Encode for $ty {
            fn build_encoder<W: Write + 'static>(
                _registry: &PlanRegistry,
            ) -> Result<EncodePlan<W, Self>> {
                Ok(EncodePlan::with_bulk(
                    |out: &mut WriteBuffer<W>, value: &$ty| out.write_scalar(*value),
                    |out: &mut WriteBuffer<W>, values: &[$ty]| out.write_scalar_slice(values),
                ))
            }
        }
    )*};
}

impl_encode_scalar!(bool, u8, i8, u16, i16, u32, i32, u64, i64, f32, f64);

impl Encode for char {
    // No bulk path: the encoded width of a char depends on the encoding.
    fn build_encoder<W: Write + 'static>(_registry: &PlanRegistry) -> Result<EncodePlan<W, Self>> {
        Ok(EncodePlan::new(|out: &mut WriteBuffer<W>, value: &char| {
            out.write_char(*value)
        }))
    }
}

// ============================================================================
// Strings
// ============================================================================

impl Encode for String {
    fn build_encoder<W: Write + 'static>(_registry: &PlanRegistry) -> Result<EncodePlan<W, Self>> {
        Ok(EncodePlan::new(|out: &mut WriteBuffer<W>, value: &String| {
            out.write_str(value)
        }))
    }
}

impl EncodeNullable for String {
    fn build_option_encoder<W: Write + 'static>(
        _registry: &PlanRegistry,
    ) -> Result<EncodePlan<W, Option<String>>> {
        Ok(EncodePlan::new(
            |out: &mut WriteBuffer<W>, value: &Option<String>| match value {
                Some(text) => out.write_str(text),
                None => out.write_null_string(),
            },
        ))
    }
}

// ============================================================================
// Collections
// ============================================================================

impl<T: Encode> Encode for Vec<T> {
    /// Counted form: count prefix, then each element in order. Scalar
    /// elements go through the flat bulk path.
    fn build_encoder<W: Write + 'static>(registry: &PlanRegistry) -> Result<EncodePlan<W, Self>> {
        let elem = registry.encoder::<T, W>()?;
        Ok(EncodePlan::new(move |out: &mut WriteBuffer<W>, values: &Vec<T>| {
            write_len_prefix(out, values.len())?;
            elem.run_slice(out, values)
        }))
    }
}

impl<T: Encode> EncodeNullable for Vec<T> {
    fn build_option_encoder<W: Write + 'static>(
        registry: &PlanRegistry,
    ) -> Result<EncodePlan<W, Option<Vec<T>>>> {
        let inner = registry.encoder::<Vec<T>, W>()?;
        Ok(EncodePlan::new(
            move |out: &mut WriteBuffer<W>, value: &Option<Vec<T>>| match value {
                Some(values) => inner.run(out, values),
                None => out.write_count(wire::NULL_COUNT),
            },
        ))
    }
}

impl<T: Encode> Encode for Box<[T]> {
    /// Arrays share the counted wire form, but only scalar element runs
    /// can be encoded; composite-element arrays have no encode procedure
    /// and are rejected when the plan is built. Use `Vec` for composite
    /// elements.
    fn build_encoder<W: Write + 'static>(registry: &PlanRegistry) -> Result<EncodePlan<W, Self>> {
        let elem = registry.encoder::<T, W>()?;
        if !elem.has_bulk() {
            return Err(Error::UnsupportedShape {
                type_name: std::any::type_name::<Self>(),
                reason: "arrays encode only scalar elements; use Vec for composites",
            });
        }
        Ok(EncodePlan::new(move |out: &mut WriteBuffer<W>, values: &Box<[T]>| {
            write_len_prefix(out, values.len())?;
            elem.run_slice(out, values)
        }))
    }
}

impl<T: Encode> EncodeNullable for Box<[T]> {
    fn build_option_encoder<W: Write + 'static>(
        registry: &PlanRegistry,
    ) -> Result<EncodePlan<W, Option<Box<[T]>>>> {
        let inner = registry.encoder::<Box<[T]>, W>()?;
        Ok(EncodePlan::new(
            move |out: &mut WriteBuffer<W>, value: &Option<Box<[T]>>| match value {
                Some(values) => inner.run(out, values),
                None => out.write_count(wire::NULL_COUNT),
            },
        ))
    }
}

// ============================================================================
// Sequences
// ============================================================================

impl<T: Encode> Encode for Sequence<T> {
    /// A counted sequence emits the counted form; a streaming one emits
    /// the `-2` sentinel with flag-prefixed elements and drains itself.
    fn build_encoder<W: Write + 'static>(registry: &PlanRegistry) -> Result<EncodePlan<W, Self>> {
        let elem = registry.encoder::<T, W>()?;
        Ok(EncodePlan::new(move |out: &mut WriteBuffer<W>, value: &Sequence<T>| {
            value.encode_with(&elem, out)
        }))
    }
}

impl<T: Encode> EncodeNullable for Sequence<T> {
    fn build_option_encoder<W: Write + 'static>(
        registry: &PlanRegistry,
    ) -> Result<EncodePlan<W, Option<Sequence<T>>>> {
        let inner = registry.encoder::<Sequence<T>, W>()?;
        Ok(EncodePlan::new(
            move |out: &mut WriteBuffer<W>, value: &Option<Sequence<T>>| match value {
                Some(sequence) => inner.run(out, sequence),
                None => out.write_count(wire::NULL_COUNT),
            },
        ))
    }
}

// ============================================================================
// Pointers
// ============================================================================

impl<T: Encode> Encode for Box<T> {
    /// Transparent on the wire; boxing exists so recursive types can tie
    /// the knot.
    fn build_encoder<W: Write + 'static>(registry: &PlanRegistry) -> Result<EncodePlan<W, Self>> {
        let inner = registry.encoder::<T, W>()?;
        Ok(EncodePlan::new(move |out: &mut WriteBuffer<W>, value: &Box<T>| {
            inner.run(out, &**value)
        }))
    }
}

impl<T: Encode> EncodeNullable for Box<T> {
    /// Presence-flag form, the nullable spelling for recursive composites.
    fn build_option_encoder<W: Write + 'static>(
        registry: &PlanRegistry,
    ) -> Result<EncodePlan<W, Option<Box<T>>>> {
        let inner = registry.lazy_encoder::<T, W>();
        Ok(EncodePlan::new(
            move |out: &mut WriteBuffer<W>, value: &Option<Box<T>>| match value {
                Some(boxed) => {
                    out.write_bool(true)?;
                    inner.run(out, &**boxed)
                }
                None => out.write_bool(false),
            },
        ))
    }
}

impl<T: Encode> Encode for std::sync::Arc<T> {
    fn build_encoder<W: Write + 'static>(registry: &PlanRegistry) -> Result<EncodePlan<W, Self>> {
        let inner = registry.encoder::<T, W>()?;
        Ok(EncodePlan::new(
            move |out: &mut WriteBuffer<W>, value: &std::sync::Arc<T>| inner.run(out, &**value),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::TextEncoding;

    fn encode<T: Encode>(value: &T) -> Vec<u8> {
        let registry = PlanRegistry::new();
        let plan = registry.encoder::<T, Vec<u8>>().unwrap();
        let mut out = WriteBuffer::new(Vec::new(), TextEncoding::Utf8, 64);
        plan.run(&mut out, value).unwrap();
        out.into_sink().unwrap()
    }

    #[test]
    fn vec_counted_form() {
        assert_eq!(
            encode(&vec![1u16, 2, 3]),
            vec![0x03, 0x00, 0x00, 0x00, 1, 0, 2, 0, 3, 0]
        );
        assert_eq!(encode(&Vec::<u16>::new()), vec![0x00, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn null_collection_sentinels() {
        assert_eq!(encode(&None::<Vec<u8>>), vec![0xFF, 0xFF, 0xFF, 0xFF]);
        assert_eq!(encode(&None::<Box<[u8]>>), vec![0xFF, 0xFF, 0xFF, 0xFF]);
        assert_eq!(encode(&None::<String>), vec![0xFF, 0xFF]);
    }

    #[test]
    fn scalar_array_uses_the_flat_run() {
        let values: Box<[i32]> = vec![0x01020304, 0x05060708].into_boxed_slice();
        assert_eq!(
            encode(&values),
            vec![0x02, 0x00, 0x00, 0x00, 4, 3, 2, 1, 8, 7, 6, 5]
        );
    }

    #[test]
    fn composite_array_encode_is_an_unsupported_shape() {
        let registry = PlanRegistry::new();
        let result = registry.encoder::<Box<[String]>, Vec<u8>>();
        assert!(matches!(result, Err(Error::UnsupportedShape { .. })));
    }

    #[test]
    fn composite_vec_encodes_fine() {
        let values = vec!["a".to_string(), "b".to_string()];
        assert_eq!(
            encode(&values),
            vec![0x02, 0x00, 0x00, 0x00, 0x01, 0x00, b'a', 0x01, 0x00, b'b']
        );
    }

    #[test]
    fn boxed_values_are_transparent() {
        assert_eq!(encode(&Box::new(7u8)), vec![7]);
        assert_eq!(encode(&std::sync::Arc::new(7u8)), vec![7]);
    }

    #[test]
    fn optional_box_uses_a_presence_flag() {
        assert_eq!(encode(&Some(Box::new(7u8))), vec![0x01, 7]);
        assert_eq!(encode(&None::<Box<u8>>), vec![0x00]);
    }
}
