//! Compiled encode/decode plans and the registry that caches them.
//!
//! A plan is the compiled form of "how to move a `T` through a buffer":
//! an immutable closure built once per `(value type, backend type)` pair
//! and reused for every subsequent value. All member selection and shape
//! analysis happens while the plan is built; running a plan performs no
//! introspection.
//!
//! Plans are cached in a [`PlanRegistry`]. Lookups build missing plans
//! outside the cache lock and publish them afterwards, so two threads
//! racing on the same type both succeed and the last insert wins; the
//! builders are pure, so the duplicates are identical.
//!
//! Member plans inside composite plans resolve *lazily*, on first use,
//! through the registry that built them. That keeps plan construction
//! non-recursive, so self-referential type definitions (`Node` containing
//! `Option<Box<Node>>`) compile into plans without special handling.

use std::{
    any::{Any, TypeId},
    io::{Read, Write},
    sync::{Arc, OnceLock, Weak},
};

use dashmap::DashMap;
use fxhash::FxBuildHasher;
use tracing::{debug, trace};

use crate::{
    decode::Decode,
    encode::Encode,
    error::{Error, Result},
    reader::ReadBuffer,
    writer::WriteBuffer,
};

type EncodeFn<W, T> = dyn Fn(&mut WriteBuffer<W>, &T) -> Result<()> + Send + Sync;
type EncodeBulkFn<W, T> = dyn Fn(&mut WriteBuffer<W>, &[T]) -> Result<()> + Send + Sync;
type DecodeFn<R, T> = dyn Fn(&mut ReadBuffer<R>) -> Result<T> + Send + Sync;
type DecodeBulkFn<R, T> = dyn Fn(&mut ReadBuffer<R>, usize) -> Result<Vec<T>> + Send + Sync;

/// A compiled procedure that encodes values of `T` into a
/// [`WriteBuffer<W>`]. Cloning is cheap; clones share the same compiled
/// closure.
pub struct EncodePlan<W, T> {
    run: Arc<EncodeFn<W, T>>,
    bulk: Option<Arc<EncodeBulkFn<W, T>>>,
}

impl<W, T> Clone for EncodePlan<W, T> {
    fn clone(&self) -> Self {
        Self { run: Arc::clone(&self.run), bulk: self.bulk.clone() }
    }
}

impl<W: Write + 'static, T: 'static> EncodePlan<W, T> {
    /// Wraps a per-value encode procedure.
    pub fn new<F>(run: F) -> Self
    where
        F: Fn(&mut WriteBuffer<W>, &T) -> Result<()> + Send + Sync + 'static,
    {
        Self { run: Arc::new(run), bulk: None }
    }

    /// Wraps a per-value procedure together with a flat-run procedure used
    /// when values of `T` appear as a contiguous scalar payload.
    pub fn with_bulk<F, B>(run: F, bulk: B) -> Self
    where
        F: Fn(&mut WriteBuffer<W>, &T) -> Result<()> + Send + Sync + 'static,
        B: Fn(&mut WriteBuffer<W>, &[T]) -> Result<()> + Send + Sync + 'static,
    {
        Self { run: Arc::new(run), bulk: Some(Arc::new(bulk)) }
    }

    /// Encodes one value.
    pub fn run(&self, out: &mut WriteBuffer<W>, value: &T) -> Result<()> {
        (self.run)(out, value)
    }

    /// Encodes a run of values, using the flat bulk procedure when the
    /// element type has one.
    pub fn run_slice(&self, out: &mut WriteBuffer<W>, values: &[T]) -> Result<()> {
        match &self.bulk {
            Some(bulk) => bulk(out, values),
            None => {
                for value in values {
                    (self.run)(out, value)?;
                }
                Ok(())
            }
        }
    }

    /// Whether values of `T` travel as a flat scalar run.
    pub fn has_bulk(&self) -> bool {
        self.bulk.is_some()
    }
}

/// A compiled procedure that decodes values of `T` from a
/// [`ReadBuffer<R>`]. Cloning is cheap; clones share the same compiled
/// closure.
pub struct DecodePlan<R, T> {
    run: Arc<DecodeFn<R, T>>,
    bulk: Option<Arc<DecodeBulkFn<R, T>>>,
}

impl<R, T> Clone for DecodePlan<R, T> {
    fn clone(&self) -> Self {
        Self { run: Arc::clone(&self.run), bulk: self.bulk.clone() }
    }
}

impl<R: Read + 'static, T: 'static> DecodePlan<R, T> {
    /// Wraps a per-value decode procedure.
    pub fn new<F>(run: F) -> Self
    where
        F: Fn(&mut ReadBuffer<R>) -> Result<T> + Send + Sync + 'static,
    {
        Self { run: Arc::new(run), bulk: None }
    }

    /// Wraps a per-value procedure together with a flat-run procedure.
    pub fn with_bulk<F, B>(run: F, bulk: B) -> Self
    where
        F: Fn(&mut ReadBuffer<R>) -> Result<T> + Send + Sync + 'static,
        B: Fn(&mut ReadBuffer<R>, usize) -> Result<Vec<T>> + Send + Sync + 'static,
    {
        Self { run: Arc::new(run), bulk: Some(Arc::new(bulk)) }
    }

    /// Decodes one value.
    pub fn run(&self, src: &mut ReadBuffer<R>) -> Result<T> {
        (self.run)(src)
    }

    /// Decodes a run of `count` values, using the flat bulk procedure when
    /// the element type has one.
    pub fn run_vec(&self, src: &mut ReadBuffer<R>, count: usize) -> Result<Vec<T>> {
        match &self.bulk {
            Some(bulk) => bulk(src, count),
            None => {
                // The count came off the wire; grow instead of trusting it
                // with a huge preallocation.
                let mut out = Vec::with_capacity(count.min(4096));
                for _ in 0..count {
                    out.push((self.run)(src)?);
                }
                Ok(out)
            }
        }
    }

    /// Whether values of `T` travel as a flat scalar run.
    pub fn has_bulk(&self) -> bool {
        self.bulk.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct PlanKey {
    value: TypeId,
    backend: TypeId,
}

impl PlanKey {
    fn of<T: 'static, B: 'static>() -> Self {
        Self { value: TypeId::of::<T>(), backend: TypeId::of::<B>() }
    }
}

#[derive(Default)]
struct Tables {
    encoders: DashMap<PlanKey, Arc<dyn Any + Send + Sync>, FxBuildHasher>,
    decoders: DashMap<PlanKey, Arc<dyn Any + Send + Sync>, FxBuildHasher>,
}

/// A shared cache of compiled plans, keyed by value type and backend type.
///
/// The registry is a cheap-to-clone handle; clones share the same tables.
/// Applications typically hold one registry (inside a
/// [`Codec`](crate::entry::Codec)) so every plan is compiled once per
/// process. Failed builds are never cached: building is deterministic, so
/// a retry fails identically and there is nothing useful to memoize.
#[derive(Clone, Default)]
pub struct PlanRegistry {
    tables: Arc<Tables>,
}

impl std::fmt::Debug for PlanRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlanRegistry")
            .field("encoders", &self.tables.encoders.len())
            .field("decoders", &self.tables.decoders.len())
            .finish()
    }
}

impl PlanRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached encode plan for `T` over sink type `W`, building
    /// and publishing it on a miss.
    pub fn encoder<T: Encode, W: Write + 'static>(&self) -> Result<EncodePlan<W, T>> {
        let key = PlanKey::of::<T, W>();
        if let Some(hit) = self.tables.encoders.get(&key) {
            if let Ok(plan) = hit.value().clone().downcast::<EncodePlan<W, T>>() {
                trace!(value = std::any::type_name::<T>(), "encode plan cache hit");
                return Ok((*plan).clone());
            }
        }

        debug!(value = std::any::type_name::<T>(), "compiling encode plan");
        let plan = T::build_encoder(self)?;
        self.tables.encoders.insert(key, Arc::new(plan.clone()));
        Ok(plan)
    }

    /// Returns the cached decode plan for `T` over source type `R`,
    /// building and publishing it on a miss.
    pub fn decoder<T: Decode, R: Read + 'static>(&self) -> Result<DecodePlan<R, T>> {
        let key = PlanKey::of::<T, R>();
        if let Some(hit) = self.tables.decoders.get(&key) {
            if let Ok(plan) = hit.value().clone().downcast::<DecodePlan<R, T>>() {
                trace!(value = std::any::type_name::<T>(), "decode plan cache hit");
                return Ok((*plan).clone());
            }
        }

        debug!(value = std::any::type_name::<T>(), "compiling decode plan");
        let plan = T::build_decoder(self)?;
        self.tables.decoders.insert(key, Arc::new(plan.clone()));
        Ok(plan)
    }

    /// Returns an encode plan that resolves through the registry on first
    /// use. Composite plans use this for their members, which keeps plan
    /// construction non-recursive even for self-referential types.
    ///
    /// Shape errors in the member type surface on first use instead of at
    /// build time. The plan holds the registry weakly; running it after
    /// the registry is gone is a contract violation.
    pub fn lazy_encoder<T: Encode, W: Write + 'static>(&self) -> EncodePlan<W, T> {
        let tables = Arc::downgrade(&self.tables);
        let slot: OnceLock<EncodePlan<W, T>> = OnceLock::new();
        EncodePlan::new(move |out, value| {
            let plan = match slot.get() {
                Some(plan) => plan,
                None => {
                    let built = Self::revive(&tables)?.encoder::<T, W>()?;
                    slot.get_or_init(|| built)
                }
            };
            plan.run(out, value)
        })
    }

    /// Decode-side counterpart of [`PlanRegistry::lazy_encoder`].
    pub fn lazy_decoder<T: Decode, R: Read + 'static>(&self) -> DecodePlan<R, T> {
        let tables = Arc::downgrade(&self.tables);
        let slot: OnceLock<DecodePlan<R, T>> = OnceLock::new();
        DecodePlan::new(move |src| {
            let plan = match slot.get() {
                Some(plan) => plan,
                None => {
                    let built = Self::revive(&tables)?.decoder::<T, R>()?;
                    slot.get_or_init(|| built)
                }
            };
            plan.run(src)
        })
    }

    fn revive(tables: &Weak<Tables>) -> Result<Self> {
        match tables.upgrade() {
            Some(tables) => Ok(Self { tables }),
            None => Err(Error::Contract(
                "plan registry dropped before a lazy member plan resolved",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::TextEncoding;

    #[test]
    fn plans_are_cached_and_shared() {
        let registry = PlanRegistry::new();
        let first = registry.encoder::<i32, Vec<u8>>().unwrap();
        let second = registry.encoder::<i32, Vec<u8>>().unwrap();
        assert!(Arc::ptr_eq(&first.run, &second.run));
    }

    #[test]
    fn encoder_and_decoder_tables_are_independent() {
        let registry = PlanRegistry::new();
        registry.encoder::<u16, Vec<u8>>().unwrap();
        let plan = registry.decoder::<u16, &'static [u8]>().unwrap();
        let mut src = ReadBuffer::new(&[0x34, 0x12][..], TextEncoding::Utf8, 64);
        assert_eq!(plan.run(&mut src).unwrap(), 0x1234);
    }

    #[test]
    fn lazy_plans_resolve_on_first_use() {
        let registry = PlanRegistry::new();
        let lazy = registry.lazy_encoder::<u8, Vec<u8>>();
        let mut out = WriteBuffer::new(Vec::new(), TextEncoding::Utf8, 64);
        lazy.run(&mut out, &0xAB).unwrap();
        assert_eq!(out.into_sink().unwrap(), vec![0xAB]);
    }

    #[test]
    fn lazy_plan_outliving_its_registry_is_a_contract_error() {
        let lazy = {
            let registry = PlanRegistry::new();
            registry.lazy_encoder::<u8, Vec<u8>>()
        };
        let mut out = WriteBuffer::new(Vec::new(), TextEncoding::Utf8, 64);
        assert!(matches!(lazy.run(&mut out, &1), Err(Error::Contract(_))));
    }

    #[test]
    fn scalar_plans_carry_the_bulk_path() {
        let registry = PlanRegistry::new();
        assert!(registry.encoder::<i64, Vec<u8>>().unwrap().has_bulk());
        assert!(!registry.encoder::<String, Vec<u8>>().unwrap().has_bulk());
    }
}
