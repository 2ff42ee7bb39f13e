//! Definition lookup: the seam the context resolves mappers through, and a
//! concrete registry keyed by type pair.

use crate::context::MapContext;
use crate::definition::{MapDefinition, TypePair};
use crate::error::MapError;
use crate::options::MapOptions;
use core::any::Any;
use hashbrown::HashMap;
use tracing::debug;

/// Source of mapper definitions.
///
/// `definition` returns the `MapDefinition<TIn, TOut>` registered for
/// `pair` as a type-erased reference, or `MappingNotConfigured`. The
/// context downcasts it; any other concrete type is reported as
/// `DefinitionMismatch`. Implementations are read-only once shared and may
/// be used by many contexts at the same time.
pub trait MapperLookup: Send + Sync {
    fn definition(&self, pair: TypePair) -> Result<&(dyn Any + Send + Sync), MapError>;
}

/// Resolve the typed definition for `TIn -> TOut`.
pub fn resolve<'r, TIn: 'static, TOut: 'static>(
    lookup: &'r dyn MapperLookup,
) -> Result<&'r MapDefinition<TIn, TOut>, MapError> {
    let pair = TypePair::of::<TIn, TOut>();
    lookup
        .definition(pair)?
        .downcast_ref::<MapDefinition<TIn, TOut>>()
        .ok_or_else(|| pair.mismatch())
}

/// Type-pair keyed store of mapper definitions.
///
/// Configured through `&mut self`, then shared by reference (or in an
/// `Arc`) with any number of contexts.
#[derive(Default)]
pub struct MapRegistry {
    definitions: HashMap<TypePair, Box<dyn Any + Send + Sync>>,
}

impl MapRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Register `definition`, replacing any earlier one for the same pair.
    pub fn register<TIn: 'static, TOut: 'static>(
        &mut self,
        definition: MapDefinition<TIn, TOut>,
    ) -> &mut Self {
        let pair = TypePair::of::<TIn, TOut>();
        let replaced = self
            .definitions
            .insert(pair, Box::new(definition))
            .is_some();
        debug!(
            source = pair.source_name(),
            target = pair.target_name(),
            replaced,
            "registered mapping definition"
        );
        self
    }

    /// Shorthand for `register(MapDefinition::from_fn(f))`.
    pub fn register_fn<TIn, TOut, F>(&mut self, f: F) -> &mut Self
    where
        TIn: 'static,
        TOut: 'static,
        F: Fn(&TIn, &mut MapContext<'_>) -> Result<TOut, MapError> + Send + Sync + 'static,
    {
        self.register(MapDefinition::from_fn(f))
    }

    pub fn contains<TIn: 'static, TOut: 'static>(&self) -> bool {
        self.definitions.contains_key(&TypePair::of::<TIn, TOut>())
    }

    /// A fresh context borrowing this registry.
    pub fn context(&self, options: MapOptions) -> MapContext<'_> {
        MapContext::with_options(self, options)
    }

    /// Map one value in its own context; the identity cache lives only for
    /// this call.
    pub fn map<TIn: 'static, TOut: 'static>(
        &self,
        value: Option<&TIn>,
        options: MapOptions,
    ) -> Result<Option<TOut>, MapError> {
        self.context(options).map(value)
    }

    /// Map a sequence in its own context.
    pub fn map_to_list<'a, TIn, TOut, I>(
        &self,
        source: Option<I>,
        options: MapOptions,
    ) -> Result<Option<Vec<TOut>>, MapError>
    where
        TIn: 'static,
        TOut: 'static,
        I: IntoIterator<Item = &'a TIn>,
    {
        self.context(options).map_to_list(source)
    }
}

impl MapperLookup for MapRegistry {
    fn definition(&self, pair: TypePair) -> Result<&(dyn Any + Send + Sync), MapError> {
        self.definitions
            .get(&pair)
            .map(|d| &**d)
            .ok_or_else(|| pair.not_configured())
    }
}

impl core::fmt::Debug for MapRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_list()
            .entries(
                self.definitions
                    .keys()
                    .map(|p| (p.source_name(), p.target_name())),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Invariant: a missing pair surfaces as `MappingNotConfigured` from the
    /// lookup itself.
    #[test]
    fn missing_pair_is_not_configured() {
        let registry = MapRegistry::new();
        let err = resolve::<u8, u16>(&registry).unwrap_err();
        assert_eq!(
            err,
            MapError::MappingNotConfigured {
                source_type: "u8",
                target_type: "u16",
            }
        );
    }

    /// Invariant: registration is keyed by the ordered pair; the reverse
    /// direction stays unconfigured.
    #[test]
    fn register_and_resolve() {
        let mut registry = MapRegistry::new();
        registry.register_fn(|v: &u8, _| Ok(u16::from(*v) + 1));
        assert!(registry.contains::<u8, u16>());
        assert!(!registry.contains::<u16, u8>());
        assert_eq!(registry.len(), 1);
        assert!(resolve::<u8, u16>(&registry).is_ok());
        assert!(resolve::<u16, u8>(&registry)
            .unwrap_err()
            .is_not_configured());
    }

    /// Invariant: re-registering a pair replaces the earlier definition.
    #[test]
    fn reregistration_replaces() {
        let mut registry = MapRegistry::new();
        registry
            .register_fn(|_: &u8, _| Ok(1u16))
            .register_fn(|_: &u8, _| Ok(2u16));
        assert_eq!(registry.len(), 1);
        let out = registry.map::<u8, u16>(Some(&0), MapOptions::default());
        assert_eq!(out, Ok(Some(2)));
    }

    /// Invariant: a lookup handing back the wrong concrete type is reported,
    /// not trusted.
    #[test]
    fn wrong_definition_type_is_mismatch() {
        struct Liar(MapRegistry);
        impl MapperLookup for Liar {
            fn definition(&self, _pair: TypePair) -> Result<&(dyn Any + Send + Sync), MapError> {
                self.0.definition(TypePair::of::<u8, u16>())
            }
        }
        let mut inner = MapRegistry::new();
        inner.register_fn(|v: &u8, _| Ok(u16::from(*v)));
        let liar = Liar(inner);
        match resolve::<u32, u64>(&liar) {
            Err(MapError::DefinitionMismatch { source_type, target_type }) => {
                assert_eq!(source_type, "u32");
                assert_eq!(target_type, "u64");
            }
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
    }

    /// Invariant: the registry can be shared by contexts on several threads.
    #[test]
    fn registry_is_shareable_across_threads() {
        let mut registry = MapRegistry::new();
        registry.register_fn(|v: &u32, _| Ok(u64::from(*v) * 10));
        let registry = &registry;
        std::thread::scope(|s| {
            let handles: Vec<_> = (0..4u32)
                .map(|i| {
                    s.spawn(move || {
                        let mut ctx = registry.context(MapOptions::preserving());
                        ctx.map_value::<u32, u64>(&i)
                    })
                })
                .collect();
            for (i, h) in handles.into_iter().enumerate() {
                assert_eq!(h.join().unwrap(), Ok(i as u64 * 10));
            }
        });
    }
}
