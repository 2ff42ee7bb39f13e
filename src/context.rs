//! MapContext: the per-operation scope every mapper recurses through.

use crate::container::{map_sequence, Pipeline, Traversal};
use crate::definition::MapFn;
use crate::error::MapError;
use crate::identity::{Identity, IdentityCache};
use crate::options::MapOptions;
use crate::registry::{resolve, MapperLookup};
use core::any::Any;
use core::hash::Hash;
use indexmap::map::Entry;
use indexmap::IndexMap;
use tracing::trace;

/// Scope of one top-level mapping operation (or one logical batch).
///
/// The context borrows a shared registry and, when references are
/// preserved, owns the identity cache for everything mapped through it.
/// The cache is never cleared; drop the context to release it. All
/// mutation goes through `&mut self`, and cache entries hold `Rc`
/// keepalives, so a context is neither shared nor sent across threads.
pub struct MapContext<'r> {
    registry: &'r dyn MapperLookup,
    preserve_references: bool,
    cache: Option<IdentityCache>,
}

impl<'r> MapContext<'r> {
    pub fn new(registry: &'r dyn MapperLookup, preserve_references: bool) -> Self {
        Self {
            registry,
            preserve_references,
            cache: preserve_references.then(IdentityCache::new),
        }
    }

    pub fn with_options(registry: &'r dyn MapperLookup, options: MapOptions) -> Self {
        Self::new(registry, options.preserve_references)
    }

    pub fn preserve_references(&self) -> bool {
        self.preserve_references
    }

    /// Number of identity cache entries; zero when not preserving.
    pub fn cache_len(&self) -> usize {
        self.cache.as_ref().map_or(0, IdentityCache::len)
    }

    /// Register `target` as the mapping of `source` to `TOut`.
    ///
    /// Cache-aware mappers call this right after allocating the target and
    /// before populating it. Overwrites any earlier entry for the same key.
    /// Ignored when the context does not preserve references.
    pub fn new_instance<Src: Identity, TOut: Any + Clone>(&mut self, source: &Src, target: &TOut) {
        match self.cache.as_mut() {
            Some(cache) => {
                let replaced = cache.insert(source, target.clone());
                trace!(
                    address = source.address(),
                    target = core::any::type_name::<TOut>(),
                    replaced,
                    "registered instance"
                );
            }
            None => trace!("new_instance ignored: references not preserved"),
        }
    }

    /// The target already produced for `source` as a `TOut`, if any.
    pub fn get_from_cache<Src: Identity, TOut: Any + Clone>(&self, source: &Src) -> Option<TOut> {
        let hit = self.cache.as_ref()?.get::<Src, TOut>(source);
        if hit.is_some() {
            trace!(
                address = source.address(),
                target = core::any::type_name::<TOut>(),
                "identity cache hit"
            );
        }
        hit
    }

    /// Resolve the variant of `TIn -> TOut` this context dispatches to.
    fn mapper<TIn: 'static, TOut: 'static>(&self) -> Result<&'r MapFn<TIn, TOut>, MapError> {
        let definition = resolve::<TIn, TOut>(self.registry)?;
        trace!(
            source = core::any::type_name::<TIn>(),
            target = core::any::type_name::<TOut>(),
            preserve = self.preserve_references,
            "resolved mapping definition"
        );
        Ok(definition.select(self.preserve_references))
    }

    /// Map an optional value. `None` maps to `None` without consulting the
    /// registry.
    ///
    /// `None` is the only absent value: zero, `Default` and empty values are
    /// present and go through the registered mapper like any other value.
    pub fn map<TIn: 'static, TOut: 'static>(
        &mut self,
        value: Option<&TIn>,
    ) -> Result<Option<TOut>, MapError> {
        match value {
            None => Ok(None),
            Some(v) => self.map_value(v).map(Some),
        }
    }

    /// Map a value that is always present.
    pub fn map_value<TIn: 'static, TOut: 'static>(&mut self, value: &TIn) -> Result<TOut, MapError> {
        let mapper = self.mapper::<TIn, TOut>()?;
        mapper(value, self)
    }

    /// Map a sequence element by element, preserving order.
    ///
    /// An absent source gives `None`; an empty one gives an empty `Vec`.
    /// The mapper is resolved once for the whole call. Sources reporting an
    /// exact length get a pre-sized output, and an exactly-empty source
    /// returns before the registry is consulted.
    pub fn map_to_list<'a, TIn, TOut, I>(
        &mut self,
        source: Option<I>,
    ) -> Result<Option<Vec<TOut>>, MapError>
    where
        TIn: 'static,
        TOut: 'static,
        I: IntoIterator<Item = &'a TIn>,
    {
        let Some(source) = source else {
            return Ok(None);
        };
        let iter = source.into_iter();
        let traversal = Traversal::of(&iter);
        if traversal.is_empty() {
            return Ok(Some(Vec::new()));
        }
        let mapper = self.mapper::<TIn, TOut>()?;
        map_sequence(iter, traversal, mapper, self).map(Some)
    }

    /// `map_to_list` into any container buildable from a `Vec`.
    pub fn map_to_collection<'a, TIn, TOut, I, C>(
        &mut self,
        source: Option<I>,
    ) -> Result<Option<C>, MapError>
    where
        TIn: 'static,
        TOut: 'static,
        I: IntoIterator<Item = &'a TIn>,
        C: From<Vec<TOut>>,
    {
        Ok(self.map_to_list(source)?.map(C::from))
    }

    /// `map_to_list` into a boxed slice.
    pub fn map_to_array<'a, TIn, TOut, I>(
        &mut self,
        source: Option<I>,
    ) -> Result<Option<Box<[TOut]>>, MapError>
    where
        TIn: 'static,
        TOut: 'static,
        I: IntoIterator<Item = &'a TIn>,
    {
        self.map_to_collection(source)
    }

    /// Map the entries of an associative container.
    ///
    /// Keys and values go through independent pipelines: a side whose type
    /// does not change is cloned through without a registry lookup,
    /// otherwise its mapper is resolved once before iterating. An empty
    /// source, streamed or not, returns before any lookup. The result
    /// keeps source iteration order. Two entries producing the same output
    /// key fail with `DuplicateKey`.
    pub fn map_to_dictionary<'a, KIn, VIn, KOut, VOut, I>(
        &mut self,
        source: Option<I>,
    ) -> Result<Option<IndexMap<KOut, VOut>>, MapError>
    where
        KIn: 'static,
        VIn: 'static,
        KOut: Hash + Eq + Clone + 'static,
        VOut: Clone + 'static,
        I: IntoIterator<Item = (&'a KIn, &'a VIn)>,
    {
        let Some(source) = source else {
            return Ok(None);
        };
        let mut iter = source.into_iter().peekable();
        let traversal = Traversal::of(&iter);
        if traversal.is_empty() || iter.peek().is_none() {
            return Ok(Some(IndexMap::new()));
        }

        let keys = Pipeline::<KIn, KOut>::resolve(self.registry, self.preserve_references)?;
        let values = Pipeline::<VIn, VOut>::resolve(self.registry, self.preserve_references)?;

        let mut out = IndexMap::with_capacity(traversal.capacity());
        for (index, (key, value)) in iter.enumerate() {
            let key = keys.apply(key, self)?;
            let value = values.apply(value, self)?;
            match out.entry(key) {
                Entry::Occupied(_) => {
                    return Err(MapError::DuplicateKey {
                        key_type: core::any::type_name::<KOut>(),
                        index,
                    })
                }
                Entry::Vacant(slot) => {
                    slot.insert(value);
                }
            }
        }
        Ok(Some(out))
    }
}

impl core::fmt::Debug for MapContext<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MapContext")
            .field("preserve_references", &self.preserve_references)
            .field("cache", &self.cache)
            .finish()
    }
}
