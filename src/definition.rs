//! Mapper definitions: the plain and cache-aware callables for one type pair.

use crate::context::MapContext;
use crate::error::MapError;
use core::any::{type_name, TypeId};
use core::hash::{Hash, Hasher};
use std::rc::Rc;
use std::sync::Arc;

/// Signature shared by both variants of a definition.
pub type MapFn<TIn, TOut> =
    dyn Fn(&TIn, &mut MapContext<'_>) -> Result<TOut, MapError> + Send + Sync;

/// Ordered (source, target) type pair identifying one definition.
///
/// Equality and hashing use the `TypeId`s only; the names are carried for
/// error messages.
#[derive(Copy, Clone, Debug)]
pub struct TypePair {
    source: TypeId,
    target: TypeId,
    source_name: &'static str,
    target_name: &'static str,
}

impl TypePair {
    pub fn of<TIn: ?Sized + 'static, TOut: ?Sized + 'static>() -> Self {
        TypePair {
            source: TypeId::of::<TIn>(),
            target: TypeId::of::<TOut>(),
            source_name: type_name::<TIn>(),
            target_name: type_name::<TOut>(),
        }
    }

    pub fn source_name(&self) -> &'static str {
        self.source_name
    }

    pub fn target_name(&self) -> &'static str {
        self.target_name
    }

    /// True if source and target are the same type.
    pub fn is_identity(&self) -> bool {
        self.source == self.target
    }

    pub(crate) fn not_configured(&self) -> MapError {
        MapError::MappingNotConfigured {
            source_type: self.source_name,
            target_type: self.target_name,
        }
    }

    pub(crate) fn mismatch(&self) -> MapError {
        MapError::DefinitionMismatch {
            source_type: self.source_name,
            target_type: self.target_name,
        }
    }
}

impl PartialEq for TypePair {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source && self.target == other.target
    }
}

impl Eq for TypePair {}

impl Hash for TypePair {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.source.hash(state);
        self.target.hash(state);
    }
}

/// The two callables registered for `TIn -> TOut`.
///
/// `plain` never touches the identity cache. `with_cache` returns a cached
/// target when one exists and otherwise registers its new target with
/// `MapContext::new_instance` before populating it, so a cycle that leads
/// back to the same source finds the shell instead of recursing.
pub struct MapDefinition<TIn, TOut> {
    plain: Box<MapFn<TIn, TOut>>,
    with_cache: Box<MapFn<TIn, TOut>>,
}

impl<TIn: 'static, TOut: 'static> MapDefinition<TIn, TOut> {
    pub fn new<P, C>(plain: P, with_cache: C) -> Self
    where
        P: Fn(&TIn, &mut MapContext<'_>) -> Result<TOut, MapError> + Send + Sync + 'static,
        C: Fn(&TIn, &mut MapContext<'_>) -> Result<TOut, MapError> + Send + Sync + 'static,
    {
        Self {
            plain: Box::new(plain),
            with_cache: Box::new(with_cache),
        }
    }

    /// One function for both variants. Suited to values without identity
    /// (scalars, strings) where there is nothing to cache.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&TIn, &mut MapContext<'_>) -> Result<TOut, MapError> + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        let g = Arc::clone(&f);
        Self::new(move |value, ctx| f(value, ctx), move |value, ctx| g(value, ctx))
    }

    pub fn plain(&self) -> &MapFn<TIn, TOut> {
        &*self.plain
    }

    pub fn with_cache(&self) -> &MapFn<TIn, TOut> {
        &*self.with_cache
    }

    /// The variant a context with the given flag dispatches to.
    #[inline]
    pub fn select(&self, preserve_references: bool) -> &MapFn<TIn, TOut> {
        if preserve_references {
            self.with_cache()
        } else {
            self.plain()
        }
    }
}

impl<S: 'static, T: 'static> MapDefinition<Rc<S>, Rc<T>> {
    /// Build both variants from a shell constructor and a populate step.
    ///
    /// `shell` allocates the target with placeholder fields; `populate`
    /// fills them, recursing through the context. The cache-aware variant
    /// registers the shell between the two steps. Targets that need their
    /// fields filled after allocation use interior mutability
    /// (`RefCell`, `OnceCell`).
    pub fn two_phase<Shell, Fill>(shell: Shell, populate: Fill) -> Self
    where
        Shell: Fn(&S) -> T + Send + Sync + 'static,
        Fill: Fn(&S, &T, &mut MapContext<'_>) -> Result<(), MapError> + Send + Sync + 'static,
    {
        let shell = Arc::new(shell);
        let populate = Arc::new(populate);
        let (plain_shell, plain_populate) = (Arc::clone(&shell), Arc::clone(&populate));

        Self::new(
            move |source, ctx| {
                let src: &S = source;
                let target = Rc::new(plain_shell(src));
                plain_populate(src, &*target, ctx)?;
                Ok(target)
            },
            move |source, ctx| {
                if let Some(hit) = ctx.get_from_cache::<Rc<S>, Rc<T>>(source) {
                    return Ok(hit);
                }
                let src: &S = source;
                let target = Rc::new(shell(src));
                ctx.new_instance(source, &target);
                populate(src, &*target, ctx)?;
                Ok(target)
            },
        )
    }
}

impl<TIn, TOut> core::fmt::Debug for MapDefinition<TIn, TOut> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MapDefinition")
            .field("source", &type_name::<TIn>())
            .field("target", &type_name::<TOut>())
            .finish()
    }
}
