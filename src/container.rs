//! Traversal strategies for sequences and dictionary entries.

use crate::context::MapContext;
use crate::definition::{MapFn, TypePair};
use crate::error::MapError;
use crate::registry::{resolve, MapperLookup};
use core::any::Any;

/// How a source sequence is walked, decided from its size hint.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum Traversal {
    /// Length known up front; output is pre-sized.
    Exact(usize),
    /// Length unknown; output grows as elements arrive.
    Streamed,
}

impl Traversal {
    pub(crate) fn of<I: Iterator>(iter: &I) -> Self {
        match iter.size_hint() {
            (lower, Some(upper)) if lower == upper => Traversal::Exact(lower),
            _ => Traversal::Streamed,
        }
    }

    /// True only when the source reports exactly zero elements.
    pub(crate) fn is_empty(&self) -> bool {
        *self == Traversal::Exact(0)
    }

    pub(crate) fn capacity(&self) -> usize {
        match *self {
            Traversal::Exact(n) => n,
            Traversal::Streamed => 0,
        }
    }
}

/// Map every element of `iter` with one already-resolved mapper, in order.
pub(crate) fn map_sequence<'a, TIn, TOut, I>(
    iter: I,
    traversal: Traversal,
    mapper: &MapFn<TIn, TOut>,
    ctx: &mut MapContext<'_>,
) -> Result<Vec<TOut>, MapError>
where
    TIn: 'a,
    I: Iterator<Item = &'a TIn>,
{
    let mut out = Vec::with_capacity(traversal.capacity());
    for item in iter {
        out.push(mapper(item, ctx)?);
    }
    Ok(out)
}

/// One side (keys or values) of dictionary mapping.
pub(crate) enum Pipeline<'r, TIn, TOut> {
    /// Source and target types are the same; values are cloned through.
    Passthrough,
    Mapped(&'r MapFn<TIn, TOut>),
}

impl<'r, TIn: 'static, TOut: Clone + 'static> Pipeline<'r, TIn, TOut> {
    /// Resolve once per call. Unchanged types never reach the registry.
    pub(crate) fn resolve(
        registry: &'r dyn MapperLookup,
        preserve_references: bool,
    ) -> Result<Self, MapError> {
        if TypePair::of::<TIn, TOut>().is_identity() {
            return Ok(Pipeline::Passthrough);
        }
        let definition = resolve::<TIn, TOut>(registry)?;
        Ok(Pipeline::Mapped(definition.select(preserve_references)))
    }

    pub(crate) fn apply(&self, value: &TIn, ctx: &mut MapContext<'_>) -> Result<TOut, MapError> {
        match self {
            Pipeline::Passthrough => (value as &dyn Any)
                .downcast_ref::<TOut>()
                .cloned()
                .ok_or_else(|| TypePair::of::<TIn, TOut>().mismatch()),
            Pipeline::Mapped(mapper) => mapper(value, ctx),
        }
    }
}
