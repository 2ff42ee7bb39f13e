//! Error type shared by the registry, the context and user mappers.

use thiserror::Error;

/// Errors raised while mapping a value graph.
///
/// Every variant aborts the enclosing top-level call; the context never
/// returns a partially built container.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MapError {
    /// No definition is registered for the requested type pair.
    #[error("no mapping configured from {source_type} to {target_type}")]
    MappingNotConfigured {
        source_type: &'static str,
        target_type: &'static str,
    },

    /// Two source entries produced the same output key.
    #[error("duplicate {key_type} key produced by source entry {index}")]
    DuplicateKey {
        key_type: &'static str,
        /// Position of the offending entry in source iteration order.
        index: usize,
    },

    /// The lookup returned a definition for a different type pair.
    #[error("definition registered for {source_type} -> {target_type} has the wrong type")]
    DefinitionMismatch {
        source_type: &'static str,
        target_type: &'static str,
    },

    /// A mapper function reported a failure of its own.
    #[error("mapping {source_type} to {target_type} failed: {message}")]
    Mapper {
        source_type: &'static str,
        target_type: &'static str,
        message: String,
    },
}

impl MapError {
    pub fn not_configured<TIn: ?Sized, TOut: ?Sized>() -> Self {
        MapError::MappingNotConfigured {
            source_type: core::any::type_name::<TIn>(),
            target_type: core::any::type_name::<TOut>(),
        }
    }

    /// Build a `Mapper` error for the `TIn -> TOut` pair.
    pub fn mapper<TIn: ?Sized, TOut: ?Sized>(message: impl Into<String>) -> Self {
        MapError::Mapper {
            source_type: core::any::type_name::<TIn>(),
            target_type: core::any::type_name::<TOut>(),
            message: message.into(),
        }
    }

    pub fn is_not_configured(&self) -> bool {
        matches!(self, MapError::MappingNotConfigured { .. })
    }

    pub fn is_duplicate_key(&self) -> bool {
        matches!(self, MapError::DuplicateKey { .. })
    }
}
