//! rc-mapper: object-graph mapping driven by a type-pair registry, with
//! optional reference preservation scoped to one mapping operation.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: map a materialized source graph (structs, `Rc`/`Arc` shared
//!   nodes, sequences, dictionaries) into a target graph, reusing one
//!   mapper per (source type, target type) pair.
//! - Layers:
//!   - `IdentityCache`: address + source `TypeId` + target `TypeId` keyed
//!     store of already-produced targets. Entries pin their source so an
//!     address is never reused while cached.
//!   - `MapDefinition<TIn, TOut>`: a plain mapper and a cache-aware mapper
//!     with the same signature. `two_phase` builds both from a shell
//!     constructor and a populate step.
//!   - `MapperLookup` / `MapRegistry`: read-only after configuration;
//!     shared by any number of contexts.
//!   - `MapContext`: per-operation orchestrator. Owns the cache and the
//!     `preserve_references` flag and exposes `map`, `map_value`,
//!     `map_to_list`, `map_to_collection`, `map_to_array`,
//!     `map_to_dictionary`.
//!
//! Constraints
//! - Synchronous and single-threaded per call; mappers recurse through the
//!   same `&mut MapContext`, so identity preservation spans the whole call
//!   tree.
//! - The cache belongs to one context and is dropped with it. There is no
//!   global or pooled cache.
//! - Mappers are resolved once per container call, never per element.
//! - Fail-fast: the first error aborts the enclosing call; no partial
//!   containers are returned.
//!
//! Absent vs empty
//! - `None` is the absent sentinel. Absent input maps to absent output
//!   without touching the registry; an empty container maps to an empty,
//!   present container.
//!
//! Cycles
//! - Cache-aware mappers register the target shell before populating its
//!   fields. A reference leading back to a source already in progress then
//!   resolves to the shell. Targets of a cycle need interior mutability
//!   (`RefCell`, `OnceCell`) so fields can be filled after allocation.
//! - With `preserve_references` off nothing is cached and a cyclic source
//!   recurses without bound; avoiding that is the caller's job.
//!
//! Notes and non-goals
//! - Mapper bodies are written by the caller; nothing here derives field
//!   copies from type layouts.
//! - No validation of registry completeness up front; a missing pair is
//!   reported when first needed.

mod container;
mod context;
mod definition;
mod error;
mod identity;
mod options;
mod registry;

// Public surface
pub use context::MapContext;
pub use definition::{MapDefinition, MapFn, TypePair};
pub use error::MapError;
pub use identity::{Identity, IdentityCache, IdentityKey};
pub use indexmap::IndexMap;
pub use options::MapOptions;
pub use registry::{resolve, MapRegistry, MapperLookup};
