//! Identity keys and the per-context reference cache.
//!
//! A key is built from the address of a shared allocation plus the source
//! and target `TypeId`s. Structurally equal values living in different
//! allocations never share a key, and one source mapped to two target
//! types gets two independent entries.

use core::any::{Any, TypeId};
use core::hash::BuildHasher;
use hashbrown::hash_table::{Entry as TableEntry, HashTable};
use std::collections::hash_map::RandomState;
use std::rc::Rc;
use std::sync::Arc;

/// Source values with reference identity.
///
/// `address` must be stable for as long as any clone produced by
/// `keepalive` is alive.
pub trait Identity: 'static {
    fn address(&self) -> usize;

    /// A clone that pins the allocation behind `address`.
    fn keepalive(&self) -> Box<dyn Any>;
}

impl<T: ?Sized + 'static> Identity for Rc<T> {
    #[inline]
    fn address(&self) -> usize {
        Rc::as_ptr(self) as *const () as usize
    }

    fn keepalive(&self) -> Box<dyn Any> {
        Box::new(Rc::clone(self))
    }
}

impl<T: ?Sized + 'static> Identity for Arc<T> {
    #[inline]
    fn address(&self) -> usize {
        Arc::as_ptr(self) as *const () as usize
    }

    fn keepalive(&self) -> Box<dyn Any> {
        Box::new(Arc::clone(self))
    }
}

/// Cache key: (source address, source type, target type).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct IdentityKey {
    address: usize,
    source: TypeId,
    target: TypeId,
}

impl IdentityKey {
    pub fn of<S: Identity, T: 'static>(source: &S) -> Self {
        IdentityKey {
            address: source.address(),
            source: TypeId::of::<S>(),
            target: TypeId::of::<T>(),
        }
    }

    pub fn address(&self) -> usize {
        self.address
    }
}

struct Slot {
    key: IdentityKey,
    hash: u64,
    target: Box<dyn Any>,
    // Keeps the source allocation alive so its address cannot be reused
    // by a different object while this entry exists.
    _source: Box<dyn Any>,
}

/// Identity map from source objects to already-produced targets.
///
/// Entries are only ever added or overwritten; the whole cache is dropped
/// with its owning context.
pub struct IdentityCache<S = RandomState> {
    hasher: S,
    table: HashTable<Slot>,
}

impl IdentityCache {
    pub fn new() -> Self {
        Self::with_hasher(RandomState::new())
    }
}

impl Default for IdentityCache {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: BuildHasher> IdentityCache<S> {
    pub fn with_hasher(hasher: S) -> Self {
        Self {
            hasher,
            table: HashTable::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Store `target` for `source`, overwriting any previous entry for the
    /// same key. Returns true if an entry was replaced.
    pub fn insert<Src: Identity, T: Any>(&mut self, source: &Src, target: T) -> bool {
        let key = IdentityKey::of::<Src, T>(source);
        let hash = self.hasher.hash_one(key);
        let target: Box<dyn Any> = Box::new(target);
        match self
            .table
            .entry(hash, |slot| slot.key == key, |slot| slot.hash)
        {
            TableEntry::Occupied(mut occupied) => {
                // Last write wins; the original keepalive is still valid
                // because the address matched.
                occupied.get_mut().target = target;
                true
            }
            TableEntry::Vacant(vacant) => {
                vacant.insert(Slot {
                    key,
                    hash,
                    target,
                    _source: source.keepalive(),
                });
                false
            }
        }
    }

    /// Clone of the target cached for `source` as a `T`, if any.
    pub fn get<Src: Identity, T: Any + Clone>(&self, source: &Src) -> Option<T> {
        let key = IdentityKey::of::<Src, T>(source);
        let hash = self.hasher.hash_one(key);
        self.table
            .find(hash, |slot| slot.key == key)
            .and_then(|slot| slot.target.downcast_ref::<T>())
            .cloned()
    }

    pub fn contains<Src: Identity, T: Any>(&self, source: &Src) -> bool {
        let key = IdentityKey::of::<Src, T>(source);
        let hash = self.hasher.hash_one(key);
        self.table.find(hash, |slot| slot.key == key).is_some()
    }
}

impl<S> core::fmt::Debug for IdentityCache<S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("IdentityCache")
            .field("len", &self.table.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::hash::Hasher;

    #[derive(Debug, PartialEq, Eq, Clone)]
    struct Point {
        x: i32,
    }

    /// Invariant: structurally equal values in distinct allocations get
    /// distinct keys; clones of one `Rc` share a key.
    #[test]
    fn keys_follow_allocation_not_value() {
        let a = Rc::new(Point { x: 1 });
        let b = Rc::new(Point { x: 1 });
        let a2 = Rc::clone(&a);
        assert_eq!(*a, *b);
        assert_ne!(
            IdentityKey::of::<_, String>(&a),
            IdentityKey::of::<_, String>(&b)
        );
        assert_eq!(
            IdentityKey::of::<_, String>(&a),
            IdentityKey::of::<_, String>(&a2)
        );
    }

    /// Invariant: the same source mapped to two target types yields two keys.
    #[test]
    fn target_type_is_part_of_the_key() {
        let a = Rc::new(Point { x: 1 });
        let k1 = IdentityKey::of::<_, String>(&a);
        let k2 = IdentityKey::of::<_, i64>(&a);
        assert_eq!(k1.address(), k2.address());
        assert_ne!(k1, k2);
    }

    /// Invariant: `Rc<T>` and `Arc<T>` handles are distinct source types.
    #[test]
    fn source_type_is_part_of_the_key() {
        let r = Rc::new(7u32);
        let a = Arc::new(7u32);
        let kr = IdentityKey::of::<_, u64>(&r);
        let ka = IdentityKey::of::<_, u64>(&a);
        assert_ne!(kr, ka);
    }

    /// Invariant: insert overwrites silently (last write wins) and lookups
    /// are typed on the target.
    #[test]
    fn insert_overwrites_and_get_is_typed() {
        let mut cache = IdentityCache::new();
        let src = Rc::new(Point { x: 3 });

        assert!(!cache.insert(&src, "first".to_string()));
        assert!(cache.insert(&src, "second".to_string()));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get::<_, String>(&src), Some("second".to_string()));

        // Same source, other target type: independent.
        assert_eq!(cache.get::<_, i64>(&src), None);
        cache.insert(&src, 42i64);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get::<_, i64>(&src), Some(42));
        assert_eq!(cache.get::<_, String>(&src), Some("second".to_string()));
    }

    /// Invariant: the cache keeps the source allocation alive, so a dropped
    /// caller handle cannot let a new allocation alias the cached address.
    #[test]
    fn entries_pin_their_source() {
        let mut cache = IdentityCache::new();
        let src = Rc::new(Point { x: 9 });
        let weak = Rc::downgrade(&src);
        cache.insert(&src, 1u8);
        drop(src);
        assert!(weak.upgrade().is_some(), "cache must keep source alive");
        drop(cache);
        assert!(weak.upgrade().is_none(), "dropping cache releases source");
    }

    /// Invariant: lookups resolve by key equality even when every key
    /// lands in the same bucket.
    #[test]
    fn collision_handling_with_const_hasher() {
        #[derive(Clone, Default)]
        struct ConstBuildHasher;
        struct ConstHasher;
        impl BuildHasher for ConstBuildHasher {
            type Hasher = ConstHasher;
            fn build_hasher(&self) -> Self::Hasher {
                ConstHasher
            }
        }
        impl Hasher for ConstHasher {
            fn write(&mut self, _bytes: &[u8]) {}
            fn finish(&self) -> u64 {
                0
            }
        }

        let mut cache = IdentityCache::with_hasher(ConstBuildHasher);
        let a = Rc::new(Point { x: 1 });
        let b = Rc::new(Point { x: 2 });
        cache.insert(&a, "a".to_string());
        cache.insert(&b, "b".to_string());
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get::<_, String>(&a).as_deref(), Some("a"));
        assert_eq!(cache.get::<_, String>(&b).as_deref(), Some("b"));
        assert!(cache.contains::<_, String>(&a));
        assert!(!cache.contains::<_, u8>(&a));
    }
}
