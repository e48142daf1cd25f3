//! The accessor cache.
//!
//! Maps a (descriptor, call shape) key to the outcome of compiling it. The
//! map itself sits behind a `parking_lot::RwLock`; each entry is an
//! `Arc<OnceLock<..>>` slot, so compilation runs outside the map lock and
//! `OnceLock::get_or_init` makes exactly one caller compile while the others
//! wait on that slot alone. Readers of populated keys take only the read
//! lock and never wait on another key's compilation.
//!
//! Contract failures are cached like successes: they are deterministic
//! functions of the key. Entries are never evicted.

use std::any::{type_name, Any};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use hotcall_meta::{MemberDescriptor, MemberId};
use parking_lot::RwLock;
use rustc_hash::{FxBuildHasher, FxHashMap};
use tracing::trace;

use crate::error::{CompileResult, ContractError};
use crate::shape::{Family, ShapeId};

/// Identity of one compiled accessor.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    registry: u64,
    member: MemberId,
    shape: ShapeId,
    allow_non_public: bool,
}

impl CacheKey {
    /// Key for compiling `member` into the accessor type `A`.
    pub fn of<A: 'static>(
        member: &MemberDescriptor,
        family: Family,
        allow_non_public: bool,
    ) -> Self {
        let (registry, member) = member.key();
        CacheKey {
            registry,
            member,
            shape: ShapeId::of::<A>(family),
            allow_non_public,
        }
    }

    pub fn shape(&self) -> ShapeId {
        self.shape
    }
}

type Entry = CompileResult<Arc<dyn Any + Send + Sync>>;
type Slot = Arc<OnceLock<Entry>>;

/// Counters observed since the cache was created.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub compilations: u64,
}

pub struct AccessorCache {
    slots: RwLock<FxHashMap<CacheKey, Slot>>,
    hits: AtomicU64,
    misses: AtomicU64,
    compilations: AtomicU64,
}

impl AccessorCache {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        AccessorCache {
            slots: RwLock::new(FxHashMap::with_capacity_and_hasher(
                capacity,
                FxBuildHasher,
            )),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            compilations: AtomicU64::new(0),
        }
    }

    /// Return the accessor `A` compiled from `member`, running `compile` if
    /// this is the first request. Concurrent first requests for the same
    /// key run `compile` once; every caller gets that one outcome.
    ///
    /// The key is derived from `A` here, so an entry can only ever be read
    /// back as the type it was stored as.
    pub fn get_or_compile<A, F>(
        &self,
        member: &MemberDescriptor,
        family: Family,
        allow_non_public: bool,
        compile: F,
    ) -> CompileResult<A>
    where
        A: Clone + Send + Sync + 'static,
        F: FnOnce() -> CompileResult<A>,
    {
        let key = CacheKey::of::<A>(member, family, allow_non_public);
        let slot = self.slot(key);
        let mut compiled_here = false;
        let entry = slot.get_or_init(|| {
            compiled_here = true;
            self.compilations.fetch_add(1, Ordering::Relaxed);
            compile().map(|accessor| Arc::new(accessor) as Arc<dyn Any + Send + Sync>)
        });
        if !compiled_here {
            trace!(shape = ?key.shape, member = key.member.0, "accessor cache hit");
        }
        match entry {
            Ok(accessor) => Ok(downcast::<A>(accessor).clone()),
            Err(err) => Err(err.clone()),
        }
    }

    /// The slot for `key`, inserting an empty one on first request.
    fn slot(&self, key: CacheKey) -> Slot {
        if let Some(slot) = self.slots.read().get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return slot.clone();
        }
        let mut slots = self.slots.write();
        // Another thread may have inserted between the two locks.
        if let Some(slot) = slots.get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return slot.clone();
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        slots.entry(key).or_default().clone()
    }

    /// Whether `key` has a finished entry, successful or not.
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.slots
            .read()
            .get(key)
            .is_some_and(|slot| slot.get().is_some())
    }

    /// The cached contract failure for `key`, if compiling it failed.
    pub fn failure(&self, key: &CacheKey) -> Option<ContractError> {
        self.slots
            .read()
            .get(key)
            .and_then(|slot| slot.get().and_then(|entry| entry.as_ref().err().cloned()))
    }

    pub fn len(&self) -> usize {
        self.slots.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            compilations: self.compilations.load(Ordering::Relaxed),
        }
    }
}

impl Default for AccessorCache {
    fn default() -> Self {
        Self::new()
    }
}

/// `get_or_compile` keys every entry by `TypeId::of::<A>()`, so an entry
/// always holds an `A`.
fn downcast<A: 'static>(accessor: &Arc<dyn Any + Send + Sync>) -> &A {
    accessor
        .downcast_ref::<A>()
        .unwrap_or_else(|| panic!("cache entry is not a {}", type_name::<A>()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hotcall_meta::{TyId, TypeRegistry, Value};
    use std::sync::Barrier;
    use std::thread;

    #[derive(Clone)]
    struct Token(Arc<u32>);

    fn member() -> MemberDescriptor {
        let mut types = TypeRegistry::new();
        let calc = types.define_class("Calc", None, &[]).unwrap();
        types
            .method(calc, "add", &[TyId::INT, TyId::INT], TyId::INT, |_, _| {
                Ok(Value::Null)
            })
            .unwrap()
    }

    #[test]
    fn repeated_requests_compile_once() {
        let cache = AccessorCache::new();
        let member = member();

        let first = cache
            .get_or_compile(&member, Family::Method, false, || Ok(Token(Arc::new(1))))
            .unwrap();
        for _ in 0..5 {
            let again: Token = cache
                .get_or_compile(&member, Family::Method, false, || {
                    panic!("recompiled a cached key")
                })
                .unwrap();
            assert!(Arc::ptr_eq(&first.0, &again.0));
        }

        let stats = cache.stats();
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.compilations, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 5);
    }

    #[test]
    fn failures_are_cached() {
        let cache = AccessorCache::new();
        let member = member();
        let key = CacheKey::of::<Token>(&member, Family::Method, false);
        let err = ContractError::UnsupportedArity { arity: 12, max: 9 };

        let first =
            cache.get_or_compile::<Token, _>(&member, Family::Method, false, || Err(err.clone()));
        let second = cache.get_or_compile::<Token, _>(&member, Family::Method, false, || {
            Ok(Token(Arc::new(0)))
        });
        assert_eq!(first.err(), Some(err.clone()));
        assert_eq!(second.err(), Some(err.clone()));
        assert_eq!(cache.failure(&key), Some(err));
        assert_eq!(cache.stats().compilations, 1);
    }

    #[test]
    fn distinct_shapes_are_distinct_entries() {
        #[derive(Clone)]
        struct Other;
        let cache = AccessorCache::new();
        let member = member();
        let a = CacheKey::of::<Token>(&member, Family::Method, false);
        let b = CacheKey::of::<Other>(&member, Family::Method, false);
        let c = CacheKey::of::<Token>(&member, Family::Method, true);

        for allow in [false, true] {
            cache
                .get_or_compile(&member, Family::Method, allow, || Ok(Token(Arc::new(0))))
                .unwrap();
        }
        cache
            .get_or_compile(&member, Family::Method, false, || Ok(Other))
            .unwrap();
        assert_eq!(cache.len(), 3);
        assert!(cache.contains(&a) && cache.contains(&b) && cache.contains(&c));
    }

    #[test]
    fn different_accessor_types_never_share_an_entry() {
        #[derive(Clone, Debug, PartialEq)]
        struct Other(u32);
        let cache = AccessorCache::new();
        let member = member();

        let token: Token = cache
            .get_or_compile(&member, Family::Method, false, || Ok(Token(Arc::new(7))))
            .unwrap();
        let other: Other = cache
            .get_or_compile(&member, Family::Method, false, || Ok(Other(9)))
            .unwrap();
        assert_eq!(*token.0, 7);
        assert_eq!(other, Other(9));
        assert_eq!(cache.stats().compilations, 2);
    }

    #[test]
    fn concurrent_first_requests_share_one_compilation() {
        const THREADS: usize = 16;
        let cache = Arc::new(AccessorCache::new());
        let member = member();
        let barrier = Arc::new(Barrier::new(THREADS));

        let handles: Vec<_> = (0..THREADS)
            .map(|i| {
                let cache = cache.clone();
                let barrier = barrier.clone();
                let member = member.clone();
                thread::spawn(move || {
                    barrier.wait();
                    cache
                        .get_or_compile(&member, Family::Method, false, || {
                            thread::sleep(std::time::Duration::from_millis(5));
                            Ok(Token(Arc::new(i as u32)))
                        })
                        .unwrap()
                })
            })
            .collect();
        let tokens: Vec<Token> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(cache.stats().compilations, 1);
        assert!(tokens.iter().all(|t| Arc::ptr_eq(&t.0, &tokens[0].0)));
    }
}
