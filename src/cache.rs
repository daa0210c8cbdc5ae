//! A fixed-capacity memoization cache for pure operations, with LRU
//! eviction.
//!
//! The cache composes the fixed-mode chained hash table (probe/commit), the
//! slot pool (entry storage) and the intrusive LRU list (eviction order).
//! All the memory it will ever use is allocated at construction: the bucket
//! array is sized so the configured capacity stays inside the load-factor
//! ceiling, so the table can never rehash, and the pool holds exactly
//! `capacity` entry slots.

use std::cell::RefCell;
use std::hash::Hash;

use serde::{Deserialize, Serialize};

use crate::hash::u64hash;
use crate::hash_table::{ChainedTable, Links};
use crate::lru::{LruLinks, LruList};
use crate::pool::Pool;

/// the wanted load factor for the underlying hash table
const MAX_LOAD_FACTOR: f64 = 0.85;

/// A memoizable operation: a value carrying the inputs of a pure
/// computation, usable as a cache key.
///
/// `apply` must be pure with respect to operations comparing equal, and
/// equality and hashing must agree. The context is opaque to the cache and
/// handed through on invocation; it typically gives the operation access to
/// a unification table and to the cache itself, so that sub-operations are
/// memoized recursively.
pub trait Operation: Eq + Hash {
    type Context;
    type Output: Clone;
    type Error;

    fn apply(&self, cxt: &Self::Context) -> Result<Self::Output, Self::Error>;
}

/// Gate deciding whether an operation is worth remembering. Filters must be
/// pure: an operation has to get the same verdict for the whole program run,
/// or cached and uncached results diverge.
pub type Filter<O> = fn(&O) -> bool;

/// statistics snapshot of an operation cache
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    /// number of entries currently stored
    pub size: usize,
    /// lookups answered from the cache
    pub hits: usize,
    /// lookups that had to evaluate their operation
    pub misses: usize,
    /// operations rejected by a filter and evaluated directly
    pub filtered: usize,
    /// entries evicted by the LRU policy
    pub discarded: usize,
    /// buckets holding two or more entries
    pub collisions: usize,
    /// buckets holding exactly one entry
    pub alone: usize,
    /// empty buckets
    pub empty: usize,
    pub buckets: usize,
    pub load_factor: f64,
}

/// An operation with its memoized result. The stored hash is the
/// operation's, so probes by bare operation land on the entry; everything
/// but the links is immutable once built.
struct Entry<O: Operation> {
    op: O,
    result: O::Output,
    hash: u64,
    next: Option<u32>,
    lru_prev: Option<u32>,
    lru_next: Option<u32>,
}

impl<O: Operation> Links for Pool<Entry<O>> {
    fn next(&self, idx: u32) -> Option<u32> {
        self.get(idx).next
    }

    fn set_next(&mut self, idx: u32, next: Option<u32>) {
        self.get_mut(idx).next = next;
    }

    fn hash(&self, idx: u32) -> u64 {
        self.get(idx).hash
    }
}

impl<O: Operation> LruLinks for Pool<Entry<O>> {
    fn lru_prev(&self, idx: u32) -> Option<u32> {
        self.get(idx).lru_prev
    }

    fn lru_next(&self, idx: u32) -> Option<u32> {
        self.get(idx).lru_next
    }

    fn set_lru_prev(&mut self, idx: u32, prev: Option<u32>) {
        self.get_mut(idx).lru_prev = prev;
    }

    fn set_lru_next(&mut self, idx: u32, next: Option<u32>) {
        self.get_mut(idx).lru_next = next;
    }
}

struct CacheInner<O: Operation> {
    set: ChainedTable,
    pool: Pool<Entry<O>>,
    lru: LruList,
    hits: usize,
    misses: usize,
    filtered: usize,
    discarded: usize,
}

/// A fixed-capacity cache mapping operations to their results.
///
/// When full, the least recently used entry makes room for the next new
/// one. Lookups take `&self`, so an operation being evaluated may recurse
/// into the very cache that invoked it.
pub struct Cache<O: Operation> {
    inner: RefCell<CacheInner<O>>,
    filters: Box<[Filter<O>]>,
    max_size: usize,
}

impl<O: Operation> Cache<O> {
    /// A cache remembering up to `capacity` operations.
    pub fn new(capacity: usize) -> Cache<O> {
        Cache::with_filters(capacity, Vec::new())
    }

    /// A cache whose operations are gated by `filters`, applied in order.
    /// An operation rejected by any filter is evaluated directly and never
    /// stored.
    pub fn with_filters(capacity: usize, filters: Vec<Filter<O>>) -> Cache<O> {
        assert!(capacity > 0, "cache of zero entries");
        // Buckets sized so `capacity` entries stay inside the load-factor
        // ceiling: the table cannot rehash.
        let buckets = (capacity as f64 / MAX_LOAD_FACTOR).ceil() as usize;
        Cache {
            inner: RefCell::new(CacheInner {
                set: ChainedTable::fixed(buckets, MAX_LOAD_FACTOR),
                pool: Pool::new(capacity),
                lru: LruList::new(),
                hits: 0,
                misses: 0,
                filtered: 0,
                discarded: 0,
            }),
            filters: filters.into_boxed_slice(),
            max_size: capacity,
        }
    }

    /// Look up `op`, evaluating it at most once.
    ///
    /// Filtered-out operations are evaluated directly and leave the cache
    /// untouched. A hit returns the stored result and promotes its entry to
    /// most recently used. A miss evaluates the operation — a failure
    /// propagates with no cache change beyond the `misses` count — then
    /// stores the result, evicting the oldest entry if the cache is full.
    pub fn apply(&self, cxt: &O::Context, op: O) -> Result<O::Output, O::Error> {
        if !self.filters.iter().all(|accept| accept(&op)) {
            self.inner.borrow_mut().filtered += 1;
            return op.apply(cxt);
        }

        let hash = u64hash(&op);
        let slot = {
            let mut guard = self.inner.borrow_mut();
            let inner = &mut *guard;
            match inner
                .set
                .insert_check(&inner.pool, hash, |pool, idx| pool.get(idx).op == op)
            {
                Ok(found) => {
                    inner.hits += 1;
                    inner.lru.move_to_back(&mut inner.pool, found);
                    return Ok(inner.pool.get(found).result.clone());
                }
                Err(slot) => {
                    inner.misses += 1;
                    slot
                }
            }
        };

        // Evaluation may fail, and may recurse into this cache: the borrow
        // is released while it runs. The bucket captured above stays valid
        // because a fixed table never moves its buckets, and the commit
        // below re-walks the chain.
        let result = op.apply(cxt)?;

        let mut guard = self.inner.borrow_mut();
        let inner = &mut *guard;
        if inner.set.len() == self.max_size {
            let oldest = inner
                .lru
                .front()
                .expect("full cache with an empty LRU list");
            let old_hash = inner.pool.get(oldest).hash;
            inner.set.erase(&mut inner.pool, old_hash, oldest);
            inner.lru.pop_front(&mut inner.pool);
            inner.pool.free(oldest);
            inner.discarded += 1;
        }
        let idx = inner.pool.allocate(Entry {
            op,
            result: result.clone(),
            hash,
            next: None,
            lru_prev: None,
            lru_next: None,
        });
        inner.lru.push_back(&mut inner.pool, idx);
        inner.set.insert_commit(&mut inner.pool, slot, idx);
        Ok(result)
    }

    /// Drop every entry. Statistics are kept.
    pub fn clear(&self) {
        let mut guard = self.inner.borrow_mut();
        let inner = &mut *guard;
        inner.set.clear_and_dispose(&mut inner.pool, |pool, idx| {
            pool.free(idx);
        });
        inner.lru.clear();
    }

    /// number of entries currently stored
    pub fn len(&self) -> usize {
        self.inner.borrow().set.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// how many entries this cache can hold
    pub fn capacity(&self) -> usize {
        self.max_size
    }

    pub fn statistics(&self) -> CacheStats {
        let inner = self.inner.borrow();
        let (collisions, alone, empty) = inner.set.collisions(&inner.pool);
        CacheStats {
            size: inner.set.len(),
            hits: inner.hits,
            misses: inner.misses,
            filtered: inner.filtered,
            discarded: inner.discarded,
            collisions,
            alone,
            empty,
            buckets: inner.set.bucket_count(),
            load_factor: inner.set.load_factor(),
        }
    }
}
