//! An intrusive chained hash table over externally stored elements.
//!
//! Elements live in a slot store (the cache's pool or the unification
//! table's node arena) and are identified by `u32` indices; the table keeps
//! only the bucket heads and walks chains through each element's embedded
//! `next` link, reached via the [`Links`] trait. Collisions resolve by
//! chaining. Two modes are picked at construction: a fixed table that never
//! rehashes (all memory up front, used by the operation cache) and a growing
//! table that doubles its buckets when the load factor is breached (used by
//! the unification table).

/// Chain-link access into the slot store backing a table.
///
/// `hash` returns the hash stored with the element; it must equal the hash
/// the element was inserted under, or probes and erases will scan the wrong
/// bucket.
pub(crate) trait Links {
    fn next(&self, idx: u32) -> Option<u32>;
    fn set_next(&mut self, idx: u32, next: Option<u32>);
    fn hash(&self, idx: u32) -> u64;
}

/// Token produced by a fixed-mode probe, naming the bucket a later
/// [`ChainedTable::insert_commit`] will append to.
pub(crate) struct InsertSlot {
    bucket: usize,
}

/// default load-factor ceiling of a growing table
pub(crate) const DEFAULT_MAX_LOAD: f64 = 0.75;

pub(crate) struct ChainedTable {
    /// chain heads; length is always a power of two
    buckets: Box<[Option<u32>]>,
    len: usize,
    max_load: f64,
    grows: bool,
    rehashes: usize,
}

impl ChainedTable {
    /// A table that allocates all its buckets up front and never rehashes.
    pub fn fixed(capacity: usize, max_load: f64) -> ChainedTable {
        ChainedTable::with_mode(capacity, max_load, false)
    }

    /// A table that doubles its buckets whenever the load factor reaches
    /// `max_load`.
    pub fn growing(capacity: usize, max_load: f64) -> ChainedTable {
        ChainedTable::with_mode(capacity, max_load, true)
    }

    fn with_mode(capacity: usize, max_load: f64, grows: bool) -> ChainedTable {
        let nb_buckets = capacity.max(1).next_power_of_two();
        ChainedTable {
            buckets: vec![None; nb_buckets].into_boxed_slice(),
            len: 0,
            max_load,
            grows,
            rehashes: 0,
        }
    }

    #[inline]
    fn bucket_of(&self, hash: u64) -> usize {
        (hash as usize) & (self.buckets.len() - 1)
    }

    /// Fixed-mode probe: scan the chain of `hash` for an element `eq`
    /// accepts. Returns the element on a hit, otherwise a token for
    /// [`ChainedTable::insert_commit`]. Mutates nothing.
    pub fn insert_check<S: Links>(
        &self,
        store: &S,
        hash: u64,
        mut eq: impl FnMut(&S, u32) -> bool,
    ) -> Result<u32, InsertSlot> {
        debug_assert!(!self.grows, "probe-and-commit is for fixed tables");
        let bucket = self.bucket_of(hash);
        let mut current = self.buckets[bucket];
        while let Some(idx) = current {
            if eq(store, idx) {
                return Ok(idx);
            }
            current = store.next(idx);
        }
        Err(InsertSlot { bucket })
    }

    /// Fixed-mode commit: append `idx` at the tail of the chain captured by
    /// `slot`. Infallible. Appending keeps per-bucket insertion order and
    /// measures faster than head insertion under the cache's access pattern.
    pub fn insert_commit<S: Links>(&mut self, store: &mut S, slot: InsertSlot, idx: u32) {
        debug_assert!(!self.grows, "probe-and-commit is for fixed tables");
        store.set_next(idx, None);
        match self.buckets[slot.bucket] {
            None => self.buckets[slot.bucket] = Some(idx),
            Some(head) => {
                let mut tail = head;
                while let Some(next) = store.next(tail) {
                    tail = next;
                }
                store.set_next(tail, Some(idx));
            }
        }
        self.len += 1;
    }

    /// Growing-mode probe-or-insert in a single chain scan. On a miss,
    /// `alloc` stores `key` and the new element is pushed at the head of its
    /// bucket, after which the table rehashes if the load factor reached its
    /// ceiling. On a hit, `key` is handed back so the caller can recycle it.
    pub fn insert_or_get<S: Links, K>(
        &mut self,
        store: &mut S,
        hash: u64,
        key: K,
        eq: impl Fn(&S, u32, &K) -> bool,
        alloc: impl FnOnce(&mut S, K) -> u32,
    ) -> (u32, Option<K>) {
        debug_assert!(self.grows, "probe-or-insert is for growing tables");
        let bucket = self.bucket_of(hash);
        let mut current = self.buckets[bucket];
        while let Some(idx) = current {
            if eq(&*store, idx, &key) {
                return (idx, Some(key));
            }
            current = store.next(idx);
        }
        let idx = alloc(store, key);
        store.set_next(idx, self.buckets[bucket]);
        self.buckets[bucket] = Some(idx);
        self.len += 1;
        if self.load_factor() >= self.max_load {
            self.rehash(store);
        }
        (idx, None)
    }

    /// Double the bucket array and relink every element by its stored hash.
    /// Only links move; element bodies and outstanding indices stay put.
    fn rehash<S: Links>(&mut self, store: &mut S) {
        self.rehashes += 1;
        let nb_buckets = self.buckets.len() * 2;
        let old = std::mem::replace(&mut self.buckets, vec![None; nb_buckets].into_boxed_slice());
        for head in old.iter() {
            let mut current = *head;
            while let Some(idx) = current {
                current = store.next(idx);
                let bucket = self.bucket_of(store.hash(idx));
                store.set_next(idx, self.buckets[bucket]);
                self.buckets[bucket] = Some(idx);
            }
        }
    }

    /// Unlink `idx` from the chain of `hash`, in O(chain length). The
    /// element must be present.
    pub fn erase<S: Links>(&mut self, store: &mut S, hash: u64, idx: u32) {
        let bucket = self.bucket_of(hash);
        let mut previous: Option<u32> = None;
        let mut current = self.buckets[bucket];
        while let Some(i) = current {
            if i == idx {
                let next = store.next(i);
                match previous {
                    None => self.buckets[bucket] = next,
                    Some(p) => store.set_next(p, next),
                }
                store.set_next(i, None);
                self.len -= 1;
                return;
            }
            previous = current;
            current = store.next(i);
        }
        debug_assert!(false, "element to erase not found");
    }

    /// Dispose every element and reset all buckets. `dispose` is expected to
    /// destruct the element and release its slot.
    pub fn clear_and_dispose<S: Links>(
        &mut self,
        store: &mut S,
        mut dispose: impl FnMut(&mut S, u32),
    ) {
        for b in 0..self.buckets.len() {
            let mut current = self.buckets[b];
            while let Some(idx) = current {
                current = store.next(idx);
                dispose(store, idx);
            }
            self.buckets[b] = None;
        }
        self.len = 0;
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    #[inline]
    pub fn rehashes(&self) -> usize {
        self.rehashes
    }

    pub fn load_factor(&self) -> f64 {
        self.len as f64 / self.buckets.len() as f64
    }

    /// Bucket occupancy histogram, by scanning: (buckets holding two or
    /// more elements, buckets holding exactly one, empty buckets).
    pub fn collisions<S: Links>(&self, store: &S) -> (usize, usize, usize) {
        let mut multi = 0;
        let mut alone = 0;
        let mut empty = 0;
        for head in self.buckets.iter() {
            let mut nb = 0;
            let mut current = *head;
            while let Some(idx) = current {
                nb += 1;
                current = store.next(idx);
            }
            match nb {
                0 => empty += 1,
                1 => alone += 1,
                _ => multi += 1,
            }
        }
        (multi, alone, empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::u64hash;

    struct Elem {
        key: u64,
        hash: u64,
        next: Option<u32>,
    }

    /// minimal slot store for exercising the table on its own
    struct Store(Vec<Elem>);

    impl Store {
        fn new() -> Store {
            Store(Vec::new())
        }

        fn add(&mut self, key: u64, hash: u64) -> u32 {
            self.0.push(Elem {
                key,
                hash,
                next: None,
            });
            (self.0.len() - 1) as u32
        }

        fn key(&self, idx: u32) -> u64 {
            self.0[idx as usize].key
        }
    }

    impl Links for Store {
        fn next(&self, idx: u32) -> Option<u32> {
            self.0[idx as usize].next
        }

        fn set_next(&mut self, idx: u32, next: Option<u32>) {
            self.0[idx as usize].next = next;
        }

        fn hash(&self, idx: u32) -> u64 {
            self.0[idx as usize].hash
        }
    }

    fn fixed_insert(table: &mut ChainedTable, store: &mut Store, key: u64) -> u32 {
        let hash = u64hash(&key);
        match table.insert_check(&*store, hash, |s, i| s.key(i) == key) {
            Ok(found) => found,
            Err(slot) => {
                let idx = store.add(key, hash);
                table.insert_commit(store, slot, idx);
                idx
            }
        }
    }

    #[test]
    fn fixed_probe_and_commit() {
        let mut table = ChainedTable::fixed(16, 0.85);
        let mut store = Store::new();
        let a = fixed_insert(&mut table, &mut store, 1);
        let b = fixed_insert(&mut table, &mut store, 2);
        assert_ne!(a, b);
        assert_eq!(table.len(), 2);
        // probing an existing key finds it without inserting
        let again = fixed_insert(&mut table, &mut store, 1);
        assert_eq!(a, again);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn fixed_table_never_reallocates() {
        let cap = 32;
        let mut table = ChainedTable::fixed(cap, 0.85);
        let mut store = Store::new();
        let buckets = table.bucket_count();
        let mut indices = Vec::new();
        for k in 0..cap as u64 {
            indices.push(fixed_insert(&mut table, &mut store, k));
        }
        for (k, idx) in indices.iter().enumerate() {
            table.erase(&mut store, u64hash(&(k as u64)), *idx);
        }
        assert_eq!(table.bucket_count(), buckets);
        assert_eq!(table.rehashes(), 0);
        assert_eq!(table.len(), 0);
    }

    #[test]
    fn tail_append_keeps_bucket_order() {
        // every element hashes to the same bucket
        let mut table = ChainedTable::fixed(8, 0.85);
        let mut store = Store::new();
        for k in 0..4u64 {
            let slot = match table.insert_check(&store, 7, |s, i| s.key(i) == k) {
                Err(slot) => slot,
                Ok(_) => unreachable!("duplicate in adversarial insert"),
            };
            let idx = store.add(k, 7);
            table.insert_commit(&mut store, slot, idx);
        }
        let (multi, alone, empty) = table.collisions(&store);
        assert_eq!((multi, alone), (1, 0));
        assert_eq!(empty, table.bucket_count() - 1);
        // walk the single chain and check insertion order survived
        let head = table.buckets.iter().find_map(|h| *h).unwrap();
        let mut seen = vec![store.key(head)];
        let mut current = store.next(head);
        while let Some(idx) = current {
            seen.push(store.key(idx));
            current = store.next(idx);
        }
        assert_eq!(seen, vec![0, 1, 2, 3]);
    }

    #[test]
    fn erase_unlinks_anywhere_in_chain() {
        let mut table = ChainedTable::fixed(4, 0.85);
        let mut store = Store::new();
        // same bucket for all three
        let mut indices = Vec::new();
        for k in 0..3u64 {
            let slot = table
                .insert_check(&store, 5, |s, i| s.key(i) == k)
                .unwrap_err();
            let idx = store.add(k, 5);
            table.insert_commit(&mut store, slot, idx);
            indices.push(idx);
        }
        // middle, then tail, then head
        table.erase(&mut store, 5, indices[1]);
        assert_eq!(table.len(), 2);
        table.erase(&mut store, 5, indices[2]);
        table.erase(&mut store, 5, indices[0]);
        assert_eq!(table.len(), 0);
        let (multi, alone, _) = table.collisions(&store);
        assert_eq!((multi, alone), (0, 0));
    }

    #[test]
    fn growing_table_rehashes_and_stays_consistent() {
        let initial = 8;
        let mut table = ChainedTable::growing(initial, DEFAULT_MAX_LOAD);
        let mut store = Store::new();
        let count = 64u64;
        for k in 0..count {
            let hash = u64hash(&k);
            let (_, duplicate) = table.insert_or_get(
                &mut store,
                hash,
                k,
                |s, i, key| s.key(i) == *key,
                |s, key| s.add(key, hash),
            );
            assert!(duplicate.is_none());
        }
        assert!(table.rehashes() >= 1);
        assert!(table.bucket_count() > initial);
        assert_eq!(table.len(), count as usize);
        assert!(table.load_factor() < DEFAULT_MAX_LOAD);
        // every key still resolves, and none was inserted twice
        for k in 0..count {
            let hash = u64hash(&k);
            let (_, duplicate) = table.insert_or_get(
                &mut store,
                hash,
                k,
                |s, i, key| s.key(i) == *key,
                |s, key| s.add(key, hash),
            );
            assert!(duplicate.is_some());
        }
        assert_eq!(table.len(), count as usize);
    }

    #[test]
    fn clear_and_dispose_visits_everything() {
        let mut table = ChainedTable::fixed(16, 0.85);
        let mut store = Store::new();
        for k in 0..10u64 {
            fixed_insert(&mut table, &mut store, k);
        }
        let mut disposed = 0;
        table.clear_and_dispose(&mut store, |_, _| disposed += 1);
        assert_eq!(disposed, 10);
        assert_eq!(table.len(), 0);
        let (multi, alone, empty) = table.collisions(&store);
        assert_eq!((multi, alone), (0, 0));
        assert_eq!(empty, table.bucket_count());
    }
}
