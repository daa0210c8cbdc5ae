//! The unification table: the authoritative, hash-consed store of terms.
//!
//! Interning guarantees that structurally equal terms share one node, so
//! equality anywhere else in the crate is pointer identity. Nodes are
//! reference counted by the handles given out; the drop of the last outside
//! handle erases the node from its table. Storage is a slab of slots with an
//! embedded free list, chained into a growing hash table, so rehashes move
//! links rather than node bodies and every outstanding handle survives them.

use std::cell::RefCell;
use std::hash::Hash;
use std::rc::{Rc, Weak};

use serde::{Deserialize, Serialize};

use crate::handle::Handle;
use crate::hash::u64hash;
use crate::hash_table::{ChainedTable, Links, DEFAULT_MAX_LOAD};

const DEFAULT_CAPACITY: usize = 1 << 12;

/// A payload that can be unified.
///
/// Equality and hashing must agree (`a == b` implies equal hashes); the
/// table relies on it blindly. Interning workloads churn through duplicates
/// (build a term, discover it already exists, throw it away); `into_spare`
/// lets such a duplicate donate its heap buffer back to the table instead of
/// freeing it. Implement it for payloads carrying a variable-length buffer;
/// the default donates nothing.
pub trait Term: Sized + Eq + Hash {
    /// Salvage reusable heap storage from a duplicate about to be discarded.
    fn into_spare(self) -> Option<Vec<u8>> {
        None
    }
}

/// statistics snapshot of a unification table
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct UnificationStats {
    /// number of unified terms currently stored
    pub size: usize,
    /// high-water mark of `size`
    pub peak: usize,
    pub load_factor: f64,
    /// total number of interning requests
    pub accesses: usize,
    /// requests resolved to an existing term
    pub hits: usize,
    /// requests that stored a new term
    pub misses: usize,
    /// times the underlying hash table doubled its buckets
    pub rehashes: usize,
    /// buckets holding two or more terms
    pub collisions: usize,
    /// buckets holding exactly one term
    pub alone: usize,
    /// empty buckets
    pub empty: usize,
    pub buckets: usize,
}

/// A unified term with its interning metadata.
///
/// Handles share the node by `Rc`; the table's slot holds exactly one more
/// reference, so a strong count of one means only the table knows the node.
/// The weak back-reference lets the last handle erase the node from the
/// table it came from.
pub(crate) struct Node<T> {
    pub(crate) term: T,
    pub(crate) hash: u64,
    pub(crate) idx: u32,
    pub(crate) table: Weak<RefCell<UnicityInner<T>>>,
}

enum NodeSlot<T> {
    Busy { node: Rc<Node<T>>, next: Option<u32> },
    Free { next: Option<u32> },
}

/// Slab of node slots with an embedded free list. The bucket chains of the
/// unification table run through the `next` link of busy slots.
pub(crate) struct NodeArena<T> {
    slots: Vec<NodeSlot<T>>,
    free_head: Option<u32>,
}

impl<T> NodeArena<T> {
    fn with_capacity(capacity: usize) -> NodeArena<T> {
        NodeArena {
            slots: Vec::with_capacity(capacity),
            free_head: None,
        }
    }

    pub(crate) fn node(&self, idx: u32) -> &Rc<Node<T>> {
        match &self.slots[idx as usize] {
            NodeSlot::Busy { node, .. } => node,
            NodeSlot::Free { .. } => panic!("vacant node slot"),
        }
    }

    /// Store the node `build` makes for the slot index it will occupy.
    fn insert_with(&mut self, build: impl FnOnce(u32) -> Rc<Node<T>>) -> u32 {
        match self.free_head {
            Some(idx) => {
                match self.slots[idx as usize] {
                    NodeSlot::Free { next } => self.free_head = next,
                    NodeSlot::Busy { .. } => unreachable!("free list points at a busy slot"),
                }
                self.slots[idx as usize] = NodeSlot::Busy {
                    node: build(idx),
                    next: None,
                };
                idx
            }
            None => {
                let idx = self.slots.len() as u32;
                let node = build(idx);
                self.slots.push(NodeSlot::Busy { node, next: None });
                idx
            }
        }
    }

    fn remove(&mut self, idx: u32) -> Rc<Node<T>> {
        let slot = std::mem::replace(
            &mut self.slots[idx as usize],
            NodeSlot::Free {
                next: self.free_head,
            },
        );
        self.free_head = Some(idx);
        match slot {
            NodeSlot::Busy { node, .. } => node,
            NodeSlot::Free { .. } => panic!("removing a vacant node slot"),
        }
    }
}

impl<T> Links for NodeArena<T> {
    fn next(&self, idx: u32) -> Option<u32> {
        match &self.slots[idx as usize] {
            NodeSlot::Busy { next, .. } => *next,
            NodeSlot::Free { .. } => panic!("vacant node slot"),
        }
    }

    fn set_next(&mut self, idx: u32, n: Option<u32>) {
        match &mut self.slots[idx as usize] {
            NodeSlot::Busy { next, .. } => *next = n,
            NodeSlot::Free { .. } => panic!("vacant node slot"),
        }
    }

    fn hash(&self, idx: u32) -> u64 {
        self.node(idx).hash
    }
}

pub(crate) struct UnicityInner<T> {
    arena: NodeArena<T>,
    set: ChainedTable,
    accesses: usize,
    hits: usize,
    misses: usize,
    peak: usize,
    /// buffer salvaged from the largest recent duplicate, handed back out by
    /// `lease`
    spare: Option<Vec<u8>>,
}

impl<T> UnicityInner<T> {
    /// Erase a node only the table still references. Called from the drop of
    /// its last handle; that handle still holds one reference, so the
    /// payload is destroyed after this borrow ends.
    pub(crate) fn release(&mut self, hash: u64, idx: u32) {
        self.set.erase(&mut self.arena, hash, idx);
        let node = self.arena.remove(idx);
        debug_assert_eq!(Rc::strong_count(&node), 2, "released node still referenced");
    }

    fn offer_spare(&mut self, buf: Vec<u8>) {
        let held = self.spare.as_ref().map_or(0, |s| s.capacity());
        if buf.capacity() > held {
            self.spare = Some(buf);
        }
    }

    fn take_spare(&mut self, len: usize) -> Option<Vec<u8>> {
        if self.spare.as_ref().map_or(false, |s| s.capacity() >= len) {
            let mut buf = self.spare.take().unwrap();
            buf.clear();
            Some(buf)
        } else {
            None
        }
    }
}

/// The unification table front.
///
/// Cloning is cheap and shares the table. Handles carry a weak reference
/// back to it, so a table can be dropped while handles are still out; the
/// remaining nodes are then reclaimed by the handles alone.
pub struct Unicity<T: Term> {
    inner: Rc<RefCell<UnicityInner<T>>>,
}

impl<T: Term> Clone for Unicity<T> {
    fn clone(&self) -> Self {
        Unicity {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Term> Default for Unicity<T> {
    fn default() -> Self {
        Unicity::with_capacity(DEFAULT_CAPACITY)
    }
}

impl<T: Term> Unicity<T> {
    /// A table sized for roughly `capacity` terms before the first rehash.
    pub fn with_capacity(capacity: usize) -> Unicity<T> {
        Unicity {
            inner: Rc::new(RefCell::new(UnicityInner {
                arena: NodeArena::with_capacity(capacity),
                set: ChainedTable::growing(capacity, DEFAULT_MAX_LOAD),
                accesses: 0,
                hits: 0,
                misses: 0,
                peak: 0,
                spare: None,
            })),
        }
    }

    /// Intern `v`, returning a handle to the unique stored copy.
    ///
    /// A duplicate is destroyed without entering the table; its heap buffer,
    /// if [`Term::into_spare`] donates one, is kept for the next
    /// [`Unicity::lease`] when it beats the buffer already held.
    pub fn make<V: Into<T>>(&self, v: V) -> Handle<T> {
        let term: T = v.into();
        let hash = u64hash(&term);
        let weak = Rc::downgrade(&self.inner);
        let (node, duplicate) = {
            let mut guard = self.inner.borrow_mut();
            let inner = &mut *guard;
            inner.accesses += 1;
            let (idx, duplicate) = inner.set.insert_or_get(
                &mut inner.arena,
                hash,
                term,
                |arena, idx, candidate| arena.node(idx).term == *candidate,
                |arena, term| {
                    arena.insert_with(|idx| {
                        Rc::new(Node {
                            term,
                            hash,
                            idx,
                            table: weak,
                        })
                    })
                },
            );
            if duplicate.is_some() {
                inner.hits += 1;
            } else {
                inner.misses += 1;
                inner.peak = inner.peak.max(inner.set.len());
            }
            (Rc::clone(inner.arena.node(idx)), duplicate)
        };
        // The duplicate dies here, outside the table borrow: handles inside
        // its payload may recursively erase their own nodes.
        if let Some(dup) = duplicate {
            if let Some(buf) = dup.into_spare() {
                self.inner.borrow_mut().offer_spare(buf);
            }
        }
        Handle::from_node(node)
    }

    /// Intern a term carrying a variable-length buffer. `build` receives a
    /// buffer with at least `len` bytes of capacity, recycled from the last
    /// salvaged duplicate when it is large enough.
    pub fn make_sized<V: Into<T>>(&self, len: usize, build: impl FnOnce(Vec<u8>) -> V) -> Handle<T> {
        let buf = self.lease(len);
        self.make(build(buf))
    }

    /// Lease an empty buffer with capacity for at least `len` bytes,
    /// reusing the spare slab when possible.
    pub fn lease(&self, len: usize) -> Vec<u8> {
        self.inner
            .borrow_mut()
            .take_spare(len)
            .unwrap_or_else(|| Vec::with_capacity(len))
    }

    /// number of unified terms currently stored
    pub fn len(&self) -> usize {
        self.inner.borrow().set.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> UnificationStats {
        let inner = self.inner.borrow();
        let (collisions, alone, empty) = inner.set.collisions(&inner.arena);
        UnificationStats {
            size: inner.set.len(),
            peak: inner.peak,
            load_factor: inner.set.load_factor(),
            accesses: inner.accesses,
            hits: inner.hits,
            misses: inner.misses,
            rehashes: inner.set.rehashes(),
            collisions,
            alone,
            empty,
            buckets: inner.set.bucket_count(),
        }
    }
}
