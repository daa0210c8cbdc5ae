//! The hash primitive shared by every component.
//!
//! Unified terms, operations and cache entries must all hash through the same
//! function: the chained tables locate an element by recomputing its hash, so
//! a cache entry has to land in the bucket that the bare operation probes.
//! Routing everything through [`u64hash`] makes that consistency structural
//! instead of a convention each call site has to remember.

use std::hash::{Hash, Hasher};

use rustc_hash::FxHasher;

/// hash `elem` to a `u64` with the crate-wide hasher
#[inline]
pub fn u64hash<T: Hash>(elem: &T) -> u64 {
    let mut hasher = FxHasher::default();
    elem.hash(&mut hasher);
    hasher.finish()
}
