//! Building blocks for decision-diagram-style libraries.
//!
//! Two cooperating engines do the work. The [`Unicity`] table interns
//! immutable, recursively composed terms so that structurally equal values
//! share one node and equality degrades to pointer identity; clients hold
//! [`Handle`]s that reference-count the nodes. The [`Cache`] memoizes pure
//! [`Operation`]s over those handles with a fixed memory footprint, evicting
//! the least recently used entry when full. Together they turn a naive
//! exponential recursion over term trees into a DAG walk that computes each
//! distinct sub-problem once.
//!
//! ```
//! use unidd::{variants, Term, Unicity};
//!
//! #[derive(Debug, PartialEq, Eq, Hash)]
//! pub struct One;
//! #[derive(Debug, PartialEq, Eq, Hash)]
//! pub struct Node {
//!     pub variable: u32,
//!     pub lo: unidd::Handle<Def>,
//!     pub hi: unidd::Handle<Def>,
//! }
//!
//! variants! {
//!     #[derive(Debug, PartialEq, Eq, Hash)]
//!     pub enum Def { One, Node }
//! }
//! impl Term for Def {}
//!
//! let table: Unicity<Def> = Unicity::default();
//! let one = table.make(One);
//! let a = table.make(Node { variable: 0, lo: one.clone(), hi: one.clone() });
//! let b = table.make(Node { variable: 0, lo: one.clone(), hi: one.clone() });
//! // structural equality is pointer identity
//! assert_eq!(a, b);
//! assert_eq!(table.stats().size, 2);
//! ```

pub mod cache;
pub mod handle;
pub mod hash;
mod hash_table;
mod lru;
mod pool;
pub mod unique_table;
pub mod variant;

pub use cache::{Cache, CacheStats, Filter, Operation};
pub use handle::Handle;
pub use unique_table::{Term, UnificationStats, Unicity};
pub use variant::{binary_visit, visit, Variant};
