//! A strong, reference-counted handle to a unified term.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::rc::Rc;

use crate::unique_table::Node;
use crate::variant::Variant;

/// An owning pointer to a term stored in a unification table.
///
/// Interning guarantees that structurally equal terms share one node, so
/// equality, ordering and hashing of handles all reduce to node identity.
/// Cloning a handle bumps the term's reference count; dropping the last
/// handle erases the term from its table. The node carries a weak
/// back-reference to the table it came from, which replaces the per-type
/// deletion hook of classical hash-consing designs and lets several tables
/// over the same payload type coexist.
///
/// `Deref` exposes the term itself, so a handle can be matched on directly:
///
/// ```
/// use unidd::{variants, Term, Unicity};
///
/// #[derive(Debug, PartialEq, Eq, Hash)]
/// struct Tip;
/// #[derive(Debug, PartialEq, Eq, Hash)]
/// struct Branch(u32);
///
/// variants! {
///     #[derive(Debug, PartialEq, Eq, Hash)]
///     enum Tree { Tip, Branch }
/// }
/// impl Term for Tree {}
///
/// let table: Unicity<Tree> = Unicity::default();
/// let t = table.make(Branch(3));
/// match &*t {
///     Tree::Branch(b) => assert_eq!(b.0, 3),
///     Tree::Tip(_) => unreachable!(),
/// }
/// assert!(t.is::<Branch>());
/// ```
pub struct Handle<T> {
    node: Rc<Node<T>>,
}

impl<T> Handle<T> {
    pub(crate) fn from_node(node: Rc<Node<T>>) -> Handle<T> {
        Handle { node }
    }

    /// Stable identity of the underlying node; usable as a map key and equal
    /// exactly when the handles compare equal.
    #[inline]
    pub fn id(&self) -> usize {
        Rc::as_ptr(&self.node) as usize
    }

    /// Variant test, forwarded to the stored tagged union.
    #[inline]
    pub fn is<V: Variant<T>>(&self) -> bool {
        V::test(&self.node.term)
    }

    /// Variant cast, forwarded to the stored tagged union. `None` when a
    /// different variant is active.
    #[inline]
    pub fn get<V: Variant<T>>(&self) -> Option<&V> {
        V::cast(&self.node.term)
    }
}

impl<T> Deref for Handle<T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        &self.node.term
    }
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        Handle {
            node: Rc::clone(&self.node),
        }
    }
}

impl<T> Drop for Handle<T> {
    fn drop(&mut self) {
        // Two strong references mean this handle plus the table's slot: the
        // term is about to become externally unreferenced. The payload
        // itself dies with the final `Rc` release after this body, once the
        // table borrow is gone, so handles inside the payload can erase
        // their own nodes in turn.
        if Rc::strong_count(&self.node) == 2 {
            if let Some(table) = self.node.table.upgrade() {
                table.borrow_mut().release(self.node.hash, self.node.idx);
            }
        }
    }
}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.node, &other.node)
    }
}

impl<T> Eq for Handle<T> {}

impl<T> PartialOrd for Handle<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Handle<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id().cmp(&other.id())
    }
}

impl<T> Hash for Handle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id().hash(state)
    }
}

impl<T: fmt::Debug> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({:?})", self.node.term)
    }
}
