//! Variant dispatch for tagged-union payloads.
//!
//! The discriminated union of a term definition is a plain Rust enum, so
//! destructor and visitor jump tables collapse to `match` and the compiler
//! sizes the discriminant. What remains here is the typed variant-test and
//! variant-cast surface used by handles, the [`variants!`] macro generating
//! the boilerplate for struct-per-variant payloads, and the visit helpers.

use crate::handle::Handle;

/// A variant type of the tagged union `D`.
///
/// Implemented by each variant struct of a payload enum, usually through
/// [`variants!`]; backs [`Handle::is`] and [`Handle::get`].
pub trait Variant<D>: Sized {
    /// Does `def` currently hold this variant?
    fn test(def: &D) -> bool;

    /// Borrow the active variant, if it is this one.
    fn cast(def: &D) -> Option<&Self>;
}

/// Apply `visitor` to the term behind `h`. Dispatch over variants is the
/// `match` inside the visitor; extra state rides in its captures.
#[inline]
pub fn visit<T, R>(visitor: impl FnOnce(&T) -> R, h: &Handle<T>) -> R {
    visitor(&**h)
}

/// Apply `visitor` to the terms behind `a` and `b`. A visitor covers every
/// variant pair; pairs it has no meaning for are rejected with its own
/// error value.
#[inline]
pub fn binary_visit<T, R>(visitor: impl FnOnce(&T, &T) -> R, a: &Handle<T>, b: &Handle<T>) -> R {
    visitor(&**a, &**b)
}

/// Generate a tagged-union payload from a list of variant structs: the enum
/// itself, the `From` conversions used by `Unicity::make`, and the
/// [`Variant`] impls behind `Handle::is` / `Handle::get`.
///
/// ```
/// use unidd::{variants, Term, Unicity};
///
/// #[derive(Debug, PartialEq, Eq, Hash)]
/// pub struct Off;
/// #[derive(Debug, PartialEq, Eq, Hash)]
/// pub struct On(pub u8);
///
/// variants! {
///     #[derive(Debug, PartialEq, Eq, Hash)]
///     pub enum Switch { Off, On }
/// }
/// impl Term for Switch {}
///
/// let table: Unicity<Switch> = Unicity::default();
/// let s = table.make(On(3));
/// assert!(s.is::<On>());
/// assert!(s.get::<Off>().is_none());
/// ```
#[macro_export]
macro_rules! variants {
    ($(#[$meta:meta])* $vis:vis enum $name:ident { $($variant:ident),+ $(,)? }) => {
        $(#[$meta])*
        $vis enum $name {
            $($variant($variant),)+
        }

        $(
            impl ::core::convert::From<$variant> for $name {
                fn from(v: $variant) -> $name {
                    $name::$variant(v)
                }
            }

            impl $crate::variant::Variant<$name> for $variant {
                fn test(def: &$name) -> bool {
                    matches!(def, $name::$variant(_))
                }

                #[allow(unreachable_patterns)]
                fn cast(def: &$name) -> Option<&$variant> {
                    match def {
                        $name::$variant(v) => Some(v),
                        _ => None,
                    }
                }
            }
        )+
    };
}

#[cfg(test)]
mod tests {
    use crate::unique_table::{Term, Unicity};
    use crate::variant::{binary_visit, visit, Variant};

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    struct Nil;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    struct Val(i64);

    variants! {
        #[derive(Debug, PartialEq, Eq, Hash)]
        enum Two { Nil, Val }
    }

    impl Term for Two {}

    // the degenerate union still works
    variants! {
        #[derive(Debug, PartialEq, Eq, Hash)]
        enum OnlyNil { Nil }
    }

    impl Term for OnlyNil {}

    #[test]
    fn from_and_cast_roundtrip() {
        let two: Two = Val(4).into();
        assert!(Val::test(&two));
        assert!(!Nil::test(&two));
        assert_eq!(Val::cast(&two), Some(&Val(4)));
        assert_eq!(Nil::cast(&two), None);
    }

    #[test]
    fn single_variant_union() {
        let table: Unicity<OnlyNil> = Unicity::with_capacity(4);
        let a = table.make(Nil);
        let b = table.make(Nil);
        assert_eq!(a, b);
        assert_eq!(table.len(), 1);
        assert!(a.is::<Nil>());
    }

    #[test]
    fn zero_sized_variants_unify() {
        let table: Unicity<Two> = Unicity::with_capacity(4);
        let a = table.make(Nil);
        let b = table.make(Nil);
        assert_eq!(a, b);
        assert_ne!(a, table.make(Val(0)));
    }

    #[test]
    fn visit_dispatches_by_match() {
        let table: Unicity<Two> = Unicity::with_capacity(4);
        let v = table.make(Val(21));
        let doubled = visit(
            |def| match def {
                Two::Val(x) => x.0 * 2,
                Two::Nil(_) => 0,
            },
            &v,
        );
        assert_eq!(doubled, 42);
    }

    #[test]
    fn binary_visit_sees_both_variants() {
        let table: Unicity<Two> = Unicity::with_capacity(4);
        let n = table.make(Nil);
        let v = table.make(Val(3));
        let described = binary_visit(
            |a, b| match (a, b) {
                (Two::Nil(_), Two::Val(x)) => format!("nil/{}", x.0),
                _ => "other".to_string(),
            },
            &n,
            &v,
        );
        assert_eq!(described, "nil/3");
    }
}
