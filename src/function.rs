//! Type-erased items and function handles.
//!
//! The compiler never looks inside the data flowing through a pipeline. Items are
//! carried as [`Item`] (an `Arc<dyn Any>`), and every user function attached to a
//! stage (key extractors, mappers, predicates, ...) is wrapped in a small handle
//! type defined here.
//!
//! Handles are cheap to clone and compare by **identity** via `same_as`. The
//! planner copies them from stages onto vertex suppliers and edges, so tests and
//! tooling can check that, for example, an edge is partitioned by exactly the key
//! function a grouping stage was declared with.
//!
//! ```
//! use ironjet::function::{item, KeyFn};
//!
//! let key = KeyFn::new(|s| item(s.downcast_ref::<String>().map_or(0, |s| s.len())));
//! let same = key.clone();
//! assert!(key.same_as(&same));
//! ```

use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// A single type-erased data item.
pub type Item = Arc<dyn Any + Send + Sync>;

/// Wrap a concrete value as an [`Item`].
pub fn item<T: Any + Send + Sync>(value: T) -> Item {
    Arc::new(value)
}

macro_rules! erased_fn {
    ($(#[$meta:meta])* $name:ident, ($($arg:ident: $ty:ty),*) -> $ret:ty) => {
        $(#[$meta])*
        #[derive(Clone)]
        pub struct $name(::std::sync::Arc<dyn Fn($($ty),*) -> $ret + Send + Sync>);

        impl $name {
            /// Wrap a closure.
            pub fn new<F>(f: F) -> Self
            where
                F: Fn($($ty),*) -> $ret + Send + Sync + 'static,
            {
                Self(::std::sync::Arc::new(f))
            }

            /// Invoke the wrapped function.
            pub fn call(&self, $($arg: $ty),*) -> $ret {
                (self.0)($($arg),*)
            }

            /// `true` if both handles wrap the same function instance.
            #[must_use]
            pub fn same_as(&self, other: &Self) -> bool {
                ::std::sync::Arc::ptr_eq(&self.0, &other.0)
            }
        }

        impl ::std::fmt::Debug for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                write!(f, concat!(stringify!($name), "@{:p}"), ::std::sync::Arc::as_ptr(&self.0))
            }
        }
    };
}

pub(crate) use erased_fn;

erased_fn!(
    /// Extracts a grouping, partitioning or join key from an item.
    KeyFn, (item: &Item) -> Item
);
erased_fn!(
    /// One-to-one item transformation.
    MapFn, (item: &Item) -> Item
);
erased_fn!(
    /// Item predicate used by filters and peeks.
    PredicateFn, (item: &Item) -> bool
);
erased_fn!(
    /// One-to-many item transformation.
    FlatMapFn, (item: &Item) -> Vec<Item>
);
erased_fn!(
    /// Renders an item for diagnostic output.
    ToStringFn, (item: &Item) -> String
);
erased_fn!(
    /// Extracts the event timestamp (milliseconds) from an item.
    TimestampFn, (item: &Item) -> i64
);
erased_fn!(
    /// Projects a side-input item into the value stored in a hash-join table.
    ProjectFn, (item: &Item) -> Item
);

impl PredicateFn {
    /// A predicate that accepts every item.
    #[must_use]
    pub fn always() -> Self {
        Self::new(|_| true)
    }
}

impl ToStringFn {
    /// Renders items with their `Debug` representation when they are `T`,
    /// and with a placeholder otherwise.
    #[must_use]
    pub fn debug_of<T: Any + fmt::Debug>() -> Self {
        Self::new(|it| {
            it.downcast_ref::<T>()
                .map_or_else(|| "<opaque>".to_string(), |v| format!("{v:?}"))
        })
    }
}

/// Selects the key used to partition an edge or group items inside a vertex.
///
/// Besides user key functions there are two built-in selectors: the key of the
/// `(key, accumulator)` entries emitted by a local pre-aggregation vertex, and a
/// constant key used by non-keyed windowed aggregation.
#[derive(Clone, Debug)]
pub enum KeySelector {
    /// Key of an intermediate `(key, accumulator)` entry.
    EntryKey,
    /// The same key for every item.
    Constant,
    /// A user-supplied key extractor.
    Extract(KeyFn),
}

impl KeySelector {
    /// The user key function, if this selector wraps one.
    #[must_use]
    pub fn key_fn(&self) -> Option<&KeyFn> {
        match self {
            KeySelector::Extract(f) => Some(f),
            _ => None,
        }
    }

    /// `true` if this selector extracts keys with exactly `key_fn`.
    #[must_use]
    pub fn uses(&self, key_fn: &KeyFn) -> bool {
        self.key_fn().is_some_and(|f| f.same_as(key_fn))
    }
}

impl From<KeyFn> for KeySelector {
    fn from(f: KeyFn) -> Self {
        KeySelector::Extract(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_compare_by_identity() {
        let a = KeyFn::new(|it| it.clone());
        let b = KeyFn::new(|it| it.clone());
        assert!(a.same_as(&a.clone()));
        assert!(!a.same_as(&b));
    }

    #[test]
    fn call_invokes_wrapped_closure() {
        let len = MapFn::new(|it| item(it.downcast_ref::<String>().map_or(0usize, String::len)));
        let out = len.call(&item("four".to_string()));
        assert_eq!(out.downcast_ref::<usize>(), Some(&4));
    }

    #[test]
    fn key_selector_reports_its_function() {
        let k = KeyFn::new(|it| it.clone());
        let sel = KeySelector::from(k.clone());
        assert!(sel.uses(&k));
        assert!(!KeySelector::EntryKey.uses(&k));
        assert!(KeySelector::Constant.key_fn().is_none());
    }

    #[test]
    fn debug_renderer_falls_back_for_other_types() {
        let render = ToStringFn::debug_of::<u32>();
        assert_eq!(render.call(&item(7u32)), "7");
        assert_eq!(render.call(&item("x")), "<opaque>");
    }
}
