//! Caller-supplied ownership and comparison strategies.
//!
//! A `CallbackSet<T>` bundles up to five optional closures. Missing ones fall
//! back to identity behavior: `retain`/`release` become no-ops on the Rust
//! value, `equal` compares `Identity::identity()`, and a missing `hash`
//! leaves the keys unindexed so lookups scan linearly.
//!
//! Any context a callback needs (an allocator, a counter, a pool) is
//! captured by the closure itself.

use crate::retained::Retained;
use core::fmt;
use core::hash::{BuildHasher, Hash};
use std::collections::hash_map::RandomState;
use std::rc::Rc;
use std::sync::Arc;

pub type RetainCallBack<T> = Box<dyn Fn(T) -> T>;
pub type ReleaseCallBack<T> = Box<dyn Fn(T)>;
pub type EqualCallBack<T> = Box<dyn Fn(&T, &T) -> bool>;
pub type HashCallBack<T> = Box<dyn Fn(&T) -> u64>;
pub type DescribeCallBack<T> = Box<dyn Fn(&T) -> String>;

/// Callbacks applied to keys.
pub type KeyCallbacks<K> = CallbackSet<K>;

/// Callbacks applied to values. They see `Option<V>` so that a stored null
/// (`None`) still goes through `retain` and `release`.
pub type ValueCallbacks<V> = CallbackSet<Option<V>>;

/// Identity of a reference, used when no `equal` callback is supplied.
///
/// Pointer-like types report their address; integers, `bool` and `char`
/// report their value.
pub trait Identity {
    fn identity(&self) -> usize;
}

impl<T: ?Sized> Identity for *const T {
    #[inline]
    fn identity(&self) -> usize {
        *self as *const () as usize
    }
}

impl<T: ?Sized> Identity for *mut T {
    #[inline]
    fn identity(&self) -> usize {
        *self as *const () as usize
    }
}

impl<T: ?Sized> Identity for core::ptr::NonNull<T> {
    #[inline]
    fn identity(&self) -> usize {
        self.as_ptr() as *const () as usize
    }
}

impl<T: ?Sized> Identity for &T {
    #[inline]
    fn identity(&self) -> usize {
        *self as *const T as *const () as usize
    }
}

impl<T: ?Sized> Identity for Box<T> {
    #[inline]
    fn identity(&self) -> usize {
        &**self as *const T as *const () as usize
    }
}

impl<T: ?Sized> Identity for Rc<T> {
    #[inline]
    fn identity(&self) -> usize {
        Rc::as_ptr(self) as *const () as usize
    }
}

impl<T: ?Sized> Identity for Arc<T> {
    #[inline]
    fn identity(&self) -> usize {
        Arc::as_ptr(self) as *const () as usize
    }
}

/// Address of the heap buffer. Unallocated (empty) strings all share one
/// dangling address.
impl Identity for String {
    #[inline]
    fn identity(&self) -> usize {
        self.as_ptr() as usize
    }
}

macro_rules! identity_as_usize {
    ($($t:ty),*) => {$(
        impl Identity for $t {
            #[inline]
            fn identity(&self) -> usize {
                *self as usize
            }
        }
    )*};
}

// Wider than usize on 32-bit targets, where distinct values may share an
// identity. Supply `equal` for such keys there.
identity_as_usize!(u8, u16, u32, u64, usize, i8, i16, i32, i64, isize, bool, char);

/// The null sentinel has identity 0, like a null pointer.
impl<T: Identity> Identity for Option<T> {
    #[inline]
    fn identity(&self) -> usize {
        self.as_ref().map_or(0, Identity::identity)
    }
}

pub struct CallbackSet<T> {
    retain: Option<RetainCallBack<T>>,
    release: Option<ReleaseCallBack<T>>,
    equal: Option<EqualCallBack<T>>,
    hash: Option<HashCallBack<T>>,
    describe: Option<DescribeCallBack<T>>,
}

impl<T> CallbackSet<T> {
    /// All callbacks absent.
    pub fn identity() -> Self {
        Self {
            retain: None,
            release: None,
            equal: None,
            hash: None,
            describe: None,
        }
    }

    pub fn with_retain(mut self, f: impl Fn(T) -> T + 'static) -> Self {
        self.retain = Some(Box::new(f));
        self
    }

    pub fn with_release(mut self, f: impl Fn(T) + 'static) -> Self {
        self.release = Some(Box::new(f));
        self
    }

    pub fn with_equal(mut self, f: impl Fn(&T, &T) -> bool + 'static) -> Self {
        self.equal = Some(Box::new(f));
        self
    }

    /// Only meaningful on the key side; value-side `hash` is never called.
    pub fn with_hash(mut self, f: impl Fn(&T) -> u64 + 'static) -> Self {
        self.hash = Some(Box::new(f));
        self
    }

    pub fn with_describe(mut self, f: impl Fn(&T) -> String + 'static) -> Self {
        self.describe = Some(Box::new(f));
        self
    }

    pub fn has_hash(&self) -> bool {
        self.hash.is_some()
    }

    /// Take one counted reference. Exactly one `retain` call (if present).
    #[inline]
    pub(crate) fn retain(&self, r: T) -> Retained<T> {
        match &self.retain {
            Some(f) => Retained::new(f(r)),
            None => Retained::new(r),
        }
    }

    /// Give back one counted reference. Exactly one `release` call (if present).
    #[inline]
    pub(crate) fn release(&self, r: Retained<T>) {
        let r = r.into_inner();
        if let Some(f) = &self.release {
            f(r);
        }
    }

    #[inline]
    pub(crate) fn hash(&self, r: &T) -> Option<u64> {
        self.hash.as_ref().map(|f| f(r))
    }

    pub(crate) fn describe(&self, r: &T) -> Option<String> {
        self.describe.as_ref().map(|f| f(r))
    }
}

impl<T: Identity> CallbackSet<T> {
    #[inline]
    pub(crate) fn equal(&self, a: &T, b: &T) -> bool {
        match &self.equal {
            Some(f) => f(a, b),
            None => a.identity() == b.identity(),
        }
    }
}

impl<T> CallbackSet<T>
where
    T: Clone + Eq + Hash + 'static,
{
    /// Content semantics: `retain` clones, `release` drops the clone,
    /// `equal` is `==`, and `hash` goes through a per-set `RandomState`.
    pub fn by_content() -> Self {
        let state = RandomState::new();
        Self::identity()
            .with_retain(|r: T| r.clone())
            .with_release(drop)
            .with_equal(|a: &T, b: &T| a == b)
            .with_hash(move |r: &T| state.hash_one(r))
    }
}

impl<T> Default for CallbackSet<T> {
    fn default() -> Self {
        Self::identity()
    }
}

impl<T> fmt::Debug for CallbackSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackSet")
            .field("retain", &self.retain.is_some())
            .field("release", &self.release.is_some())
            .field("equal", &self.equal.is_some())
            .field("hash", &self.hash.is_some())
            .field("describe", &self.describe.is_some())
            .finish()
    }
}
