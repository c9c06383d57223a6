//! Linear holder for references produced by a `retain` callback.
//!
//! A `Retained<T>` is the map's proof that it owns one counted reference.
//! It is minted only by `CallbackSet::retain` and the only valid way to
//! dispose of it is `CallbackSet::release`. Dropping one any other way
//! panics, so a code path that forgets a `release` fails loudly instead of
//! skewing the caller-visible counts.

use core::fmt;

pub struct Retained<T> {
    // `None` only after `into_inner` moved the reference out.
    inner: Option<T>,
}

impl<T> Retained<T> {
    #[inline]
    pub(crate) fn new(value: T) -> Self {
        Self { inner: Some(value) }
    }

    #[inline]
    pub fn get(&self) -> &T {
        match &self.inner {
            Some(v) => v,
            None => unreachable!("Retained accessed after release"),
        }
    }

    /// Consume the holder. Reserved for `CallbackSet::release`.
    #[inline]
    pub(crate) fn into_inner(mut self) -> T {
        match self.inner.take() {
            Some(v) => v,
            None => unreachable!("Retained released twice"),
        }
    }
}

impl<T> Drop for Retained<T> {
    fn drop(&mut self) {
        // A panicking callback may unwind through a map that still holds
        // entries; a second panic here would abort.
        if self.inner.is_some() && !std::thread::panicking() {
            panic!("Retained reference dropped without release");
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Retained<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Retained").field(&self.inner).finish()
    }
}
