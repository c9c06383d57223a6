//! Construction parameters for `CallbackHashMap`.

use crate::callbacks::{KeyCallbacks, ValueCallbacks};
use crate::error::Result;
use crate::map::CallbackHashMap;

/// Collects the capacity hint and both callback sets before the map is
/// allocated. Unset callback sets default to identity behavior.
pub struct Builder<K, V> {
    capacity: usize,
    key_callbacks: Option<KeyCallbacks<K>>,
    value_callbacks: Option<ValueCallbacks<V>>,
}

impl<K, V> Builder<K, V> {
    pub fn new() -> Self {
        Self {
            capacity: 0,
            key_callbacks: None,
            value_callbacks: None,
        }
    }

    /// Number of entries to reserve up front. Only a hint; the map grows
    /// past it as needed.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn key_callbacks(mut self, callbacks: KeyCallbacks<K>) -> Self {
        self.key_callbacks = Some(callbacks);
        self
    }

    pub fn value_callbacks(mut self, callbacks: ValueCallbacks<V>) -> Self {
        self.value_callbacks = Some(callbacks);
        self
    }

    pub fn build(self) -> Result<CallbackHashMap<K, V>> {
        CallbackHashMap::with_callbacks(self.capacity, self.key_callbacks, self.value_callbacks)
    }
}

impl<K, V> Default for Builder<K, V> {
    fn default() -> Self {
        Self::new()
    }
}
