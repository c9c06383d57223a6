//! CallbackHashMap: the public mutable map driving retain/release callbacks.
//!
//! Callback contract per operation (fresh key / existing key):
//! - `add`: retain key, retain value / nothing.
//! - `set`: as `add` / retain new value, release old value; key untouched.
//! - `remove`: nothing / release key, release value.
//! - `remove_all` and `Drop`: release key and value of every entry.
//! - `get`, `len`, `keys_and_values`, `iter`: no retain/release.
//!
//! Lookups call `hash` once (when supplied) and `equal` per candidate.

use crate::callbacks::{CallbackSet, Identity, KeyCallbacks, ValueCallbacks};
use crate::config::Builder;
use crate::error::Result;
use crate::handle_table::{Handle, HandleTable};
use core::fmt;

pub struct CallbackHashMap<K, V> {
    table: HandleTable<K, Option<V>>,
    key_callbacks: KeyCallbacks<K>,
    value_callbacks: ValueCallbacks<V>,
}

/// Point-in-time copy of the map's references, index-aligned: `keys()[i]`
/// and `values()[i]` belong to the same entry. Order is unspecified.
///
/// The snapshot borrows the map, so it cannot outlive the next mutation.
#[derive(Debug)]
pub struct Snapshot<'a, K, V> {
    keys: Vec<&'a K>,
    values: Vec<Option<&'a V>>,
}

impl<'a, K, V> Snapshot<'a, K, V> {
    pub fn keys(&self) -> &[&'a K] {
        &self.keys
    }

    /// `None` marks a stored null.
    pub fn values(&self) -> &[Option<&'a V>] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'a K, Option<&'a V>)> + '_ {
        self.keys.iter().copied().zip(self.values.iter().copied())
    }
}

impl<K, V> CallbackHashMap<K, V> {
    /// Map with identity callbacks on both sides and no capacity hint.
    pub fn new() -> Self {
        Self {
            table: HandleTable::new(false),
            key_callbacks: CallbackSet::identity(),
            value_callbacks: CallbackSet::identity(),
        }
    }

    /// Create a map. Missing callback sets behave as all-absent sets.
    ///
    /// Fails only when storage for `capacity` entries cannot be obtained.
    pub fn with_callbacks(
        capacity: usize,
        key_callbacks: Option<KeyCallbacks<K>>,
        value_callbacks: Option<ValueCallbacks<V>>,
    ) -> Result<Self> {
        let key_callbacks = key_callbacks.unwrap_or_default();
        let value_callbacks = value_callbacks.unwrap_or_default();
        let table = HandleTable::with_capacity(capacity, key_callbacks.has_hash())?;
        log::debug!(
            "callback map created: capacity {}, {} lookups",
            capacity,
            if table.is_indexed() { "hashed" } else { "linear" }
        );
        Ok(Self {
            table,
            key_callbacks,
            value_callbacks,
        })
    }

    pub fn builder() -> Builder<K, V> {
        Builder::new()
    }

    /// Number of live entries, including those holding a null value.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.len() == 0
    }

    /// Release every entry (key, then value) and leave the map empty.
    pub fn remove_all(&mut self) {
        let released = self.release_all();
        log::debug!("remove_all released {} entries", released);
    }

    pub fn keys_and_values(&self) -> Snapshot<'_, K, V> {
        let mut keys = Vec::with_capacity(self.len());
        let mut values = Vec::with_capacity(self.len());
        for (k, v) in self.table.iter() {
            keys.push(k);
            values.push(v.as_ref());
        }
        Snapshot { keys, values }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, Option<&V>)> + '_ {
        self.table.iter().map(|(k, v)| (k, v.as_ref()))
    }

    fn release_all(&mut self) -> usize {
        let mut released = 0;
        for (key, value) in self.table.take_all() {
            self.key_callbacks.release(key);
            self.value_callbacks.release(value);
            released += 1;
        }
        released
    }
}

impl<K: Identity, V> CallbackHashMap<K, V> {
    fn lookup(&self, hash: Option<u64>, key: &K) -> Option<Handle> {
        let callbacks = &self.key_callbacks;
        self.table.find(hash, |stored| callbacks.equal(stored, key))
    }

    fn insert_fresh(&mut self, hash: Option<u64>, key: K, value: Option<V>) -> Result<()> {
        // Reserve before retaining so a failure leaves the counts untouched.
        self.table.try_reserve_one()?;
        let key = self.key_callbacks.retain(key);
        let value = self.value_callbacks.retain(value);
        self.table.insert(hash.unwrap_or(0), key, value);
        Ok(())
    }

    /// Insert `key -> value` if `key` is absent. Returns whether an entry
    /// was created; an existing entry is left alone and no reference is
    /// retained.
    ///
    /// The lookup still runs the key `hash` and `equal` callbacks; only
    /// `retain` and `release` are skipped on a present key.
    pub fn add(&mut self, key: K, value: Option<V>) -> Result<bool> {
        let hash = self.key_callbacks.hash(&key);
        if self.lookup(hash, &key).is_some() {
            log::trace!("add: key present, unchanged");
            return Ok(false);
        }
        log::trace!("add: inserting (hash {:?})", hash);
        self.insert_fresh(hash, key, value)?;
        Ok(true)
    }

    /// Insert or replace the value for `key`. On replacement the stored key
    /// is kept; the new value is retained before the old one is released.
    pub fn set(&mut self, key: K, value: Option<V>) -> Result<()> {
        let hash = self.key_callbacks.hash(&key);
        match self.lookup(hash, &key) {
            Some(handle) => {
                log::trace!("set: replacing value");
                let fresh = self.value_callbacks.retain(value);
                let old = self.table.replace_value(handle, fresh);
                self.value_callbacks.release(old);
                Ok(())
            }
            None => {
                log::trace!("set: inserting (hash {:?})", hash);
                self.insert_fresh(hash, key, value)
            }
        }
    }

    /// Remove the entry for `key`, releasing its key then its value.
    /// Returns false, with no `release` call, when the key is absent.
    pub fn remove(&mut self, key: &K) -> bool {
        let hash = self.key_callbacks.hash(key);
        let Some(handle) = self.lookup(hash, key) else {
            log::trace!("remove: key absent");
            return false;
        };
        match self.table.remove(handle) {
            Some((stored_key, value)) => {
                log::trace!("remove: released key and value");
                self.key_callbacks.release(stored_key);
                self.value_callbacks.release(value);
                true
            }
            None => false,
        }
    }

    /// `None`: no entry. `Some(None)`: entry holding the null sentinel.
    pub fn get(&self, key: &K) -> Option<Option<&V>> {
        let hash = self.key_callbacks.hash(key);
        let handle = self.lookup(hash, key)?;
        self.table.value(handle).map(Option::as_ref)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        let hash = self.key_callbacks.hash(key);
        self.lookup(hash, key).is_some()
    }
}

impl<K, V: Identity> CallbackHashMap<K, V> {
    /// Linear scan with the value-side `equal` (identity when absent).
    pub fn contains_value(&self, value: &Option<V>) -> bool {
        self.table
            .iter()
            .any(|(_, stored)| self.value_callbacks.equal(stored, value))
    }
}

impl<K, V> Default for CallbackHashMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Drop for CallbackHashMap<K, V> {
    fn drop(&mut self) {
        let released = self.release_all();
        if released > 0 {
            log::debug!("callback map dropped, released {} entries", released);
        }
    }
}

// Renders a pre-formatted string without quotes inside `debug_map`.
struct Shown(String);

impl fmt::Debug for Shown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<K: Identity, V: Identity> fmt::Debug for CallbackHashMap<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = f.debug_map();
        for (k, v) in self.table.iter() {
            let key = self
                .key_callbacks
                .describe(k)
                .unwrap_or_else(|| format!("{:#x}", k.identity()));
            let value = self.value_callbacks.describe(v).unwrap_or_else(|| match v {
                None => "null".to_string(),
                Some(_) => format!("{:#x}", v.identity()),
            });
            out.entry(&Shown(key), &Shown(value));
        }
        out.finish()
    }
}
