//! HandleTable: structural layer holding retained entries behind stable handles.
//!
//! Entries live in a `SlotMap`. When the key side has a `hash` callback the
//! table also keeps a `hashbrown::HashTable` index from hash to slot; the
//! hash is computed once by the caller and cached in the slot so growth of
//! the index never calls back into user code. Without a hash there is no
//! index and lookups scan every slot.
//!
//! This layer never invokes `retain` or `release`; it only moves
//! `Retained` holders in and out. User code reaches it solely through the
//! `eq` closure passed to `find`, which only gets `&K`.
//!
//! SlotMap growth is infallible, so every allocation it would make is first
//! tried on a scratch `Vec` of the same footprint. Only when that succeeds
//! does the SlotMap itself grow.

use crate::error::{Error, Result};
use crate::retained::Retained;
use core::alloc::Layout;
use hashbrown::HashTable;
use slotmap::{DefaultKey, SlotMap};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub(crate) struct Handle(DefaultKey);

struct Slot<K, V> {
    key: Retained<K>,
    value: Retained<V>,
    hash: u64,
}

// Footprint of one SlotMap cell: the value next to its u32 version.
#[allow(dead_code)]
struct SlotCell<T> {
    value: T,
    version: u32,
}

pub(crate) struct HandleTable<K, V> {
    index: Option<HashTable<DefaultKey>>,
    slots: SlotMap<DefaultKey, Slot<K, V>>,
}

/// Fallibly allocate (and free) room for `entries` SlotMap cells, so the
/// SlotMap allocation that follows is known to be obtainable.
fn try_reserve_cells<T>(entries: usize) -> Result<()> {
    Layout::array::<SlotCell<T>>(entries)
        .map_err(|_| Error::CapacityOverflow { requested: entries })?;
    let mut scratch: Vec<SlotCell<T>> = Vec::new();
    scratch
        .try_reserve_exact(entries)
        .map_err(|_| Error::AllocFailed { requested: entries })
}

impl<K, V> HandleTable<K, V> {
    pub(crate) fn new(indexed: bool) -> Self {
        Self {
            index: indexed.then(HashTable::new),
            slots: SlotMap::with_key(),
        }
    }

    pub(crate) fn with_capacity(capacity: usize, indexed: bool) -> Result<Self> {
        try_reserve_cells::<Slot<K, V>>(capacity)?;
        let index = if indexed {
            let mut index = HashTable::new();
            index
                .try_reserve(capacity, |_: &DefaultKey| 0)
                .map_err(|e| Error::from_reserve(e, capacity))?;
            Some(index)
        } else {
            None
        };
        Ok(Self {
            index,
            slots: SlotMap::with_capacity_and_key(capacity),
        })
    }

    pub(crate) fn is_indexed(&self) -> bool {
        self.index.is_some()
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    /// Make room for one more entry so the following `insert` cannot fail.
    pub(crate) fn try_reserve_one(&mut self) -> Result<()> {
        let requested = self.slots.len() + 1;
        if let Some(index) = &mut self.index {
            let slots = &self.slots;
            index
                .try_reserve(1, |&k| slots.get(k).map_or(0, |s| s.hash))
                .map_err(|e| Error::from_reserve(e, requested))?;
        }
        if self.slots.len() == self.slots.capacity() {
            // A full SlotMap has no free cells; the next insert would
            // double its backing Vec. Grow now, after the scratch attempt.
            let grown = self.slots.capacity().saturating_mul(2).max(requested);
            try_reserve_cells::<Slot<K, V>>(grown)?;
            self.slots.reserve(grown - self.slots.len());
        }
        Ok(())
    }

    /// Locate the entry whose key satisfies `eq`. With a hash, only the
    /// matching index bucket is probed; otherwise every slot is visited.
    pub(crate) fn find(&self, hash: Option<u64>, mut eq: impl FnMut(&K) -> bool) -> Option<Handle> {
        match (&self.index, hash) {
            (Some(index), Some(hash)) => index
                .find(hash, |&k| self.slots.get(k).map_or(false, |s| eq(s.key.get())))
                .map(|&k| Handle(k)),
            _ => self
                .slots
                .iter()
                .find(|(_, s)| eq(s.key.get()))
                .map(|(k, _)| Handle(k)),
        }
    }

    /// Insert an entry whose key is known to be absent. `hash` is ignored
    /// for unindexed tables.
    pub(crate) fn insert(&mut self, hash: u64, key: Retained<K>, value: Retained<V>) -> Handle {
        let k = self.slots.insert(Slot { key, value, hash });
        if let Some(index) = &mut self.index {
            let slots = &self.slots;
            let _ = index.insert_unique(hash, k, |&kk| slots.get(kk).map_or(0, |s| s.hash));
        }
        Handle(k)
    }

    pub(crate) fn remove(&mut self, handle: Handle) -> Option<(Retained<K>, Retained<V>)> {
        let slot = self.slots.remove(handle.0)?;
        if let Some(index) = &mut self.index {
            match index.find_entry(slot.hash, |&kk| kk == handle.0) {
                Ok(entry) => {
                    let _ = entry.remove();
                }
                Err(_) => debug_assert!(false, "indexed slot missing from hash index"),
            }
        }
        Some((slot.key, slot.value))
    }

    /// Swap in a new value for a live entry and hand back the old one.
    pub(crate) fn replace_value(&mut self, handle: Handle, value: Retained<V>) -> Retained<V> {
        let slot = self
            .slots
            .get_mut(handle.0)
            .expect("handle must come from a find on the same table");
        core::mem::replace(&mut slot.value, value)
    }

    pub(crate) fn value(&self, handle: Handle) -> Option<&V> {
        self.slots.get(handle.0).map(|s| s.value.get())
    }

    /// Detach every entry. The table is empty and consistent before the
    /// returned iterator yields its first item.
    pub(crate) fn take_all(&mut self) -> impl Iterator<Item = (Retained<K>, Retained<V>)> {
        if let Some(index) = &mut self.index {
            index.clear();
        }
        core::mem::take(&mut self.slots)
            .into_iter()
            .map(|(_, s)| (s.key, s.value))
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&K, &V)> + '_ {
        self.slots.values().map(|s| (s.key.get(), s.value.get()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn put(t: &mut HandleTable<String, i32>, hash: u64, k: &str, v: i32) -> Handle {
        t.try_reserve_one().unwrap();
        t.insert(hash, Retained::new(k.to_string()), Retained::new(v))
    }

    fn lookup(t: &HandleTable<String, i32>, hash: Option<u64>, k: &str) -> Option<Handle> {
        t.find(hash, |stored| stored == k)
    }

    fn drain(t: &mut HandleTable<String, i32>) {
        for (k, v) in t.take_all() {
            k.into_inner();
            v.into_inner();
        }
    }

    /// Under a constant hash every key shares one bucket; `eq` picks the entry.
    #[test]
    fn colliding_hashes_resolve_by_equality() {
        let mut t = HandleTable::with_capacity(0, true).unwrap();
        let ha = put(&mut t, 5, "a", 1);
        let hb = put(&mut t, 5, "b", 2);
        assert_ne!(ha, hb);
        assert_eq!(lookup(&t, Some(5), "a"), Some(ha));
        assert_eq!(lookup(&t, Some(5), "b"), Some(hb));
        assert_eq!(lookup(&t, Some(5), "c"), None);
        assert_eq!(t.value(hb), Some(&2));
        drain(&mut t);
    }

    /// Unindexed tables find entries by scanning, whatever hash is passed.
    #[test]
    fn linear_scan_without_index() {
        let mut t = HandleTable::with_capacity(4, false).unwrap();
        assert!(!t.is_indexed());
        for (i, k) in ["x", "y", "z"].iter().enumerate() {
            put(&mut t, 0, k, i as i32);
        }
        let h = lookup(&t, None, "y").expect("scan finds y");
        assert_eq!(t.value(h), Some(&1));
        assert!(lookup(&t, None, "w").is_none());
        drain(&mut t);
    }

    /// The probe only calls `eq` for keys in the matching bucket.
    #[test]
    fn indexed_find_skips_other_hashes() {
        let mut t = HandleTable::with_capacity(0, true).unwrap();
        put(&mut t, 1, "one", 1);
        put(&mut t, 2, "two", 2);
        let mut seen = Vec::new();
        let found = t.find(Some(2), |k| {
            seen.push(k.clone());
            k == "two"
        });
        assert!(found.is_some());
        assert_eq!(seen, vec!["two".to_string()]);
        drain(&mut t);
    }

    /// Removing unlinks the slot from the index; the stale handle never
    /// aliases a later entry even if the slot is reused.
    #[test]
    fn remove_then_reinsert_uses_fresh_handle() {
        let mut t = HandleTable::with_capacity(0, true).unwrap();
        let h1 = put(&mut t, 9, "k", 1);
        let (k, v) = t.remove(h1).expect("present");
        assert_eq!((k.into_inner(), v.into_inner()), ("k".to_string(), 1));
        assert!(lookup(&t, Some(9), "k").is_none());
        assert!(t.remove(h1).is_none());

        let h2 = put(&mut t, 9, "k", 2);
        assert_ne!(h1, h2);
        assert!(t.value(h1).is_none());
        assert_eq!(t.value(h2), Some(&2));
        drain(&mut t);
    }

    #[test]
    fn replace_value_returns_previous() {
        let mut t = HandleTable::with_capacity(0, false).unwrap();
        let h = put(&mut t, 0, "k", 1);
        let old = t.replace_value(h, Retained::new(2));
        assert_eq!(old.into_inner(), 1);
        assert_eq!(t.value(h), Some(&2));
        assert_eq!(t.len(), 1);
        drain(&mut t);
    }

    /// Growth of the index rehashes from cached hashes; all keys stay reachable.
    #[test]
    fn growth_keeps_every_entry_reachable() {
        let mut t = HandleTable::with_capacity(0, true).unwrap();
        for i in 0..200u64 {
            put(&mut t, i % 17, &format!("k{i}"), i as i32);
        }
        for i in 0..200u64 {
            let h = lookup(&t, Some(i % 17), &format!("k{i}")).expect("reachable");
            assert_eq!(t.value(h), Some(&(i as i32)));
        }
        drain(&mut t);
    }

    #[test]
    fn take_all_empties_before_yielding() {
        let mut t = HandleTable::with_capacity(0, true).unwrap();
        for k in ["a", "b", "c"] {
            put(&mut t, 3, k, 0);
        }
        let items: Vec<_> = t.take_all().collect();
        assert_eq!(t.len(), 0);
        assert!(lookup(&t, Some(3), "a").is_none());
        let keys: BTreeSet<String> = items
            .into_iter()
            .map(|(k, v)| {
                v.into_inner();
                k.into_inner()
            })
            .collect();
        assert_eq!(keys.len(), 3);
    }

    #[test]
    fn oversized_capacity_is_reported() {
        let r = HandleTable::<String, i32>::with_capacity(usize::MAX, false);
        assert!(matches!(r, Err(Error::CapacityOverflow { requested: usize::MAX })));
        let r = HandleTable::<String, i32>::with_capacity(usize::MAX, true);
        assert!(matches!(r, Err(Error::CapacityOverflow { .. })));
    }

    /// A capacity with a valid layout that no allocator can supply comes
    /// back as an error on both paths; nothing is pre-sized from it.
    #[test]
    fn unobtainable_capacity_is_an_error_not_an_abort() {
        let huge = 1usize << 44;
        let r = HandleTable::<String, i32>::with_capacity(huge, false);
        assert!(matches!(r, Err(Error::AllocFailed { requested }) if requested == huge));
        let r = HandleTable::<String, i32>::with_capacity(huge, true);
        assert!(matches!(
            r,
            Err(Error::AllocFailed { .. } | Error::CapacityOverflow { .. })
        ));
    }

    /// Slots are grown by `try_reserve_one`, so `insert` never reallocates.
    #[test]
    fn reserve_one_grows_full_slots_ahead_of_insert() {
        let mut t = HandleTable::with_capacity(2, false).unwrap();
        for i in 0..40 {
            t.try_reserve_one().unwrap();
            assert!(t.slots.capacity() > t.len(), "room exists before insert");
            t.insert(0, Retained::new(format!("k{i}")), Retained::new(i));
        }
        assert_eq!(t.len(), 40);
        drain(&mut t);
    }
}
