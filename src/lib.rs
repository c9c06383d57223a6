//! callback-hashmap: a single-threaded mutable map whose entries' lifetimes
//! are driven by caller-supplied retain/release callbacks.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: reproduce the observable contract of a C-style mutable
//!   dictionary (exact retain/release call counts, null values distinct
//!   from absent keys) with Rust ownership doing the bookkeeping.
//! - Layers:
//!   - `Retained<T>`: linear holder for the one counted reference a
//!     `retain` call produced; it must be handed back to `release`.
//!   - `CallbackSet<T>`: optional `retain`/`release`/`equal`/`hash`/
//!     `describe` closures with identity fallbacks.
//!   - `HandleTable<K, V>`: structural storage (SlotMap plus an optional
//!     hashbrown index). Never calls `retain`/`release`.
//!   - `CallbackHashMap<K, V>`: public API; applies the callback contract
//!     on top of `HandleTable`.
//!
//! Constraints
//! - Single-threaded: no locking. The boxed callbacks are not `Send`, so
//!   neither is the map.
//! - Keys unique under the active `equal`; `len` counts null-valued entries.
//! - Every live entry owns exactly one retained key and one retained value
//!   (`Option<V>`, where `None` is the null sentinel). Each is released
//!   exactly once: on `remove`, `remove_all`, value replacement in `set`,
//!   or drop of the map.
//! - With a key `hash`, lookups are O(1) on average; without one they scan.
//!
//! Callback ordering
//! - Storage is reserved before any `retain`, so an allocation error leaves
//!   both the map and the callback counts untouched.
//! - `set` on an existing key retains the new value before releasing the
//!   old one; storing the object that is already stored never frees it
//!   mid-call.
//! - `remove_all` and `Drop` detach every entry first and only then run
//!   `release`, so release callbacks observe an empty, consistent map.
//!
//! Hashing
//! - The key hash is computed once per operation from the caller's key and
//!   cached in the slot. Index growth rehashes from the cache; the user
//!   `hash` callback is never called for stored keys.
//! - The value-side `hash` is never used, and the value-side `equal` is
//!   only consulted by `contains_value`.
//!
//! Misuse
//! - `keys_and_values` borrows the map, so mutating while a snapshot is
//!   alive does not compile.
//! - Every mutating operation takes `&mut self`, and callbacks are
//!   `'static` closures that never receive the map. A callback can only
//!   reach the map again through shared ownership (`Rc<RefCell<_>>`), where
//!   the `RefCell` already rejects a nested mutable borrow.
//! - Dropping a `Retained` outside `release` panics (unless already
//!   unwinding), which surfaces accounting bugs immediately.

mod callbacks;
mod config;
mod error;
mod handle_table;
mod map;
mod retained;

// Public surface
pub use callbacks::{
    CallbackSet, DescribeCallBack, EqualCallBack, HashCallBack, Identity, KeyCallbacks,
    ReleaseCallBack, RetainCallBack, ValueCallbacks,
};
pub use config::Builder;
pub use error::{Error, Result};
pub use map::{CallbackHashMap, Snapshot};
