//! tiered-hashmap: a single-threaded hash map whose buckets hold a few
//! entries in place and spill into a per-bucket overflow array.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: a map with one bucket per hash index, each bucket a small
//!   two-tier store, so short collision chains stay inside the bucket
//!   array and long ones cost one extra indirection.
//! - Layers:
//!   - `bucket`: `Slot` (vacant / tombstone / live) and `Bucket` (three
//!     inline slots plus an optional power-of-two overflow `Vec`).
//!   - `TieredHashMap<K, V, S, A>`: owns the bucket array; implements
//!     insert/get/remove and the load-factor driven resize.
//!   - `iter`: a (bucket, position) cursor over the bucket array and the
//!     owning/draining/mutable variants built on it.
//!
//! Constraints
//! - Capacity (number of buckets) is a power of two, at least 2; the
//!   bucket for a key is `hash & (capacity - 1)`.
//! - At most one live entry per key (by `Eq`).
//! - `len / capacity < 0.7` after every insert; `>= 0.2` after every
//!   remove unless the capacity is already 2.
//! - Removal leaves a tombstone. Tombstones are only reclaimed when the
//!   bucket array is rebuilt.
//!
//! Allocation and failure
//! - Every bucket array and overflow array is reserved through the map's
//!   `Allocator`. Reservation is the only thing that can fail; lookups
//!   never fail.
//! - Resize is build-then-swap: the new bucket array and every overflow
//!   array it needs are allocated before any entry moves. A failure
//!   discards the half-built array and the map is untouched.
//! - An insert that fails to allocate adds nothing and modifies nothing.
//!
//! Hasher and rehashing invariants
//! - Each entry stores its `u64` hash; resize uses the stored hash and
//!   never calls `K: Hash` or `K: Eq`.
//!
//! Reentrancy
//! - Probes call user code (`Hash`, `Eq`). A debug-only guard panics if
//!   that code re-enters the same map; release builds skip the check.
//!
//! Notes and non-goals
//! - No iteration order guarantee; order follows bucket then slot.
//! - Not `Sync`; mutation takes `&mut self`.
//! - No persistence.
//!
//! ```
//! use tiered_hashmap::hash::FnvBuildHasher;
//! use tiered_hashmap::TieredHashMap;
//!
//! let mut map = TieredHashMap::with_hasher(FnvBuildHasher);
//! map.insert("key1", "test1").unwrap();
//! assert_eq!(map.get("key1"), Some(&"test1"));
//! assert_eq!(map.remove("key1"), Some("test1"));
//! assert!(map.is_empty());
//! ```

pub mod alloc;
mod bucket;
pub mod error;
pub mod hash;
pub mod iter;
mod probe_guard;
mod tiered_hash_map;
mod tiered_hash_map_proptest;
mod trace;

// Public surface
pub use alloc::{Allocator, Budget, Global};
pub use error::MapError;
pub use tiered_hash_map::{
    TieredHashMap, DEFAULT_OVERFLOW_CAPACITY, INLINE_SLOTS, MAX_LOAD, MIN_CAPACITY, MIN_LOAD,
};
