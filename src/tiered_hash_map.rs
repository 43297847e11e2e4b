//! TieredHashMap: bucket array, insert/lookup/remove and resize policy.

use crate::alloc::{Allocator, Global};
use crate::bucket::{Bucket, Entry, Probe};
use crate::error::MapError;
use crate::iter::{Drain, IntoIter, Iter, IterMut, Keys, Values, ValuesMut};
use crate::probe_guard::ProbeGuard;
use crate::trace::log_event;
use core::borrow::Borrow;
use core::fmt;
use core::hash::{BuildHasher, Hash};
use core::mem;
use core::ops::Index;
use hashbrown::hash_map::DefaultHashBuilder;

/// Slots stored in place in every bucket.
pub const INLINE_SLOTS: usize = crate::bucket::INLINE_SLOTS;
/// Length of a bucket's overflow array when first allocated.
pub const DEFAULT_OVERFLOW_CAPACITY: usize = crate::bucket::DEFAULT_OVERFLOW_CAPACITY;
/// Smallest number of buckets a map ever has.
pub const MIN_CAPACITY: usize = 2;
/// An insert that would bring `len / capacity` to this value grows first.
pub const MAX_LOAD: f64 = 0.7;
/// A remove that leaves `len / capacity` below this value shrinks after.
pub const MIN_LOAD: f64 = 0.2;

#[inline]
fn reaches_max_load(len: usize, capacity: usize) -> bool {
    len as f64 / capacity as f64 >= MAX_LOAD
}

#[inline]
fn below_min_load(len: usize, capacity: usize) -> bool {
    (len as f64 / capacity as f64) < MIN_LOAD
}

/// Clamp to `MIN_CAPACITY` and round up to a power of two.
fn normalize_capacity(requested: usize) -> Result<usize, MapError> {
    requested
        .max(MIN_CAPACITY)
        .checked_next_power_of_two()
        .ok_or(MapError::CapacityOverflow)
}

/// Smallest valid capacity of at least `requested` buckets that keeps
/// `len` entries below the maximum load.
fn capacity_for(len: usize, requested: usize) -> Result<usize, MapError> {
    let mut capacity = normalize_capacity(requested)?;
    while reaches_max_load(len, capacity) {
        capacity = normalize_capacity(capacity.checked_mul(2).ok_or(MapError::CapacityOverflow)?)?;
    }
    Ok(capacity)
}

fn alloc_buckets<K, V, A: Allocator>(capacity: usize, alloc: &A) -> Result<Vec<Bucket<K, V>>, MapError> {
    let mut buckets = Vec::new();
    alloc.try_reserve(&mut buckets, capacity)?;
    buckets.resize_with(capacity, Bucket::new);
    Ok(buckets)
}

/// A hash map whose buckets hold `INLINE_SLOTS` entries in place and spill
/// into a per-bucket overflow array.
///
/// The bucket for a key is `hash & (capacity - 1)`. Within a bucket the
/// entries are scanned linearly. Removal leaves a tombstone that is only
/// reclaimed when the bucket array is rebuilt by a resize.
///
/// Every operation that allocates is fallible. On `Err` no entry has been
/// added, removed or modified, and a failed resize leaves the bucket array
/// exactly as it was.
pub struct TieredHashMap<K, V, S = DefaultHashBuilder, A: Allocator = Global> {
    buckets: Vec<Bucket<K, V>>,
    len: usize,
    hasher: S,
    alloc: A,
    guard: ProbeGuard,
}

impl<K, V> TieredHashMap<K, V> {
    /// An empty map with `MIN_CAPACITY` buckets.
    ///
    /// # Panics
    ///
    /// Panics if the bucket array cannot be allocated.
    pub fn new() -> Self {
        Self::with_capacity_and_hasher(MIN_CAPACITY, DefaultHashBuilder::default())
    }

    /// # Panics
    ///
    /// Panics if the bucket array cannot be allocated.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_hasher(capacity, DefaultHashBuilder::default())
    }
}

impl<K, V, S> TieredHashMap<K, V, S> {
    /// # Panics
    ///
    /// Panics if the bucket array cannot be allocated.
    pub fn with_hasher(hasher: S) -> Self {
        Self::with_capacity_and_hasher(MIN_CAPACITY, hasher)
    }

    /// # Panics
    ///
    /// Panics if the bucket array cannot be allocated.
    pub fn with_capacity_and_hasher(capacity: usize, hasher: S) -> Self {
        Self::with_capacity_and_hasher_in(capacity, hasher, Global)
    }
}

impl<K, V, S, A: Allocator> TieredHashMap<K, V, S, A> {
    /// Build an empty map with at least `capacity` buckets (clamped to
    /// `MIN_CAPACITY`, rounded up to a power of two), hashing with `hasher`
    /// and allocating through `alloc`.
    pub fn try_with_capacity_and_hasher_in(
        capacity: usize,
        hasher: S,
        alloc: A,
    ) -> Result<Self, MapError> {
        let capacity = normalize_capacity(capacity)?;
        let buckets = alloc_buckets(capacity, &alloc)?;
        Ok(Self {
            buckets,
            len: 0,
            hasher,
            alloc,
            guard: ProbeGuard::new(),
        })
    }

    /// # Panics
    ///
    /// Panics if the bucket array cannot be allocated.
    pub fn with_capacity_and_hasher_in(capacity: usize, hasher: S, alloc: A) -> Self {
        match Self::try_with_capacity_and_hasher_in(capacity, hasher, alloc) {
            Ok(map) => map,
            Err(err) => panic!("TieredHashMap construction failed: {err}"),
        }
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of buckets. Always a power of two, at least `MIN_CAPACITY`.
    pub fn capacity(&self) -> usize {
        self.buckets.len()
    }

    /// `len / capacity`.
    pub fn load_factor(&self) -> f64 {
        self.len as f64 / self.capacity() as f64
    }

    pub fn hasher(&self) -> &S {
        &self.hasher
    }

    pub fn allocator(&self) -> &A {
        &self.alloc
    }

    /// Live entries per bucket, in bucket order.
    pub fn bucket_lens(&self) -> impl Iterator<Item = usize> + '_ {
        self.buckets.iter().map(Bucket::live_len)
    }

    /// Drop every entry, keeping the current number of buckets. Overflow
    /// arrays and tombstones are released.
    ///
    /// `len` drops with each bucket before its entries are dropped, so a
    /// panicking destructor leaves the map consistent.
    pub fn clear(&mut self) {
        for bucket in &mut self.buckets {
            let old = mem::replace(bucket, Bucket::new());
            self.len -= old.live_len();
            drop(old);
        }
    }

    /// Entries in bucket-then-slot order. The order depends on the hashes
    /// and the capacity, not on the keys.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter::new(&self.buckets, self.len)
    }

    pub fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        IterMut::new(&mut self.buckets, self.len)
    }

    pub fn keys(&self) -> Keys<'_, K, V> {
        Keys::new(self.iter())
    }

    pub fn values(&self) -> Values<'_, K, V> {
        Values::new(self.iter())
    }

    pub fn values_mut(&mut self) -> ValuesMut<'_, K, V> {
        ValuesMut::new(self.iter_mut())
    }

    /// Remove every entry, yielding them. Entries not consumed are dropped
    /// with the iterator; the number of buckets is unchanged.
    pub fn drain(&mut self) -> Drain<'_, K, V> {
        Drain::new(&mut self.buckets, &mut self.len)
    }

    #[inline]
    fn bucket_index(&self, hash: u64) -> usize {
        (hash as usize) & (self.buckets.len() - 1)
    }

    /// Rebuild the bucket array at `capacity` buckets, moving every live
    /// entry by its stored hash. All allocation happens before the first
    /// entry moves, so a failure leaves the map untouched.
    fn rebuild(&mut self, capacity: usize) -> Result<(), MapError> {
        let mask = capacity - 1;
        let mut fresh: Vec<Bucket<K, V>> = alloc_buckets(capacity, &self.alloc)?;

        let mut counts: Vec<usize> = Vec::new();
        self.alloc.try_reserve(&mut counts, capacity)?;
        counts.resize(capacity, 0);
        for entry in self.buckets.iter().flat_map(Bucket::entries) {
            counts[(entry.hash as usize) & mask] += 1;
        }
        for (bucket, &n) in fresh.iter_mut().zip(&counts) {
            bucket.reserve_for(n, &self.alloc)?;
        }

        // Nothing below allocates or calls user code.
        let old = mem::replace(&mut self.buckets, fresh);
        log_event!(
            debug,
            from = old.len(),
            to = capacity,
            len = self.len,
            "rebuilding bucket array"
        );
        for entry in old.into_iter().flat_map(Bucket::into_entries) {
            self.buckets[(entry.hash as usize) & mask].push_unique(entry);
        }
        Ok(())
    }

    /// Resize to `requested` buckets, rounded up to a power of two and
    /// raised if needed so the current entries stay below `MAX_LOAD`.
    ///
    /// Tombstones are dropped in the process. On `Err` the map is unchanged.
    pub fn resize(&mut self, requested: usize) -> Result<(), MapError> {
        let capacity = capacity_for(self.len, requested)?;
        self.rebuild(capacity)
    }

    /// Make room for `additional` more entries without crossing `MAX_LOAD`.
    pub fn reserve(&mut self, additional: usize) -> Result<(), MapError> {
        let wanted = self
            .len
            .checked_add(additional)
            .ok_or(MapError::CapacityOverflow)?;
        let capacity = capacity_for(wanted, self.capacity())?;
        if capacity > self.capacity() {
            self.rebuild(capacity)?;
        }
        Ok(())
    }

    /// Resize to the smallest capacity that holds the current entries.
    pub fn shrink_to_fit(&mut self) -> Result<(), MapError> {
        self.resize(MIN_CAPACITY)
    }

    /// Halve the capacity until the load is back at `MIN_LOAD` or the
    /// capacity reaches `MIN_CAPACITY`. Failure is not reported: the map
    /// stays valid at its current capacity.
    fn shrink_after_remove(&mut self) {
        let capacity = self.capacity();
        if capacity <= MIN_CAPACITY || !below_min_load(self.len, capacity) {
            return;
        }
        let mut target = capacity / 2;
        while target > MIN_CAPACITY && below_min_load(self.len, target) {
            target /= 2;
        }
        if let Err(_err) = self.rebuild(target) {
            log_event!(
                warn,
                error = %_err,
                capacity,
                target,
                "shrink failed, keeping current capacity"
            );
        }
    }
}

impl<K, V, S, A> TieredHashMap<K, V, S, A>
where
    K: Eq + Hash,
    S: BuildHasher,
    A: Allocator,
{
    fn make_hash<Q>(&self, q: &Q) -> u64
    where
        Q: ?Sized + Hash,
    {
        self.hasher.hash_one(q)
    }

    /// `(bucket, position)` of the live entry for `q`.
    fn find_position<Q>(&self, q: &Q) -> Option<(usize, usize)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let _g = self.guard.enter("lookup");
        let hash = self.make_hash(q);
        let index = self.bucket_index(hash);
        let pos = self.buckets[index].find(hash, |k| k.borrow() == q)?;
        Some((index, pos))
    }

    pub fn get<Q>(&self, q: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.get_key_value(q).map(|(_, v)| v)
    }

    pub fn get_key_value<Q>(&self, q: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let (index, pos) = self.find_position(q)?;
        let entry = self.buckets[index].entry(pos)?;
        Some((&entry.key, &entry.value))
    }

    pub fn get_mut<Q>(&mut self, q: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let (index, pos) = self.find_position(q)?;
        self.buckets[index].entry_mut(pos).map(|e| &mut e.value)
    }

    pub fn contains_key<Q>(&self, q: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.find_position(q).is_some()
    }

    /// Insert `key -> value`, returning the previous value if the key was
    /// present.
    ///
    /// Replacing a value never allocates. Adding a key grows the bucket
    /// array first if the new entry would bring the load to `MAX_LOAD`,
    /// and may allocate or grow the bucket's overflow array. If any of that
    /// fails, `key` and `value` are dropped and no entry is added or
    /// modified; a resize that already completed is kept.
    pub fn insert(&mut self, key: K, value: V) -> Result<Option<V>, MapError> {
        let (hash, probe) = {
            let _g = self.guard.enter("insert");
            let hash = self.make_hash(&key);
            let index = self.bucket_index(hash);
            (hash, self.buckets[index].locate(hash, |k| *k == key))
        };

        let mut candidate = match probe {
            Probe::Found(pos) => {
                let index = self.bucket_index(hash);
                let entry = self.buckets[index]
                    .entry_mut(pos)
                    .expect("located entry must be live");
                return Ok(Some(mem::replace(&mut entry.value, value)));
            }
            Probe::Vacant(candidate) => candidate,
        };

        if reaches_max_load(self.len + 1, self.capacity()) {
            let capacity = capacity_for(self.len + 1, self.capacity() + 1)?;
            self.rebuild(capacity)?;
            // The key is known to be absent; only a free position is needed.
            candidate = self.buckets[self.bucket_index(hash)].first_free();
        }

        let index = self.bucket_index(hash);
        let bucket = &mut self.buckets[index];
        let pos = bucket.claim(candidate, &self.alloc)?;
        bucket.fill(pos, Entry { key, value, hash });
        self.len += 1;
        Ok(None)
    }

    /// Remove `q`, returning its value. Absent keys are a no-op.
    pub fn remove<Q>(&mut self, q: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.remove_entry(q).map(|(_, v)| v)
    }

    /// Remove `q`, returning the stored key and value.
    ///
    /// The slot becomes a tombstone. If the load then drops below
    /// `MIN_LOAD`, the bucket array shrinks.
    pub fn remove_entry<Q>(&mut self, q: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let (index, pos) = self.find_position(q)?;
        let entry = self.buckets[index].take(pos)?;
        self.len -= 1;
        self.shrink_after_remove();
        Some((entry.key, entry.value))
    }

    /// Check every structural invariant. Test-only.
    #[cfg(test)]
    pub(crate) fn assert_invariants(&self) {
        let capacity = self.capacity();
        assert!(capacity.is_power_of_two() && capacity >= MIN_CAPACITY);
        let mut live = 0;
        for (index, bucket) in self.buckets.iter().enumerate() {
            bucket.assert_invariants();
            for entry in bucket.entries() {
                assert_eq!(entry.hash, self.make_hash(&entry.key), "stale stored hash");
                assert_eq!(self.bucket_index(entry.hash), index, "entry in wrong bucket");
                live += 1;
            }
        }
        assert_eq!(live, self.len, "map len drifted");
    }
}

impl<K, V, S: Default> Default for TieredHashMap<K, V, S> {
    fn default() -> Self {
        Self::with_hasher(S::default())
    }
}

impl<K, V, S, A> fmt::Debug for TieredHashMap<K, V, S, A>
where
    K: fmt::Debug,
    V: fmt::Debug,
    A: Allocator,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K, V, S, A, Q> Index<&Q> for TieredHashMap<K, V, S, A>
where
    K: Eq + Hash + Borrow<Q>,
    Q: ?Sized + Hash + Eq,
    S: BuildHasher,
    A: Allocator,
{
    type Output = V;

    /// # Panics
    ///
    /// Panics if the key is not present.
    fn index(&self, key: &Q) -> &V {
        self.get(key).expect("key not present in TieredHashMap")
    }
}

impl<K, V, S, A> Extend<(K, V)> for TieredHashMap<K, V, S, A>
where
    K: Eq + Hash,
    S: BuildHasher,
    A: Allocator,
{
    /// # Panics
    ///
    /// Panics if an insert fails to allocate.
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            if let Err(err) = self.insert(k, v) {
                panic!("TieredHashMap::extend failed: {err}");
            }
        }
    }
}

impl<K, V, S> FromIterator<(K, V)> for TieredHashMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher + Default,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::with_hasher(S::default());
        map.extend(iter);
        map
    }
}

impl<K, V, S, A: Allocator> IntoIterator for TieredHashMap<K, V, S, A> {
    type Item = (K, V);
    type IntoIter = IntoIter<K, V>;

    fn into_iter(self) -> IntoIter<K, V> {
        IntoIter::new(self.buckets, self.len)
    }
}

impl<'a, K, V, S, A: Allocator> IntoIterator for &'a TieredHashMap<K, V, S, A> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Iter<'a, K, V> {
        self.iter()
    }
}

impl<'a, K, V, S, A: Allocator> IntoIterator for &'a mut TieredHashMap<K, V, S, A> {
    type Item = (&'a K, &'a mut V);
    type IntoIter = IterMut<'a, K, V>;

    fn into_iter(self) -> IterMut<'a, K, V> {
        self.iter_mut()
    }
}
