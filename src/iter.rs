//! Iterators over a `TieredHashMap`.
//!
//! All of them walk the bucket array in order and, inside a bucket, the
//! inline slots followed by the overflow slots. Unoccupied buckets are
//! skipped without looking at their slots. Each iterator knows how many
//! entries remain, so `len()` is exact.

use crate::bucket::{Bucket, Entry, IntoEntries, Slot, SlotsMut};
use core::iter::FusedIterator;

/// Shared iterator: a cursor of (bucket, position) over the map.
///
/// Starts at bucket 0, position 0, and is exhausted once the bucket index
/// reaches the capacity.
pub struct Iter<'a, K, V> {
    buckets: &'a [Bucket<K, V>],
    bucket: usize,
    pos: usize,
    remaining: usize,
}

impl<'a, K, V> Iter<'a, K, V> {
    pub(crate) fn new(buckets: &'a [Bucket<K, V>], len: usize) -> Self {
        Self {
            buckets,
            bucket: 0,
            pos: 0,
            remaining: len,
        }
    }
}

// Manual impl: cloning the cursor must not require `K: Clone`.
impl<K, V> Clone for Iter<'_, K, V> {
    fn clone(&self) -> Self {
        Self {
            buckets: self.buckets,
            bucket: self.bucket,
            pos: self.pos,
            remaining: self.remaining,
        }
    }
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(bucket) = self.buckets.get(self.bucket) {
            if bucket.is_occupied() {
                while let Some(slot) = bucket.slot(self.pos) {
                    self.pos += 1;
                    match slot {
                        Slot::Live(Entry { key, value, .. }) => {
                            self.remaining -= 1;
                            return Some((key, value));
                        }
                        Slot::Tombstone => {}
                        // Nothing live past a vacant slot.
                        Slot::Vacant => break,
                    }
                }
            }
            self.bucket += 1;
            self.pos = 0;
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}
impl<K, V> FusedIterator for Iter<'_, K, V> {}

/// Iterator with mutable access to the values.
pub struct IterMut<'a, K, V> {
    buckets: core::slice::IterMut<'a, Bucket<K, V>>,
    current: Option<SlotsMut<'a, K, V>>,
    remaining: usize,
}

impl<'a, K, V> IterMut<'a, K, V> {
    pub(crate) fn new(buckets: &'a mut [Bucket<K, V>], len: usize) -> Self {
        Self {
            buckets: buckets.iter_mut(),
            current: None,
            remaining: len,
        }
    }
}

impl<'a, K, V> Iterator for IterMut<'a, K, V> {
    type Item = (&'a K, &'a mut V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(slots) = &mut self.current {
                for slot in slots.by_ref() {
                    match slot {
                        Slot::Live(Entry { key, value, .. }) => {
                            self.remaining -= 1;
                            return Some((&*key, value));
                        }
                        Slot::Tombstone => {}
                        Slot::Vacant => break,
                    }
                }
                self.current = None;
            }
            let bucket = self.buckets.next()?;
            if bucket.is_occupied() {
                self.current = Some(bucket.slots_mut());
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for IterMut<'_, K, V> {}
impl<K, V> FusedIterator for IterMut<'_, K, V> {}

pub struct Keys<'a, K, V> {
    inner: Iter<'a, K, V>,
}

impl<'a, K, V> Keys<'a, K, V> {
    pub(crate) fn new(inner: Iter<'a, K, V>) -> Self {
        Self { inner }
    }
}

impl<'a, K, V> Iterator for Keys<'a, K, V> {
    type Item = &'a K;

    fn next(&mut self) -> Option<&'a K> {
        self.inner.next().map(|(k, _)| k)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for Keys<'_, K, V> {}
impl<K, V> FusedIterator for Keys<'_, K, V> {}

pub struct Values<'a, K, V> {
    inner: Iter<'a, K, V>,
}

impl<'a, K, V> Values<'a, K, V> {
    pub(crate) fn new(inner: Iter<'a, K, V>) -> Self {
        Self { inner }
    }
}

impl<'a, K, V> Iterator for Values<'a, K, V> {
    type Item = &'a V;

    fn next(&mut self) -> Option<&'a V> {
        self.inner.next().map(|(_, v)| v)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for Values<'_, K, V> {}
impl<K, V> FusedIterator for Values<'_, K, V> {}

pub struct ValuesMut<'a, K, V> {
    inner: IterMut<'a, K, V>,
}

impl<'a, K, V> ValuesMut<'a, K, V> {
    pub(crate) fn new(inner: IterMut<'a, K, V>) -> Self {
        Self { inner }
    }
}

impl<'a, K, V> Iterator for ValuesMut<'a, K, V> {
    type Item = &'a mut V;

    fn next(&mut self) -> Option<&'a mut V> {
        self.inner.next().map(|(_, v)| v)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for ValuesMut<'_, K, V> {}
impl<K, V> FusedIterator for ValuesMut<'_, K, V> {}

/// Owning iterator returned by `TieredHashMap::into_iter`.
pub struct IntoIter<K, V> {
    buckets: std::vec::IntoIter<Bucket<K, V>>,
    current: Option<IntoEntries<K, V>>,
    remaining: usize,
}

impl<K, V> IntoIter<K, V> {
    pub(crate) fn new(buckets: Vec<Bucket<K, V>>, len: usize) -> Self {
        Self {
            buckets: buckets.into_iter(),
            current: None,
            remaining: len,
        }
    }
}

impl<K, V> Iterator for IntoIter<K, V> {
    type Item = (K, V);

    fn next(&mut self) -> Option<(K, V)> {
        loop {
            if let Some(entry) = self.current.as_mut().and_then(Iterator::next) {
                self.remaining -= 1;
                return Some((entry.key, entry.value));
            }
            let bucket = self.buckets.next()?;
            self.current = bucket.is_occupied().then(|| bucket.into_entries());
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for IntoIter<K, V> {}
impl<K, V> FusedIterator for IntoIter<K, V> {}

/// Draining iterator returned by `TieredHashMap::drain`.
///
/// Each bucket leaves the map as a whole when the iterator reaches it, and
/// the map's length drops by that bucket's entries at the same moment, so
/// the map stays consistent even if the iterator is leaked.
pub struct Drain<'a, K, V> {
    buckets: core::slice::IterMut<'a, Bucket<K, V>>,
    current: Option<IntoEntries<K, V>>,
    map_len: &'a mut usize,
    remaining: usize,
}

impl<'a, K, V> Drain<'a, K, V> {
    pub(crate) fn new(buckets: &'a mut [Bucket<K, V>], map_len: &'a mut usize) -> Self {
        let remaining = *map_len;
        Self {
            buckets: buckets.iter_mut(),
            current: None,
            map_len,
            remaining,
        }
    }
}

impl<K, V> Iterator for Drain<'_, K, V> {
    type Item = (K, V);

    fn next(&mut self) -> Option<(K, V)> {
        loop {
            if let Some(entry) = self.current.as_mut().and_then(Iterator::next) {
                self.remaining -= 1;
                return Some((entry.key, entry.value));
            }
            let bucket = self.buckets.next()?;
            *self.map_len -= bucket.live_len();
            let taken = core::mem::replace(bucket, Bucket::new());
            self.current = taken.is_occupied().then(|| taken.into_entries());
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for Drain<'_, K, V> {}
impl<K, V> FusedIterator for Drain<'_, K, V> {}

impl<K, V> Drop for Drain<'_, K, V> {
    fn drop(&mut self) {
        self.for_each(drop);
    }
}

#[cfg(test)]
mod tests {
    use crate::hash::AvalancheBuildHasher;
    use crate::TieredHashMap;
    use core::hash::{BuildHasher, Hasher};
    use std::collections::BTreeSet;

    #[derive(Clone, Default)]
    struct ConstBuildHasher;
    struct ConstHasher;
    impl BuildHasher for ConstBuildHasher {
        type Hasher = ConstHasher;
        fn build_hasher(&self) -> ConstHasher {
            ConstHasher
        }
    }
    impl Hasher for ConstHasher {
        fn write(&mut self, _bytes: &[u8]) {}
        fn finish(&self) -> u64 {
            0
        }
    }

    fn sample(n: u64) -> TieredHashMap<u64, u64, AvalancheBuildHasher> {
        let mut m = TieredHashMap::with_hasher(AvalancheBuildHasher);
        for k in 0..n {
            m.insert(k, k * 3).unwrap();
        }
        m
    }

    /// Invariant: with `n` live entries the iterator yields exactly `n`
    /// distinct live entries, even when capacity far exceeds `n`.
    #[test]
    fn yields_each_live_entry_once() {
        for n in [0u64, 1, 2, 3, 10, 100] {
            let mut m = TieredHashMap::with_capacity_and_hasher(4096, AvalancheBuildHasher);
            for k in 0..n {
                m.insert(k, k).unwrap();
            }
            assert_eq!(m.iter().len(), n as usize);
            let keys: BTreeSet<u64> = m.iter().map(|(k, _)| *k).collect();
            assert_eq!(keys, (0..n).collect::<BTreeSet<_>>());
            assert_eq!(m.iter().count(), n as usize);
        }
    }

    #[test]
    fn skips_tombstones_in_inline_and_overflow() {
        let mut m = TieredHashMap::with_capacity_and_hasher(8, ConstBuildHasher);
        for k in 0..5u32 {
            m.insert(k, ()).unwrap();
        }
        m.remove(&1);
        m.remove(&3);
        let keys: Vec<u32> = m.keys().copied().collect();
        assert_eq!(keys, vec![0, 2, 4], "single bucket, position order");
    }

    #[test]
    fn restart_and_clone_resume() {
        let m = sample(20);
        let mut it = m.iter();
        let first: Vec<_> = it.by_ref().take(5).collect();
        let rest_a: Vec<_> = it.clone().collect();
        let rest_b: Vec<_> = it.collect();
        assert_eq!(rest_a, rest_b);
        assert_eq!(first.len() + rest_a.len(), 20);
        // A fresh iterator starts over.
        let again: Vec<_> = m.iter().take(5).collect();
        assert_eq!(first, again);
    }

    #[test]
    fn exhausted_iterator_stays_exhausted() {
        let m = sample(3);
        let mut it = m.iter();
        assert_eq!(it.by_ref().count(), 3);
        assert!(it.next().is_none());
        assert!(it.next().is_none());
        assert_eq!(it.len(), 0);
    }

    #[test]
    fn iter_mut_and_values_mut_update_in_place() {
        let mut m = sample(30);
        for (k, v) in m.iter_mut() {
            *v += *k;
        }
        for v in m.values_mut() {
            *v += 1;
        }
        for k in 0..30u64 {
            assert_eq!(m.get(&k), Some(&(k * 4 + 1)));
        }
        let total: u64 = m.values().sum();
        assert_eq!(total, (0..30u64).map(|k| k * 4 + 1).sum());
    }

    /// Invariant: mutable iteration over a bucket with tombstones in both
    /// the inline and overflow ranges visits each live value exactly once.
    #[test]
    fn iter_mut_skips_tombstones_in_inline_and_overflow() {
        let mut m = TieredHashMap::with_capacity_and_hasher(16, ConstBuildHasher);
        for k in 0..10u32 {
            m.insert(k, k).unwrap();
        }
        // Position 1 is inline, positions 6 and 8 are in overflow.
        for k in [1u32, 6, 8] {
            assert_eq!(m.remove(&k), Some(k));
        }
        assert_eq!(m.capacity(), 16, "no shrink at 7 of 16");

        let mut visited = 0;
        for (_, v) in m.iter_mut() {
            *v += 100;
            visited += 1;
        }
        assert_eq!(visited, 7);
        assert_eq!(m.values_mut().len(), 7);
        for v in m.values_mut() {
            *v += 1000;
        }

        let live: Vec<(u32, u32)> = m.iter().map(|(k, v)| (*k, *v)).collect();
        let expected: Vec<(u32, u32)> = [0u32, 2, 3, 4, 5, 7, 9]
            .into_iter()
            .map(|k| (k, k + 1100))
            .collect();
        assert_eq!(live, expected, "single bucket, position order");
    }

    #[test]
    fn into_iter_yields_owned_pairs() {
        let m = sample(25);
        let it = m.into_iter();
        assert_eq!(it.len(), 25);
        let mut pairs: Vec<(u64, u64)> = it.collect();
        pairs.sort_unstable();
        assert_eq!(pairs, (0..25u64).map(|k| (k, k * 3)).collect::<Vec<_>>());
    }

    #[test]
    fn drain_empties_and_keeps_capacity() {
        let mut m = sample(40);
        let capacity = m.capacity();
        let mut drained: Vec<u64> = m.drain().map(|(k, _)| k).collect();
        drained.sort_unstable();
        assert_eq!(drained, (0..40).collect::<Vec<_>>());
        assert!(m.is_empty());
        assert_eq!(m.capacity(), capacity);
        assert_eq!(m.get(&5), None);
        m.insert(5, 5).unwrap();
        assert_eq!(m.len(), 1);
    }

    #[test]
    fn partially_consumed_drain_still_empties() {
        let mut m = sample(40);
        {
            let mut d = m.drain();
            assert_eq!(d.len(), 40);
            d.next().unwrap();
            assert_eq!(d.len(), 39);
        }
        assert!(m.is_empty());
        assert_eq!(m.iter().count(), 0);
    }

    #[test]
    fn leaked_drain_leaves_consistent_map() {
        let mut m = sample(40);
        let mut d = m.drain();
        d.next().unwrap();
        core::mem::forget(d);
        assert_eq!(m.iter().count(), m.len());
        for (k, _) in m.iter() {
            assert!(*k < 40);
        }
    }

    #[test]
    fn borrowed_into_iterator_forms() {
        let mut m = sample(4);
        let mut n = 0;
        for (_k, v) in &mut m {
            *v = 0;
            n += 1;
        }
        assert_eq!(n, 4);
        assert!((&m).into_iter().all(|(_, v)| *v == 0));
    }
}
