//! Slot and bucket storage.
//!
//! A bucket holds `INLINE_SLOTS` slots in place and, once those are in
//! use, an overflow `Vec` of slots whose length is always a power of two.
//! Slots are addressed by a *position* ranging over the inline slots
//! followed by the overflow slots.
//!
//! Slot states are explicit: `Vacant` (never written since allocation),
//! `Tombstone` (held an entry that was removed) and `Live`. Placement
//! always takes the lowest free position, so no `Live` slot ever follows a
//! `Vacant` one; probes stop at the first `Vacant` slot.

use crate::alloc::Allocator;
use crate::error::MapError;
use core::mem;

pub(crate) const INLINE_SLOTS: usize = 3;
pub(crate) const DEFAULT_OVERFLOW_CAPACITY: usize = 2;

#[derive(Debug)]
pub(crate) struct Entry<K, V> {
    pub(crate) key: K,
    pub(crate) value: V,
    /// Full hash of `key`, computed once at insertion and reused on rehash.
    pub(crate) hash: u64,
}

#[derive(Debug)]
pub(crate) enum Slot<K, V> {
    Vacant,
    Tombstone,
    Live(Entry<K, V>),
}

impl<K, V> Slot<K, V> {
    #[inline]
    pub(crate) fn is_free(&self) -> bool {
        !matches!(self, Slot::Live(_))
    }

    #[inline]
    pub(crate) fn live(&self) -> Option<&Entry<K, V>> {
        match self {
            Slot::Live(e) => Some(e),
            _ => None,
        }
    }

    #[inline]
    pub(crate) fn live_mut(&mut self) -> Option<&mut Entry<K, V>> {
        match self {
            Slot::Live(e) => Some(e),
            _ => None,
        }
    }
}

/// Outcome of scanning a bucket for a key.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Probe {
    /// A live entry with an equal key sits at this position.
    Found(usize),
    /// No equal key; the lowest free position, if the bucket has one.
    Vacant(Option<usize>),
}

pub(crate) type SlotsMut<'a, K, V> = core::iter::Chain<
    core::slice::IterMut<'a, Slot<K, V>>,
    core::iter::Flatten<core::option::IterMut<'a, Vec<Slot<K, V>>>>,
>;

#[derive(Debug)]
pub(crate) struct Bucket<K, V> {
    inline: [Slot<K, V>; INLINE_SLOTS],
    overflow: Option<Vec<Slot<K, V>>>,
    live: usize,
}

impl<K, V> Bucket<K, V> {
    pub(crate) fn new() -> Self {
        Self {
            inline: core::array::from_fn(|_| Slot::Vacant),
            overflow: None,
            live: 0,
        }
    }

    /// Number of live entries.
    #[inline]
    pub(crate) fn live_len(&self) -> usize {
        self.live
    }

    #[inline]
    pub(crate) fn is_occupied(&self) -> bool {
        self.live != 0
    }

    #[cfg(test)]
    pub(crate) fn overflow_capacity(&self) -> usize {
        self.overflow.as_ref().map_or(0, Vec::len)
    }

    /// Slot at `pos`, or `None` past the end.
    #[inline]
    pub(crate) fn slot(&self, pos: usize) -> Option<&Slot<K, V>> {
        if pos < INLINE_SLOTS {
            Some(&self.inline[pos])
        } else {
            self.overflow.as_ref()?.get(pos - INLINE_SLOTS)
        }
    }

    #[inline]
    fn slot_mut(&mut self, pos: usize) -> Option<&mut Slot<K, V>> {
        if pos < INLINE_SLOTS {
            Some(&mut self.inline[pos])
        } else {
            self.overflow.as_mut()?.get_mut(pos - INLINE_SLOTS)
        }
    }

    pub(crate) fn slots(&self) -> impl Iterator<Item = &Slot<K, V>> {
        self.inline.iter().chain(self.overflow.iter().flatten())
    }

    pub(crate) fn slots_mut(&mut self) -> SlotsMut<'_, K, V> {
        self.inline.iter_mut().chain(self.overflow.iter_mut().flatten())
    }

    /// Live entries in position order.
    pub(crate) fn entries(&self) -> impl Iterator<Item = &Entry<K, V>> {
        self.slots().filter_map(Slot::live)
    }

    /// Lowest free position, without comparing keys.
    pub(crate) fn first_free(&self) -> Option<usize> {
        if !self.is_occupied() {
            return Some(0);
        }
        self.slots().position(Slot::is_free)
    }

    pub(crate) fn entry(&self, pos: usize) -> Option<&Entry<K, V>> {
        self.slot(pos)?.live()
    }

    pub(crate) fn entry_mut(&mut self, pos: usize) -> Option<&mut Entry<K, V>> {
        self.slot_mut(pos)?.live_mut()
    }

    /// Scan for a live entry whose key matches, remembering the lowest free
    /// position on the way. A match wins over an earlier free position.
    pub(crate) fn locate<F>(&self, hash: u64, mut eq: F) -> Probe
    where
        F: FnMut(&K) -> bool,
    {
        if !self.is_occupied() {
            return Probe::Vacant(Some(0));
        }
        let mut candidate = None;
        for (pos, slot) in self.slots().enumerate() {
            match slot {
                Slot::Live(e) => {
                    if e.hash == hash && eq(&e.key) {
                        return Probe::Found(pos);
                    }
                }
                Slot::Tombstone => {
                    candidate.get_or_insert(pos);
                }
                Slot::Vacant => {
                    candidate.get_or_insert(pos);
                    break;
                }
            }
        }
        Probe::Vacant(candidate)
    }

    /// Position of the live entry whose key matches, if any.
    pub(crate) fn find<F>(&self, hash: u64, mut eq: F) -> Option<usize>
    where
        F: FnMut(&K) -> bool,
    {
        if !self.is_occupied() {
            return None;
        }
        for (pos, slot) in self.slots().enumerate() {
            match slot {
                Slot::Live(e) if e.hash == hash && eq(&e.key) => return Some(pos),
                Slot::Vacant => return None,
                _ => {}
            }
        }
        None
    }

    /// Make sure a free position exists, growing the overflow array when
    /// `candidate` is `None`. On error the bucket is unchanged.
    pub(crate) fn claim<A: Allocator>(
        &mut self,
        candidate: Option<usize>,
        alloc: &A,
    ) -> Result<usize, MapError> {
        match candidate {
            Some(pos) => Ok(pos),
            None => self.grow_overflow(alloc),
        }
    }

    /// Allocate the overflow array, or grow a full one to the next power of
    /// two above its length. Returns the first new position.
    fn grow_overflow<A: Allocator>(&mut self, alloc: &A) -> Result<usize, MapError> {
        match &mut self.overflow {
            None => {
                let mut slots = Vec::new();
                alloc.try_reserve(&mut slots, DEFAULT_OVERFLOW_CAPACITY)?;
                slots.resize_with(DEFAULT_OVERFLOW_CAPACITY, || Slot::Vacant);
                self.overflow = Some(slots);
                Ok(INLINE_SLOTS)
            }
            Some(slots) => {
                let old = slots.len();
                let new = (old + 1)
                    .checked_next_power_of_two()
                    .ok_or(MapError::CapacityOverflow)?;
                alloc.try_reserve(slots, new - old)?;
                slots.resize_with(new, || Slot::Vacant);
                crate::trace::log_event!(trace, from = old, to = new, "overflow grown");
                Ok(INLINE_SLOTS + old)
            }
        }
    }

    /// Store `entry` at a free position obtained from `locate` or `claim`.
    pub(crate) fn fill(&mut self, pos: usize, entry: Entry<K, V>) {
        let slot = self
            .slot_mut(pos)
            .expect("claimed position must be addressable");
        debug_assert!(slot.is_free(), "filling a live slot at {pos}");
        *slot = Slot::Live(entry);
        self.live += 1;
    }

    /// Tombstone the live slot at `pos` and hand its entry back.
    pub(crate) fn take(&mut self, pos: usize) -> Option<Entry<K, V>> {
        let slot = self.slot_mut(pos)?;
        let taken = match mem::replace(slot, Slot::Tombstone) {
            Slot::Live(e) => Some(e),
            other => {
                *slot = other;
                None
            }
        };
        if taken.is_some() {
            self.live -= 1;
        }
        taken
    }

    /// Pre-size a fresh bucket so that `n` entries fit without further
    /// allocation, sized as repeated overflow growth would have left it.
    pub(crate) fn reserve_for<A: Allocator>(&mut self, n: usize, alloc: &A) -> Result<(), MapError> {
        debug_assert!(self.live == 0 && self.overflow.is_none());
        if n <= INLINE_SLOTS {
            return Ok(());
        }
        let cap = (n - INLINE_SLOTS)
            .max(DEFAULT_OVERFLOW_CAPACITY)
            .checked_next_power_of_two()
            .ok_or(MapError::CapacityOverflow)?;
        let mut slots = Vec::new();
        alloc.try_reserve(&mut slots, cap)?;
        slots.resize_with(cap, || Slot::Vacant);
        self.overflow = Some(slots);
        Ok(())
    }

    /// Append to a bucket that has never seen a removal. Capacity must have
    /// been secured with `reserve_for`; no key comparison takes place.
    pub(crate) fn push_unique(&mut self, entry: Entry<K, V>) {
        self.fill(self.live, entry);
    }

    /// Consume the bucket, yielding its live entries in position order.
    pub(crate) fn into_entries(self) -> IntoEntries<K, V> {
        IntoEntries {
            inline: self.inline.into_iter(),
            overflow: self.overflow.map(Vec::into_iter),
        }
    }

    /// Check the structural invariants. Test-only.
    #[cfg(test)]
    pub(crate) fn assert_invariants(&self) {
        let live = self.slots().filter(|s| !s.is_free()).count();
        assert_eq!(live, self.live, "live count drifted");
        if let Some(overflow) = &self.overflow {
            assert!(overflow.len().is_power_of_two(), "overflow length {}", overflow.len());
        }
        let first_vacant = self
            .slots()
            .position(|s| matches!(s, Slot::Vacant))
            .unwrap_or(usize::MAX);
        for (pos, slot) in self.slots().enumerate() {
            if pos > first_vacant {
                assert!(slot.is_free(), "live slot {pos} after vacant slot {first_vacant}");
            }
        }
    }
}

/// Owning iterator over a bucket's live entries.
pub(crate) struct IntoEntries<K, V> {
    inline: core::array::IntoIter<Slot<K, V>, INLINE_SLOTS>,
    overflow: Option<std::vec::IntoIter<Slot<K, V>>>,
}

impl<K, V> Iterator for IntoEntries<K, V> {
    type Item = Entry<K, V>;

    fn next(&mut self) -> Option<Entry<K, V>> {
        self.inline
            .by_ref()
            .chain(self.overflow.iter_mut().flatten())
            .find_map(|slot| match slot {
                Slot::Live(e) => Some(e),
                _ => None,
            })
    }
}
