#![cfg(test)]

// Property tests for TieredHashMap kept inside the crate so they can check
// the internal structural invariants after every step.

use crate::alloc::Budget;
use crate::hash::FnvBuildHasher;
use crate::tiered_hash_map::{TieredHashMap, MAX_LOAD, MIN_CAPACITY, MIN_LOAD};
use core::hash::BuildHasher;
use proptest::prelude::*;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::hash::Hasher;

// Key newtype with Borrow<str> to exercise borrowed lookup.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
struct Key(String);
impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
impl std::borrow::Borrow<str> for Key {
    fn borrow(&self) -> &str {
        &self.0
    }
}

// Pool-indexed operations: indices shrink to earlier keys, the pool
// shrinks, and op lists shrink in length.
#[derive(Clone, Debug)]
enum Op {
    Insert(usize, i32),
    Remove(usize),
    Get(usize),
    Contains(String),
    Mutate(usize, i32),
    Resize(usize),
    Iterate,
}

fn key_from(pool: &[String], i: usize) -> Key {
    Key(pool[i].clone())
}

fn arb_scenario() -> impl Strategy<Value = (Vec<String>, Vec<Op>)> {
    proptest::collection::vec("[a-z]{0,5}", 1..=24).prop_flat_map(|pool| {
        let idxs: Vec<usize> = (0..pool.len()).collect();
        let idx = proptest::sample::select(idxs);
        let contains_pool = proptest::sample::select(pool.clone());
        let op = prop_oneof![
            4 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| Op::Insert(i, v)),
            3 => idx.clone().prop_map(Op::Remove),
            2 => idx.clone().prop_map(Op::Get),
            1 => prop_oneof![contains_pool, "[a-z]{0,5}"].prop_map(Op::Contains),
            1 => (idx.clone(), any::<i32>()).prop_map(|(i, d)| Op::Mutate(i, d)),
            1 => (0usize..80).prop_map(Op::Resize),
            1 => Just(Op::Iterate),
        ];
        proptest::collection::vec(op, 1..120).prop_map(move |ops| (pool.clone(), ops))
    })
}

// Runs the scenario against std's HashMap and checks after every step:
// - insert/remove/get agree with the model, overwrite returns the old value;
// - `len` parity, load factor bounds after insert and remove;
// - iteration yields each live entry exactly once;
// - resize keeps the live set;
// - bucket and map structural invariants.
fn run_scenario<S>(hasher: S, pool: Vec<String>, ops: Vec<Op>) -> Result<(), TestCaseError>
where
    S: BuildHasher,
{
    let mut sut: TieredHashMap<Key, i32, S> = TieredHashMap::with_hasher(hasher);
    let mut model: HashMap<Key, i32> = HashMap::new();

    for op in ops {
        match op {
            Op::Insert(i, v) => {
                let k = key_from(&pool, i);
                let prev = sut.insert(k.clone(), v).expect("global allocator");
                prop_assert_eq!(prev, model.insert(k, v));
                prop_assert!(sut.load_factor() < MAX_LOAD);
            }
            Op::Remove(i) => {
                let k = key_from(&pool, i);
                let removed = sut.remove_entry(k.0.as_str());
                let expected = model.remove_entry(&k);
                let hit = expected.is_some();
                prop_assert_eq!(removed, expected);
                // An absent key is a no-op; a hit may shrink the bucket array.
                if hit {
                    prop_assert!(sut.load_factor() >= MIN_LOAD || sut.capacity() == MIN_CAPACITY);
                }
            }
            Op::Get(i) => {
                let k = key_from(&pool, i);
                prop_assert_eq!(sut.get(&k), model.get(&k));
            }
            Op::Contains(s) => {
                let has_model = model.keys().any(|k| k.0 == s);
                prop_assert_eq!(sut.contains_key(s.as_str()), has_model);
            }
            Op::Mutate(i, d) => {
                let k = key_from(&pool, i);
                match (sut.get_mut(&k), model.get_mut(&k)) {
                    (Some(a), Some(b)) => {
                        *a = a.saturating_add(d);
                        *b = b.saturating_add(d);
                    }
                    (None, None) => {}
                    (a, b) => prop_assert!(false, "presence mismatch: {:?} vs {:?}", a, b),
                }
            }
            Op::Resize(n) => {
                let before: BTreeMap<Key, i32> =
                    sut.iter().map(|(k, v)| (k.clone(), *v)).collect();
                sut.resize(n).expect("global allocator");
                prop_assert!(sut.capacity() >= n.max(MIN_CAPACITY));
                let after: BTreeMap<Key, i32> =
                    sut.iter().map(|(k, v)| (k.clone(), *v)).collect();
                prop_assert_eq!(before, after);
            }
            Op::Iterate => {
                let seen: Vec<&Key> = sut.keys().collect();
                prop_assert_eq!(seen.len(), model.len());
                let distinct: BTreeMap<&Key, ()> = seen.iter().map(|k| (*k, ())).collect();
                prop_assert_eq!(distinct.len(), model.len());
                for (k, v) in sut.iter() {
                    prop_assert_eq!(model.get(k), Some(v));
                }
            }
        }

        prop_assert_eq!(sut.len(), model.len());
        prop_assert_eq!(sut.is_empty(), model.is_empty());
        sut.assert_invariants();
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine((pool, ops) in arb_scenario()) {
        run_scenario(FnvBuildHasher, pool, ops)?;
    }
}

// Collision variant: every key lands in bucket 0, so overflow growth and
// tombstone reuse are exercised on every step.
#[derive(Clone, Default)]
struct ConstBuildHasher;
struct ConstHasher;
impl BuildHasher for ConstBuildHasher {
    type Hasher = ConstHasher;
    fn build_hasher(&self) -> Self::Hasher {
        ConstHasher
    }
}
impl Hasher for ConstHasher {
    fn write(&mut self, _bytes: &[u8]) {}
    fn finish(&self) -> u64 {
        0
    }
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine_with_collisions((pool, ops) in arb_scenario()) {
        run_scenario(ConstBuildHasher, pool, ops)?;
    }
}

// Property: whatever allocation fails, a failed insert or resize leaves the
// live set as it was and the structure consistent.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_allocation_failure_is_transactional(
        keys in proptest::collection::vec(0u16..512, 1..200),
        grants in proptest::collection::vec(0usize..4, 1..200),
    ) {
        let budget = Budget::unlimited();
        let mut sut = TieredHashMap::with_capacity_and_hasher_in(2, FnvBuildHasher, &budget);
        let mut model: BTreeMap<u16, u16> = BTreeMap::new();

        for (i, k) in keys.into_iter().enumerate() {
            budget.set_remaining(grants[i % grants.len()]);
            let before_capacity = sut.capacity();
            match sut.insert(k, k) {
                Ok(prev) => {
                    prop_assert_eq!(prev, model.insert(k, k));
                }
                Err(_) => {
                    prop_assert!(!model.contains_key(&k), "overwrite never allocates");
                    prop_assert!(sut.get(&k).is_none());
                    prop_assert!(sut.capacity() >= before_capacity);
                }
            }
            if i % 7 == 0 {
                let wanted = sut.capacity() * 2;
                budget.set_remaining(grants[(i / 7) % grants.len()]);
                let cap = sut.capacity();
                if sut.resize(wanted).is_err() {
                    prop_assert_eq!(sut.capacity(), cap);
                }
            }
            budget.set_remaining(usize::MAX);
            prop_assert_eq!(sut.len(), model.len());
            let live: BTreeMap<u16, u16> = sut.iter().map(|(k, v)| (*k, *v)).collect();
            prop_assert_eq!(&live, &model);
            sut.assert_invariants();
        }
    }
}
