use std::collections::BTreeMap;
use std::hash::{BuildHasher, Hasher};
use tiered_hashmap::hash::{AvalancheBuildHasher, FnvBuildHasher};
use tiered_hashmap::{Budget, MapError, TieredHashMap};

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

fn snapshot<S: BuildHasher>(m: &TieredHashMap<String, String, S, &Budget>) -> BTreeMap<String, String> {
    m.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
}

#[test]
fn starved_growth_keeps_ten_pairs() {
    let budget = Budget::unlimited();
    let mut m = TieredHashMap::with_capacity_and_hasher_in(2, FnvBuildHasher, &budget);
    for i in 1..=10 {
        m.insert(format!("key{i}"), format!("test{i}")).expect("insert ok");
    }
    let before = snapshot(&m);
    let capacity = m.capacity();

    budget.set_remaining(0);
    let err = m
        .resize(capacity * 2)
        .expect_err("resize with no allocation budget");
    assert_eq!(err, MapError::AllocFailed { slots: capacity * 2 });

    assert_eq!(m.len(), 10);
    assert_eq!(m.capacity(), capacity);
    assert_eq!(snapshot(&m), before);
    for i in 1..=10 {
        assert_eq!(
            m.get(format!("key{i}").as_str()).map(String::as_str),
            Some(format!("test{i}").as_str())
        );
    }
}

#[test]
fn starved_insert_triggered_resize_keeps_eleven_pairs() {
    let budget = Budget::unlimited();
    let mut m = TieredHashMap::with_capacity_and_hasher_in(2, FnvBuildHasher, &budget);
    for i in 1..=11 {
        m.insert(format!("key{i}"), format!("test{i}")).expect("insert ok");
    }
    // 11 / 16 is still below the maximum load; 12 / 16 is not.
    assert_eq!(m.capacity(), 16);
    let before = snapshot(&m);

    budget.set_remaining(0);
    let err = m.insert("key12".to_string(), "test12".to_string());
    assert_eq!(err, Err(MapError::AllocFailed { slots: 32 }));
    assert_eq!(m.len(), 11);
    assert_eq!(m.capacity(), 16);
    assert_eq!(m.get("key12"), None);
    assert_eq!(snapshot(&m), before);

    budget.set_remaining(usize::MAX);
    assert_eq!(m.insert("key12".to_string(), "test12".to_string()), Ok(None));
    assert_eq!(m.capacity(), 32);
}

#[test]
fn failure_at_every_stage_of_a_resize_is_rolled_back() {
    // 40 colliding keys: one bucket with an overflow array, so a rebuild
    // needs the bucket array, the counts and one overflow array.
    for grants in 0..3 {
        let budget = Budget::unlimited();
        let mut m = TieredHashMap::with_capacity_and_hasher_in(2, ConstBuildHasher, &budget);
        for k in 0..40u32 {
            m.insert(k, k).unwrap();
        }
        let capacity = m.capacity();

        budget.set_remaining(grants);
        assert!(m.resize(capacity * 2).is_err(), "grants = {grants}");
        assert_eq!(m.capacity(), capacity);
        assert_eq!(m.len(), 40);
        assert!((0..40u32).all(|k| m.get(&k) == Some(&k)));

        budget.set_remaining(3);
        m.resize(capacity * 2).expect("enough grants");
        assert_eq!(m.capacity(), capacity * 2);
        assert!((0..40u32).all(|k| m.get(&k) == Some(&k)));
    }
}

#[test]
fn starved_overflow_growth_fails_the_insert_only() {
    let budget = Budget::unlimited();
    let mut m = TieredHashMap::with_capacity_and_hasher_in(64, ConstBuildHasher, &budget);
    for k in 0..3u32 {
        m.insert(k, k).unwrap();
    }
    // Inline slots are full; the fourth colliding key needs an overflow array.
    budget.set_remaining(0);
    assert!(matches!(m.insert(3, 3), Err(MapError::AllocFailed { .. })));
    assert_eq!(m.len(), 3);
    assert_eq!(m.get(&3), None);

    // Overwrites and lookups still work without any allocation.
    assert_eq!(m.insert(1, 10), Ok(Some(1)));
    assert_eq!(m.get(&1), Some(&10));

    budget.set_remaining(1);
    assert_eq!(m.insert(3, 3), Ok(None));
    assert_eq!(m.len(), 4);
}

#[test]
fn failed_shrink_keeps_entries_and_capacity() {
    let budget = Budget::unlimited();
    let mut m = TieredHashMap::with_capacity_and_hasher_in(2, AvalancheBuildHasher, &budget);
    for k in 0..100u64 {
        m.insert(k, k).unwrap();
    }
    let capacity = m.capacity();
    budget.set_remaining(0);
    for k in 0..90u64 {
        assert_eq!(m.remove(&k), Some(k));
    }
    // Removal itself never fails; the shrink is skipped.
    assert_eq!(m.capacity(), capacity);
    assert_eq!(m.len(), 10);
    assert!((90..100u64).all(|k| m.get(&k) == Some(&k)));

    budget.set_remaining(usize::MAX);
    m.remove(&90);
    assert!(m.capacity() < capacity);
    assert!((91..100u64).all(|k| m.get(&k) == Some(&k)));
}

#[test]
fn construction_and_reserve_report_errors() {
    let budget = Budget::new(0);
    let err = TieredHashMap::<u64, u64, _, _>::try_with_capacity_and_hasher_in(4, AvalancheBuildHasher, &budget)
        .err();
    assert_eq!(err, Some(MapError::AllocFailed { slots: 4 }));

    let budget = Budget::new(1);
    let mut m: TieredHashMap<u64, u64, _, _> =
        TieredHashMap::with_capacity_and_hasher_in(2, AvalancheBuildHasher, &budget);
    assert_eq!(budget.remaining(), 0);
    assert!(m.reserve(1000).is_err());
    assert_eq!(m.capacity(), 2);
    assert_eq!(m.reserve(usize::MAX), Err(MapError::CapacityOverflow));
    m.reserve(0).expect("no growth needed");
}

#[test]
fn error_messages() {
    assert_eq!(MapError::CapacityOverflow.to_string(), "capacity overflow");
    assert_eq!(
        MapError::AllocFailed { slots: 32 }.to_string(),
        "allocation of 32 slots failed"
    );
}
