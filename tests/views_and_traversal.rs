// Views, splitters and traversal order.
//
// Invariants exercised:
// - Views are live windows: removal through a view removes from the map,
//   and view cursors follow the fail-fast contract.
// - Traversal yields the null entry first, then every bucket once; tree
//   bins are walked through their insertion list.
// - Splitting partitions the entries; the null entry stays with the half
//   that was not split off.
use hybrid_hashmap::splitter::{DISTINCT, SIZED};
use hybrid_hashmap::{HybridHashMap, MapConfig, MapError, Ordered};
use std::collections::BTreeSet;
use std::hash::{BuildHasher, Hasher};

#[derive(Clone, Default)]
struct ZeroBuildHasher;
struct ZeroHasher;
impl BuildHasher for ZeroBuildHasher {
    type Hasher = ZeroHasher;
    fn build_hasher(&self) -> ZeroHasher {
        ZeroHasher
    }
}
impl Hasher for ZeroHasher {
    fn write(&mut self, _bytes: &[u8]) {}
    fn finish(&self) -> u64 {
        0
    }
}

// Test: key view write-through.
// Assumes: the view holds the map mutably for its lifetime.
// Verifies: remove/retain/clear through the view are visible in the map.
#[test]
fn key_set_is_live() {
    let mut m: HybridHashMap<String, usize> = (0..50).map(|i| (format!("k{}", i), i)).collect();
    {
        let mut keys = m.key_set();
        assert!(keys.contains("k10"));
        assert!(keys.remove("k10"));
        keys.retain(|k| !k.ends_with('7'));
        assert_eq!(keys.len(), 44);
    }
    assert!(!m.contains_key("k10"));
    assert!(!m.contains_key("k17"));
    assert_eq!(m.len(), 44);
    m.key_set().clear();
    assert!(m.is_empty());
}

// Test: entry view cursor.
// Assumes: set_value is a value replacement, not a structural change.
// Verifies: set_value and remove_current through the view keep the cursor
// valid; an outside removal does not.
#[test]
fn entry_set_cursor() {
    let mut m: HybridHashMap<u32, u32> = (0..30).map(|i| (i, i)).collect();
    let mut entries = m.entry_set();
    let mut c = entries.cursor();
    let mut removed = 0;
    loop {
        let k = match entries.next(&mut c).unwrap() {
            Some((k, _)) => *k,
            None => break,
        };
        if k % 2 == 0 {
            entries.set_value(&c, k * 10).unwrap();
        } else {
            entries.remove_current(&mut c).unwrap();
            removed += 1;
        }
    }
    assert_eq!(removed, 15);
    assert!(entries.iter().all(|(k, v)| *v == k * 10));

    let mut c = entries.cursor();
    entries.next(&mut c).unwrap();
    entries.remove(&0, &0);
    assert!(entries.remove(&2, &20));
    assert!(matches!(
        entries.next(&mut c),
        Err(MapError::ConcurrentModification { .. })
    ));
}

// Test: traversal order inside a tree bin.
// Assumes: all keys collide, so the table holds a single tree bin.
// Verifies: iteration walks the bin's linked list, which follows insertion
// history rather than the key order of the tree.
#[test]
fn tree_bin_iterates_insertion_list() {
    let mut m: HybridHashMap<Ordered<u32>, (), ZeroBuildHasher> = HybridHashMap::with_config_and_hasher(
        MapConfig::default().with_random_seed(false),
        ZeroBuildHasher,
    )
    .unwrap();
    let inserted: Vec<u32> = (0..40).map(|i| (i * 17) % 40).collect();
    for &k in &inserted {
        m.insert(Ordered(k), ());
    }
    assert_eq!(m.bin_stats().trees, 1);
    let walked: Vec<u32> = m.keys().map(|k| k.0).collect();
    let mut sorted = walked.clone();
    sorted.sort_unstable();
    assert_eq!(sorted, (0..40).collect::<Vec<_>>());
    assert_ne!(walked, sorted);
}

// Test: splitter coverage with a null entry.
// Assumes: `try_split` hands out the low half of the slot range.
// Verifies: leaves partition all entries and only one yields the null entry.
#[test]
fn splitter_partitions_with_null_entry() {
    let mut m: HybridHashMap<Option<u32>, u32> = HybridHashMap::new();
    m.insert(None, 0);
    for i in 1..1_000 {
        m.insert(Some(i), i);
    }
    let root = m.splitter();
    assert_eq!(root.characteristics(), DISTINCT | SIZED);
    let mut pending = vec![root];
    let mut seen = BTreeSet::new();
    let mut nulls = 0;
    while let Some(mut s) = pending.pop() {
        if s.estimate_size() > 64 {
            if let Some(low) = s.try_split() {
                assert_eq!(low.characteristics() & SIZED, 0);
                pending.push(low);
                pending.push(s);
                continue;
            }
        }
        s.for_each_remaining(|k, v| {
            if k.is_none() {
                nulls += 1;
            }
            assert!(seen.insert(*v));
        });
    }
    assert_eq!(nulls, 1);
    assert_eq!(seen.len(), 1_000);
}

#[cfg(feature = "rayon")]
#[test]
fn par_iter_matches_sequential() {
    use rayon::prelude::*;
    let m: HybridHashMap<u64, u64> = (0..50_000).map(|i| (i, i * 3)).collect();
    let par: u64 = m.par_iter().map(|(_, v)| *v).sum();
    let seq: u64 = m.values().sum();
    assert_eq!(par, seq);
    let count = (&m).into_par_iter().filter(|(k, _)| **k % 2 == 0).count();
    assert_eq!(count, 25_000);
}
