#![cfg(test)]

// Property tests for HybridHashMap kept inside the crate so every step can
// run the internal structural check.

use crate::config::MapConfig;
use crate::hybrid_hash_map::HybridHashMap;
use proptest::prelude::*;
use std::collections::HashMap;
use std::hash::{BuildHasher, Hasher};

type Key = Option<u16>;

// Every key hashes to 0: one bucket, promoted to a tree bin at 16 entries.
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

// Hash is the low five bits of the key: 32 hash classes, so buckets grow
// long under a high load factor and tree bins split on resize.
#[derive(Clone, Default)]
struct MaskBuildHasher;
#[derive(Default)]
struct MaskHasher(u64);
impl BuildHasher for MaskBuildHasher {
    type Hasher = MaskHasher;
    fn build_hasher(&self) -> Self::Hasher {
        MaskHasher::default()
    }
}
impl Hasher for MaskHasher {
    fn write(&mut self, _bytes: &[u8]) {}
    fn write_u16(&mut self, v: u16) {
        self.0 = u64::from(v & 0x1F);
    }
    fn finish(&self) -> u64 {
        self.0
    }
}

#[derive(Clone, Debug)]
enum Op {
    Insert(Key, i32),
    Remove(Key),
    PutIfAbsent(Key, i32),
    // compute: add to the current value, remove when the sum is zero.
    Compute(Key, i32),
    // compute_if_present: drop even values, increment odd ones.
    ComputeIfPresent(Key),
    Merge(Key, i32),
    RemoveIfEq(Key, i32),
    Get(Key),
    RetainOdd,
    // Removes every `n`th entry through a cursor.
    CursorRemove(usize),
    CloneMap,
}

fn arb_key() -> impl Strategy<Value = Key> {
    prop_oneof![
        30 => (0u16..1024).prop_map(Some),
        1 => Just(None),
    ]
}

fn arb_ops(max_len: usize) -> impl Strategy<Value = Vec<Op>> {
    let small = -3i32..4;
    let op = prop_oneof![
        40 => (arb_key(), any::<i32>()).prop_map(|(k, v)| Op::Insert(k, v)),
        8 => arb_key().prop_map(Op::Remove),
        4 => (arb_key(), any::<i32>()).prop_map(|(k, v)| Op::PutIfAbsent(k, v)),
        4 => (arb_key(), small.clone()).prop_map(|(k, d)| Op::Compute(k, d)),
        3 => arb_key().prop_map(Op::ComputeIfPresent),
        4 => (arb_key(), small.clone()).prop_map(|(k, v)| Op::Merge(k, v)),
        3 => (arb_key(), small).prop_map(|(k, v)| Op::RemoveIfEq(k, v)),
        6 => arb_key().prop_map(Op::Get),
        1 => Just(Op::RetainOdd),
        1 => (2usize..6).prop_map(Op::CursorRemove),
        1 => Just(Op::CloneMap),
    ];
    proptest::collection::vec(op, 1..max_len)
}

fn apply<S: BuildHasher + Clone>(
    sut: &mut HybridHashMap<Key, i32, S>,
    model: &mut HashMap<Key, i32>,
    op: Op,
) -> Result<(), TestCaseError> {
    match op {
        Op::Insert(k, v) => {
            prop_assert_eq!(sut.insert(k, v), model.insert(k, v));
        }
        Op::Remove(k) => {
            prop_assert_eq!(sut.remove(&k), model.remove(&k));
        }
        Op::PutIfAbsent(k, v) => {
            let expected = model.get(&k).copied();
            prop_assert_eq!(sut.put_if_absent(k, v).copied(), expected);
            model.entry(k).or_insert(v);
        }
        Op::Compute(k, d) => {
            let next = model.get(&k).copied().unwrap_or(0).wrapping_add(d);
            let got = sut
                .compute(k, |_, old| {
                    let sum = old.copied().unwrap_or(0).wrapping_add(d);
                    (sum != 0).then_some(sum)
                })
                .copied();
            if next == 0 {
                prop_assert_eq!(got, None);
                model.remove(&k);
            } else {
                prop_assert_eq!(got, Some(next));
                model.insert(k, next);
            }
        }
        Op::ComputeIfPresent(k) => {
            let got = sut
                .compute_if_present(&k, |_, v| (v % 2 != 0).then(|| v.wrapping_add(1)))
                .copied();
            let expected = match model.get(&k).copied() {
                Some(v) if v % 2 != 0 => {
                    model.insert(k, v.wrapping_add(1));
                    Some(v.wrapping_add(1))
                }
                Some(_) => {
                    model.remove(&k);
                    None
                }
                None => None,
            };
            prop_assert_eq!(got, expected);
        }
        Op::Merge(k, v) => {
            let got = sut
                .merge(k, v, |old, new| {
                    let sum = old.wrapping_add(new);
                    (sum != 0).then_some(sum)
                })
                .copied();
            let expected = match model.get(&k).copied() {
                Some(old) if old.wrapping_add(v) == 0 => {
                    model.remove(&k);
                    None
                }
                Some(old) => {
                    model.insert(k, old.wrapping_add(v));
                    Some(old.wrapping_add(v))
                }
                None => {
                    model.insert(k, v);
                    Some(v)
                }
            };
            prop_assert_eq!(got, expected);
        }
        Op::RemoveIfEq(k, v) => {
            let hit = model.get(&k) == Some(&v);
            prop_assert_eq!(sut.remove_if_eq(&k, &v), hit);
            if hit {
                model.remove(&k);
            }
        }
        Op::Get(k) => {
            prop_assert_eq!(sut.get(&k), model.get(&k));
            prop_assert_eq!(sut.contains_key(&k), model.contains_key(&k));
        }
        Op::RetainOdd => {
            sut.retain(|_, v| *v % 2 != 0);
            model.retain(|_, v| *v % 2 != 0);
        }
        Op::CursorRemove(n) => {
            let mut cursor = sut.cursor();
            let mut i = 0usize;
            loop {
                let k = match cursor.next(&*sut) {
                    Ok(Some((k, _))) => *k,
                    Ok(None) => break,
                    Err(e) => return Err(TestCaseError::fail(format!("cursor failed: {}", e))),
                };
                if i % n == 0 {
                    let (rk, rv) = cursor
                        .remove(&mut *sut)
                        .map_err(|e| TestCaseError::fail(e.to_string()))?;
                    prop_assert_eq!(rk, k);
                    prop_assert_eq!(model.remove(&k), Some(rv));
                }
                i += 1;
            }
        }
        Op::CloneMap => {
            let copy = sut.clone();
            prop_assert!(copy == *sut);
            copy.check_invariants().map_err(TestCaseError::fail)?;
            *sut = copy;
        }
    }
    Ok(())
}

fn run<S: BuildHasher + Clone>(
    mut sut: HybridHashMap<Key, i32, S>,
    ops: Vec<Op>,
) -> Result<(), TestCaseError> {
    let mut model: HashMap<Key, i32> = HashMap::new();
    for op in ops {
        apply(&mut sut, &mut model, op)?;
        sut.check_invariants().map_err(TestCaseError::fail)?;
        prop_assert_eq!(sut.len(), model.len());
        prop_assert_eq!(sut.is_empty(), model.is_empty());
    }
    let mut seen = 0usize;
    for (k, v) in sut.iter() {
        prop_assert_eq!(model.get(k), Some(v));
        seen += 1;
    }
    prop_assert_eq!(seen, model.len());
    Ok(())
}

// Property: state-machine equivalence against std::collections::HashMap.
// Invariants exercised across random operation sequences:
// - Every operation returns what the model returns, including the null key.
// - Bucket placement, red-black shape, tree `first` lists and size
//   accounting hold after every step (`check_invariants`).
// - Cursor removal, retain and clone leave the structure consistent.
// - A full iteration visits exactly the model's entries.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine_default_hasher(ops in arb_ops(200)) {
        run(HybridHashMap::new(), ops)?;
    }

    #[test]
    fn prop_state_machine_single_bucket(ops in arb_ops(200)) {
        let map = HybridHashMap::with_config_and_hasher(
            MapConfig::default().with_random_seed(false),
            ConstBuildHasher,
        )
        .unwrap();
        run(map, ops)?;
    }

    #[test]
    fn prop_state_machine_tree_splits(ops in arb_ops(700)) {
        let map = HybridHashMap::with_config_and_hasher(
            MapConfig::new(16, 16.0).with_random_seed(false),
            MaskBuildHasher,
        )
        .unwrap();
        run(map, ops)?;
    }
}
