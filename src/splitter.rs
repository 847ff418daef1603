//! Parallel-decomposable traversal.
//!
//! A `Splitter` covers the slot range `[index, fence)`. `try_split` hands
//! the low half of the remaining range to a new splitter and keeps the
//! high half. Buckets are never subdivided: a tree bin's `first` list is
//! walked linearly by whichever splitter owns its slot. The null entry
//! belongs to the root and stays with the high half on every split.

use crate::node::NodeKey;
use crate::raw_table::RawTable;
use core::fmt;

/// Every key is reported at most once.
pub const DISTINCT: u32 = 0x0000_0001;
/// `estimate_size` is exact.
pub const SIZED: u32 = 0x0000_0040;

pub struct Splitter<'a, K, V> {
    table: &'a RawTable<K, V>,
    /// Next slot to open.
    index: usize,
    /// One past the last slot.
    fence: usize,
    /// Size estimate, halved on each split.
    est: usize,
    /// Next node of the bucket being walked.
    current: Option<NodeKey>,
    /// Set once the null entry has been yielded or handed away.
    accepted_null: bool,
}

impl<'a, K, V> Splitter<'a, K, V> {
    pub(crate) fn new(table: &'a RawTable<K, V>) -> Self {
        Self {
            table,
            index: 0,
            fence: table.slot_count(),
            est: table.len(),
            current: None,
            accepted_null: false,
        }
    }

    /// Splits off the low half of the remaining slots. Refuses once this
    /// splitter has started on a bucket or when fewer than two slots remain.
    pub fn try_split(&mut self) -> Option<Self> {
        let lo = self.index;
        let mid = lo + ((self.fence - lo) >> 1);
        if lo >= mid || self.current.is_some() {
            return None;
        }
        self.index = mid;
        self.est >>= 1;
        Some(Self {
            table: self.table,
            index: lo,
            fence: mid,
            est: self.est,
            current: None,
            accepted_null: true,
        })
    }

    fn next_node(&mut self) -> Option<NodeKey> {
        if !self.accepted_null {
            self.accepted_null = true;
            if let Some(null) = self.table.null_entry() {
                return Some(null);
            }
        }
        loop {
            if let Some(k) = self.current {
                self.current = self.table.nodes[k].next;
                return Some(k);
            }
            if self.index >= self.fence {
                return None;
            }
            self.current = self.table.bucket(self.index).first();
            self.index += 1;
        }
    }

    /// Feeds the next entry to `f`. False when nothing is left.
    pub fn try_advance<F>(&mut self, f: F) -> bool
    where
        F: FnOnce(&'a K, &'a V),
    {
        match self.next() {
            Some((k, v)) => {
                f(k, v);
                true
            }
            None => false,
        }
    }

    pub fn for_each_remaining<F>(&mut self, mut f: F)
    where
        F: FnMut(&'a K, &'a V),
    {
        while let Some((k, v)) = self.next() {
            f(k, v);
        }
    }

    pub fn estimate_size(&self) -> usize {
        self.est
    }

    /// `DISTINCT`, plus `SIZED` while the estimate is still the map's size.
    pub fn characteristics(&self) -> u32 {
        if self.est == self.table.len() {
            DISTINCT | SIZED
        } else {
            DISTINCT
        }
    }
}

impl<'a, K, V> Iterator for Splitter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let k = self.next_node()?;
        let n = &self.table.nodes[k];
        Some((&n.key, &n.value))
    }
}

impl<K, V> fmt::Debug for Splitter<'_, K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Splitter")
            .field("index", &self.index)
            .field("fence", &self.fence)
            .field("est", &self.est)
            .field("accepted_null", &self.accepted_null)
            .finish()
    }
}

#[cfg(feature = "rayon")]
mod rayon_support {
    use super::Splitter;
    use crate::hybrid_hash_map::HybridHashMap;
    use rayon::iter::plumbing::{bridge_unindexed, Folder, UnindexedConsumer, UnindexedProducer};
    use rayon::iter::{IntoParallelIterator, ParallelIterator};

    impl<'a, K: Sync, V: Sync> UnindexedProducer for Splitter<'a, K, V> {
        type Item = (&'a K, &'a V);

        fn split(mut self) -> (Self, Option<Self>) {
            let low = self.try_split();
            (self, low)
        }

        fn fold_with<F>(self, folder: F) -> F
        where
            F: Folder<Self::Item>,
        {
            folder.consume_iter(self)
        }
    }

    /// Parallel iterator over `(&K, &V)`, driven by [`Splitter`].
    pub struct ParIter<'a, K, V> {
        splitter: Splitter<'a, K, V>,
    }

    impl<'a, K: Sync, V: Sync> ParallelIterator for ParIter<'a, K, V> {
        type Item = (&'a K, &'a V);

        fn drive_unindexed<C>(self, consumer: C) -> C::Result
        where
            C: UnindexedConsumer<Self::Item>,
        {
            bridge_unindexed(self.splitter, consumer)
        }
    }

    impl<'a, K: Sync, V: Sync, S> IntoParallelIterator for &'a HybridHashMap<K, V, S> {
        type Iter = ParIter<'a, K, V>;
        type Item = (&'a K, &'a V);

        fn into_par_iter(self) -> Self::Iter {
            self.par_iter()
        }
    }

    impl<K: Sync, V: Sync, S> HybridHashMap<K, V, S> {
        /// Parallel iterator over the entries. Order is unspecified.
        pub fn par_iter(&self) -> ParIter<'_, K, V> {
            ParIter {
                splitter: self.splitter(),
            }
        }
    }
}

#[cfg(feature = "rayon")]
pub use rayon_support::ParIter;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hybrid_hash_map::HybridHashMap;
    use std::collections::BTreeSet;

    fn drain(s: &mut Splitter<'_, u32, u32>) -> Vec<u32> {
        let mut out = Vec::new();
        s.for_each_remaining(|k, _| out.push(*k));
        out
    }

    /// Invariant: an unsplit splitter reports `SIZED` and yields the map.
    #[test]
    fn unsplit_covers_map() {
        let m: HybridHashMap<u32, u32> = (0..100).map(|i| (i, i)).collect();
        let mut s = m.splitter();
        assert_eq!(s.estimate_size(), 100);
        assert_eq!(s.characteristics(), DISTINCT | SIZED);
        let keys: BTreeSet<u32> = drain(&mut s).into_iter().collect();
        assert_eq!(keys.len(), 100);
        assert!(!s.try_advance(|_, _| panic!("exhausted")));
    }

    /// Invariant: recursive splitting partitions the entries exactly.
    #[test]
    fn splits_partition_entries() {
        let m: HybridHashMap<u32, u32> = (0..500).map(|i| (i, i)).collect();
        let mut pending = vec![m.splitter()];
        let mut leaves = Vec::new();
        while let Some(mut s) = pending.pop() {
            match s.try_split() {
                Some(low) if s.estimate_size() > 8 => {
                    assert_eq!(s.characteristics(), DISTINCT);
                    pending.push(low);
                    pending.push(s);
                }
                Some(low) => {
                    leaves.push(low);
                    leaves.push(s);
                }
                None => leaves.push(s),
            }
        }
        assert!(leaves.len() > 2);
        let mut all = Vec::new();
        for mut leaf in leaves {
            all.extend(drain(&mut leaf));
        }
        all.sort_unstable();
        assert_eq!(all, (0..500).collect::<Vec<_>>());
    }

    /// Invariant: the low half never takes the null entry.
    #[test]
    fn null_entry_stays_high() {
        let mut m: HybridHashMap<Option<u32>, u32> = HybridHashMap::new();
        m.insert(None, 0);
        for i in 1..40 {
            m.insert(Some(i), i);
        }
        let mut high = m.splitter();
        let mut low = high.try_split().unwrap();
        let mut low_count = 0;
        low.for_each_remaining(|k, _| {
            assert!(k.is_some());
            low_count += 1;
        });
        assert_eq!(high.next(), Some((&None, &0)));
        assert_eq!(low_count + 1 + high.count(), 40);
    }

    /// Invariant: splitting refuses once a bucket walk is underway.
    #[test]
    fn refuses_mid_bucket() {
        let m: HybridHashMap<u32, u32> = (0..64).map(|i| (i, i)).collect();
        let mut s = m.splitter();
        assert!(s.try_advance(|_, _| {}));
        let bucket_in_progress = s.current.is_some();
        assert_eq!(s.try_split().is_none(), bucket_in_progress);
    }

    /// Invariant: an empty map splits into nothing and yields nothing.
    #[test]
    fn empty_map() {
        let m: HybridHashMap<u32, u32> = HybridHashMap::new();
        let mut s = m.splitter();
        assert!(s.try_split().is_none());
        assert_eq!(s.next(), None);
        assert_eq!(s.characteristics(), DISTINCT | SIZED);
    }

    #[cfg(feature = "rayon")]
    #[test]
    fn par_iter_sums() {
        use rayon::iter::ParallelIterator;
        let m: HybridHashMap<u64, u64> = (0..10_000).map(|i| (i, i)).collect();
        let total: u64 = m.par_iter().map(|(_, v)| *v).sum();
        assert_eq!(total, (0..10_000).sum::<u64>());
    }
}
