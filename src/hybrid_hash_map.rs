//! HybridHashMap: the public map built on `RawTable`.

use crate::config::{MapConfig, DEFAULT_INITIAL_CAPACITY, DEFAULT_LOAD_FACTOR};
use crate::cursor::Cursor;
use crate::error::Result;
use crate::hash::{Hashing, TreeKey};
use crate::iter::{IntoIter, Iter, IterMut, Keys, Values, ValuesMut, Walk};
use crate::node::NodeKey;
use crate::raw_table::{BinStats, Located, RawTable};
use crate::splitter::Splitter;
use crate::views::{EntrySet, KeySet, ValuesView};
use core::borrow::Borrow;
use core::fmt;
use core::hash::BuildHasher;
use core::ops::Index;
use hashbrown::hash_map::DefaultHashBuilder;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_MAP_ID: AtomicU64 = AtomicU64::new(1);

fn next_map_id() -> u64 {
    NEXT_MAP_ID.fetch_add(1, Ordering::Relaxed)
}

/// Hash map with chain buckets that escalate into red-black tree bins.
///
/// A bucket whose chain reaches `TREE_THRESHOLD` entries becomes a tree
/// bin when `K::ORDERED` holds, bounding lookups in heavily colliding
/// buckets to O(log n). The `None` key of an `Option<T>` key type lives in
/// a dedicated slot outside the table.
pub struct HybridHashMap<K, V, S = DefaultHashBuilder> {
    pub(crate) table: RawTable<K, V>,
    hashing: Hashing<S>,
    /// Identifies this instance to detached cursors.
    pub(crate) id: u64,
}

impl<K, V> HybridHashMap<K, V, DefaultHashBuilder> {
    pub fn new() -> Self {
        Self::with_hasher(DefaultHashBuilder::default())
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_hasher(capacity, DefaultHashBuilder::default())
    }

    /// Fails on a non-positive or NaN load factor.
    pub fn with_capacity_and_load_factor(capacity: usize, load_factor: f32) -> Result<Self> {
        Self::with_config(MapConfig::new(capacity, load_factor))
    }

    pub fn with_config(config: MapConfig) -> Result<Self> {
        Self::with_config_and_hasher(config, DefaultHashBuilder::default())
    }
}

impl<K, V, S: Default> Default for HybridHashMap<K, V, S> {
    fn default() -> Self {
        Self::with_hasher(S::default())
    }
}

impl<K, V, S> HybridHashMap<K, V, S> {
    pub fn with_hasher(hasher: S) -> Self {
        Self::from_config(&MapConfig::default(), hasher)
    }

    pub fn with_capacity_and_hasher(capacity: usize, hasher: S) -> Self {
        Self::from_config(&MapConfig::default().with_initial_capacity(capacity), hasher)
    }

    pub fn with_config_and_hasher(config: MapConfig, hasher: S) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_config(&config, hasher))
    }

    fn from_config(config: &MapConfig, hasher: S) -> Self {
        Self {
            table: RawTable::new(config.clamped_capacity(), config.load_factor),
            hashing: Hashing::new(hasher, config.draw_seed()),
            id: next_map_id(),
        }
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.len() == 0
    }

    /// Number of bucket slots (allocated, or to be allocated on first insert).
    pub fn capacity(&self) -> usize {
        self.table.capacity()
    }

    pub fn load_factor(&self) -> f32 {
        self.table.load_factor()
    }

    pub fn hasher(&self) -> &S {
        self.hashing.build_hasher()
    }

    /// Bucket representation counts.
    pub fn bin_stats(&self) -> BinStats {
        self.table.bin_stats()
    }

    /// Counter bumped by every insertion of a new key and every removal.
    pub fn mod_count(&self) -> u64 {
        self.table.mod_count()
    }

    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter::new(&self.table)
    }

    pub fn keys(&self) -> Keys<'_, K, V> {
        Keys { inner: self.iter() }
    }

    pub fn values(&self) -> Values<'_, K, V> {
        Values { inner: self.iter() }
    }

    pub fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        IterMut {
            it: self.table.nodes.iter_mut(),
        }
    }

    pub fn values_mut(&mut self) -> ValuesMut<'_, K, V> {
        ValuesMut {
            inner: self.iter_mut(),
        }
    }

    /// Fail-fast cursor; see [`Cursor`].
    pub fn cursor(&self) -> Cursor {
        Cursor::new(self)
    }

    /// Parallel-decomposable traversal over the whole map.
    pub fn splitter(&self) -> Splitter<'_, K, V> {
        Splitter::new(&self.table)
    }

    /// Removes every entry, keeping the allocated slots.
    pub fn clear(&mut self) {
        self.table.clear();
    }

    /// Visits every entry in traversal order.
    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&K, &V),
    {
        for (k, v) in self.iter() {
            f(k, v);
        }
    }

    /// Replaces every value with `f(key, value)`, in traversal order.
    pub fn replace_all<F>(&mut self, mut f: F)
    where
        F: FnMut(&K, &V) -> V,
    {
        let mut walk = Walk::new(&self.table);
        while let Some(k) = walk.advance(&self.table) {
            let n = &mut self.table.nodes[k];
            n.value = f(&n.key, &n.value);
        }
    }

    /// Keeps only the entries for which `f` returns true.
    pub fn retain<F>(&mut self, mut f: F)
    where
        F: FnMut(&K, &mut V) -> bool,
    {
        let mut doomed: Vec<NodeKey> = Vec::new();
        let mut walk = Walk::new(&self.table);
        while let Some(k) = walk.advance(&self.table) {
            let n = &mut self.table.nodes[k];
            if !f(&n.key, &mut n.value) {
                doomed.push(k);
            }
        }
        for k in doomed {
            self.remove_node(k);
        }
    }

    pub(crate) fn remove_node(&mut self, node: NodeKey) -> Option<(K, V)> {
        let found = self.table.found_for(node)?;
        self.table.remove_found(found)
    }

    /// Value-equality scan over every entry.
    pub fn contains_value(&self, value: &V) -> bool
    where
        V: PartialEq,
    {
        self.table.nodes.values().any(|n| n.value == *value)
    }

    /// Live window over the keys.
    pub fn key_set(&mut self) -> KeySet<'_, K, V, S> {
        KeySet::new(self)
    }

    /// Live window over the values.
    pub fn values_view(&mut self) -> ValuesView<'_, K, V, S> {
        ValuesView::new(self)
    }

    /// Live window over the entries.
    pub fn entry_set(&mut self) -> EntrySet<'_, K, V, S> {
        EntrySet::new(self)
    }
}

impl<K, V, S> HybridHashMap<K, V, S>
where
    K: TreeKey,
    S: BuildHasher,
{
    /// Null keys skip hashing entirely.
    #[inline]
    fn make_hash<Q>(&self, q: &Q) -> u32
    where
        Q: ?Sized + TreeKey,
    {
        if q.is_null() {
            0
        } else {
            self.hashing.hash(q)
        }
    }

    #[inline]
    fn locate<Q>(&self, q: &Q) -> Located
    where
        K: Borrow<Q>,
        Q: ?Sized + TreeKey,
    {
        self.table.locate(self.make_hash(q), q)
    }

    fn find<Q>(&self, q: &Q) -> Option<NodeKey>
    where
        K: Borrow<Q>,
        Q: ?Sized + TreeKey,
    {
        self.table.find(self.make_hash(q), q)
    }

    pub fn get<Q>(&self, q: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + TreeKey,
    {
        let k = self.find(q)?;
        Some(&self.table.nodes[k].value)
    }

    pub fn get_key_value<Q>(&self, q: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + TreeKey,
    {
        let k = self.find(q)?;
        let n = &self.table.nodes[k];
        Some((&n.key, &n.value))
    }

    pub fn get_mut<Q>(&mut self, q: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: ?Sized + TreeKey,
    {
        let k = self.find(q)?;
        Some(&mut self.table.nodes[k].value)
    }

    /// The mapped value, or `default` when `q` is absent.
    pub fn get_or_default<'a, Q>(&'a self, q: &Q, default: &'a V) -> &'a V
    where
        K: Borrow<Q>,
        Q: ?Sized + TreeKey,
    {
        self.get(q).unwrap_or(default)
    }

    pub fn contains_key<Q>(&self, q: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + TreeKey,
    {
        self.find(q).is_some()
    }

    /// Maps `key` to `value`, returning the previous value. An existing
    /// key keeps its original key object.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        match self.locate(&key) {
            Located::Found(found) => Some(std::mem::replace(
                &mut self.table.nodes[found.node()].value,
                value,
            )),
            Located::Vacant(vacant) => {
                self.table.insert_vacant(vacant, key, value);
                None
            }
        }
    }

    /// Inserts only when `key` is absent. Returns the value already present,
    /// or `None` when `value` was inserted.
    pub fn put_if_absent(&mut self, key: K, value: V) -> Option<&V> {
        match self.locate(&key) {
            Located::Found(found) => Some(&self.table.nodes[found.node()].value),
            Located::Vacant(vacant) => {
                self.table.insert_vacant(vacant, key, value);
                None
            }
        }
    }

    pub fn remove<Q>(&mut self, q: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + TreeKey,
    {
        self.remove_entry(q).map(|(_, v)| v)
    }

    pub fn remove_entry<Q>(&mut self, q: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + TreeKey,
    {
        match self.locate(q) {
            Located::Found(found) => self.table.remove_found(found),
            Located::Vacant(_) => None,
        }
    }

    /// Removes `q` only while it maps to `value`.
    pub fn remove_if_eq<Q>(&mut self, q: &Q, value: &V) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + TreeKey,
        V: PartialEq,
    {
        match self.locate(q) {
            Located::Found(found) if self.table.nodes[found.node()].value == *value => {
                self.table.remove_found(found).is_some()
            }
            _ => false,
        }
    }

    /// Replaces the value of a present key; absent keys are left absent.
    pub fn replace<Q>(&mut self, q: &Q, value: V) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + TreeKey,
    {
        let v = self.get_mut(q)?;
        Some(std::mem::replace(v, value))
    }

    /// Replaces the value of `q` only while it equals `old`.
    pub fn replace_if_eq<Q>(&mut self, q: &Q, old: &V, new: V) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + TreeKey,
        V: PartialEq,
    {
        match self.get_mut(q) {
            Some(v) if *v == *old => {
                *v = new;
                true
            }
            _ => false,
        }
    }

    /// Returns the value of `key`, inserting `f(&key)` first when absent.
    /// `f` returning `None` leaves the map unchanged.
    pub fn compute_if_absent<F>(&mut self, key: K, f: F) -> Option<&mut V>
    where
        F: FnOnce(&K) -> Option<V>,
    {
        let node = match self.locate(&key) {
            Located::Found(found) => found.node(),
            Located::Vacant(vacant) => {
                let value = f(&key)?;
                self.table.insert_vacant(vacant, key, value)
            }
        };
        Some(&mut self.table.nodes[node].value)
    }

    /// Recomputes the value of a present key. `None` from `f` removes it.
    pub fn compute_if_present<Q, F>(&mut self, q: &Q, f: F) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: ?Sized + TreeKey,
        F: FnOnce(&K, &V) -> Option<V>,
    {
        let Located::Found(found) = self.locate(q) else {
            return None;
        };
        let n = &self.table.nodes[found.node()];
        match f(&n.key, &n.value) {
            Some(value) => {
                let slot = &mut self.table.nodes[found.node()].value;
                *slot = value;
                Some(slot)
            }
            None => {
                self.table.remove_found(found);
                None
            }
        }
    }

    /// Computes a new mapping from the current one (`None` when absent).
    /// `None` from `f` removes the key, or leaves it absent.
    pub fn compute<F>(&mut self, key: K, f: F) -> Option<&mut V>
    where
        F: FnOnce(&K, Option<&V>) -> Option<V>,
    {
        match self.locate(&key) {
            Located::Found(found) => {
                let n = &self.table.nodes[found.node()];
                match f(&n.key, Some(&n.value)) {
                    Some(value) => {
                        let slot = &mut self.table.nodes[found.node()].value;
                        *slot = value;
                        Some(slot)
                    }
                    None => {
                        self.table.remove_found(found);
                        None
                    }
                }
            }
            Located::Vacant(vacant) => {
                let value = f(&key, None)?;
                let node = self.table.insert_vacant(vacant, key, value);
                Some(&mut self.table.nodes[node].value)
            }
        }
    }

    /// Inserts `value` when `key` is absent, otherwise replaces the value
    /// with `f(old, value)`; `None` from `f` removes the key.
    pub fn merge<F>(&mut self, key: K, value: V, f: F) -> Option<&mut V>
    where
        F: FnOnce(&V, V) -> Option<V>,
    {
        match self.locate(&key) {
            Located::Found(found) => match f(&self.table.nodes[found.node()].value, value) {
                Some(merged) => {
                    let slot = &mut self.table.nodes[found.node()].value;
                    *slot = merged;
                    Some(slot)
                }
                None => {
                    self.table.remove_found(found);
                    None
                }
            },
            Located::Vacant(vacant) => {
                let node = self.table.insert_vacant(vacant, key, value);
                Some(&mut self.table.nodes[node].value)
            }
        }
    }

    /// Inserts every pair, sizing the table once up front.
    pub fn put_all<I>(&mut self, pairs: I)
    where
        I: IntoIterator<Item = (K, V)>,
    {
        let pairs = pairs.into_iter();
        self.table.reserve(pairs.size_hint().0);
        for (k, v) in pairs {
            self.insert(k, v);
        }
    }

    /// Copies another map into a fresh one sized for it.
    pub fn from_map<S2>(other: &HybridHashMap<K, V, S2>) -> Self
    where
        K: Clone,
        V: Clone,
        S: Default,
    {
        let capacity = ((other.len() as f32 / DEFAULT_LOAD_FACTOR) as usize + 1)
            .max(DEFAULT_INITIAL_CAPACITY);
        let mut map = Self::with_capacity_and_hasher(capacity, S::default());
        map.put_all(other.iter().map(|(k, v)| (k.clone(), v.clone())));
        map
    }

    /// Checks every structural invariant: bucket placement, red-black
    /// shape of tree bins, traversal lists and size accounting.
    #[doc(hidden)]
    pub fn check_invariants(&self) -> core::result::Result<(), String> {
        self.table.check_invariants()
    }
}

impl<K, V, S> Clone for HybridHashMap<K, V, S>
where
    K: TreeKey + Clone,
    V: Clone,
    S: Clone,
{
    /// Same hasher and seed; entries are re-inserted by cached hash without
    /// rehashing.
    fn clone(&self) -> Self {
        let mut table = RawTable::new(self.table.capacity(), self.table.load_factor());
        if self.table.slot_count() > 0 {
            table.presize_for_copy(self.len(), self.table.slot_count());
        }
        let mut walk = Walk::new(&self.table);
        while let Some(k) = walk.advance(&self.table) {
            let n = &self.table.nodes[k];
            table.insert_for_copy(n.hash, n.key.clone(), n.value.clone());
        }
        Self {
            table,
            hashing: self.hashing.clone(),
            id: next_map_id(),
        }
    }
}

impl<K, V, S> fmt::Debug for HybridHashMap<K, V, S>
where
    K: fmt::Debug,
    V: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K, V, S> PartialEq for HybridHashMap<K, V, S>
where
    K: TreeKey,
    V: PartialEq,
    S: BuildHasher,
{
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .all(|(k, v)| other.get(k).map_or(false, |ov| *v == *ov))
    }
}

impl<K, V, S> Eq for HybridHashMap<K, V, S>
where
    K: TreeKey,
    V: Eq,
    S: BuildHasher,
{
}

impl<K, Q, V, S> Index<&Q> for HybridHashMap<K, V, S>
where
    K: TreeKey + Borrow<Q>,
    Q: ?Sized + TreeKey,
    S: BuildHasher,
{
    type Output = V;

    fn index(&self, key: &Q) -> &V {
        self.get(key).expect("no entry found for key")
    }
}

impl<K, V, S> Extend<(K, V)> for HybridHashMap<K, V, S>
where
    K: TreeKey,
    S: BuildHasher,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        self.put_all(iter);
    }
}

impl<K, V, S> FromIterator<(K, V)> for HybridHashMap<K, V, S>
where
    K: TreeKey,
    S: BuildHasher + Default,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::with_hasher(S::default());
        map.put_all(iter);
        map
    }
}

impl<K, V, S> IntoIterator for HybridHashMap<K, V, S> {
    type Item = (K, V);
    type IntoIter = IntoIter<K, V>;

    fn into_iter(self) -> IntoIter<K, V> {
        IntoIter {
            it: self.table.nodes.into_iter(),
        }
    }
}

impl<'a, K, V, S> IntoIterator for &'a HybridHashMap<K, V, S> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Iter<'a, K, V> {
        self.iter()
    }
}

impl<'a, K, V, S> IntoIterator for &'a mut HybridHashMap<K, V, S> {
    type Item = (&'a K, &'a mut V);
    type IntoIter = IterMut<'a, K, V>;

    fn into_iter(self) -> IterMut<'a, K, V> {
        self.iter_mut()
    }
}
