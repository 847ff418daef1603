//! Live views over a map's keys, values and entries.
//!
//! Each view holds the map mutably for its lifetime; removal through a
//! view removes from the map.

use crate::cursor::Cursor;
use crate::error::Result;
use crate::hash::TreeKey;
use crate::hybrid_hash_map::HybridHashMap;
use crate::iter::{Iter, Keys, Values, Walk};
use core::borrow::Borrow;
use core::hash::BuildHasher;

/// Key view; see [`HybridHashMap::key_set`].
pub struct KeySet<'a, K, V, S> {
    map: &'a mut HybridHashMap<K, V, S>,
}

impl<'a, K, V, S> KeySet<'a, K, V, S> {
    pub(crate) fn new(map: &'a mut HybridHashMap<K, V, S>) -> Self {
        Self { map }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }

    pub fn iter(&self) -> Keys<'_, K, V> {
        self.map.keys()
    }

    pub fn retain<F>(&mut self, mut f: F)
    where
        F: FnMut(&K) -> bool,
    {
        self.map.retain(|k, _| f(k));
    }

    pub fn cursor(&self) -> Cursor {
        self.map.cursor()
    }

    pub fn next(&self, cursor: &mut Cursor) -> Result<Option<&K>> {
        Ok(cursor.next(&*self.map)?.map(|(k, _)| k))
    }

    /// Removes the key last returned through `cursor`.
    pub fn remove_current(&mut self, cursor: &mut Cursor) -> Result<K> {
        cursor.remove(&mut *self.map).map(|(k, _)| k)
    }
}

impl<K, V, S> KeySet<'_, K, V, S>
where
    K: TreeKey,
    S: BuildHasher,
{
    pub fn contains<Q>(&self, q: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + TreeKey,
    {
        self.map.contains_key(q)
    }

    /// True when `q` was present.
    pub fn remove<Q>(&mut self, q: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + TreeKey,
    {
        self.map.remove_entry(q).is_some()
    }
}

/// Value view; see [`HybridHashMap::values_view`].
pub struct ValuesView<'a, K, V, S> {
    map: &'a mut HybridHashMap<K, V, S>,
}

impl<'a, K, V, S> ValuesView<'a, K, V, S> {
    pub(crate) fn new(map: &'a mut HybridHashMap<K, V, S>) -> Self {
        Self { map }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }

    pub fn iter(&self) -> Values<'_, K, V> {
        self.map.values()
    }

    pub fn contains(&self, value: &V) -> bool
    where
        V: PartialEq,
    {
        self.map.contains_value(value)
    }

    /// Removes the first entry, in traversal order, holding `value`.
    pub fn remove(&mut self, value: &V) -> bool
    where
        V: PartialEq,
    {
        let table = &self.map.table;
        let mut walk = Walk::new(table);
        while let Some(k) = walk.advance(table) {
            if table.nodes[k].value == *value {
                return self.map.remove_node(k).is_some();
            }
        }
        false
    }

    pub fn retain<F>(&mut self, mut f: F)
    where
        F: FnMut(&V) -> bool,
    {
        self.map.retain(|_, v| f(v));
    }

    pub fn cursor(&self) -> Cursor {
        self.map.cursor()
    }

    pub fn next(&self, cursor: &mut Cursor) -> Result<Option<&V>> {
        Ok(cursor.next(&*self.map)?.map(|(_, v)| v))
    }

    /// Removes the entry whose value was last returned through `cursor`.
    pub fn remove_current(&mut self, cursor: &mut Cursor) -> Result<V> {
        cursor.remove(&mut *self.map).map(|(_, v)| v)
    }
}

/// Entry view; see [`HybridHashMap::entry_set`].
pub struct EntrySet<'a, K, V, S> {
    map: &'a mut HybridHashMap<K, V, S>,
}

impl<'a, K, V, S> EntrySet<'a, K, V, S> {
    pub(crate) fn new(map: &'a mut HybridHashMap<K, V, S>) -> Self {
        Self { map }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }

    pub fn iter(&self) -> Iter<'_, K, V> {
        self.map.iter()
    }

    pub fn retain<F>(&mut self, mut f: F)
    where
        F: FnMut(&K, &V) -> bool,
    {
        self.map.retain(|k, v| f(k, v));
    }

    pub fn cursor(&self) -> Cursor {
        self.map.cursor()
    }

    pub fn next(&self, cursor: &mut Cursor) -> Result<Option<(&K, &V)>> {
        cursor.next(&*self.map)
    }

    /// Replaces the value of the entry last returned through `cursor`.
    pub fn set_value(&mut self, cursor: &Cursor, value: V) -> Result<V> {
        cursor.set_value(&mut *self.map, value)
    }

    pub fn remove_current(&mut self, cursor: &mut Cursor) -> Result<(K, V)> {
        cursor.remove(&mut *self.map)
    }
}

impl<K, V, S> EntrySet<'_, K, V, S>
where
    K: TreeKey,
    S: BuildHasher,
{
    /// True when `q` maps to `value`.
    pub fn contains<Q>(&self, q: &Q, value: &V) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + TreeKey,
        V: PartialEq,
    {
        self.map.get(q).map_or(false, |v| *v == *value)
    }

    /// Removes `q` only while it maps to `value`.
    pub fn remove<Q>(&mut self, q: &Q, value: &V) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + TreeKey,
        V: PartialEq,
    {
        self.map.remove_if_eq(q, value)
    }
}

#[cfg(test)]
mod tests {
    use crate::error::MapError;
    use crate::hybrid_hash_map::HybridHashMap;

    fn sample() -> HybridHashMap<u32, u32> {
        (0..30).map(|i| (i, i % 5)).collect()
    }

    /// Invariant: removal through the key view removes from the map.
    #[test]
    fn key_set_writes_through() {
        let mut m = sample();
        let mut keys = m.key_set();
        assert_eq!(keys.len(), 30);
        assert!(keys.contains(&7));
        assert!(keys.remove(&7));
        assert!(!keys.remove(&7));
        keys.retain(|k| *k < 20);
        assert_eq!(keys.iter().count(), 19);
        assert_eq!(m.len(), 19);
        assert!(!m.contains_key(&7));
        assert!(!m.contains_key(&25));
    }

    /// Invariant: value removal drops exactly one matching entry.
    #[test]
    fn values_view_removes_one_match() {
        let mut m = sample();
        let mut values = m.values_view();
        assert!(values.contains(&4));
        assert!(values.remove(&4));
        assert_eq!(values.len(), 29);
        assert_eq!(values.iter().filter(|v| **v == 4).count(), 5);
        values.retain(|v| *v != 0);
        assert!(!values.contains(&0));
        assert!(!values.remove(&0));
        assert_eq!(m.len(), 23);
    }

    /// Invariant: entry containment and removal need both key and value to match.
    #[test]
    fn entry_set_matches_pairs() {
        let mut m = sample();
        let mut entries = m.entry_set();
        assert!(entries.contains(&6, &1));
        assert!(!entries.contains(&6, &2));
        assert!(!entries.remove(&6, &2));
        assert!(entries.remove(&6, &1));
        entries.retain(|k, v| k + v < 30);
        assert!(entries.iter().all(|(k, v)| k + v < 30));
        entries.clear();
        assert!(entries.is_empty());
        assert!(m.is_empty());
    }

    /// Invariant: view cursors share the map's fail-fast contract.
    #[test]
    fn view_cursor_removal() {
        let mut m = sample();
        let mut keys = m.key_set();
        let mut c = keys.cursor();
        loop {
            let k = match keys.next(&mut c).unwrap() {
                Some(k) => *k,
                None => break,
            };
            if k >= 10 {
                assert_eq!(keys.remove_current(&mut c), Ok(k));
            }
        }
        assert_eq!(keys.len(), 10);

        let mut entries = m.entry_set();
        let mut c = entries.cursor();
        let first = match entries.next(&mut c).unwrap() {
            Some((k, _)) => *k,
            None => unreachable!(),
        };
        assert_eq!(entries.set_value(&c, 99), Ok(first % 5));
        assert!(entries.contains(&first, &99));
        let other = (first + 1) % 10;
        assert!(entries.remove(&other, &(other % 5)));
        assert!(matches!(
            entries.next(&mut c),
            Err(MapError::ConcurrentModification { .. })
        ));
    }
}
