//! Fail-fast cursor.
//!
//! A `Cursor` holds no borrow of the map. It records which map it was made
//! for and the map's modification counter at creation, and checks both on
//! every call. Any insertion of a new key or removal performed outside the
//! cursor makes the next call fail with `ConcurrentModification`; value
//! replacement never does. Removal through the cursor resynchronizes the
//! recorded counter, so the cursor stays usable.

use crate::error::{MapError, Result};
use crate::hybrid_hash_map::HybridHashMap;
use crate::iter::Walk;
use crate::node::NodeKey;

#[derive(Clone, Debug)]
pub struct Cursor {
    map_id: u64,
    expected_mod_count: u64,
    walk: Walk,
    /// Entry returned by the last `next`, cleared by `remove`.
    current: Option<NodeKey>,
}

impl Cursor {
    pub(crate) fn new<K, V, S>(map: &HybridHashMap<K, V, S>) -> Self {
        Self {
            map_id: map.id,
            expected_mod_count: map.table.mod_count(),
            walk: Walk::new(&map.table),
            current: None,
        }
    }

    fn check<K, V, S>(&self, map: &HybridHashMap<K, V, S>) -> Result<()> {
        if map.id != self.map_id {
            return Err(MapError::WrongMap);
        }
        let actual = map.table.mod_count();
        if actual != self.expected_mod_count {
            return Err(MapError::ConcurrentModification {
                expected: self.expected_mod_count,
                actual,
            });
        }
        Ok(())
    }

    /// True while entries remain. Does not check for modification.
    pub fn has_next(&self) -> bool {
        self.walk.peek().is_some()
    }

    /// Advances to the next entry. `Ok(None)` once the traversal is done.
    pub fn next<'m, K, V, S>(
        &mut self,
        map: &'m HybridHashMap<K, V, S>,
    ) -> Result<Option<(&'m K, &'m V)>> {
        self.check(map)?;
        let Some(k) = self.walk.advance(&map.table) else {
            return Ok(None);
        };
        self.current = Some(k);
        let n = &map.table.nodes[k];
        Ok(Some((&n.key, &n.value)))
    }

    /// Removes the entry last returned by `next`.
    pub fn remove<K, V, S>(&mut self, map: &mut HybridHashMap<K, V, S>) -> Result<(K, V)> {
        let current = self.current.ok_or(MapError::NoCurrentEntry)?;
        self.check(map)?;
        let removed = map.remove_node(current).ok_or(MapError::NoCurrentEntry)?;
        self.current = None;
        self.expected_mod_count = map.table.mod_count();
        Ok(removed)
    }

    /// Mutable access to the value last returned by `next`.
    pub fn value_mut<'m, K, V, S>(&self, map: &'m mut HybridHashMap<K, V, S>) -> Result<&'m mut V> {
        let current = self.current.ok_or(MapError::NoCurrentEntry)?;
        self.check(map)?;
        map.table
            .nodes
            .get_mut(current)
            .map(|n| &mut n.value)
            .ok_or(MapError::NoCurrentEntry)
    }

    /// Replaces the value last returned by `next`, returning the old one.
    pub fn set_value<K, V, S>(&self, map: &mut HybridHashMap<K, V, S>, value: V) -> Result<V> {
        let slot = self.value_mut(map)?;
        Ok(std::mem::replace(slot, value))
    }
}
