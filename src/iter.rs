//! Borrowing and owning iterators.
//!
//! `Iter`, `Keys` and `Values` visit the null entry first, then buckets in
//! slot order, walking a tree bin's `first` list rather than its shape.
//! The mutable and owning iterators go through the arena directly, so
//! their order differs; no order is promised either way.

use crate::node::{Node, NodeKey};
use crate::raw_table::RawTable;
use core::iter::FusedIterator;

/// Position in the traversal order shared by iterators and cursors.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Walk {
    next: Option<NodeKey>,
    /// Next slot to look at once the current bucket is exhausted.
    index: usize,
}

impl Walk {
    pub(crate) fn new<K, V>(table: &RawTable<K, V>) -> Self {
        let mut walk = Walk {
            next: table.null_entry(),
            index: 0,
        };
        if walk.next.is_none() {
            walk.fill(table);
        }
        walk
    }

    fn fill<K, V>(&mut self, table: &RawTable<K, V>) {
        match table.first_from(self.index, table.slot_count()) {
            Some((i, k)) => {
                self.next = Some(k);
                self.index = i + 1;
            }
            None => self.index = table.slot_count(),
        }
    }

    #[inline]
    pub(crate) fn peek(&self) -> Option<NodeKey> {
        self.next
    }

    pub(crate) fn advance<K, V>(&mut self, table: &RawTable<K, V>) -> Option<NodeKey> {
        let cur = self.next?;
        self.next = table.nodes.get(cur).and_then(|n| n.next);
        if self.next.is_none() {
            self.fill(table);
        }
        Some(cur)
    }
}

/// Iterator over `(&K, &V)`.
pub struct Iter<'a, K, V> {
    table: &'a RawTable<K, V>,
    walk: Walk,
    remaining: usize,
}

impl<'a, K, V> Iter<'a, K, V> {
    pub(crate) fn new(table: &'a RawTable<K, V>) -> Self {
        Self {
            table,
            walk: Walk::new(table),
            remaining: table.len(),
        }
    }
}

impl<K, V> Clone for Iter<'_, K, V> {
    fn clone(&self) -> Self {
        Self {
            table: self.table,
            walk: self.walk,
            remaining: self.remaining,
        }
    }
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        let table = self.table;
        let k = self.walk.advance(table)?;
        self.remaining -= 1;
        let n = &table.nodes[k];
        Some((&n.key, &n.value))
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}
impl<K, V> FusedIterator for Iter<'_, K, V> {}

/// Iterator over keys.
pub struct Keys<'a, K, V> {
    pub(crate) inner: Iter<'a, K, V>,
}

impl<K, V> Clone for Keys<'_, K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<'a, K, V> Iterator for Keys<'a, K, V> {
    type Item = &'a K;
    #[inline]
    fn next(&mut self) -> Option<&'a K> {
        self.inner.next().map(|(k, _)| k)
    }
    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for Keys<'_, K, V> {}
impl<K, V> FusedIterator for Keys<'_, K, V> {}

/// Iterator over values.
pub struct Values<'a, K, V> {
    pub(crate) inner: Iter<'a, K, V>,
}

impl<K, V> Clone for Values<'_, K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<'a, K, V> Iterator for Values<'a, K, V> {
    type Item = &'a V;
    #[inline]
    fn next(&mut self) -> Option<&'a V> {
        self.inner.next().map(|(_, v)| v)
    }
    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for Values<'_, K, V> {}
impl<K, V> FusedIterator for Values<'_, K, V> {}

/// Iterator over `(&K, &mut V)` in storage order.
pub struct IterMut<'a, K, V> {
    pub(crate) it: slotmap::basic::IterMut<'a, NodeKey, Node<K, V>>,
}

impl<'a, K, V> Iterator for IterMut<'a, K, V> {
    type Item = (&'a K, &'a mut V);
    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.it.next().map(|(_, n)| (&n.key, &mut n.value))
    }
    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.it.size_hint()
    }
}

impl<K, V> ExactSizeIterator for IterMut<'_, K, V> {}
impl<K, V> FusedIterator for IterMut<'_, K, V> {}

/// Iterator over `&mut V` in storage order.
pub struct ValuesMut<'a, K, V> {
    pub(crate) inner: IterMut<'a, K, V>,
}

impl<'a, K, V> Iterator for ValuesMut<'a, K, V> {
    type Item = &'a mut V;
    #[inline]
    fn next(&mut self) -> Option<&'a mut V> {
        self.inner.next().map(|(_, v)| v)
    }
    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for ValuesMut<'_, K, V> {}
impl<K, V> FusedIterator for ValuesMut<'_, K, V> {}

/// Owning iterator over `(K, V)`.
pub struct IntoIter<K, V> {
    pub(crate) it: slotmap::basic::IntoIter<NodeKey, Node<K, V>>,
}

impl<K, V> Iterator for IntoIter<K, V> {
    type Item = (K, V);
    #[inline]
    fn next(&mut self) -> Option<(K, V)> {
        self.it.next().map(|(_, n)| (n.key, n.value))
    }
    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.it.size_hint()
    }
}

impl<K, V> ExactSizeIterator for IntoIter<K, V> {}
impl<K, V> FusedIterator for IntoIter<K, V> {}
