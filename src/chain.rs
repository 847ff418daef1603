//! Singly-linked chain buckets.

use crate::hash::TreeKey;
use crate::node::{Arena, NodeKey};
use core::borrow::Borrow;

/// Result of a counted scan over a chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Scan {
    Found {
        node: NodeKey,
        prev: Option<NodeKey>,
    },
    /// Key absent; `len` nodes were visited.
    Missing { len: usize },
}

/// Walks the chain once, comparing cached hash then key, and counts its
/// length on a miss so the caller can decide on promotion.
pub(crate) fn scan<K, V, Q>(nodes: &Arena<K, V>, head: NodeKey, hash: u32, key: &Q) -> Scan
where
    K: Borrow<Q>,
    Q: ?Sized + TreeKey,
{
    let mut prev = None;
    let mut cur = Some(head);
    let mut len = 0;
    while let Some(k) = cur {
        let n = &nodes[k];
        if n.hash == hash && n.key.borrow() == key {
            return Scan::Found { node: k, prev };
        }
        len += 1;
        prev = Some(k);
        cur = n.next;
    }
    Scan::Missing { len }
}

/// Node preceding `target`, or `None` when `target` is the head.
pub(crate) fn predecessor<K, V>(
    nodes: &Arena<K, V>,
    head: NodeKey,
    target: NodeKey,
) -> Option<NodeKey> {
    let mut prev = None;
    let mut cur = Some(head);
    while let Some(k) = cur {
        if k == target {
            break;
        }
        prev = Some(k);
        cur = nodes[k].next;
    }
    prev
}

/// Unlinks `node` given its predecessor. Returns the new head, `None` when
/// the chain became empty.
pub(crate) fn unlink<K, V>(
    nodes: &mut Arena<K, V>,
    head: NodeKey,
    node: NodeKey,
    prev: Option<NodeKey>,
) -> Option<NodeKey> {
    let next = nodes[node].next.take();
    match prev {
        Some(p) => {
            nodes[p].next = next;
            Some(head)
        }
        None => next,
    }
}

pub(crate) fn len<K, V>(nodes: &Arena<K, V>, head: NodeKey) -> usize {
    let mut n = 0;
    let mut cur = Some(head);
    while let Some(k) = cur {
        n += 1;
        cur = nodes[k].next;
    }
    n
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Node;

    fn build(nodes: &mut Arena<u32, &'static str>, items: &[(u32, u32)]) -> NodeKey {
        let mut head = None;
        for &(k, h) in items.iter().rev() {
            let key = nodes.insert(Node::new(k, "v", h));
            nodes[key].next = head;
            head = Some(key);
        }
        head.unwrap()
    }

    /// Invariant: a hit reports its predecessor; a miss reports the length.
    #[test]
    fn scan_hit_and_miss() {
        let mut nodes = Arena::with_key();
        let head = build(&mut nodes, &[(1, 7), (2, 7), (3, 9)]);
        match scan(&nodes, head, 7, &2u32) {
            Scan::Found { node, prev } => {
                assert_eq!(nodes[node].key, 2);
                assert_eq!(prev, Some(head));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(scan(&nodes, head, 7, &3u32), Scan::Missing { len: 3 });
        assert_eq!(len(&nodes, head), 3);
    }

    /// Invariant: unlinking head, middle and tail keeps the rest reachable.
    #[test]
    fn unlink_positions() {
        let mut nodes = Arena::with_key();
        let head = build(&mut nodes, &[(1, 1), (2, 2), (3, 3)]);
        let second = nodes[head].next.unwrap();
        let third = nodes[second].next.unwrap();

        let p = predecessor(&nodes, head, second);
        assert_eq!(p, Some(head));
        let head = unlink(&mut nodes, head, second, p).unwrap();
        assert_eq!(len(&nodes, head), 2);

        let p = predecessor(&nodes, head, head);
        assert_eq!(p, None);
        let head = unlink(&mut nodes, head, head, p).unwrap();
        assert_eq!(head, third);
        assert_eq!(unlink(&mut nodes, head, third, None), None);
    }
}
