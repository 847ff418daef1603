//! Tree bins: red-black trees ordered by cached hash, then by
//! `TreeKey::tree_cmp` when the key type is ordered.
//!
//! Nodes stay in the shared arena; a bin only records its `root` and the
//! head of its `first` list. The `first` list threads every node through
//! `Node::next` / `TreeLinks::prev` and is what traversal and resize
//! splitting walk, so neither depends on tree shape.
//!
//! Deletion swaps tree links with the successor instead of moving
//! payloads, so a `NodeKey` held by a cursor keeps naming the same entry.

use crate::config::TREE_THRESHOLD;
use crate::hash::TreeKey;
use crate::node::{Arena, Bucket, NodeKey, TreeLinks};
use core::borrow::Borrow;
use core::cmp::Ordering;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct TreeBin {
    pub(crate) root: Option<NodeKey>,
    pub(crate) first: Option<NodeKey>,
}

/// Where a key sits, or where it would be attached.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Probe {
    Found(NodeKey),
    Vacant { parent: Option<NodeKey>, left: bool },
}

#[inline]
fn is_red<K, V>(nodes: &Arena<K, V>, k: Option<NodeKey>) -> bool {
    k.map_or(false, |k| nodes[k].tree.red)
}

#[inline]
fn set_black<K, V>(nodes: &mut Arena<K, V>, k: Option<NodeKey>) {
    if let Some(k) = k {
        nodes[k].tree.red = false;
    }
}

fn find_from<K, V, Q>(nodes: &Arena<K, V>, mut p: NodeKey, hash: u32, key: &Q) -> Option<NodeKey>
where
    K: Borrow<Q>,
    Q: ?Sized + TreeKey,
{
    loop {
        let n = &nodes[p];
        let next = if hash != n.hash {
            if hash < n.hash {
                n.tree.left
            } else {
                n.tree.right
            }
        } else if n.key.borrow() == key {
            return Some(p);
        } else {
            let order = if Q::ORDERED {
                key.tree_cmp(n.key.borrow())
            } else {
                Ordering::Equal
            };
            match order {
                Ordering::Less => n.tree.left,
                Ordering::Greater => n.tree.right,
                // No usable order: the key may be on either side.
                Ordering::Equal => {
                    if let Some(hit) = n.tree.right.and_then(|r| find_from(nodes, r, hash, key)) {
                        return Some(hit);
                    }
                    n.tree.left
                }
            }
        };
        p = next?;
    }
}

impl TreeBin {
    pub(crate) fn find<K, V, Q>(&self, nodes: &Arena<K, V>, hash: u32, key: &Q) -> Option<NodeKey>
    where
        K: Borrow<Q>,
        Q: ?Sized + TreeKey,
    {
        self.root.and_then(|r| find_from(nodes, r, hash, key))
    }

    /// Descends as `find` does, remembering the attachment point on a miss.
    pub(crate) fn probe<K, V, Q>(&self, nodes: &Arena<K, V>, hash: u32, key: &Q) -> Probe
    where
        K: Borrow<Q>,
        Q: ?Sized + TreeKey,
    {
        let Some(mut p) = self.root else {
            return Probe::Vacant {
                parent: None,
                left: true,
            };
        };
        loop {
            let n = &nodes[p];
            let left = if hash != n.hash {
                hash < n.hash
            } else if n.key.borrow() == key {
                return Probe::Found(p);
            } else {
                let order = if Q::ORDERED {
                    key.tree_cmp(n.key.borrow())
                } else {
                    Ordering::Equal
                };
                match order {
                    Ordering::Less => true,
                    Ordering::Greater => false,
                    Ordering::Equal => {
                        if let Some(hit) = n.tree.right.and_then(|r| find_from(nodes, r, hash, key))
                        {
                            return Probe::Found(hit);
                        }
                        true
                    }
                }
            };
            match if left { n.tree.left } else { n.tree.right } {
                Some(c) => p = c,
                None => {
                    return Probe::Vacant {
                        parent: Some(p),
                        left,
                    }
                }
            }
        }
    }

    /// Links `x` as a new leaf under `parent`, pushes it onto the `first`
    /// list and rebalances. `x` may come from a chain; its links are reset.
    pub(crate) fn attach<K, V>(
        &mut self,
        nodes: &mut Arena<K, V>,
        x: NodeKey,
        parent: Option<NodeKey>,
        left: bool,
    ) {
        let first = self.first;
        {
            let n = &mut nodes[x];
            n.next = first;
            n.tree = TreeLinks {
                parent,
                ..TreeLinks::default()
            };
        }
        if let Some(f) = first {
            nodes[f].tree.prev = Some(x);
        }
        self.first = Some(x);
        match parent {
            None => {
                debug_assert!(self.root.is_none());
                self.root = Some(x);
            }
            Some(p) => {
                if left {
                    nodes[p].tree.left = Some(x);
                } else {
                    nodes[p].tree.right = Some(x);
                }
                nodes[x].tree.red = true;
                self.balance_insertion(nodes, x);
            }
        }
    }

    /// Re-inserts a node that already lives in the arena (promotion, split).
    fn relink<K: TreeKey, V>(&mut self, nodes: &mut Arena<K, V>, x: NodeKey) {
        let hash = nodes[x].hash;
        let probe = self.probe(nodes, hash, &nodes[x].key);
        match probe {
            Probe::Vacant { parent, left } => self.attach(nodes, x, parent, left),
            Probe::Found(_) => unreachable!("duplicate key within one bucket"),
        }
    }

    /// Builds a bin from a chain, reusing its nodes.
    pub(crate) fn from_chain<K: TreeKey, V>(nodes: &mut Arena<K, V>, head: NodeKey) -> TreeBin {
        let mut bin = TreeBin::default();
        let mut cur = Some(head);
        while let Some(k) = cur {
            cur = nodes[k].next;
            bin.relink(nodes, k);
        }
        bin
    }

    /// Partitions the bin by `bit` into the buckets for index `i` and
    /// `i + bit` of the doubled table.
    pub(crate) fn split<K: TreeKey, V>(self, nodes: &mut Arena<K, V>, bit: u32) -> (Bucket, Bucket) {
        let mut lo = TreeBin::default();
        let mut hi = TreeBin::default();
        let (mut lo_count, mut hi_count) = (0usize, 0usize);
        let mut cur = self.first;
        while let Some(k) = cur {
            cur = nodes[k].next;
            if nodes[k].hash & bit == 0 {
                lo.relink(nodes, k);
                lo_count += 1;
            } else {
                hi.relink(nodes, k);
                hi_count += 1;
            }
        }
        (lo.settle(nodes, lo_count), hi.settle(nodes, hi_count))
    }

    fn settle<K, V>(self, nodes: &mut Arena<K, V>, count: usize) -> Bucket {
        if count >= TREE_THRESHOLD {
            return Bucket::Tree(self);
        }
        if count > 0 {
            log::trace!("flattening split tree bin of {} entries", count);
        }
        match self.into_chain(nodes) {
            Some(head) => Bucket::Chain(head),
            None => Bucket::Empty,
        }
    }

    /// Unthreads every node and returns them as a plain chain.
    pub(crate) fn into_chain<K, V>(self, nodes: &mut Arena<K, V>) -> Option<NodeKey> {
        let mut head = None;
        let mut cur = self.first;
        while let Some(k) = cur {
            let n = &mut nodes[k];
            cur = n.next;
            n.next = head;
            n.tree = TreeLinks::default();
            head = Some(k);
        }
        head
    }

    pub(crate) fn len<K, V>(&self, nodes: &Arena<K, V>) -> usize {
        let mut n = 0;
        let mut cur = self.first;
        while let Some(k) = cur {
            n += 1;
            cur = nodes[k].next;
        }
        n
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    fn rotate_left<K, V>(&mut self, nodes: &mut Arena<K, V>, p: NodeKey) {
        let Some(r) = nodes[p].tree.right else {
            return;
        };
        let rl = nodes[r].tree.left;
        nodes[p].tree.right = rl;
        if let Some(rl) = rl {
            nodes[rl].tree.parent = Some(p);
        }
        let pp = nodes[p].tree.parent;
        nodes[r].tree.parent = pp;
        match pp {
            None => self.root = Some(r),
            Some(pp) => {
                if nodes[pp].tree.left == Some(p) {
                    nodes[pp].tree.left = Some(r);
                } else {
                    nodes[pp].tree.right = Some(r);
                }
            }
        }
        nodes[r].tree.left = Some(p);
        nodes[p].tree.parent = Some(r);
    }

    fn rotate_right<K, V>(&mut self, nodes: &mut Arena<K, V>, p: NodeKey) {
        let Some(l) = nodes[p].tree.left else {
            return;
        };
        let lr = nodes[l].tree.right;
        nodes[p].tree.left = lr;
        if let Some(lr) = lr {
            nodes[lr].tree.parent = Some(p);
        }
        let pp = nodes[p].tree.parent;
        nodes[l].tree.parent = pp;
        match pp {
            None => self.root = Some(l),
            Some(pp) => {
                if nodes[pp].tree.right == Some(p) {
                    nodes[pp].tree.right = Some(l);
                } else {
                    nodes[pp].tree.left = Some(l);
                }
            }
        }
        nodes[l].tree.right = Some(p);
        nodes[p].tree.parent = Some(l);
    }

    fn balance_insertion<K, V>(&mut self, nodes: &mut Arena<K, V>, mut x: NodeKey) {
        loop {
            let Some(xp) = nodes[x].tree.parent else {
                break;
            };
            if !nodes[xp].tree.red {
                break;
            }
            let Some(xpp) = nodes[xp].tree.parent else {
                break;
            };
            if nodes[xpp].tree.left == Some(xp) {
                let uncle = nodes[xpp].tree.right;
                if is_red(nodes, uncle) {
                    set_black(nodes, uncle);
                    nodes[xp].tree.red = false;
                    nodes[xpp].tree.red = true;
                    x = xpp;
                } else {
                    let mut xp = Some(xp);
                    let mut xpp = Some(xpp);
                    if xp.and_then(|p| nodes[p].tree.right) == Some(x) {
                        if let Some(p) = xp {
                            x = p;
                        }
                        self.rotate_left(nodes, x);
                        xp = nodes[x].tree.parent;
                        xpp = xp.and_then(|p| nodes[p].tree.parent);
                    }
                    if let Some(p) = xp {
                        nodes[p].tree.red = false;
                        if let Some(pp) = xpp {
                            nodes[pp].tree.red = true;
                            self.rotate_right(nodes, pp);
                        }
                    }
                }
            } else {
                let uncle = nodes[xpp].tree.left;
                if is_red(nodes, uncle) {
                    set_black(nodes, uncle);
                    nodes[xp].tree.red = false;
                    nodes[xpp].tree.red = true;
                    x = xpp;
                } else {
                    let mut xp = Some(xp);
                    let mut xpp = Some(xpp);
                    if xp.and_then(|p| nodes[p].tree.left) == Some(x) {
                        if let Some(p) = xp {
                            x = p;
                        }
                        self.rotate_right(nodes, x);
                        xp = nodes[x].tree.parent;
                        xpp = xp.and_then(|p| nodes[p].tree.parent);
                    }
                    if let Some(p) = xp {
                        nodes[p].tree.red = false;
                        if let Some(pp) = xpp {
                            nodes[pp].tree.red = true;
                            self.rotate_left(nodes, pp);
                        }
                    }
                }
            }
        }
        set_black(nodes, self.root);
    }

    /// Removes `p` from the bin. The node stays in the arena with cleared
    /// links; freeing it is the caller's job.
    pub(crate) fn delete<K, V>(&mut self, nodes: &mut Arena<K, V>, p: NodeKey) {
        // Off the `first` list before any restructuring.
        let next = nodes[p].next;
        let pred = nodes[p].tree.prev;
        match pred {
            None => self.first = next,
            Some(pred) => nodes[pred].next = next,
        }
        if let Some(next) = next {
            nodes[next].tree.prev = pred;
        }
        nodes[p].next = None;
        nodes[p].tree.prev = None;

        let pl = nodes[p].tree.left;
        let pr = nodes[p].tree.right;
        let replacement = match (pl, pr) {
            (Some(pl), Some(pr)) => {
                let mut s = pr;
                while let Some(sl) = nodes[s].tree.left {
                    s = sl;
                }
                let c = nodes[s].tree.red;
                nodes[s].tree.red = nodes[p].tree.red;
                nodes[p].tree.red = c;
                let sr = nodes[s].tree.right;
                let pp = nodes[p].tree.parent;
                if s == pr {
                    // successor is p's direct right child
                    nodes[p].tree.parent = Some(s);
                    nodes[s].tree.right = Some(p);
                } else {
                    let sp = nodes[s].tree.parent;
                    nodes[p].tree.parent = sp;
                    if let Some(sp) = sp {
                        if nodes[sp].tree.left == Some(s) {
                            nodes[sp].tree.left = Some(p);
                        } else {
                            nodes[sp].tree.right = Some(p);
                        }
                    }
                    nodes[s].tree.right = Some(pr);
                    nodes[pr].tree.parent = Some(s);
                }
                nodes[p].tree.left = None;
                nodes[p].tree.right = sr;
                if let Some(sr) = sr {
                    nodes[sr].tree.parent = Some(p);
                }
                nodes[s].tree.left = Some(pl);
                nodes[pl].tree.parent = Some(s);
                nodes[s].tree.parent = pp;
                match pp {
                    None => self.root = Some(s),
                    Some(pp) => {
                        if nodes[pp].tree.left == Some(p) {
                            nodes[pp].tree.left = Some(s);
                        } else {
                            nodes[pp].tree.right = Some(s);
                        }
                    }
                }
                sr
            }
            (Some(pl), None) => Some(pl),
            (None, pr) => pr,
        };

        let pp = nodes[p].tree.parent;
        let replacement = match replacement {
            Some(r) => {
                nodes[r].tree.parent = pp;
                match pp {
                    None => self.root = Some(r),
                    Some(pp) => {
                        if nodes[pp].tree.left == Some(p) {
                            nodes[pp].tree.left = Some(r);
                        } else {
                            nodes[pp].tree.right = Some(r);
                        }
                    }
                }
                let t = &mut nodes[p].tree;
                t.left = None;
                t.right = None;
                t.parent = None;
                r
            }
            None if pp.is_none() => {
                self.root = None;
                nodes[p].tree = TreeLinks::default();
                return;
            }
            // p is a leaf: it stands in as the replacement during fixup
            None => p,
        };

        if !nodes[p].tree.red {
            self.balance_deletion(nodes, replacement);
        }

        if replacement == p {
            if let Some(pp) = nodes[p].tree.parent {
                if nodes[pp].tree.left == Some(p) {
                    nodes[pp].tree.left = None;
                } else if nodes[pp].tree.right == Some(p) {
                    nodes[pp].tree.right = None;
                }
            }
        }
        nodes[p].tree = TreeLinks::default();
    }

    fn balance_deletion<K, V>(&mut self, nodes: &mut Arena<K, V>, x: NodeKey) {
        let mut x = Some(x);
        while let Some(xk) = x {
            let xp0 = match nodes[xk].tree.parent {
                Some(xp) if !nodes[xk].tree.red => xp,
                _ => {
                    nodes[xk].tree.red = false;
                    break;
                }
            };
            if nodes[xp0].tree.left == Some(xk) {
                let mut xp = Some(xp0);
                let mut sib = nodes[xp0].tree.right;
                if is_red(nodes, sib) {
                    set_black(nodes, sib);
                    nodes[xp0].tree.red = true;
                    self.rotate_left(nodes, xp0);
                    xp = nodes[xk].tree.parent;
                    sib = xp.and_then(|p| nodes[p].tree.right);
                }
                let Some(s) = sib else {
                    x = xp;
                    continue;
                };
                let sl = nodes[s].tree.left;
                let sr = nodes[s].tree.right;
                if !is_red(nodes, sr) && !is_red(nodes, sl) {
                    nodes[s].tree.red = true;
                    x = xp;
                } else {
                    let mut sib = Some(s);
                    if !is_red(nodes, sr) {
                        set_black(nodes, sl);
                        nodes[s].tree.red = true;
                        self.rotate_right(nodes, s);
                        xp = nodes[xk].tree.parent;
                        sib = xp.and_then(|p| nodes[p].tree.right);
                    }
                    if let Some(s) = sib {
                        nodes[s].tree.red = is_red(nodes, xp);
                        let sr = nodes[s].tree.right;
                        set_black(nodes, sr);
                    }
                    if let Some(p) = xp {
                        nodes[p].tree.red = false;
                        self.rotate_left(nodes, p);
                    }
                    x = self.root;
                }
            } else {
                let mut xp = Some(xp0);
                let mut sib = nodes[xp0].tree.left;
                if is_red(nodes, sib) {
                    set_black(nodes, sib);
                    nodes[xp0].tree.red = true;
                    self.rotate_right(nodes, xp0);
                    xp = nodes[xk].tree.parent;
                    sib = xp.and_then(|p| nodes[p].tree.left);
                }
                let Some(s) = sib else {
                    x = xp;
                    continue;
                };
                let sl = nodes[s].tree.left;
                let sr = nodes[s].tree.right;
                if !is_red(nodes, sl) && !is_red(nodes, sr) {
                    nodes[s].tree.red = true;
                    x = xp;
                } else {
                    let mut sib = Some(s);
                    if !is_red(nodes, sl) {
                        set_black(nodes, sr);
                        nodes[s].tree.red = true;
                        self.rotate_left(nodes, s);
                        xp = nodes[xk].tree.parent;
                        sib = xp.and_then(|p| nodes[p].tree.left);
                    }
                    if let Some(s) = sib {
                        nodes[s].tree.red = is_red(nodes, xp);
                        let sl = nodes[s].tree.left;
                        set_black(nodes, sl);
                    }
                    if let Some(p) = xp {
                        nodes[p].tree.red = false;
                        self.rotate_right(nodes, p);
                    }
                    x = self.root;
                }
            }
        }
    }

    /// Verifies red-black shape, parent links, hash ordering and the
    /// `first` list. Returns the number of nodes.
    pub(crate) fn check_invariants<K, V>(&self, nodes: &Arena<K, V>) -> Result<usize, String> {
        let Some(root) = self.root else {
            return match self.first {
                None => Ok(0),
                Some(_) => Err("empty tree with non-empty first list".into()),
            };
        };
        let root_node = nodes.get(root).ok_or("dangling root")?;
        if root_node.tree.parent.is_some() {
            return Err("root has a parent".into());
        }
        if root_node.tree.red {
            return Err("root is red".into());
        }

        let mut in_tree = hashbrown::HashSet::new();
        check_subtree(nodes, root, &mut in_tree)?;

        let mut count = 0;
        let mut prev = None;
        let mut cur = self.first;
        while let Some(k) = cur {
            let n = nodes.get(k).ok_or("dangling first-list node")?;
            if n.tree.prev != prev {
                return Err("first list prev link mismatch".into());
            }
            if !in_tree.contains(&k) {
                return Err("first list holds a node missing from the tree".into());
            }
            count += 1;
            if count > in_tree.len() {
                return Err("first list is cyclic".into());
            }
            prev = Some(k);
            cur = n.next;
        }
        if count != in_tree.len() {
            return Err(format!(
                "first list has {} nodes, tree has {}",
                count,
                in_tree.len()
            ));
        }
        Ok(count)
    }
}

/// Returns (black height, min hash, max hash) of the subtree at `k`.
fn check_subtree<K, V>(
    nodes: &Arena<K, V>,
    k: NodeKey,
    seen: &mut hashbrown::HashSet<NodeKey>,
) -> Result<(usize, u32, u32), String> {
    if !seen.insert(k) {
        return Err("tree links form a cycle".into());
    }
    let n = nodes.get(k).ok_or("dangling tree link")?;
    let mut min = n.hash;
    let mut max = n.hash;
    let mut heights = [1usize; 2];
    for (i, child) in [n.tree.left, n.tree.right].into_iter().enumerate() {
        let Some(c) = child else {
            continue;
        };
        let cn = nodes.get(c).ok_or("dangling child")?;
        if cn.tree.parent != Some(k) {
            return Err("child does not point back to parent".into());
        }
        if n.tree.red && cn.tree.red {
            return Err("red node with red child".into());
        }
        let (h, cmin, cmax) = check_subtree(nodes, c, seen)?;
        if i == 0 && cmax > n.hash {
            return Err("left subtree hash exceeds parent".into());
        }
        if i == 1 && cmin < n.hash {
            return Err("right subtree hash below parent".into());
        }
        min = min.min(cmin);
        max = max.max(cmax);
        heights[i] = h;
    }
    if heights[0] != heights[1] {
        return Err("unequal black height".into());
    }
    let own = if n.tree.red { 0 } else { 1 };
    Ok((heights[0] + own, min, max))
}
