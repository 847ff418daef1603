//! RawTable: slot vector, node arena and the bookkeeping behind the map.
//!
//! This layer knows nothing about hashers; callers pass in the spread
//! hash of every key. It owns promotion (chain to tree bin on insert),
//! resize (doubling with lo/hi splitting of every bucket) and the
//! structural modification counter.

use crate::chain::{self, Scan};
use crate::config::{MAXIMUM_CAPACITY, TREE_THRESHOLD};
use crate::hash::{index_for, TreeKey};
use crate::node::{Arena, Bucket, Node, NodeKey, TreeLinks};
use crate::tree_bin::{Probe, TreeBin};
use core::borrow::Borrow;

/// Where `locate` found a key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Found {
    Null(NodeKey),
    Chain {
        node: NodeKey,
        index: usize,
        prev: Option<NodeKey>,
    },
    Tree {
        node: NodeKey,
        index: usize,
    },
}

impl Found {
    #[inline]
    pub(crate) fn node(&self) -> NodeKey {
        match *self {
            Found::Null(node) | Found::Chain { node, .. } | Found::Tree { node, .. } => node,
        }
    }
}

/// Insertion point inside a bucket.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Gap {
    Chain {
        index: usize,
        len: usize,
    },
    Tree {
        index: usize,
        parent: Option<NodeKey>,
        left: bool,
    },
}

/// Where `locate` would put a missing key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Vacant {
    Null,
    Bin { hash: u32, gap: Gap },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Located {
    Found(Found),
    Vacant(Vacant),
}

/// Shape of the table, for diagnostics and tests.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BinStats {
    pub capacity: usize,
    pub empty: usize,
    pub chains: usize,
    pub trees: usize,
    /// Entries in the longest chain bucket.
    pub longest_chain: usize,
    /// Entries in the largest tree bin.
    pub largest_tree: usize,
    pub has_null_key: bool,
}

fn round_up_to_power_of_two(n: usize) -> usize {
    if n >= MAXIMUM_CAPACITY {
        MAXIMUM_CAPACITY
    } else if n > 1 {
        n.next_power_of_two()
    } else {
        1
    }
}

fn threshold_for(capacity: usize, load_factor: f32) -> usize {
    let t = capacity as f64 * load_factor as f64;
    if t >= (MAXIMUM_CAPACITY + 1) as f64 {
        MAXIMUM_CAPACITY + 1
    } else {
        t as usize
    }
}

/// Splits a chain by `bit` into the buckets for `i` and `i + bit`,
/// keeping relative order within each half.
fn split_chain<K, V>(nodes: &mut Arena<K, V>, head: NodeKey, bit: u32) -> (Bucket, Bucket) {
    let (mut lo_head, mut lo_tail) = (None, None);
    let (mut hi_head, mut hi_tail) = (None, None);
    let mut cur = Some(head);
    while let Some(k) = cur {
        cur = nodes[k].next.take();
        let (head, tail): (&mut Option<NodeKey>, &mut Option<NodeKey>) =
            if nodes[k].hash & bit == 0 {
                (&mut lo_head, &mut lo_tail)
            } else {
                (&mut hi_head, &mut hi_tail)
            };
        match *tail {
            Some(t) => nodes[t].next = Some(k),
            None => *head = Some(k),
        }
        *tail = Some(k);
    }
    (
        lo_head.map_or(Bucket::Empty, Bucket::Chain),
        hi_head.map_or(Bucket::Empty, Bucket::Chain),
    )
}

pub(crate) struct RawTable<K, V> {
    slots: Vec<Bucket>,
    pub(crate) nodes: Arena<K, V>,
    null_entry: Option<NodeKey>,
    /// Holds the requested initial capacity until the slots are allocated.
    threshold: usize,
    load_factor: f32,
    mod_count: u64,
}

impl<K, V> RawTable<K, V> {
    pub(crate) fn new(initial_capacity: usize, load_factor: f32) -> Self {
        Self {
            slots: Vec::new(),
            nodes: Arena::with_key(),
            null_entry: None,
            threshold: initial_capacity,
            load_factor,
            mod_count: 0,
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Allocated slot count, or the capacity the first insert will allocate.
    pub(crate) fn capacity(&self) -> usize {
        if self.slots.is_empty() {
            round_up_to_power_of_two(self.threshold)
        } else {
            self.slots.len()
        }
    }

    #[inline]
    pub(crate) fn slot_count(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub(crate) fn bucket(&self, index: usize) -> Bucket {
        self.slots[index]
    }

    #[inline]
    pub(crate) fn null_entry(&self) -> Option<NodeKey> {
        self.null_entry
    }

    pub(crate) fn threshold(&self) -> usize {
        self.threshold
    }

    pub(crate) fn load_factor(&self) -> f32 {
        self.load_factor
    }

    #[inline]
    pub(crate) fn mod_count(&self) -> u64 {
        self.mod_count
    }

    #[inline]
    fn bump(&mut self) {
        self.mod_count = self.mod_count.wrapping_add(1);
    }

    fn inflate(&mut self, to_size: usize) {
        let capacity = round_up_to_power_of_two(to_size);
        self.threshold = threshold_for(capacity, self.load_factor);
        self.slots = vec![Bucket::Empty; capacity];
        log::debug!(
            "allocated table: capacity {}, threshold {}",
            capacity,
            self.threshold
        );
    }

    /// Allocates the slots for a copy of a table holding `len` entries in
    /// `capacity` slots.
    pub(crate) fn presize_for_copy(&mut self, len: usize, capacity: usize) {
        let scale = (1.0 / self.load_factor as f64).min(4.0);
        let wanted = ((len as f64 * scale) as usize).min(MAXIMUM_CAPACITY);
        self.inflate(wanted.min(capacity));
    }

    pub(crate) fn clear(&mut self) {
        self.bump();
        self.nodes.clear();
        self.null_entry = None;
        self.slots.fill(Bucket::Empty);
    }

    /// Resolves a live node to its position, for removal by handle.
    pub(crate) fn found_for(&self, node: NodeKey) -> Option<Found> {
        if self.null_entry == Some(node) {
            return Some(Found::Null(node));
        }
        let n = self.nodes.get(node)?;
        if self.slots.is_empty() {
            return None;
        }
        let index = index_for(n.hash, self.slots.len());
        match self.slots[index] {
            Bucket::Empty => None,
            Bucket::Chain(head) => Some(Found::Chain {
                node,
                index,
                prev: chain::predecessor(&self.nodes, head, node),
            }),
            Bucket::Tree(_) => Some(Found::Tree { node, index }),
        }
    }

    /// Unlinks and frees the node at `found`.
    pub(crate) fn remove_found(&mut self, found: Found) -> Option<(K, V)> {
        match found {
            Found::Null(_) => self.null_entry = None,
            Found::Chain { node, index, prev } => {
                if let Bucket::Chain(head) = self.slots[index] {
                    self.slots[index] = match chain::unlink(&mut self.nodes, head, node, prev) {
                        Some(head) => Bucket::Chain(head),
                        None => Bucket::Empty,
                    };
                }
            }
            Found::Tree { node, index } => {
                if let Bucket::Tree(mut bin) = self.slots[index] {
                    bin.delete(&mut self.nodes, node);
                    self.slots[index] = if bin.is_empty() {
                        Bucket::Empty
                    } else {
                        Bucket::Tree(bin)
                    };
                }
            }
        }
        let node = self.nodes.remove(found.node())?;
        self.bump();
        Some((node.key, node.value))
    }

    /// First non-empty bucket at or after `index`, below `fence`.
    pub(crate) fn first_from(&self, index: usize, fence: usize) -> Option<(usize, NodeKey)> {
        let fence = fence.min(self.slots.len());
        (index..fence).find_map(|i| self.slots[i].first().map(|k| (i, k)))
    }

    pub(crate) fn bin_stats(&self) -> BinStats {
        let mut stats = BinStats {
            capacity: self.capacity(),
            has_null_key: self.null_entry.is_some(),
            ..BinStats::default()
        };
        for bucket in &self.slots {
            match bucket {
                Bucket::Empty => stats.empty += 1,
                Bucket::Chain(head) => {
                    stats.chains += 1;
                    stats.longest_chain = stats.longest_chain.max(chain::len(&self.nodes, *head));
                }
                Bucket::Tree(bin) => {
                    stats.trees += 1;
                    stats.largest_tree = stats.largest_tree.max(bin.len(&self.nodes));
                }
            }
        }
        stats
    }
}

impl<K: TreeKey, V> RawTable<K, V> {
    pub(crate) fn locate<Q>(&self, hash: u32, key: &Q) -> Located
    where
        K: Borrow<Q>,
        Q: ?Sized + TreeKey,
    {
        if key.is_null() {
            return match self.null_entry {
                Some(node) => Located::Found(Found::Null(node)),
                None => Located::Vacant(Vacant::Null),
            };
        }
        if self.slots.is_empty() {
            return Located::Vacant(Vacant::Bin {
                hash,
                gap: Gap::Chain { index: 0, len: 0 },
            });
        }
        let index = index_for(hash, self.slots.len());
        let gap = match self.slots[index] {
            Bucket::Empty => Gap::Chain { index, len: 0 },
            Bucket::Chain(head) => match chain::scan(&self.nodes, head, hash, key) {
                Scan::Found { node, prev } => {
                    return Located::Found(Found::Chain { node, index, prev })
                }
                Scan::Missing { len } => Gap::Chain { index, len },
            },
            Bucket::Tree(bin) => match bin.probe(&self.nodes, hash, key) {
                Probe::Found(node) => return Located::Found(Found::Tree { node, index }),
                Probe::Vacant { parent, left } => Gap::Tree {
                    index,
                    parent,
                    left,
                },
            },
        };
        Located::Vacant(Vacant::Bin { hash, gap })
    }

    pub(crate) fn find<Q>(&self, hash: u32, key: &Q) -> Option<NodeKey>
    where
        K: Borrow<Q>,
        Q: ?Sized + TreeKey,
    {
        match self.locate(hash, key) {
            Located::Found(found) => Some(found.node()),
            Located::Vacant(_) => None,
        }
    }

    /// Adds a new entry at a gap reported by `locate`. Doubles the table
    /// first when it is at its threshold.
    pub(crate) fn insert_vacant(&mut self, vacant: Vacant, key: K, value: V) -> NodeKey {
        let node = self.add(vacant, key, value, true);
        self.bump();
        node
    }

    /// Adds an entry without resizing or counting a modification. Used
    /// when filling a freshly presized copy.
    pub(crate) fn insert_for_copy(&mut self, hash: u32, key: K, value: V) {
        if let Located::Vacant(vacant) = self.locate(hash, &key) {
            self.add(vacant, key, value, false);
        }
    }

    fn add(&mut self, vacant: Vacant, key: K, value: V, may_grow: bool) -> NodeKey {
        let (hash, mut gap) = match vacant {
            Vacant::Null => {
                let node = self.nodes.insert(Node::new(key, value, 0));
                self.null_entry = Some(node);
                return node;
            }
            Vacant::Bin { hash, gap } => (hash, gap),
        };
        if self.slots.is_empty() {
            self.inflate(self.threshold);
            gap = self.regap(hash, &key);
        } else if may_grow && self.len() >= self.threshold {
            self.grow();
            gap = self.regap(hash, &key);
        }

        let node = self.nodes.insert(Node::new(key, value, hash));
        match gap {
            Gap::Chain { index, len } => {
                self.nodes[node].next = self.slots[index].first();
                self.slots[index] = Bucket::Chain(node);
                if K::ORDERED && len + 1 >= TREE_THRESHOLD {
                    log::trace!(
                        "promoting bucket {} ({} entries) to a tree bin",
                        index,
                        len + 1
                    );
                    self.slots[index] = Bucket::Tree(TreeBin::from_chain(&mut self.nodes, node));
                }
            }
            Gap::Tree {
                index,
                parent,
                left,
            } => {
                if let Bucket::Tree(bin) = &mut self.slots[index] {
                    bin.attach(&mut self.nodes, node, parent, left);
                }
            }
        }
        node
    }

    fn regap(&self, hash: u32, key: &K) -> Gap {
        match self.locate(hash, key) {
            Located::Vacant(Vacant::Bin { gap, .. }) => gap,
            _ => unreachable!("missing key became present during resize"),
        }
    }

    /// Pre-sizes for `incoming` entries: allocates enough slots when the
    /// table is still empty, then doubles once if `incoming` alone exceeds
    /// the threshold.
    pub(crate) fn reserve(&mut self, incoming: usize) {
        if incoming == 0 {
            return;
        }
        if self.slots.is_empty() {
            let wanted = (incoming as f64 / self.load_factor as f64).ceil() as usize;
            self.inflate(wanted.max(self.threshold));
        }
        if incoming > self.threshold && self.slots.len() < MAXIMUM_CAPACITY {
            self.grow();
        }
    }

    /// Doubles the table. Chains split in one pass by the new hash bit; tree
    /// bins split into two bins, each flattened when it ends up small.
    pub(crate) fn grow(&mut self) {
        let old_capacity = self.slots.len();
        if old_capacity >= MAXIMUM_CAPACITY {
            self.threshold = usize::MAX;
            log::debug!("table at maximum capacity {}; resizing disabled", old_capacity);
            return;
        }
        let new_capacity = old_capacity * 2;
        let bit = old_capacity as u32;
        let old = std::mem::replace(&mut self.slots, vec![Bucket::Empty; new_capacity]);
        for (i, bucket) in old.into_iter().enumerate() {
            let (lo, hi) = match bucket {
                Bucket::Empty => continue,
                Bucket::Chain(head) => split_chain(&mut self.nodes, head, bit),
                Bucket::Tree(bin) => bin.split(&mut self.nodes, bit),
            };
            self.slots[i] = lo;
            self.slots[i + old_capacity] = hi;
        }
        self.threshold = threshold_for(new_capacity, self.load_factor);
        log::debug!(
            "resized table {} -> {} ({} entries, threshold {})",
            old_capacity,
            new_capacity,
            self.len(),
            self.threshold
        );
    }

    /// Full structural check: bucket placement, chain/tree shape, null slot
    /// and size accounting.
    pub(crate) fn check_invariants(&self) -> Result<(), String> {
        let mut count = 0usize;
        if let Some(n) = self.null_entry {
            let node = self.nodes.get(n).ok_or("dangling null entry")?;
            if !node.key.is_null() {
                return Err("null slot holds a non-null key".into());
            }
            count += 1;
        }
        if !self.slots.is_empty() && !self.slots.len().is_power_of_two() {
            return Err(format!("capacity {} is not a power of two", self.slots.len()));
        }
        for (i, bucket) in self.slots.iter().enumerate() {
            let mut members = Vec::new();
            match bucket {
                Bucket::Empty => {}
                Bucket::Chain(head) => {
                    let mut cur = Some(*head);
                    while let Some(k) = cur {
                        let n = self.nodes.get(k).ok_or("dangling chain node")?;
                        if n.tree != TreeLinks::default() {
                            return Err(format!("chain node in bucket {} has tree links", i));
                        }
                        members.push(k);
                        if members.len() > self.nodes.len() {
                            return Err(format!("chain in bucket {} is cyclic", i));
                        }
                        cur = n.next;
                    }
                }
                Bucket::Tree(bin) => {
                    let n = bin.check_invariants(&self.nodes)?;
                    if n == 0 {
                        return Err(format!("empty tree bin left in bucket {}", i));
                    }
                    let mut cur = bin.first;
                    while let Some(k) = cur {
                        members.push(k);
                        cur = self.nodes[k].next;
                    }
                }
            }
            for k in &members {
                let n = &self.nodes[*k];
                if n.key.is_null() {
                    return Err(format!("null key stored in bucket {}", i));
                }
                if index_for(n.hash, self.slots.len()) != i {
                    return Err(format!("node with hash {:#x} misplaced in bucket {}", n.hash, i));
                }
            }
            count += members.len();
        }
        if count != self.nodes.len() {
            return Err(format!(
                "reachable entries {} != stored entries {}",
                count,
                self.nodes.len()
            ));
        }
        Ok(())
    }
}
