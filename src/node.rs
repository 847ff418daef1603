//! Entry storage: every key/value pair lives in one slotmap arena and
//! buckets refer to it through generational keys.

use crate::tree_bin::TreeBin;
use slotmap::SlotMap;

slotmap::new_key_type! {
    /// Stable reference to a node in the arena. Survives resizes,
    /// promotions and splits; invalidated only by removal.
    pub(crate) struct NodeKey;
}

pub(crate) type Arena<K, V> = SlotMap<NodeKey, Node<K, V>>;

/// Red-black links. Unused (all `None`, black) while the node sits in a chain.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct TreeLinks {
    pub(crate) parent: Option<NodeKey>,
    pub(crate) left: Option<NodeKey>,
    pub(crate) right: Option<NodeKey>,
    /// Predecessor on the tree bin's `first` list.
    pub(crate) prev: Option<NodeKey>,
    pub(crate) red: bool,
}

#[derive(Debug)]
pub(crate) struct Node<K, V> {
    pub(crate) key: K,
    pub(crate) value: V,
    pub(crate) hash: u32,
    /// Chain successor, or successor on a tree bin's `first` list.
    pub(crate) next: Option<NodeKey>,
    pub(crate) tree: TreeLinks,
}

impl<K, V> Node<K, V> {
    pub(crate) fn new(key: K, value: V, hash: u32) -> Self {
        Self {
            key,
            value,
            hash,
            next: None,
            tree: TreeLinks::default(),
        }
    }
}

/// One slot of the table.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) enum Bucket {
    #[default]
    Empty,
    Chain(NodeKey),
    Tree(TreeBin),
}

impl Bucket {
    /// First node in traversal order: chain head or head of the `first` list.
    #[inline]
    pub(crate) fn first(&self) -> Option<NodeKey> {
        match self {
            Bucket::Empty => None,
            Bucket::Chain(head) => Some(*head),
            Bucket::Tree(bin) => bin.first,
        }
    }
}
