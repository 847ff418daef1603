//! hybrid-hashmap: a hash map whose collision chains escalate into
//! red-black tree bins, with fail-fast cursors and splittable traversal.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: keep lookups bounded when many keys share a bucket, without
//!   paying for trees in the common case.
//! - Layers:
//!   - `hash`: per-instance seed, bit spreading and bucket indexing, plus
//!     the `TreeKey` capability deciding whether a bucket may become a tree.
//!   - `chain` / `tree_bin`: the two bucket representations. Both link
//!     nodes by arena key; a tree bin additionally threads a `first` list
//!     through its nodes so traversal never walks the tree shape.
//!   - `RawTable<K, V>`: slot vector, node arena, null slot, threshold and
//!     modification counter. Owns promotion and the resize split.
//!   - `HybridHashMap<K, V, S>`: public API; hashes keys and dispatches to
//!     `RawTable` with a single traversal per operation.
//!   - `Cursor`, `Splitter`, views: traversal surfaces layered on top.
//!
//! Constraints
//! - Every node lives in one `slotmap` arena; buckets and tree links hold
//!   generational keys, never references. No unsafe code.
//! - A node's hash is computed once at insertion and cached. Resize and
//!   clone never rehash.
//! - Capacity is a power of two between 1 and `MAXIMUM_CAPACITY`; the
//!   threshold is `capacity * load_factor`.
//! - A bucket becomes a tree bin when an insert brings its chain to
//!   `TREE_THRESHOLD` entries and `K::ORDERED` holds. Tree bins only turn
//!   back into chains when a resize split leaves a half below the
//!   threshold; deletions never demote.
//! - The null key (`None` of an `Option<T>` key) lives in its own slot
//!   with hash 0 and never takes part in resizing.
//!
//! Modification tracking
//! - Every insertion of a new key and every removal bumps `mod_count`.
//!   Value replacement does not.
//! - Borrowing iterators cannot observe modification; the borrow checker
//!   already forbids it. `Cursor` holds no borrow, so it captures the map
//!   id and `mod_count` and checks both on each call. Removal through the
//!   cursor resynchronizes it.
//!
//! Notes and non-goals
//! - Not safe for concurrent mutation. `&HybridHashMap` is `Sync` when
//!   `K` and `V` are, which is what parallel traversal relies on.
//! - Iteration order is unspecified and changes across resizes.
//! - The seed defaults to zero; set `MapConfig::random_seed` or the
//!   `HYBRID_HASHMAP_RANDOM_SEED` environment variable to draw one per map.

mod chain;
pub mod config;
mod cursor;
pub mod error;
pub mod hash;
mod hybrid_hash_map;
mod hybrid_hash_map_proptest;
pub mod iter;
mod node;
mod raw_table;
pub mod splitter;
mod tree_bin;
pub mod views;

// Public surface
pub use config::{
    MapConfig, DEFAULT_INITIAL_CAPACITY, DEFAULT_LOAD_FACTOR, MAXIMUM_CAPACITY, TREE_THRESHOLD,
};
pub use cursor::Cursor;
pub use error::{MapError, Result};
pub use hash::{index_for, spread, Ordered, TreeKey, Unordered};
pub use hybrid_hash_map::HybridHashMap;
pub use raw_table::BinStats;
pub use splitter::Splitter;
pub use views::{EntrySet, KeySet, ValuesView};
