//! Error type shared by construction, the fail-fast cursor and the views.

use thiserror::Error;

/// Errors reported by `HybridHashMap` and its cursors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MapError {
    /// Load factor was zero, negative or NaN
    #[error("illegal load factor: {0}")]
    IllegalLoadFactor(f32),

    /// The map was structurally modified behind a cursor's back
    #[error("concurrent modification: expected mod count {expected}, found {actual}")]
    ConcurrentModification {
        /// Counter captured by the cursor
        expected: u64,
        /// Counter currently held by the map
        actual: u64,
    },

    /// `remove`/`value_mut` called with no entry returned by `next`
    #[error("cursor has no current entry")]
    NoCurrentEntry,

    /// A cursor was handed a map other than the one that created it
    #[error("cursor used with a different map")]
    WrongMap,
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, MapError>;
