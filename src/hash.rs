//! Hashing, bucket indexing and the key capability that decides whether a
//! bucket may become a tree bin.

use core::cmp::Ordering;
use core::hash::{BuildHasher, Hash};
use std::rc::Rc;
use std::sync::Arc;

/// Key capability consulted by tree bins.
///
/// `ORDERED` marks types with a total order consistent with `Eq`. Only
/// buckets of such keys are promoted to tree bins; other buckets stay
/// chains however long they get. `is_null` routes a key to the map's
/// dedicated null slot, bypassing hashing and comparison.
///
/// When a map is queried through `Q` with `K: Borrow<Q>`, `Q::tree_cmp`
/// must agree with `K::tree_cmp`, the same contract `Borrow` already
/// places on `Hash` and `Eq`.
pub trait TreeKey: Hash + Eq {
    const ORDERED: bool = false;

    /// Order between two keys whose hashes tie. Only consulted when
    /// `ORDERED` is true.
    #[inline]
    fn tree_cmp(&self, _other: &Self) -> Ordering {
        Ordering::Equal
    }

    #[inline]
    fn is_null(&self) -> bool {
        false
    }
}

macro_rules! ordered_tree_key {
    ($($t:ty),* $(,)?) => {$(
        impl TreeKey for $t {
            const ORDERED: bool = true;
            #[inline]
            fn tree_cmp(&self, other: &Self) -> Ordering {
                Ord::cmp(self, other)
            }
        }
    )*};
}

ordered_tree_key!(
    u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize, bool, char, str, String, (),
);

macro_rules! forward_tree_key {
    ($($ptr:ident),*) => {$(
        impl<T: ?Sized + TreeKey> TreeKey for $ptr<T> {
            const ORDERED: bool = T::ORDERED;
            #[inline]
            fn tree_cmp(&self, other: &Self) -> Ordering {
                (**self).tree_cmp(&**other)
            }
            #[inline]
            fn is_null(&self) -> bool {
                (**self).is_null()
            }
        }
    )*};
}

forward_tree_key!(Box, Rc, Arc);

impl<T: ?Sized + TreeKey> TreeKey for &T {
    const ORDERED: bool = T::ORDERED;
    #[inline]
    fn tree_cmp(&self, other: &Self) -> Ordering {
        (**self).tree_cmp(*other)
    }
    #[inline]
    fn is_null(&self) -> bool {
        (**self).is_null()
    }
}

/// `None` is the null key.
impl<T: TreeKey> TreeKey for Option<T> {
    const ORDERED: bool = T::ORDERED;
    fn tree_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Some(a), Some(b)) => a.tree_cmp(b),
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
        }
    }
    #[inline]
    fn is_null(&self) -> bool {
        self.is_none()
    }
}

/// Opts any `Ord` key into tree bins.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ordered<T>(pub T);

impl<T: Ord + Hash> TreeKey for Ordered<T> {
    const ORDERED: bool = true;
    #[inline]
    fn tree_cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

/// Keeps a key's buckets as chains, even for types that have an order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Unordered<T>(pub T);

impl<T: Hash + Eq> TreeKey for Unordered<T> {}

/// Folds high bits into low bits so hashes differing only above the
/// table mask still land in different buckets.
#[inline]
pub fn spread(mut h: u32) -> u32 {
    h ^= (h >> 20) ^ (h >> 12);
    h ^ (h >> 7) ^ (h >> 4)
}

/// Bucket index of `hash` in a table of `len` slots (a power of two).
#[inline]
pub fn index_for(hash: u32, len: usize) -> usize {
    debug_assert!(len.is_power_of_two());
    (hash as usize) & (len - 1)
}

#[inline]
fn fold(h: u64) -> u32 {
    (h ^ (h >> 32)) as u32
}

/// Build-hasher plus the per-instance seed.
#[derive(Clone, Debug)]
pub(crate) struct Hashing<S> {
    build: S,
    seed: u32,
}

impl<S> Hashing<S> {
    pub(crate) fn new(build: S, seed: u32) -> Self {
        Self { build, seed }
    }

    pub(crate) fn build_hasher(&self) -> &S {
        &self.build
    }
}

impl<S: BuildHasher> Hashing<S> {
    #[inline]
    pub(crate) fn hash<Q: ?Sized + Hash>(&self, q: &Q) -> u32 {
        spread(self.seed ^ fold(self.build.hash_one(q)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Invariant: small hashes pass through the spreader unchanged.
    #[test]
    fn spread_keeps_small_values() {
        for h in 0..16u32 {
            assert_eq!(spread(h), h);
        }
    }

    /// Invariant: hashes that differ only above the mask still disperse.
    #[test]
    fn spread_disperses_high_bits() {
        assert_eq!(index_for(0x10000, 16), index_for(0x20000, 16));
        assert_ne!(
            index_for(spread(0x10000), 16),
            index_for(spread(0x20000), 16)
        );
    }

    /// Invariant: `index_for` masks with `len - 1`.
    #[test]
    fn index_masks() {
        assert_eq!(index_for(0xFFFF_FFFF, 32), 31);
        assert_eq!(index_for(33, 32), 1);
        assert_eq!(index_for(7, 1), 0);
    }

    /// Invariant: `None` is the only null key and sorts first.
    #[test]
    fn option_is_null_key() {
        assert!(None::<i32>.is_null());
        assert!(!Some(3i32).is_null());
        assert_eq!(None::<i32>.tree_cmp(&Some(1)), Ordering::Less);
        assert_eq!(Some(2i32).tree_cmp(&Some(1)), Ordering::Greater);
        assert!(<Option<i32> as TreeKey>::ORDERED);
    }

    /// Invariant: borrowed and owned string forms order identically.
    #[test]
    fn string_and_str_agree() {
        let a = String::from("apple");
        let b = String::from("banana");
        assert_eq!(a.tree_cmp(&b), a.as_str().tree_cmp(b.as_str()));
        assert_eq!(Box::new(5u8).tree_cmp(&Box::new(5u8)), Ordering::Equal);
    }

    /// Invariant: wrappers toggle tree eligibility.
    #[test]
    fn wrappers() {
        assert!(<Ordered<Vec<u8>> as TreeKey>::ORDERED);
        assert!(!<Unordered<u32> as TreeKey>::ORDERED);
        assert_eq!(
            Ordered(vec![1u8]).tree_cmp(&Ordered(vec![2u8])),
            Ordering::Less
        );
        assert_eq!(Unordered(1i32).tree_cmp(&Unordered(2)), Ordering::Equal);
    }

    /// Invariant: a seeded hasher differs from an unseeded one for the same key.
    #[test]
    fn seed_changes_hash() {
        let s = hashbrown::hash_map::DefaultHashBuilder::default();
        let plain = Hashing::new(s.clone(), 0);
        let seeded = Hashing::new(s, 0x9E37_79B9);
        assert_eq!(plain.hash(&42u64), plain.hash(&42u64));
        assert_ne!(plain.hash(&42u64), seeded.hash(&42u64));
    }
}
