//! Key hashing for partitioned exchanges.
//!
//! Every rank must send a given key to the same destination, so the hash
//! must be identical across ranks and runs. [`DefaultKeyHasher`] uses
//! `std`'s `DefaultHasher` built with fixed keys (never the randomly seeded
//! `RandomState`), which satisfies that within one build of the program.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Maps a key to a 64-bit hash used to pick a destination rank.
pub trait KeyHasher<K: ?Sized>: Send + Sync + 'static {
    fn hash_key(&self, key: &K) -> u64;
}

/// Deterministic hasher for any `K: Hash`.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultKeyHasher;

impl<K: Hash + ?Sized> KeyHasher<K> for DefaultKeyHasher {
    fn hash_key(&self, key: &K) -> u64 {
        let mut h = DefaultHasher::new();
        key.hash(&mut h);
        h.finish()
    }
}

/// A user-supplied hash function.
///
/// ```
/// use rankflow::hashing::{HashFn, KeyHasher};
/// let h = HashFn(|k: &u32| *k as u64);
/// assert_eq!(h.hash_key(&7), 7);
/// ```
#[derive(Clone, Copy, Debug)]
pub struct HashFn<F>(pub F);

impl<K: ?Sized, F> KeyHasher<K> for HashFn<F>
where
    F: Fn(&K) -> u64 + Send + Sync + 'static,
{
    fn hash_key(&self, key: &K) -> u64 {
        (self.0)(key)
    }
}

impl<K: ?Sized + 'static> KeyHasher<K> for Arc<dyn KeyHasher<K>> {
    fn hash_key(&self, key: &K) -> u64 {
        (**self).hash_key(key)
    }
}

/// Destination position for `hash` among `n` ranks.
#[inline]
pub fn partition_of(hash: u64, n: usize) -> usize {
    debug_assert!(n > 0, "partition_of over zero ranks");
    (hash % n.max(1) as u64) as usize
}
