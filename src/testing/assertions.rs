//! Assertion functions for comparing run outputs.
//!
//! Rows coming out of a keyed stage arrive in hash-map order, and rows of a
//! multi-rank job are spread over ranks, so most comparisons here ignore order.

use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::hash::Hash;

/// Assert that two collections are equal in order and content.
///
/// # Panics
///
/// Panics if the collections differ in length or content.
///
/// # Example
///
/// ```
/// use rankflow::testing::assert_collections_equal;
///
/// assert_collections_equal(&[1, 3, 3, 1], &[1, 3, 3, 1]);
/// ```
pub fn assert_collections_equal<T: Debug + PartialEq>(actual: &[T], expected: &[T]) {
    assert_eq!(
        actual.len(),
        expected.len(),
        "Collection length mismatch:\n  Expected length: {}\n  Actual length: {}\n  Expected: {expected:?}\n  Actual: {actual:?}",
        expected.len(),
        actual.len()
    );

    for (i, (a, e)) in actual.iter().zip(expected.iter()).enumerate() {
        assert_eq!(
            a, e,
            "Collection mismatch at index {i}:\n  Expected: {e:?}\n  Actual: {a:?}\n  Full expected: {expected:?}\n  Full actual: {actual:?}"
        );
    }
}

/// Assert that two collections hold the same elements with the same
/// multiplicities, ignoring order.
///
/// # Panics
///
/// Panics if the collections differ in content.
///
/// # Example
///
/// ```
/// use rankflow::testing::assert_collections_unordered_equal;
///
/// assert_collections_unordered_equal(&["b", "a", "a"], &["a", "a", "b"]);
/// ```
pub fn assert_collections_unordered_equal<T: Debug + Eq + Hash>(actual: &[T], expected: &[T]) {
    assert_eq!(
        actual.len(),
        expected.len(),
        "Collection length mismatch:\n  Expected length: {}\n  Actual length: {}\n  Expected: {expected:?}\n  Actual: {actual:?}",
        expected.len(),
        actual.len()
    );

    let mut counts: HashMap<&T, i64> = HashMap::new();
    for e in expected {
        *counts.entry(e).or_default() += 1;
    }
    for a in actual {
        *counts.entry(a).or_default() -= 1;
    }
    let missing: Vec<_> = counts.iter().filter(|(_, n)| **n > 0).map(|(t, _)| *t).collect();
    let extra: Vec<_> = counts.iter().filter(|(_, n)| **n < 0).map(|(t, _)| *t).collect();
    assert!(
        missing.is_empty() && extra.is_empty(),
        "Collection content mismatch:\n  Missing elements: {missing:?}\n  Extra elements: {extra:?}\n  Expected: {expected:?}\n  Actual: {actual:?}"
    );
}

/// Assert that two collections of key-value pairs are equal after sorting by key.
///
/// # Panics
///
/// Panics if the collections differ after sorting by key.
///
/// # Example
///
/// ```
/// use rankflow::testing::assert_kv_collections_equal;
///
/// assert_kv_collections_equal(vec![("b", 1), ("a", 2)], vec![("a", 2), ("b", 1)]);
/// ```
pub fn assert_kv_collections_equal<K, V>(mut actual: Vec<(K, V)>, mut expected: Vec<(K, V)>)
where
    K: Debug + Ord,
    V: Debug + PartialEq,
{
    actual.sort_by(|a, b| a.0.cmp(&b.0));
    expected.sort_by(|a, b| a.0.cmp(&b.0));

    assert_eq!(
        actual.len(),
        expected.len(),
        "Collection length mismatch:\n  Expected length: {}\n  Actual length: {}\n  Expected: {expected:?}\n  Actual: {actual:?}",
        expected.len(),
        actual.len()
    );

    for (i, ((ak, av), (ek, ev))) in actual.iter().zip(expected.iter()).enumerate() {
        assert!(
            ak == ek && av == ev,
            "Collection mismatch at index {i} after sorting:\n  Expected: ({ek:?}, {ev:?})\n  Actual: ({ak:?}, {av:?})\n  Full expected: {expected:?}\n  Full actual: {actual:?}"
        );
    }
}

/// Assert that no key shows up in the output of more than one rank.
///
/// `per_rank[r]` holds the keys rank `r` produced.
///
/// # Panics
///
/// Panics naming the first key found on two ranks.
///
/// # Example
///
/// ```
/// use rankflow::testing::assert_keys_partitioned;
///
/// assert_keys_partitioned(&[vec!["a", "c"], vec!["b"]]);
/// ```
pub fn assert_keys_partitioned<K: Debug + Eq + Hash>(per_rank: &[Vec<K>]) {
    let mut owner: HashMap<&K, usize> = HashMap::new();
    for (rank, keys) in per_rank.iter().enumerate() {
        let mine: HashSet<&K> = keys.iter().collect();
        for k in mine {
            if let Some(prev) = owner.insert(k, rank) {
                panic!("Key {k:?} produced on rank {prev} and rank {rank}:\n  Per rank: {per_rank:?}");
            }
        }
    }
}

/// Assert that every element satisfies a predicate.
///
/// # Panics
///
/// Panics if any element does not satisfy the predicate.
///
/// # Example
///
/// ```
/// use rankflow::testing::assert_all;
///
/// assert_all(&[2, 4, 6, 8], |x| x % 2 == 0);
/// ```
pub fn assert_all<T: Debug>(collection: &[T], predicate: impl Fn(&T) -> bool) {
    for (i, item) in collection.iter().enumerate() {
        assert!(
            predicate(item),
            "Predicate failed for element at index {i}:\n  Element: {item:?}\n  Collection: {collection:?}"
        );
    }
}
