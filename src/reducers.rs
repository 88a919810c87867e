//! Ready-made fold functions for [`Flow::reduce`](crate::flow::Flow::reduce)
//! and group functions for [`Flow::reduce_all`](crate::flow::Flow::reduce_all).
//!
//! Folds take `(acc, key, row)` and return the new accumulator:
//! - [`count`]: number of rows (start from `0`)
//! - [`sum_by`]: sum of a projection (start from the additive zero)
//! - [`min_by`] / [`max_by`]: extreme of a projection (start from `None`)
//!
//! Group functions take `(key, rows)`:
//! - [`group_len`]: number of rows in the group
//! - [`group_sum_by`]: sum of a projection over the group

use std::ops::Add;

/* ===================== folds ===================== */

pub fn count<A, K, I>() -> impl Fn(A, &K, &I) -> A + Send + Sync + 'static
where
    A: Add<Output = A> + From<u8> + 'static,
    K: 'static,
    I: 'static,
{
    |acc: A, _: &K, _: &I| acc + A::from(1u8)
}

pub fn sum_by<V, K, I, F>(f: F) -> impl Fn(V, &K, &I) -> V + Send + Sync + 'static
where
    V: Add<Output = V> + 'static,
    K: 'static,
    I: 'static,
    F: Fn(&I) -> V + Send + Sync + 'static,
{
    move |acc: V, _: &K, row: &I| acc + f(row)
}

pub fn min_by<V, K, I, F>(f: F) -> impl Fn(Option<V>, &K, &I) -> Option<V> + Send + Sync + 'static
where
    V: Ord + 'static,
    K: 'static,
    I: 'static,
    F: Fn(&I) -> V + Send + Sync + 'static,
{
    move |acc: Option<V>, _: &K, row: &I| {
        let v = f(row);
        Some(match acc {
            Some(cur) if cur <= v => cur,
            _ => v,
        })
    }
}

pub fn max_by<V, K, I, F>(f: F) -> impl Fn(Option<V>, &K, &I) -> Option<V> + Send + Sync + 'static
where
    V: Ord + 'static,
    K: 'static,
    I: 'static,
    F: Fn(&I) -> V + Send + Sync + 'static,
{
    move |acc: Option<V>, _: &K, row: &I| {
        let v = f(row);
        Some(match acc {
            Some(cur) if cur >= v => cur,
            _ => v,
        })
    }
}

/* ===================== group functions ===================== */

pub fn group_len<K: 'static, I: 'static>() -> impl Fn(&K, &[I]) -> usize + Send + Sync + 'static {
    |_: &K, rows: &[I]| rows.len()
}

pub fn group_sum_by<V, K, I, F>(f: F) -> impl Fn(&K, &[I]) -> V + Send + Sync + 'static
where
    V: Add<Output = V> + Default + 'static,
    K: 'static,
    I: 'static,
    F: Fn(&I) -> V + Send + Sync + 'static,
{
    move |_: &K, rows: &[I]| rows.iter().fold(V::default(), |acc, r| acc + f(r))
}
