//! Concrete unit kinds.
//!
//! - [`rise`]: roots and the [`Generator`](rise::Generator) sources behind them.
//! - [`stateless`]: per-row links (map, filter, flat-map, pass-through).
//! - [`bridge`]: the rank-to-rank exchange and the unit that wraps it.
//! - [`reduce`], [`reduce_all`]: keyed folds and whole-group reductions.
//! - [`zip`]: two-input pairing, by key or by position.
//! - [`sink`]: dump to stdout or file, and in-memory collection.

pub mod bridge;
pub mod reduce;
pub mod reduce_all;
pub mod rise;
pub mod sink;
pub mod stateless;
pub mod zip;

use std::sync::Arc;

/// Extracts the grouping key of a row.
pub type KeyFn<I, K> = Arc<dyn Fn(&I) -> K + Send + Sync>;
