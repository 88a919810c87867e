//! Lightweight unique identifier for units within a [`Pipeline`](crate::pipeline::Pipeline).
//!
//! Each [`Unit`](crate::unit::Unit) inserted into the pipeline arena is assigned
//! a sequential `UnitId`. Edges and the scheduler refer to units only through
//! these ids; the arena is the single owner of the units themselves.
//!
//! They're small, `Copy`, ordered and hashable, so they can be used as map keys
//! and sorted to give deterministic traversal order on every rank.

use std::fmt::{Display, Formatter, Result as FormatResult};

/// Unique numeric identifier for a unit in a pipeline graph.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct UnitId(u64);

impl UnitId {
    /// Create a new `UnitId` (used internally by the pipeline).
    pub(crate) fn new(v: u64) -> Self {
        Self(v)
    }

    /// Return the underlying numeric value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Display for UnitId {
    fn fmt(&self, f: &mut Formatter<'_>) -> FormatResult {
        write!(f, "#{}", self.0)
    }
}
