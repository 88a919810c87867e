//! Testing utilities for rankflow pipelines.
//!
//! - **Assertions**: compare run outputs with expected results, in or out of
//!   order, and check that keyed outputs are partitioned across ranks.
//! - **Unit harness**: drive one unit by hand and inspect its state.
//! - **Cluster runs**: [`run_on_ranks`] builds and runs the same job on `n`
//!   in-process ranks and returns each rank's rows.
//!
//! # Quick Start
//!
//! ```no_run
//! use rankflow::*;
//! use rankflow::testing::*;
//!
//! #[test]
//! fn doubles() -> anyhow::Result<()> {
//!     let per_rank = run_on_ranks(2, |p| {
//!         rise(p, FromMem::new(vec![1u32, 2, 3]).split()).map(|x: &u32| x * 2)
//!     })?;
//!     let all: Vec<u32> = per_rank.into_iter().flatten().collect();
//!     assert_collections_unordered_equal(&all, &[2, 4, 6]);
//!     Ok(())
//! }
//! ```

pub mod assertions;
pub mod harness;

pub use assertions::*;
pub use harness::*;

use crate::comm::LocalCluster;
use crate::flow::{Flow, Row};
use crate::pipeline::Pipeline;
use crate::proc_req::ProcReq;
use crate::runner::Context;
use anyhow::Result;

/// `v`, sorted. Handy for comparing per-rank outputs whose order depends on routing.
pub fn sorted<T: Ord>(mut v: Vec<T>) -> Vec<T> {
    v.sort();
    v
}

/// Build a job with `build` on each of `n` ranks, run it once over all
/// ranks, and return the rows each rank ends up with, in rank order.
///
/// # Errors
///
/// If any rank fails; see [`LocalCluster::launch`].
pub fn run_on_ranks<T, B>(n: usize, build: B) -> Result<Vec<Vec<T>>>
where
    T: Row,
    B: Fn(&Pipeline) -> Flow<T> + Send + Sync,
{
    LocalCluster::new(n).launch(|comm| {
        let p = Pipeline::default();
        let out = build(&p);
        let mut ctx = Context::new(comm);
        out.run_result(&mut ctx, ProcReq::inherit())
    })
}
