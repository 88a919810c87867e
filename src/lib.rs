//! # rankflow
//!
//! A **dataflow framework for rank-parallel batch jobs**. Every rank of a
//! fixed-size group builds the same pipeline graph; a deterministic scheduler
//! decides which ranks run each stage, and bridges move rows between ranks
//! by key, round robin, broadcast, or gather.
//!
//! ## Key Features
//!
//! - **Declarative pipeline API** - chain stages on a [`Flow<T>`] handle
//! - **Keyed folds and group reductions** - [`reduce`](Flow::reduce) and
//!   [`reduce_all`](Flow::reduce_all), with whole, bunched, or sliding windows
//! - **Zips** - pair two flows by key or by position
//! - **Rank allocation** - counts, ratios, or explicit rank lists, balanced by
//!   load across repeated runs
//! - **Pluggable transport** - anything implementing [`Communicator`]; ships
//!   with a one-rank [`Solo`] and an in-process [`LocalCluster`]
//!
//! ## Quick Start
//!
//! ```no_run
//! use rankflow::*;
//! # use anyhow::Result;
//!
//! # fn main() -> Result<()> {
//! init_logging(LogMode::ERROR | LogMode::WARNING);
//!
//! let per_rank = LocalCluster::new(4).launch(|comm| {
//!     let p = Pipeline::default();
//!     let lines = rise(&p, FromMem::new(vec![
//!         "hello world".to_string(),
//!         "hello rust".to_string(),
//!     ]).split());
//!
//!     let counts = lines
//!         .flat_map(|l: &String| l.split_whitespace().map(String::from).collect::<Vec<_>>())
//!         .reduce(
//!             |w: &String| w.clone(),
//!             0u64,
//!             |n: u64, _: &String, _: &String| n + 1,
//!             Keyed::default(),
//!         );
//!
//!     let mut ctx = Context::new(comm);
//!     counts.run_result(&mut ctx, ProcReq::inherit())
//! })?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Core Concepts
//!
//! ### Pipeline and units
//!
//! A [`Pipeline`] owns a graph of [`Unit`]s. Roots produce rows, links
//! transform them on the ranks of their input, tasks get ranks of their own,
//! and sinks consume rows. Building the graph does nothing; running it does.
//!
//! ### Runs
//!
//! [`Flow::run`] and [`Flow::run_result`] execute the component containing the
//! flow on every rank of the [`Context`]. Scheduler load carries over from run
//! to run, so iterative jobs spread their stages across the group.
//!
//! ### Failure
//!
//! A failing rank aborts the whole group: error values with
//! [`EXIT_KNOWN`], panics with [`EXIT_UNKNOWN`]. Every other rank sees
//! [`RunError::Aborted`].
//!
//! ## Module Overview
//!
//! - [`flow`] - typed builder API
//! - [`pipeline`] - the graph arena
//! - [`units`] - roots, links, bridges, reductions, zips and sinks
//! - [`scheduler`] / [`proc_req`] / [`par`] - rank allocation
//! - [`runner`] - per-rank execution
//! - [`comm`] - transport
//! - [`reducers`] - ready-made folds
//! - [`testing`] - assertions and harnesses for tests

pub mod comm;
pub mod config;
pub mod error;
pub mod flow;
pub mod hashing;
pub mod logging;
pub mod metrics;
pub mod par;
pub mod pipeline;
pub mod proc_req;
pub mod reducers;
pub mod runner;
pub mod scheduler;
pub mod testing;
pub mod type_token;
pub mod unit;
pub mod unit_id;
pub mod units;

pub use comm::{Communicator, LocalCluster, Packet, Solo};
pub use config::RunConfig;
pub use error::{EXIT_KNOWN, EXIT_UNKNOWN, RunError};
pub use flow::{Flow, Keyed, Row, rise, rise_on};
pub use hashing::{DefaultKeyHasher, HashFn, KeyHasher};
pub use logging::{LogMode, init_logging};
pub use metrics::{RunMetrics, UnitStats};
pub use par::Par;
pub use pipeline::Pipeline;
pub use proc_req::{LlMode, ProcCount, ProcReq};
pub use runner::Context;
pub use scheduler::Scheduler;
pub use type_token::{Partition, TypeTag};
pub use unit::{Unit, UnitCtx, UnitKind};
pub use unit_id::UnitId;
pub use units::reduce_all::Window;
pub use units::rise::{FromFileNames, FromMem, Generator, Kick, from_batches, from_fn};
