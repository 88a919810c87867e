//! Typed pipeline builder.
//!
//! A [`Flow<T>`] is a handle to one unit of a [`Pipeline`] whose rows have
//! type `T`. Builder methods add a unit downstream and return a handle to it;
//! the original handle stays usable, so a flow can fan out to any number of
//! consumers.
//!
//! ```no_run
//! use rankflow::*;
//!
//! # fn main() -> anyhow::Result<()> {
//! let p = Pipeline::default();
//! let words = rise(&p, FromMem::new(vec!["a".to_string(), "b".into(), "a".into()]).split());
//! let counts = words.reduce(
//!     |w: &String| w.clone(),
//!     0u64,
//!     |n: u64, _: &String, _: &String| n + 1,
//!     Keyed::default(),
//! );
//! let mut ctx = Context::solo();
//! let rows = counts.run_result(&mut ctx, ProcReq::inherit())?;
//! assert_eq!(rows.len(), 2);
//! # Ok(())
//! # }
//! ```
//!
//! Keyed stages (`reduce`, `reduce_all`) exchange rows by key hash before
//! reducing, so every key ends up on exactly one rank. `Keyed::inprocess`
//! skips the exchange and reduces what each rank already holds.

use crate::hashing::{DefaultKeyHasher, KeyHasher};
use crate::metrics::RunMetrics;
use crate::pipeline::Pipeline;
use crate::proc_req::ProcReq;
use crate::runner::Context;
use crate::unit::Unit;
use crate::unit_id::UnitId;
use crate::units::KeyFn;
use crate::units::bridge::{Bridge, Route};
use crate::units::reduce::Reduce;
use crate::units::reduce_all::{ReduceAll, Window};
use crate::units::rise::{Generator, Rise};
use crate::units::sink::{Collect, Dump};
use crate::units::stateless::{Filter, FlatMap, Map, Pass};
use crate::units::zip::{LEFT, RIGHT, Zip};
use anyhow::Result;
use serde::{Serialize, de::DeserializeOwned};
use std::hash::Hash;
use std::marker::PhantomData;
use std::mem;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// Anything that can travel between units and ranks.
pub trait Row: 'static + Send + Sync + Clone + Serialize + DeserializeOwned {}
impl<T> Row for T where T: 'static + Send + Sync + Clone + Serialize + DeserializeOwned {}

pub struct Flow<T> {
    pipeline: Pipeline,
    id: UnitId,
    _t: PhantomData<fn() -> T>,
}

impl<T> Clone for Flow<T> {
    fn clone(&self) -> Self {
        Self { pipeline: self.pipeline.clone(), id: self.id, _t: PhantomData }
    }
}

/// Start a flow from `generator` on every rank of the run.
pub fn rise<G: Generator>(p: &Pipeline, generator: G) -> Flow<G::Row> {
    rise_on(p, generator, ProcReq::inherit())
}

/// Start a flow from `generator` on the ranks picked by `req`.
pub fn rise_on<G: Generator>(p: &Pipeline, generator: G, req: impl Into<ProcReq>) -> Flow<G::Row> {
    let id = p.insert_unit(Box::new(Rise::new(generator, req.into())));
    Flow { pipeline: p.clone(), id, _t: PhantomData }
}

/// Options of a keyed stage.
pub struct Keyed<K> {
    prll: ProcReq,
    inprocess: bool,
    ordered: bool,
    hasher: Arc<dyn KeyHasher<K>>,
}

impl<K: Hash + 'static> Default for Keyed<K> {
    fn default() -> Self {
        Self {
            prll: ProcReq::inherit(),
            inprocess: false,
            ordered: false,
            hasher: Arc::new(DefaultKeyHasher),
        }
    }
}

impl<K: 'static> Keyed<K> {
    /// Ranks of the exchange feeding the stage.
    pub fn prll(mut self, req: impl Into<ProcReq>) -> Self {
        self.prll = req.into();
        self
    }

    /// Reduce locally, without exchanging rows first.
    pub fn inprocess(mut self) -> Self {
        self.inprocess = true;
        self
    }

    /// Treat the input as grouped by key and emit each key as soon as it is done.
    pub fn ordered(mut self) -> Self {
        self.ordered = true;
        self
    }

    pub fn hasher(mut self, hasher: impl KeyHasher<K>) -> Self {
        self.hasher = Arc::new(hasher);
        self
    }
}

impl<T: Row> Flow<T> {
    pub fn id(&self) -> UnitId {
        self.id
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    fn then<O>(&self, unit: Box<dyn Unit>) -> Flow<O> {
        let id = self.pipeline.insert_unit(unit);
        self.pipeline.connect(self.id, id, 0);
        Flow { pipeline: self.pipeline.clone(), id, _t: PhantomData }
    }

    pub fn map<O, F>(&self, f: F) -> Flow<O>
    where
        O: Row,
        F: 'static + Send + Sync + Fn(&T) -> O,
    {
        self.then(Box::new(Map::<T, O, F>::new(f)))
    }

    pub fn filter<F>(&self, pred: F) -> Flow<T>
    where
        F: 'static + Send + Sync + Fn(&T) -> bool,
    {
        self.then(Box::new(Filter::<T, F>::new(pred)))
    }

    pub fn flat_map<O, F>(&self, f: F) -> Flow<O>
    where
        O: Row,
        F: 'static + Send + Sync + Fn(&T) -> Vec<O>,
    {
        self.then(Box::new(FlatMap::<T, O, F>::new(f)))
    }

    /// # Panics
    /// If `other` was built on a different pipeline.
    fn assert_same_pipeline<R>(&self, other: &Flow<R>) {
        assert!(
            self.pipeline.same_as(&other.pipeline),
            "cannot wire unit {} into unit {}: flows belong to different pipelines",
            other.id,
            self.id
        );
    }

    /// Rows of both flows, as one.
    pub fn union(&self, other: &Flow<T>) -> Flow<T> {
        self.assert_same_pipeline(other);
        let merged: Flow<T> = self.then(Box::new(Pass::<T>::default()));
        self.pipeline.connect(other.id, merged.id, 0);
        merged
    }

    /// Move rows to the ranks picked by `req`, without a key.
    ///
    /// With `LlMode::ALL` every row goes to every rank, with `LlMode::SHARD`
    /// rows are dealt round robin; otherwise they all go to a single rank.
    pub fn prll(&self, req: impl Into<ProcReq>) -> Flow<T> {
        self.spread(req.into(), false)
    }

    /// Like [`Flow::prll`], but rows leave as soon as `ordered_batch_rows`
    /// have piled up for a destination, so each sender's order is kept.
    pub fn ordered_prll(&self, req: impl Into<ProcReq>) -> Flow<T> {
        self.spread(req.into(), true)
    }

    fn spread(&self, req: ProcReq, ordered: bool) -> Flow<T> {
        let (route, req) = if req.is_all() {
            (Route::Broadcast, req)
        } else if req.is_shard() {
            (Route::RoundRobin, req)
        } else {
            (Route::Gather, req.resize(1))
        };
        self.then(Box::new(Bridge::<T>::new(route, ordered, req)))
    }

    /// Move rows to the ranks picked by `req`, so that equal keys land together.
    pub fn partition_by<K, F>(&self, key: F, req: impl Into<ProcReq>) -> Flow<T>
    where
        K: Hash,
        F: 'static + Send + Sync + Fn(&T) -> K,
    {
        self.then(Box::new(Bridge::<T>::new(Route::by_key(key, DefaultKeyHasher), false, req.into())))
    }

    /// Like [`Flow::partition_by`], sending eagerly to keep each sender's order.
    pub fn ordered_partition_by<K, F>(&self, key: F, req: impl Into<ProcReq>) -> Flow<T>
    where
        K: Hash,
        F: 'static + Send + Sync + Fn(&T) -> K,
    {
        self.then(Box::new(Bridge::<T>::new(Route::by_key(key, DefaultKeyHasher), true, req.into())))
    }

    fn keyed_input<K: Row>(&self, key: &KeyFn<T, K>, opts: &Keyed<K>) -> Flow<T> {
        if opts.inprocess {
            return self.clone();
        }
        let key = Arc::clone(key);
        let route = Route::by_key(move |row: &T| key(row), Arc::clone(&opts.hasher));
        self.then(Box::new(Bridge::<T>::new(route, opts.ordered, opts.prll.clone())))
    }

    /// Fold rows per key, starting every key from a clone of `init`.
    pub fn reduce<K, A, KF, F>(&self, key: KF, init: A, fold: F, opts: Keyed<K>) -> Flow<(K, A)>
    where
        K: Row + Eq + Hash,
        A: Row,
        KF: 'static + Send + Sync + Fn(&T) -> K,
        F: 'static + Send + Sync + Fn(A, &K, &T) -> A,
    {
        let key: KeyFn<T, K> = Arc::new(key);
        let input = self.keyed_input(&key, &opts);
        input.then(Box::new(Reduce::new(key, Arc::new(fold), init, opts.ordered)))
    }

    /// Hand groups of rows sharing a key to `func`, as cut by `window`.
    pub fn reduce_all<K, O, KF, F>(&self, key: KF, func: F, window: Window, opts: Keyed<K>) -> Flow<(K, O)>
    where
        K: Row + Eq + Hash,
        O: Row,
        KF: 'static + Send + Sync + Fn(&T) -> K,
        F: 'static + Send + Sync + Fn(&K, &[T]) -> O,
    {
        let key: KeyFn<T, K> = Arc::new(key);
        let input = self.keyed_input(&key, &opts);
        input.then(Box::new(ReduceAll::new(key, Arc::new(func), window, opts.ordered)))
    }

    fn join<R, O>(&self, other: &Flow<R>, unit: Box<dyn Unit>) -> Flow<O> {
        self.assert_same_pipeline(other);
        let id = self.pipeline.insert_unit(unit);
        self.pipeline.connect(self.id, id, LEFT);
        self.pipeline.connect(other.id, id, RIGHT);
        Flow { pipeline: self.pipeline.clone(), id, _t: PhantomData }
    }

    /// Pair rows of both flows by position, on the first rank picked by `req`.
    pub fn zip<R: Row>(&self, other: &Flow<R>, req: impl Into<ProcReq>) -> Flow<(T, R)> {
        self.join(other, Box::new(Zip::<T, R, ()>::positional(req.into())))
    }

    /// Pair each row with a row of `other` carrying the same key.
    ///
    /// Only `prll` and `hasher` of `opts` apply; both sides are always exchanged.
    pub fn zip_by<R, K, LF, RF>(&self, other: &Flow<R>, left_key: LF, right_key: RF, opts: Keyed<K>) -> Flow<(T, R)>
    where
        R: Row,
        K: Row + Eq + Hash,
        LF: 'static + Send + Sync + Fn(&T) -> K,
        RF: 'static + Send + Sync + Fn(&R) -> K,
    {
        let zip = Zip::keyed(Arc::new(left_key), Arc::new(right_key), opts.hasher, opts.prll);
        self.join(other, Box::new(zip))
    }

    /// Print every row to stdout as JSON, prefixed with the rank. Returns this flow.
    pub fn dump(&self) -> Flow<T> {
        let _: Flow<T> = self.then(Box::new(Dump::<T>::stdout()));
        self.clone()
    }

    /// Write every row to `path` as a line of JSON, after an optional header line.
    /// Returns this flow.
    pub fn dump_file(&self, path: impl Into<PathBuf>, header: Option<&str>) -> Flow<T> {
        let _: Flow<T> = self.then(Box::new(Dump::<T>::file(path, header.map(str::to_owned))));
        self.clone()
    }

    /// Execute the component containing this flow.
    pub fn run(&self, ctx: &mut Context, req: impl Into<ProcReq>) -> Result<RunMetrics> {
        ctx.run(&self.pipeline, self.id, &req.into())
    }

    /// Execute and return the rows reaching this flow on the calling rank.
    pub fn run_result(&self, ctx: &mut Context, req: impl Into<ProcReq>) -> Result<Vec<T>> {
        let buf = Arc::new(Mutex::new(Vec::new()));
        let sink: Flow<T> = self.then(Box::new(Collect::new(Arc::clone(&buf))));
        let res = ctx.run(&self.pipeline, sink.id, &req.into());
        self.pipeline.detach(sink.id);
        res?;
        let rows = mem::take(&mut *buf.lock().expect("collect buffer poisoned"));
        Ok(rows)
    }
}
