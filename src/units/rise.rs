//! Roots and row sources.
//!
//! A root wraps a [`Generator`]. On each pull the runner asks the generator
//! for one batch; an empty batch ends the stream. Ranks outside the root's
//! assignment produce nothing and close immediately.
//!
//! Ready-made generators:
//! - [`from_fn`]: one row per call, `None` to stop.
//! - [`from_batches`]: one batch per call, empty to stop.
//! - [`FromMem`]: rows held in memory, replicated or split across ranks.
//! - [`Kick`]: `n` unit rows, used to trigger side effects.
//! - [`FromFileNames`]: paths matching a glob pattern.

use crate::flow::Row;
use crate::par::Par;
use crate::proc_req::ProcReq;
use crate::type_token::TypeTag;
use crate::unit::{Unit, UnitCtx, UnitKind};
use anyhow::{Context, Result, bail};
use std::any::Any;
use std::ops::Range;
use std::path::PathBuf;
use tracing::{debug, warn};

const DEFAULT_BATCH: usize = 1024;

/// A source of rows for one rank.
pub trait Generator: Send + 'static {
    type Row: Row;

    /// Called once per run before the first batch, with this rank's position
    /// among the ranks running the root.
    fn start(&mut self, _pos: usize, _ranks: &[usize]) -> Result<()> {
        Ok(())
    }

    /// Next rows; an empty vector ends the stream.
    fn next_batch(&mut self) -> Vec<Self::Row>;
}

/// Slice of `len` items owned by position `pos` of `n`; the last position takes the remainder.
pub fn share_of(len: usize, pos: usize, n: usize) -> Range<usize> {
    let n = n.max(1);
    let share = len / n;
    let start = (share * pos).min(len);
    let end = if pos + 1 >= n { len } else { (share * (pos + 1)).min(len) };
    start..end
}

pub struct Rise<G> {
    generator: G,
    req: ProcReq,
    par: Par,
    started: bool,
}

impl<G: Generator> Rise<G> {
    pub fn new(generator: G, req: ProcReq) -> Self {
        Self { generator, req, par: Par::default(), started: false }
    }
}

impl<G: Generator> Unit for Rise<G> {
    fn kind(&self) -> UnitKind {
        UnitKind::Root
    }

    fn label(&self) -> String {
        "rise".into()
    }

    fn row_tag(&self) -> TypeTag {
        TypeTag::of::<G::Row>()
    }

    fn ports(&self) -> usize {
        0
    }

    fn proc_req(&self) -> Option<&ProcReq> {
        Some(&self.req)
    }

    fn set_par(&mut self, par: Par) {
        self.par = par;
        self.started = false;
    }

    fn pull(&mut self, ctx: &mut UnitCtx<'_>) -> Result<bool> {
        let Some(pos) = self.par.pos() else {
            ctx.close();
            return Ok(false);
        };
        if !self.started {
            self.generator.start(pos, self.par.ranks())?;
            self.started = true;
        }
        let rows = self.generator.next_batch();
        if rows.is_empty() {
            ctx.close();
            return Ok(false);
        }
        ctx.emit(rows);
        Ok(true)
    }

    fn data(&mut self, _port: usize, _batch: &dyn Any, _ctx: &mut UnitCtx<'_>) -> Result<()> {
        bail!("rise has no inputs")
    }

    fn end(&mut self, _port: usize, _ctx: &mut UnitCtx<'_>) -> Result<()> {
        Ok(())
    }
}

pub struct FromFn<F>(F);

/// One row per call; `None` ends the stream.
pub fn from_fn<T, F>(f: F) -> FromFn<F>
where
    T: Row,
    F: FnMut() -> Option<T> + Send + 'static,
{
    FromFn(f)
}

impl<T, F> Generator for FromFn<F>
where
    T: Row,
    F: FnMut() -> Option<T> + Send + 'static,
{
    type Row = T;

    fn next_batch(&mut self) -> Vec<T> {
        (self.0)().into_iter().collect()
    }
}

pub struct FromBatches<F>(F);

/// One batch per call; an empty batch ends the stream.
pub fn from_batches<T, F>(f: F) -> FromBatches<F>
where
    T: Row,
    F: FnMut() -> Vec<T> + Send + 'static,
{
    FromBatches(f)
}

impl<T, F> Generator for FromBatches<F>
where
    T: Row,
    F: FnMut() -> Vec<T> + Send + 'static,
{
    type Row = T;

    fn next_batch(&mut self) -> Vec<T> {
        (self.0)()
    }
}

/// Rows held in memory.
///
/// By default every rank running the root emits the whole vector. With
/// [`split`](Self::split) each rank emits only its share.
pub struct FromMem<T> {
    data: Vec<T>,
    split: bool,
    batch: usize,
    range: Range<usize>,
}

impl<T: Row> FromMem<T> {
    pub fn new(data: Vec<T>) -> Self {
        Self { data, split: false, batch: DEFAULT_BATCH, range: 0..0 }
    }

    pub fn split(mut self) -> Self {
        self.split = true;
        self
    }

    /// Rows per emitted batch.
    pub fn batch(mut self, n: usize) -> Self {
        self.batch = n.max(1);
        self
    }
}

impl<T: Row> Generator for FromMem<T> {
    type Row = T;

    fn start(&mut self, pos: usize, ranks: &[usize]) -> Result<()> {
        self.range = if self.split {
            share_of(self.data.len(), pos, ranks.len())
        } else {
            0..self.data.len()
        };
        Ok(())
    }

    fn next_batch(&mut self) -> Vec<T> {
        let end = (self.range.start + self.batch).min(self.range.end);
        let out = self.data[self.range.start..end].to_vec();
        self.range.start = end;
        out
    }
}

/// Emits `times` unit rows, for pipelines that only need to be triggered.
pub struct Kick {
    times: usize,
    split: bool,
    left: usize,
}

impl Kick {
    pub fn new(times: usize) -> Self {
        Self { times, split: false, left: 0 }
    }

    /// Spread the kicks over the ranks instead of repeating them on each.
    pub fn split(mut self) -> Self {
        self.split = true;
        self
    }
}

impl Generator for Kick {
    type Row = ();

    fn start(&mut self, pos: usize, ranks: &[usize]) -> Result<()> {
        self.left = if self.split {
            share_of(self.times, pos, ranks.len()).len()
        } else {
            self.times
        };
        Ok(())
    }

    fn next_batch(&mut self) -> Vec<()> {
        let n = self.left.min(DEFAULT_BATCH);
        self.left -= n;
        vec![(); n]
    }
}

/// Paths matching a glob pattern, in sorted order.
pub struct FromFileNames {
    pattern: String,
    split: bool,
    limit: Option<usize>,
    names: Vec<String>,
}

impl FromFileNames {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self { pattern: pattern.into(), split: false, limit: None, names: Vec::new() }
    }

    pub fn split(mut self) -> Self {
        self.split = true;
        self
    }

    /// Keep only the first `n` matches.
    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }
}

impl Generator for FromFileNames {
    type Row = String;

    fn start(&mut self, pos: usize, ranks: &[usize]) -> Result<()> {
        let paths = glob::glob(&self.pattern)
            .with_context(|| format!("invalid glob pattern: {}", self.pattern))?;
        let mut all: Vec<PathBuf> = Vec::new();
        for entry in paths {
            match entry {
                Ok(p) if p.is_file() => all.push(p),
                Ok(_) => {}
                Err(e) => warn!(pattern = %self.pattern, "skipping unreadable glob entry: {e}"),
            }
        }
        all.sort();
        if let Some(n) = self.limit {
            all.truncate(n);
        }
        let range = if self.split { share_of(all.len(), pos, ranks.len()) } else { 0..all.len() };
        debug!(pattern = %self.pattern, matched = all.len(), mine = range.len(), "file names");
        // popped from the back
        self.names = all[range]
            .iter()
            .rev()
            .map(|p| p.to_string_lossy().into_owned())
            .collect();
        Ok(())
    }

    fn next_batch(&mut self) -> Vec<String> {
        self.names.pop().into_iter().collect()
    }
}
