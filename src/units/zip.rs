//! Two-input pairing.
//!
//! Port 0 takes left rows, port 1 right rows. A zip is a task: each side is
//! exchanged onto the zip's ranks on its own tag (tag 0 for the left side,
//! tag 1 for the right), keyed zips by the key hash, positional zips all onto
//! the first rank. Then rows are paired:
//!
//! - keyed: a row is matched with the oldest unmatched row of the other side
//!   carrying the same key, or queued until one arrives;
//! - positional: rows are matched in arrival order.
//!
//! Rows still unmatched when both sides have ended are dropped.

use super::KeyFn;
use super::bridge::{Exchange, Route};
use crate::flow::Row;
use crate::hashing::KeyHasher;
use crate::par::Par;
use crate::proc_req::ProcReq;
use crate::type_token::{TypeTag, downcast_batch};
use crate::unit::{Unit, UnitCtx, UnitKind};
use anyhow::{Result, bail};
use std::any::Any;
use std::collections::{HashMap, VecDeque};
use std::hash::Hash;

pub const LEFT: usize = 0;
pub const RIGHT: usize = 1;

pub enum ZipKeys<L, R, K> {
    Keyed { left: KeyFn<L, K>, right: KeyFn<R, K> },
    Positional,
}

pub struct Zip<L, R, K> {
    req: ProcReq,
    keys: ZipKeys<L, R, K>,
    left_x: Exchange<L>,
    right_x: Exchange<R>,
    left_q: HashMap<K, VecDeque<L>>,
    right_q: HashMap<K, VecDeque<R>>,
    left_pos: VecDeque<L>,
    right_pos: VecDeque<R>,
    ended: [bool; 2],
}

impl<L, R, K> Zip<L, R, K>
where
    L: Row,
    R: Row,
    K: Row + Eq + Hash,
{
    pub fn keyed<H>(left: KeyFn<L, K>, right: KeyFn<R, K>, hasher: H, req: ProcReq) -> Self
    where
        H: KeyHasher<K> + Clone,
    {
        let (lk, rk) = (left.clone(), right.clone());
        let left_route = Route::by_key(move |l: &L| lk(l), hasher.clone());
        let right_route = Route::by_key(move |r: &R| rk(r), hasher);
        Self::build(ZipKeys::Keyed { left, right }, left_route, right_route, req)
    }

    pub fn positional(req: ProcReq) -> Self {
        Self::build(ZipKeys::Positional, Route::Gather, Route::Gather, req)
    }

    fn build(keys: ZipKeys<L, R, K>, left: Route<L>, right: Route<R>, req: ProcReq) -> Self {
        Self {
            req,
            keys,
            left_x: Exchange::new(left, false),
            right_x: Exchange::new(right, false),
            left_q: HashMap::new(),
            right_q: HashMap::new(),
            left_pos: VecDeque::new(),
            right_pos: VecDeque::new(),
            ended: [false; 2],
        }
    }

    /// Rows waiting for a partner, both sides together.
    pub fn pending(&self) -> usize {
        self.left_q.values().map(VecDeque::len).sum::<usize>()
            + self.right_q.values().map(VecDeque::len).sum::<usize>()
            + self.left_pos.len()
            + self.right_pos.len()
    }

    fn take_left(&mut self, l: L, out: &mut Vec<(L, R)>) {
        match &self.keys {
            ZipKeys::Keyed { left, .. } => {
                let k = left(&l);
                match pop_match(&mut self.right_q, &k) {
                    Some(r) => out.push((l, r)),
                    None => self.left_q.entry(k).or_default().push_back(l),
                }
            }
            ZipKeys::Positional => match self.right_pos.pop_front() {
                Some(r) => out.push((l, r)),
                None => self.left_pos.push_back(l),
            },
        }
    }

    fn take_right(&mut self, r: R, out: &mut Vec<(L, R)>) {
        match &self.keys {
            ZipKeys::Keyed { right, .. } => {
                let k = right(&r);
                match pop_match(&mut self.left_q, &k) {
                    Some(l) => out.push((l, r)),
                    None => self.right_q.entry(k).or_default().push_back(r),
                }
            }
            ZipKeys::Positional => match self.left_pos.pop_front() {
                Some(l) => out.push((l, r)),
                None => self.right_pos.push_back(r),
            },
        }
    }
}

fn pop_match<K: Eq + Hash, T>(queues: &mut HashMap<K, VecDeque<T>>, k: &K) -> Option<T> {
    let q = queues.get_mut(k)?;
    let hit = q.pop_front();
    if q.is_empty() {
        queues.remove(k);
    }
    hit
}

impl<L, R, K> Unit for Zip<L, R, K>
where
    L: Row,
    R: Row,
    K: Row + Eq + Hash,
{
    fn kind(&self) -> UnitKind {
        UnitKind::Task
    }

    fn label(&self) -> String {
        match self.keys {
            ZipKeys::Keyed { .. } => "zip(keyed)".into(),
            ZipKeys::Positional => "zip".into(),
        }
    }

    fn row_tag(&self) -> TypeTag {
        TypeTag::of::<(L, R)>()
    }

    fn ports(&self) -> usize {
        2
    }

    fn proc_req(&self) -> Option<&ProcReq> {
        Some(&self.req)
    }

    fn set_par(&mut self, par: Par) {
        self.left_x.reset(par.ranks(), par.tag(0));
        self.right_x.reset(par.ranks(), par.tag(1));
        self.left_q.clear();
        self.right_q.clear();
        self.left_pos.clear();
        self.right_pos.clear();
        self.ended = [false; 2];
    }

    fn data(&mut self, port: usize, batch: &dyn Any, ctx: &mut UnitCtx<'_>) -> Result<()> {
        let solo = ctx.comm().size() == 1;
        let mut out = Vec::new();
        match port {
            LEFT => {
                let rows = downcast_batch::<L>(batch, "zip")?;
                ctx.record_in(rows.len());
                for l in rows {
                    if solo {
                        self.take_left(l.clone(), &mut out);
                    } else {
                        self.left_x.push(l, ctx)?;
                    }
                }
            }
            RIGHT => {
                let rows = downcast_batch::<R>(batch, "zip")?;
                ctx.record_in(rows.len());
                for r in rows {
                    if solo {
                        self.take_right(r.clone(), &mut out);
                    } else {
                        self.right_x.push(r, ctx)?;
                    }
                }
            }
            other => bail!("zip has no input port {other}"),
        }
        ctx.emit(out);
        Ok(())
    }

    fn end(&mut self, port: usize, ctx: &mut UnitCtx<'_>) -> Result<()> {
        let solo = ctx.comm().size() == 1;
        let mut out = Vec::new();
        match port {
            LEFT if !solo => {
                for batch in self.left_x.finish(ctx)? {
                    for l in batch {
                        self.take_left(l, &mut out);
                    }
                }
            }
            RIGHT if !solo => {
                for batch in self.right_x.finish(ctx)? {
                    for r in batch {
                        self.take_right(r, &mut out);
                    }
                }
            }
            LEFT | RIGHT => {}
            other => bail!("zip has no input port {other}"),
        }
        self.ended[port] = true;
        ctx.emit(out);
        if self.ended == [true, true] {
            self.left_q.clear();
            self.right_q.clear();
            self.left_pos.clear();
            self.right_pos.clear();
            ctx.close();
        }
        Ok(())
    }
}
