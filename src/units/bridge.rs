//! Rank-to-rank row exchange.
//!
//! An [`Exchange`] buffers rows per destination rank, chosen by a [`Route`].
//! When the input ends, [`Exchange::finish`] runs a collective round on the
//! exchange's tag:
//!
//! 1. send every rank of the world one final packet (`last = true`), holding
//!    the remaining rows for destinations and nothing for everyone else;
//! 2. receive from every rank, in rank order, until its final packet.
//!
//! Every rank of the world takes part, in or out of range, so nobody waits on
//! a peer that skipped the round. Ordered exchanges also send eagerly once a
//! buffer reaches `ordered_batch_rows`, which keeps each sender's rows in the
//! order they were pushed.
//!
//! Payloads are `postcard`-encoded `Vec<T>`; an empty payload means no rows.

use crate::comm::Packet;
use crate::error::RunError;
use crate::flow::Row;
use crate::hashing::{KeyHasher, partition_of};
use crate::par::Par;
use crate::proc_req::ProcReq;
use crate::type_token::{TypeTag, downcast_batch};
use crate::unit::{Unit, UnitCtx, UnitKind};
use anyhow::Result;
use rayon::prelude::*;
use std::any::Any;
use std::mem;
use std::sync::Arc;

/// How rows are spread over the destination ranks.
pub enum Route<T> {
    /// By a 64-bit hash of the row's key.
    Key(Arc<dyn Fn(&T) -> u64 + Send + Sync>),
    /// Cycling through destinations, one row at a time.
    RoundRobin,
    /// Every row to every destination.
    Broadcast,
    /// Every row to the first destination.
    Gather,
}

impl<T> Clone for Route<T> {
    fn clone(&self) -> Self {
        match self {
            Route::Key(f) => Route::Key(Arc::clone(f)),
            Route::RoundRobin => Route::RoundRobin,
            Route::Broadcast => Route::Broadcast,
            Route::Gather => Route::Gather,
        }
    }
}

impl<T: 'static> Route<T> {
    /// Route by `key(row)` hashed with `hasher`.
    pub fn by_key<K, F, H>(key: F, hasher: H) -> Self
    where
        F: Fn(&T) -> K + Send + Sync + 'static,
        H: KeyHasher<K>,
    {
        Route::Key(Arc::new(move |row: &T| hasher.hash_key(&key(row))))
    }
}

pub struct Exchange<T> {
    route: Route<T>,
    ordered: bool,
    tag: u32,
    dest: Vec<usize>,
    buffers: Vec<Vec<T>>,
    next: usize,
}

impl<T: Row> Exchange<T> {
    pub fn new(route: Route<T>, ordered: bool) -> Self {
        Self { route, ordered, tag: 0, dest: Vec::new(), buffers: Vec::new(), next: 0 }
    }

    /// Target `dest` on `tag` for the coming run, dropping anything buffered.
    pub fn reset(&mut self, dest: &[usize], tag: u32) {
        self.tag = tag;
        self.dest = dest.to_vec();
        self.buffers = dest.iter().map(|_| Vec::new()).collect();
        self.next = 0;
    }

    pub fn push(&mut self, row: &T, ctx: &mut UnitCtx<'_>) -> Result<()> {
        let n = self.dest.len();
        if n == 0 {
            return Err(RunError::Disconnected { rank: ctx.comm().rank() }.into());
        }
        let target = match &self.route {
            Route::Broadcast => None,
            Route::Key(hash) => Some(partition_of(hash(row), n)),
            Route::RoundRobin => Some(self.next % n),
            Route::Gather => Some(0),
        };
        if matches!(self.route, Route::RoundRobin) {
            self.next = self.next.wrapping_add(1);
        }
        match target {
            Some(i) => {
                self.buffers[i].push(row.clone());
                self.maybe_send(i, ctx)
            }
            None => {
                for i in 0..n {
                    self.buffers[i].push(row.clone());
                    self.maybe_send(i, ctx)?;
                }
                Ok(())
            }
        }
    }

    fn maybe_send(&mut self, i: usize, ctx: &mut UnitCtx<'_>) -> Result<()> {
        if self.ordered && self.buffers[i].len() >= ctx.config().ordered_batch_rows {
            self.send(i, false, ctx)?;
        }
        Ok(())
    }

    fn send(&mut self, i: usize, last: bool, ctx: &mut UnitCtx<'_>) -> Result<()> {
        let rows = mem::take(&mut self.buffers[i]);
        let payload = if rows.is_empty() {
            Vec::new()
        } else {
            postcard::to_allocvec(&rows).map_err(RunError::from)?
        };
        ctx.record_sent(payload.len());
        let me = ctx.comm().rank();
        ctx.comm().send(self.dest[i], Packet::new(self.tag, me, payload, last))?;
        Ok(())
    }

    /// Flush, then collect what every rank sent here, in source-rank order.
    pub fn finish(&mut self, ctx: &mut UnitCtx<'_>) -> Result<Vec<Vec<T>>> {
        let me = ctx.comm().rank();
        let world = ctx.comm().size();
        for to in 0..world {
            match self.dest.iter().position(|&d| d == to) {
                Some(i) => self.send(i, true, ctx)?,
                None => ctx.comm().send(to, Packet::new(self.tag, me, Vec::new(), true))?,
            }
        }

        let mut payloads: Vec<Vec<u8>> = Vec::new();
        for from in 0..world {
            loop {
                let p = ctx.comm().recv(self.tag, from)?;
                ctx.record_received(p.payload.len());
                if !p.payload.is_empty() {
                    payloads.push(p.payload);
                }
                if p.last {
                    break;
                }
            }
        }

        let decode = |b: &Vec<u8>| postcard::from_bytes::<Vec<T>>(b).map_err(RunError::from);
        let batches = if ctx.config().parallel_decode && payloads.len() > 1 {
            payloads.par_iter().map(decode).collect::<Result<Vec<_>, _>>()?
        } else {
            payloads.iter().map(decode).collect::<Result<Vec<_>, _>>()?
        };
        Ok(batches)
    }
}

/// A task that moves rows to its own ranks and forwards them unchanged.
///
/// In a one-rank world there is nobody to exchange with, so rows pass
/// straight through as they arrive.
pub struct Bridge<T> {
    req: ProcReq,
    exchange: Exchange<T>,
}

impl<T: Row> Bridge<T> {
    pub fn new(route: Route<T>, ordered: bool, req: ProcReq) -> Self {
        Self { req, exchange: Exchange::new(route, ordered) }
    }
}

impl<T: Row> Unit for Bridge<T> {
    fn kind(&self) -> UnitKind {
        UnitKind::Task
    }

    fn label(&self) -> String {
        if self.exchange.ordered { "ordered bridge".into() } else { "bridge".into() }
    }

    fn row_tag(&self) -> TypeTag {
        TypeTag::of::<T>()
    }

    fn proc_req(&self) -> Option<&ProcReq> {
        Some(&self.req)
    }

    fn set_par(&mut self, par: Par) {
        self.exchange.reset(par.ranks(), par.tag(0));
    }

    fn data(&mut self, _port: usize, batch: &dyn Any, ctx: &mut UnitCtx<'_>) -> Result<()> {
        let rows = downcast_batch::<T>(batch, "bridge")?;
        ctx.record_in(rows.len());
        if ctx.comm().size() == 1 {
            ctx.emit(rows.to_vec());
            return Ok(());
        }
        for row in rows {
            self.exchange.push(row, ctx)?;
        }
        Ok(())
    }

    fn end(&mut self, _port: usize, ctx: &mut UnitCtx<'_>) -> Result<()> {
        if ctx.comm().size() > 1 {
            for batch in self.exchange.finish(ctx)? {
                ctx.emit(batch);
            }
        }
        ctx.close();
        Ok(())
    }
}
