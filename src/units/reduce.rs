//! Keyed fold.
//!
//! Each row is folded into the accumulator of its key; one `(key, acc)` row
//! comes out per key. In ordered mode the input is assumed grouped by key:
//! only the current key's accumulator is kept, and it is emitted as soon as a
//! different key shows up. Otherwise all accumulators live in a map until the
//! input ends.

use super::KeyFn;
use crate::flow::Row;
use crate::par::Par;
use crate::type_token::{TypeTag, downcast_batch};
use crate::unit::{Unit, UnitCtx, UnitKind};
use anyhow::Result;
use std::any::Any;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

/// Folds one row into an accumulator.
pub type FoldFn<I, K, A> = Arc<dyn Fn(A, &K, &I) -> A + Send + Sync>;

pub struct Reduce<I, K, A> {
    key: KeyFn<I, K>,
    fold: FoldFn<I, K, A>,
    init: A,
    ordered: bool,
    open: HashMap<K, A>,
    current: Option<(K, A)>,
}

impl<I, K, A> Reduce<I, K, A>
where
    I: Row,
    K: Row + Eq + Hash,
    A: Row,
{
    pub fn new(key: KeyFn<I, K>, fold: FoldFn<I, K, A>, init: A, ordered: bool) -> Self {
        Self { key, fold, init, ordered, open: HashMap::new(), current: None }
    }

    /// Accumulators currently held.
    pub fn open_keys(&self) -> usize {
        if self.ordered { usize::from(self.current.is_some()) } else { self.open.len() }
    }
}

impl<I, K, A> Unit for Reduce<I, K, A>
where
    I: Row,
    K: Row + Eq + Hash,
    A: Row,
{
    fn kind(&self) -> UnitKind {
        UnitKind::Link
    }

    fn label(&self) -> String {
        if self.ordered { "reduce(ordered)".into() } else { "reduce".into() }
    }

    fn row_tag(&self) -> TypeTag {
        TypeTag::of::<(K, A)>()
    }

    fn set_par(&mut self, _par: Par) {
        self.open.clear();
        self.current = None;
    }

    fn data(&mut self, _port: usize, batch: &dyn Any, ctx: &mut UnitCtx<'_>) -> Result<()> {
        let rows = downcast_batch::<I>(batch, "reduce")?;
        ctx.record_in(rows.len());
        let mut out: Vec<(K, A)> = Vec::new();
        for row in rows {
            let k = (self.key)(row);
            if self.ordered {
                let acc = match self.current.take() {
                    Some((cur, acc)) if cur == k => acc,
                    Some(done) => {
                        out.push(done);
                        self.init.clone()
                    }
                    None => self.init.clone(),
                };
                let acc = (self.fold)(acc, &k, row);
                self.current = Some((k, acc));
            } else {
                let acc = self.open.remove(&k).unwrap_or_else(|| self.init.clone());
                let acc = (self.fold)(acc, &k, row);
                self.open.insert(k, acc);
            }
        }
        ctx.emit(out);
        Ok(())
    }

    fn end(&mut self, _port: usize, ctx: &mut UnitCtx<'_>) -> Result<()> {
        let out: Vec<(K, A)> = if self.ordered {
            self.current.take().into_iter().collect()
        } else {
            self.open.drain().collect()
        };
        ctx.emit(out);
        ctx.close();
        Ok(())
    }
}
