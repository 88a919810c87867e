//! Whole-group reductions.
//!
//! Rows are gathered per key and handed to a function as a slice. The
//! [`Window`] decides when a group is handed over:
//!
//! - `Whole`: once, with every row of the key.
//! - `Bunch(n)`: every `n` rows, then start afresh. A short remainder is
//!   handed over when the key is done.
//! - `Adjacent(n)`: every `n` consecutive rows, sliding by one. A key that
//!   never filled a window is handed over whole when done; in ordered mode
//!   the last partial window is also handed over on a key change.
//!
//! In ordered mode only the current key's group is kept and "done" means the
//! key changed; otherwise groups live in a map until the input ends.

use super::KeyFn;
use crate::flow::Row;
use crate::par::Par;
use crate::type_token::{TypeTag, downcast_batch};
use crate::unit::{Unit, UnitCtx, UnitKind};
use anyhow::Result;
use std::any::Any;
use std::collections::{HashMap, VecDeque};
use std::hash::Hash;
use std::sync::Arc;

/// Reduces one group of rows sharing a key.
pub type GroupFn<I, K, O> = Arc<dyn Fn(&K, &[I]) -> O + Send + Sync>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Window {
    #[default]
    Whole,
    Bunch(usize),
    Adjacent(usize),
}

struct Group<I> {
    rows: VecDeque<I>,
    filled: bool,
}

impl<I> Default for Group<I> {
    fn default() -> Self {
        Self { rows: VecDeque::new(), filled: false }
    }
}

pub struct ReduceAll<I, K, O> {
    key: KeyFn<I, K>,
    func: GroupFn<I, K, O>,
    window: Window,
    ordered: bool,
    open: HashMap<K, Group<I>>,
    current: Option<(K, Group<I>)>,
}

impl<I, K, O> ReduceAll<I, K, O>
where
    I: Row,
    K: Row + Eq + Hash,
    O: Row,
{
    pub fn new(key: KeyFn<I, K>, func: GroupFn<I, K, O>, window: Window, ordered: bool) -> Self {
        Self { key, func, window, ordered, open: HashMap::new(), current: None }
    }

    /// Groups currently held.
    pub fn open_keys(&self) -> usize {
        if self.ordered { usize::from(self.current.is_some()) } else { self.open.len() }
    }
}

fn apply<I, K: Clone, O>(func: &GroupFn<I, K, O>, key: &K, rows: &mut VecDeque<I>) -> (K, O) {
    (key.clone(), func(key, rows.make_contiguous()))
}

fn push_row<I, K: Clone, O>(
    window: Window,
    func: &GroupFn<I, K, O>,
    key: &K,
    group: &mut Group<I>,
    row: I,
    out: &mut Vec<(K, O)>,
) {
    group.rows.push_back(row);
    match window {
        Window::Whole => {}
        Window::Bunch(n) => {
            if group.rows.len() >= n.max(1) {
                out.push(apply(func, key, &mut group.rows));
                group.rows.clear();
                group.filled = true;
            }
        }
        Window::Adjacent(n) => {
            if group.rows.len() >= n.max(1) {
                out.push(apply(func, key, &mut group.rows));
                group.rows.pop_front();
                group.filled = true;
            }
        }
    }
}

/// Hand over what is left of a group. `at_end` marks end-of-input as opposed to a key change.
fn flush<I, K: Clone, O>(
    window: Window,
    func: &GroupFn<I, K, O>,
    key: &K,
    mut group: Group<I>,
    at_end: bool,
    out: &mut Vec<(K, O)>,
) {
    if group.rows.is_empty() {
        return;
    }
    if at_end && group.filled && matches!(window, Window::Adjacent(_)) {
        return;
    }
    out.push(apply(func, key, &mut group.rows));
}

impl<I, K, O> Unit for ReduceAll<I, K, O>
where
    I: Row,
    K: Row + Eq + Hash,
    O: Row,
{
    fn kind(&self) -> UnitKind {
        UnitKind::Link
    }

    fn label(&self) -> String {
        format!("reduce_all({:?})", self.window)
    }

    fn row_tag(&self) -> TypeTag {
        TypeTag::of::<(K, O)>()
    }

    fn set_par(&mut self, _par: Par) {
        self.open.clear();
        self.current = None;
    }

    fn data(&mut self, _port: usize, batch: &dyn Any, ctx: &mut UnitCtx<'_>) -> Result<()> {
        let rows = downcast_batch::<I>(batch, "reduce_all")?;
        ctx.record_in(rows.len());
        let Self { key, func, window, ordered, open, current } = self;
        let mut out: Vec<(K, O)> = Vec::new();
        for row in rows {
            let k = key(row);
            if *ordered {
                let mut group = match current.take() {
                    Some((cur, group)) if cur == k => group,
                    Some((done, group)) => {
                        flush(*window, func, &done, group, false, &mut out);
                        Group::default()
                    }
                    None => Group::default(),
                };
                push_row(*window, func, &k, &mut group, row.clone(), &mut out);
                *current = Some((k, group));
            } else {
                let group = open.entry(k.clone()).or_default();
                push_row(*window, func, &k, group, row.clone(), &mut out);
            }
        }
        ctx.emit(out);
        Ok(())
    }

    fn end(&mut self, _port: usize, ctx: &mut UnitCtx<'_>) -> Result<()> {
        let mut out: Vec<(K, O)> = Vec::new();
        if let Some((k, group)) = self.current.take() {
            flush(self.window, &self.func, &k, group, true, &mut out);
        }
        for (k, group) in self.open.drain() {
            flush(self.window, &self.func, &k, group, true, &mut out);
        }
        ctx.emit(out);
        ctx.close();
        Ok(())
    }
}
