//! Rank allocation.
//!
//! The scheduler keeps a load figure per rank and hands out [`Par`]s to the
//! roots and tasks of a run. It is purely deterministic: given the same
//! requests in the same order, every rank computes the same assignment, so
//! no agreement protocol is needed.
//!
//! Allocation walks candidates in this order:
//! 1. the ranks of the parent (where the data already is), unless the request
//!    carries the `TASK` flag;
//! 2. the remaining ranks of the run, least loaded first.
//!
//! Each allocation bumps the load of the ranks it hands out and re-sorts, so
//! later tasks in the same run gravitate towards idle ranks.

use crate::config::RunConfig;
use crate::logging::LogMode;
use crate::par::Par;
use crate::proc_req::{ProcCount, ProcReq};
use tracing::{info, warn};

/// `[allocations in the current run, allocations in finished runs]`.
pub type Load = [u64; 2];

pub struct Scheduler {
    rank: usize,
    procs: Vec<(Load, usize)>,
    next_tag: u32,
    prll_ratio: f64,
    persist_load: bool,
    log_mode: LogMode,
}

impl Scheduler {
    pub fn new(size: usize, rank: usize, config: &RunConfig) -> Self {
        Self {
            rank,
            procs: (0..size).map(|r| ([0, 0], r)).collect(),
            next_tag: 1,
            prll_ratio: config.prll_ratio,
            persist_load: config.persist_load,
            log_mode: config.log_mode,
        }
    }

    pub fn size(&self) -> usize {
        self.procs.len()
    }

    /// Per-rank loads, least loaded first.
    pub fn loads(&self) -> &[(Load, usize)] {
        &self.procs
    }

    /// Every rank, least loaded first.
    pub fn priority_order(&self) -> Vec<usize> {
        self.procs.iter().map(|(_, r)| *r).collect()
    }

    /// The ranks a whole run may use.
    pub fn resolve_run(&self, req: &ProcReq) -> Vec<usize> {
        let all = self.priority_order();
        match req.size() {
            ProcCount::Inherit => all,
            ProcCount::Count(n) => give_procs(*n, &all),
            ProcCount::Ratio(r) => give_procs(scaled(all.len(), *r), &all),
            ProcCount::Ranks(wanted) => self.give_ranks(wanted, &all),
        }
    }

    /// Allocate ranks for groups of requests.
    ///
    /// `priority[i]` holds the ranks of the parent of group `i` (empty for
    /// roots). The result mirrors the shape of `groups`.
    pub fn assign(
        &mut self,
        groups: &[Vec<ProcReq>],
        cur_run: &[usize],
        priority: &[Vec<usize>],
    ) -> Vec<Vec<Par>> {
        let mut out = Vec::with_capacity(groups.len());
        for (i, group) in groups.iter().enumerate() {
            let prio = priority.get(i).map(Vec::as_slice).unwrap_or(&[]);
            let mut pars = Vec::with_capacity(group.len());
            for req in group {
                let ranks = self.allocate(req, cur_run, prio);
                self.mark_alloc(&ranks);
                let tags = [self.next_tag, self.next_tag + 1, self.next_tag + 2];
                self.next_tag += 3;
                if self.rank == 0 && self.log_mode.contains(LogMode::INFO) {
                    info!(rank = self.rank, %req, ?ranks, ?tags, "allocated");
                }
                pars.push(Par::new(ranks, tags, self.rank));
            }
            out.push(pars);
        }
        out
    }

    /// Close the books on a run.
    ///
    /// With persistent load, this run's allocations move into the history;
    /// otherwise every rank goes back to idle.
    pub fn finish_run(&mut self) {
        for (load, _) in &mut self.procs {
            if self.persist_load {
                load[1] += load[0];
                load[0] = 0;
            } else {
                *load = [0, 0];
            }
        }
        self.procs.sort();
    }

    fn candidates(&self, req: &ProcReq, cur_run: &[usize], prio: &[usize]) -> Vec<usize> {
        let mut all: Vec<usize> = if req.is_task() {
            Vec::new()
        } else {
            prio.iter().copied().filter(|r| cur_run.contains(r)).collect()
        };
        for (_, r) in &self.procs {
            if cur_run.contains(r) && !all.contains(r) {
                all.push(*r);
            }
        }
        all
    }

    fn allocate(&self, req: &ProcReq, cur_run: &[usize], prio: &[usize]) -> Vec<usize> {
        let all = self.candidates(req, cur_run, prio);
        match req.size() {
            ProcCount::Count(n) => give_procs(*n, &all),
            ProcCount::Ratio(r) => {
                let base = if prio.is_empty() || req.is_task() { all.len() } else { prio.len() };
                give_procs(scaled(base, *r), &all)
            }
            ProcCount::Ranks(wanted) => self.give_ranks(wanted, &all),
            ProcCount::Inherit => {
                if req.is_all() || prio.is_empty() {
                    all
                } else if req.is_task() {
                    give_procs(prio.len(), &all)
                } else {
                    give_procs(scaled(prio.len(), self.prll_ratio), &all)
                }
            }
        }
    }

    fn give_ranks(&self, wanted: &[usize], all: &[usize]) -> Vec<usize> {
        let mut out: Vec<usize> = Vec::new();
        for r in wanted {
            if all.contains(r) && !out.contains(r) {
                out.push(*r);
            }
        }
        if out.is_empty() {
            if self.rank == 0 && self.log_mode.contains(LogMode::WARNING) {
                warn!(
                    rank = self.rank,
                    ?wanted,
                    ?all,
                    "none of the requested ranks are available, falling back to one rank"
                );
            }
            return give_procs(1, all);
        }
        out
    }

    fn mark_alloc(&mut self, ranks: &[usize]) {
        for (load, r) in &mut self.procs {
            if ranks.contains(r) {
                load[0] += 1;
            }
        }
        self.procs.sort();
    }
}

/// The first `n` candidates; never fewer than one.
fn give_procs(n: usize, all: &[usize]) -> Vec<usize> {
    all.iter().copied().take(n.max(1)).collect()
}

fn scaled(n: usize, ratio: f64) -> usize {
    (n as f64 * ratio).floor() as usize
}
