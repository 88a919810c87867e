//! Executing a pipeline on one rank.
//!
//! A run goes through four steps, identically on every rank:
//!
//! 1. resolve the ranks of the run and find every root connected to the
//!    requested unit;
//! 2. ask the [`Scheduler`] for the roots' ranks, then for the tasks reachable
//!    from each root, with that root's ranks as priority;
//! 3. hand links and sinks the ranks of whatever feeds them, and give every
//!    unit its [`Par`];
//! 4. pull each root until exhausted, pushing batches and end signals down
//!    the graph depth first.
//!
//! A unit gets `end` on a port once per run, after all edges into that port
//! have closed.

use crate::comm::{Communicator, Solo};
use crate::config::RunConfig;
use crate::metrics::RunMetrics;
use crate::par::Par;
use crate::pipeline::{Pipeline, PipelineInner};
use crate::proc_req::ProcReq;
use crate::scheduler::Scheduler;
use crate::type_token::Partition;
use crate::unit::{UnitCtx, UnitKind};
use crate::unit_id::UnitId;
use anyhow::{Context as _, Result, anyhow, ensure};
use std::any::Any;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Everything a rank needs to execute pipelines: its communicator, the
/// scheduler state carried across runs, and the run configuration.
pub struct Context {
    comm: Arc<dyn Communicator>,
    scheduler: Scheduler,
    config: RunConfig,
}

impl Context {
    pub fn new(comm: Arc<dyn Communicator>) -> Self {
        Self::with_config(comm, RunConfig::default())
    }

    pub fn with_config(comm: Arc<dyn Communicator>, config: RunConfig) -> Self {
        let scheduler = Scheduler::new(comm.size(), comm.rank(), &config);
        Self { comm, scheduler, config }
    }

    /// A one-rank context.
    pub fn solo() -> Self {
        Self::new(Arc::new(Solo::new()))
    }

    pub fn rank(&self) -> usize {
        self.comm.rank()
    }

    pub fn size(&self) -> usize {
        self.comm.size()
    }

    pub fn comm(&self) -> &Arc<dyn Communicator> {
        &self.comm
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Run the component containing `terminal` on the ranks picked by `req`.
    pub fn run(&mut self, p: &Pipeline, terminal: UnitId, req: &ProcReq) -> Result<RunMetrics> {
        let started = Instant::now();
        let mut g = p.lock();
        let result = self.execute(&mut g, terminal, req);
        self.scheduler.finish_run();
        let mut metrics = result?;
        metrics.set_elapsed(started.elapsed());
        debug!(rank = self.rank(), elapsed_ms = metrics.elapsed().as_millis() as u64, "run finished");
        Ok(metrics)
    }

    fn execute(&mut self, g: &mut PipelineInner, terminal: UnitId, req: &ProcReq) -> Result<RunMetrics> {
        ensure!(g.units.contains_key(&terminal), "unit {terminal} is not part of this pipeline");
        let cur_run = self.scheduler.resolve_run(req);
        let roots = g.component_roots(terminal);
        if roots.is_empty() {
            debug!(rank = self.comm.rank(), %terminal, "nothing to run");
            return Ok(RunMetrics::new(self.comm.rank()));
        }
        let order = g.forward(&roots);
        let scope: BTreeSet<UnitId> = order.iter().copied().collect();

        let mut pars = self.assign(g, &roots, &cur_run);
        forward_par(g, &order, &mut pars);

        let rank = self.comm.rank();
        let mut metrics = RunMetrics::new(rank);
        for id in &order {
            let par = pars.remove(id).unwrap_or_default();
            let unit = g.units.get_mut(id).ok_or_else(|| anyhow!("unit {id} vanished"))?;
            metrics.register(*id, unit.label(), par.ranks());
            unit.set_par(par);
        }
        debug!(rank, units = order.len(), roots = roots.len(), "run starting");

        let mut d = Dispatch {
            g,
            comm: self.comm.as_ref(),
            config: &self.config,
            metrics: &mut metrics,
            scope: &scope,
            ends: HashMap::new(),
        };
        for root in &roots {
            while d.pull(*root)? {}
        }
        Ok(metrics)
    }

    fn assign(&mut self, g: &PipelineInner, roots: &[UnitId], cur_run: &[usize]) -> HashMap<UnitId, Par> {
        let req_of = |id: &UnitId| {
            g.units
                .get(id)
                .and_then(|u| u.proc_req().cloned())
                .unwrap_or_default()
        };

        let root_reqs: Vec<ProcReq> = roots.iter().map(req_of).collect();
        let root_pars = self
            .scheduler
            .assign(&[root_reqs], cur_run, &[Vec::new()])
            .pop()
            .unwrap_or_default();
        let mut pars: HashMap<UnitId, Par> = roots.iter().copied().zip(root_pars).collect();

        // a task reachable from several roots belongs to the first one
        let mut claimed = BTreeSet::new();
        let mut groups = Vec::with_capacity(roots.len());
        let mut group_ids = Vec::with_capacity(roots.len());
        let mut priority = Vec::with_capacity(roots.len());
        for root in roots {
            let tasks = g.branch_tasks(*root, &claimed);
            claimed.extend(tasks.iter().copied());
            groups.push(tasks.iter().map(req_of).collect::<Vec<_>>());
            priority.push(pars.get(root).map(|p| p.ranks().to_vec()).unwrap_or_default());
            group_ids.push(tasks);
        }
        let task_pars = self.scheduler.assign(&groups, cur_run, &priority);
        for (ids, ps) in group_ids.into_iter().zip(task_pars) {
            pars.extend(ids.into_iter().zip(ps));
        }
        pars
    }
}

/// Links and sinks run wherever their first upstream runs.
fn forward_par(g: &PipelineInner, order: &[UnitId], pars: &mut HashMap<UnitId, Par>) {
    for id in order {
        let Some(par) = pars.get(id).cloned() else {
            continue;
        };
        for (next, _) in g.successors(*id) {
            let inherits = matches!(g.kind(next), Some(UnitKind::Link | UnitKind::Sink));
            if inherits && !pars.contains_key(&next) {
                pars.insert(next, par.clone());
            }
        }
    }
}

struct Dispatch<'a> {
    g: &'a mut PipelineInner,
    comm: &'a dyn Communicator,
    config: &'a RunConfig,
    metrics: &'a mut RunMetrics,
    scope: &'a BTreeSet<UnitId>,
    ends: HashMap<(UnitId, usize), usize>,
}

impl Dispatch<'_> {
    fn pull(&mut self, root: UnitId) -> Result<bool> {
        let unit = self.g.units.get_mut(&root).ok_or_else(|| anyhow!("unit {root} vanished"))?;
        let mut ctx = UnitCtx::new(self.comm, self.config, self.metrics, root);
        let more = unit
            .pull(&mut ctx)
            .with_context(|| format!("{} {root}: pull", unit.label()))?;
        let (out, closed) = ctx.into_outbox();
        self.forward(root, out, closed)?;
        Ok(more)
    }

    fn data(&mut self, to: UnitId, port: usize, batch: &dyn Any) -> Result<()> {
        let unit = self.g.units.get_mut(&to).ok_or_else(|| anyhow!("unit {to} vanished"))?;
        let mut ctx = UnitCtx::new(self.comm, self.config, self.metrics, to);
        unit.data(port, batch, &mut ctx)
            .with_context(|| format!("{} {to}: data on port {port}", unit.label()))?;
        let (out, closed) = ctx.into_outbox();
        self.forward(to, out, closed)
    }

    fn end(&mut self, to: UnitId, port: usize) -> Result<()> {
        let seen = self.ends.entry((to, port)).or_insert(0);
        *seen += 1;
        let seen = *seen;
        let expected = self.g.in_degree(to, port, self.scope);
        if seen < expected {
            return Ok(());
        }
        ensure!(seen == expected, "unit {to} port {port} closed {seen} times, expected {expected}");

        let unit = self.g.units.get_mut(&to).ok_or_else(|| anyhow!("unit {to} vanished"))?;
        let mut ctx = UnitCtx::new(self.comm, self.config, self.metrics, to);
        unit.end(port, &mut ctx)
            .with_context(|| format!("{} {to}: end on port {port}", unit.label()))?;
        let (out, closed) = ctx.into_outbox();
        self.forward(to, out, closed)
    }

    fn forward(&mut self, from: UnitId, out: Vec<Partition>, closed: bool) -> Result<()> {
        let next = self.g.successors(from);
        for batch in &out {
            for (to, port) in &next {
                self.data(*to, *port, &**batch)?;
            }
        }
        if closed {
            for (to, port) in next {
                self.end(to, port)?;
            }
        }
        Ok(())
    }
}
