//! The unit protocol.
//!
//! A [`Unit`] is one stage of a pipeline graph. The runner drives every unit
//! through the same three signals:
//!
//! - `pull`: roots only; produce the next batch of rows.
//! - `data(port, batch)`: a batch arrived on an input port.
//! - `end(port)`: every upstream edge of that port has closed.
//!
//! Units never talk to each other directly. Whatever they emit goes into the
//! [`UnitCtx`] outbox and the runner forwards it along the unit's out-edges,
//! lending each batch to every destination in turn. Calling
//! [`UnitCtx::close`] sends the end signal to all destinations after the
//! emitted batches.

use crate::comm::Communicator;
use crate::config::RunConfig;
use crate::metrics::RunMetrics;
use crate::par::Par;
use crate::proc_req::ProcReq;
use crate::type_token::{Partition, TypeTag, into_partition};
use crate::unit_id::UnitId;
use anyhow::Result;
use std::any::Any;

/// Role of a unit in scheduling.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UnitKind {
    /// Produces rows from nothing; gets its own ranks.
    Root,
    /// Stateless per-row stage; runs on its upstream's ranks.
    Link,
    /// Gets its own ranks and exchanges rows to reach them.
    Task,
    /// Consumes rows; runs on its upstream's ranks.
    Sink,
}

pub trait Unit: Send {
    fn kind(&self) -> UnitKind;

    /// Short human-readable name, used in logs and metrics.
    fn label(&self) -> String;

    /// Element type of the rows this unit emits.
    fn row_tag(&self) -> TypeTag;

    /// Number of input ports. Roots have none.
    fn ports(&self) -> usize {
        1
    }

    /// What ranks this unit asks for. Only consulted for roots and tasks.
    fn proc_req(&self) -> Option<&ProcReq> {
        None
    }

    /// Install the ranks for the coming run and reset per-run state.
    fn set_par(&mut self, par: Par);

    /// Produce the next batch. Returns `false` once exhausted (after closing).
    fn pull(&mut self, ctx: &mut UnitCtx<'_>) -> Result<bool> {
        ctx.close();
        Ok(false)
    }

    fn data(&mut self, port: usize, batch: &dyn Any, ctx: &mut UnitCtx<'_>) -> Result<()>;

    fn end(&mut self, port: usize, ctx: &mut UnitCtx<'_>) -> Result<()>;
}

/// What a unit sees of the run while handling a signal.
pub struct UnitCtx<'a> {
    comm: &'a dyn Communicator,
    config: &'a RunConfig,
    metrics: &'a mut RunMetrics,
    unit: UnitId,
    outbox: Vec<Partition>,
    closed: bool,
}

impl<'a> UnitCtx<'a> {
    pub fn new(
        comm: &'a dyn Communicator,
        config: &'a RunConfig,
        metrics: &'a mut RunMetrics,
        unit: UnitId,
    ) -> Self {
        Self { comm, config, metrics, unit, outbox: Vec::new(), closed: false }
    }

    pub fn comm(&self) -> &dyn Communicator {
        self.comm
    }

    pub fn config(&self) -> &RunConfig {
        self.config
    }

    pub fn unit(&self) -> UnitId {
        self.unit
    }

    /// Queue `rows` for delivery downstream. Empty batches are dropped.
    pub fn emit<T: Send + Sync + 'static>(&mut self, rows: Vec<T>) {
        if rows.is_empty() {
            return;
        }
        self.metrics.add_out(self.unit, rows.len());
        self.outbox.push(into_partition(rows));
    }

    /// Signal end-of-stream to every destination once the queued batches are delivered.
    pub fn close(&mut self) {
        self.closed = true;
    }

    pub fn record_in(&mut self, rows: usize) {
        self.metrics.add_in(self.unit, rows);
    }

    pub fn record_sent(&mut self, bytes: usize) {
        self.metrics.add_sent(self.unit, bytes);
    }

    pub fn record_received(&mut self, bytes: usize) {
        self.metrics.add_received(self.unit, bytes);
    }

    pub(crate) fn into_outbox(self) -> (Vec<Partition>, bool) {
        (self.outbox, self.closed)
    }
}
