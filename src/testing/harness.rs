//! Driving a single unit by hand.
//!
//! [`UnitHarness`] feeds batches and end signals straight into one unit on a
//! one-rank communicator and collects what it emits, with no pipeline or
//! scheduler involved. Handy for checking a unit's state between signals.

use crate::comm::Solo;
use crate::config::RunConfig;
use crate::metrics::RunMetrics;
use crate::par::Par;
use crate::type_token::Partition;
use crate::unit::{Unit, UnitCtx};
use crate::unit_id::UnitId;
use anyhow::{Result, anyhow};

/// Holds one unit and everything it emitted so far.
///
/// # Example
///
/// ```
/// use rankflow::testing::UnitHarness;
/// use rankflow::units::stateless::Map;
///
/// # fn main() -> anyhow::Result<()> {
/// let mut h = UnitHarness::new(Map::<u32, u32, _>::new(|x: &u32| x + 1));
/// h.feed(0, vec![1u32, 2])?;
/// h.end(0)?;
/// assert_eq!(h.take::<u32>()?, vec![2, 3]);
/// assert!(h.closed());
/// # Ok(())
/// # }
/// ```
pub struct UnitHarness<U> {
    unit: U,
    comm: Solo,
    config: RunConfig,
    metrics: RunMetrics,
    emitted: Vec<Partition>,
    closed: bool,
}

impl<U: Unit> UnitHarness<U> {
    /// Wrap `unit`, running on rank 0 alone.
    pub fn new(mut unit: U) -> Self {
        unit.set_par(Par::new(vec![0], [1, 2, 3], 0));
        Self {
            unit,
            comm: Solo::new(),
            config: RunConfig::default(),
            metrics: RunMetrics::default(),
            emitted: Vec::new(),
            closed: false,
        }
    }

    pub fn unit(&self) -> &U {
        &self.unit
    }

    fn signal(&mut self, f: impl FnOnce(&mut U, &mut UnitCtx<'_>) -> Result<()>) -> Result<()> {
        let mut ctx = UnitCtx::new(&self.comm, &self.config, &mut self.metrics, UnitId::new(0));
        f(&mut self.unit, &mut ctx)?;
        let (out, closed) = ctx.into_outbox();
        self.emitted.extend(out);
        self.closed |= closed;
        Ok(())
    }

    pub fn feed<T: Send + Sync + 'static>(&mut self, port: usize, rows: Vec<T>) -> Result<()> {
        self.signal(|u, ctx| u.data(port, &rows, ctx))
    }

    pub fn end(&mut self, port: usize) -> Result<()> {
        self.signal(|u, ctx| u.end(port, ctx))
    }

    /// Everything emitted since the last call, flattened in emission order.
    pub fn take<T: Clone + 'static>(&mut self) -> Result<Vec<T>> {
        let mut out = Vec::new();
        for batch in self.emitted.drain(..) {
            let rows = batch
                .downcast_ref::<Vec<T>>()
                .ok_or_else(|| anyhow!("emitted batch is not a Vec<{}>", std::any::type_name::<T>()))?;
            out.extend_from_slice(rows);
        }
        Ok(out)
    }

    /// Whether the unit has signalled end-of-stream.
    pub fn closed(&self) -> bool {
        self.closed
    }
}
