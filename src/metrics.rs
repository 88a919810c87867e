//! Per-run execution statistics.
//!
//! Every run returns a [`RunMetrics`] for the calling rank: rows in and out of
//! each unit, bytes moved by exchanges, the ranks each unit was assigned, and
//! wall time. The numbers are local to one rank; combine them across ranks
//! yourself if you need job totals.
//!
//! # Example
//!
//! ```no_run
//! use rankflow::*;
//!
//! # fn main() -> anyhow::Result<()> {
//! let p = Pipeline::default();
//! let mut ctx = Context::solo();
//! let out = rise(&p, FromMem::new(vec![1u32, 2, 3])).map(|x: &u32| x * 2);
//! let metrics = out.run(&mut ctx, ProcReq::inherit())?;
//! metrics.print();
//! metrics.save_to_file("metrics.json")?;
//! # Ok(())
//! # }
//! ```

use crate::unit_id::UnitId;
use anyhow::Result;
use serde::Serialize;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::time::Duration;

/// Counters of a single unit on a single rank.
#[derive(Clone, Debug, Default, Serialize, PartialEq, Eq)]
pub struct UnitStats {
    pub label: String,
    pub ranks: Vec<usize>,
    pub rows_in: u64,
    pub rows_out: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
}

/// Statistics of one run on one rank.
#[derive(Clone, Debug, Default)]
pub struct RunMetrics {
    rank: usize,
    units: BTreeMap<UnitId, UnitStats>,
    elapsed: Duration,
}

impl RunMetrics {
    pub(crate) fn new(rank: usize) -> Self {
        Self { rank, ..Self::default() }
    }

    pub(crate) fn register(&mut self, id: UnitId, label: String, ranks: &[usize]) {
        let stats = self.units.entry(id).or_default();
        stats.label = label;
        stats.ranks = ranks.to_vec();
    }

    pub(crate) fn add_in(&mut self, id: UnitId, rows: usize) {
        self.units.entry(id).or_default().rows_in += rows as u64;
    }

    pub(crate) fn add_out(&mut self, id: UnitId, rows: usize) {
        self.units.entry(id).or_default().rows_out += rows as u64;
    }

    pub(crate) fn add_sent(&mut self, id: UnitId, bytes: usize) {
        self.units.entry(id).or_default().bytes_sent += bytes as u64;
    }

    pub(crate) fn add_received(&mut self, id: UnitId, bytes: usize) {
        self.units.entry(id).or_default().bytes_received += bytes as u64;
    }

    pub(crate) fn set_elapsed(&mut self, elapsed: Duration) {
        self.elapsed = elapsed;
    }

    #[must_use]
    pub fn rank(&self) -> usize {
        self.rank
    }

    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Counters of one unit, if it took part in the run.
    #[must_use]
    pub fn unit(&self, id: UnitId) -> Option<&UnitStats> {
        self.units.get(&id)
    }

    pub fn units(&self) -> impl Iterator<Item = (UnitId, &UnitStats)> {
        self.units.iter().map(|(id, s)| (*id, s))
    }

    /// Bytes this rank pushed into exchanges, over all units.
    #[must_use]
    pub fn total_bytes_sent(&self) -> u64 {
        self.units.values().map(|s| s.bytes_sent).sum()
    }

    #[must_use]
    pub fn to_json(&self) -> Value {
        let units: serde_json::Map<String, Value> = self
            .units
            .iter()
            .map(|(id, s)| (id.raw().to_string(), json!(s)))
            .collect();
        json!({
            "rank": self.rank,
            "execution_time_ms": self.elapsed.as_millis() as u64,
            "units": units,
        })
    }

    /// Print a human-readable table to stdout.
    pub fn print(&self) {
        println!("\n========== Run Metrics (rank {}) ==========", self.rank);
        println!(
            "Execution Time: {:.3}s ({} ms)",
            self.elapsed.as_secs_f64(),
            self.elapsed.as_millis()
        );
        println!("-------------------------------------------");
        for (id, s) in &self.units {
            println!(
                "{id} {}: in={} out={} sent={}B recv={}B ranks={:?}",
                s.label, s.rows_in, s.rows_out, s.bytes_sent, s.bytes_received, s.ranks
            );
        }
        println!("===========================================\n");
    }

    /// Save the JSON form to `path`.
    ///
    /// # Errors
    ///
    /// If the file cannot be created or written to.
    pub fn save_to_file(&self, path: &str) -> Result<()> {
        let mut file = File::create(path)?;
        let formatted = serde_json::to_string_pretty(&self.to_json())?;
        file.write_all(formatted.as_bytes())?;
        Ok(())
    }
}
