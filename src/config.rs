//! Run configuration.
//!
//! [`RunConfig`] collects the knobs of the scheduler and the exchange layer.
//! Values come from `Default`, optionally overridden from the environment with
//! [`RunConfig::from_env`]:
//!
//! | Variable | Field |
//! |---|---|
//! | `RANKFLOW_PRLL_RATIO` | `prll_ratio` |
//! | `RANKFLOW_PERSIST_LOAD` | `persist_load` (`1`/`true`/`yes`) |
//! | `RANKFLOW_ORDERED_BATCH` | `ordered_batch_rows` |

use crate::logging::LogMode;
use std::env;

/// Knobs shared by every run executed through a [`Context`](crate::runner::Context).
#[derive(Clone, Debug)]
pub struct RunConfig {
    /// Share of the data-holding ranks a task gets when it asks for nothing explicit.
    pub prll_ratio: f64,
    /// Carry rank load over from one run to the next. When off, every run
    /// starts from an idle cluster and allocation no longer depends on run history.
    pub persist_load: bool,
    /// In ordered exchanges, rows buffered per destination before an eager send.
    pub ordered_batch_rows: usize,
    /// Which scheduler messages to emit.
    pub log_mode: LogMode,
    /// Decode received batches on the rayon pool.
    pub parallel_decode: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            prll_ratio: 0.5,
            persist_load: true,
            ordered_batch_rows: 1,
            log_mode: LogMode::ERROR | LogMode::WARNING,
            parallel_decode: cfg!(feature = "parallel-decode"),
        }
    }
}

impl RunConfig {
    /// Defaults overridden by `RANKFLOW_*` environment variables; malformed values are ignored.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Some(r) = env::var("RANKFLOW_PRLL_RATIO")
            .ok()
            .and_then(|v| v.parse::<f64>().ok())
            .filter(|r| *r > 0.0 && *r <= 1.0)
        {
            cfg.prll_ratio = r;
        }
        if let Ok(v) = env::var("RANKFLOW_PERSIST_LOAD") {
            let v = v.to_ascii_lowercase();
            cfg.persist_load = v == "1" || v == "true" || v == "yes";
        }
        if let Some(n) = env::var("RANKFLOW_ORDERED_BATCH")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
        {
            cfg.ordered_batch_rows = n.max(1);
        }
        cfg
    }
}
