//! Declarative process requests.
//!
//! A [`ProcReq`] says how many ranks a task wants, or which ones, and how the
//! rows reaching it should be spread. The [`Scheduler`](crate::scheduler::Scheduler)
//! resolves it into a concrete [`Par`](crate::par::Par) at the start of every run.
//!
//! ```
//! use rankflow::proc_req::{LlMode, ProcReq};
//!
//! // two thirds of the parent's ranks, chosen by availability rather than locality
//! let req = ProcReq::ratio(0.66).mode(LlMode::TASK);
//! assert!(req.is_task());
//!
//! // explicit ranks, with every row delivered to each of them
//! let req = ProcReq::ranks(vec![0, 2, 4]).mode(LlMode::ALL | LlMode::TASK);
//! assert!(req.is_all() && req.is_task());
//! ```

use std::fmt::{Display, Formatter, Result as FormatResult};
use std::ops::{BitOr, BitOrAssign};

/// How many ranks a request asks for.
#[derive(Clone, Debug, PartialEq, Default)]
pub enum ProcCount {
    /// No explicit size: inherit according to the scheduler's default policy.
    #[default]
    Inherit,
    /// Exactly this many ranks (`0` is treated as `1`).
    Count(usize),
    /// A fraction of the ranks the request is resolved against.
    Ratio(f64),
    /// These ranks, intersected with the ranks available.
    Ranks(Vec<usize>),
}

/// Distribution flags attached to a request.
///
/// - `TASK`: allocate by availability, ignoring where the data already is.
/// - `SHARD`: spread rows without a key, round robin.
/// - `ALL`: spread to every available rank, and deliver every row to each of them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Hash)]
pub struct LlMode(u8);

impl LlMode {
    pub const NONE: LlMode = LlMode(0x00);
    pub const TASK: LlMode = LlMode(0x01);
    pub const SHARD: LlMode = LlMode(0x02);
    pub const ALL: LlMode = LlMode(0x04);

    #[inline]
    pub fn contains(self, other: LlMode) -> bool {
        other.0 != 0 && self.0 & other.0 == other.0
    }
}

impl BitOr for LlMode {
    type Output = LlMode;
    fn bitor(self, rhs: LlMode) -> LlMode {
        LlMode(self.0 | rhs.0)
    }
}

impl BitOrAssign for LlMode {
    fn bitor_assign(&mut self, rhs: LlMode) {
        self.0 |= rhs.0;
    }
}

/// A request for ranks, consumed by the scheduler once per run.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct ProcReq {
    count: ProcCount,
    mode: LlMode,
}

impl ProcReq {
    /// Unspecified size; the scheduler decides.
    pub fn inherit() -> Self {
        Self::default()
    }

    pub fn count(n: usize) -> Self {
        Self { count: ProcCount::Count(n), mode: LlMode::NONE }
    }

    pub fn ratio(r: f64) -> Self {
        Self { count: ProcCount::Ratio(r), mode: LlMode::NONE }
    }

    pub fn ranks(ranks: Vec<usize>) -> Self {
        Self { count: ProcCount::Ranks(ranks), mode: LlMode::NONE }
    }

    /// Add distribution flags to the request.
    pub fn mode(mut self, mode: LlMode) -> Self {
        self.mode |= mode;
        self
    }

    /// Cap the request at `n` ranks, keeping its flags. A rank list keeps
    /// its first `n` entries.
    pub fn resize(mut self, n: usize) -> Self {
        self.count = match self.count {
            ProcCount::Ranks(mut ranks) => {
                ranks.truncate(n);
                ProcCount::Ranks(ranks)
            }
            _ => ProcCount::Count(n),
        };
        self
    }

    pub fn size(&self) -> &ProcCount {
        &self.count
    }

    pub fn flags(&self) -> LlMode {
        self.mode
    }

    pub fn is_task(&self) -> bool {
        self.mode.contains(LlMode::TASK)
    }

    pub fn is_shard(&self) -> bool {
        self.mode.contains(LlMode::SHARD)
    }

    pub fn is_all(&self) -> bool {
        self.mode.contains(LlMode::ALL)
    }
}

impl From<usize> for ProcReq {
    fn from(n: usize) -> Self {
        ProcReq::count(n)
    }
}

impl From<f64> for ProcReq {
    fn from(r: f64) -> Self {
        ProcReq::ratio(r)
    }
}

impl From<Vec<usize>> for ProcReq {
    fn from(ranks: Vec<usize>) -> Self {
        ProcReq::ranks(ranks)
    }
}

impl Display for ProcReq {
    fn fmt(&self, f: &mut Formatter<'_>) -> FormatResult {
        match &self.count {
            ProcCount::Inherit => write!(f, "inherit")?,
            ProcCount::Count(n) => write!(f, "count({n})")?,
            ProcCount::Ratio(r) => write!(f, "ratio({r})")?,
            ProcCount::Ranks(v) => write!(f, "ranks({v:?})")?,
        }
        if self.is_task() {
            write!(f, "+task")?;
        }
        if self.is_shard() {
            write!(f, "+shard")?;
        }
        if self.is_all() {
            write!(f, "+all")?;
        }
        Ok(())
    }
}
