//! Logging setup.
//!
//! The crate logs through `tracing` with a `rank` field on every event. Call
//! [`init_logging`] once per process to install a `tracing-subscriber` fmt
//! layer; `RANKFLOW_LOG` (an `EnvFilter` directive) takes precedence over the
//! level derived from the [`LogMode`].

use std::ops::{BitOr, BitOrAssign};
use tracing_subscriber::EnvFilter;

/// Message classes the scheduler reports.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LogMode(u8);

impl LogMode {
    pub const NONE: LogMode = LogMode(0x00);
    pub const INFO: LogMode = LogMode(0x01);
    pub const WARNING: LogMode = LogMode(0x02);
    pub const ERROR: LogMode = LogMode(0x04);
    pub const ALL: LogMode = LogMode(0x07);

    #[inline]
    pub fn contains(self, other: LogMode) -> bool {
        self.0 & other.0 != 0
    }

    fn directive(self) -> &'static str {
        if self.contains(LogMode::INFO) {
            "rankflow=info"
        } else if self.contains(LogMode::WARNING) {
            "rankflow=warn"
        } else if self.contains(LogMode::ERROR) {
            "rankflow=error"
        } else {
            "rankflow=off"
        }
    }
}

impl BitOr for LogMode {
    type Output = LogMode;
    fn bitor(self, rhs: LogMode) -> LogMode {
        LogMode(self.0 | rhs.0)
    }
}

impl BitOrAssign for LogMode {
    fn bitor_assign(&mut self, rhs: LogMode) {
        self.0 |= rhs.0;
    }
}

/// Install a global fmt subscriber writing to stderr.
///
/// A second call (or a subscriber installed elsewhere) is ignored.
pub fn init_logging(mode: LogMode) {
    let filter = EnvFilter::try_from_env("RANKFLOW_LOG")
        .unwrap_or_else(|_| EnvFilter::new(mode.directive()));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
