//! Error conditions callers may want to match on.
//!
//! Most of the crate propagates `anyhow::Error` with context strings. The
//! variants here are the ones with a defined job-level meaning: a unit fed the
//! wrong row type, a rank group torn down by an abort, or a wire payload that
//! failed to decode. [`RunError::exit_code`] maps them onto the two abort codes
//! used by [`LocalCluster`](crate::comm::LocalCluster).

use thiserror::Error;

/// Exit code for a failure the job understands (an error value surfaced by a rank).
pub const EXIT_KNOWN: i32 = 1;

/// Exit code for a failure of unknown shape (a panicking rank).
pub const EXIT_UNKNOWN: i32 = 2;

#[derive(Debug, Error)]
pub enum RunError {
    /// A unit received a batch whose element type is not the one it was built for.
    #[error("unit {unit} expected rows of type {expected}")]
    TypeMismatch { unit: String, expected: &'static str },

    /// Some rank aborted the job; every other rank observes this on its next receive.
    #[error("job aborted by rank {rank} with code {code}")]
    Aborted { rank: usize, code: i32 },

    /// The channel to a peer rank closed before the exchange finished.
    #[error("rank {rank} disconnected during exchange")]
    Disconnected { rank: usize },

    /// A row batch could not be encoded or decoded.
    #[error("row codec: {0}")]
    Codec(String),
}

impl RunError {
    /// Exit code the job terminates with when this error reaches the outermost boundary.
    pub fn exit_code(&self) -> i32 {
        match self {
            RunError::Aborted { code, .. } => *code,
            _ => EXIT_KNOWN,
        }
    }
}

impl From<postcard::Error> for RunError {
    fn from(e: postcard::Error) -> Self {
        RunError::Codec(e.to_string())
    }
}
