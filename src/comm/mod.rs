//! Rank-to-rank transport.
//!
//! A [`Communicator`] is the fixed-size rank group a job runs in. It offers
//! point-to-point packet delivery matched on `(tag, from)` and a job-wide
//! abort; the collective exchange used by bridges is built on top of it in
//! [`units::bridge`](crate::units::bridge).
//!
//! Two implementations ship with the crate:
//! - [`Solo`]: a one-rank group, for running a pipeline in a single thread.
//! - [`LocalCluster`]: `n` ranks as threads of one process, connected by
//!   crossbeam channels.

mod local;

pub use local::{ChannelComm, LocalCluster};

use crate::error::RunError;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use tracing::error;

/// One unit of transfer between ranks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Packet {
    /// Exchange tag; packets are only matched by receives using the same tag.
    pub tag: u32,
    /// Sending rank.
    pub from: usize,
    /// Encoded rows; empty means "no rows".
    pub payload: Vec<u8>,
    /// Final packet of this sender for this tag.
    pub last: bool,
}

impl Packet {
    pub fn new(tag: u32, from: usize, payload: Vec<u8>, last: bool) -> Self {
        Self { tag, from, payload, last }
    }
}

/// A fixed-size group of ranks.
pub trait Communicator: Send + Sync {
    fn rank(&self) -> usize;

    fn size(&self) -> usize;

    /// Deliver `packet` to rank `to`. Never blocks.
    fn send(&self, to: usize, packet: Packet) -> Result<(), RunError>;

    /// Block until a packet with `tag` from rank `from` is available.
    ///
    /// Packets for other `(tag, from)` pairs that arrive meanwhile are kept
    /// for later receives, in arrival order.
    fn recv(&self, tag: u32, from: usize) -> Result<Packet, RunError>;

    /// Tear down the whole job with `code`. Every rank observes
    /// [`RunError::Aborted`] on its next receive.
    fn abort(&self, code: i32);
}

/// Packets received but not yet asked for, keyed by `(tag, from)`.
#[derive(Default)]
pub(crate) struct Stash {
    pending: Mutex<HashMap<(u32, usize), VecDeque<Packet>>>,
}

impl Stash {
    pub(crate) fn take(&self, tag: u32, from: usize) -> Option<Packet> {
        let mut pending = self.pending.lock().expect("stash lock poisoned");
        let queue = pending.get_mut(&(tag, from))?;
        let packet = queue.pop_front();
        if queue.is_empty() {
            pending.remove(&(tag, from));
        }
        packet
    }

    pub(crate) fn keep(&self, packet: Packet) {
        self.pending
            .lock()
            .expect("stash lock poisoned")
            .entry((packet.tag, packet.from))
            .or_default()
            .push_back(packet);
    }
}

/// The one-rank group.
#[derive(Default)]
pub struct Solo {
    stash: Stash,
    aborted: Mutex<Option<i32>>,
}

impl Solo {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Communicator for Solo {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn send(&self, to: usize, packet: Packet) -> Result<(), RunError> {
        if to != 0 {
            return Err(RunError::Disconnected { rank: to });
        }
        self.stash.keep(packet);
        Ok(())
    }

    fn recv(&self, tag: u32, from: usize) -> Result<Packet, RunError> {
        if let Some(code) = *self.aborted.lock().expect("abort lock poisoned") {
            return Err(RunError::Aborted { rank: 0, code });
        }
        // a single rank has nobody else to wait for
        self.stash
            .take(tag, from)
            .ok_or(RunError::Disconnected { rank: from })
    }

    fn abort(&self, code: i32) {
        error!(rank = 0, code, "aborting job");
        self.aborted
            .lock()
            .expect("abort lock poisoned")
            .get_or_insert(code);
    }
}
