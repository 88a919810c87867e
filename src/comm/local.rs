//! In-process rank groups.
//!
//! [`LocalCluster`] runs one closure per rank on its own thread. Ranks talk
//! through unbounded crossbeam channels, one inbox per rank. A failing rank
//! aborts the whole group: an `Err` maps to [`EXIT_KNOWN`], a panic to
//! [`EXIT_UNKNOWN`], and everyone blocked in a receive wakes up with
//! [`RunError::Aborted`].

use super::{Communicator, Packet, Stash};
use crate::error::{EXIT_KNOWN, EXIT_UNKNOWN, RunError};
use anyhow::{Result, anyhow};
use crossbeam_channel::{Receiver, Sender, unbounded};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex};
use std::thread;
use tracing::{debug, error};

enum Envelope {
    Data(Packet),
    Abort { rank: usize, code: i32 },
}

/// First abort wins; later ones are ignored.
#[derive(Default)]
struct AbortCell(Mutex<Option<(usize, i32)>>);

impl AbortCell {
    fn get(&self) -> Option<(usize, i32)> {
        *self.0.lock().expect("abort lock poisoned")
    }

    fn set(&self, rank: usize, code: i32) -> bool {
        let mut slot = self.0.lock().expect("abort lock poisoned");
        if slot.is_some() {
            return false;
        }
        *slot = Some((rank, code));
        true
    }
}

/// One rank's endpoint in a [`LocalCluster`].
pub struct ChannelComm {
    rank: usize,
    peers: Vec<Sender<Envelope>>,
    inbox: Receiver<Envelope>,
    stash: Stash,
    aborted: Arc<AbortCell>,
}

impl ChannelComm {
    fn aborted_err(&self) -> Option<RunError> {
        self.aborted
            .get()
            .map(|(rank, code)| RunError::Aborted { rank, code })
    }
}

impl Communicator for ChannelComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.peers.len()
    }

    fn send(&self, to: usize, packet: Packet) -> Result<(), RunError> {
        if let Some(e) = self.aborted_err() {
            return Err(e);
        }
        let peer = self.peers.get(to).ok_or(RunError::Disconnected { rank: to })?;
        peer.send(Envelope::Data(packet))
            .map_err(|_| RunError::Disconnected { rank: to })
    }

    fn recv(&self, tag: u32, from: usize) -> Result<Packet, RunError> {
        if let Some(packet) = self.stash.take(tag, from) {
            return Ok(packet);
        }
        loop {
            if let Some(e) = self.aborted_err() {
                return Err(e);
            }
            match self.inbox.recv() {
                Ok(Envelope::Data(p)) if p.tag == tag && p.from == from => return Ok(p),
                Ok(Envelope::Data(p)) => self.stash.keep(p),
                Ok(Envelope::Abort { rank, code }) => return Err(RunError::Aborted { rank, code }),
                Err(_) => return Err(RunError::Disconnected { rank: from }),
            }
        }
    }

    fn abort(&self, code: i32) {
        if !self.aborted.set(self.rank, code) {
            return;
        }
        error!(rank = self.rank, code, "aborting job");
        for peer in &self.peers {
            let _ = peer.send(Envelope::Abort { rank: self.rank, code });
        }
    }
}

/// A group of `size` ranks living as threads of the current process.
///
/// ```
/// use rankflow::comm::{Communicator, LocalCluster};
///
/// let ranks = LocalCluster::new(3).launch(|comm| Ok(comm.rank())).unwrap();
/// assert_eq!(ranks, vec![0, 1, 2]);
/// ```
#[derive(Clone, Debug)]
pub struct LocalCluster {
    size: usize,
}

impl Default for LocalCluster {
    /// One rank per logical CPU.
    fn default() -> Self {
        Self::new(num_cpus::get())
    }
}

impl LocalCluster {
    pub fn new(size: usize) -> Self {
        Self { size: size.max(1) }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Run `job` once per rank and collect the per-rank results in rank order.
    ///
    /// # Errors
    /// If any rank fails, the group is aborted and the error carries
    /// [`RunError::Aborted`] with the aborting rank and exit code.
    pub fn launch<F, R>(&self, job: F) -> Result<Vec<R>>
    where
        F: Fn(Arc<dyn Communicator>) -> Result<R> + Send + Sync,
        R: Send,
    {
        let (senders, receivers): (Vec<_>, Vec<_>) = (0..self.size).map(|_| unbounded()).unzip();
        let aborted = Arc::new(AbortCell::default());
        let job = &job;

        let results: Vec<Option<R>> = thread::scope(|s| {
            let handles: Vec<_> = receivers
                .into_iter()
                .enumerate()
                .map(|(rank, inbox)| {
                    let comm = Arc::new(ChannelComm {
                        rank,
                        peers: senders.clone(),
                        inbox,
                        stash: Stash::default(),
                        aborted: Arc::clone(&aborted),
                    });
                    s.spawn(move || run_rank(rank, comm, job))
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().ok().flatten())
                .collect()
        });

        if let Some((rank, code)) = aborted.get() {
            return Err(anyhow!(RunError::Aborted { rank, code }));
        }
        results
            .into_iter()
            .enumerate()
            .map(|(rank, r)| r.ok_or_else(|| anyhow!("rank {rank} produced no result")))
            .collect()
    }
}

fn run_rank<F, R>(rank: usize, comm: Arc<ChannelComm>, job: &F) -> Option<R>
where
    F: Fn(Arc<dyn Communicator>) -> Result<R> + Send + Sync,
{
    let handle: Arc<dyn Communicator> = comm.clone();
    match catch_unwind(AssertUnwindSafe(|| job(handle))) {
        Ok(Ok(out)) => {
            debug!(rank, "rank finished");
            Some(out)
        }
        Ok(Err(e)) => {
            let code = match e.downcast_ref::<RunError>() {
                // someone else already tore the job down
                Some(RunError::Aborted { .. }) => return None,
                Some(other) => other.exit_code(),
                None => EXIT_KNOWN,
            };
            error!(rank, "{e:#}");
            comm.abort(code);
            None
        }
        Err(_) => {
            error!(rank, "rank panicked");
            comm.abort(EXIT_UNKNOWN);
            None
        }
    }
}
