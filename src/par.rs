//! Resolved process assignment.

/// The ranks a unit runs on for one run, handed out by the scheduler.
///
/// Besides the rank list, a `Par` knows where the current rank sits in that
/// list (if at all) and carries three communication tags so that exchanges of
/// different units, or of the same unit in consecutive runs, never match each
/// other's packets.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct Par {
    ranks: Vec<usize>,
    tags: [u32; 3],
    rank: usize,
    pos: Option<usize>,
}

impl Par {
    pub fn new(ranks: Vec<usize>, tags: [u32; 3], rank: usize) -> Self {
        let pos = ranks.iter().position(|&r| r == rank);
        Self { ranks, tags, rank, pos }
    }

    /// Whether the current rank is one of the assigned ranks.
    #[inline]
    pub fn in_range(&self) -> bool {
        self.pos.is_some()
    }

    /// Position of the current rank within [`ranks`](Self::ranks), `None` when not in range.
    #[inline]
    pub fn pos(&self) -> Option<usize> {
        self.pos
    }

    #[inline]
    pub fn n_proc(&self) -> usize {
        self.ranks.len()
    }

    #[inline]
    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn ranks(&self) -> &[usize] {
        &self.ranks
    }

    pub fn tags(&self) -> [u32; 3] {
        self.tags
    }

    #[inline]
    pub fn tag(&self, i: usize) -> u32 {
        self.tags[i]
    }

    pub fn iter(&self) -> impl Iterator<Item = &usize> {
        self.ranks.iter()
    }
}
