//! CommitId - Totally ordered commit version
//!
//! - Every committed row version carries the CommitId of its commit
//! - Commit ids are strictly increasing and never reused
//! - `CommitId::PENDING` (0) marks uncommitted delta entries; the first
//!   real commit is 1

/// Version number assigned to a commit.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct CommitId(u64);

impl CommitId {
    /// Version carried by delta entries until commit stamps them, and the
    /// version of an empty store.
    pub const PENDING: CommitId = CommitId(0);

    #[inline]
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    #[inline]
    pub fn value(&self) -> u64 {
        self.0
    }

    /// The commit id following this one.
    #[inline]
    pub fn next(&self) -> CommitId {
        CommitId(self.0 + 1)
    }

    #[inline]
    pub fn is_pending(&self) -> bool {
        self.0 == 0
    }
}

impl std::fmt::Display for CommitId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}", self.0)
    }
}
