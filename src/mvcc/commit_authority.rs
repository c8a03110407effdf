//! Commit Authority - commit version assignment
//!
//! - Commit versions are assigned exactly once, under the commit lock
//! - The ordering is total, strict, and replayable: WAL record N is
//!   the commit with version N
//! - A version is only marked committed after its WAL record is durable
//!   and the new tree is about to be published

use thiserror::Error;

use crate::mvcc::CommitId;

/// Tracks the highest assigned commit version.
///
/// Owned by the commit path; replay drives it through the same
/// `next_commit_id` / `mark_committed` pair as live commits.
#[derive(Debug, Default)]
pub struct CommitAuthority {
    highest_commit_id: u64,
}

impl CommitAuthority {
    /// Create a new commit authority starting from zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the next commit version to assign.
    ///
    /// Nothing is reserved: calling this twice without `mark_committed`
    /// returns the same version, which is what lets an aborted commit
    /// leave no gap.
    pub fn next_commit_id(&self) -> CommitId {
        CommitId::new(self.highest_commit_id + 1)
    }

    /// Mark a commit version as assigned.
    ///
    /// Returns an error unless `commit_id` is exactly the next version.
    pub fn mark_committed(&mut self, commit_id: CommitId) -> Result<(), CommitAuthorityError> {
        let id_value = commit_id.value();
        if id_value != self.highest_commit_id + 1 {
            return Err(CommitAuthorityError::OutOfOrder {
                attempted: id_value,
                expected: self.highest_commit_id + 1,
            });
        }
        self.highest_commit_id = id_value;
        Ok(())
    }

    /// Get the current highest commit version (`PENDING` for an empty store).
    pub fn highest_commit_id(&self) -> CommitId {
        CommitId::new(self.highest_commit_id)
    }
}

/// Errors from commit authority operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommitAuthorityError {
    /// Attempted to commit out of order.
    #[error("out of order commit: attempted {attempted} but expected {expected}")]
    OutOfOrder { attempted: u64, expected: u64 },
}
