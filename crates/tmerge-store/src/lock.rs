//! Advisory locking collaborator.
//!
//! Two merges must not run at the same time against overlapping terms. The
//! engine does not implement locking itself; it acquires a lock keyed by
//! vocabulary through [`MergeLock`] before validation and releases it once
//! the operation reaches a terminal state. Deployments plug in whatever
//! mechanism they have (a database row lock, a distributed lease, ...).

use tmerge_types::VocabularyId;

use crate::error::LockError;

/// Advisory lock keyed by vocabulary id.
pub trait MergeLock: Send + Sync {
    /// Take the lock, failing with [`LockError::Held`] if another merge has it.
    fn acquire(&self, vocabulary: &VocabularyId) -> Result<(), LockError>;

    /// Give the lock back. Releasing a lock that is not held is a no-op.
    fn release(&self, vocabulary: &VocabularyId);
}

/// A lock that always succeeds, for single-process tools where no other
/// merge can be running.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoLock;

impl MergeLock for NoLock {
    fn acquire(&self, _vocabulary: &VocabularyId) -> Result<(), LockError> {
        Ok(())
    }

    fn release(&self, _vocabulary: &VocabularyId) {}
}
