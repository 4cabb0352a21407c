//! Error types for store operations.

use thiserror::Error;
use tmerge_types::{EntityId, FieldName, TermId, VocabularyId};

/// Errors that can occur while talking to the term/entity store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store cannot be reached at all. Nothing further can succeed.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The term does not exist.
    #[error("term not found: {0}")]
    TermNotFound(TermId),

    /// The entity does not exist.
    #[error("entity not found: {0}")]
    EntityNotFound(EntityId),

    /// The field is not defined on the bundle.
    #[error("field {field} is not defined on bundle {bundle}")]
    FieldNotDefined {
        bundle: VocabularyId,
        field: FieldName,
    },

    /// A backend rejected a single operation.
    #[error("backend error: {0}")]
    Backend(String),

    /// A snapshot could not be loaded or is inconsistent.
    #[error("snapshot error: {0}")]
    Snapshot(String),

    /// I/O error while reading or writing a snapshot.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Returns `true` if the error means the store as a whole is unusable,
    /// as opposed to a failure tied to one term, entity or field.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// Convenience type alias for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Errors from the advisory merge lock collaborator.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LockError {
    /// Another merge already holds the lock for this vocabulary.
    #[error("vocabulary {0} is locked by another merge")]
    Held(VocabularyId),

    /// The lock backend failed.
    #[error("lock backend error: {0}")]
    Backend(String),
}
