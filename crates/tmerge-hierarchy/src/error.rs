//! Error types for hierarchy queries and trunk selection.

use thiserror::Error;
use tmerge_store::StoreError;
use tmerge_types::{TermId, VocabularyId};

#[derive(Debug, Error)]
pub enum HierarchyError {
    #[error(transparent)]
    Store(#[from] StoreError),

    /// No term with this name exists in the vocabulary.
    #[error("there are no terms with name {name:?} in the {vocabulary} vocabulary")]
    UnknownName { name: String, vocabulary: VocabularyId },

    /// Several terms share the name; the caller must pick by id.
    #[error("name {name:?} matches several terms: {candidates:?}")]
    AmbiguousName { name: String, candidates: Vec<TermId> },

    /// The term exists but is one of the branches or lies below one.
    #[error("term {0} cannot be the trunk: it is a branch term or a child of one")]
    NotACandidate(TermId),

    #[error("unknown trunk widget: {0} (expected select or autocomplete)")]
    UnknownWidget(String),

    #[error("invalid term id: {0}")]
    InvalidTermId(String),
}

/// Convenience alias for hierarchy results.
pub type HierarchyResult<T> = Result<T, HierarchyError>;
