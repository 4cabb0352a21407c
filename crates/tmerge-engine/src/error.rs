//! Error taxonomy for merge operations.
//!
//! Only [`ValidationError`] and fatal store failures stop a merge. A
//! [`ConfigurationError`] is reported once and the merge carries on without
//! the affected field or capability, and a [`BranchError`] is recorded
//! against its branch while the remaining branches are processed.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tmerge_store::{LockError, StoreError};
use tmerge_types::{FieldName, TermId, VocabularyId};

/// Reasons a merge is rejected before anything is touched.
#[derive(Clone, Debug, Error, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationError {
    /// The trunk is one of the branches, or a descendant of one.
    #[error("trunk {trunk} is branch {branch} or one of its descendants")]
    TrunkIsBranchOrDescendant { trunk: TermId, branch: TermId },

    #[error("trunk term {0} does not exist")]
    TrunkNotFound(TermId),

    /// A branch belongs to a different vocabulary than the trunk.
    #[error("branch {branch} belongs to vocabulary {vocabulary}, not the trunk's")]
    VocabularyMismatch {
        branch: TermId,
        vocabulary: VocabularyId,
    },

    #[error("no branch terms were given")]
    EmptyBranchSet,
}

/// Optional collaborators a merge may ask for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    Redirect,
    Synonym,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Redirect => f.write_str("redirect"),
            Self::Synonym => f.write_str("synonym"),
        }
    }
}

/// Settings that do not fit the trunk's bundle or the available
/// collaborators. Each is reported once per merge.
#[derive(Clone, Debug, Error, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigurationError {
    /// A configured field is not a mergeable (non-base) field of the
    /// trunk's bundle.
    #[error("field {field} is not a mergeable field of bundle {bundle}")]
    MissingField {
        bundle: VocabularyId,
        field: FieldName,
    },

    /// The settings ask for a capability that was not supplied.
    #[error("{0} capability is not available; the setting is ignored")]
    CapabilityUnavailable(Capability),
}

/// Where in the per-branch pipeline a failure happened.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BranchStage {
    Load,
    Consolidate,
    MergeFields,
    MergeSynonyms,
    Dispose,
}

impl fmt::Display for BranchStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Load => "load",
            Self::Consolidate => "consolidate",
            Self::MergeFields => "merge fields",
            Self::MergeSynonyms => "merge synonyms",
            Self::Dispose => "dispose",
        };
        f.write_str(name)
    }
}

/// A store failure tied to a single branch.
#[derive(Debug, Error)]
#[error("branch {branch} failed during {stage}: {source}")]
pub struct BranchError {
    pub branch: TermId,
    pub stage: BranchStage,
    #[source]
    pub source: StoreError,
}

impl BranchError {
    pub fn new(branch: TermId, stage: BranchStage, source: StoreError) -> Self {
        Self {
            branch,
            stage,
            source,
        }
    }

    /// A fatal cause means the store itself is gone, not just this branch.
    pub fn is_fatal(&self) -> bool {
        self.source.is_fatal()
    }
}

/// Errors that stop a merge operation as a whole.
#[derive(Debug, Error)]
pub enum MergeError {
    #[error("merge rejected: {0}")]
    Validation(#[from] ValidationError),

    /// The store failed in a way that makes further work pointless.
    #[error("store failure: {0}")]
    Fatal(StoreError),

    #[error("cancelled")]
    Cancelled,

    #[error("could not lock vocabulary: {0}")]
    Locked(#[from] LockError),
}

/// Convenience alias for operations that can stop a merge.
pub type MergeResult<T> = Result<T, MergeError>;

/// Errors loading [`MergeSettings`](crate::MergeSettings) from TOML.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid settings: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("could not serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),
}
