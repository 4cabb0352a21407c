//! Operation identity, state, progress and the terminal report.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tmerge_engine::{BranchError, BranchOutcome, BranchStage, ConfigurationError, MergeError, ValidationError};
use tmerge_types::TermId;

/// Unique identifier for a merge operation (UUID v7, so ids sort by start time).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationId(uuid::Uuid);

impl OperationId {
    pub fn new() -> Self {
        Self(uuid::Uuid::now_v7())
    }

    pub fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }

    /// First 8 characters, for log lines and terminal output.
    pub fn short_id(&self) -> String {
        self.0.to_string()[..8].to_string()
    }
}

impl Default for OperationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OperationId({})", self.short_id())
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where an operation is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationState {
    Idle,
    Validating,
    Running,
    /// Every branch merged.
    Completed,
    /// Every branch was attempted and at least one failed.
    CompletedWithErrors,
    /// Rejected, aborted, or cancelled. Work done before the stop remains.
    Failed,
}

impl OperationState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::CompletedWithErrors | Self::Failed)
    }
}

impl fmt::Display for OperationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Validating => "validating",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::CompletedWithErrors => "completed with errors",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Why an operation ended in [`OperationState::Failed`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FailureReason {
    Validation(ValidationError),
    /// The store became unusable; the remaining chunks were not run.
    Fatal(String),
    Cancelled,
    Locked(String),
    /// The scheduler stopped before every chunk reported back.
    Interrupted,
}

impl From<MergeError> for FailureReason {
    fn from(err: MergeError) -> Self {
        match err {
            MergeError::Validation(e) => Self::Validation(e),
            MergeError::Fatal(e) => Self::Fatal(e.to_string()),
            MergeError::Cancelled => Self::Cancelled,
            MergeError::Locked(e) => Self::Locked(e.to_string()),
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation(e) => write!(f, "{e}"),
            Self::Fatal(e) => write!(f, "store failure: {e}"),
            Self::Cancelled => f.write_str("cancelled"),
            Self::Locked(e) => write!(f, "{e}"),
            Self::Interrupted => f.write_str("interrupted before all chunks ran"),
        }
    }
}

/// A branch that could not be merged.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchFailure {
    pub branch: TermId,
    pub stage: BranchStage,
    pub message: String,
}

impl From<&BranchError> for BranchFailure {
    fn from(err: &BranchError) -> Self {
        Self {
            branch: err.branch,
            stage: err.stage,
            message: err.source.to_string(),
        }
    }
}

/// A point-in-time view of a running operation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeProgress {
    pub state: OperationState,
    /// Branches attempted so far, merged or failed.
    pub processed: usize,
    pub total: usize,
    pub chunks_run: usize,
    pub errors: Vec<BranchFailure>,
}

impl MergeProgress {
    /// Share of branches attempted, from 0.0 to 1.0. An empty merge is done.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.processed as f64 / self.total as f64
        }
    }
}

/// Terminal report of a merge operation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MergeReport {
    pub operation: OperationId,
    pub trunk: TermId,
    /// Canonical path of the trunk, where a caller goes after the merge.
    pub trunk_path: String,
    pub state: OperationState,
    pub processed: usize,
    pub total: usize,
    pub chunks_run: usize,
    pub merged: Vec<BranchOutcome>,
    pub errors: Vec<BranchFailure>,
    pub configuration_errors: Vec<ConfigurationError>,
    pub failure: Option<FailureReason>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl MergeReport {
    /// `true` for both completed states.
    pub fn is_success(&self) -> bool {
        matches!(
            self.state,
            OperationState::Completed | OperationState::CompletedWithErrors
        )
    }

    /// One-line message for the person who asked for the merge.
    pub fn summary(&self) -> String {
        match (&self.state, &self.failure) {
            (OperationState::Completed, _) => "The terms have been successfully merged.".to_string(),
            (OperationState::CompletedWithErrors, _) => format!(
                "The terms have been merged, but {} of {} branch terms failed.",
                self.errors.len(),
                self.total
            ),
            (_, Some(reason)) => format!(
                "The merge failed after {} of {} branch terms: {reason}.",
                self.processed, self.total
            ),
            (state, None) => format!("The merge is {state}."),
        }
    }

    pub fn trunk_path(&self) -> &str {
        &self.trunk_path
    }

    /// Wall-clock time between start and terminal state.
    pub fn elapsed(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }

    /// Progress as of the terminal state.
    pub fn progress(&self) -> MergeProgress {
        MergeProgress {
            state: self.state,
            processed: self.processed,
            total: self.total,
            chunks_run: self.chunks_run,
            errors: self.errors.clone(),
        }
    }
}
