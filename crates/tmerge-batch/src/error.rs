//! Error types for the batch layer.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BatchError {
    /// A tokio scheduler was requested outside of a tokio runtime.
    #[error("no tokio runtime is running")]
    NoRuntime,

    /// The report channel closed before a terminal report was published.
    #[error("operation {0} was abandoned by its scheduler")]
    Abandoned(String),
}

/// Convenience alias for batch results.
pub type BatchResult<T> = Result<T, BatchError>;
