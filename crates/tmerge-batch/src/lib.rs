//! Batch orchestration for taxonomy term merges.
//!
//! [`MergeEngine::merge`] is the entry point. It validates the request,
//! splits the branches into chunks of `step`, and hands one work unit per
//! chunk to a [`Scheduler`]. Chunks run strictly in order; within a chunk
//! each branch is merged completely before the next one starts.
//!
//! ```text
//! Idle -> Validating -> Running -> Completed
//!              |           |   \-> CompletedWithErrors
//!              \-----------+-----> Failed
//! ```
//!
//! A failing branch is recorded and the operation moves on. A fatal store
//! failure or a cancellation stops the remaining chunks; work already done
//! stays done.
//!
//! Two merges must not touch the same vocabulary at once. The engine
//! acquires a [`MergeLock`](tmerge_store::MergeLock) keyed by the trunk's
//! vocabulary before validating and releases it once the operation is
//! terminal. The lock itself is supplied by the caller.
//!
//! # Modules
//!
//! - [`engine`]: [`MergeEngine`], the builder and `merge()` entry point
//! - [`handle`]: [`OperationHandle`] for polling, awaiting and cancelling
//! - [`progress`]: [`OperationState`], [`MergeProgress`], [`MergeReport`]
//! - [`scheduler`]: the [`Scheduler`] trait with inline and tokio versions

pub mod engine;
pub mod error;
pub mod handle;
mod operation;
pub mod progress;
pub mod scheduler;

pub use engine::{CompletionCallback, MergeEngine};
pub use error::{BatchError, BatchResult};
pub use handle::OperationHandle;
pub use progress::{
    BranchFailure, FailureReason, MergeProgress, MergeReport, OperationId, OperationState,
};
pub use scheduler::{
    Completion, InlineScheduler, Scheduler, SchedulerOutcome, TokioScheduler, UnitOutcome, WorkUnit,
};
