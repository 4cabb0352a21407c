use std::sync::Arc;

use crate::error::{BatchError, BatchResult};
use crate::operation::Shared;
use crate::progress::{MergeProgress, MergeReport, OperationId};

/// The caller's view of a submitted merge.
///
/// Cloning a handle gives another view of the same operation.
#[derive(Clone, Debug)]
pub struct OperationHandle {
    shared: Arc<Shared>,
}

impl OperationHandle {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    pub fn id(&self) -> OperationId {
        self.shared.id()
    }

    /// Current state and counters.
    pub fn poll(&self) -> MergeProgress {
        self.shared.progress()
    }

    /// The terminal report, once the operation has one.
    pub fn report(&self) -> Option<MergeReport> {
        self.shared.report()
    }

    pub fn is_finished(&self) -> bool {
        self.report().is_some()
    }

    /// Ask the operation to stop. The request is honoured before the next
    /// chunk starts; the chunk in flight runs to the end and its effects
    /// remain.
    pub fn cancel(&self) {
        self.shared.cancel();
    }

    /// Wait for the terminal report.
    ///
    /// Every submitted operation publishes one, including runs whose
    /// scheduler dropped the work; those finish as interrupted.
    pub async fn wait(&self) -> BatchResult<MergeReport> {
        let mut done = self.shared.subscribe();
        let report = match done.wait_for(Option::is_some).await {
            Ok(report) => report.clone(),
            Err(_) => None,
        };
        report.ok_or_else(|| BatchError::Abandoned(self.id().to_string()))
    }
}
