//! Per-operation state shared between the engine, its work units and the
//! caller's handle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::{debug, info, warn, Span};
use tmerge_engine::{BranchOutcome, Collaborators, ConfigurationError, MergePlan};
use tmerge_store::{RedirectCapability, SynonymCapability, TermStore};
use tmerge_types::TermId;

use crate::progress::{
    BranchFailure, FailureReason, MergeProgress, MergeReport, OperationId, OperationState,
};
use crate::scheduler::{SchedulerOutcome, UnitOutcome, WorkUnit};

/// Mutable progress of one operation.
#[derive(Debug)]
struct Tracker {
    state: OperationState,
    processed: usize,
    total: usize,
    chunks_run: usize,
    merged: Vec<BranchOutcome>,
    errors: Vec<BranchFailure>,
    configuration_errors: Vec<ConfigurationError>,
    failure: Option<FailureReason>,
}

/// State shared by everything that touches one operation.
#[derive(Debug)]
pub(crate) struct Shared {
    id: OperationId,
    trunk: TermId,
    trunk_path: String,
    started_at: DateTime<Utc>,
    tracker: Mutex<Tracker>,
    cancelled: AtomicBool,
    done: watch::Sender<Option<MergeReport>>,
}

impl Shared {
    pub(crate) fn new(id: OperationId, trunk: TermId, trunk_path: String, total: usize) -> Self {
        let (done, _) = watch::channel(None);
        Self {
            id,
            trunk,
            trunk_path,
            started_at: Utc::now(),
            tracker: Mutex::new(Tracker {
                state: OperationState::Idle,
                processed: 0,
                total,
                chunks_run: 0,
                merged: Vec::new(),
                errors: Vec::new(),
                configuration_errors: Vec::new(),
                failure: None,
            }),
            cancelled: AtomicBool::new(false),
            done,
        }
    }

    pub(crate) fn id(&self) -> OperationId {
        self.id
    }

    fn tracker(&self) -> MutexGuard<'_, Tracker> {
        self.tracker.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn set_state(&self, state: OperationState) {
        self.tracker().state = state;
    }

    pub(crate) fn set_configuration_errors(&self, errors: Vec<ConfigurationError>) {
        self.tracker().configuration_errors = errors;
    }

    pub(crate) fn progress(&self) -> MergeProgress {
        let tracker = self.tracker();
        MergeProgress {
            state: tracker.state,
            processed: tracker.processed,
            total: tracker.total,
            chunks_run: tracker.chunks_run,
            errors: tracker.errors.clone(),
        }
    }

    pub(crate) fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<Option<MergeReport>> {
        self.done.subscribe()
    }

    pub(crate) fn report(&self) -> Option<MergeReport> {
        self.done.borrow().clone()
    }

    /// Move to a terminal state and publish the report. Later calls return
    /// the report published first.
    pub(crate) fn finish(&self, failure: Option<FailureReason>) -> MergeReport {
        if let Some(report) = self.report() {
            return report;
        }
        let report = {
            let mut tracker = self.tracker();
            if tracker.failure.is_none() {
                tracker.failure = failure;
            }
            tracker.state = if tracker.failure.is_some() {
                OperationState::Failed
            } else if tracker.errors.is_empty() {
                OperationState::Completed
            } else {
                OperationState::CompletedWithErrors
            };
            MergeReport {
                operation: self.id,
                trunk: self.trunk,
                trunk_path: self.trunk_path.clone(),
                state: tracker.state,
                processed: tracker.processed,
                total: tracker.total,
                chunks_run: tracker.chunks_run,
                merged: tracker.merged.clone(),
                errors: tracker.errors.clone(),
                configuration_errors: tracker.configuration_errors.clone(),
                failure: tracker.failure.clone(),
                started_at: self.started_at,
                finished_at: Utc::now(),
            }
        };
        self.done.send_replace(Some(report.clone()));
        report
    }
}

/// Everything a work unit needs, owned so units can run on any thread.
pub(crate) struct RunContext {
    pub(crate) plan: MergePlan,
    pub(crate) store: Arc<dyn TermStore>,
    pub(crate) redirects: Option<Arc<dyn RedirectCapability>>,
    pub(crate) synonyms: Option<Arc<dyn SynonymCapability>>,
    pub(crate) shared: Arc<Shared>,
    pub(crate) span: Span,
}

impl RunContext {
    /// One work unit per chunk of the plan, in order.
    pub(crate) fn work_units(self: &Arc<Self>) -> Vec<WorkUnit> {
        let total_chunks = self.plan.chunks().len();
        self.plan
            .chunks()
            .enumerate()
            .map(|(index, chunk)| {
                let context = Arc::clone(self);
                let chunk = chunk.to_vec();
                Box::new(move || context.run_chunk(index, total_chunks, &chunk)) as WorkUnit
            })
            .collect()
    }

    fn run_chunk(&self, index: usize, total_chunks: usize, chunk: &[TermId]) -> UnitOutcome {
        let _entered = self.span.enter();
        if self.shared.is_cancelled() {
            info!(chunk = index, "cancelled before chunk");
            self.shared.tracker().failure = Some(FailureReason::Cancelled);
            return UnitOutcome::Abort;
        }
        debug!(chunk = index + 1, of = total_chunks, size = chunk.len(), "chunk started");

        let collaborators = Collaborators {
            store: &*self.store,
            redirects: self.redirects.as_deref(),
            synonyms: self.synonyms.as_deref(),
        };
        for &branch in chunk {
            match self.plan.process_branch(&collaborators, branch) {
                Ok(outcome) => {
                    let mut tracker = self.shared.tracker();
                    tracker.processed += 1;
                    tracker.merged.push(outcome);
                }
                Err(err) if err.is_fatal() => {
                    warn!(branch = %branch, error = %err, "store failure; aborting merge");
                    let mut tracker = self.shared.tracker();
                    tracker.chunks_run += 1;
                    tracker.failure = Some(FailureReason::Fatal(err.source.to_string()));
                    return UnitOutcome::Abort;
                }
                Err(err) => {
                    warn!(branch = %branch, stage = %err.stage, error = %err.source, "branch failed");
                    let mut tracker = self.shared.tracker();
                    tracker.processed += 1;
                    tracker.errors.push(BranchFailure::from(&err));
                }
            }
        }

        self.shared.tracker().chunks_run += 1;
        debug!(chunk = index + 1, of = total_chunks, "chunk finished");
        UnitOutcome::Continue
    }

    /// Completion step: reach the terminal state.
    fn complete(&self, outcome: SchedulerOutcome) -> MergeReport {
        let _entered = self.span.enter();
        let failure = outcome.aborted.then_some(FailureReason::Interrupted);
        let report = self.shared.finish(failure);
        info!(
            state = %report.state,
            processed = report.processed,
            total = report.total,
            errors = report.errors.len(),
            "merge finished"
        );
        report
    }
}

/// Cleanup to run once the operation has its terminal report.
pub(crate) type AfterFinish = Box<dyn FnOnce(&MergeReport) + Send + 'static>;

/// Owns the terminal step of a scheduled run.
///
/// A scheduler that drops its completion without calling it, or that
/// unwinds out of `submit`, drops this too. The operation then finishes as
/// interrupted and the cleanup still runs, so handles never wait forever
/// and the merge lock is released.
pub(crate) struct Finisher {
    context: Arc<RunContext>,
    after: Option<AfterFinish>,
}

impl Finisher {
    pub(crate) fn new(context: Arc<RunContext>, after: AfterFinish) -> Self {
        Self {
            context,
            after: Some(after),
        }
    }

    pub(crate) fn complete(mut self, outcome: SchedulerOutcome) {
        self.run(outcome);
    }

    fn run(&mut self, outcome: SchedulerOutcome) {
        let Some(after) = self.after.take() else {
            return;
        };
        let report = self.context.complete(outcome);
        after(&report);
    }
}

impl Drop for Finisher {
    fn drop(&mut self) {
        if self.after.is_none() {
            return;
        }
        {
            let _entered = self.context.span.enter();
            warn!("scheduler dropped the run before completing it");
        }
        self.run(SchedulerOutcome {
            ran: 0,
            aborted: true,
        });
    }
}
