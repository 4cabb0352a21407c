//! The scheduling collaborator.
//!
//! A scheduler receives an ordered list of work units plus a completion
//! callback. It must run each unit at most once, in order, one at a time,
//! stop after a unit asks to abort, and then call the completion exactly
//! once.

use std::panic::{self, AssertUnwindSafe};

use tokio::runtime::Handle;
use tracing::error;

use crate::error::{BatchError, BatchResult};

/// What a work unit tells the scheduler once it returns.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnitOutcome {
    Continue,
    /// Skip every remaining unit and go straight to completion.
    Abort,
}

/// Summary handed to the completion callback.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SchedulerOutcome {
    /// Units that returned, whatever their outcome.
    pub ran: usize,
    /// `true` if the run stopped early, by request or because a unit panicked.
    pub aborted: bool,
}

/// One increment of work.
pub type WorkUnit = Box<dyn FnOnce() -> UnitOutcome + Send + 'static>;

/// Called once the last unit has run or the run was aborted.
pub type Completion = Box<dyn FnOnce(SchedulerOutcome) + Send + 'static>;

/// Runs work units in order.
pub trait Scheduler: Send + Sync {
    fn submit(&self, units: Vec<WorkUnit>, on_complete: Completion);
}

/// Runs every unit on the calling thread before `submit` returns. A unit
/// that panics stops the run like an abort.
#[derive(Clone, Copy, Debug, Default)]
pub struct InlineScheduler;

impl Scheduler for InlineScheduler {
    fn submit(&self, units: Vec<WorkUnit>, on_complete: Completion) {
        let mut outcome = SchedulerOutcome {
            ran: 0,
            aborted: false,
        };
        for unit in units {
            match panic::catch_unwind(AssertUnwindSafe(unit)) {
                Ok(UnitOutcome::Continue) => outcome.ran += 1,
                Ok(UnitOutcome::Abort) => {
                    outcome.ran += 1;
                    outcome.aborted = true;
                    break;
                }
                Err(_) => {
                    error!("work unit panicked");
                    outcome.aborted = true;
                    break;
                }
            }
        }
        on_complete(outcome);
    }
}

/// Runs units one after another on tokio's blocking pool, from a task
/// spawned on the given runtime. `submit` returns immediately.
#[derive(Clone, Debug)]
pub struct TokioScheduler {
    handle: Handle,
}

impl TokioScheduler {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Use the runtime the caller is running in.
    pub fn current() -> BatchResult<Self> {
        Handle::try_current()
            .map(Self::new)
            .map_err(|_| BatchError::NoRuntime)
    }
}

impl Scheduler for TokioScheduler {
    fn submit(&self, units: Vec<WorkUnit>, on_complete: Completion) {
        self.handle.spawn(async move {
            let mut outcome = SchedulerOutcome {
                ran: 0,
                aborted: false,
            };
            for unit in units {
                match tokio::task::spawn_blocking(unit).await {
                    Ok(UnitOutcome::Continue) => outcome.ran += 1,
                    Ok(UnitOutcome::Abort) => {
                        outcome.ran += 1;
                        outcome.aborted = true;
                        break;
                    }
                    Err(e) => {
                        error!(error = %e, "work unit did not finish");
                        outcome.aborted = true;
                        break;
                    }
                }
            }
            on_complete(outcome);
        });
    }
}
