//! The merge entry point.

use std::sync::Arc;

use tracing::{info, info_span, warn};
use tmerge_engine::{
    Collaborators, MergeError, MergePlan, MergeRequest, MergeResult, MergeSettings, ValidationError,
};
use tmerge_store::{MergeLock, NoLock, RedirectCapability, SynonymCapability, TermStore};
use tmerge_types::{TermId, VocabularyId};

use crate::handle::OperationHandle;
use crate::operation::{Finisher, RunContext, Shared};
use crate::progress::{FailureReason, MergeReport, OperationId, OperationState};
use crate::scheduler::{InlineScheduler, Scheduler};

/// Called exactly once per operation with its terminal report.
pub type CompletionCallback = Arc<dyn Fn(&MergeReport) + Send + Sync>;

/// Runs merges against one store.
///
/// Defaults to running everything inline on the calling thread with no
/// locking and no optional capabilities:
///
/// ```ignore
/// let engine = MergeEngine::new(store.clone())
///     .with_scheduler(Arc::new(TokioScheduler::current()?))
///     .with_redirects(store.clone());
/// let handle = engine.merge([branch], trunk, MergeSettings::default());
/// let report = handle.wait().await?;
/// ```
pub struct MergeEngine {
    store: Arc<dyn TermStore>,
    scheduler: Arc<dyn Scheduler>,
    redirects: Option<Arc<dyn RedirectCapability>>,
    synonyms: Option<Arc<dyn SynonymCapability>>,
    lock: Arc<dyn MergeLock>,
    on_complete: Option<CompletionCallback>,
}

impl MergeEngine {
    pub fn new(store: Arc<dyn TermStore>) -> Self {
        Self {
            store,
            scheduler: Arc::new(InlineScheduler),
            redirects: None,
            synonyms: None,
            lock: Arc::new(NoLock),
            on_complete: None,
        }
    }

    pub fn with_scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
        self.scheduler = scheduler;
        self
    }

    pub fn with_redirects(mut self, redirects: Arc<dyn RedirectCapability>) -> Self {
        self.redirects = Some(redirects);
        self
    }

    pub fn with_synonyms(mut self, synonyms: Arc<dyn SynonymCapability>) -> Self {
        self.synonyms = Some(synonyms);
        self
    }

    pub fn with_lock(mut self, lock: Arc<dyn MergeLock>) -> Self {
        self.lock = lock;
        self
    }

    /// Register the terminal callback.
    pub fn on_complete(mut self, callback: CompletionCallback) -> Self {
        self.on_complete = Some(callback);
        self
    }

    /// Merge `branch_ids` into `trunk_id`.
    pub fn merge(
        &self,
        branch_ids: impl IntoIterator<Item = TermId>,
        trunk_id: TermId,
        settings: MergeSettings,
    ) -> OperationHandle {
        self.submit(MergeRequest::new(branch_ids, trunk_id, settings))
    }

    /// Start a merge and return its handle.
    ///
    /// Validation happens before this returns. With the inline scheduler
    /// the whole merge does too; other schedulers finish it later.
    pub fn submit(&self, request: MergeRequest) -> OperationHandle {
        let id = OperationId::new();
        let trunk = request.trunk_id();
        let shared = Arc::new(Shared::new(
            id,
            trunk,
            self.store.canonical_path(trunk),
            request.branch_ids().len(),
        ));
        let handle = OperationHandle::new(Arc::clone(&shared));
        let span = info_span!("merge", operation = %id, trunk = %trunk);
        let _entered = span.enter();

        info!(branches = request.branch_ids().len(), step = request.settings().step().get(), "merge submitted");
        shared.set_state(OperationState::Validating);

        let vocabulary = match self.lock_vocabulary(trunk) {
            Ok(vocabulary) => vocabulary,
            Err(err) => {
                self.fail(&shared, err);
                return handle;
            }
        };

        let collaborators = Collaborators {
            store: &*self.store,
            redirects: self.redirects.as_deref(),
            synonyms: self.synonyms.as_deref(),
        };
        let plan = match MergePlan::prepare(&request, &collaborators) {
            Ok(plan) => plan,
            Err(err) => {
                self.lock.release(&vocabulary);
                self.fail(&shared, err);
                return handle;
            }
        };

        shared.set_configuration_errors(plan.configuration_errors().to_vec());
        shared.set_state(OperationState::Running);

        let context = Arc::new(RunContext {
            plan,
            store: Arc::clone(&self.store),
            redirects: self.redirects.clone(),
            synonyms: self.synonyms.clone(),
            shared,
            span: span.clone(),
        });
        let units = context.work_units();
        let lock = Arc::clone(&self.lock);
        let on_complete = self.on_complete.clone();
        let finisher = Finisher::new(
            context,
            Box::new(move |report: &MergeReport| {
                lock.release(&vocabulary);
                if let Some(callback) = on_complete {
                    callback(report);
                }
            }),
        );
        self.scheduler
            .submit(units, Box::new(move |outcome| finisher.complete(outcome)));
        handle
    }

    /// Find the trunk's vocabulary and take the merge lock for it.
    fn lock_vocabulary(&self, trunk: TermId) -> MergeResult<VocabularyId> {
        let term = self
            .store
            .load_term(trunk)
            .map_err(MergeError::Fatal)?
            .ok_or(ValidationError::TrunkNotFound(trunk))?;
        self.lock.acquire(&term.vocabulary)?;
        Ok(term.vocabulary)
    }

    fn fail(&self, shared: &Shared, err: MergeError) {
        warn!(error = %err, "merge rejected before any branch was processed");
        let report = shared.finish(Some(FailureReason::from(err)));
        if let Some(callback) = &self.on_complete {
            callback(&report);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::num::NonZeroUsize;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use proptest::prelude::*;
    use tmerge_engine::{BranchStage, RedirectSpec};
    use tmerge_store::{
        FieldDefinition, FieldSynonyms, InMemoryTermStore, LockError, StoreError, StoreResult,
    };
    use tmerge_types::{Cardinality, EntityId, FieldName, FieldValue, Term, TreeEntry};

    use crate::scheduler::TokioScheduler;

    fn tid(n: u64) -> TermId {
        TermId::new(n)
    }

    fn step(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    /// `tags`: trunk T(1000) plus `branches` flat root terms 1..=n, each
    /// referenced by one node and carrying one `field_notes` value.
    fn flat_store(branches: u64) -> InMemoryTermStore {
        let store = InMemoryTermStore::new();
        store.insert_term(Term::new(tid(1000), "tags".into(), "Trunk")).unwrap();
        store
            .define_field(FieldDefinition::new("tags", "field_notes", Cardinality::Unlimited))
            .unwrap();
        for i in 1..=branches {
            store
                .insert_term(
                    Term::new(tid(i), "tags".into(), format!("B{i:03}"))
                        .with_field("field_notes", vec![FieldValue::text(format!("n{i}"))]),
                )
                .unwrap();
            store
                .insert_entity(EntityId::node(i), "field_tags", vec![tid(i), tid(1000)])
                .unwrap();
        }
        store
    }

    /// Delegates to an in-memory store; fails or panics on chosen branches
    /// or, after a number of deletions, fails the whole store.
    struct FaultyStore {
        inner: InMemoryTermStore,
        failing_branches: HashSet<TermId>,
        panicking_branch: Option<TermId>,
        outage_after_deletes: Option<usize>,
        deletes: AtomicUsize,
    }

    impl FaultyStore {
        fn new(inner: InMemoryTermStore) -> Self {
            Self {
                inner,
                failing_branches: HashSet::new(),
                panicking_branch: None,
                outage_after_deletes: None,
                deletes: AtomicUsize::new(0),
            }
        }

        fn check_outage(&self) -> StoreResult<()> {
            match self.outage_after_deletes {
                Some(limit) if self.deletes.load(Ordering::SeqCst) >= limit => {
                    Err(StoreError::Unavailable("connection refused".into()))
                }
                _ => Ok(()),
            }
        }
    }

    impl TermStore for FaultyStore {
        fn load_term(&self, id: TermId) -> StoreResult<Option<Term>> {
            self.check_outage()?;
            self.inner.load_term(id)
        }
        fn load_tree(&self, vocabulary: &VocabularyId, root: Option<TermId>) -> StoreResult<Vec<TreeEntry>> {
            self.check_outage()?;
            self.inner.load_tree(vocabulary, root)
        }
        fn children(&self, vocabulary: &VocabularyId, parent: TermId) -> StoreResult<Option<Vec<TermId>>> {
            self.check_outage()?;
            self.inner.children(vocabulary, parent)
        }
        fn set_parent(&self, term: TermId, parent: Option<TermId>) -> StoreResult<()> {
            self.inner.set_parent(term, parent)
        }
        fn get_field_values(&self, term: TermId, field: &FieldName) -> StoreResult<Vec<FieldValue>> {
            self.inner.get_field_values(term, field)
        }
        fn set_field_values(&self, term: TermId, field: &FieldName, values: Vec<FieldValue>) -> StoreResult<()> {
            self.inner.set_field_values(term, field, values)
        }
        fn field_cardinality(&self, bundle: &VocabularyId, field: &FieldName) -> StoreResult<Option<Cardinality>> {
            self.inner.field_cardinality(bundle, field)
        }
        fn mergeable_fields(&self, bundle: &VocabularyId) -> StoreResult<Vec<FieldName>> {
            self.inner.mergeable_fields(bundle)
        }
        fn find_referencing_entities(&self, term: TermId) -> StoreResult<Vec<(EntityId, FieldName)>> {
            if self.panicking_branch == Some(term) {
                panic!("reference index for {term} is unreadable");
            }
            if self.failing_branches.contains(&term) {
                return Err(StoreError::Backend(format!("index for {term} is corrupt")));
            }
            self.inner.find_referencing_entities(term)
        }
        fn entity_references(&self, entity: &EntityId, field: &FieldName) -> StoreResult<Vec<TermId>> {
            self.inner.entity_references(entity, field)
        }
        fn set_entity_references(&self, entity: &EntityId, field: &FieldName, references: Vec<TermId>) -> StoreResult<()> {
            self.inner.set_entity_references(entity, field, references)
        }
        fn delete_term(&self, term: TermId) -> StoreResult<bool> {
            let deleted = self.inner.delete_term(term)?;
            self.deletes.fetch_add(1, Ordering::SeqCst);
            Ok(deleted)
        }
    }

    /// A lock that records acquire/release and can refuse.
    #[derive(Default)]
    struct RecordingLock {
        refuse: bool,
        events: Mutex<Vec<String>>,
    }

    impl MergeLock for RecordingLock {
        fn acquire(&self, vocabulary: &VocabularyId) -> Result<(), LockError> {
            if self.refuse {
                return Err(LockError::Held(vocabulary.clone()));
            }
            self.events.lock().unwrap().push(format!("acquire {vocabulary}"));
            Ok(())
        }
        fn release(&self, vocabulary: &VocabularyId) {
            self.events.lock().unwrap().push(format!("release {vocabulary}"));
        }
    }

    fn ids(range: std::ops::RangeInclusive<u64>) -> Vec<TermId> {
        range.map(tid).collect()
    }

    type Pending = Arc<Mutex<Option<(Vec<crate::WorkUnit>, crate::Completion)>>>;

    /// Keeps the submitted work so a test can drive it by hand.
    struct Deferred(Pending);

    impl Scheduler for Deferred {
        fn submit(&self, units: Vec<crate::WorkUnit>, on_complete: crate::Completion) {
            *self.0.lock().unwrap() = Some((units, on_complete));
        }
    }

    /// Throws the submitted work away.
    struct Dropping;

    impl Scheduler for Dropping {
        fn submit(&self, units: Vec<crate::WorkUnit>, on_complete: crate::Completion) {
            drop(units);
            drop(on_complete);
        }
    }

    // -----------------------------------------------------------------------
    // 1. 125 branches with step 40 run as chunks of 40, 40, 40, 5
    // -----------------------------------------------------------------------
    #[test]
    fn chunks_of_forty() {
        let store = Arc::new(flat_store(125));
        let engine = MergeEngine::new(store.clone());
        let handle = engine.merge(ids(1..=125), tid(1000), MergeSettings::default());

        let report = handle.report().unwrap();
        assert_eq!(report.state, OperationState::Completed);
        assert_eq!(report.chunks_run, 4);
        assert_eq!(report.processed, 125);
        assert_eq!(report.total, 125);
        assert_eq!(report.summary(), "The terms have been successfully merged.");
        assert_eq!(report.trunk_path(), "taxonomy/term/1000");
        assert_eq!(store.term_count().unwrap(), 1);
        assert_eq!(handle.poll().processed, 125);
    }

    #[test]
    fn chunk_sizes_follow_step() {
        let store = Arc::new(flat_store(125));
        let pending = Pending::default();
        let engine = MergeEngine::new(store).with_scheduler(Arc::new(Deferred(pending.clone())));
        let handle = engine.merge(ids(1..=125), tid(1000), MergeSettings::default());
        let (units, on_complete) = pending.lock().unwrap().take().unwrap();
        assert_eq!(units.len(), 4);

        let mut processed = Vec::new();
        for unit in units {
            assert_eq!(unit(), crate::UnitOutcome::Continue);
            processed.push(handle.poll().processed);
        }
        assert_eq!(processed, vec![40, 80, 120, 125]);
        assert!(handle.report().is_none());

        on_complete(crate::SchedulerOutcome {
            ran: 4,
            aborted: false,
        });
        let report = handle.report().unwrap();
        assert_eq!(report.state, OperationState::Completed);
        assert_eq!(report.chunks_run, 4);
        assert_eq!(report.merged.len(), 125);
    }

    // -----------------------------------------------------------------------
    // 2. A failing branch is recorded and the rest still merge
    // -----------------------------------------------------------------------
    #[test]
    fn partial_failure_completes_with_errors() {
        let mut faulty = FaultyStore::new(flat_store(10));
        faulty.failing_branches.insert(tid(4));
        let store = Arc::new(faulty);
        let engine = MergeEngine::new(store.clone());
        let settings = MergeSettings::default().with_step(step(3));
        let report = engine.merge(ids(1..=10), tid(1000), settings).report().unwrap();

        assert_eq!(report.state, OperationState::CompletedWithErrors);
        assert_eq!(report.processed, 10);
        assert_eq!(report.merged.len(), 9);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].branch, tid(4));
        assert_eq!(report.errors[0].stage, BranchStage::Consolidate);
        assert!(store.inner.load_term(tid(4)).unwrap().is_some());
        assert!(store.inner.load_term(tid(5)).unwrap().is_none());
        assert!(report.is_success());
    }

    #[test]
    fn missing_branch_is_a_per_branch_error() {
        let store = Arc::new(flat_store(3));
        let report = MergeEngine::new(store)
            .merge([tid(1), tid(77), tid(2)], tid(1000), MergeSettings::default())
            .report()
            .unwrap();
        assert_eq!(report.state, OperationState::CompletedWithErrors);
        assert_eq!(report.errors[0].branch, tid(77));
        assert_eq!(report.errors[0].stage, BranchStage::Load);
        assert_eq!(report.merged.len(), 2);
    }

    // -----------------------------------------------------------------------
    // 3. A store outage aborts the remaining chunks
    // -----------------------------------------------------------------------
    #[test]
    fn outage_aborts_remaining_work() {
        let mut faulty = FaultyStore::new(flat_store(10));
        faulty.outage_after_deletes = Some(4);
        let store = Arc::new(faulty);
        let settings = MergeSettings::default().with_step(step(3));
        let report = MergeEngine::new(store.clone())
            .merge(ids(1..=10), tid(1000), settings)
            .report()
            .unwrap();

        assert_eq!(report.state, OperationState::Failed);
        assert_eq!(report.processed, 4);
        assert_eq!(report.chunks_run, 2);
        assert!(matches!(report.failure, Some(FailureReason::Fatal(_))));
        assert!(!report.is_success());
        // Work already done stays done.
        assert!(store.inner.load_term(tid(1)).unwrap().is_none());
        assert!(store.inner.load_term(tid(6)).unwrap().is_some());
    }

    // -----------------------------------------------------------------------
    // 4. Validation failures stop everything before any mutation
    // -----------------------------------------------------------------------
    #[test]
    fn invalid_request_fails_immediately() {
        let store = Arc::new(flat_store(3));
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let engine = MergeEngine::new(store.clone()).on_complete(Arc::new(move |report| {
            assert_eq!(report.state, OperationState::Failed);
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        let before = store.snapshot().unwrap();

        let report = engine
            .merge([tid(1), tid(1000)], tid(1000), MergeSettings::default())
            .report()
            .unwrap();
        assert!(matches!(
            report.failure,
            Some(FailureReason::Validation(ValidationError::TrunkIsBranchOrDescendant { .. }))
        ));
        assert_eq!(report.processed, 0);
        assert_eq!(report.chunks_run, 0);

        let missing = engine.merge([tid(1)], tid(4242), MergeSettings::default()).report().unwrap();
        assert!(matches!(
            missing.failure,
            Some(FailureReason::Validation(ValidationError::TrunkNotFound(_)))
        ));

        assert_eq!(store.snapshot().unwrap(), before);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn branch_from_another_vocabulary_is_rejected_before_any_change() {
        let store = Arc::new(flat_store(2));
        store.insert_term(Term::new(tid(2000), "topics".into(), "Elsewhere")).unwrap();
        store
            .insert_term(Term::new(tid(2001), "topics".into(), "Below").with_parent(tid(2000)))
            .unwrap();
        store
            .insert_entity(EntityId::node(2000), "field_topics", vec![tid(2000)])
            .unwrap();
        let before = store.snapshot().unwrap();
        let lock = Arc::new(RecordingLock::default());

        let report = MergeEngine::new(store.clone())
            .with_lock(lock.clone())
            .merge([tid(1), tid(2000)], tid(1000), MergeSettings::default())
            .report()
            .unwrap();
        assert_eq!(report.state, OperationState::Failed);
        assert_eq!(
            report.failure,
            Some(FailureReason::Validation(ValidationError::VocabularyMismatch {
                branch: tid(2000),
                vocabulary: "topics".into(),
            }))
        );
        assert_eq!(report.processed, 0);
        assert_eq!(store.snapshot().unwrap(), before);
        assert_eq!(*lock.events.lock().unwrap(), vec!["acquire tags", "release tags"]);
    }

    // -----------------------------------------------------------------------
    // 5. Locking
    // -----------------------------------------------------------------------
    #[test]
    fn lock_is_held_for_the_whole_operation() {
        let store = Arc::new(flat_store(3));
        let lock = Arc::new(RecordingLock::default());
        let report = MergeEngine::new(store)
            .with_lock(lock.clone())
            .merge(ids(1..=3), tid(1000), MergeSettings::default())
            .report()
            .unwrap();
        assert_eq!(report.state, OperationState::Completed);
        assert_eq!(*lock.events.lock().unwrap(), vec!["acquire tags", "release tags"]);
    }

    #[test]
    fn lock_is_released_after_rejection() {
        let store = Arc::new(flat_store(3));
        let lock = Arc::new(RecordingLock::default());
        MergeEngine::new(store)
            .with_lock(lock.clone())
            .merge([tid(1000)], tid(1000), MergeSettings::default());
        assert_eq!(*lock.events.lock().unwrap(), vec!["acquire tags", "release tags"]);
    }

    #[test]
    fn held_lock_fails_the_operation() {
        let store = Arc::new(flat_store(3));
        let before = store.snapshot().unwrap();
        let lock = Arc::new(RecordingLock {
            refuse: true,
            ..Default::default()
        });
        let report = MergeEngine::new(store.clone())
            .with_lock(lock)
            .merge(ids(1..=3), tid(1000), MergeSettings::default())
            .report()
            .unwrap();
        assert!(matches!(report.failure, Some(FailureReason::Locked(_))));
        assert_eq!(store.snapshot().unwrap(), before);
    }

    // -----------------------------------------------------------------------
    // 6. Capabilities and configuration problems
    // -----------------------------------------------------------------------
    #[test]
    fn configuration_problems_are_reported_once() {
        let store = Arc::new(flat_store(5));
        let settings = MergeSettings::default()
            .with_merge_fields(["field_notes", "field_unknown"])
            .with_redirect(RedirectSpec::Code(301))
            .with_step(step(2));
        let report = MergeEngine::new(store.clone())
            .merge(ids(1..=5), tid(1000), settings)
            .report()
            .unwrap();
        assert_eq!(report.state, OperationState::Completed);
        assert_eq!(report.configuration_errors.len(), 2);
        let notes = store.get_field_values(tid(1000), &"field_notes".into()).unwrap();
        assert_eq!(notes.len(), 5);
    }

    #[test]
    fn redirects_and_synonyms_when_supplied() {
        let store = Arc::new(flat_store(2));
        store
            .define_field(FieldDefinition::new("tags", "field_synonyms", Cardinality::Unlimited))
            .unwrap();
        let settings = MergeSettings::default()
            .with_synonym_fields(["field_synonyms"])
            .with_redirect(RedirectSpec::Default);
        let report = MergeEngine::new(store.clone())
            .with_redirects(store.clone())
            .with_synonyms(Arc::new(FieldSynonyms::new(["field_synonyms".into()])))
            .merge(ids(1..=2), tid(1000), settings)
            .report()
            .unwrap();
        assert!(report.configuration_errors.is_empty());
        assert_eq!(store.redirects().unwrap().len(), 2);
        let synonyms = store.get_field_values(tid(1000), &"field_synonyms".into()).unwrap();
        assert_eq!(synonyms, vec![FieldValue::text("B001"), FieldValue::text("B002")]);
    }

    // -----------------------------------------------------------------------
    // 7. Async handles, cancellation
    // -----------------------------------------------------------------------
    #[tokio::test]
    async fn tokio_scheduler_handle_can_be_awaited() {
        let store = Arc::new(flat_store(50));
        let engine = MergeEngine::new(store.clone())
            .with_scheduler(Arc::new(TokioScheduler::current().unwrap()));
        let handle = engine.merge(ids(1..=50), tid(1000), MergeSettings::default().with_step(step(7)));
        let report = handle.wait().await.unwrap();
        assert_eq!(report.state, OperationState::Completed);
        assert_eq!(report.chunks_run, 8);
        assert_eq!(report.processed, 50);
        assert!(handle.is_finished());
        assert_eq!(handle.poll().state, OperationState::Completed);
        assert_eq!(store.term_count().unwrap(), 1);
    }

    #[test]
    fn cancellation_between_chunks_keeps_finished_chunks() {
        let store = Arc::new(flat_store(9));
        let holder: Arc<Mutex<Option<OperationHandle>>> = Arc::new(Mutex::new(None));

        // Runs the first unit, then cancels through the handle before the rest.
        struct CancelAfterFirst(Arc<Mutex<Option<OperationHandle>>>);
        impl Scheduler for CancelAfterFirst {
            fn submit(&self, units: Vec<crate::WorkUnit>, on_complete: crate::Completion) {
                let slot = Arc::clone(&self.0);
                let mut ran = 0;
                let mut aborted = false;
                for (i, unit) in units.into_iter().enumerate() {
                    if i == 1 {
                        if let Some(handle) = slot.lock().unwrap().as_ref() {
                            handle.cancel();
                        }
                    }
                    ran += 1;
                    if unit() == crate::UnitOutcome::Abort {
                        aborted = true;
                        break;
                    }
                }
                on_complete(crate::SchedulerOutcome { ran, aborted });
            }
        }

        // Submit with a deferred scheduler so the handle can be stored first.
        let pending = Pending::default();

        let engine = MergeEngine::new(store.clone()).with_scheduler(Arc::new(Deferred(pending.clone())));
        let handle = engine.merge(ids(1..=9), tid(1000), MergeSettings::default().with_step(step(3)));
        assert_eq!(handle.poll().state, OperationState::Running);
        *holder.lock().unwrap() = Some(handle.clone());

        let (units, on_complete) = pending.lock().unwrap().take().unwrap();
        CancelAfterFirst(holder).submit(units, on_complete);

        let report = handle.report().unwrap();
        assert_eq!(report.state, OperationState::Failed);
        assert_eq!(report.failure, Some(FailureReason::Cancelled));
        assert_eq!(report.processed, 3);
        assert_eq!(report.chunks_run, 1);
        assert!(store.load_term(tid(3)).unwrap().is_none());
        assert!(store.load_term(tid(4)).unwrap().is_some());
    }

    #[tokio::test]
    async fn dropped_work_finishes_as_interrupted() {
        let store = Arc::new(flat_store(3));
        let before = store.snapshot().unwrap();
        let lock = Arc::new(RecordingLock::default());
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let engine = MergeEngine::new(store.clone())
            .with_scheduler(Arc::new(Dropping))
            .with_lock(lock.clone())
            .on_complete(Arc::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }));
        let handle = engine.merge(ids(1..=3), tid(1000), MergeSettings::default());

        let report = tokio::time::timeout(Duration::from_secs(2), handle.wait())
            .await
            .expect("wait should not hang")
            .unwrap();
        assert_eq!(report.state, OperationState::Failed);
        assert_eq!(report.failure, Some(FailureReason::Interrupted));
        assert_eq!(report.processed, 0);
        assert_eq!(store.snapshot().unwrap(), before);
        assert_eq!(*lock.events.lock().unwrap(), vec!["acquire tags", "release tags"]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn panicking_unit_releases_the_lock_and_completes() {
        let mut faulty = FaultyStore::new(flat_store(6));
        faulty.panicking_branch = Some(tid(4));
        let store = Arc::new(faulty);
        let lock = Arc::new(RecordingLock::default());
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let handle = MergeEngine::new(store.clone())
            .with_lock(lock.clone())
            .on_complete(Arc::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }))
            .merge(ids(1..=6), tid(1000), MergeSettings::default().with_step(step(3)));

        let report = handle.report().unwrap();
        assert_eq!(report.state, OperationState::Failed);
        assert_eq!(report.failure, Some(FailureReason::Interrupted));
        assert_eq!(report.chunks_run, 1);
        assert_eq!(report.processed, 3);
        assert!(store.inner.load_term(tid(3)).unwrap().is_none());
        assert!(store.inner.load_term(tid(4)).unwrap().is_some());
        assert_eq!(*lock.events.lock().unwrap(), vec!["acquire tags", "release tags"]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    // -----------------------------------------------------------------------
    // 8. Outcome does not depend on step
    // -----------------------------------------------------------------------
    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn final_state_is_independent_of_step(n in 1u64..30, a in 1usize..12, b in 1usize..12) {
            let run = |s: usize| {
                let store = Arc::new(flat_store(n));
                let settings = MergeSettings::default()
                    .with_merge_fields(["field_notes"])
                    .with_step(step(s));
                let report = MergeEngine::new(store.clone())
                    .merge(ids(1..=n), tid(1000), settings)
                    .report()
                    .unwrap();
                let merged: Vec<TermId> = report.merged.iter().map(|o| o.branch).collect();
                (merged, store.snapshot().unwrap())
            };
            let (merged_a, state_a) = run(a);
            let (merged_b, state_b) = run(b);
            prop_assert_eq!(merged_a, merged_b);
            prop_assert_eq!(state_a, state_b);
        }
    }
}
