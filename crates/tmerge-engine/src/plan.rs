//! A validated merge, ready to run branch by branch.

use std::num::NonZeroUsize;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use tmerge_store::{RedirectCapability, StoreError, SynonymCapability, TermStore};
use tmerge_types::{FieldName, Term, TermId};

use crate::consolidator::ReferenceConsolidator;
use crate::disposal::{BranchDisposal, DisposalOutcome};
use crate::error::{
    BranchError, BranchStage, Capability, ConfigurationError, MergeError, MergeResult,
};
use crate::fields::FieldMerger;
use crate::request::MergeRequest;
use crate::settings::RedirectSpec;
use crate::validator::MergeValidator;

/// The store plus whichever optional capabilities the caller has.
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    pub store: &'a dyn TermStore,
    pub redirects: Option<&'a dyn RedirectCapability>,
    pub synonyms: Option<&'a dyn SynonymCapability>,
}

impl<'a> Collaborators<'a> {
    pub fn new(store: &'a dyn TermStore) -> Self {
        Self {
            store,
            redirects: None,
            synonyms: None,
        }
    }

    pub fn with_redirects(mut self, redirects: &'a dyn RedirectCapability) -> Self {
        self.redirects = Some(redirects);
        self
    }

    pub fn with_synonyms(mut self, synonyms: &'a dyn SynonymCapability) -> Self {
        self.synonyms = Some(synonyms);
        self
    }
}

/// Everything that happened to one successfully merged branch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchOutcome {
    pub branch: TermId,
    pub entities_touched: usize,
    /// Merge and synonym fields skipped because the trunk was full.
    pub skipped_fields: Vec<FieldName>,
    pub disposal: DisposalOutcome,
}

/// A merge request that passed validation, with its settings reconciled
/// against the trunk's bundle and the available collaborators.
///
/// Settings that cannot apply (a field missing from the bundle, a
/// capability nobody supplied) are dropped here and reported once through
/// [`configuration_errors`](Self::configuration_errors).
#[derive(Clone, Debug)]
pub struct MergePlan {
    trunk: Term,
    branches: Vec<TermId>,
    step: NonZeroUsize,
    keep_branch_terms: bool,
    dedupe: bool,
    redirect: RedirectSpec,
    merge_fields: Vec<FieldName>,
    synonym_fields: Vec<FieldName>,
    configuration_errors: Vec<ConfigurationError>,
}

impl MergePlan {
    /// Validate `request` and build the plan. Nothing is written.
    pub fn prepare(request: &MergeRequest, collaborators: &Collaborators<'_>) -> MergeResult<Self> {
        let trunk = MergeValidator::new(collaborators.store).validate(request)?;
        let settings = request.settings();
        let mut configuration_errors = Vec::new();

        let mergeable = collaborators
            .store
            .mergeable_fields(trunk.bundle())
            .map_err(MergeError::Fatal)?;
        let merge_fields = Self::existing_fields(
            &trunk,
            settings.merge_fields().iter(),
            &mergeable,
            &mut configuration_errors,
        );

        let synonym_fields = if settings.synonym_fields().is_empty() {
            Vec::new()
        } else if collaborators.synonyms.is_none() {
            configuration_errors.push(ConfigurationError::CapabilityUnavailable(Capability::Synonym));
            Vec::new()
        } else {
            Self::existing_fields(
                &trunk,
                settings.synonym_fields().iter(),
                &mergeable,
                &mut configuration_errors,
            )
        };

        let redirect = if settings.redirect().is_requested() && collaborators.redirects.is_none() {
            configuration_errors.push(ConfigurationError::CapabilityUnavailable(Capability::Redirect));
            RedirectSpec::None
        } else {
            settings.redirect()
        };

        for problem in &configuration_errors {
            warn!(trunk = %trunk.id, problem = %problem, "merge configuration problem");
        }

        Ok(Self {
            trunk,
            branches: request.branch_ids().to_vec(),
            step: settings.step(),
            keep_branch_terms: settings.keep_branch_terms(),
            dedupe: settings.keep_only_unique(),
            redirect,
            merge_fields,
            synonym_fields,
            configuration_errors,
        })
    }

    fn existing_fields<'f>(
        trunk: &Term,
        requested: impl Iterator<Item = &'f FieldName>,
        mergeable: &[FieldName],
        problems: &mut Vec<ConfigurationError>,
    ) -> Vec<FieldName> {
        let mut fields = Vec::new();
        for field in requested {
            if mergeable.contains(field) {
                fields.push(field.clone());
            } else {
                problems.push(ConfigurationError::MissingField {
                    bundle: trunk.bundle().clone(),
                    field: field.clone(),
                });
            }
        }
        fields
    }

    pub fn trunk(&self) -> &Term {
        &self.trunk
    }

    /// Branches in processing order.
    pub fn branches(&self) -> &[TermId] {
        &self.branches
    }

    pub fn step(&self) -> NonZeroUsize {
        self.step
    }

    /// Branches grouped into increments of at most `step`.
    pub fn chunks(&self) -> std::slice::Chunks<'_, TermId> {
        self.branches.chunks(self.step.get())
    }

    pub fn configuration_errors(&self) -> &[ConfigurationError] {
        &self.configuration_errors
    }

    /// Merge one branch into the trunk: references, then fields, then
    /// synonyms, then disposal. The first failing step ends the branch.
    pub fn process_branch(
        &self,
        collaborators: &Collaborators<'_>,
        branch: TermId,
    ) -> Result<BranchOutcome, BranchError> {
        let fail = |stage: BranchStage| move |source: StoreError| BranchError::new(branch, stage, source);
        let store = collaborators.store;

        let term = store
            .load_term(branch)
            .map_err(fail(BranchStage::Load))?
            .ok_or_else(|| BranchError::new(branch, BranchStage::Load, StoreError::TermNotFound(branch)))?;

        let entities_touched = ReferenceConsolidator::new(store)
            .rewrite_references(branch, self.trunk.id, self.dedupe)
            .map_err(fail(BranchStage::Consolidate))?;

        let merger = FieldMerger::new(store);
        let mut skipped_fields = Vec::new();
        if !self.merge_fields.is_empty() {
            let outcome = merger
                .merge_field_values(branch, &self.trunk, &self.merge_fields)
                .map_err(fail(BranchStage::MergeFields))?;
            skipped_fields.extend_from_slice(outcome.skipped());
        }
        if let (Some(synonyms), false) = (collaborators.synonyms, self.synonym_fields.is_empty()) {
            let outcome = merger
                .merge_synonyms(&term, &self.trunk, &self.synonym_fields, synonyms)
                .map_err(fail(BranchStage::MergeSynonyms))?;
            skipped_fields.extend_from_slice(outcome.skipped());
        }

        let disposal = BranchDisposal::new(store, collaborators.redirects)
            .dispose(&term, self.trunk.id, self.keep_branch_terms, self.redirect)
            .map_err(fail(BranchStage::Dispose))?;

        debug!(
            branch = %branch,
            entities_touched,
            skipped = skipped_fields.len(),
            deleted = disposal.deleted,
            "branch merged"
        );
        Ok(BranchOutcome {
            branch,
            entities_touched,
            skipped_fields,
            disposal,
        })
    }
}
