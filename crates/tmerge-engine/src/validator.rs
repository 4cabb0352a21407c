//! Merge legality.
//!
//! A trunk may not be one of the branches, nor lie anywhere below one:
//! deleting the branch would take the trunk's ancestry with it, and
//! re-parenting the branch's children onto the trunk would form a cycle.
//! Every branch must also share the trunk's vocabulary. The check reads
//! the store only, so a rejected merge has no effects.

use std::collections::HashMap;

use tracing::{debug, warn};
use tmerge_hierarchy::HierarchyResolver;
use tmerge_store::TermStore;
use tmerge_types::{Term, TermId};

use crate::error::{MergeError, MergeResult, ValidationError};
use crate::request::MergeRequest;

/// Checks a [`MergeRequest`] against the current tree.
pub struct MergeValidator<'a> {
    store: &'a dyn TermStore,
}

impl<'a> MergeValidator<'a> {
    pub fn new(store: &'a dyn TermStore) -> Self {
        Self { store }
    }

    /// Validate the request and return the trunk term.
    ///
    /// The prohibited set is every branch plus all of its descendants,
    /// resolved in the branch's own vocabulary. Branches that no longer
    /// exist are left for the per-branch pipeline to report. A store
    /// failure here stops the merge before anything is written.
    pub fn validate(&self, request: &MergeRequest) -> MergeResult<Term> {
        if request.branch_ids().is_empty() {
            return Err(ValidationError::EmptyBranchSet.into());
        }

        let trunk_id = request.trunk_id();
        let trunk = self
            .store
            .load_term(trunk_id)
            .map_err(MergeError::Fatal)?
            .ok_or(ValidationError::TrunkNotFound(trunk_id))?;

        let prohibited = self.prohibited(&trunk, request.branch_ids())?;
        if let Some(branch) = prohibited.get(&trunk_id) {
            return Err(ValidationError::TrunkIsBranchOrDescendant {
                trunk: trunk_id,
                branch: *branch,
            }
            .into());
        }

        debug!(
            trunk = %trunk_id,
            branches = request.branch_ids().len(),
            prohibited = prohibited.len(),
            "merge request is legal"
        );
        Ok(trunk)
    }

    /// Map of every prohibited term to the branch that prohibits it.
    /// Fails on the first branch outside the trunk's vocabulary.
    fn prohibited(&self, trunk: &Term, branches: &[TermId]) -> MergeResult<HashMap<TermId, TermId>> {
        let resolver = HierarchyResolver::new(self.store);
        let mut prohibited = HashMap::new();
        for &branch in branches {
            prohibited.entry(branch).or_insert(branch);
            let Some(term) = self.store.load_term(branch).map_err(MergeError::Fatal)? else {
                warn!(branch = %branch, "branch term does not exist");
                continue;
            };
            if term.vocabulary != trunk.vocabulary {
                return Err(ValidationError::VocabularyMismatch {
                    branch,
                    vocabulary: term.vocabulary,
                }
                .into());
            }
            for id in resolver
                .descendants(&term.vocabulary, branch)
                .map_err(MergeError::Fatal)?
            {
                prohibited.entry(id).or_insert(branch);
            }
        }
        Ok(prohibited)
    }
}
