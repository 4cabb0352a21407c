//! Entity reference rewriting.

use std::collections::{BTreeSet, HashSet};

use tracing::debug;
use tmerge_store::{StoreResult, TermStore};
use tmerge_types::TermId;

/// Points every entity reference to a branch at the trunk instead.
pub struct ReferenceConsolidator<'a> {
    store: &'a dyn TermStore,
}

impl<'a> ReferenceConsolidator<'a> {
    pub fn new(store: &'a dyn TermStore) -> Self {
        Self { store }
    }

    /// Rewrite references from `branch` to `trunk` and return how many
    /// distinct entities were touched.
    ///
    /// With `dedupe`, every rewritten field is then collapsed so each term
    /// appears once, at its first position. Re-running with the same
    /// arguments finds nothing left to rewrite and changes nothing.
    pub fn rewrite_references(&self, branch: TermId, trunk: TermId, dedupe: bool) -> StoreResult<usize> {
        let referencing = self.store.find_referencing_entities(branch)?;
        let mut touched = BTreeSet::new();

        for (entity, field) in &referencing {
            self.store.rewrite_reference(entity, field, branch, trunk)?;
            if dedupe {
                let references = self.store.entity_references(entity, field)?;
                let mut seen = HashSet::with_capacity(references.len());
                let unique: Vec<TermId> =
                    references.iter().copied().filter(|id| seen.insert(*id)).collect();
                if unique.len() != references.len() {
                    self.store.set_entity_references(entity, field, unique)?;
                }
            }
            touched.insert(entity);
        }

        debug!(
            branch = %branch,
            trunk = %trunk,
            fields = referencing.len(),
            entities = touched.len(),
            "rewrote references"
        );
        Ok(touched.len())
    }
}
