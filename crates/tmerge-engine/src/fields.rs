//! Field and synonym value merging.
//!
//! Branch values are appended to the trunk's values for the same field,
//! skipping any value the trunk already holds, and the result is cut to the
//! field's cardinality. A trunk field that is already full is left alone
//! and reported as skipped. Skipping is never an error.

use tracing::{debug, trace};
use tmerge_store::{StoreError, StoreResult, SynonymCapability, TermStore};
use tmerge_types::{FieldName, FieldValue, Term, TermId};

/// Result of merging a set of fields.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldMergeOutcome {
    Complete,
    /// Fields whose trunk was already at its cardinality limit.
    Partial { skipped: Vec<FieldName> },
}

impl FieldMergeOutcome {
    fn from_skipped(skipped: Vec<FieldName>) -> Self {
        if skipped.is_empty() {
            Self::Complete
        } else {
            Self::Partial { skipped }
        }
    }

    pub fn skipped(&self) -> &[FieldName] {
        match self {
            Self::Complete => &[],
            Self::Partial { skipped } => skipped,
        }
    }
}

/// Appends branch field values onto the trunk.
pub struct FieldMerger<'a> {
    store: &'a dyn TermStore,
}

impl<'a> FieldMerger<'a> {
    pub fn new(store: &'a dyn TermStore) -> Self {
        Self { store }
    }

    /// Merge the values of `fields` from `branch` into `trunk`.
    ///
    /// Every field must exist on the trunk's bundle; callers filter out
    /// missing fields beforehand and report them once.
    pub fn merge_field_values(
        &self,
        branch: TermId,
        trunk: &Term,
        fields: &[FieldName],
    ) -> StoreResult<FieldMergeOutcome> {
        let mut skipped = Vec::new();
        for field in fields {
            let incoming = self.store.get_field_values(branch, field)?;
            if !self.merge_into(trunk, field, incoming)? {
                skipped.push(field.clone());
            }
        }
        Ok(FieldMergeOutcome::from_skipped(skipped))
    }

    /// Merge the branch's name and its existing synonyms into the trunk's
    /// synonym fields.
    pub fn merge_synonyms(
        &self,
        branch: &Term,
        trunk: &Term,
        fields: &[FieldName],
        synonyms: &dyn SynonymCapability,
    ) -> StoreResult<FieldMergeOutcome> {
        let mut incoming = vec![FieldValue::text(branch.name.as_str())];
        incoming.extend(synonyms.synonyms(branch)?);

        let mut skipped = Vec::new();
        for field in fields {
            if !self.merge_into(trunk, field, incoming.clone())? {
                skipped.push(field.clone());
            }
        }
        Ok(FieldMergeOutcome::from_skipped(skipped))
    }

    /// Append `incoming` to one trunk field. Returns `false` if the field
    /// was skipped because the trunk was already full, whether or not the
    /// branch had anything new.
    fn merge_into(&self, trunk: &Term, field: &FieldName, incoming: Vec<FieldValue>) -> StoreResult<bool> {
        let cardinality = self
            .store
            .field_cardinality(trunk.bundle(), field)?
            .ok_or_else(|| StoreError::FieldNotDefined {
                bundle: trunk.bundle().clone(),
                field: field.clone(),
            })?;

        let mut values = self.store.get_field_values(trunk.id, field)?;
        if cardinality.is_full(values.len()) {
            debug!(trunk = %trunk.id, field = %field, limit = %cardinality, "trunk field is full; skipped");
            return Ok(false);
        }
        let mut fresh: Vec<FieldValue> = Vec::new();
        for value in incoming {
            if !values.contains(&value) && !fresh.contains(&value) {
                fresh.push(value);
            }
        }
        if fresh.is_empty() {
            trace!(trunk = %trunk.id, field = %field, "nothing new to merge");
            return Ok(true);
        }

        let offered = fresh.len();
        values.extend(fresh);
        let before = values.len();
        cardinality.truncate(&mut values);
        debug!(
            trunk = %trunk.id,
            field = %field,
            offered,
            dropped = before - values.len(),
            "merged field values"
        );
        self.store.set_field_values(trunk.id, field, values)?;
        Ok(true)
    }
}
