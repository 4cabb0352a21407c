//! The [`TermStore`] trait defining the term/entity storage interface.
//!
//! Any backend (in-memory, SQL, a CMS bridge) implements this trait to let
//! the merge engine read the vocabulary tree and rewrite term data.

use tmerge_types::{Cardinality, EntityId, FieldName, FieldValue, Term, TermId, TreeEntry, VocabularyId};

use crate::error::StoreResult;

/// Storage backend for terms, their field values, and entity references.
///
/// Implementations must be thread-safe (`Send + Sync`). Every call must
/// reflect the current state of the store: the merge engine mutates the tree
/// while it runs and never caches reads across calls.
///
/// Errors that mean "the store is unreachable" must be reported as
/// [`StoreError::Unavailable`](crate::StoreError::Unavailable); every other
/// variant is treated as a failure of the single item being touched.
pub trait TermStore: Send + Sync {
    /// Load one term with its field values.
    ///
    /// Returns `Ok(None)` if the term does not exist.
    fn load_term(&self, id: TermId) -> StoreResult<Option<Term>>;

    /// Depth-annotated listing of a vocabulary, parents before children.
    ///
    /// With `root = None` the whole vocabulary is listed and root terms have
    /// depth 0. With `root = Some(t)` only the descendants of `t` are listed
    /// (not `t` itself) and the children of `t` have depth 0.
    fn load_tree(&self, vocabulary: &VocabularyId, root: Option<TermId>)
        -> StoreResult<Vec<TreeEntry>>;

    /// Direct children of a term, if the backend keeps an index by parent.
    ///
    /// Backends without such an index return `Ok(None)` and callers fall
    /// back to scanning [`load_tree`](Self::load_tree).
    fn children(&self, _vocabulary: &VocabularyId, _parent: TermId) -> StoreResult<Option<Vec<TermId>>> {
        Ok(None)
    }

    /// Move a term under a new parent (or to the root with `None`).
    fn set_parent(&self, term: TermId, parent: Option<TermId>) -> StoreResult<()>;

    /// Values of one field on a term, in stored order.
    ///
    /// A field with no values yields an empty vec.
    fn get_field_values(&self, term: TermId, field: &FieldName) -> StoreResult<Vec<FieldValue>>;

    /// Replace all values of one field on a term.
    fn set_field_values(
        &self,
        term: TermId,
        field: &FieldName,
        values: Vec<FieldValue>,
    ) -> StoreResult<()>;

    /// Cardinality of a field on a bundle.
    ///
    /// Returns `Ok(None)` if the field is not defined on the bundle.
    fn field_cardinality(
        &self,
        bundle: &VocabularyId,
        field: &FieldName,
    ) -> StoreResult<Option<Cardinality>>;

    /// Non-base fields of a bundle, the ones whose values may be merged.
    fn mergeable_fields(&self, bundle: &VocabularyId) -> StoreResult<Vec<FieldName>>;

    /// Every `(entity, field)` pair that currently references `term`.
    ///
    /// Each pair appears at most once even if the field holds several
    /// references to the term.
    fn find_referencing_entities(&self, term: TermId) -> StoreResult<Vec<(EntityId, FieldName)>>;

    /// The term references held by one field of an entity, in stored order.
    fn entity_references(&self, entity: &EntityId, field: &FieldName) -> StoreResult<Vec<TermId>>;

    /// Replace the term references held by one field of an entity.
    fn set_entity_references(
        &self,
        entity: &EntityId,
        field: &FieldName,
        references: Vec<TermId>,
    ) -> StoreResult<()>;

    /// Replace every reference to `from` with `to` in one field of an entity,
    /// keeping positions.
    fn rewrite_reference(
        &self,
        entity: &EntityId,
        field: &FieldName,
        from: TermId,
        to: TermId,
    ) -> StoreResult<()> {
        let rewritten: Vec<TermId> = self
            .entity_references(entity, field)?
            .into_iter()
            .map(|id| if id == from { to } else { id })
            .collect();
        self.set_entity_references(entity, field, rewritten)
    }

    /// Delete a term. Returns `true` if the term existed.
    fn delete_term(&self, term: TermId) -> StoreResult<bool>;

    /// Canonical location of a term, used as a redirect source or target.
    fn canonical_path(&self, term: TermId) -> String {
        format!("taxonomy/term/{term}")
    }
}
