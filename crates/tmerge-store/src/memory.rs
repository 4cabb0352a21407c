//! In-memory term store for testing and ephemeral use.
//!
//! [`InMemoryTermStore`] keeps terms, field definitions, entity references
//! and installed redirects behind a single `RwLock`. It maintains a
//! parent -> children index, so subtree queries cost the size of the subtree
//! rather than the size of the vocabulary.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;
use tmerge_types::{
    Cardinality, EntityId, FieldName, FieldValue, Term, TermId, TreeEntry, VocabularyId,
};

use crate::capability::{Redirect, RedirectCapability, RedirectError, RedirectStatus};
use crate::error::{StoreError, StoreResult};
use crate::snapshot::{EntitySnapshot, FieldDefinition, StoreSnapshot};
use crate::traits::TermStore;

/// Status used for [`RedirectStatus::Default`] redirects.
pub const DEFAULT_REDIRECT_STATUS: u16 = 301;

#[derive(Debug, Default)]
struct Inner {
    terms: BTreeMap<TermId, Term>,
    /// Forward-edge index: parent -> children.
    children: HashMap<TermId, Vec<TermId>>,
    fields: BTreeMap<(VocabularyId, FieldName), FieldDefinition>,
    entities: BTreeMap<EntityId, BTreeMap<FieldName, Vec<TermId>>>,
    redirects: Vec<Redirect>,
}

impl Inner {
    fn term(&self, id: TermId) -> StoreResult<&Term> {
        self.terms.get(&id).ok_or(StoreError::TermNotFound(id))
    }

    /// Children of `parent`, ordered by name then id.
    fn sorted_children(&self, parent: TermId) -> Vec<TermId> {
        let mut kids: Vec<TermId> = self.children.get(&parent).cloned().unwrap_or_default();
        self.sort_by_name(&mut kids);
        kids
    }

    fn sort_by_name(&self, ids: &mut [TermId]) {
        ids.sort_by(|a, b| {
            let an = self.terms.get(a).map(|t| t.name.as_str()).unwrap_or("");
            let bn = self.terms.get(b).map(|t| t.name.as_str()).unwrap_or("");
            an.cmp(bn).then(a.cmp(b))
        });
    }

    fn link(&mut self, child: TermId, parent: Option<TermId>) {
        if let Some(parent) = parent {
            let kids = self.children.entry(parent).or_default();
            if !kids.contains(&child) {
                kids.push(child);
            }
        }
    }

    fn unlink(&mut self, child: TermId, parent: Option<TermId>) {
        if let Some(parent) = parent {
            if let Some(kids) = self.children.get_mut(&parent) {
                kids.retain(|id| *id != child);
                if kids.is_empty() {
                    self.children.remove(&parent);
                }
            }
        }
    }

    /// Returns `true` if `candidate` is `term` or lies below it.
    fn is_self_or_descendant(&self, term: TermId, candidate: TermId) -> bool {
        let mut cursor = Some(candidate);
        let mut seen = HashSet::new();
        while let Some(id) = cursor {
            if id == term {
                return true;
            }
            if !seen.insert(id) {
                return false;
            }
            cursor = self.terms.get(&id).and_then(|t| t.parent);
        }
        false
    }

    /// Depth-first listing starting from `starts` at depth 0.
    fn walk(&self, starts: Vec<TermId>) -> Vec<TreeEntry> {
        let mut out = Vec::new();
        let mut visited = HashSet::new();
        let mut stack: Vec<(TermId, usize)> = starts.into_iter().rev().map(|id| (id, 0)).collect();
        while let Some((id, depth)) = stack.pop() {
            if !visited.insert(id) {
                continue;
            }
            let Some(term) = self.terms.get(&id) else {
                continue;
            };
            out.push(TreeEntry {
                id,
                parent: term.parent,
                depth,
                name: term.name.clone(),
            });
            for child in self.sorted_children(id).into_iter().rev() {
                stack.push((child, depth + 1));
            }
        }
        out
    }
}

/// An in-memory implementation of [`TermStore`] and [`RedirectCapability`].
///
/// Data is lost when the store is dropped unless it is exported with
/// [`snapshot`](Self::snapshot).
#[derive(Debug, Default)]
pub struct InMemoryTermStore {
    inner: RwLock<Inner>,
}

impl InMemoryTermStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from a snapshot.
    ///
    /// Terms may appear in any order, but every parent must exist in the
    /// same vocabulary as its child.
    pub fn from_snapshot(snapshot: StoreSnapshot) -> StoreResult<Self> {
        let mut inner = Inner::default();
        for term in snapshot.terms {
            let id = term.id;
            if inner.terms.insert(id, term).is_some() {
                return Err(StoreError::Snapshot(format!("duplicate term id {id}")));
            }
        }
        let links: Vec<(TermId, Option<TermId>)> =
            inner.terms.values().map(|t| (t.id, t.parent)).collect();
        for (id, parent) in links {
            if let Some(parent_id) = parent {
                let parent_term = inner.terms.get(&parent_id).ok_or_else(|| {
                    StoreError::Snapshot(format!("term {id} has missing parent {parent_id}"))
                })?;
                let child_vocab = &inner.terms[&id].vocabulary;
                if &parent_term.vocabulary != child_vocab {
                    return Err(StoreError::Snapshot(format!(
                        "term {id} and its parent {parent_id} are in different vocabularies"
                    )));
                }
            }
            inner.link(id, parent);
        }
        for field in snapshot.fields {
            inner
                .fields
                .insert((field.bundle.clone(), field.name.clone()), field);
        }
        for entity in snapshot.entities {
            inner.entities.insert(entity.id, entity.references);
        }
        inner.redirects = snapshot.redirects;

        debug!(terms = inner.terms.len(), entities = inner.entities.len(), "loaded store snapshot");
        Ok(Self {
            inner: RwLock::new(inner),
        })
    }

    /// Export the full store contents.
    pub fn snapshot(&self) -> StoreResult<StoreSnapshot> {
        let inner = self.read()?;
        Ok(StoreSnapshot {
            terms: inner.terms.values().cloned().collect(),
            fields: inner.fields.values().cloned().collect(),
            entities: inner
                .entities
                .iter()
                .map(|(id, references)| EntitySnapshot {
                    id: id.clone(),
                    references: references.clone(),
                })
                .collect(),
            redirects: inner.redirects.clone(),
        })
    }

    /// Add a term. Its parent, if any, must already exist in the same vocabulary.
    pub fn insert_term(&self, term: Term) -> StoreResult<()> {
        let mut inner = self.write()?;
        if inner.terms.contains_key(&term.id) {
            return Err(StoreError::Backend(format!("term {} already exists", term.id)));
        }
        if let Some(parent) = term.parent {
            let parent_term = inner.term(parent)?;
            if parent_term.vocabulary != term.vocabulary {
                return Err(StoreError::Backend(format!(
                    "parent {parent} is not in vocabulary {}",
                    term.vocabulary
                )));
            }
        }
        inner.link(term.id, term.parent);
        inner.terms.insert(term.id, term);
        Ok(())
    }

    /// Define (or redefine) a field on a bundle.
    pub fn define_field(&self, definition: FieldDefinition) -> StoreResult<()> {
        let mut inner = self.write()?;
        inner.fields.insert(
            (definition.bundle.clone(), definition.name.clone()),
            definition,
        );
        Ok(())
    }

    /// Add an entity, or replace one field of an existing entity.
    pub fn insert_entity(
        &self,
        entity: EntityId,
        field: impl Into<FieldName>,
        references: Vec<TermId>,
    ) -> StoreResult<()> {
        let mut inner = self.write()?;
        inner
            .entities
            .entry(entity)
            .or_default()
            .insert(field.into(), references);
        Ok(())
    }

    /// Redirects installed so far, in installation order.
    pub fn redirects(&self) -> StoreResult<Vec<Redirect>> {
        Ok(self.read()?.redirects.clone())
    }

    /// Number of terms across all vocabularies.
    pub fn term_count(&self) -> StoreResult<usize> {
        Ok(self.read()?.terms.len())
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, Inner>> {
        self.inner
            .read()
            .map_err(|e| StoreError::Unavailable(format!("lock poisoned: {e}")))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, Inner>> {
        self.inner
            .write()
            .map_err(|e| StoreError::Unavailable(format!("lock poisoned: {e}")))
    }
}

impl TermStore for InMemoryTermStore {
    fn load_term(&self, id: TermId) -> StoreResult<Option<Term>> {
        Ok(self.read()?.terms.get(&id).cloned())
    }

    fn load_tree(
        &self,
        vocabulary: &VocabularyId,
        root: Option<TermId>,
    ) -> StoreResult<Vec<TreeEntry>> {
        let inner = self.read()?;
        let starts = match root {
            Some(root_id) => match inner.terms.get(&root_id) {
                Some(term) if &term.vocabulary == vocabulary => inner.sorted_children(root_id),
                _ => return Ok(Vec::new()),
            },
            None => {
                let mut roots: Vec<TermId> = inner
                    .terms
                    .values()
                    .filter(|t| &t.vocabulary == vocabulary && t.is_root())
                    .map(|t| t.id)
                    .collect();
                inner.sort_by_name(&mut roots);
                roots
            }
        };
        Ok(inner.walk(starts))
    }

    fn children(&self, vocabulary: &VocabularyId, parent: TermId) -> StoreResult<Option<Vec<TermId>>> {
        let inner = self.read()?;
        let kids = inner
            .sorted_children(parent)
            .into_iter()
            .filter(|id| {
                inner
                    .terms
                    .get(id)
                    .is_some_and(|t| &t.vocabulary == vocabulary)
            })
            .collect();
        Ok(Some(kids))
    }

    fn set_parent(&self, term: TermId, parent: Option<TermId>) -> StoreResult<()> {
        let mut inner = self.write()?;
        let current = inner.term(term)?;
        let old_parent = current.parent;
        let vocabulary = current.vocabulary.clone();
        if let Some(new_parent) = parent {
            let parent_term = inner.term(new_parent)?;
            if parent_term.vocabulary != vocabulary {
                return Err(StoreError::Backend(format!(
                    "parent {new_parent} is not in vocabulary {vocabulary}"
                )));
            }
            if inner.is_self_or_descendant(term, new_parent) {
                return Err(StoreError::Backend(format!(
                    "moving {term} under {new_parent} would create a cycle"
                )));
            }
        }
        inner.unlink(term, old_parent);
        inner.link(term, parent);
        if let Some(t) = inner.terms.get_mut(&term) {
            t.parent = parent;
        }
        Ok(())
    }

    fn get_field_values(&self, term: TermId, field: &FieldName) -> StoreResult<Vec<FieldValue>> {
        let inner = self.read()?;
        Ok(inner.term(term)?.field(field.as_str()).to_vec())
    }

    fn set_field_values(
        &self,
        term: TermId,
        field: &FieldName,
        values: Vec<FieldValue>,
    ) -> StoreResult<()> {
        let mut inner = self.write()?;
        let bundle = inner.term(term)?.vocabulary.clone();
        if !inner.fields.contains_key(&(bundle.clone(), field.clone())) {
            return Err(StoreError::FieldNotDefined {
                bundle,
                field: field.clone(),
            });
        }
        if let Some(t) = inner.terms.get_mut(&term) {
            if values.is_empty() {
                t.fields.remove(field);
            } else {
                t.fields.insert(field.clone(), values);
            }
        }
        Ok(())
    }

    fn field_cardinality(
        &self,
        bundle: &VocabularyId,
        field: &FieldName,
    ) -> StoreResult<Option<Cardinality>> {
        let inner = self.read()?;
        Ok(inner
            .fields
            .get(&(bundle.clone(), field.clone()))
            .map(|def| def.cardinality))
    }

    fn mergeable_fields(&self, bundle: &VocabularyId) -> StoreResult<Vec<FieldName>> {
        let inner = self.read()?;
        Ok(inner
            .fields
            .values()
            .filter(|def| &def.bundle == bundle && !def.base)
            .map(|def| def.name.clone())
            .collect())
    }

    fn find_referencing_entities(&self, term: TermId) -> StoreResult<Vec<(EntityId, FieldName)>> {
        let inner = self.read()?;
        let mut out = Vec::new();
        for (entity, fields) in &inner.entities {
            for (field, refs) in fields {
                if refs.contains(&term) {
                    out.push((entity.clone(), field.clone()));
                }
            }
        }
        Ok(out)
    }

    fn entity_references(&self, entity: &EntityId, field: &FieldName) -> StoreResult<Vec<TermId>> {
        let inner = self.read()?;
        let fields = inner
            .entities
            .get(entity)
            .ok_or_else(|| StoreError::EntityNotFound(entity.clone()))?;
        Ok(fields.get(field).cloned().unwrap_or_default())
    }

    fn set_entity_references(
        &self,
        entity: &EntityId,
        field: &FieldName,
        references: Vec<TermId>,
    ) -> StoreResult<()> {
        let mut inner = self.write()?;
        let fields = inner
            .entities
            .get_mut(entity)
            .ok_or_else(|| StoreError::EntityNotFound(entity.clone()))?;
        if references.is_empty() {
            fields.remove(field);
        } else {
            fields.insert(field.clone(), references);
        }
        Ok(())
    }

    fn rewrite_reference(
        &self,
        entity: &EntityId,
        field: &FieldName,
        from: TermId,
        to: TermId,
    ) -> StoreResult<()> {
        let mut inner = self.write()?;
        let fields = inner
            .entities
            .get_mut(entity)
            .ok_or_else(|| StoreError::EntityNotFound(entity.clone()))?;
        if let Some(refs) = fields.get_mut(field) {
            for id in refs.iter_mut().filter(|id| **id == from) {
                *id = to;
            }
        }
        Ok(())
    }

    fn delete_term(&self, term: TermId) -> StoreResult<bool> {
        let mut inner = self.write()?;
        let Some(removed) = inner.terms.remove(&term) else {
            return Ok(false);
        };
        inner.unlink(term, removed.parent);
        // Orphaned children become roots.
        if let Some(kids) = inner.children.remove(&term) {
            for kid in kids {
                if let Some(t) = inner.terms.get_mut(&kid) {
                    t.parent = None;
                }
            }
        }
        debug!(term = %term, "deleted term");
        Ok(true)
    }
}

impl RedirectCapability for InMemoryTermStore {
    fn install_redirect(
        &self,
        from_path: &str,
        to_path: &str,
        status: RedirectStatus,
    ) -> Result<(), RedirectError> {
        if from_path == to_path {
            return Err(RedirectError::Failed(format!("{from_path} redirects to itself")));
        }
        let status = match status {
            RedirectStatus::Default => DEFAULT_REDIRECT_STATUS,
            RedirectStatus::Code(code) => code,
        };
        let mut inner = self.write().map_err(|e| RedirectError::Failed(e.to_string()))?;
        inner.redirects.retain(|r| r.from != from_path);
        inner.redirects.push(Redirect {
            from: from_path.to_string(),
            to: to_path.to_string(),
            status,
        });
        Ok(())
    }
}
