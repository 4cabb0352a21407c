//! Subtree queries over the live vocabulary tree.
//!
//! Results are never cached: a merge deletes and re-parents terms as it
//! runs, so every query goes back to the store.
//!
//! # Complexity
//!
//! When the store keeps an index by parent ([`TermStore::children`] returns
//! `Some`), [`HierarchyResolver::descendants`] walks only the subtree and
//! costs O(size of subtree) store calls. Otherwise it falls back to one
//! full-vocabulary [`TermStore::load_tree`] scan, which costs O(size of
//! vocabulary).

use std::collections::{HashMap, HashSet};

use tracing::trace;
use tmerge_store::{StoreResult, TermStore};
use tmerge_types::{TermId, TreeEntry, VocabularyId};

/// Resolves descendants and tree listings against a [`TermStore`].
pub struct HierarchyResolver<'a> {
    store: &'a dyn TermStore,
}

impl<'a> HierarchyResolver<'a> {
    pub fn new(store: &'a dyn TermStore) -> Self {
        Self { store }
    }

    /// All terms below `term`, in depth-first order, parents before children.
    ///
    /// The term itself is **not** included. An unknown term has no
    /// descendants.
    pub fn descendants(&self, vocabulary: &VocabularyId, term: TermId) -> StoreResult<Vec<TermId>> {
        match self.store.children(vocabulary, term)? {
            Some(direct) => self.walk_index(vocabulary, term, direct),
            None => self.scan_tree(vocabulary, term),
        }
    }

    /// Direct children of `term`, in tree order.
    pub fn children(&self, vocabulary: &VocabularyId, term: TermId) -> StoreResult<Vec<TermId>> {
        if let Some(direct) = self.store.children(vocabulary, term)? {
            return Ok(direct);
        }
        Ok(self
            .store
            .load_tree(vocabulary, Some(term))?
            .into_iter()
            .filter(|entry| entry.depth == 0)
            .map(|entry| entry.id)
            .collect())
    }

    /// The whole vocabulary as `(id, depth, name)` rows in tree order.
    pub fn full_tree(&self, vocabulary: &VocabularyId) -> StoreResult<Vec<TreeEntry>> {
        self.store.load_tree(vocabulary, None)
    }

    /// Union of `roots` and every term below any of them.
    pub fn subtree_set(
        &self,
        vocabulary: &VocabularyId,
        roots: &[TermId],
    ) -> StoreResult<HashSet<TermId>> {
        let mut set: HashSet<TermId> = HashSet::with_capacity(roots.len());
        for root in roots {
            if !set.insert(*root) {
                continue;
            }
            set.extend(self.descendants(vocabulary, *root)?);
        }
        Ok(set)
    }

    fn walk_index(
        &self,
        vocabulary: &VocabularyId,
        term: TermId,
        direct: Vec<TermId>,
    ) -> StoreResult<Vec<TermId>> {
        let mut visited = HashSet::new();
        visited.insert(term);
        let mut result = Vec::new();
        let mut stack: Vec<TermId> = direct.into_iter().rev().collect();

        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            result.push(current);
            let kids = self.store.children(vocabulary, current)?.unwrap_or_default();
            stack.extend(kids.into_iter().rev());
        }

        trace!(term = %term, count = result.len(), "resolved descendants via parent index");
        Ok(result)
    }

    fn scan_tree(&self, vocabulary: &VocabularyId, term: TermId) -> StoreResult<Vec<TermId>> {
        let tree = self.store.load_tree(vocabulary, None)?;
        let mut children: HashMap<TermId, Vec<TermId>> = HashMap::new();
        for entry in &tree {
            if let Some(parent) = entry.parent {
                children.entry(parent).or_default().push(entry.id);
            }
        }

        let mut visited = HashSet::new();
        visited.insert(term);
        let mut result = Vec::new();
        let mut stack: Vec<TermId> = children
            .get(&term)
            .map(|kids| kids.iter().rev().copied().collect())
            .unwrap_or_default();

        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            result.push(current);
            if let Some(kids) = children.get(&current) {
                stack.extend(kids.iter().rev().copied());
            }
        }

        trace!(term = %term, count = result.len(), scanned = tree.len(), "resolved descendants via full scan");
        Ok(result)
    }
}
