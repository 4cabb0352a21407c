use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::field::FieldValue;
use crate::ids::{FieldName, TermId, VocabularyId};

/// A taxonomy term as seen through the store.
///
/// The store owns terms; this is a detached copy. Mutations go through the
/// store contract, never through this value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Term {
    pub id: TermId,
    pub vocabulary: VocabularyId,
    pub name: String,
    /// Parent term, or `None` for a root term.
    #[serde(default)]
    pub parent: Option<TermId>,
    /// Field values keyed by field name, in stored order.
    #[serde(default)]
    pub fields: BTreeMap<FieldName, Vec<FieldValue>>,
}

impl Term {
    pub fn new(id: TermId, vocabulary: VocabularyId, name: impl Into<String>) -> Self {
        Self {
            id,
            vocabulary,
            name: name.into(),
            parent: None,
            fields: BTreeMap::new(),
        }
    }

    /// Builder-style parent assignment.
    pub fn with_parent(mut self, parent: TermId) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Builder-style field assignment.
    pub fn with_field(mut self, field: impl Into<FieldName>, values: Vec<FieldValue>) -> Self {
        self.fields.insert(field.into(), values);
        self
    }

    /// Terms are bundled by vocabulary.
    pub fn bundle(&self) -> &VocabularyId {
        &self.vocabulary
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Values of a field, or an empty slice when the field has none.
    pub fn field(&self, name: &str) -> &[FieldValue] {
        self.fields.get(name).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// One row of a depth-annotated vocabulary tree.
///
/// Depth is relative to the root of the listing: `0` for the top-level rows
/// of the listing, `1` for their children, and so on.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeEntry {
    pub id: TermId,
    pub parent: Option<TermId>,
    pub depth: usize,
    pub name: String,
}
