//! Serializable snapshot of a whole store.
//!
//! Snapshots are how the CLI gets data in and out of an
//! [`InMemoryTermStore`](crate::InMemoryTermStore): load a JSON file, run a
//! merge, write the mutated state back.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tmerge_types::{Cardinality, EntityId, FieldName, Term, TermId, VocabularyId};

use crate::capability::Redirect;
use crate::error::{StoreError, StoreResult};

/// Definition of a field instance on a bundle.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub bundle: VocabularyId,
    pub name: FieldName,
    pub cardinality: Cardinality,
    /// Base fields (name, description, ...) are never offered for merging.
    #[serde(default)]
    pub base: bool,
}

impl FieldDefinition {
    pub fn new(bundle: impl Into<VocabularyId>, name: impl Into<FieldName>, cardinality: Cardinality) -> Self {
        Self {
            bundle: bundle.into(),
            name: name.into(),
            cardinality,
            base: false,
        }
    }
}

/// The term reference fields of one entity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    pub id: EntityId,
    #[serde(default)]
    pub references: BTreeMap<FieldName, Vec<TermId>>,
}

/// Full contents of a store.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    #[serde(default)]
    pub terms: Vec<Term>,
    #[serde(default)]
    pub fields: Vec<FieldDefinition>,
    #[serde(default)]
    pub entities: Vec<EntitySnapshot>,
    #[serde(default)]
    pub redirects: Vec<Redirect>,
}

impl StoreSnapshot {
    pub fn from_json_str(json: &str) -> StoreResult<Self> {
        serde_json::from_str(json).map_err(|e| StoreError::Snapshot(e.to_string()))
    }

    pub fn to_json_string(&self) -> StoreResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| StoreError::Snapshot(e.to_string()))
    }

    /// Read a snapshot from a JSON file.
    pub fn load(path: &Path) -> StoreResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Write a snapshot to a JSON file, replacing it if it exists.
    pub fn save(&self, path: &Path) -> StoreResult<()> {
        let json = self.to_json_string()?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
