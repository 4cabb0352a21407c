//! Optional collaborators the merge engine uses when they are present.
//!
//! Neither capability is required. When a merge asks for redirects or
//! synonyms and the matching capability is absent, the engine reports a
//! configuration problem once and carries on without it.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tmerge_types::{FieldName, FieldValue, Term};

use crate::error::StoreResult;

/// HTTP status requested for a redirect.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RedirectStatus {
    /// Whatever the redirect backend considers its default code.
    Default,
    /// An explicit HTTP status code (e.g. 301).
    Code(u16),
}

/// An installed redirect from one path to another.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Redirect {
    pub from: String,
    pub to: String,
    pub status: u16,
}

/// Errors reported by a redirect backend.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RedirectError {
    /// The backend cannot create redirects at all.
    #[error("redirect capability unavailable")]
    Unavailable,

    /// The backend refused this particular redirect.
    #[error("redirect failed: {0}")]
    Failed(String),
}

/// Installs HTTP redirects from a branch term's page to the trunk's.
pub trait RedirectCapability: Send + Sync {
    fn install_redirect(
        &self,
        from_path: &str,
        to_path: &str,
        status: RedirectStatus,
    ) -> Result<(), RedirectError>;
}

/// Supplies the synonyms a term already carries, so they follow the term
/// into the trunk when it is merged away.
pub trait SynonymCapability: Send + Sync {
    fn synonyms(&self, term: &Term) -> StoreResult<Vec<FieldValue>>;
}

/// Synonyms read from a fixed set of fields on the term itself.
#[derive(Clone, Debug, Default)]
pub struct FieldSynonyms {
    fields: Vec<FieldName>,
}

impl FieldSynonyms {
    pub fn new(fields: impl IntoIterator<Item = FieldName>) -> Self {
        Self {
            fields: fields.into_iter().collect(),
        }
    }
}

impl SynonymCapability for FieldSynonyms {
    fn synonyms(&self, term: &Term) -> StoreResult<Vec<FieldValue>> {
        let mut out: Vec<FieldValue> = Vec::new();
        for field in &self.fields {
            for value in term.field(field.as_str()) {
                if !out.contains(value) {
                    out.push(value.clone());
                }
            }
        }
        Ok(out)
    }
}
