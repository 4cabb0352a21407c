//! Merge settings.

use std::collections::BTreeSet;
use std::fmt;
use std::num::NonZeroUsize;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tmerge_store::RedirectStatus;
use tmerge_types::FieldName;

/// Branch terms processed per batch increment unless configured otherwise.
pub const DEFAULT_STEP: NonZeroUsize = match NonZeroUsize::new(40) {
    Some(step) => step,
    None => unreachable!(),
};

/// Whether, and with which status, to redirect a branch's page to the trunk.
///
/// On the wire this is `"none"`, `"default"`, or an HTTP status code. The
/// legacy integer sentinels `-1` (no redirect) and `0` (backend default)
/// are accepted as well.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawRedirect", into = "RawRedirect")]
pub enum RedirectSpec {
    /// Do not install a redirect.
    #[default]
    None,
    /// Redirect with whatever code the redirect backend uses by default.
    Default,
    /// Redirect with an explicit 3xx status code.
    Code(u16),
}

impl RedirectSpec {
    /// The status to hand to the redirect capability, or `None` when no
    /// redirect was asked for.
    pub fn status(&self) -> Option<RedirectStatus> {
        match self {
            Self::None => None,
            Self::Default => Some(RedirectStatus::Default),
            Self::Code(code) => Some(RedirectStatus::Code(*code)),
        }
    }

    pub fn is_requested(&self) -> bool {
        !matches!(self, Self::None)
    }

    fn from_code(code: i64) -> Result<Self, String> {
        match code {
            -1 => Ok(Self::None),
            0 => Ok(Self::Default),
            300..=399 => Ok(Self::Code(code as u16)),
            other => Err(format!("{other} is not a redirect status code")),
        }
    }
}

impl FromStr for RedirectSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "default" => Ok(Self::Default),
            other => other
                .parse::<i64>()
                .map_err(|_| format!("expected none, default or a status code, got {other:?}"))
                .and_then(Self::from_code),
        }
    }
}

impl fmt::Display for RedirectSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("none"),
            Self::Default => f.write_str("default"),
            Self::Code(code) => write!(f, "{code}"),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum RawRedirect {
    Code(i64),
    Name(String),
}

impl TryFrom<RawRedirect> for RedirectSpec {
    type Error = String;

    fn try_from(raw: RawRedirect) -> Result<Self, Self::Error> {
        match raw {
            RawRedirect::Code(code) => Self::from_code(code),
            RawRedirect::Name(name) => name.parse(),
        }
    }
}

impl From<RedirectSpec> for RawRedirect {
    fn from(spec: RedirectSpec) -> Self {
        match spec {
            RedirectSpec::Code(code) => Self::Code(i64::from(code)),
            other => Self::Name(other.to_string()),
        }
    }
}

/// How a merge treats the branch terms and their data.
///
/// Immutable once built: construct with [`Default`] and the `with_*`
/// builders, or load from TOML with
/// [`from_toml_str`](Self::from_toml_str).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeSettings {
    keep_branch_terms: bool,
    merge_fields: BTreeSet<FieldName>,
    keep_only_unique: bool,
    redirect: RedirectSpec,
    synonym_fields: BTreeSet<FieldName>,
    step: NonZeroUsize,
}

impl Default for MergeSettings {
    fn default() -> Self {
        Self {
            keep_branch_terms: false,
            merge_fields: BTreeSet::new(),
            keep_only_unique: true,
            redirect: RedirectSpec::None,
            synonym_fields: BTreeSet::new(),
            step: DEFAULT_STEP,
        }
    }
}

impl MergeSettings {
    /// Keep branch terms after their data has moved to the trunk.
    pub fn keep_branch_terms(&self) -> bool {
        self.keep_branch_terms
    }

    /// Fields whose branch values are appended to the trunk.
    pub fn merge_fields(&self) -> &BTreeSet<FieldName> {
        &self.merge_fields
    }

    /// Collapse duplicate references on an entity field after rewriting.
    pub fn keep_only_unique(&self) -> bool {
        self.keep_only_unique
    }

    pub fn redirect(&self) -> RedirectSpec {
        self.redirect
    }

    /// Trunk fields that receive branch names and synonyms.
    pub fn synonym_fields(&self) -> &BTreeSet<FieldName> {
        &self.synonym_fields
    }

    /// Branch terms processed per batch increment.
    pub fn step(&self) -> NonZeroUsize {
        self.step
    }

    pub fn with_keep_branch_terms(mut self, keep: bool) -> Self {
        self.keep_branch_terms = keep;
        self
    }

    pub fn with_merge_fields<I, F>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = F>,
        F: Into<FieldName>,
    {
        self.merge_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_keep_only_unique(mut self, unique: bool) -> Self {
        self.keep_only_unique = unique;
        self
    }

    pub fn with_redirect(mut self, redirect: RedirectSpec) -> Self {
        self.redirect = redirect;
        self
    }

    pub fn with_synonym_fields<I, F>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = F>,
        F: Into<FieldName>,
    {
        self.synonym_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_step(mut self, step: NonZeroUsize) -> Self {
        self.step = step;
        self
    }
}
