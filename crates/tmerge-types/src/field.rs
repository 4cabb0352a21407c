use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::ids::TermId;

/// A single value held by a field instance.
///
/// Equality is by value: two `Text` values with the same string are the same
/// value regardless of where they came from. Merging relies on this when it
/// decides whether a branch value is already present on the trunk.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// A reference to another term (`{"target_id": 5}` on the wire).
    Reference { target_id: TermId },
    Integer(i64),
    Text(String),
}

impl FieldValue {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    pub fn reference(target: TermId) -> Self {
        Self::Reference { target_id: target }
    }

    /// The referenced term, if this value is a term reference.
    pub fn as_reference(&self) -> Option<TermId> {
        match self {
            Self::Reference { target_id } => Some(*target_id),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reference { target_id } => write!(f, "term:{target_id}"),
            Self::Integer(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// Maximum number of values a field instance may hold.
///
/// Serialized as an integer where `-1` means unlimited, matching the way
/// field storage definitions usually express it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum Cardinality {
    Limited(usize),
    Unlimited,
}

impl Cardinality {
    /// Returns `true` if a field already holding `len` values cannot accept more.
    pub fn is_full(&self, len: usize) -> bool {
        match self {
            Self::Limited(max) => len >= *max,
            Self::Unlimited => false,
        }
    }

    /// Drop trailing values beyond the limit. Unlimited fields are untouched.
    pub fn truncate<T>(&self, values: &mut Vec<T>) {
        if let Self::Limited(max) = self {
            values.truncate(*max);
        }
    }
}

impl TryFrom<i64> for Cardinality {
    type Error = TypeError;

    fn try_from(raw: i64) -> Result<Self, Self::Error> {
        match raw {
            -1 => Ok(Self::Unlimited),
            n if n >= 1 => usize::try_from(n)
                .map(Self::Limited)
                .map_err(|_| TypeError::InvalidCardinality(raw)),
            _ => Err(TypeError::InvalidCardinality(raw)),
        }
    }
}

impl From<Cardinality> for i64 {
    fn from(value: Cardinality) -> Self {
        match value {
            Cardinality::Limited(n) => i64::try_from(n).unwrap_or(i64::MAX),
            Cardinality::Unlimited => -1,
        }
    }
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Limited(n) => write!(f, "{n}"),
            Self::Unlimited => f.write_str("unlimited"),
        }
    }
}
