use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Opaque handle of a taxonomy term.
///
/// Term ids are assigned by the external store and never reused while the
/// term exists. Ordering follows the numeric value, which gives stable output
/// in listings and reports.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TermId(u64);

impl TermId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw numeric id.
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl From<u64> for TermId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl FromStr for TermId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u64>()
            .map(Self)
            .map_err(|_| TypeError::InvalidTermId(s.to_string()))
    }
}

impl fmt::Debug for TermId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TermId({})", self.0)
    }
}

impl fmt::Display for TermId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Machine name of a vocabulary.
///
/// Terms are bundled by vocabulary, so the same value doubles as the bundle
/// name when looking up field definitions.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VocabularyId(String);

impl VocabularyId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for VocabularyId {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl fmt::Display for VocabularyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Name of a field instance on a bundle (e.g. `field_notes`).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldName(String);

impl FieldName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for FieldName {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<String> for FieldName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl Borrow<str> for FieldName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FieldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An entity that can hold term references, addressed as `<type>/<id>`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntityId {
    entity_type: String,
    id: u64,
}

impl EntityId {
    pub fn new(entity_type: impl Into<String>, id: u64) -> Self {
        Self {
            entity_type: entity_type.into(),
            id,
        }
    }

    /// Shorthand for a `node/<id>` entity.
    pub fn node(id: u64) -> Self {
        Self::new("node", id)
    }

    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

impl FromStr for EntityId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, raw) = s
            .split_once('/')
            .ok_or_else(|| TypeError::InvalidEntityId(s.to_string()))?;
        if kind.is_empty() {
            return Err(TypeError::InvalidEntityId(s.to_string()));
        }
        let id = raw
            .parse::<u64>()
            .map_err(|_| TypeError::InvalidEntityId(s.to_string()))?;
        Ok(Self::new(kind, id))
    }
}

impl TryFrom<String> for EntityId {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<EntityId> for String {
    fn from(value: EntityId) -> Self {
        value.to_string()
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({}/{})", self.entity_type, self.id)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.entity_type, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn term_id_parses_with_whitespace() {
        let id: TermId = " 42 ".parse().unwrap();
        assert_eq!(id, TermId::new(42));
        assert_eq!(id.to_string(), "42");
    }

    #[test]
    fn term_id_rejects_garbage() {
        let err = "forty-two".parse::<TermId>().unwrap_err();
        assert_eq!(err, TypeError::InvalidTermId("forty-two".into()));
    }

    #[test]
    fn term_id_serializes_as_plain_number() {
        let json = serde_json::to_string(&TermId::new(7)).unwrap();
        assert_eq!(json, "7");
    }

    #[test]
    fn entity_id_display_and_parse() {
        let id = EntityId::node(12);
        assert_eq!(id.to_string(), "node/12");
        let parsed: EntityId = "node/12".parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn entity_id_rejects_missing_type() {
        assert!("/12".parse::<EntityId>().is_err());
        assert!("node".parse::<EntityId>().is_err());
        assert!("node/abc".parse::<EntityId>().is_err());
    }

    #[test]
    fn entity_id_serde_as_string() {
        let id = EntityId::new("user", 3);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"user/3\"");
        let back: EntityId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn field_name_borrows_as_str() {
        let mut set = std::collections::BTreeSet::new();
        set.insert(FieldName::from("field_notes"));
        assert!(set.contains("field_notes"));
    }
}
