use thiserror::Error;

/// Errors produced when parsing or converting foundation types.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid term id: {0}")]
    InvalidTermId(String),

    #[error("invalid entity id: {0} (expected <type>/<id>)")]
    InvalidEntityId(String),

    #[error("invalid cardinality: {0} (expected -1 or a positive integer)")]
    InvalidCardinality(i64),
}
