//! Foundation types for taxonomy term merging.
//!
//! Every other `tmerge-*` crate depends on this one. The types here are plain
//! values: they carry no storage handles and perform no I/O.
//!
//! # Key Types
//!
//! - [`TermId`]: Opaque handle of a taxonomy term
//! - [`VocabularyId`]: Machine name of a vocabulary (also the term bundle)
//! - [`EntityId`]: An entity that may reference terms (`node/12`)
//! - [`FieldName`]: Name of a field instance on a bundle
//! - [`FieldValue`]: A single value stored in a field
//! - [`Cardinality`]: Maximum number of values a field may hold
//! - [`Term`] / [`TreeEntry`]: A term and its depth-annotated tree position

pub mod error;
pub mod field;
pub mod ids;
pub mod term;

pub use error::TypeError;
pub use field::{Cardinality, FieldValue};
pub use ids::{EntityId, FieldName, TermId, VocabularyId};
pub use term::{Term, TreeEntry};
