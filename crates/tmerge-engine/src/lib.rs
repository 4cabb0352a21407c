//! The taxonomy term merge engine.
//!
//! Merging folds one or more *branch* terms into a single *trunk* term. For
//! each branch the engine runs, in order:
//!
//! 1. [`ReferenceConsolidator`]: every entity reference to the branch is
//!    rewritten to point at the trunk, optionally collapsing duplicates.
//! 2. [`FieldMerger`]: values of the configured fields (and the branch name
//!    plus its synonyms, into the synonym fields) are appended to the trunk
//!    within each field's cardinality.
//! 3. [`BranchDisposal`]: an optional redirect is installed and the branch
//!    is deleted unless the settings keep it.
//!
//! [`MergeValidator`] runs once before any of this and rejects merges whose
//! trunk is a branch or lies below one. [`MergePlan`] ties the steps
//! together for a single branch; driving a plan over many branches in
//! chunks is the job of the batch orchestrator.
//!
//! # Modules
//!
//! - [`error`]: validation, configuration, per-branch and fatal errors
//! - [`settings`]: [`MergeSettings`] and [`RedirectSpec`]
//! - [`request`]: the immutable [`MergeRequest`]
//! - [`config`]: TOML settings loading
//! - [`validator`]: merge legality
//! - [`consolidator`]: entity reference rewriting
//! - [`fields`]: field and synonym value merging
//! - [`disposal`]: redirects, re-parenting, deletion
//! - [`plan`]: per-branch pipeline

pub mod config;
pub mod consolidator;
pub mod disposal;
pub mod error;
pub mod fields;
pub mod plan;
pub mod request;
pub mod settings;
pub mod validator;

#[cfg(test)]
mod fixtures;

pub use config::load_settings;
pub use consolidator::ReferenceConsolidator;
pub use disposal::{BranchDisposal, DisposalOutcome, RedirectOutcome};
pub use error::{
    BranchError, BranchStage, Capability, ConfigurationError, MergeError, MergeResult,
    SettingsError, ValidationError,
};
pub use fields::{FieldMergeOutcome, FieldMerger};
pub use plan::{BranchOutcome, Collaborators, MergePlan};
pub use request::MergeRequest;
pub use settings::{MergeSettings, RedirectSpec, DEFAULT_STEP};
pub use validator::MergeValidator;
