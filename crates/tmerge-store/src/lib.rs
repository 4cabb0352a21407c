//! Term/entity store contract for taxonomy term merging.
//!
//! The merge engine never persists anything itself. It reads and mutates
//! terms, field values and entity references through the [`TermStore`]
//! trait defined here, and reaches optional collaborators (redirects,
//! synonyms, advisory locking) through the traits in [`capability`] and
//! [`lock`].
//!
//! # Modules
//!
//! - [`error`]: [`StoreError`], with the fatal / per-item split
//! - [`traits`]: The [`TermStore`] trait
//! - [`capability`]: Optional [`RedirectCapability`] and [`SynonymCapability`]
//! - [`lock`]: The [`MergeLock`] advisory lock collaborator
//! - [`snapshot`]: Serializable [`StoreSnapshot`] of a whole store
//! - [`memory`]: In-memory [`InMemoryTermStore`] for tests and the CLI

pub mod capability;
pub mod error;
pub mod lock;
pub mod memory;
pub mod snapshot;
pub mod traits;

pub use capability::{
    FieldSynonyms, Redirect, RedirectCapability, RedirectError, RedirectStatus, SynonymCapability,
};
pub use error::{LockError, StoreError, StoreResult};
pub use lock::{MergeLock, NoLock};
pub use memory::InMemoryTermStore;
pub use snapshot::{EntitySnapshot, FieldDefinition, StoreSnapshot};
pub use traits::TermStore;
