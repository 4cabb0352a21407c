//! What happens to a branch term once its data has moved to the trunk.
//!
//! The redirect goes in first, while the branch's path still resolves.
//! Then, unless the branch is kept, its children move under the trunk and
//! the branch is deleted. Deletion must come last for a branch: nothing can
//! read the branch afterwards.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use tmerge_hierarchy::HierarchyResolver;
use tmerge_store::{RedirectCapability, StoreError, StoreResult, TermStore};
use tmerge_types::{Term, TermId};

use crate::settings::RedirectSpec;

/// What became of the redirect for one branch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum RedirectOutcome {
    NotRequested,
    Installed,
    /// Requested, but no redirect capability was supplied.
    Unavailable,
    /// The capability refused; the branch was disposed of regardless.
    Failed(String),
}

/// Result of disposing of one branch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisposalOutcome {
    pub deleted: bool,
    /// Children moved under the trunk before deletion.
    pub reparented: usize,
    pub redirect: RedirectOutcome,
}

/// Deletes (or keeps) branch terms and installs their redirects.
pub struct BranchDisposal<'a> {
    store: &'a dyn TermStore,
    redirects: Option<&'a dyn RedirectCapability>,
}

impl<'a> BranchDisposal<'a> {
    pub fn new(store: &'a dyn TermStore, redirects: Option<&'a dyn RedirectCapability>) -> Self {
        Self { store, redirects }
    }

    /// Dispose of `branch` after it has been merged into `trunk`.
    ///
    /// Redirect failures are recorded in the outcome and never fail the
    /// disposal. Failures to re-parent or delete are returned as errors.
    pub fn dispose(
        &self,
        branch: &Term,
        trunk: TermId,
        keep: bool,
        redirect: RedirectSpec,
    ) -> StoreResult<DisposalOutcome> {
        let redirect = self.install_redirect(branch.id, trunk, redirect);

        if keep {
            debug!(branch = %branch.id, "branch kept");
            return Ok(DisposalOutcome {
                deleted: false,
                reparented: 0,
                redirect,
            });
        }

        let children = HierarchyResolver::new(self.store).children(&branch.vocabulary, branch.id)?;
        for child in &children {
            self.store.set_parent(*child, Some(trunk))?;
        }

        if !self.store.delete_term(branch.id)? {
            return Err(StoreError::TermNotFound(branch.id));
        }
        debug!(branch = %branch.id, reparented = children.len(), "branch deleted");

        Ok(DisposalOutcome {
            deleted: true,
            reparented: children.len(),
            redirect,
        })
    }

    fn install_redirect(&self, branch: TermId, trunk: TermId, spec: RedirectSpec) -> RedirectOutcome {
        let Some(status) = spec.status() else {
            return RedirectOutcome::NotRequested;
        };
        let Some(capability) = self.redirects else {
            return RedirectOutcome::Unavailable;
        };

        let from = self.store.canonical_path(branch);
        let to = self.store.canonical_path(trunk);
        match capability.install_redirect(&from, &to, status) {
            Ok(()) => {
                debug!(from = %from, to = %to, "redirect installed");
                RedirectOutcome::Installed
            }
            Err(e) => {
                warn!(branch = %branch, error = %e, "could not install redirect");
                RedirectOutcome::Failed(e.to_string())
            }
        }
    }
}
