use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tmerge_types::TermId;

use crate::settings::MergeSettings;

/// One merge: which branches fold into which trunk, and how.
///
/// Branch order is preserved; it is the order in which branches are
/// processed. A branch listed twice is kept at its first position only.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeRequest {
    branch_ids: Vec<TermId>,
    trunk_id: TermId,
    settings: MergeSettings,
}

impl MergeRequest {
    pub fn new(
        branch_ids: impl IntoIterator<Item = TermId>,
        trunk_id: TermId,
        settings: MergeSettings,
    ) -> Self {
        let mut seen = HashSet::new();
        let branch_ids = branch_ids.into_iter().filter(|id| seen.insert(*id)).collect();
        Self {
            branch_ids,
            trunk_id,
            settings,
        }
    }

    pub fn branch_ids(&self) -> &[TermId] {
        &self.branch_ids
    }

    pub fn trunk_id(&self) -> TermId {
        self.trunk_id
    }

    pub fn settings(&self) -> &MergeSettings {
        &self.settings
    }
}
