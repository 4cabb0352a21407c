//! Trunk term selection.
//!
//! A caller choosing the trunk either picks it from a list (small
//! vocabularies) or types its name (large ones). [`TrunkWidget`] is the
//! closed set of those input styles and [`TrunkPicker`] carries whatever
//! each style needs to turn user input into a [`TermId`].

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tmerge_types::{TermId, TreeEntry, VocabularyId};

use crate::error::{HierarchyError, HierarchyResult};
use crate::resolver::HierarchyResolver;

/// Vocabularies with more terms than this default to autocomplete input.
pub const AUTOCOMPLETE_THRESHOLD: usize = 200;

/// How the trunk term is entered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrunkWidget {
    Select,
    Autocomplete,
}

impl TrunkWidget {
    /// Default widget for a vocabulary of `size` terms.
    pub fn for_tree_size(size: usize) -> Self {
        if size > AUTOCOMPLETE_THRESHOLD {
            Self::Autocomplete
        } else {
            Self::Select
        }
    }

    /// An explicit request wins over the size-based default.
    pub fn choose(requested: Option<Self>, size: usize) -> Self {
        requested.unwrap_or_else(|| Self::for_tree_size(size))
    }
}

impl FromStr for TrunkWidget {
    type Err = HierarchyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "select" => Ok(Self::Select),
            "autocomplete" => Ok(Self::Autocomplete),
            other => Err(HierarchyError::UnknownWidget(other.to_string())),
        }
    }
}

impl fmt::Display for TrunkWidget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Select => f.write_str("select"),
            Self::Autocomplete => f.write_str("autocomplete"),
        }
    }
}

/// One selectable term with its display label.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrunkOption {
    pub id: TermId,
    pub label: String,
}

/// Label a tree row as `"--Name [tid: 7]"`, one dash per depth level.
pub fn option_label(entry: &TreeEntry) -> String {
    format!("{}{} [tid: {}]", "-".repeat(entry.depth), entry.name, entry.id)
}

/// Every term of the tree as a labelled option, for picking branches.
pub fn branch_options(tree: &[TreeEntry]) -> Vec<TrunkOption> {
    tree.iter()
        .map(|entry| TrunkOption {
            id: entry.id,
            label: option_label(entry),
        })
        .collect()
}

/// A trunk input, ready to resolve what the user entered.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TrunkPicker {
    /// Pick from a fixed list that already excludes branches and their subtrees.
    Select { options: Vec<TrunkOption> },
    /// Type a term name; names are matched against the whole vocabulary.
    Autocomplete {
        vocabulary: VocabularyId,
        tree: Vec<TreeEntry>,
        excluded: HashSet<TermId>,
    },
}

impl TrunkPicker {
    /// Build the picker for `branches` in `vocabulary`.
    ///
    /// With no branches chosen yet there is nothing to merge into, so the
    /// select list is empty.
    pub fn build(
        resolver: &HierarchyResolver<'_>,
        vocabulary: &VocabularyId,
        branches: &[TermId],
        requested: Option<TrunkWidget>,
    ) -> HierarchyResult<Self> {
        let tree = resolver.full_tree(vocabulary)?;
        let excluded = resolver.subtree_set(vocabulary, branches)?;

        Ok(match TrunkWidget::choose(requested, tree.len()) {
            TrunkWidget::Select => {
                let options = if branches.is_empty() {
                    Vec::new()
                } else {
                    tree.iter()
                        .filter(|entry| !excluded.contains(&entry.id))
                        .map(|entry| TrunkOption {
                            id: entry.id,
                            label: option_label(entry),
                        })
                        .collect()
                };
                Self::Select { options }
            }
            TrunkWidget::Autocomplete => Self::Autocomplete {
                vocabulary: vocabulary.clone(),
                tree,
                excluded,
            },
        })
    }

    pub fn widget(&self) -> TrunkWidget {
        match self {
            Self::Select { .. } => TrunkWidget::Select,
            Self::Autocomplete { .. } => TrunkWidget::Autocomplete,
        }
    }

    /// Turn user input into a trunk id.
    ///
    /// Select input is a term id that must be one of the options.
    /// Autocomplete input is a term name that must match exactly one term.
    pub fn resolve(&self, input: &str) -> HierarchyResult<TermId> {
        match self {
            Self::Select { options } => {
                let id: TermId = input
                    .parse()
                    .map_err(|_| HierarchyError::InvalidTermId(input.to_string()))?;
                if options.iter().any(|o| o.id == id) {
                    Ok(id)
                } else {
                    Err(HierarchyError::NotACandidate(id))
                }
            }
            Self::Autocomplete {
                vocabulary,
                tree,
                excluded,
            } => {
                let name = input.trim();
                let matches: Vec<TermId> = tree
                    .iter()
                    .filter(|entry| entry.name == name)
                    .map(|entry| entry.id)
                    .collect();
                match matches.as_slice() {
                    [] => Err(HierarchyError::UnknownName {
                        name: name.to_string(),
                        vocabulary: vocabulary.clone(),
                    }),
                    [id] if excluded.contains(id) => Err(HierarchyError::NotACandidate(*id)),
                    [id] => Ok(*id),
                    _ => Err(HierarchyError::AmbiguousName {
                        name: name.to_string(),
                        candidates: matches,
                    }),
                }
            }
        }
    }
}
