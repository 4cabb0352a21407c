//! Vocabulary hierarchy resolution for taxonomy term merging.
//!
//! [`HierarchyResolver`] answers "which terms lie below this one?" against
//! the live store. The merge validator uses it to forbid merging a term into
//! its own subtree, and [`TrunkPicker`] uses it to list only legal trunk
//! candidates.

pub mod error;
pub mod resolver;
pub mod widget;

pub use error::{HierarchyError, HierarchyResult};
pub use resolver::HierarchyResolver;
pub use widget::{
    branch_options, option_label, TrunkOption, TrunkPicker, TrunkWidget, AUTOCOMPLETE_THRESHOLD,
};
