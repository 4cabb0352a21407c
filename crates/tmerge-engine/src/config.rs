//! Loading [`MergeSettings`] from TOML.
//!
//! Every key is optional; missing keys take their defaults:
//!
//! ```toml
//! keep_branch_terms = false
//! merge_fields = ["field_notes"]
//! keep_only_unique = true
//! redirect = 301            # or "none" / "default"
//! synonym_fields = ["field_synonyms"]
//! step = 40
//! ```

use std::path::Path;

use tracing::debug;

use crate::error::SettingsError;
use crate::settings::MergeSettings;

impl MergeSettings {
    /// Parse settings from a TOML document.
    pub fn from_toml_str(raw: &str) -> Result<Self, SettingsError> {
        Ok(toml::from_str(raw)?)
    }

    /// Render settings as a TOML document.
    pub fn to_toml_string(&self) -> Result<String, SettingsError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

/// Read settings from a TOML file.
pub fn load_settings(path: &Path) -> Result<MergeSettings, SettingsError> {
    let raw = std::fs::read_to_string(path)?;
    let settings = MergeSettings::from_toml_str(&raw)?;
    debug!(path = %path.display(), step = settings.step().get(), "loaded merge settings");
    Ok(settings)
}
