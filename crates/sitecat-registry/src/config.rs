//! Registry configuration.

use std::time::Duration;

use sitecat_core::validation::uniqueness::MatchMode;

/// Configuration for the site registry.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Key the catalog snapshot is stored under.
    pub storage_key: String,
    /// Key the in-progress "add site" draft is auto-saved under.
    pub draft_key: String,
    /// Quiet period before a deferred uniqueness check runs
    /// (default: 300 ms).
    pub uniqueness_debounce_ms: u64,
    /// Compare names and integration codes ignoring case
    /// (default: false, exact match).
    pub case_insensitive_uniqueness: bool,
}

impl RegistryConfig {
    pub fn match_mode(&self) -> MatchMode {
        if self.case_insensitive_uniqueness {
            MatchMode::CaseInsensitive
        } else {
            MatchMode::Exact
        }
    }

    pub fn uniqueness_debounce(&self) -> Duration {
        Duration::from_millis(self.uniqueness_debounce_ms)
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            storage_key: "sitecat_sites".into(),
            draft_key: "sitecat_add_site_draft".into(),
            uniqueness_debounce_ms: 300,
            case_insensitive_uniqueness: false,
        }
    }
}
