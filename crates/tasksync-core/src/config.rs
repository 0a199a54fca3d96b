//! Sync engine configuration.
//!
//! The strategy is fixed per engine instance; it is never negotiated per
//! round or per task.

use serde::{Deserialize, Serialize};

use crate::sync::SyncStrategy;
use crate::util::normalize_text_option;

/// Engine-wide sync settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// How conflicting edits are reconciled
    #[serde(default)]
    pub strategy: SyncStrategy,
    /// Persist an audit record for every automatically resolved conflict
    #[serde(default = "default_record_resolutions")]
    pub record_resolutions: bool,
}

const fn default_record_resolutions() -> bool {
    true
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new(SyncStrategy::default())
    }
}

impl SyncConfig {
    pub const fn new(strategy: SyncStrategy) -> Self {
        Self {
            strategy,
            record_resolutions: true,
        }
    }

    /// Build a config from an optional strategy tag.
    ///
    /// A missing or blank tag selects the default strategy. Unrecognized tags
    /// fall back to time-based resolution.
    pub fn from_tag(tag: Option<String>) -> Self {
        normalize_text_option(tag).map_or_else(Self::default, |tag| {
            Self::new(SyncStrategy::parse_lenient(&tag))
        })
    }

    /// Disable the resolution audit log
    #[must_use]
    pub const fn without_resolution_log(mut self) -> Self {
        self.record_resolutions = false;
        self
    }
}
