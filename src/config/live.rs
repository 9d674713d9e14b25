//! `[live]` section configuration.

use super::defaults;
use educe::Educe;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// `[live]` section in jrender.toml - live preview settings.
///
/// # Example
/// ```toml
/// [live]
/// debounce_ms = 150
/// ```
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct LiveConfig {
    /// Quiet window for coalescing file-system events into one save.
    #[serde(default = "defaults::live::debounce_ms")]
    #[educe(Default = defaults::live::debounce_ms())]
    pub debounce_ms: u64,
}

impl LiveConfig {
    pub const fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}
