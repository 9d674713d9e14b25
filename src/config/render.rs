//! `[render]` section configuration.

use super::defaults;
use educe::Educe;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// `[render]` section in jrender.toml - which files render and how.
///
/// # Example
/// ```toml
/// [render]
/// extensions = ["jsonnet", "libsonnet"]
/// jpath = ["vendor", "lib"]
/// ```
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct RenderSection {
    /// Accepted source file extensions, without the leading dot.
    #[serde(default = "defaults::render::extensions")]
    #[educe(Default = defaults::render::extensions())]
    pub extensions: Vec<String>,

    /// Library search directories, passed to the evaluator as `-J <dir>`.
    /// Relative entries resolve against the project root; `~` is expanded.
    #[serde(default)]
    pub jpath: Vec<PathBuf>,
}
