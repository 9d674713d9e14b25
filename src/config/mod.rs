//! Project configuration from `jrender.toml`.
//!
//! # Sections
//!
//! | Section    | Purpose                                         |
//! |------------|-------------------------------------------------|
//! | `[tools]`  | Evaluator, converter and git programs           |
//! | `[render]` | Accepted extensions and library search paths    |
//! | `[live]`   | Live preview event coalescing                   |
//!
//! The file is optional; every field has a default.
//!
//! # Example
//!
//! ```toml
//! [tools]
//! evaluator = "jsonnet"
//! converter = "yq"
//! converter_args = ["-P"]
//!
//! [render]
//! jpath = ["vendor"]
//!
//! [live]
//! debounce_ms = 200
//! ```

pub mod defaults;
mod error;
mod live;
mod render;
mod tools;

pub use error::ConfigError;

use live::LiveConfig;
use render::RenderSection;
use tools::ToolsConfig;

use crate::{cli::Cli, utils::path::absolutize};
use anyhow::Result;
use educe::Educe;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Root configuration structure representing jrender.toml
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct RenderConfig {
    /// Absolute path to the config file (set after loading)
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Absolute workspace root. Files outside it cannot be compared.
    #[serde(skip)]
    pub root: PathBuf,

    /// Directory rendered documents are written to instead of stdout.
    #[serde(skip)]
    pub output: Option<PathBuf>,

    #[serde(default)]
    pub tools: ToolsConfig,

    #[serde(default)]
    pub render: RenderSection,

    #[serde(default)]
    pub live: LiveConfig,
}

impl RenderConfig {
    /// Parse configuration from TOML string
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration from file path
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;
        Self::from_str(&content)
    }

    /// Load the config file named by the CLI (if present), apply CLI
    /// overrides and validate.
    pub fn load(cli: &Cli) -> Result<Self> {
        let root = cli.root.as_deref().unwrap_or(Path::new("./"));
        let config_path = root.join(&cli.config);

        let mut config = if config_path.exists() {
            Self::from_path(&config_path)?
        } else {
            Self::default()
        };
        config.update_with_cli(cli);
        config.validate()?;
        Ok(config)
    }

    /// Update configuration with CLI arguments and normalize paths.
    pub fn update_with_cli(&mut self, cli: &Cli) {
        let root = absolutize(cli.root.as_deref().unwrap_or(Path::new("./")));
        self.config_path = absolutize(&root.join(&cli.config));
        self.output = cli.output.as_deref().map(absolutize);
        self.set_root(&root);
    }

    /// Set the workspace root and re-resolve root-relative paths.
    pub fn set_root(&mut self, root: &Path) {
        self.root = root.to_path_buf();
        self.render.jpath = self
            .render
            .jpath
            .iter()
            .map(|dir| {
                let expanded = PathBuf::from(shellexpand::tilde(&dir.to_string_lossy()).as_ref());
                if expanded.is_relative() {
                    absolutize(&root.join(expanded))
                } else {
                    absolutize(&expanded)
                }
            })
            .collect();
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.render.extensions.is_empty() {
            return Err(ConfigError::Validation("[render.extensions] must not be empty".into()));
        }
        for (key, value) in [
            ("[tools.evaluator]", &self.tools.evaluator),
            ("[tools.converter]", &self.tools.converter),
            ("[tools.git]", &self.tools.git),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Validation(format!("{key} must not be empty")));
            }
        }
        Ok(())
    }

    /// Whether `path` has one of the accepted source extensions.
    pub fn is_supported(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.render.extensions.iter().any(|e| e == ext))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = RenderConfig::from_str("").unwrap();
        assert_eq!(config.tools.evaluator, "jsonnet");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unknown_field_rejection() {
        let result = RenderConfig::from_str("[tools]\nunknown = 1");
        assert!(matches!(result, Err(ConfigError::Toml(_))));

        let result = RenderConfig::from_str("[watch]\nenable = true");
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_rejects_empty_extensions() {
        let config = RenderConfig::from_str("[render]\nextensions = []").unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_validate_rejects_empty_program() {
        let config = RenderConfig::from_str("[tools]\nconverter = \" \"").unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("[tools.converter]"));
    }

    #[test]
    fn test_is_supported() {
        let config = RenderConfig::default();
        assert!(config.is_supported(Path::new("/p/app.jsonnet")));
        assert!(config.is_supported(Path::new("/p/lib/k8s.libsonnet")));
        assert!(!config.is_supported(Path::new("/p/notes.txt")));
        assert!(!config.is_supported(Path::new("/p/jsonnet")));
    }

    #[test]
    fn test_load_from_root() {
        let dir = tempfile::TempDir::new().unwrap();
        fs::write(dir.path().join("jrender.toml"), "[live]\ndebounce_ms = 10").unwrap();

        let root = dir.path().to_string_lossy().into_owned();
        let cli = Cli::parse_from(["jrender", "--root", root.as_str(), "check"]);
        let config = RenderConfig::load(&cli).unwrap();

        assert_eq!(config.live.debounce_ms, 10);
        assert_eq!(config.root, dir.path().canonicalize().unwrap());
        assert!(config.config_path.ends_with("jrender.toml"));
    }

    #[test]
    fn test_load_without_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let root = dir.path().to_string_lossy().into_owned();
        let cli = Cli::parse_from(["jrender", "--root", root.as_str(), "check"]);
        let config = RenderConfig::load(&cli).unwrap();
        assert_eq!(config.live.debounce_ms, 300);
    }
}
