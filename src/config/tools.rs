//! `[tools]` section configuration.
//!
//! Names the external programs the pipeline shells out to.

use super::defaults;
use educe::Educe;
use serde::{Deserialize, Serialize};

/// `[tools]` section in jrender.toml - external programs.
///
/// # Example
/// ```toml
/// [tools]
/// evaluator = "jsonnet"
/// evaluator_args = ["--ext-str", "env=prod"]
/// converter = "yq"
/// converter_args = ["-P"]
/// git = "git"
/// ```
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct ToolsConfig {
    /// Program that evaluates a source file and prints JSON.
    #[serde(default = "defaults::tools::evaluator")]
    #[educe(Default = defaults::tools::evaluator())]
    pub evaluator: String,

    /// Extra evaluator arguments, placed before the source file.
    #[serde(default)]
    pub evaluator_args: Vec<String>,

    /// Program that reads one JSON document on stdin and prints YAML.
    #[serde(default = "defaults::tools::converter")]
    #[educe(Default = defaults::tools::converter())]
    pub converter: String,

    #[serde(default = "defaults::tools::converter_args")]
    #[educe(Default = defaults::tools::converter_args())]
    pub converter_args: Vec<String>,

    /// Version-control program used for HEAD checkouts.
    #[serde(default = "defaults::tools::git")]
    #[educe(Default = defaults::tools::git())]
    pub git: String,
}

impl ToolsConfig {
    /// Evaluator program followed by its arguments.
    pub fn evaluator_cmd(&self) -> Vec<String> {
        std::iter::once(self.evaluator.clone())
            .chain(self.evaluator_args.iter().cloned())
            .collect()
    }

    /// Converter program followed by its arguments.
    pub fn converter_cmd(&self) -> Vec<String> {
        std::iter::once(self.converter.clone())
            .chain(self.converter_args.iter().cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::super::RenderConfig;

    #[test]
    fn test_tools_config_defaults() {
        let config: RenderConfig = toml::from_str("").unwrap();
        assert_eq!(config.tools.evaluator, "jsonnet");
        assert!(config.tools.evaluator_args.is_empty());
        assert_eq!(config.tools.evaluator_cmd(), vec!["jsonnet"]);
        assert_eq!(config.tools.converter_cmd(), vec!["yq", "-P"]);
        assert_eq!(config.tools.git, "git");
    }

    #[test]
    fn test_tools_config_custom() {
        let config = r#"
            [tools]
            evaluator = "jrsonnet"
            evaluator_args = ["--ext-str", "env=prod"]
            converter = "yj"
            converter_args = ["-jy"]
        "#;
        let config: RenderConfig = toml::from_str(config).unwrap();
        assert_eq!(config.tools.evaluator, "jrsonnet");
        assert_eq!(config.tools.evaluator_cmd(), vec!["jrsonnet", "--ext-str", "env=prod"]);
        assert_eq!(config.tools.converter_cmd(), vec!["yj", "-jy"]);
    }
}
