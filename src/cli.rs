//! Command-line interface definitions.
//!
//! Defines all CLI arguments and subcommands using clap.

use crate::config::defaults::CONFIG_FILE;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Render jsonnet to yaml, compare against HEAD, live-preview on save
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Workspace root (default: current directory)
    #[arg(short, long)]
    pub root: Option<PathBuf>,

    /// Config file name, relative to the root
    #[arg(short = 'C', long, default_value = CONFIG_FILE)]
    pub config: PathBuf,

    /// Write rendered documents into this directory instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Render a file to yaml, one document per list item
    Render {
        /// `.jsonnet` or `.libsonnet` file
        file: PathBuf,
    },

    /// Diff the rendered HEAD version of a file against the working tree
    Compare {
        /// `.jsonnet` or `.libsonnet` file inside the workspace
        file: PathBuf,
    },

    /// Re-render on every save of the file or anything it imports
    Live {
        /// One or more `.jsonnet` or `.libsonnet` files
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Report which external tools are available
    Check,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_render() {
        let cli = Cli::parse_from(["jrender", "render", "app.jsonnet"]);
        assert!(matches!(cli.command, Commands::Render { ref file } if file == &PathBuf::from("app.jsonnet")));
        assert_eq!(cli.config, PathBuf::from("jrender.toml"));
    }

    #[test]
    fn test_parse_live_many() {
        let cli = Cli::parse_from(["jrender", "-o", "out", "live", "a.jsonnet", "b.jsonnet"]);
        match cli.command {
            Commands::Live { files } => assert_eq!(files.len(), 2),
            other => panic!("unexpected command: {other:?}"),
        }
        assert_eq!(cli.output, Some(PathBuf::from("out")));
    }

    #[test]
    fn test_live_requires_file() {
        assert!(Cli::try_parse_from(["jrender", "live"]).is_err());
    }
}
