//! Error taxonomy shared by the render, compare and live preview paths.

use thiserror::Error;

pub type Result<T, E = RenderError> = std::result::Result<T, E>;

/// Errors surfaced by a single render, compare or live preview operation.
#[derive(Debug, Error)]
pub enum RenderError {
    /// Required external tools are missing. Fatal to the whole feature set.
    #[error("Missing required tools: {}. Please install them and reload.", .0.join(", "))]
    ToolUnavailable(Vec<String>),

    /// Rejected before any side effect (wrong file kind, file outside workspace).
    #[error("{0}")]
    InvalidInput(String),

    /// External process exited non-zero; `message` is its stderr verbatim.
    #[error("{message}")]
    Execution { program: String, message: String },

    #[error("Failed to parse JSON output from the evaluator: output was not parseable")]
    Parse(#[source] serde_json::Error),

    /// Checkout teardown failed. Only ever logged.
    #[error("Failed to fully clean up checkout: {0}")]
    Cleanup(String),
}

impl RenderError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn execution(program: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Execution {
            program: program.into(),
            message: message.into(),
        }
    }
}
