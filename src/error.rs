use std::path::PathBuf;

use thiserror::Error;

use crate::validation::ValidationError;

pub type Result<T> = std::result::Result<T, WtxError>;

#[derive(Debug, Error)]
pub enum WtxError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The git subprocess could not be launched or exited nonzero.
    /// `output` is the combined stdout+stderr (or the OS error text).
    #[error("{command} failed: {output}")]
    ExternalTool { command: String, output: String },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse metadata {}: {source}", .path.display())]
    Metadata {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to parse config file {}: {source}", .path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(
        "unknown configuration key: {0} (known keys: {})",
        crate::config::SETTABLE_KEYS.join(", ")
    )]
    UnknownConfigKey(String),

    #[error("invalid value '{value}' for {key}: {reason}")]
    InvalidConfigValue {
        key: String,
        value: String,
        reason: String,
    },

    #[error("not a git repository: {}", .0.display())]
    NotARepository(PathBuf),

    #[error("worktree '{0}' not found")]
    WorktreeNotFound(String),
}

impl WtxError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub fn external(command: impl Into<String>, output: impl Into<String>) -> Self {
        Self::ExternalTool {
            command: command.into(),
            output: output.into(),
        }
    }

    pub fn is_external_tool(&self) -> bool {
        matches!(self, Self::ExternalTool { .. })
    }
}
