use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum ArchiveError {
    #[error("config file does not exist: {0}")]
    MissingConfig(PathBuf),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse YAML config: {0}")]
    ConfigParse(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("invalid pattern `{pattern}`: {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("data directory does not exist: {0}")]
    MissingDataDir(PathBuf),

    #[error("invalid file type: {0}")]
    InvalidFamily(String),

    #[error("required tool not found: {0}")]
    MissingTool(String),

    #[error("{path} does not exist (run {run}, {family})")]
    SourceMissing {
        run: String,
        family: String,
        path: PathBuf,
    },

    #[error("failed to start {program}: {message}")]
    Spawn { program: String, message: String },

    #[error("filesystem error: {0}")]
    Filesystem(String),
}

impl ArchiveError {
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            ArchiveError::MissingConfig(_)
                | ArchiveError::ConfigRead(_)
                | ArchiveError::ConfigParse(_)
                | ArchiveError::InvalidConfig(_)
                | ArchiveError::InvalidPattern { .. }
                | ArchiveError::MissingDataDir(_)
                | ArchiveError::InvalidFamily(_)
        )
    }
}
