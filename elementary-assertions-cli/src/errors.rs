use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} is not valid JSON: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid config {path}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to serialize output: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error(transparent)]
    Run(#[from] elementary_assertions::Error),
}

impl CliError {
    /// Stable code when the failure came from the core.
    pub fn code(&self) -> Option<&'static str> {
        match self {
            CliError::Run(err) => Some(err.code()),
            _ => None,
        }
    }
}
