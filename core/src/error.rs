use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failures while loading the dictionary, index or tables. Query evaluation
/// itself never fails; only startup does.
#[derive(Debug, Error)]
pub enum LoadError {
    /// A file could not be read.
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A file was read but is not valid JSON for its schema.
    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The index parsed but its contents are inconsistent.
    #[error("invalid index: {0}")]
    Schema(String),

    /// `blocks.json` and `frontcoded.json` disagree about a block.
    #[error("dictionary block `{key}`: {reason}")]
    Dictionary { key: String, reason: String },

    /// A ranker configuration or lexicon value is out of range.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl LoadError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }

    pub(crate) fn parse(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Parse { path: path.into(), source }
    }

    pub(crate) fn dictionary(key: &str, reason: impl Into<String>) -> Self {
        Self::Dictionary { key: key.to_string(), reason: reason.into() }
    }
}
