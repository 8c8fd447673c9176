use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReaderError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid chapter pattern {pattern:?}: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("search term is empty")]
    EmptySearchTerm,
    #[error("no chapter at index {0}")]
    UnknownChapter(usize),
    #[error("no search match at index {0}")]
    UnknownMatch(usize),
    #[error("operation was cancelled")]
    Cancelled,
    #[error("failed to store document record {}: {source}", path.display())]
    Store {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl ReaderError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

pub type Result<T> = std::result::Result<T, ReaderError>;
