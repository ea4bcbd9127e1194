//! Unified error types for cellcsv.
//!
//! Every fallible document, parser and writer operation reports through the
//! single [`Error`] enum below.
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for cellcsv operations.
#[derive(Error, Debug)]
pub enum Error {
    /// IO error on a handle that was already obtained
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The operation needs a bound file path but the document is closed
    #[error("Document is not bound to a file")]
    UnboundDocument,

    /// A file handle could not be obtained for reading or writing
    #[error("Could not open file {}: {source}", .path.display())]
    FileOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The side file was fully written but renaming it over the destination failed
    #[error("Atomic commit to {} failed: {source}", .path.display())]
    AtomicCommit {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Not a valid "A1"-style cell key
    #[error("Invalid cell key: {0:?}")]
    InvalidKey(String),
}

impl Error {
    pub(crate) fn file_open(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::FileOpen {
            path: path.into(),
            source,
        }
    }
}

/// Result type for cellcsv operations.
pub type Result<T> = std::result::Result<T, Error>;
