//! Error types for dredge-core

use std::path::PathBuf;
use thiserror::Error;

/// Core error types for the dredge library
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Archive could not be read
    #[error("Archive error: {0}")]
    Archive(String),

    /// ZIP-specific error
    #[error("Zip error: {0}")]
    Zip(String),

    /// Invalid file or directory path
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// The extraction folder for an archive already exists
    #[error("Destination already exists: {}", .0.display())]
    DestinationExists(PathBuf),

    /// An entry that was listed at enumeration time can no longer be found
    #[error("Source no longer present for {}: {reason}", .path.display())]
    MissingSource { path: PathBuf, reason: String },

    /// Configuration-related error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A worker pool could not be started
    #[error("Thread pool error: {0}")]
    ThreadPool(String),

    /// A task panicked while running on a worker pool
    #[error("Task panicked: {0}")]
    TaskPanicked(String),

    /// One or more tasks failed during a run
    #[error("{count} task(s) failed, first failure: {first}")]
    TaskFailures { count: usize, first: Box<Error> },
}

impl Error {
    /// Whether this error means the thing to extract vanished after it was
    /// enumerated. This is the only failure a file task recovers from.
    pub fn is_missing_source(&self) -> bool {
        matches!(self, Error::MissingSource { .. })
    }

    /// The failure that decides how a run is reported: the first task
    /// failure for [`Error::TaskFailures`], the error itself otherwise.
    pub fn root(&self) -> &Error {
        match self {
            Error::TaskFailures { first, .. } => first.root(),
            other => other,
        }
    }
}

impl From<zip::result::ZipError> for Error {
    fn from(err: zip::result::ZipError) -> Self {
        Error::Zip(err.to_string())
    }
}

impl From<walkdir::Error> for Error {
    fn from(err: walkdir::Error) -> Self {
        Error::Io(err.into())
    }
}

impl From<rayon::ThreadPoolBuildError> for Error {
    fn from(err: rayon::ThreadPoolBuildError) -> Self {
        Error::ThreadPool(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_source_is_the_only_recoverable_kind() {
        let missing = Error::MissingSource {
            path: PathBuf::from("a.txt"),
            reason: "gone".to_string(),
        };
        assert!(missing.is_missing_source());
        assert!(!Error::DestinationExists(PathBuf::from("x-extracted")).is_missing_source());
        assert!(!Error::Archive("bad".to_string()).is_missing_source());
    }

    #[test]
    fn test_root_unwraps_task_failures() {
        let err = Error::TaskFailures {
            count: 2,
            first: Box::new(Error::DestinationExists(PathBuf::from("x-extracted"))),
        };
        assert!(matches!(err.root(), Error::DestinationExists(_)));
        assert!(err.to_string().starts_with("2 task(s) failed"));
    }
}
