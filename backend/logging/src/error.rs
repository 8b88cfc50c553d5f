use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for logger operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the file sinks.
///
/// Logging calls never return these; they surface from [`crate::Logger::close`]
/// and from direct use of [`crate::RollingFile`].
#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("failed to create log directory at {path}: {source}")]
    CreateDirectory { path: PathBuf, source: io::Error },

    #[error("record of {len} bytes exceeds the maximum log file size of {max} bytes")]
    RecordTooLarge { len: u64, max: u64 },

    #[error("failed to remove backup {path}: {source}")]
    RemoveBackup { path: PathBuf, source: io::Error },

    #[error("failed to compress backup {path}: {source}")]
    Compress { path: PathBuf, source: io::Error },

    #[error("log file lock poisoned: {0}")]
    Poisoned(PathBuf),
}

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Io(e) => e,
            Error::RecordTooLarge { .. } => io::Error::new(io::ErrorKind::InvalidInput, err),
            other => io::Error::other(other),
        }
    }
}
