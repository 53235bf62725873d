//! Error types for lsm-manifest.

use std::io;
use thiserror::Error;

/// Result type alias for manifest and version operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for version and manifest operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// I/O error from file operations.
    #[error("I/O error: {0}")]
    Io(String),

    /// Persisted data failed to decode or violated a format invariant.
    #[error("Corruption detected: {0}")]
    Corruption(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The caller supplied something incompatible with the stored state.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Resource already exists.
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Manifest error.
    #[error("Manifest error: {0}")]
    ManifestError(String),

    /// Internal error (should not happen).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::NotFound {
            Error::NotFound(err.to_string())
        } else {
            Error::Io(err.to_string())
        }
    }
}

impl Error {
    /// Create a corruption error with the given message.
    pub fn corruption<S: Into<String>>(msg: S) -> Self {
        Error::Corruption(msg.into())
    }

    /// Create an invalid argument error.
    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        Error::InvalidArgument(msg.into())
    }

    /// Create a manifest error.
    pub fn manifest<S: Into<String>>(msg: S) -> Self {
        Error::ManifestError(msg.into())
    }

    /// Create an internal error.
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Error::Internal(msg.into())
    }

    /// Check if this error indicates corruption.
    pub fn is_corruption(&self) -> bool {
        matches!(self, Error::Corruption(_))
    }

    /// Check if this error is a missing file or entry.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::corruption("version edit: bad level");
        assert_eq!(
            format!("{}", err),
            "Corruption detected: version edit: bad level"
        );

        let err = Error::invalid_argument("comparator mismatch");
        assert_eq!(format!("{}", err), "Invalid argument: comparator mismatch");
    }

    #[test]
    fn test_error_is_corruption() {
        assert!(Error::corruption("bad").is_corruption());
        assert!(!Error::manifest("no writer").is_corruption());
        assert!(!Error::Io("disk".into()).is_corruption());
    }

    #[test]
    fn test_io_not_found_maps() {
        let err: Error = io::Error::new(io::ErrorKind::NotFound, "CURRENT").into();
        assert!(err.is_not_found());

        let err: Error = io::Error::new(io::ErrorKind::PermissionDenied, "nope").into();
        assert!(matches!(err, Error::Io(_)));
    }
}
