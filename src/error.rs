//! Error types for PerfTier
//!
//! Detection and classification degrade to defaults instead of failing, so
//! the errors here cover configuration, snapshot import, and lookups of
//! precision cells that were never registered.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for PerfTier operations
#[derive(Error, Debug)]
pub enum PerfTierError {
    /// I/O error while reading or writing config/snapshot files
    #[error("I/O error at '{path}': {source}")]
    Io {
        /// File being accessed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Snapshot failed validation and was not applied
    #[error("Snapshot error: {0}")]
    SnapshotError(String),

    /// JSON encoding or decoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Precision cell lookup for an id that was never registered
    #[error("Unknown precision cell: {0}")]
    UnknownCell(String),

    /// Hardware probe did not finish within the detection ceiling
    #[error("Hardware detection timed out after {0} ms")]
    DetectionTimeout(u64),

    /// Hardware probe failed outright
    #[error("Hardware detection failed: {0}")]
    DetectionFailed(String),
}

impl PerfTierError {
    /// Create an I/O error with path context
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError(message.into())
    }

    /// Create a snapshot validation error
    pub fn snapshot(message: impl Into<String>) -> Self {
        Self::SnapshotError(message.into())
    }

    /// Check if this error leaves the subsystem usable
    ///
    /// Snapshot and detection failures never touch live state, so callers
    /// may log them and carry on.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Io { .. }
                | Self::SnapshotError(_)
                | Self::Json(_)
                | Self::DetectionTimeout(_)
                | Self::DetectionFailed(_)
        )
    }

    /// Get the path associated with this error, if any
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            Self::Io { path, .. } => Some(path),
            _ => None,
        }
    }
}

/// Result type alias for PerfTier operations
pub type Result<T> = std::result::Result<T, PerfTierError>;

/// Extension trait for adding path context to std::io::Result
pub trait IoResultExt<T> {
    /// Add path context to an I/O error
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|e| PerfTierError::io(path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_with_path() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = PerfTierError::io("/test/snapshot.json", io_err);
        assert_eq!(err.path(), Some(&PathBuf::from("/test/snapshot.json")));
    }

    #[test]
    fn test_error_recoverability() {
        assert!(PerfTierError::snapshot("missing field").is_recoverable());
        assert!(PerfTierError::DetectionTimeout(3000).is_recoverable());
        assert!(!PerfTierError::config("bad band").is_recoverable());
        assert!(!PerfTierError::UnknownCell("x".into()).is_recoverable());
    }

    #[test]
    fn test_with_path() {
        let res: std::io::Result<()> = Err(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "denied",
        ));
        let err = res.with_path("/etc/perftier.json").unwrap_err();
        assert!(err.to_string().contains("/etc/perftier.json"));
    }
}
