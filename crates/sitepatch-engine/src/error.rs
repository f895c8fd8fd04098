//! Error types for the patch engine
//!
//! Provides error handling for:
//! - Marker name validation
//! - Snapshot (backup) operations
//! - Structural mismatches that make a step unrecoverable

use std::path::PathBuf;

/// Errors related to marker names
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MarkerError {
    /// Empty marker name
    #[error("marker name is empty")]
    Empty,

    /// Marker name contains characters outside `[A-Za-z0-9_:.-]`
    #[error("invalid marker name: '{0}'")]
    InvalidName(String),
}

/// Errors during snapshot operations
///
/// Any failure before a mutation is fatal: the run must not touch an
/// artifact it could not back up.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    /// Reading the artifact to back up failed
    #[error("cannot read {path} for backup: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Writing the backup failed
    #[error("cannot write backup {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Listing or deleting backups failed
    #[error("backup housekeeping failed in {path}: {source}")]
    Housekeeping {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File name does not follow the backup naming scheme
    #[error("not a backup file: {0}")]
    NotABackup(PathBuf),

    /// Restored content does not match the backup
    #[error("restore verification failed for {0}")]
    VerifyFailed(PathBuf),
}

impl SnapshotError {
    /// Create read error for path
    pub fn read_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Read {
            path: path.into(),
            source,
        }
    }

    /// Create write error for path
    pub fn write_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Write {
            path: path.into(),
            source,
        }
    }

    /// Create housekeeping error for path
    pub fn housekeeping_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Housekeeping {
            path: path.into(),
            source,
        }
    }
}

/// Combined engine error
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("marker error: {0}")]
    Marker(#[from] MarkerError),

    #[error("snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),

    /// Paired markers out of order or half missing
    #[error("structural mismatch: {0}")]
    StructuralMismatch(String),

    /// Invalid anchor or fingerprint pattern
    #[error("invalid pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}

impl EngineError {
    /// Create structural mismatch error
    pub fn structural_mismatch(detail: impl Into<String>) -> Self {
        Self::StructuralMismatch(detail.into())
    }
}

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
