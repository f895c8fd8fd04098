//! Error types for the pipeline
//!
//! Provides error handling for:
//! - Manifest loading and validation
//! - Missing required artifacts
//! - Engine failures surfaced by a step
//!
//! Every error maps to a process exit code via [`PipelineError::exit_code`].

use sitepatch_artifact::{ArtifactError, ArtifactKind};
use sitepatch_engine::{EngineError, MarkerError, SnapshotError};
use std::path::PathBuf;

/// Exit code for a missing required artifact or manifest
pub const EXIT_MISSING: i32 = 2;
/// Exit code for a structural mismatch or snapshot failure
pub const EXIT_STRUCTURAL: i32 = 3;
/// Exit code for any other failure
pub const EXIT_FAILURE: i32 = 1;

/// Manifest loading and validation errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Manifest file does not exist
    #[error("manifest not found: {0}")]
    Missing(PathBuf),

    /// Manifest or body file could not be read
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Manifest is not valid TOML for the expected shape
    #[error("invalid manifest {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// Marker name in a feature or step is invalid
    #[error("invalid marker name: {0}")]
    InvalidMarker(#[from] MarkerError),

    /// Anchor or fingerprint pattern does not compile
    #[error("invalid pattern in {context}: {source}")]
    InvalidPattern {
        context: String,
        #[source]
        source: regex::Error,
    },

    /// Step refers to a feature id not declared in `[[features]]`
    #[error("unknown feature '{feature}' in {plan} plan")]
    UnknownFeature { feature: String, plan: ArtifactKind },

    /// Feature used in a plan of a different artifact kind
    #[error("feature '{feature}' is for {expected} artifacts, used in {found} plan")]
    KindMismatch {
        feature: String,
        expected: ArtifactKind,
        found: ArtifactKind,
    },

    /// Feature declared twice
    #[error("duplicate feature id '{0}'")]
    DuplicateFeature(String),

    /// Any other semantic problem
    #[error("invalid manifest: {0}")]
    Invalid(String),
}

impl ConfigError {
    /// Create read error for path
    pub fn read_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Read {
            path: path.into(),
            source,
        }
    }

    /// Create pattern error with context
    pub fn pattern_error(context: impl Into<String>, source: regex::Error) -> Self {
        Self::InvalidPattern {
            context: context.into(),
            source,
        }
    }

    /// Create generic validation error
    pub fn invalid(detail: impl Into<String>) -> Self {
        Self::Invalid(detail.into())
    }
}

/// Main pipeline error type
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Manifest problem
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Required artifact absent; checked before any mutation
    #[error("required artifact missing: {0}")]
    MissingArtifact(PathBuf),

    /// Artifact read or write failed
    #[error("artifact error: {0}")]
    Artifact(#[from] ArtifactError),

    /// Step failure
    #[error("step '{step}' failed on {path}: {source}")]
    Step {
        step: String,
        path: PathBuf,
        #[source]
        source: EngineError,
    },

    /// Backup failure before mutation
    #[error("snapshot failed: {0}")]
    Snapshot(#[from] SnapshotError),
}

impl PipelineError {
    /// Create step error
    pub fn step_error(step: impl Into<String>, path: impl Into<PathBuf>, source: EngineError) -> Self {
        Self::Step {
            step: step.into(),
            path: path.into(),
            source,
        }
    }

    /// Check if the error aborts the run
    ///
    /// Every pipeline error is fatal; non-fatal conditions travel as
    /// diagnostics in the report instead.
    #[inline]
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        true
    }

    /// Check if the error is a structural mismatch or snapshot failure
    #[must_use]
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::Snapshot(_)
                | Self::Step {
                    source: EngineError::StructuralMismatch(_) | EngineError::Snapshot(_),
                    ..
                }
        )
    }

    /// Process exit code for this error
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::MissingArtifact(_)
            | Self::Config(ConfigError::Missing(_))
            | Self::Artifact(ArtifactError::Missing(_)) => EXIT_MISSING,
            _ if self.is_structural() => EXIT_STRUCTURAL,
            _ => EXIT_FAILURE,
        }
    }
}

/// Result type alias for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;
