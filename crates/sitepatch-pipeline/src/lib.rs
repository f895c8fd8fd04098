//! sitepatch Pipeline
//!
//! Drives the engine over a whole site from one versioned manifest.
//!
//! # Components
//!
//! - [`Manifest`]: `sitepatch.toml`, validated and compiled at load time
//! - [`TransformStep`]: named, pure text steps selectable per artifact kind
//! - [`ArtifactPatchPipeline`]: snapshot-once, write-once orchestration
//! - [`RunReport`]: per-artifact outcomes and every non-fatal diagnostic
//!
//! # Example
//!
//! ```rust,ignore
//! use sitepatch_pipeline::prelude::*;
//! use std::path::Path;
//!
//! let manifest = Manifest::load(Path::new(DEFAULT_MANIFEST))?;
//! let config = PipelineConfig::new(".").with_dry_run(true);
//! let report = ArtifactPatchPipeline::new(manifest, config).run()?;
//! println!("{}", report.generate_text());
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod config;
pub mod error;
pub mod feature;
pub mod items;
pub mod manifest;
pub mod pipeline;
pub mod report;
pub mod steps;

pub use config::PipelineConfig;
pub use error::{ConfigError, PipelineError, PipelineResult, EXIT_FAILURE, EXIT_MISSING, EXIT_STRUCTURAL};
pub use feature::Feature;
pub use items::{CardRenderer, ItemRecord, ItemRenderer};
pub use manifest::{KindPlan, Manifest, ManifestSpec, DEFAULT_MANIFEST};
pub use pipeline::{patch_text, ArtifactPatchPipeline, Patched, Target};
pub use report::{ArtifactOutcome, ArtifactStatus, ReportedDiagnostic, RunReport};
pub use steps::{StepContext, StepOutput, TransformStep};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for running a manifest
    pub use crate::config::PipelineConfig;
    pub use crate::error::{ConfigError, PipelineError, PipelineResult};
    pub use crate::manifest::{Manifest, DEFAULT_MANIFEST};
    pub use crate::pipeline::ArtifactPatchPipeline;
    pub use crate::report::{ArtifactStatus, RunReport};
}
