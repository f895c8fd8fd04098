//! sitepatch Engine
//!
//! Idempotent patching of generated text artifacts.
//!
//! # Core Operations
//!
//! - **Recognize**: [`MarkerRegistry`] finds named sentinel blocks over a flat
//!   [`BoundaryMap`] of sentinels and anchors
//! - **Migrate**: [`LegacyMigrator`] removes superseded generations and
//!   unmarked legacy fragments
//! - **Inject**: [`BlockInjector`] inserts a block once, before an [`Anchor`]
//!   or at the end of a companion artifact
//! - **Snapshot**: [`SnapshotManager`] writes a byte-identical backup before
//!   any artifact is rewritten
//!
//! # Example
//!
//! ```rust,ignore
//! use sitepatch_engine::prelude::*;
//!
//! let mut registry = MarkerRegistry::new(ArtifactKind::Markup)
//!     .with_anchor(Anchor::element_with_class("div", "cards")?);
//! registry.register_all([MarkerName::new("BAR:V1")?, MarkerName::new("BAR:V2")?]);
//!
//! let migration = LegacyMigrator::new(&registry)
//!     .strip_legacy(&html, &[MarkerName::new("BAR:V1")?], &[]);
//! let injection = BlockInjector::new(&registry).inject(
//!     &migration.text,
//!     &MarkerName::new("BAR:V2")?,
//!     "<div id=\"bar\"></div>",
//!     &registry.anchors()[0],
//! );
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod anchor;
pub mod boundary;
pub mod diagnostic;
pub mod element;
pub mod error;
pub mod fingerprint;
pub mod inject;
pub mod legacy;
pub mod marker;
pub mod region;
pub mod registry;
pub mod snapshot;

pub use anchor::Anchor;
pub use boundary::{Block, Boundary, BoundaryKind, BoundaryMap};
pub use diagnostic::{Diagnostic, DiagnosticKind};
pub use error::{EngineError, EngineResult, MarkerError, SnapshotError};
pub use fingerprint::Fingerprint;
pub use inject::{BlockInjector, InjectOutcome, Injection};
pub use legacy::{LegacyMigrator, Migration};
pub use marker::{MarkerName, SentinelSyntax, Terminator};
pub use region::{Region, RegionEdit, RegionOutcome};
pub use registry::MarkerRegistry;
pub use snapshot::{Backup, Restored, SnapshotManager, STAMP_FORMAT};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for driving the engine
    pub use crate::anchor::Anchor;
    pub use crate::diagnostic::{Diagnostic, DiagnosticKind};
    pub use crate::error::{EngineError, EngineResult};
    pub use crate::fingerprint::Fingerprint;
    pub use crate::inject::{BlockInjector, InjectOutcome};
    pub use crate::legacy::LegacyMigrator;
    pub use crate::marker::{MarkerName, Terminator};
    pub use crate::registry::MarkerRegistry;
    pub use crate::snapshot::SnapshotManager;
    pub use sitepatch_artifact::{Artifact, ArtifactKind, ContentHash, Span};
}
