//! sitepatch Artifact System
//!
//! Text artifacts under the patch engine's management.
//!
//! # Core Concepts
//!
//! - [`Artifact`]: a markup document, stylesheet or script, owned for one run
//! - [`ArtifactKind`]: selects sentinel syntax and transformation plan
//! - [`ContentHash`]: 32-byte Blake3 hash used for change detection
//! - [`Span`]: half-open byte range addressing blocks within an artifact
//!
//! # Example
//!
//! ```rust,ignore
//! use sitepatch_artifact::{Artifact, ArtifactKind};
//!
//! let (mut artifact, anomaly) = Artifact::load("index.html", ArtifactKind::Markup)?;
//! let text = artifact.take_text();
//! artifact.set_text(text.replace("src=\"/img/", "src=\"img/"));
//! if artifact.is_modified() {
//!     artifact.persist()?;
//! }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod artifact;
mod hash;
mod span;
mod text;

pub use artifact::{Artifact, ArtifactError, ArtifactKind};
pub use hash::ContentHash;
pub use span::{Span, SpanError};
pub use text::{decode_lossy, Decoded, EncodingAnomaly};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
