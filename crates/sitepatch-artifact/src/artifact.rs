//! Artifact kinds and the mutable text artifact
//!
//! An [`Artifact`] is one file under the engine's management: a markup
//! document, a stylesheet or a client script. The pipeline owns it for the
//! duration of a run and rewrites it whole.

use crate::hash::ContentHash;
use crate::text::{decode_lossy, EncodingAnomaly};
use std::fmt::{self, Display, Formatter};
use std::path::{Path, PathBuf};

/// Kind of artifact, selecting sentinel syntax and default plan
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    /// HTML documents (primary page and per-item detail pages)
    Markup,
    /// CSS
    Stylesheet,
    /// Client-side JavaScript
    Script,
}

impl ArtifactKind {
    /// All kinds in processing order
    pub const ALL: [Self; 3] = [Self::Markup, Self::Stylesheet, Self::Script];

    /// Stable identifier
    #[inline]
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Markup => "markup",
            Self::Stylesheet => "stylesheet",
            Self::Script => "script",
        }
    }

    /// Supported file extensions (without dot)
    #[inline]
    #[must_use]
    pub const fn extensions(&self) -> &'static [&'static str] {
        match self {
            Self::Markup => &["html", "htm"],
            Self::Stylesheet => &["css"],
            Self::Script => &["js", "mjs"],
        }
    }

    /// Infer kind from a file extension
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.extensions().contains(&ext.as_str()))
    }
}

impl Display for ArtifactKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors related to artifact I/O
#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    /// Artifact does not exist at its path
    #[error("artifact not found: {0}")]
    Missing(PathBuf),

    /// IO error reading or writing the artifact
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ArtifactError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Mutable text artifact
///
/// # Invariants
/// - `hash` is always `ContentHash::compute(text)`
/// - `original_hash` is the hash of the text as loaded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    path: PathBuf,
    kind: ArtifactKind,
    text: String,
    hash: ContentHash,
    original_hash: ContentHash,
}

impl Artifact {
    /// Create artifact from in-memory text
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, kind: ArtifactKind, text: impl Into<String>) -> Self {
        let text = text.into();
        let hash = ContentHash::compute(text.as_bytes());
        Self {
            path: path.into(),
            kind,
            text,
            hash,
            original_hash: hash,
        }
    }

    /// Load artifact from disk with best-effort decoding
    ///
    /// Returns the artifact and, if the bytes were not clean UTF-8, a
    /// description of the lossy decode.
    ///
    /// # Errors
    /// - `ArtifactError::Missing` if the file does not exist
    /// - `ArtifactError::Io` if it cannot be read
    pub fn load(
        path: impl AsRef<Path>,
        kind: ArtifactKind,
    ) -> Result<(Self, Option<EncodingAnomaly>), ArtifactError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ArtifactError::Missing(path.to_path_buf())
            } else {
                ArtifactError::io_error(path, e)
            }
        })?;
        let decoded = decode_lossy(&bytes);
        Ok((Self::new(path, kind, decoded.text), decoded.anomaly))
    }

    /// Write the current text back to the artifact's path
    ///
    /// # Errors
    /// Returns `ArtifactError::Io` if the write fails
    pub fn persist(&self) -> Result<(), ArtifactError> {
        std::fs::write(&self.path, self.text.as_bytes())
            .map_err(|e| ArtifactError::io_error(&self.path, e))
    }

    /// Artifact path
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Artifact kind
    #[inline]
    #[must_use]
    pub fn kind(&self) -> ArtifactKind {
        self.kind
    }

    /// Current text
    #[inline]
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Hash of the current text
    #[inline]
    #[must_use]
    pub fn hash(&self) -> &ContentHash {
        &self.hash
    }

    /// Hash of the text as originally loaded
    #[inline]
    #[must_use]
    pub fn original_hash(&self) -> &ContentHash {
        &self.original_hash
    }

    /// Check if the text differs from what was loaded
    #[inline]
    #[must_use]
    pub fn is_modified(&self) -> bool {
        self.hash != self.original_hash
    }

    /// Replace the text, recomputing the hash
    pub fn set_text(&mut self, text: String) {
        self.hash = ContentHash::compute(text.as_bytes());
        self.text = text;
    }

    /// Take the text out, leaving the artifact empty until `set_text`
    #[must_use]
    pub fn take_text(&mut self) -> String {
        std::mem::take(&mut self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_from_path() {
        assert_eq!(
            ArtifactKind::from_path(Path::new("site/index.html")),
            Some(ArtifactKind::Markup)
        );
        assert_eq!(
            ArtifactKind::from_path(Path::new("styles.CSS")),
            Some(ArtifactKind::Stylesheet)
        );
        assert_eq!(
            ArtifactKind::from_path(Path::new("script.js")),
            Some(ArtifactKind::Script)
        );
        assert_eq!(ArtifactKind::from_path(Path::new("README")), None);
    }

    #[test]
    fn kind_serde_lowercase() {
        let json = serde_json::to_string(&ArtifactKind::Stylesheet).unwrap();
        assert_eq!(json, "\"stylesheet\"");
    }

    #[test]
    fn set_text_tracks_modification() {
        let mut artifact = Artifact::new("index.html", ArtifactKind::Markup, "<main></main>");
        assert!(!artifact.is_modified());

        artifact.set_text("<main>x</main>".to_string());
        assert!(artifact.is_modified());
        assert_eq!(*artifact.hash(), ContentHash::compute(b"<main>x</main>"));

        artifact.set_text("<main></main>".to_string());
        assert!(!artifact.is_modified());
    }

    #[test]
    fn load_missing_is_distinguished() {
        let result = Artifact::load("/definitely/not/here.html", ArtifactKind::Markup);
        assert!(matches!(result, Err(ArtifactError::Missing(_))));
    }
}
