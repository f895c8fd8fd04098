//! Non-fatal conditions surfaced to the run summary

use sitepatch_artifact::Span;
use std::fmt::{self, Display, Formatter};

/// Kind of non-fatal condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiagnosticKind {
    /// Anchor missing; block appended at end of artifact
    AnchorNotFound,
    /// Fingerprint matched structurally different candidates
    AmbiguousLegacyMatch,
    /// Artifact bytes were not clean UTF-8
    EncodingAnomaly,
    /// More than one live block of a current-generation marker
    DuplicateMarker,
}

impl DiagnosticKind {
    /// Stable identifier
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::AnchorNotFound => "AnchorNotFound",
            Self::AmbiguousLegacyMatch => "AmbiguousLegacyMatch",
            Self::EncodingAnomaly => "EncodingAnomaly",
            Self::DuplicateMarker => "DuplicateMarker",
        }
    }
}

/// A reported non-fatal event
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub span: Option<Span>,
}

impl Diagnostic {
    /// Create diagnostic
    pub fn new(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            span: None,
        }
    }

    /// Attach the span the diagnostic refers to
    #[must_use]
    pub fn at(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    /// Emit the diagnostic as a tracing warning
    pub(crate) fn logged(self) -> Self {
        tracing::warn!(kind = self.kind.as_str(), "{}", self.message);
        self
    }
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.as_str(), self.message)?;
        if let Some(span) = self.span {
            write!(f, " (at {span})")?;
        }
        Ok(())
    }
}
