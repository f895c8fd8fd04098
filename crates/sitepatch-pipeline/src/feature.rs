//! Features: one logical UI fragment and its generations

use sitepatch_artifact::ArtifactKind;
use sitepatch_engine::{Anchor, Fingerprint, MarkerName, Terminator};

/// A validated feature
///
/// `generations` is never empty; its last entry is the current generation.
#[derive(Debug, Clone)]
pub struct Feature {
    id: String,
    kind: ArtifactKind,
    generations: Vec<MarkerName>,
    fingerprints: Vec<Fingerprint>,
    terminator: Terminator,
    anchor: Option<Anchor>,
}

impl Feature {
    /// Create feature, returning `None` when `generations` is empty
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        kind: ArtifactKind,
        generations: Vec<MarkerName>,
    ) -> Option<Self> {
        if generations.is_empty() {
            return None;
        }
        Some(Self {
            id: id.into(),
            kind,
            generations,
            fingerprints: Vec::new(),
            terminator: default_terminator(kind),
            anchor: None,
        })
    }

    #[must_use]
    pub fn with_fingerprints(mut self, fingerprints: Vec<Fingerprint>) -> Self {
        self.fingerprints = fingerprints;
        self
    }

    #[must_use]
    pub fn with_terminator(mut self, terminator: Terminator) -> Self {
        self.terminator = terminator;
        self
    }

    #[must_use]
    pub fn with_anchor(mut self, anchor: Anchor) -> Self {
        self.anchor = Some(anchor);
        self
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[inline]
    #[must_use]
    pub fn kind(&self) -> ArtifactKind {
        self.kind
    }

    /// Every generation, oldest first
    #[inline]
    #[must_use]
    pub fn generations(&self) -> &[MarkerName] {
        &self.generations
    }

    /// Current generation
    #[must_use]
    pub fn current(&self) -> &MarkerName {
        // Non-empty by construction
        &self.generations[self.generations.len() - 1]
    }

    /// Superseded generations
    #[must_use]
    pub fn legacy(&self) -> &[MarkerName] {
        &self.generations[..self.generations.len() - 1]
    }

    #[inline]
    #[must_use]
    pub fn fingerprints(&self) -> &[Fingerprint] {
        &self.fingerprints
    }

    #[inline]
    #[must_use]
    pub fn terminator(&self) -> Terminator {
        self.terminator
    }

    /// Primary anchor of the feature, if declared
    #[inline]
    #[must_use]
    pub fn anchor(&self) -> Option<&Anchor> {
        self.anchor.as_ref()
    }
}

/// Markup blocks end at the next boundary; stylesheet and script blocks are
/// closed explicitly since those artifacts have no structural anchors
#[must_use]
pub fn default_terminator(kind: ArtifactKind) -> Terminator {
    match kind {
        ArtifactKind::Markup => Terminator::Inferred,
        ArtifactKind::Stylesheet | ArtifactKind::Script => Terminator::Explicit,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<MarkerName> {
        list.iter().map(|n| MarkerName::new(*n).unwrap()).collect()
    }

    #[test]
    fn current_and_legacy() {
        let feature = Feature::new(
            "clean-filters",
            ArtifactKind::Markup,
            names(&["CLEAN_FILTERS:BAR", "CLEAN_FILTERS_V2:BAR", "CLEAN_FILTERS_V3:BAR"]),
        )
        .unwrap();
        assert_eq!(feature.current().as_str(), "CLEAN_FILTERS_V3:BAR");
        assert_eq!(feature.legacy().len(), 2);
        assert_eq!(feature.terminator(), Terminator::Inferred);
    }

    #[test]
    fn empty_generations_rejected() {
        assert!(Feature::new("x", ArtifactKind::Script, Vec::new()).is_none());
    }

    #[test]
    fn companion_kinds_default_to_explicit() {
        let feature = Feature::new("fab", ArtifactKind::Stylesheet, names(&["FAB:CSS"])).unwrap();
        assert!(feature.legacy().is_empty());
        assert_eq!(feature.terminator(), Terminator::Explicit);
    }
}
