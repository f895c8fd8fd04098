//! Marker recognition for one artifact kind
//!
//! The registry knows which marker names exist (every generation of every
//! feature of the kind) and which anchors structure the artifact. Lookups are
//! presence and span searches over the [`BoundaryMap`], never a parse.

use crate::anchor::Anchor;
use crate::boundary::{Block, BoundaryMap};
use crate::marker::{MarkerName, SentinelSyntax};
use sitepatch_artifact::{ArtifactKind, Span};
use std::collections::BTreeSet;

/// Registered marker names and anchors for one artifact kind
#[derive(Debug, Clone)]
pub struct MarkerRegistry {
    syntax: SentinelSyntax,
    names: BTreeSet<MarkerName>,
    anchors: Vec<Anchor>,
}

impl MarkerRegistry {
    /// Empty registry for `kind`
    #[must_use]
    pub fn new(kind: ArtifactKind) -> Self {
        Self {
            syntax: SentinelSyntax::for_kind(kind),
            names: BTreeSet::new(),
            anchors: Vec::new(),
        }
    }

    /// Add a structural anchor (builder style)
    #[must_use]
    pub fn with_anchor(mut self, anchor: Anchor) -> Self {
        self.anchors.push(anchor);
        self
    }

    /// Register a marker name as a block boundary
    ///
    /// Returns `false` if the name was already registered.
    pub fn register(&mut self, name: MarkerName) -> bool {
        self.names.insert(name)
    }

    /// Register several names at once
    pub fn register_all(&mut self, names: impl IntoIterator<Item = MarkerName>) {
        self.names.extend(names);
    }

    /// Add a structural anchor
    pub fn add_anchor(&mut self, anchor: Anchor) {
        self.anchors.push(anchor);
    }

    /// Sentinel syntax of this registry's kind
    #[inline]
    #[must_use]
    pub fn syntax(&self) -> &SentinelSyntax {
        &self.syntax
    }

    /// Artifact kind
    #[inline]
    #[must_use]
    pub fn kind(&self) -> ArtifactKind {
        self.syntax.kind()
    }

    /// Known anchors
    #[inline]
    #[must_use]
    pub fn anchors(&self) -> &[Anchor] {
        &self.anchors
    }

    /// Check whether `name` is a registered marker name, ignoring ASCII case
    #[must_use]
    pub fn is_registered(&self, name: &str) -> bool {
        self.names.iter().any(|n| n.matches(name))
    }

    /// Registered names, sorted
    pub fn names(&self) -> impl Iterator<Item = &MarkerName> {
        self.names.iter()
    }

    /// Boundary model of `text` as seen when looking up `name`
    #[must_use]
    pub fn boundaries<'t>(&self, text: &'t str, name: &MarkerName) -> BoundaryMap<'t> {
        BoundaryMap::scan(text, self, Some(name.as_str()))
    }

    /// Check whether `text` contains a start sentinel for `name`
    #[must_use]
    pub fn has_marker(&self, text: &str, name: &MarkerName) -> bool {
        self.syntax
            .scan(text)
            .iter()
            .any(|t| t.opens(name))
    }

    /// Span of the first live block of `name`
    #[must_use]
    pub fn find_block(&self, text: &str, name: &MarkerName) -> Option<Span> {
        self.find_blocks(text, name).into_iter().next()
    }

    /// Spans of every live block of `name`, in text order
    #[must_use]
    pub fn find_blocks(&self, text: &str, name: &MarkerName) -> Vec<Span> {
        self.blocks(text, name).into_iter().map(|b| b.span).collect()
    }

    /// Every live block of `name` with sentinel and terminator details
    #[must_use]
    pub fn blocks(&self, text: &str, name: &MarkerName) -> Vec<Block> {
        if !self.has_marker(text, name) {
            return Vec::new();
        }
        self.boundaries(text, name).blocks(name.as_str())
    }
}
