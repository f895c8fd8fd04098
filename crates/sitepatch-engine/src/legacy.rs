//! Removal of superseded generations
//!
//! Before the current generation of a feature is injected, every block of its
//! earlier generations and every unmarked fragment matching one of its
//! fingerprints is removed. Blocks of protected (current, registered) markers
//! are never touched.

use crate::anchor::Anchor;
use crate::boundary::remove_spans;
use crate::diagnostic::{Diagnostic, DiagnosticKind};
use crate::element::removal_extent;
use crate::fingerprint::{Candidate, Fingerprint};
use crate::marker::MarkerName;
use crate::registry::MarkerRegistry;
use sitepatch_artifact::Span;
use tracing::debug;

/// Result of a migration pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Migration {
    /// Text after removal
    pub text: String,
    /// Number of blocks or elements removed
    pub removed: usize,
    /// Non-fatal conditions encountered
    pub diagnostics: Vec<Diagnostic>,
}

impl Migration {
    fn unchanged(text: &str) -> Self {
        Self {
            text: text.to_owned(),
            removed: 0,
            diagnostics: Vec::new(),
        }
    }
}

/// Legacy block and fragment remover
#[derive(Debug, Clone, Copy)]
pub struct LegacyMigrator<'r> {
    registry: &'r MarkerRegistry,
}

impl<'r> LegacyMigrator<'r> {
    #[must_use]
    pub fn new(registry: &'r MarkerRegistry) -> Self {
        Self { registry }
    }

    /// Remove every block of `legacy` names, then every fragment matching
    /// `fingerprints`
    ///
    /// Orphaned `END` terminators of legacy names are removed as well.
    #[must_use]
    pub fn strip_legacy(
        &self,
        text: &str,
        legacy: &[MarkerName],
        fingerprints: &[Fingerprint],
    ) -> Migration {
        let mut text = text.to_owned();
        let mut removed = 0;

        for name in legacy {
            loop {
                let blocks = self.registry.find_blocks(&text, name);
                if blocks.is_empty() {
                    break;
                }
                debug!(marker = %name, count = blocks.len(), "removing legacy blocks");
                removed += blocks.len();
                text = remove_spans(&text, blocks);
            }

            let orphans = self.registry.boundaries(&text, name).orphan_ends(name.as_str());
            if !orphans.is_empty() {
                debug!(marker = %name, count = orphans.len(), "removing orphan terminators");
                text = remove_spans(&text, orphans);
            }
        }

        let protected: Vec<MarkerName> = self
            .registry
            .names()
            .filter(|n| !legacy.contains(n))
            .cloned()
            .collect();
        let mut migration = self.remove_fingerprints(&text, fingerprints, &protected);
        migration.removed += removed;
        migration
    }

    /// Remove every fragment matching `fingerprints`, outside blocks of
    /// `protected` markers
    ///
    /// Candidates nested in another candidate fold into the outer one. When
    /// the remaining candidates of one fingerprint differ in shape nothing is
    /// removed for that fingerprint and
    /// [`DiagnosticKind::AmbiguousLegacyMatch`] is reported, on every run
    /// until the fingerprint or the artifact is fixed.
    #[must_use]
    pub fn remove_fingerprints(
        &self,
        text: &str,
        fingerprints: &[Fingerprint],
        protected: &[MarkerName],
    ) -> Migration {
        let mut migration = Migration::unchanged(text);

        for fingerprint in fingerprints {
            let guarded = self.protected_spans(&migration.text, protected);
            let (found, unbalanced) = fingerprint.candidates(&migration.text);

            for offset in unbalanced {
                migration.diagnostics.push(
                    Diagnostic::new(
                        DiagnosticKind::AmbiguousLegacyMatch,
                        format!("{fingerprint}: element has no matching close tag, left in place"),
                    )
                    .at(Span::point(offset))
                    .logged(),
                );
            }

            let candidates: Vec<Candidate> = fold_nested(
                found
                    .into_iter()
                    .filter(|e| !guarded.iter().any(|g| g.overlaps(&e.span)))
                    .collect(),
            );
            if candidates.is_empty() {
                continue;
            }

            if candidates.iter().any(|c| c.shape != candidates[0].shape) {
                let mut shapes: Vec<&str> = candidates.iter().map(|c| c.shape.as_str()).collect();
                shapes.sort_unstable();
                shapes.dedup();
                migration.diagnostics.push(
                    Diagnostic::new(
                        DiagnosticKind::AmbiguousLegacyMatch,
                        format!(
                            "{fingerprint}: {} candidates of different shape (<{}>), none removed",
                            candidates.len(),
                            shapes.join(">, <")
                        ),
                    )
                    .at(candidates[0].span)
                    .logged(),
                );
                continue;
            }

            debug!(fingerprint = %fingerprint, count = candidates.len(), "removing legacy fragments");
            migration.removed += candidates.len();
            let spans = candidates
                .iter()
                .map(|c| removal_extent(&migration.text, c.span))
                .collect();
            migration.text = remove_spans(&migration.text, spans);
        }

        migration
    }

    /// Keep a single live block of the current generation
    ///
    /// The block nearest the anchor's first occurrence survives; without an
    /// anchor, or on a tie, the first block survives.
    #[must_use]
    pub fn dedupe_current(
        &self,
        text: &str,
        name: &MarkerName,
        anchor: Option<&Anchor>,
    ) -> Migration {
        let blocks = self.registry.find_blocks(text, name);
        if blocks.len() < 2 {
            return Migration::unchanged(text);
        }

        let keep = anchor
            .and_then(|a| a.find_first(text))
            .and_then(|a| {
                blocks
                    .iter()
                    .enumerate()
                    .min_by_key(|(_, b)| b.distance_to(&a))
                    .map(|(i, _)| i)
            })
            .unwrap_or(0);

        let doomed: Vec<Span> = blocks
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != keep)
            .map(|(_, b)| *b)
            .collect();
        let diagnostic = Diagnostic::new(
            DiagnosticKind::DuplicateMarker,
            format!("{name}: {} live blocks, kept one", blocks.len()),
        )
        .at(blocks[keep])
        .logged();

        Migration {
            removed: doomed.len(),
            text: remove_spans(text, doomed),
            diagnostics: vec![diagnostic],
        }
    }

    /// Keep one element matching `fingerprint`, removing the others
    ///
    /// The first element survives, or the last when `keep_last` is set.
    /// Elements inside blocks of any registered marker are left alone.
    #[must_use]
    pub fn dedupe_elements(&self, text: &str, fingerprint: &Fingerprint, keep_last: bool) -> Migration {
        let protected: Vec<MarkerName> = self.registry.names().cloned().collect();
        let guarded = self.protected_spans(text, &protected);
        let (found, _) = fingerprint.candidates(text);
        let mut elements = fold_nested(
            found
                .into_iter()
                .filter(|e| !guarded.iter().any(|g| g.overlaps(&e.span)))
                .collect(),
        );
        if elements.len() < 2 {
            return Migration::unchanged(text);
        }

        let kept = if keep_last {
            elements.pop()
        } else {
            Some(elements.remove(0))
        };
        debug!(fingerprint = %fingerprint, count = elements.len(), "removing duplicate elements");
        let spans = elements
            .iter()
            .map(|e| removal_extent(text, e.span))
            .collect();
        let mut diagnostics = Vec::new();
        if let Some(kept) = kept {
            diagnostics.push(
                Diagnostic::new(
                    DiagnosticKind::DuplicateMarker,
                    format!("{fingerprint}: {} duplicates removed", elements.len()),
                )
                .at(kept.span)
                .logged(),
            );
        }

        Migration {
            text: remove_spans(text, spans),
            removed: elements.len(),
            diagnostics,
        }
    }

    fn protected_spans(&self, text: &str, protected: &[MarkerName]) -> Vec<Span> {
        protected
            .iter()
            .flat_map(|name| self.registry.find_blocks(text, name))
            .collect()
    }
}

/// Drop candidates contained in another candidate
fn fold_nested(mut elements: Vec<Candidate>) -> Vec<Candidate> {
    elements.sort_by_key(|e| (e.span.start(), std::cmp::Reverse(e.span.end())));
    let mut outer: Vec<Candidate> = Vec::with_capacity(elements.len());
    for element in elements {
        if !outer.iter().any(|o| o.span.contains(&element.span)) {
            outer.push(element);
        }
    }
    outer
}
