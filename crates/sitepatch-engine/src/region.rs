//! Paired-marker regions
//!
//! A region is delimited by two distinct markers (e.g. `AUTO_CARDS_START`
//! and `AUTO_CARDS_END`). Its content is regenerated wholesale on every run;
//! the markers themselves stay in place.
//!
//! Before the first run the markers do not exist yet. The fallback anchor then
//! names the container the region belongs to: whatever the container holds
//! (typically hand-written cards) is replaced by the marked region.

use crate::anchor::Anchor;
use crate::diagnostic::{Diagnostic, DiagnosticKind};
use crate::element::element_at;
use crate::error::{EngineError, EngineResult};
use crate::inject::insertion_point;
use crate::marker::{MarkerName, SentinelSyntax};
use sitepatch_artifact::Span;
use tracing::debug;

/// What a region replacement did
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RegionOutcome {
    /// Region already held exactly this content
    Unchanged,
    /// Content between the markers was replaced
    Replaced,
    /// Neither marker existed; the fallback anchor's element content was
    /// replaced by the region
    Claimed,
    /// Neither marker existed and the fallback anchor does not open an
    /// element; region inserted before it
    Inserted,
    /// Neither marker nor anchor existed; region appended
    Appended,
}

/// Result of a region replacement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionEdit {
    pub text: String,
    pub outcome: RegionOutcome,
    pub diagnostics: Vec<Diagnostic>,
}

/// Marker pair delimiting a region
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    pub start: MarkerName,
    pub end: MarkerName,
}

impl Region {
    #[must_use]
    pub fn new(start: MarkerName, end: MarkerName) -> Self {
        Self { start, end }
    }

    /// Locate the content span between the markers
    ///
    /// Returns `Ok(None)` if neither marker is present.
    ///
    /// # Errors
    /// [`EngineError::StructuralMismatch`] when only one marker is present
    /// or the end marker precedes the start marker.
    pub fn locate(&self, syntax: &SentinelSyntax, text: &str) -> EngineResult<Option<Span>> {
        let tokens = syntax.scan(text);
        let first = |name: &MarkerName, from: usize| {
            tokens
                .iter()
                .find(|t| t.opens(name) && t.span.start() >= from)
                .map(|t| t.span)
        };

        match (first(&self.start, 0), first(&self.end, 0)) {
            (None, None) => Ok(None),
            (Some(start), Some(_)) => match first(&self.end, start.end()) {
                Some(end) => Ok(Some(Span::from_range(start.end()..end.start()))),
                None => Err(EngineError::structural_mismatch(format!(
                    "region marker {} precedes {}",
                    self.end, self.start
                ))),
            },
            (Some(_), None) => Err(EngineError::structural_mismatch(format!(
                "region {} has no closing {}",
                self.start, self.end
            ))),
            (None, Some(_)) => Err(EngineError::structural_mismatch(format!(
                "region {} has no opening {}",
                self.end, self.start
            ))),
        }
    }

    /// Replace the region content with `body`
    ///
    /// # Errors
    /// [`EngineError::StructuralMismatch`] when the marker pair is broken.
    pub fn replace(
        &self,
        syntax: &SentinelSyntax,
        text: &str,
        body: &str,
        fallback: Option<&Anchor>,
    ) -> EngineResult<RegionEdit> {
        let body = body.trim_matches(|c: char| c == '\n' || c == '\r');
        let content = if body.is_empty() {
            "\n".to_owned()
        } else {
            format!("\n{body}\n")
        };

        if let Some(span) = self.locate(syntax, text)? {
            if span.slice(text) == content {
                return Ok(RegionEdit {
                    text: text.to_owned(),
                    outcome: RegionOutcome::Unchanged,
                    diagnostics: Vec::new(),
                });
            }
            debug!(region = %self.start, %span, "replacing region content");
            let mut out = text.to_owned();
            out.replace_range(span.range(), &content);
            return Ok(RegionEdit {
                text: out,
                outcome: RegionOutcome::Replaced,
                diagnostics: Vec::new(),
            });
        }

        let region = format!(
            "{}{content}{}\n",
            syntax.render_start(&self.start),
            syntax.render_start(&self.end),
        );

        let found = fallback.and_then(|a| a.find_first(text).map(|s| (a, s)));
        if let Some((anchor, inner)) =
            found.and_then(|(a, s)| claimable(text, s.start()).map(|inner| (a, inner)))
        {
            debug!(region = %self.start, anchor = %anchor, replaced = inner.len(), "claiming anchor element for region");
            let mut out = text.to_owned();
            out.replace_range(inner.range(), &format!("\n{region}"));
            return Ok(RegionEdit {
                text: out,
                outcome: RegionOutcome::Claimed,
                diagnostics: Vec::new(),
            });
        }

        match found {
            Some((anchor, span)) => {
                let at = insertion_point(text, span.start());
                debug!(region = %self.start, at, anchor = %anchor, "inserting region before anchor");
                let mut out = text.to_owned();
                out.insert_str(at, &region);
                Ok(RegionEdit {
                    text: out,
                    outcome: RegionOutcome::Inserted,
                    diagnostics: Vec::new(),
                })
            }
            None => {
                let mut diagnostics = Vec::new();
                if let Some(anchor) = fallback {
                    diagnostics.push(
                        Diagnostic::new(
                            DiagnosticKind::AnchorNotFound,
                            format!("{}: anchor {anchor} not found, region appended at end", self.start),
                        )
                        .logged(),
                    );
                }
                let mut out = text.to_owned();
                if !out.is_empty() && !out.ends_with('\n') {
                    out.push('\n');
                }
                out.push_str(&region);
                Ok(RegionEdit {
                    text: out,
                    outcome: RegionOutcome::Appended,
                    diagnostics,
                })
            }
        }
    }
}

/// Content span of the balanced element whose opening tag starts at `at`
fn claimable(text: &str, at: usize) -> Option<Span> {
    let element = element_at(text, at)?;
    let outer = element.span.slice(text);
    let open_end = at + outer.find('>')? + 1;
    let close_start = at + outer.rfind("</")?;
    (open_end <= close_start).then(|| Span::from_range(open_end..close_start))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sitepatch_artifact::ArtifactKind;

    fn cards_region() -> Region {
        Region::new(
            MarkerName::new("AUTO_CARDS_START").unwrap(),
            MarkerName::new("AUTO_CARDS_END").unwrap(),
        )
    }

    fn markup() -> SentinelSyntax {
        SentinelSyntax::for_kind(ArtifactKind::Markup)
    }

    #[test]
    fn replaces_between_markers_and_is_stable() {
        let text = "<div>\n<!-- AUTO_CARDS_START -->\nold\n<!-- AUTO_CARDS_END -->\n</div>";
        let edit = cards_region()
            .replace(&markup(), text, "<a>new</a>\n", None)
            .unwrap();
        assert_eq!(edit.outcome, RegionOutcome::Replaced);
        assert_eq!(
            edit.text,
            "<div>\n<!-- AUTO_CARDS_START -->\n<a>new</a>\n<!-- AUTO_CARDS_END -->\n</div>"
        );

        let again = cards_region()
            .replace(&markup(), &edit.text, "<a>new</a>", None)
            .unwrap();
        assert_eq!(again.outcome, RegionOutcome::Unchanged);
        assert_eq!(again.text, edit.text);
    }

    #[test]
    fn broken_pairs_are_structural_mismatches() {
        let region = cards_region();
        for text in [
            "<!-- AUTO_CARDS_START -->\nx",
            "x\n<!-- AUTO_CARDS_END -->",
            "<!-- AUTO_CARDS_END -->\nx\n<!-- AUTO_CARDS_START -->",
        ] {
            let err = region.replace(&markup(), text, "y", None).unwrap_err();
            assert!(matches!(err, EngineError::StructuralMismatch(_)), "{text}");
        }
    }

    #[test]
    fn missing_markers_claim_fallback_element() {
        let text = "<main>\n  <div class=\"cards\">\n    <article>hand-written</article>\n  </div>\n</main>\n";
        let anchor = Anchor::element_with_class("div", "cards").unwrap();
        let edit = cards_region()
            .replace(&markup(), text, "<a>1</a>", Some(&anchor))
            .unwrap();
        assert_eq!(edit.outcome, RegionOutcome::Claimed);
        assert_eq!(
            edit.text,
            "<main>\n  <div class=\"cards\">\n<!-- AUTO_CARDS_START -->\n<a>1</a>\n<!-- AUTO_CARDS_END -->\n</div>\n</main>\n"
        );
        assert!(!edit.text.contains("hand-written"));

        let again = cards_region()
            .replace(&markup(), &edit.text, "<a>1</a>", Some(&anchor))
            .unwrap();
        assert_eq!(again.outcome, RegionOutcome::Unchanged);
    }

    #[test]
    fn missing_markers_insert_before_closing_tag_anchor() {
        let text = "<main>\n  <footer></footer>\n</main>";
        let anchor = Anchor::closing_tag("main").unwrap();
        let edit = cards_region()
            .replace(&markup(), text, "<a>1</a>", Some(&anchor))
            .unwrap();
        assert_eq!(edit.outcome, RegionOutcome::Inserted);
        assert_eq!(
            edit.text,
            "<main>\n  <footer></footer>\n<!-- AUTO_CARDS_START -->\n<a>1</a>\n<!-- AUTO_CARDS_END -->\n</main>"
        );
    }

    #[test]
    fn missing_markers_and_anchor_append_with_diagnostic() {
        let anchor = Anchor::literal("<footer>");
        let edit = cards_region()
            .replace(&markup(), "<main></main>", "<a>1</a>", Some(&anchor))
            .unwrap();
        assert_eq!(edit.outcome, RegionOutcome::Appended);
        assert_eq!(edit.diagnostics[0].kind, DiagnosticKind::AnchorNotFound);
        assert!(edit.text.ends_with("<!-- AUTO_CARDS_END -->\n"));
    }
}
