//! Flat boundary model of an artifact
//!
//! An artifact is modelled as an ordered sequence of recognized boundaries:
//! start sentinels, `END` terminators and structural anchor occurrences.
//! Blocks are derived from this sequence instead of from greedy patterns, so
//! a block can never run past a sibling marker or a known anchor.

use crate::registry::MarkerRegistry;
use sitepatch_artifact::Span;

/// Kind of boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryKind<'t> {
    /// Start sentinel of a recognized marker
    Start(&'t str),
    /// `END` terminator of a recognized marker
    End(&'t str),
    /// Occurrence of a known structural anchor
    Anchor,
}

impl BoundaryKind<'_> {
    /// Start sentinel of `name`, ignoring ASCII case
    #[must_use]
    pub fn opens(&self, name: &str) -> bool {
        matches!(self, Self::Start(n) if n.eq_ignore_ascii_case(name))
    }

    /// `END` terminator of `name`, ignoring ASCII case
    #[must_use]
    pub fn closes(&self, name: &str) -> bool {
        matches!(self, Self::End(n) if n.eq_ignore_ascii_case(name))
    }
}

/// One boundary in text order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Boundary<'t> {
    pub kind: BoundaryKind<'t>,
    pub span: Span,
}

/// A live block resolved from the boundary sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    /// Whole removable region (sentinel, content, terminator if any)
    pub span: Span,
    /// Span of the start sentinel
    pub sentinel: Span,
    /// Closed by an explicit terminator
    pub explicit: bool,
}

/// Ordered boundary sequence of one text
#[derive(Debug, Clone)]
pub struct BoundaryMap<'t> {
    text: &'t str,
    boundaries: Vec<Boundary<'t>>,
}

impl<'t> BoundaryMap<'t> {
    /// Scan `text` for every boundary the registry recognizes
    ///
    /// `extra` adds one name to the recognized set for this scan, so lookups
    /// of unregistered names still see their own sentinels.
    #[must_use]
    pub fn scan(text: &'t str, registry: &MarkerRegistry, extra: Option<&str>) -> Self {
        let mut boundaries: Vec<Boundary<'t>> = registry
            .syntax()
            .scan(text)
            .into_iter()
            .filter(|t| registry.is_registered(t.name) || extra.is_some_and(|e| e.eq_ignore_ascii_case(t.name)))
            .map(|t| Boundary {
                kind: if t.is_end {
                    BoundaryKind::End(t.name)
                } else {
                    BoundaryKind::Start(t.name)
                },
                span: t.span,
            })
            .collect();

        let sentinels: Vec<Span> = boundaries.iter().map(|b| b.span).collect();
        for anchor in registry.anchors() {
            boundaries.extend(
                anchor
                    .find_all(text)
                    .into_iter()
                    .filter(|span| !sentinels.iter().any(|s| s.overlaps(span)))
                    .map(|span| Boundary {
                        kind: BoundaryKind::Anchor,
                        span,
                    }),
            );
        }

        boundaries.sort_by_key(|b| (b.span.start(), b.span.end()));
        boundaries.dedup_by_key(|b| b.span);

        Self { text, boundaries }
    }

    /// All boundaries in text order
    #[inline]
    #[must_use]
    pub fn boundaries(&self) -> &[Boundary<'t>] {
        &self.boundaries
    }

    /// Check for a start sentinel of `name`
    #[must_use]
    pub fn has_start(&self, name: &str) -> bool {
        self.boundaries
            .iter()
            .any(|b| b.kind.opens(name))
    }

    /// Every live block of `name`, in text order
    #[must_use]
    pub fn blocks(&self, name: &str) -> Vec<Block> {
        self.boundaries
            .iter()
            .enumerate()
            .filter(|(_, b)| b.kind.opens(name))
            .map(|(i, _)| self.block_at(i, name))
            .collect()
    }

    /// `END` terminators of `name` not closing any block
    #[must_use]
    pub fn orphan_ends(&self, name: &str) -> Vec<Span> {
        let closed: Vec<Span> = self
            .blocks(name)
            .into_iter()
            .filter(|b| b.explicit)
            .map(|b| b.span)
            .collect();
        self.boundaries
            .iter()
            .filter(|b| b.kind.closes(name))
            .filter(|b| !closed.iter().any(|c| c.contains(&b.span)))
            .map(|b| extend_over_newline(self.text, b.span))
            .collect()
    }

    fn block_at(&self, index: usize, name: &str) -> Block {
        let sentinel = self.boundaries[index].span;
        let start = indent_start(self.text, sentinel.start());
        let rest = &self.boundaries[index + 1..];

        for b in rest {
            if b.kind.opens(name) {
                break;
            }
            if b.kind.closes(name) {
                let span = extend_over_newline(self.text, Span::from_range(start..b.span.end()));
                return Block {
                    span,
                    sentinel,
                    explicit: true,
                };
            }
        }

        let end = rest
            .iter()
            .map(|b| b.span.start())
            .find(|&start| start >= sentinel.end())
            .unwrap_or(self.text.len());
        Block {
            span: Span::from_range(start..retreat_over_indent(self.text, end, sentinel.end())),
            sentinel,
            explicit: false,
        }
    }
}

/// Extend a span over one directly following line break
pub(crate) fn extend_over_newline(text: &str, span: Span) -> Span {
    let tail = &text[span.end()..];
    if tail.starts_with("\r\n") {
        span.with_end(span.end() + 2)
    } else if tail.starts_with('\n') {
        span.with_end(span.end() + 1)
    } else {
        span
    }
}

/// Line start of `offset` when only indentation precedes it
fn indent_start(text: &str, offset: usize) -> usize {
    let line_start = text[..offset].rfind('\n').map_or(0, |i| i + 1);
    if text[line_start..offset].bytes().all(|b| b == b' ' || b == b'\t') {
        line_start
    } else {
        offset
    }
}

/// Move `end` back to its line start when only indentation precedes it
///
/// The indentation belongs to the following boundary, not to the block.
fn retreat_over_indent(text: &str, end: usize, floor: usize) -> usize {
    let Some(newline) = text[..end].rfind('\n') else {
        return end;
    };
    let line_start = newline + 1;
    if line_start >= floor && text[line_start..end].bytes().all(|b| b == b' ' || b == b'\t') {
        line_start
    } else {
        end
    }
}

/// Remove every span from `text`; overlapping spans are merged first
pub(crate) fn remove_spans(text: &str, mut spans: Vec<Span>) -> String {
    spans.sort_by_key(|s| (s.start(), s.end()));
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for span in spans {
        if span.end() <= cursor {
            continue;
        }
        out.push_str(&text[cursor..span.start().max(cursor)]);
        cursor = span.end();
    }
    out.push_str(&text[cursor..]);
    out
}
