//! Marker-guarded block insertion
//!
//! Every injection first checks whether the marker is already present. If it
//! is, the whole call is a no-op, which makes re-running a plan safe.

use crate::anchor::Anchor;
use crate::diagnostic::{Diagnostic, DiagnosticKind};
use crate::marker::{MarkerName, Terminator};
use crate::registry::MarkerRegistry;
use tracing::debug;

/// What an injection did
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "outcome", rename_all = "kebab-case")]
pub enum InjectOutcome {
    /// Marker already present, text unchanged
    AlreadyPresent,
    /// Block inserted before the anchor, at byte offset `at`
    Anchored { at: usize },
    /// Block appended at the end of the text
    Appended,
}

/// Result of an injection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Injection {
    pub text: String,
    pub outcome: InjectOutcome,
    pub diagnostics: Vec<Diagnostic>,
}

impl Injection {
    /// Check whether the text was changed
    #[inline]
    #[must_use]
    pub fn changed(&self) -> bool {
        self.outcome != InjectOutcome::AlreadyPresent
    }
}

/// Inserts named blocks into one kind of artifact
#[derive(Debug, Clone, Copy)]
pub struct BlockInjector<'r> {
    registry: &'r MarkerRegistry,
    terminator: Terminator,
}

impl<'r> BlockInjector<'r> {
    /// Injector writing inferred (unterminated) blocks
    #[must_use]
    pub fn new(registry: &'r MarkerRegistry) -> Self {
        Self {
            registry,
            terminator: Terminator::Inferred,
        }
    }

    /// Set the terminator policy for written blocks
    #[must_use]
    pub fn with_terminator(mut self, terminator: Terminator) -> Self {
        self.terminator = terminator;
        self
    }

    /// Insert `body` under `name` immediately before the anchor's first
    /// occurrence
    ///
    /// A missing anchor degrades to appending at the end and reports
    /// [`DiagnosticKind::AnchorNotFound`].
    #[must_use]
    pub fn inject(&self, text: &str, name: &MarkerName, body: &str, anchor: &Anchor) -> Injection {
        if self.registry.has_marker(text, name) {
            return already_present(text, name);
        }

        let block = self.render_block(name, body);
        match anchor.find_first(text) {
            Some(span) => {
                let at = insertion_point(text, span.start());
                debug!(marker = %name, at, anchor = %anchor, "inserting block before anchor");

                let mut out = String::with_capacity(text.len() + block.len());
                out.push_str(&text[..at]);
                out.push_str(&block);
                out.push_str(&text[at..]);
                Injection {
                    text: out,
                    outcome: InjectOutcome::Anchored { at },
                    diagnostics: Vec::new(),
                }
            }
            None => {
                let diagnostic = Diagnostic::new(
                    DiagnosticKind::AnchorNotFound,
                    format!("{name}: anchor {anchor} not found, block appended at end"),
                )
                .logged();

                let mut out = text.to_owned();
                if !out.is_empty() && !out.ends_with('\n') {
                    out.push('\n');
                }
                out.push_str(&block);
                Injection {
                    text: out,
                    outcome: InjectOutcome::Appended,
                    diagnostics: vec![diagnostic],
                }
            }
        }
    }

    /// Append `body` under `name` at the end of a companion artifact
    ///
    /// Trailing whitespace of the artifact is normalized to one blank line
    /// before the block.
    #[must_use]
    pub fn append(&self, text: &str, name: &MarkerName, body: &str) -> Injection {
        if self.registry.has_marker(text, name) {
            return already_present(text, name);
        }

        debug!(marker = %name, "appending block");
        let block = self.render_block(name, body);
        let head = text.trim_end();
        let mut out = String::with_capacity(head.len() + block.len() + 2);
        out.push_str(head);
        if !head.is_empty() {
            out.push_str("\n\n");
        }
        out.push_str(&block);
        Injection {
            text: out,
            outcome: InjectOutcome::Appended,
            diagnostics: Vec::new(),
        }
    }

    /// Insert an unmarked `snippet` before the anchor unless `guard` already
    /// occurs in the text
    ///
    /// Used for one-line includes such as a script tag before `</body>`.
    #[must_use]
    pub fn ensure_snippet(&self, text: &str, guard: &str, snippet: &str, anchor: &Anchor) -> Injection {
        if text.contains(guard) {
            return Injection {
                text: text.to_owned(),
                outcome: InjectOutcome::AlreadyPresent,
                diagnostics: Vec::new(),
            };
        }

        let snippet = snippet.trim_matches(|c: char| c == '\n' || c == '\r');
        match anchor.find_first(text) {
            Some(span) => {
                let at = insertion_point(text, span.start());
                debug!(guard, at, anchor = %anchor, "inserting snippet");
                let mut out = text.to_owned();
                out.insert_str(at, &format!("{snippet}\n"));
                Injection {
                    text: out,
                    outcome: InjectOutcome::Anchored { at },
                    diagnostics: Vec::new(),
                }
            }
            None => {
                let diagnostic = Diagnostic::new(
                    DiagnosticKind::AnchorNotFound,
                    format!("snippet {guard:?}: anchor {anchor} not found, appended at end"),
                )
                .logged();
                let mut out = text.to_owned();
                if !out.is_empty() && !out.ends_with('\n') {
                    out.push('\n');
                }
                out.push_str(snippet);
                out.push('\n');
                Injection {
                    text: out,
                    outcome: InjectOutcome::Appended,
                    diagnostics: vec![diagnostic],
                }
            }
        }
    }

    /// Render the block text for `name`: sentinel, body, optional terminator
    #[must_use]
    pub fn render_block(&self, name: &MarkerName, body: &str) -> String {
        let syntax = self.registry.syntax();
        let body = body.trim_matches(|c: char| c == '\n' || c == '\r');
        let mut block = String::new();

        if !syntax.starts_with_sentinel(body, name) {
            block.push_str(&syntax.render_start(name));
            block.push('\n');
        }
        if !body.is_empty() {
            block.push_str(body);
            block.push('\n');
        }

        let closed = syntax
            .scan(body)
            .last()
            .is_some_and(|t| t.closes(name));
        if self.terminator == Terminator::Explicit && !closed {
            block.push_str(&syntax.render_end(name));
            block.push('\n');
        }
        block
    }
}

/// Offset to insert before `offset`: its line start when only indentation
/// precedes it
pub(crate) fn insertion_point(text: &str, offset: usize) -> usize {
    let line_start = text[..offset].rfind('\n').map_or(0, |i| i + 1);
    if text[line_start..offset].trim().is_empty() {
        line_start
    } else {
        offset
    }
}

fn already_present(text: &str, name: &MarkerName) -> Injection {
    debug!(marker = %name, "marker present, injection skipped");
    Injection {
        text: text.to_owned(),
        outcome: InjectOutcome::AlreadyPresent,
        diagnostics: Vec::new(),
    }
}
