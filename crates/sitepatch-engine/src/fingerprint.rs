//! Structural fingerprints for fragments that predate markers
//!
//! Early generations were injected without sentinels, so they can only be
//! recognized by shape. In markup that is an element id, an exact label, or
//! a class, optionally scoped to the inside of elements carrying a class. In
//! stylesheets it is a rule: a selector, optionally narrowed to rules whose
//! declarations contain a given text.

use crate::anchor::{case_insensitive, tag_pattern};
use crate::element::element_at;
use regex::Regex;
use sitepatch_artifact::{ArtifactKind, Span};
use std::fmt::{self, Display, Formatter};

#[derive(Debug, Clone)]
enum Shape {
    Element {
        open_tag: Regex,
        within: Option<Regex>,
    },
    Rule {
        selector: Regex,
        /// Whitespace-free, lowercased declaration text
        declaration: Option<String>,
    },
}

/// A fragment located by a [`Fingerprint`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Lowercased tag name of an element, `rule` for a stylesheet rule
    pub shape: String,
    /// Whole fragment: opening tag through matching close tag, or selector
    /// through closing brace
    pub span: Span,
}

/// Shape-based locator for unmarked legacy fragments
#[derive(Debug, Clone)]
pub struct Fingerprint {
    description: String,
    shape: Shape,
}

impl Fingerprint {
    /// Element carrying `id`, optionally restricted to `tag`
    ///
    /// # Errors
    /// Returns error if the generated pattern does not compile
    pub fn element_id(tag: Option<&str>, id: &str) -> Result<Self, regex::Error> {
        let source = format!(
            r#"<{tag}\b[^>]*\bid\s*=\s*["']{id}["'][^>]*>"#,
            tag = tag_pattern(tag.unwrap_or("*")),
            id = regex::escape(id),
        );
        Ok(Self::element(format!("#{id}"), case_insensitive(&source)?))
    }

    /// `tag` element whose trimmed text content is exactly `label`
    ///
    /// Runs of whitespace in `label` match any whitespace run.
    ///
    /// # Errors
    /// Returns error if the generated pattern does not compile
    pub fn label(tag: &str, label: &str) -> Result<Self, regex::Error> {
        let words: Vec<String> = label.split_whitespace().map(regex::escape).collect();
        let source = format!(
            r"<{tag}\b[^>]*>\s*{text}\s*</{tag}\s*>",
            tag = tag_pattern(tag),
            text = words.join(r"\s+"),
        );
        Ok(Self::element(format!("<{tag}>{label:?}"), Regex::new(&source)?))
    }

    /// Element carrying `class`, optionally restricted to `tag`
    ///
    /// # Errors
    /// Returns error if the generated pattern does not compile
    pub fn element_class(tag: Option<&str>, class: &str) -> Result<Self, regex::Error> {
        Ok(Self::element(
            format!(".{class}"),
            case_insensitive(&class_source(tag.unwrap_or("*"), class))?,
        ))
    }

    /// Stylesheet rule whose whole selector is `selector`
    ///
    /// With `declaration`, only rules whose body contains that text match;
    /// whitespace and ASCII case are ignored on both sides, so
    /// `display:none!important` matches `display: none !important;`.
    ///
    /// # Errors
    /// Returns error if the generated pattern does not compile
    pub fn rule(selector: &str, declaration: Option<&str>) -> Result<Self, regex::Error> {
        let words: Vec<String> = selector.split_whitespace().map(regex::escape).collect();
        let source = format!(r"{}\s*\{{[^{{}}]*\}}", words.join(r"\s+"));
        let description = match declaration {
            Some(declaration) => format!("{selector} {{{declaration}}}"),
            None => format!("{selector} {{}}"),
        };
        Ok(Self {
            description,
            shape: Shape::Rule {
                selector: case_insensitive(&source)?,
                declaration: declaration.map(compact),
            },
        })
    }

    fn element(description: String, open_tag: Regex) -> Self {
        Self {
            description,
            shape: Shape::Element {
                open_tag,
                within: None,
            },
        }
    }

    /// Only match inside elements carrying `class`
    ///
    /// Has no effect on rule fingerprints.
    ///
    /// # Errors
    /// Returns error if the generated pattern does not compile
    pub fn within(mut self, class: &str) -> Result<Self, regex::Error> {
        if let Shape::Element { within, .. } = &mut self.shape {
            *within = Some(case_insensitive(&class_source("*", class))?);
            self.description = format!(".{class} {}", self.description);
        }
        Ok(self)
    }

    /// Artifact kind this fingerprint can match in
    #[must_use]
    pub fn kind(&self) -> ArtifactKind {
        match self.shape {
            Shape::Element { .. } => ArtifactKind::Markup,
            Shape::Rule { .. } => ArtifactKind::Stylesheet,
        }
    }

    /// Human-readable description for reports
    #[inline]
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Locate every candidate fragment
    ///
    /// Elements whose close tag cannot be found are returned in the second
    /// vector as opening-tag offsets.
    #[must_use]
    pub fn candidates(&self, text: &str) -> (Vec<Candidate>, Vec<usize>) {
        match &self.shape {
            Shape::Element { open_tag, within } => element_candidates(text, open_tag, within.as_ref()),
            Shape::Rule {
                selector,
                declaration,
            } => (rule_candidates(text, selector, declaration.as_deref()), Vec::new()),
        }
    }
}

impl Display for Fingerprint {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description)
    }
}

fn element_candidates(
    text: &str,
    open_tag: &Regex,
    within: Option<&Regex>,
) -> (Vec<Candidate>, Vec<usize>) {
    let scopes: Option<Vec<Span>> = within.map(|re| {
        re.find_iter(text)
            .filter_map(|m| element_at(text, m.start()))
            .map(|e| e.span)
            .collect()
    });

    let mut found = Vec::new();
    let mut unbalanced = Vec::new();
    for m in open_tag.find_iter(text) {
        let start = m.start();
        if let Some(scopes) = &scopes {
            if !scopes.iter().any(|s| s.start() < start && start < s.end()) {
                continue;
            }
        }
        match element_at(text, start) {
            Some(element) => found.push(Candidate {
                shape: element.tag,
                span: element.span,
            }),
            None => unbalanced.push(start),
        }
    }
    (found, unbalanced)
}

fn rule_candidates(text: &str, selector: &Regex, declaration: Option<&str>) -> Vec<Candidate> {
    selector
        .find_iter(text)
        .filter(|m| starts_rule(&text[..m.start()]))
        .filter(|m| {
            declaration.map_or(true, |wanted| {
                let body = &m.as_str()[m.as_str().find('{').map_or(0, |i| i + 1)..];
                compact(body).contains(wanted)
            })
        })
        .map(|m| Candidate {
            shape: "rule".to_string(),
            span: Span::from_range(m.range()),
        })
        .collect()
}

/// A selector match is a whole rule only when it starts a statement, so
/// `.x .wa-fab` and `a.wa-fab` are not taken for `.wa-fab`
fn starts_rule(before: &str) -> bool {
    let before = before.trim_end();
    before.is_empty() || before.ends_with(['}', '{', ';']) || before.ends_with("*/")
}

fn compact(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

fn class_source(tag: &str, class: &str) -> String {
    format!(
        r#"<{tag}\b[^>]*\bclass\s*=\s*["'](?:[^"']*\s)?{class}(?:\s[^"']*)?["'][^>]*>"#,
        tag = tag_pattern(tag),
        class = regex::escape(class),
    )
}
