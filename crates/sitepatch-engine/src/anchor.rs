//! Deterministic structural locators
//!
//! An [`Anchor`] positions a newly injected block: the block goes immediately
//! before the anchor's first occurrence. All occurrences also act as block
//! boundaries when inferring where an unterminated block ends.

use regex::{Regex, RegexBuilder};
use sitepatch_artifact::Span;
use std::fmt::{self, Display, Formatter};

#[derive(Debug, Clone)]
enum Matcher {
    Literal(String),
    Pattern(Regex),
}

/// Structural locator within an artifact
#[derive(Debug, Clone)]
pub struct Anchor {
    description: String,
    matcher: Matcher,
}

impl Anchor {
    /// Exact literal text
    #[must_use]
    pub fn literal(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            description: format!("literal {text:?}"),
            matcher: Matcher::Literal(text),
        }
    }

    /// Regular expression (first match)
    ///
    /// # Errors
    /// Returns error if the pattern does not compile
    pub fn pattern(source: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            description: format!("pattern /{source}/"),
            matcher: Matcher::Pattern(Regex::new(source)?),
        })
    }

    /// Opening tag of an element carrying `class` as one of its classes
    ///
    /// `tag = "*"` accepts any element. Matching is case-insensitive.
    ///
    /// # Errors
    /// Returns error if the generated pattern does not compile
    pub fn element_with_class(tag: &str, class: &str) -> Result<Self, regex::Error> {
        let source = format!(
            r#"<{tag}\b[^>]*\bclass\s*=\s*["'](?:[^"']*\s)?{class}(?:\s[^"']*)?["'][^>]*>"#,
            tag = tag_pattern(tag),
            class = regex::escape(class),
        );
        Ok(Self {
            description: format!("<{tag} class~={class:?}>"),
            matcher: Matcher::Pattern(case_insensitive(&source)?),
        })
    }

    /// Closing tag, e.g. `</body>`
    ///
    /// # Errors
    /// Returns error if the generated pattern does not compile
    pub fn closing_tag(tag: &str) -> Result<Self, regex::Error> {
        let source = format!(r"</{}\s*>", regex::escape(tag));
        Ok(Self {
            description: format!("</{tag}>"),
            matcher: Matcher::Pattern(case_insensitive(&source)?),
        })
    }

    /// First occurrence
    #[must_use]
    pub fn find_first(&self, text: &str) -> Option<Span> {
        match &self.matcher {
            Matcher::Literal(lit) => text
                .find(lit.as_str())
                .map(|i| Span::from_range(i..i + lit.len())),
            Matcher::Pattern(re) => re.find(text).map(|m| Span::from_range(m.range())),
        }
    }

    /// Every non-overlapping occurrence, in order
    #[must_use]
    pub fn find_all(&self, text: &str) -> Vec<Span> {
        match &self.matcher {
            Matcher::Literal(lit) if lit.is_empty() => Vec::new(),
            Matcher::Literal(lit) => text
                .match_indices(lit.as_str())
                .map(|(i, m)| Span::from_range(i..i + m.len()))
                .collect(),
            Matcher::Pattern(re) => re
                .find_iter(text)
                .filter(|m| !m.is_empty())
                .map(|m| Span::from_range(m.range()))
                .collect(),
        }
    }

    /// Human-readable description for reports
    #[inline]
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }
}

impl Display for Anchor {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description)
    }
}

pub(crate) fn tag_pattern(tag: &str) -> String {
    if tag == "*" {
        "[a-zA-Z][a-zA-Z0-9-]*".to_string()
    } else {
        regex::escape(tag)
    }
}

pub(crate) fn case_insensitive(source: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(source).case_insensitive(true).build()
}
