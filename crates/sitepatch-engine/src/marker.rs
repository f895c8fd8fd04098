//! Marker names and per-kind sentinel syntax
//!
//! A marker is embedded in an artifact as a comment whose payload is exactly
//! the marker name:
//!
//! | kind | start | terminator |
//! |---|---|---|
//! | markup | `<!-- NAME -->` | `<!-- END NAME -->` |
//! | stylesheet | `/* === NAME === */` | `/* === END NAME === */` |
//! | script | `// === NAME ===` | `// === END NAME ===` |
//!
//! Recognition tolerates arbitrary whitespace inside the comment and ignores
//! ASCII case, so `<!-- end bar:v1 -->` terminates `BAR:V1`. Comments whose
//! payload is not a well-formed marker name are ordinary comments and are
//! ignored.

use crate::error::MarkerError;
use sitepatch_artifact::{ArtifactKind, Span};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Validated marker name
///
/// The name carries its generation (e.g. `CLEAN_FILTERS_V3:BAR`).
/// Allowed characters: ASCII letters, digits and `_ : . -`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MarkerName(String);

impl MarkerName {
    /// Create validated marker name
    ///
    /// # Errors
    /// Returns error if the name is empty or contains invalid characters
    pub fn new(name: impl Into<String>) -> Result<Self, MarkerError> {
        let name = name.into();
        if name.is_empty() {
            return Err(MarkerError::Empty);
        }
        if !is_valid_name(&name) {
            return Err(MarkerError::InvalidName(name));
        }
        Ok(Self(name))
    }

    /// Name as string slice
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check whether a sentinel payload names this marker, ignoring ASCII case
    #[inline]
    #[must_use]
    pub fn matches(&self, payload: &str) -> bool {
        self.0.eq_ignore_ascii_case(payload)
    }
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b':' | b'.' | b'-'))
}

impl Display for MarkerName {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for MarkerName {
    type Err = MarkerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for MarkerName {
    type Error = MarkerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<MarkerName> for String {
    fn from(value: MarkerName) -> Self {
        value.0
    }
}

impl AsRef<str> for MarkerName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// How a block's end is determined
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Terminator {
    /// Block ends at the next recognized boundary
    #[default]
    Inferred,
    /// Block is closed by an `END NAME` sentinel
    Explicit,
}

/// One sentinel occurrence found in text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SentinelToken<'t> {
    /// Marker name payload
    pub name: &'t str,
    /// `END NAME` terminator rather than a start sentinel
    pub is_end: bool,
    /// Span of the sentinel itself
    pub span: Span,
}

impl SentinelToken<'_> {
    /// Start sentinel of `name`
    #[inline]
    #[must_use]
    pub fn opens(&self, name: &MarkerName) -> bool {
        !self.is_end && name.matches(self.name)
    }

    /// `END` terminator of `name`
    #[inline]
    #[must_use]
    pub fn closes(&self, name: &MarkerName) -> bool {
        self.is_end && name.matches(self.name)
    }
}

/// Sentinel syntax for one artifact kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SentinelSyntax {
    kind: ArtifactKind,
}

impl SentinelSyntax {
    /// Syntax for the given artifact kind
    #[inline]
    #[must_use]
    pub const fn for_kind(kind: ArtifactKind) -> Self {
        Self { kind }
    }

    /// Artifact kind this syntax belongs to
    #[inline]
    #[must_use]
    pub const fn kind(&self) -> ArtifactKind {
        self.kind
    }

    /// Canonical start sentinel
    #[must_use]
    pub fn render_start(&self, name: &MarkerName) -> String {
        match self.kind {
            ArtifactKind::Markup => format!("<!-- {name} -->"),
            ArtifactKind::Stylesheet => format!("/* === {name} === */"),
            ArtifactKind::Script => format!("// === {name} ==="),
        }
    }

    /// Canonical terminator sentinel
    #[must_use]
    pub fn render_end(&self, name: &MarkerName) -> String {
        match self.kind {
            ArtifactKind::Markup => format!("<!-- END {name} -->"),
            ArtifactKind::Stylesheet => format!("/* === END {name} === */"),
            ArtifactKind::Script => format!("// === END {name} ==="),
        }
    }

    /// Find every sentinel in `text`, in order of appearance
    #[must_use]
    pub fn scan<'t>(&self, text: &'t str) -> Vec<SentinelToken<'t>> {
        match self.kind {
            ArtifactKind::Markup => scan_delimited(text, "<!--", "-->", false),
            ArtifactKind::Stylesheet => scan_delimited(text, "/*", "*/", true),
            ArtifactKind::Script => scan_line_comments(text),
        }
    }

    /// Check whether `text` starts (after leading whitespace) with the start
    /// sentinel for `name`
    #[must_use]
    pub fn starts_with_sentinel(&self, text: &str, name: &MarkerName) -> bool {
        let offset = text.len() - text.trim_start().len();
        self.scan(text)
            .first()
            .is_some_and(|t| t.span.start() == offset && t.opens(name))
    }
}

/// Scan `open ... close` comments (markup and stylesheet)
fn scan_delimited<'t>(
    text: &'t str,
    open: &str,
    close: &str,
    fenced: bool,
) -> Vec<SentinelToken<'t>> {
    let mut tokens = Vec::new();
    let mut cursor = 0;

    while let Some(rel) = text[cursor..].find(open) {
        let start = cursor + rel;
        let inner_start = start + open.len();
        let Some(close_rel) = text[inner_start..].find(close) else {
            break;
        };
        let inner_end = inner_start + close_rel;
        let end = inner_end + close.len();

        let payload = if fenced {
            strip_fence(&text[inner_start..inner_end])
        } else {
            Some(text[inner_start..inner_end].trim())
        };
        if let Some((name, is_end)) = payload.and_then(parse_payload) {
            tokens.push(SentinelToken {
                name,
                is_end,
                span: Span::from_range(start..end),
            });
        }
        cursor = end;
    }

    tokens
}

/// Scan `// === NAME ===` line comments (script)
fn scan_line_comments(text: &str) -> Vec<SentinelToken<'_>> {
    let mut tokens = Vec::new();
    let mut cursor = 0;

    while let Some(rel) = text[cursor..].find("//") {
        let start = cursor + rel;
        let inner_start = start + 2;
        let line_end = text[inner_start..]
            .find('\n')
            .map_or(text.len(), |i| inner_start + i);
        let line_end = if text[..line_end].ends_with('\r') {
            line_end - 1
        } else {
            line_end
        };

        if let Some((name, is_end)) =
            strip_fence(&text[inner_start..line_end]).and_then(parse_payload)
        {
            tokens.push(SentinelToken {
                name,
                is_end,
                span: Span::from_range(start..line_end),
            });
            cursor = line_end;
        } else {
            cursor = inner_start;
        }
    }

    tokens
}

/// Strip `=== ... ===` around a payload
fn strip_fence(inner: &str) -> Option<&str> {
    let inner = inner.trim();
    let rest = inner.strip_prefix("===")?.strip_suffix("===")?;
    Some(rest.trim())
}

/// Split a payload into marker name and terminator flag
fn parse_payload(payload: &str) -> Option<(&str, bool)> {
    let keyword = payload.get(..3).filter(|k| k.eq_ignore_ascii_case("END"));
    let (name, is_end) = match keyword.map(|k| &payload[k.len()..]) {
        Some(rest) if rest.starts_with(char::is_whitespace) => (rest.trim_start(), true),
        _ => (payload, false),
    };
    is_valid_name(name).then_some((name, is_end))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> MarkerName {
        MarkerName::new(s).unwrap()
    }

    #[test]
    fn marker_name_validation() {
        assert!(MarkerName::new("CLEAN_FILTERS_V3:BAR").is_ok());
        assert!(MarkerName::new("wa-fab.v2").is_ok());
        assert_eq!(MarkerName::new(""), Err(MarkerError::Empty));
        assert!(matches!(
            MarkerName::new("FAB TEXT KILL"),
            Err(MarkerError::InvalidName(_))
        ));
    }

    #[test]
    fn render_per_kind() {
        let n = name("BAR:V1");
        assert_eq!(
            SentinelSyntax::for_kind(ArtifactKind::Markup).render_start(&n),
            "<!-- BAR:V1 -->"
        );
        assert_eq!(
            SentinelSyntax::for_kind(ArtifactKind::Stylesheet).render_end(&n),
            "/* === END BAR:V1 === */"
        );
        assert_eq!(
            SentinelSyntax::for_kind(ArtifactKind::Script).render_start(&n),
            "// === BAR:V1 ==="
        );
    }

    #[test]
    fn scan_markup_ignores_ordinary_comments() {
        let text = "<!-- hero section -->\n<!--LITE_CLEAN_A:MINIFILTERS-->\n<div></div>\n<!--  END   LITE_CLEAN_A:MINIFILTERS -->";
        let tokens = SentinelSyntax::for_kind(ArtifactKind::Markup).scan(text);
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].name, "LITE_CLEAN_A:MINIFILTERS");
        assert!(!tokens[0].is_end);
        assert!(tokens[1].is_end);
        assert_eq!(tokens[0].span.slice(text), "<!--LITE_CLEAN_A:MINIFILTERS-->");
    }

    #[test]
    fn scan_stylesheet_requires_fence() {
        let text = "/* Chips */\n.chip{}\n/* === CLEAN_FILTERS_V3:CSS === */\n.caseBar{}\n";
        let tokens = SentinelSyntax::for_kind(ArtifactKind::Stylesheet).scan(text);
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].name, "CLEAN_FILTERS_V3:CSS");
    }

    #[test]
    fn scan_script_skips_urls_and_keeps_line_span() {
        let text = "var u = \"https://wa.me/39\";\r\n// === PATCH_A:JS ===\r\n(function(){})();\n// === END PATCH_A:JS ===";
        let tokens = SentinelSyntax::for_kind(ArtifactKind::Script).scan(text);
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].span.slice(text), "// === PATCH_A:JS ===");
        assert!(tokens[1].is_end);
        assert_eq!(tokens[1].name, "PATCH_A:JS");
    }

    #[test]
    fn name_prefix_is_not_a_match() {
        let text = "<!-- LITE_CLEAN_A_V2:MINIFILTERS -->";
        let tokens = SentinelSyntax::for_kind(ArtifactKind::Markup).scan(text);
        assert_eq!(tokens[0].name, "LITE_CLEAN_A_V2:MINIFILTERS");
        assert_ne!(tokens[0].name, "LITE_CLEAN_A");
    }

    #[test]
    fn starts_with_sentinel_after_whitespace() {
        let syntax = SentinelSyntax::for_kind(ArtifactKind::Markup);
        assert!(syntax.starts_with_sentinel("\n  <!-- BAR:V1 -->\n<div>", &name("BAR:V1")));
        assert!(!syntax.starts_with_sentinel("<div><!-- BAR:V1 -->", &name("BAR:V1")));
    }

    #[test]
    fn lowercase_sentinels_name_registered_markers() {
        let text = "<!-- clean_filters_v2:bar -->\n<div></div>\n<!-- end Clean_Filters_V2:Bar -->";
        let tokens = SentinelSyntax::for_kind(ArtifactKind::Markup).scan(text);
        let marker = name("CLEAN_FILTERS_V2:BAR");
        assert!(tokens[0].opens(&marker));
        assert!(tokens[1].closes(&marker));
        assert!(!tokens[0].opens(&name("CLEAN_FILTERS_V3:BAR")));
    }

    #[test]
    fn endpoint_like_names_are_not_terminators() {
        let tokens = SentinelSyntax::for_kind(ArtifactKind::Markup).scan("<!-- ENDPOINT:V1 -->");
        assert_eq!(tokens[0].name, "ENDPOINT:V1");
        assert!(!tokens[0].is_end);
    }

    #[test]
    fn marker_name_serde_validates() {
        let err = serde_json::from_str::<MarkerName>("\"bad name\"");
        assert!(err.is_err());
    }
}
