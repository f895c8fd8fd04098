//! Balanced element extents in markup
//!
//! Not a parser: tags are matched lexically and nesting is tracked per tag
//! name. That is enough to find the smallest removable region around a
//! fingerprinted element.

use once_cell::sync::Lazy;
use regex::Regex;
use sitepatch_artifact::Span;

static TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<(/?)([a-zA-Z][a-zA-Z0-9-]*)\b[^>]*?(/?)>").expect("tag pattern is valid")
});

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// An element located in markup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    /// Lowercased tag name
    pub tag: String,
    /// Opening tag through matching close tag
    pub span: Span,
}

/// Resolve the element whose opening tag starts at `open_at`
///
/// Void and self-closing elements cover their opening tag only. Returns
/// `None` if no opening tag starts at `open_at` or its close tag is missing.
#[must_use]
pub fn element_at(text: &str, open_at: usize) -> Option<Element> {
    let caps = TAG.captures_at(text, open_at)?;
    let whole = caps.get(0)?;
    if whole.start() != open_at || !caps[1].is_empty() {
        return None;
    }
    let tag = caps[2].to_ascii_lowercase();
    let open = Span::from_range(whole.range());

    if !caps[3].is_empty() || VOID_ELEMENTS.contains(&tag.as_str()) {
        return Some(Element { tag, span: open });
    }

    let mut depth = 1usize;
    for caps in TAG.captures_iter(&text[open.end()..]) {
        if !caps[2].eq_ignore_ascii_case(&tag) || !caps[3].is_empty() {
            continue;
        }
        if caps[1].is_empty() {
            depth += 1;
        } else {
            depth -= 1;
            if depth == 0 {
                let end = open.end() + caps.get(0)?.end();
                return Some(Element {
                    tag,
                    span: open.with_end(end),
                });
            }
        }
    }
    None
}

/// Grow an element span to a clean removal region
///
/// When the element is alone on its line the whole line goes, indentation
/// and line break included; otherwise only trailing blanks up to one line
/// break are taken.
#[must_use]
pub fn removal_extent(text: &str, span: Span) -> Span {
    let line_start = text[..span.start()].rfind('\n').map_or(0, |i| i + 1);
    let rest = &text[span.end()..];
    let blanks = rest.len() - rest.trim_start_matches([' ', '\t']).len();
    let after = &rest[blanks..];
    let newline = if after.starts_with("\r\n") {
        2
    } else if after.starts_with('\n') {
        1
    } else {
        0
    };

    let alone = text[line_start..span.start()].trim().is_empty() && (newline > 0 || after.is_empty());
    let start = if alone { line_start } else { span.start() };
    Span::from_range(start..span.end() + blanks + newline)
}
