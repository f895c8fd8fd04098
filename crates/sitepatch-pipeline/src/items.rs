//! Item records and their card rendering
//!
//! Items are the site's domain records (one per listed property). The
//! pipeline treats them as opaque data: they are only rendered into the
//! content of a `replace-region` step whose source is `items`.

use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// One listed item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRecord {
    pub name: String,
    pub slug: String,
    pub location: String,
    /// Guest capacity
    pub capacity: u32,
    /// Short descriptive hint shown on the card
    #[serde(default)]
    pub hint: String,
    /// Image reference, relative to the site root
    pub image: String,
    /// Detail document reference, relative to the site root
    pub document: String,
}

/// Renders item records into markup
pub trait ItemRenderer: std::fmt::Debug {
    /// Render every record, in order
    fn render(&self, items: &[ItemRecord]) -> String;
}

/// Default renderer: one `<article class="card">` per item
#[derive(Debug, Clone, Default)]
pub struct CardRenderer {
    link_label: Option<String>,
}

impl CardRenderer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Text of the detail link
    #[must_use]
    pub fn with_link_label(mut self, label: impl Into<String>) -> Self {
        self.link_label = Some(label.into());
        self
    }

    fn render_one(&self, item: &ItemRecord, out: &mut String) {
        let name = escape(&item.name);
        let label = escape(self.link_label.as_deref().unwrap_or("Details →"));
        // Writing to a String cannot fail.
        let _ = write!(
            out,
            r#"<article class="card" data-slug="{slug}">
  <img src="{image}" alt="{name}" loading="lazy" decoding="async">
  <div class="card__body">
    <h3>{name}</h3>
    <ul class="meta">
      <li>📍 {location}</li>
      <li>👥 {capacity}</li>
"#,
            slug = escape(&item.slug),
            image = escape(&item.image),
            location = escape(&item.location),
            capacity = item.capacity,
        );
        if !item.hint.is_empty() {
            let _ = writeln!(out, "      <li>{}</li>", escape(&item.hint));
        }
        let _ = write!(
            out,
            r#"    </ul>
    <div class="card__foot">
      <a class="link" href="{document}">{label}</a>
    </div>
  </div>
</article>
"#,
            document = escape(&item.document),
        );
    }
}

impl ItemRenderer for CardRenderer {
    fn render(&self, items: &[ItemRecord]) -> String {
        let mut out = String::new();
        for item in items {
            self.render_one(item, &mut out);
        }
        out
    }
}

/// Escape text for use in markup content and attribute values
fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
