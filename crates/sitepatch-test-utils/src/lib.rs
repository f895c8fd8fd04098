//! Testing utilities for the sitepatch workspace
//!
//! A throwaway site on disk with the three default artifacts, plus helpers
//! to read files back and list their backups.

#![allow(missing_docs)]

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const SAMPLE_INDEX: &str = r#"<!doctype html>
<html lang="it">
<head>
  <link rel="stylesheet" href="styles.css">
</head>
<body>
  <section class="hero">
    <h1>Case vacanza</h1>
    <img src="/img/hero.jpg" alt="">
  </section>
  <main>
    <div class="cards" id="propertyGrid">
      <!-- AUTO_CARDS_START -->
      <article class="card">placeholder</article>
      <!-- AUTO_CARDS_END -->
    </div>
  </main>
  <script src="script.js"></script>
</body>
</html>
"#;

pub const SAMPLE_STYLES: &str = ".hero{padding:2rem}\n.cards{display:grid}\n";

pub const SAMPLE_SCRIPT: &str = "document.documentElement.classList.add('js');\n";

pub const SAMPLE_ITEM_PAGE: &str = r#"<!doctype html>
<html lang="it">
<body>
  <img src="/img/case/atena.jpg" alt="ATENA">
</body>
</html>
"#;

/// Manifest covering markup, item, stylesheet and script plans
pub const SAMPLE_MANIFEST: &str = r#"
[backup]
retain = 5

[[features]]
id = "filters"
kind = "markup"
generations = ["CLEAN_FILTERS_V2:BAR", "CLEAN_FILTERS_V3:BAR"]
anchor = { class = "cards", tag = "div" }
fingerprints = [{ by = "id", id = "caseBar" }]

[[features]]
id = "filters-css"
kind = "stylesheet"
generations = ["CLEAN_FILTERS_V2:CSS", "CLEAN_FILTERS_V3:CSS"]
fingerprints = [{ by = "rule", selector = ".caseBar", declaration = "display:none" }]

[[features]]
id = "filters-js"
kind = "script"
generations = ["CLEAN_FILTERS_V3:JS"]

[[items]]
name = "ATENA"
slug = "atena"
location = "Baia Verde"
capacity = 9
hint = "3 camere + 2 bagni"
image = "img/case/atena.jpg"
document = "case/atena.html"

[[items]]
name = "SIRENA"
slug = "sirena"
location = "Centro"
capacity = 5
image = "img/case/sirena.jpg"
document = "case/sirena.html"

[plan]
markup = [
  { op = "normalize-asset-paths" },
  { op = "lazy-images" },
  { op = "strip-legacy", feature = "filters" },
  { op = "inject", feature = "filters", body = '<div class="caseBar" id="caseBar"><button class="chip" data-guest="all">Tutti</button></div>' },
  { op = "replace-region", start = "AUTO_CARDS_START", end = "AUTO_CARDS_END", source = "items", fallback = { class = "cards", tag = "div" } },
  { op = "ensure-snippet", guard = "filter.js", body = '<script src="filter.js" defer></script>', anchor = { closing = "body" } },
]
items = [
  { op = "normalize-asset-paths" },
  { op = "lazy-images" },
]
stylesheet = [
  { op = "strip-legacy", feature = "filters-css" },
  { op = "inject", feature = "filters-css", body = ".caseBar{display:flex;gap:.5rem}" },
]
script = [
  { op = "inject", feature = "filters-js", body = "initFilters();" },
]
"#;

/// A temporary site directory
#[derive(Debug)]
pub struct SiteFixture {
    dir: TempDir,
}

impl SiteFixture {
    /// Empty site
    pub fn empty() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    /// Site with `index.html`, `styles.css` and `script.js`
    pub fn new() -> Self {
        Self::empty()
            .with_file("index.html", SAMPLE_INDEX)
            .with_file("styles.css", SAMPLE_STYLES)
            .with_file("script.js", SAMPLE_SCRIPT)
    }

    /// Sample site plus one per-item page and the sample manifest
    pub fn sample() -> Self {
        Self::new()
            .with_file("case/atena.html", SAMPLE_ITEM_PAGE)
            .with_manifest(SAMPLE_MANIFEST)
    }

    /// Write `sitepatch.toml`
    #[must_use]
    pub fn with_manifest(self, manifest: &str) -> Self {
        self.with_file("sitepatch.toml", manifest)
    }

    /// Write a file, creating parent directories
    #[must_use]
    pub fn with_file(self, rel: &str, content: &str) -> Self {
        self.write(rel, content);
        self
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn join(&self, rel: &str) -> PathBuf {
        self.dir.path().join(rel)
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.join("sitepatch.toml")
    }

    pub fn read(&self, rel: &str) -> String {
        fs::read_to_string(self.join(rel)).unwrap()
    }

    pub fn write(&self, rel: &str, content: &str) {
        let path = self.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    /// Backup files of `rel`, sorted by name
    pub fn backups_of(&self, rel: &str) -> Vec<PathBuf> {
        let path = self.join(rel);
        let prefix = format!("{}.bak-", path.file_name().unwrap().to_string_lossy());
        let mut backups: Vec<PathBuf> = fs::read_dir(path.parent().unwrap())
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .filter(|p| {
                p.file_name()
                    .is_some_and(|n| n.to_string_lossy().starts_with(&prefix))
            })
            .collect();
        backups.sort();
        backups
    }
}

impl Default for SiteFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Count non-overlapping occurrences of `needle`
pub fn occurrences(haystack: &str, needle: &str) -> usize {
    haystack.matches(needle).count()
}
