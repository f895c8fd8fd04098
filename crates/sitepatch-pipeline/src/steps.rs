//! Step registry
//!
//! A step is a pure `text -> text` transformation selected by name (`op`) in
//! the manifest. Steps never touch the filesystem; the pipeline threads an
//! artifact's text through its plan and persists once.

use crate::feature::Feature;
use crate::items::{ItemRecord, ItemRenderer};
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use sitepatch_engine::{
    Anchor, BlockInjector, Diagnostic, EngineResult, Fingerprint, LegacyMigrator, MarkerName,
    MarkerRegistry, Region,
};
use std::fmt::Debug;
use tracing::debug;

/// Shared, read-only inputs of a step
#[derive(Debug, Clone, Copy)]
pub struct StepContext<'a> {
    /// Registry of the artifact's kind
    pub registry: &'a MarkerRegistry,
    /// Item records from the manifest
    pub items: &'a [ItemRecord],
    /// Renderer for item-sourced regions
    pub renderer: &'a dyn ItemRenderer,
}

/// Text produced by a step plus its non-fatal conditions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutput {
    pub text: String,
    pub diagnostics: Vec<Diagnostic>,
}

impl StepOutput {
    #[must_use]
    pub fn new(text: String, diagnostics: Vec<Diagnostic>) -> Self {
        Self { text, diagnostics }
    }

    #[must_use]
    pub fn clean(text: String) -> Self {
        Self::new(text, Vec::new())
    }
}

/// A named, pure text transformation
pub trait TransformStep: Debug + Send + Sync {
    /// Manifest name of the step
    fn op(&self) -> &'static str;

    /// Short label for reports, e.g. `inject:clean-filters`
    fn label(&self) -> String {
        self.op().to_string()
    }

    /// Apply the step to `text`
    ///
    /// # Errors
    /// Only unrecoverable structural problems are errors; everything else is
    /// reported as a diagnostic.
    fn apply(&self, text: &str, ctx: &StepContext<'_>) -> EngineResult<StepOutput>;
}

/// Rewrite root-absolute asset references to relative ones
#[derive(Debug, Clone)]
pub struct NormalizeAssetPaths {
    pattern: Regex,
}

impl NormalizeAssetPaths {
    /// Prefix used when none is configured
    pub const DEFAULT_PREFIX: &'static str = "img";

    /// # Errors
    /// Returns error if the generated pattern does not compile
    pub fn new(prefixes: &[String]) -> Result<Self, regex::Error> {
        let alternatives: Vec<String> = if prefixes.is_empty() {
            vec![regex::escape(Self::DEFAULT_PREFIX)]
        } else {
            prefixes
                .iter()
                .map(|p| regex::escape(p.trim_matches('/')))
                .collect()
        };
        let source = format!(
            r#"\b(src|href)(\s*=\s*["'])/((?:{})/)"#,
            alternatives.join("|")
        );
        Ok(Self {
            pattern: RegexBuilder::new(&source).case_insensitive(true).build()?,
        })
    }
}

impl TransformStep for NormalizeAssetPaths {
    fn op(&self) -> &'static str {
        "normalize-asset-paths"
    }

    fn apply(&self, text: &str, _ctx: &StepContext<'_>) -> EngineResult<StepOutput> {
        let out = self.pattern.replace_all(text, "${1}${2}${3}");
        Ok(StepOutput::clean(out.into_owned()))
    }
}

static IMG_TAG: Lazy<Regex> = Lazy::new(|| {
    RegexBuilder::new(r"<img\b[^>]*>")
        .case_insensitive(true)
        .build()
        .expect("img pattern is valid")
});

static LOADING_ATTR: Lazy<Regex> = Lazy::new(|| {
    RegexBuilder::new(r"\sloading\s*=")
        .case_insensitive(true)
        .build()
        .expect("loading pattern is valid")
});

static DECODING_ATTR: Lazy<Regex> = Lazy::new(|| {
    RegexBuilder::new(r"\sdecoding\s*=")
        .case_insensitive(true)
        .build()
        .expect("decoding pattern is valid")
});

/// Add lazy-loading hints to images lacking them
#[derive(Debug, Clone, Copy, Default)]
pub struct LazyImages;

impl TransformStep for LazyImages {
    fn op(&self) -> &'static str {
        "lazy-images"
    }

    fn apply(&self, text: &str, _ctx: &StepContext<'_>) -> EngineResult<StepOutput> {
        let out = IMG_TAG.replace_all(text, |caps: &regex::Captures<'_>| {
            let tag = &caps[0];
            if LOADING_ATTR.is_match(tag) {
                return tag.to_string();
            }
            let mut attrs = String::from(r#" loading="lazy""#);
            if !DECODING_ATTR.is_match(tag) {
                attrs.push_str(r#" decoding="async""#);
            }
            format!("{}{attrs}{}", &tag[..4], &tag[4..])
        });
        Ok(StepOutput::clean(out.into_owned()))
    }
}

/// Remove a feature's superseded generations and duplicate current blocks
#[derive(Debug, Clone)]
pub struct StripLegacy {
    feature: Feature,
    anchor: Option<Anchor>,
}

impl StripLegacy {
    /// `anchor` picks which duplicate survives and overrides the feature's
    /// anchor; pass the anchor the feature is injected at
    #[must_use]
    pub fn new(feature: Feature, anchor: Option<Anchor>) -> Self {
        let anchor = anchor.or_else(|| feature.anchor().cloned());
        Self { feature, anchor }
    }
}

impl TransformStep for StripLegacy {
    fn op(&self) -> &'static str {
        "strip-legacy"
    }

    fn label(&self) -> String {
        format!("{}:{}", self.op(), self.feature.id())
    }

    fn apply(&self, text: &str, ctx: &StepContext<'_>) -> EngineResult<StepOutput> {
        let migrator = LegacyMigrator::new(ctx.registry);
        let stripped = migrator.strip_legacy(text, self.feature.legacy(), self.feature.fingerprints());
        let deduped =
            migrator.dedupe_current(&stripped.text, self.feature.current(), self.anchor.as_ref());
        debug!(
            feature = self.feature.id(),
            removed = stripped.removed + deduped.removed,
            "legacy migration"
        );

        let mut diagnostics = stripped.diagnostics;
        diagnostics.extend(deduped.diagnostics);
        Ok(StepOutput::new(deduped.text, diagnostics))
    }
}

/// Insert a feature's current generation once
#[derive(Debug, Clone)]
pub struct Inject {
    feature: Feature,
    body: String,
    anchor: Option<Anchor>,
}

impl Inject {
    /// Inject `body`; `anchor` overrides the feature's anchor
    ///
    /// Without any anchor the block is appended (companion artifacts).
    #[must_use]
    pub fn new(feature: Feature, body: String, anchor: Option<Anchor>) -> Self {
        let anchor = anchor.or_else(|| feature.anchor().cloned());
        Self {
            feature,
            body,
            anchor,
        }
    }
}

impl TransformStep for Inject {
    fn op(&self) -> &'static str {
        "inject"
    }

    fn label(&self) -> String {
        format!("{}:{}", self.op(), self.feature.id())
    }

    fn apply(&self, text: &str, ctx: &StepContext<'_>) -> EngineResult<StepOutput> {
        let injector = BlockInjector::new(ctx.registry).with_terminator(self.feature.terminator());
        let injection = match &self.anchor {
            Some(anchor) => injector.inject(text, self.feature.current(), &self.body, anchor),
            None => injector.append(text, self.feature.current(), &self.body),
        };
        Ok(StepOutput::new(injection.text, injection.diagnostics))
    }
}

/// Remove orphaned fragments by fingerprint, outside every marked block
#[derive(Debug, Clone)]
pub struct RemoveElements {
    fingerprints: Vec<Fingerprint>,
}

impl RemoveElements {
    #[must_use]
    pub fn new(fingerprints: Vec<Fingerprint>) -> Self {
        Self { fingerprints }
    }
}

impl TransformStep for RemoveElements {
    fn op(&self) -> &'static str {
        "remove-elements"
    }

    fn apply(&self, text: &str, ctx: &StepContext<'_>) -> EngineResult<StepOutput> {
        let protected: Vec<MarkerName> = ctx.registry.names().cloned().collect();
        let migration =
            LegacyMigrator::new(ctx.registry).remove_fingerprints(text, &self.fingerprints, &protected);
        Ok(StepOutput::new(migration.text, migration.diagnostics))
    }
}

/// Keep one element matching a fingerprint
#[derive(Debug, Clone)]
pub struct DedupeElements {
    fingerprint: Fingerprint,
    keep_last: bool,
}

impl DedupeElements {
    #[must_use]
    pub fn new(fingerprint: Fingerprint, keep_last: bool) -> Self {
        Self {
            fingerprint,
            keep_last,
        }
    }
}

impl TransformStep for DedupeElements {
    fn op(&self) -> &'static str {
        "dedupe-elements"
    }

    fn apply(&self, text: &str, ctx: &StepContext<'_>) -> EngineResult<StepOutput> {
        let migration =
            LegacyMigrator::new(ctx.registry).dedupe_elements(text, &self.fingerprint, self.keep_last);
        Ok(StepOutput::new(migration.text, migration.diagnostics))
    }
}

/// Insert an unmarked snippet before an anchor unless a guard is present
#[derive(Debug, Clone)]
pub struct EnsureSnippet {
    guard: String,
    snippet: String,
    anchor: Anchor,
}

impl EnsureSnippet {
    #[must_use]
    pub fn new(guard: String, snippet: String, anchor: Anchor) -> Self {
        Self {
            guard,
            snippet,
            anchor,
        }
    }
}

impl TransformStep for EnsureSnippet {
    fn op(&self) -> &'static str {
        "ensure-snippet"
    }

    fn apply(&self, text: &str, ctx: &StepContext<'_>) -> EngineResult<StepOutput> {
        let injection =
            BlockInjector::new(ctx.registry).ensure_snippet(text, &self.guard, &self.snippet, &self.anchor);
        Ok(StepOutput::new(injection.text, injection.diagnostics))
    }
}

/// Content of a replaced region
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegionSource {
    /// Literal body
    Body(String),
    /// Cards rendered from the manifest's item records
    Items,
}

/// Regenerate the content between two paired markers
#[derive(Debug, Clone)]
pub struct ReplaceRegion {
    region: Region,
    source: RegionSource,
    fallback: Option<Anchor>,
}

impl ReplaceRegion {
    #[must_use]
    pub fn new(region: Region, source: RegionSource, fallback: Option<Anchor>) -> Self {
        Self {
            region,
            source,
            fallback,
        }
    }
}

impl TransformStep for ReplaceRegion {
    fn op(&self) -> &'static str {
        "replace-region"
    }

    fn label(&self) -> String {
        format!("{}:{}", self.op(), self.region.start)
    }

    fn apply(&self, text: &str, ctx: &StepContext<'_>) -> EngineResult<StepOutput> {
        let body = match &self.source {
            RegionSource::Body(body) => body.clone(),
            RegionSource::Items => ctx.renderer.render(ctx.items),
        };
        let edit = self
            .region
            .replace(ctx.registry.syntax(), text, &body, self.fallback.as_ref())?;
        Ok(StepOutput::new(edit.text, edit.diagnostics))
    }
}
