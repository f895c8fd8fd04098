//! Transformation manifest (`sitepatch.toml`)
//!
//! The manifest is the single versioned description of every feature, its
//! generations, the item records and the per-kind plans. It is parsed with
//! `serde` into the `*Spec` types below, then validated and compiled into a
//! [`Manifest`] of ready-to-run steps. All validation happens at load time.
//!
//! ```toml
//! [site]
//! markup = "index.html"
//!
//! [backup]
//! retain = 10
//!
//! [[features]]
//! id = "filters"
//! kind = "markup"
//! generations = ["CLEAN_FILTERS_V2:BAR", "CLEAN_FILTERS_V3:BAR"]
//! anchor = { class = "cards", tag = "div" }
//! fingerprints = [{ by = "id", id = "caseBar" }]
//!
//! [plan]
//! markup = [
//!   { op = "strip-legacy", feature = "filters" },
//!   { op = "inject", feature = "filters", body_file = "fragments/bar.html" },
//! ]
//! ```

use crate::error::ConfigError;
use crate::feature::{default_terminator, Feature};
use crate::items::ItemRecord;
use crate::steps::{
    DedupeElements, EnsureSnippet, Inject, LazyImages, NormalizeAssetPaths, RegionSource,
    RemoveElements, ReplaceRegion, StripLegacy, TransformStep,
};
use indexmap::IndexMap;
use serde::Deserialize;
use sitepatch_artifact::ArtifactKind;
use sitepatch_engine::{Anchor, Fingerprint, MarkerName, MarkerRegistry, Region, Terminator};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Manifest file name looked up in the working directory
pub const DEFAULT_MANIFEST: &str = "sitepatch.toml";

/// Raw manifest as written on disk
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManifestSpec {
    #[serde(default)]
    pub site: SiteSpec,
    #[serde(default)]
    pub backup: BackupSpec,
    #[serde(default)]
    pub features: Vec<FeatureSpec>,
    #[serde(default)]
    pub items: Vec<ItemRecord>,
    #[serde(default)]
    pub plan: PlanSpec,
}

/// `[site]`: artifact locations relative to the project root
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteSpec {
    pub markup: PathBuf,
    pub stylesheet: PathBuf,
    pub script: PathBuf,
    /// Directory of per-item documents (`*.html`)
    pub items_dir: PathBuf,
    pub require_stylesheet: bool,
    pub require_script: bool,
}

impl Default for SiteSpec {
    fn default() -> Self {
        Self {
            markup: PathBuf::from("index.html"),
            stylesheet: PathBuf::from("styles.css"),
            script: PathBuf::from("script.js"),
            items_dir: PathBuf::from("case"),
            require_stylesheet: false,
            require_script: false,
        }
    }
}

/// `[backup]`
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BackupSpec {
    /// Keep only the newest N backups per artifact
    pub retain: Option<usize>,
}

/// `[[features]]`
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FeatureSpec {
    pub id: String,
    pub kind: ArtifactKind,
    /// Marker names, oldest first; the last is current
    pub generations: Vec<String>,
    #[serde(default)]
    pub fingerprints: Vec<FingerprintSpec>,
    pub terminator: Option<Terminator>,
    pub anchor: Option<AnchorSpec>,
}

/// Anchor forms, distinguished by their key
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum AnchorSpec {
    /// `{ literal = "<main>" }`
    Literal { literal: String },
    /// `{ pattern = "<section[^>]*>" }`
    Pattern { pattern: String },
    /// `{ class = "cards", tag = "div" }`
    Class {
        class: String,
        #[serde(default)]
        tag: Option<String>,
    },
    /// `{ closing = "body" }`
    Closing { closing: String },
}

impl AnchorSpec {
    /// Compile into an engine anchor
    ///
    /// # Errors
    /// Returns error if a pattern does not compile
    pub fn compile(&self) -> Result<Anchor, ConfigError> {
        let result = match self {
            Self::Literal { literal } => return Ok(Anchor::literal(literal.clone())),
            Self::Pattern { pattern } => Anchor::pattern(pattern),
            Self::Class { class, tag } => {
                Anchor::element_with_class(tag.as_deref().unwrap_or("*"), class)
            }
            Self::Closing { closing } => Anchor::closing_tag(closing),
        };
        result.map_err(|e| ConfigError::pattern_error(format!("anchor {self:?}"), e))
    }
}

/// Fingerprint forms, tagged by `by`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "by", rename_all = "kebab-case")]
pub enum FingerprintSpec {
    /// `{ by = "id", id = "caseBar" }`
    Id {
        id: String,
        tag: Option<String>,
        within: Option<String>,
    },
    /// `{ by = "label", tag = "button", text = "Filtri" }`
    Label {
        tag: String,
        text: String,
        within: Option<String>,
    },
    /// `{ by = "class", class = "miniFilters" }`
    Class {
        class: String,
        tag: Option<String>,
        within: Option<String>,
    },
    /// `{ by = "rule", selector = ".wa-fab", declaration = "display:none!important" }`
    ///
    /// Stylesheet features and plans only.
    Rule {
        selector: String,
        declaration: Option<String>,
    },
}

impl FingerprintSpec {
    /// Compile into an engine fingerprint
    ///
    /// # Errors
    /// Returns error if a pattern does not compile
    pub fn compile(&self) -> Result<Fingerprint, ConfigError> {
        let (fingerprint, within) = match self {
            Self::Id { id, tag, within } => (Fingerprint::element_id(tag.as_deref(), id), within),
            Self::Label { tag, text, within } => (Fingerprint::label(tag, text), within),
            Self::Class { class, tag, within } => {
                (Fingerprint::element_class(tag.as_deref(), class), within)
            }
            Self::Rule {
                selector,
                declaration,
            } => (Fingerprint::rule(selector, declaration.as_deref()), &None),
        };
        let context = || format!("fingerprint {self:?}");
        let fingerprint = fingerprint.map_err(|e| ConfigError::pattern_error(context(), e))?;
        match within {
            Some(scope) => fingerprint
                .within(scope)
                .map_err(|e| ConfigError::pattern_error(context(), e)),
            None => Ok(fingerprint),
        }
    }

    /// Compile and check that the fingerprint can match in `kind`
    ///
    /// # Errors
    /// [`ConfigError::Invalid`] for element fingerprints outside markup and
    /// rule fingerprints outside stylesheets.
    pub fn compile_for(&self, kind: ArtifactKind, owner: &str) -> Result<Fingerprint, ConfigError> {
        let fingerprint = self.compile()?;
        if fingerprint.kind() != kind {
            return Err(ConfigError::invalid(format!(
                "{owner}: fingerprint {fingerprint} only matches in {} artifacts, not {kind}",
                fingerprint.kind()
            )));
        }
        Ok(fingerprint)
    }
}

/// `[plan]`: ordered steps per artifact kind
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlanSpec {
    #[serde(default)]
    pub markup: Vec<StepSpec>,
    /// Plan for per-item documents; the markup plan when absent
    pub items: Option<Vec<StepSpec>>,
    #[serde(default)]
    pub stylesheet: Vec<StepSpec>,
    #[serde(default)]
    pub script: Vec<StepSpec>,
}

/// Which element of a duplicate set survives
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Keep {
    #[default]
    First,
    Last,
}

/// Source of a replaced region's content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceSpec {
    /// Render the manifest's item records
    Items,
}

/// One plan step, tagged by `op`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "op", rename_all = "kebab-case")]
pub enum StepSpec {
    NormalizeAssetPaths {
        #[serde(default)]
        prefixes: Vec<String>,
    },
    LazyImages,
    StripLegacy {
        feature: String,
    },
    Inject {
        feature: String,
        body: Option<String>,
        body_file: Option<PathBuf>,
        anchor: Option<AnchorSpec>,
    },
    RemoveElements {
        fingerprints: Vec<FingerprintSpec>,
    },
    DedupeElements {
        fingerprint: FingerprintSpec,
        #[serde(default)]
        keep: Keep,
    },
    EnsureSnippet {
        guard: String,
        body: Option<String>,
        body_file: Option<PathBuf>,
        anchor: AnchorSpec,
    },
    ReplaceRegion {
        start: String,
        end: String,
        body: Option<String>,
        body_file: Option<PathBuf>,
        source: Option<SourceSpec>,
        fallback: Option<AnchorSpec>,
    },
}

impl StepSpec {
    /// Manifest name of the step
    #[must_use]
    pub fn op(&self) -> &'static str {
        match self {
            Self::NormalizeAssetPaths { .. } => "normalize-asset-paths",
            Self::LazyImages => "lazy-images",
            Self::StripLegacy { .. } => "strip-legacy",
            Self::Inject { .. } => "inject",
            Self::RemoveElements { .. } => "remove-elements",
            Self::DedupeElements { .. } => "dedupe-elements",
            Self::EnsureSnippet { .. } => "ensure-snippet",
            Self::ReplaceRegion { .. } => "replace-region",
        }
    }
}

/// Compiled plan and registry for one artifact kind
#[derive(Debug)]
pub struct KindPlan {
    pub registry: MarkerRegistry,
    pub steps: Vec<Box<dyn TransformStep>>,
}

/// Validated, compiled manifest
#[derive(Debug)]
pub struct Manifest {
    root: PathBuf,
    site: SiteSpec,
    retain: Option<usize>,
    features: IndexMap<String, Feature>,
    items: Vec<ItemRecord>,
    markup: KindPlan,
    item_documents: KindPlan,
    stylesheet: KindPlan,
    script: KindPlan,
}

impl Manifest {
    /// Load, validate and compile a manifest file
    ///
    /// `body_file` paths resolve against the manifest's directory.
    ///
    /// # Errors
    /// [`ConfigError::Missing`] if the file does not exist, otherwise any
    /// parse or validation error.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(ConfigError::Missing(path.to_path_buf()))
            }
            Err(err) => return Err(ConfigError::read_error(path, err)),
        };
        let spec: ManifestSpec = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        let root = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        debug!(manifest = %path.display(), "manifest parsed");
        Self::compile(spec, root)
    }

    /// Parse and compile manifest text with an explicit project root
    ///
    /// # Errors
    /// Any parse or validation error.
    pub fn from_toml_str(text: &str, root: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let spec: ManifestSpec = toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: PathBuf::from(DEFAULT_MANIFEST),
            source,
        })?;
        Self::compile(spec, root.into())
    }

    /// Validate and compile a parsed manifest
    ///
    /// # Errors
    /// Unknown or duplicate features, kind mismatches, invalid marker names
    /// or patterns, unreadable body files.
    pub fn compile(spec: ManifestSpec, root: PathBuf) -> Result<Self, ConfigError> {
        let mut features = IndexMap::new();
        for feature in &spec.features {
            let compiled = compile_feature(feature)?;
            if features.insert(feature.id.clone(), compiled).is_some() {
                return Err(ConfigError::DuplicateFeature(feature.id.clone()));
            }
        }

        let compiler = PlanCompiler {
            root: &root,
            features: &features,
        };
        let markup = compiler.compile(ArtifactKind::Markup, &spec.plan.markup)?;
        let item_documents = match &spec.plan.items {
            Some(steps) => compiler.compile(ArtifactKind::Markup, steps)?,
            None => compiler.compile(ArtifactKind::Markup, &spec.plan.markup)?,
        };
        let stylesheet = compiler.compile(ArtifactKind::Stylesheet, &spec.plan.stylesheet)?;
        let script = compiler.compile(ArtifactKind::Script, &spec.plan.script)?;

        Ok(Self {
            root,
            site: spec.site,
            retain: spec.backup.retain,
            features,
            items: spec.items,
            markup,
            item_documents,
            stylesheet,
            script,
        })
    }

    /// Directory `body_file` paths were resolved against
    #[inline]
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[inline]
    #[must_use]
    pub fn site(&self) -> &SiteSpec {
        &self.site
    }

    /// Backup retention from `[backup]`
    #[inline]
    #[must_use]
    pub fn retain(&self) -> Option<usize> {
        self.retain
    }

    #[must_use]
    pub fn feature(&self, id: &str) -> Option<&Feature> {
        self.features.get(id)
    }

    /// Features in declaration order
    pub fn features(&self) -> impl Iterator<Item = &Feature> {
        self.features.values()
    }

    #[inline]
    #[must_use]
    pub fn items(&self) -> &[ItemRecord] {
        &self.items
    }

    /// Plan for the primary document or companion artifact of `kind`
    #[must_use]
    pub fn plan(&self, kind: ArtifactKind) -> &KindPlan {
        match kind {
            ArtifactKind::Markup => &self.markup,
            ArtifactKind::Stylesheet => &self.stylesheet,
            ArtifactKind::Script => &self.script,
        }
    }

    /// Plan for per-item documents
    #[inline]
    #[must_use]
    pub fn item_plan(&self) -> &KindPlan {
        &self.item_documents
    }
}

fn compile_feature(spec: &FeatureSpec) -> Result<Feature, ConfigError> {
    let generations = spec
        .generations
        .iter()
        .map(|g| MarkerName::new(g.as_str()))
        .collect::<Result<Vec<_>, _>>()?;
    let owner = format!("feature '{}'", spec.id);
    let fingerprints = spec
        .fingerprints
        .iter()
        .map(|f| f.compile_for(spec.kind, &owner))
        .collect::<Result<Vec<_>, _>>()?;

    let mut feature = Feature::new(spec.id.clone(), spec.kind, generations)
        .ok_or_else(|| ConfigError::invalid(format!("feature '{}' has no generations", spec.id)))?
        .with_fingerprints(fingerprints)
        .with_terminator(spec.terminator.unwrap_or_else(|| default_terminator(spec.kind)));
    if let Some(anchor) = &spec.anchor {
        feature = feature.with_anchor(anchor.compile()?);
    }
    Ok(feature)
}

/// Anchor of each feature's first `inject` step that names one
///
/// `strip-legacy` dedupes toward the same anchor the feature is injected at,
/// wherever the two steps sit in the plan.
fn inject_anchors(specs: &[StepSpec]) -> Result<IndexMap<&str, Anchor>, ConfigError> {
    let mut anchors = IndexMap::new();
    for spec in specs {
        if let StepSpec::Inject {
            feature,
            anchor: Some(anchor),
            ..
        } = spec
        {
            if !anchors.contains_key(feature.as_str()) {
                anchors.insert(feature.as_str(), anchor.compile()?);
            }
        }
    }
    Ok(anchors)
}

struct PlanCompiler<'a> {
    root: &'a Path,
    features: &'a IndexMap<String, Feature>,
}

impl PlanCompiler<'_> {
    fn compile(&self, kind: ArtifactKind, specs: &[StepSpec]) -> Result<KindPlan, ConfigError> {
        let mut registry = MarkerRegistry::new(kind);
        for feature in self.features.values().filter(|f| f.kind() == kind) {
            registry.register_all(feature.generations().iter().cloned());
            if let Some(anchor) = feature.anchor() {
                registry.add_anchor(anchor.clone());
            }
        }

        let inject_anchors = inject_anchors(specs)?;
        let mut steps: Vec<Box<dyn TransformStep>> = Vec::with_capacity(specs.len());
        for spec in specs {
            steps.push(self.compile_step(kind, spec, &inject_anchors, &mut registry)?);
        }
        Ok(KindPlan { registry, steps })
    }

    fn compile_step(
        &self,
        kind: ArtifactKind,
        spec: &StepSpec,
        inject_anchors: &IndexMap<&str, Anchor>,
        registry: &mut MarkerRegistry,
    ) -> Result<Box<dyn TransformStep>, ConfigError> {
        let step: Box<dyn TransformStep> = match spec {
            StepSpec::NormalizeAssetPaths { prefixes } => Box::new(
                NormalizeAssetPaths::new(prefixes)
                    .map_err(|e| ConfigError::pattern_error("normalize-asset-paths", e))?,
            ),
            StepSpec::LazyImages => Box::new(LazyImages),
            StepSpec::StripLegacy { feature } => Box::new(StripLegacy::new(
                self.feature(kind, feature)?.clone(),
                inject_anchors.get(feature.as_str()).cloned(),
            )),
            StepSpec::Inject {
                feature,
                body,
                body_file,
                anchor,
            } => {
                let feature = self.feature(kind, feature)?.clone();
                let anchor = anchor.as_ref().map(AnchorSpec::compile).transpose()?;
                if kind == ArtifactKind::Markup && anchor.is_none() && feature.anchor().is_none() {
                    return Err(ConfigError::invalid(format!(
                        "inject of markup feature '{}' needs an anchor",
                        feature.id()
                    )));
                }
                if let Some(anchor) = &anchor {
                    registry.add_anchor(anchor.clone());
                }
                let body = self.body("inject", body.as_deref(), body_file.as_deref())?;
                Box::new(Inject::new(feature, body, anchor))
            }
            StepSpec::RemoveElements { fingerprints } => Box::new(RemoveElements::new(
                fingerprints
                    .iter()
                    .map(|f| f.compile_for(kind, spec.op()))
                    .collect::<Result<_, _>>()?,
            )),
            StepSpec::DedupeElements { fingerprint, keep } => Box::new(DedupeElements::new(
                fingerprint.compile_for(kind, spec.op())?,
                *keep == Keep::Last,
            )),
            StepSpec::EnsureSnippet {
                guard,
                body,
                body_file,
                anchor,
            } => {
                if guard.is_empty() {
                    return Err(ConfigError::invalid("ensure-snippet guard is empty"));
                }
                let snippet = self.body("ensure-snippet", body.as_deref(), body_file.as_deref())?;
                Box::new(EnsureSnippet::new(guard.clone(), snippet, anchor.compile()?))
            }
            StepSpec::ReplaceRegion {
                start,
                end,
                body,
                body_file,
                source,
                fallback,
            } => {
                let region = Region::new(MarkerName::new(start.as_str())?, MarkerName::new(end.as_str())?);
                if region.start == region.end {
                    return Err(ConfigError::invalid(format!(
                        "replace-region start and end are both '{start}'"
                    )));
                }
                let source = match source {
                    Some(SourceSpec::Items) if body.is_none() && body_file.is_none() => {
                        RegionSource::Items
                    }
                    Some(SourceSpec::Items) => {
                        return Err(ConfigError::invalid(
                            "replace-region takes either source = \"items\" or a body, not both",
                        ))
                    }
                    None => RegionSource::Body(self.body(
                        "replace-region",
                        body.as_deref(),
                        body_file.as_deref(),
                    )?),
                };
                let fallback = fallback.as_ref().map(AnchorSpec::compile).transpose()?;
                Box::new(ReplaceRegion::new(region, source, fallback))
            }
        };
        Ok(step)
    }

    fn feature(&self, kind: ArtifactKind, id: &str) -> Result<&Feature, ConfigError> {
        let feature = self
            .features
            .get(id)
            .ok_or_else(|| ConfigError::UnknownFeature {
                feature: id.to_string(),
                plan: kind,
            })?;
        if feature.kind() != kind {
            return Err(ConfigError::KindMismatch {
                feature: id.to_string(),
                expected: feature.kind(),
                found: kind,
            });
        }
        Ok(feature)
    }

    /// Resolve an inline `body` or a `body_file` relative to the root
    fn body(&self, op: &str, body: Option<&str>, body_file: Option<&Path>) -> Result<String, ConfigError> {
        match (body, body_file) {
            (Some(body), None) => Ok(body.to_string()),
            (None, Some(file)) => {
                let path = self.root.join(file);
                fs::read_to_string(&path).map_err(|e| ConfigError::read_error(path, e))
            }
            (Some(_), Some(_)) => Err(ConfigError::invalid(format!(
                "{op} takes either body or body_file, not both"
            ))),
            (None, None) => Err(ConfigError::invalid(format!("{op} needs body or body_file"))),
        }
    }
}
