//! Run orchestration
//!
//! Artifacts are processed one at a time in a fixed order: the primary
//! markup document, per-item documents sorted by file name, the stylesheet,
//! then the script. Each artifact's text is threaded through its plan; a
//! changed artifact is snapshotted once and rewritten once. A fatal step
//! error aborts the run without rolling back artifacts already written.

use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::items::{CardRenderer, ItemRecord, ItemRenderer};
use crate::manifest::{KindPlan, Manifest};
use crate::report::{ArtifactOutcome, ArtifactStatus, ReportedDiagnostic, RunReport};
use crate::steps::StepContext;
use sitepatch_artifact::{Artifact, ArtifactError, ArtifactKind};
use sitepatch_engine::{Diagnostic, DiagnosticKind, SnapshotManager};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Text produced by a whole plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Patched {
    pub text: String,
    pub diagnostics: Vec<ReportedDiagnostic>,
}

/// Thread `text` through every step of `plan`
///
/// Pure: no filesystem access. `path` only labels errors.
///
/// # Errors
/// The first step failure, as [`PipelineError::Step`].
pub fn patch_text(
    text: &str,
    plan: &KindPlan,
    items: &[ItemRecord],
    renderer: &dyn ItemRenderer,
    path: &Path,
) -> PipelineResult<Patched> {
    let ctx = StepContext {
        registry: &plan.registry,
        items,
        renderer,
    };
    let mut current = text.to_owned();
    let mut diagnostics = Vec::new();

    for step in &plan.steps {
        let label = step.label();
        let output = step
            .apply(&current, &ctx)
            .map_err(|e| PipelineError::step_error(label.clone(), path, e))?;
        let changed = output.text != current;
        debug!(
            step = %label,
            path = %path.display(),
            changed,
            diagnostics = output.diagnostics.len(),
            "step applied"
        );
        diagnostics.extend(output.diagnostics.into_iter().map(|diagnostic| ReportedDiagnostic {
            step: label.clone(),
            diagnostic,
        }));
        current = output.text;
    }

    Ok(Patched {
        text: current,
        diagnostics,
    })
}

/// An artifact scheduled for a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub path: PathBuf,
    pub kind: ArtifactKind,
    /// Per-item document (uses the item plan)
    pub item_document: bool,
    pub required: bool,
}

/// Applies a manifest's plans to a project's artifacts
#[derive(Debug)]
pub struct ArtifactPatchPipeline {
    manifest: Manifest,
    config: PipelineConfig,
    renderer: Box<dyn ItemRenderer>,
}

impl ArtifactPatchPipeline {
    /// Pipeline rendering items with the default [`CardRenderer`]
    #[must_use]
    pub fn new(manifest: Manifest, config: PipelineConfig) -> Self {
        Self {
            manifest,
            config,
            renderer: Box::new(CardRenderer::new()),
        }
    }

    /// Replace the item renderer
    #[must_use]
    pub fn with_renderer(mut self, renderer: impl ItemRenderer + 'static) -> Self {
        self.renderer = Box::new(renderer);
        self
    }

    #[inline]
    #[must_use]
    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Artifacts of this run, in processing order
    ///
    /// # Errors
    /// Fails if the per-item directory exists but cannot be listed.
    pub fn targets(&self) -> PipelineResult<Vec<Target>> {
        let root = self.config.root();
        let site = self.manifest.site();
        let mut targets = vec![Target {
            path: root.join(&site.markup),
            kind: ArtifactKind::Markup,
            item_document: false,
            required: true,
        }];

        targets.extend(
            item_documents(&root.join(&site.items_dir))?
                .into_iter()
                .map(|path| Target {
                    path,
                    kind: ArtifactKind::Markup,
                    item_document: true,
                    required: true,
                }),
        );

        targets.push(Target {
            path: root.join(&site.stylesheet),
            kind: ArtifactKind::Stylesheet,
            item_document: false,
            required: site.require_stylesheet,
        });
        targets.push(Target {
            path: root.join(&site.script),
            kind: ArtifactKind::Script,
            item_document: false,
            required: site.require_script,
        });
        Ok(targets)
    }

    /// Run every plan over every artifact
    ///
    /// # Errors
    /// - [`PipelineError::MissingArtifact`] before any mutation
    /// - step, snapshot or write failures, aborting the run
    pub fn run(&self) -> PipelineResult<RunReport> {
        let targets = self.targets()?;
        if let Some(missing) = targets.iter().find(|t| t.required && !t.path.is_file()) {
            return Err(PipelineError::MissingArtifact(missing.path.clone()));
        }

        let snapshots = self.config.snapshot_manager(self.manifest.retain());
        let mut report = RunReport::new(snapshots.stamp(), self.config.dry_run);
        info!(
            stamp = snapshots.stamp(),
            artifacts = targets.len(),
            dry_run = self.config.dry_run,
            "run started"
        );

        for target in &targets {
            let outcome = self.process(target, &snapshots)?;
            info!(
                path = %outcome.path.display(),
                status = outcome.status.as_str(),
                diagnostics = outcome.diagnostics.len(),
                "artifact processed"
            );
            report.artifacts.push(outcome);
        }
        Ok(report)
    }

    fn plan_for(&self, target: &Target) -> &KindPlan {
        if target.item_document {
            self.manifest.item_plan()
        } else {
            self.manifest.plan(target.kind)
        }
    }

    fn process(&self, target: &Target, snapshots: &SnapshotManager) -> PipelineResult<ArtifactOutcome> {
        let (mut artifact, anomaly) = match Artifact::load(&target.path, target.kind) {
            Ok(loaded) => loaded,
            Err(ArtifactError::Missing(path)) if !target.required => {
                debug!(path = %path.display(), "optional artifact absent");
                return Ok(ArtifactOutcome::skipped(path, target.kind));
            }
            Err(err) => return Err(err.into()),
        };

        let mut diagnostics = Vec::new();
        if let Some(anomaly) = anomaly {
            let diagnostic = Diagnostic::new(
                DiagnosticKind::EncodingAnomaly,
                format!(
                    "invalid UTF-8 from byte {}, {} replacement character(s)",
                    anomaly.first_invalid_offset, anomaly.replacements
                ),
            );
            warn!(path = %target.path.display(), "{}", diagnostic.message);
            diagnostics.push(ReportedDiagnostic {
                step: "load".to_string(),
                diagnostic,
            });
        }

        let patched = patch_text(
            artifact.text(),
            self.plan_for(target),
            self.manifest.items(),
            self.renderer.as_ref(),
            &target.path,
        )?;
        diagnostics.extend(patched.diagnostics);
        artifact.set_text(patched.text);

        let (status, backup) = if !artifact.is_modified() {
            (ArtifactStatus::Unchanged, None)
        } else if self.config.dry_run {
            (ArtifactStatus::WouldPatch, None)
        } else {
            let backup = snapshots.snapshot(artifact.path())?;
            artifact.persist()?;
            (ArtifactStatus::Patched, backup)
        };

        Ok(ArtifactOutcome {
            path: target.path.clone(),
            kind: target.kind,
            status,
            backup,
            hash_before: Some(artifact.original_hash().short()),
            hash_after: Some(artifact.hash().short()),
            diagnostics,
        })
    }
}

/// Markup documents directly inside `dir`, sorted by file name
///
/// A missing directory yields no documents.
fn item_documents(dir: &Path) -> PipelineResult<Vec<PathBuf>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(ArtifactError::io_error(dir, err).into()),
    };

    let mut documents = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| ArtifactError::io_error(dir, e))?.path();
        if path.is_file() && ArtifactKind::from_path(&path) == Some(ArtifactKind::Markup) {
            documents.push(path);
        }
    }
    documents.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(documents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    const MANIFEST: &str = r#"
[[features]]
id = "bar"
kind = "markup"
generations = ["BAR:V1", "BAR:V2"]
anchor = { class = "cards", tag = "div" }

[plan]
markup = [
  { op = "strip-legacy", feature = "bar" },
  { op = "inject", feature = "bar", body = "<div id=\"bar\"></div>" },
]
items = [{ op = "lazy-images" }]
"#;

    fn project(index: &str) -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("index.html"), index).unwrap();
        dir
    }

    fn pipeline(dir: &TempDir, dry_run: bool) -> ArtifactPatchPipeline {
        let manifest = Manifest::from_toml_str(MANIFEST, dir.path()).unwrap();
        let config = PipelineConfig::new(dir.path())
            .with_dry_run(dry_run)
            .with_stamp("20260101-120000");
        ArtifactPatchPipeline::new(manifest, config)
    }

    #[test]
    fn targets_follow_processing_order() {
        let dir = project("<div class=\"cards\"></div>\n");
        fs::create_dir(dir.path().join("case")).unwrap();
        fs::write(dir.path().join("case/zeus.html"), "").unwrap();
        fs::write(dir.path().join("case/atena.html"), "").unwrap();
        fs::write(dir.path().join("case/notes.txt"), "").unwrap();

        let names: Vec<String> = pipeline(&dir, false)
            .targets()
            .unwrap()
            .iter()
            .map(|t| t.path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            names,
            vec!["index.html", "atena.html", "zeus.html", "styles.css", "script.js"]
        );
    }

    #[test]
    fn patches_once_then_leaves_unchanged() {
        let dir = project("<main>\n<!-- BAR:V1 -->\n<div id=\"old\"></div>\n<div class=\"cards\"></div>\n</main>\n");
        let pipeline = pipeline(&dir, false);

        let first = pipeline.run().unwrap();
        assert_eq!(first.artifacts[0].status, ArtifactStatus::Patched);
        assert_eq!(
            fs::read_to_string(dir.path().join("index.html")).unwrap(),
            "<main>\n<!-- BAR:V2 -->\n<div id=\"bar\"></div>\n<div class=\"cards\"></div>\n</main>\n"
        );
        let backup = first.artifacts[0].backup.clone().unwrap();
        assert!(fs::read_to_string(backup).unwrap().contains("BAR:V1"));
        assert_eq!(first.artifacts[1].status, ArtifactStatus::Skipped);

        let second = pipeline.run().unwrap();
        assert_eq!(second.artifacts[0].status, ArtifactStatus::Unchanged);
        assert_eq!(second.backups().count(), 0);
        assert_eq!(SnapshotManager::backups(&dir.path().join("index.html")).unwrap().len(), 1);
    }

    #[test]
    fn dry_run_writes_nothing() {
        let original = "<div class=\"cards\"></div>\n";
        let dir = project(original);
        let report = pipeline(&dir, true).run().unwrap();
        assert_eq!(report.artifacts[0].status, ArtifactStatus::WouldPatch);
        assert!(report.changed());
        assert_eq!(fs::read_to_string(dir.path().join("index.html")).unwrap(), original);
        assert!(SnapshotManager::backups(&dir.path().join("index.html")).unwrap().is_empty());
    }

    #[test]
    fn missing_markup_is_fatal_before_mutation() {
        let dir = TempDir::new().unwrap();
        let err = pipeline(&dir, false).run().unwrap_err();
        assert!(matches!(err, PipelineError::MissingArtifact(_)));
        assert_eq!(err.exit_code(), crate::error::EXIT_MISSING);
    }

    #[test]
    fn required_stylesheet_checked_before_markup_is_touched() {
        let original = "<div class=\"cards\"></div>\n";
        let dir = project(original);
        let manifest = Manifest::from_toml_str(
            &format!("[site]\nrequire_stylesheet = true\n{MANIFEST}"),
            dir.path(),
        )
        .unwrap();
        let err = ArtifactPatchPipeline::new(manifest, PipelineConfig::new(dir.path()))
            .run()
            .unwrap_err();
        assert!(matches!(err, PipelineError::MissingArtifact(p) if p.ends_with("styles.css")));
        assert_eq!(fs::read_to_string(dir.path().join("index.html")).unwrap(), original);
    }

    #[test]
    fn item_documents_use_item_plan() {
        let dir = project("<div class=\"cards\"></div>\n");
        fs::create_dir(dir.path().join("case")).unwrap();
        fs::write(dir.path().join("case/atena.html"), "<img src=\"a.jpg\">\n").unwrap();

        let report = pipeline(&dir, false).run().unwrap();
        assert_eq!(report.artifacts[1].status, ArtifactStatus::Patched);
        assert_eq!(
            fs::read_to_string(dir.path().join("case/atena.html")).unwrap(),
            "<img loading=\"lazy\" decoding=\"async\" src=\"a.jpg\">\n"
        );
    }

    #[test]
    fn encoding_anomaly_is_reported() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("index.html"),
            b"<div class=\"cards\"></div>\n<p>\xff</p>\n".as_slice(),
        )
        .unwrap();
        let report = pipeline(&dir, true).run().unwrap();
        let kinds: Vec<DiagnosticKind> = report.artifacts[0]
            .diagnostics
            .iter()
            .map(|d| d.diagnostic.kind)
            .collect();
        assert_eq!(kinds, vec![DiagnosticKind::EncodingAnomaly]);
        assert_eq!(report.artifacts[0].diagnostics[0].step, "load");
    }

    #[test]
    fn ambiguous_legacy_match_is_stable_across_runs() {
        let manifest = Manifest::from_toml_str(
            r#"
[[features]]
id = "promo"
kind = "markup"
generations = ["PROMO:V1"]
anchor = { class = "cards", tag = "div" }
fingerprints = [{ by = "class", class = "promo" }]

[plan]
markup = [
  { op = "strip-legacy", feature = "promo" },
  { op = "inject", feature = "promo", body = "<aside class=\"promo-v1\"></aside>" },
]
"#,
            ".",
        )
        .unwrap();
        let plan = manifest.plan(ArtifactKind::Markup);
        let renderer = CardRenderer::new();
        let path = Path::new("index.html");
        let text = "<section class=\"promo\">long content here</section>\n<div class=\"promo\">x</div>\n<div class=\"cards\"></div>\n";

        let once = patch_text(text, plan, &[], &renderer, path).unwrap();
        let twice = patch_text(&once.text, plan, &[], &renderer, path).unwrap();
        assert_eq!(twice, once);
        assert!(once.text.starts_with(text.lines().next().unwrap()));
        assert_eq!(once.diagnostics.len(), 1);
        assert_eq!(once.diagnostics[0].step, "strip-legacy:promo");
        assert_eq!(
            once.diagnostics[0].diagnostic.kind,
            DiagnosticKind::AmbiguousLegacyMatch
        );
    }

    #[test]
    fn strip_legacy_keeps_duplicate_at_inject_anchor() {
        let manifest = Manifest::from_toml_str(
            r#"
[[features]]
id = "bar"
kind = "markup"
generations = ["BAR:V2"]
anchor = { class = "cards", tag = "div" }

[plan]
markup = [
  { op = "strip-legacy", feature = "bar" },
  { op = "inject", feature = "bar", body = "<div id=\"bar\"></div>", anchor = { literal = "<footer>" } },
]
"#,
            ".",
        )
        .unwrap();
        let renderer = CardRenderer::new();
        let text = "<!-- BAR:V2 -->\n<div id=\"bar\">a</div>\n<div class=\"cards\"></div>\n<p>gap</p>\n<!-- BAR:V2 -->\n<div id=\"bar\">b</div>\n<footer></footer>\n";

        let patched = patch_text(
            text,
            manifest.plan(ArtifactKind::Markup),
            &[],
            &renderer,
            Path::new("index.html"),
        )
        .unwrap();
        assert_eq!(
            patched.text,
            "<div class=\"cards\"></div>\n<p>gap</p>\n<!-- BAR:V2 -->\n<div id=\"bar\">b</div>\n<footer></footer>\n"
        );
        assert_eq!(
            patched.diagnostics[0].diagnostic.kind,
            DiagnosticKind::DuplicateMarker
        );
    }

    #[test]
    fn patch_text_is_deterministic() {
        let dir = project("");
        let pipeline = pipeline(&dir, true);
        let plan = pipeline.manifest().plan(ArtifactKind::Markup);
        let renderer = CardRenderer::new();
        let text = "<div class=\"cards\"></div>\n";
        let a = patch_text(text, plan, &[], &renderer, Path::new("index.html")).unwrap();
        let b = patch_text(text, plan, &[], &renderer, Path::new("index.html")).unwrap();
        assert_eq!(a, b);
        let again = patch_text(&a.text, plan, &[], &renderer, Path::new("index.html")).unwrap();
        assert_eq!(again.text, a.text);
    }
}
