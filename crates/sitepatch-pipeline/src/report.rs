//! End-of-run summary

use serde::Serialize;
use sitepatch_artifact::ArtifactKind;
use sitepatch_engine::Diagnostic;
use std::path::PathBuf;

/// What happened to one artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArtifactStatus {
    /// Rewritten after a backup
    Patched,
    /// Plan produced identical text; nothing written
    Unchanged,
    /// Dry run: the plan would rewrite the artifact
    WouldPatch,
    /// Optional artifact absent
    Skipped,
}

impl ArtifactStatus {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Patched => "patched",
            Self::Unchanged => "unchanged",
            Self::WouldPatch => "would patch",
            Self::Skipped => "skipped",
        }
    }
}

/// A diagnostic with the step that raised it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportedDiagnostic {
    /// Step label, or `load` for decoding anomalies
    pub step: String,
    #[serde(flatten)]
    pub diagnostic: Diagnostic,
}

/// Outcome for one artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactOutcome {
    pub path: PathBuf,
    pub kind: ArtifactKind,
    pub status: ArtifactStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup: Option<PathBuf>,
    /// Short content hash before the run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash_before: Option<String>,
    /// Short content hash after the run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash_after: Option<String>,
    pub diagnostics: Vec<ReportedDiagnostic>,
}

impl ArtifactOutcome {
    /// Outcome for an absent optional artifact
    #[must_use]
    pub fn skipped(path: PathBuf, kind: ArtifactKind) -> Self {
        Self {
            path,
            kind,
            status: ArtifactStatus::Skipped,
            backup: None,
            hash_before: None,
            hash_after: None,
            diagnostics: Vec::new(),
        }
    }
}

/// Summary of a whole run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    /// Backup stamp shared by the run
    pub stamp: String,
    pub dry_run: bool,
    /// Outcomes in processing order
    pub artifacts: Vec<ArtifactOutcome>,
}

impl RunReport {
    #[must_use]
    pub fn new(stamp: impl Into<String>, dry_run: bool) -> Self {
        Self {
            stamp: stamp.into(),
            dry_run,
            artifacts: Vec::new(),
        }
    }

    /// Outcomes with the given status
    pub fn with_status(&self, status: ArtifactStatus) -> impl Iterator<Item = &ArtifactOutcome> {
        self.artifacts.iter().filter(move |a| a.status == status)
    }

    /// Every diagnostic of the run, with its artifact
    pub fn diagnostics(&self) -> impl Iterator<Item = (&ArtifactOutcome, &ReportedDiagnostic)> {
        self.artifacts
            .iter()
            .flat_map(|a| a.diagnostics.iter().map(move |d| (a, d)))
    }

    /// Backups written by the run
    pub fn backups(&self) -> impl Iterator<Item = &PathBuf> {
        self.artifacts.iter().filter_map(|a| a.backup.as_ref())
    }

    /// Check whether the run changed (or would change) any artifact
    #[must_use]
    pub fn changed(&self) -> bool {
        self.artifacts
            .iter()
            .any(|a| matches!(a.status, ArtifactStatus::Patched | ArtifactStatus::WouldPatch))
    }

    /// Generate a text report
    #[must_use]
    pub fn generate_text(&self) -> String {
        let mut report = String::new();

        report.push_str("=== sitepatch run ===\n\n");
        report.push_str(&format!("Stamp: {}\n", self.stamp));
        if self.dry_run {
            report.push_str("Mode: dry run (nothing written)\n");
        }
        report.push('\n');

        for artifact in &self.artifacts {
            report.push_str(&format!(
                "{:<12} {:<10} {}\n",
                artifact.status.as_str(),
                artifact.kind.as_str(),
                artifact.path.display()
            ));
            if let (Some(before), Some(after)) = (&artifact.hash_before, &artifact.hash_after) {
                if before != after {
                    report.push_str(&format!("    hash {before} -> {after}\n"));
                }
            }
            if let Some(backup) = &artifact.backup {
                report.push_str(&format!("    backup {}\n", backup.display()));
            }
        }

        let diagnostics: Vec<_> = self.diagnostics().collect();
        if !diagnostics.is_empty() {
            report.push_str(&format!("\n=== Diagnostics ({}) ===\n", diagnostics.len()));
            for (i, (artifact, reported)) in diagnostics.iter().enumerate() {
                report.push_str(&format!(
                    "{}. {} [{}] {}\n",
                    i + 1,
                    artifact.path.display(),
                    reported.step,
                    reported.diagnostic
                ));
            }
        }

        report.push_str(&format!(
            "\n=== {} patched, {} unchanged, {} skipped ===\n",
            self.with_status(if self.dry_run {
                ArtifactStatus::WouldPatch
            } else {
                ArtifactStatus::Patched
            })
            .count(),
            self.with_status(ArtifactStatus::Unchanged).count(),
            self.with_status(ArtifactStatus::Skipped).count(),
        ));

        report
    }

    /// Serialize the report as pretty JSON
    ///
    /// # Errors
    /// Returns error if serialization fails
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sitepatch_engine::DiagnosticKind;

    fn sample() -> RunReport {
        let mut report = RunReport::new("20260101-120000", false);
        report.artifacts.push(ArtifactOutcome {
            path: PathBuf::from("index.html"),
            kind: ArtifactKind::Markup,
            status: ArtifactStatus::Patched,
            backup: Some(PathBuf::from("index.html.bak-20260101-120000")),
            hash_before: Some("aaaa".to_string()),
            hash_after: Some("bbbb".to_string()),
            diagnostics: vec![ReportedDiagnostic {
                step: "inject:filters".to_string(),
                diagnostic: Diagnostic::new(DiagnosticKind::AnchorNotFound, "cards missing"),
            }],
        });
        report
            .artifacts
            .push(ArtifactOutcome::skipped(PathBuf::from("script.js"), ArtifactKind::Script));
        report
    }

    #[test]
    fn text_report_lists_outcomes_and_diagnostics() {
        let text = sample().generate_text();
        assert!(text.contains("patched      markup     index.html"));
        assert!(text.contains("hash aaaa -> bbbb"));
        assert!(text.contains("backup index.html.bak-20260101-120000"));
        assert!(text.contains("1. index.html [inject:filters] AnchorNotFound: cards missing"));
        assert!(text.contains("=== 1 patched, 0 unchanged, 1 skipped ==="));
    }

    #[test]
    fn json_report_flattens_diagnostics() {
        let json: serde_json::Value = serde_json::from_str(&sample().to_json().unwrap()).unwrap();
        let artifact = &json["artifacts"][0];
        assert_eq!(artifact["status"], "patched");
        assert_eq!(artifact["kind"], "markup");
        assert_eq!(artifact["diagnostics"][0]["kind"], "anchor-not-found");
        assert_eq!(artifact["diagnostics"][0]["step"], "inject:filters");
        assert!(json["artifacts"][1].get("backup").is_none());
    }

    #[test]
    fn changed_tracks_patched_artifacts() {
        assert!(sample().changed());
        assert!(!RunReport::new("x", true).changed());
    }
}
