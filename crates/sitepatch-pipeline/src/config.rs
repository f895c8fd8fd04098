//! Run configuration

use sitepatch_engine::SnapshotManager;
use std::path::{Path, PathBuf};

/// Options of one pipeline run
///
/// Manifest values (`[backup] retain`) apply unless overridden here.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Project root; artifact paths resolve against it
    pub root: PathBuf,
    /// Compute and report without snapshotting or writing
    pub dry_run: bool,
    /// Backup retention override
    pub retain: Option<usize>,
    /// Fixed backup stamp; the current local time when unset
    pub stamp: Option<String>,
}

impl PipelineConfig {
    /// Create configuration for the project at `root`
    #[inline]
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    /// With dry run
    #[inline]
    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// With backup retention override
    #[inline]
    #[must_use]
    pub fn with_retention(mut self, retain: Option<usize>) -> Self {
        self.retain = retain;
        self
    }

    /// With a fixed backup stamp
    #[inline]
    #[must_use]
    pub fn with_stamp(mut self, stamp: impl Into<String>) -> Self {
        self.stamp = Some(stamp.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Snapshot manager for the run, `manifest_retain` applying when no
    /// override is set
    #[must_use]
    pub fn snapshot_manager(&self, manifest_retain: Option<usize>) -> SnapshotManager {
        let manager = match &self.stamp {
            Some(stamp) => SnapshotManager::new(stamp.clone()),
            None => SnapshotManager::from_now(),
        };
        manager.with_retention(self.retain.or(manifest_retain))
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            dry_run: false,
            retain: None,
            stamp: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_fields() {
        let config = PipelineConfig::new("site")
            .with_dry_run(true)
            .with_retention(Some(2))
            .with_stamp("20260101-000000");
        assert_eq!(config.root(), Path::new("site"));
        assert!(config.dry_run);
        assert_eq!(config.snapshot_manager(Some(9)).stamp(), "20260101-000000");
    }

    #[test]
    fn defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.root(), Path::new("."));
        assert!(!config.dry_run);
        assert!(config.retain.is_none());
        assert!(config.stamp.is_none());
    }
}
