use crate::error::TrainingResult;
use std::path::{Path, PathBuf};

/// Filesystem layout of a local tracking store.
///
/// ```text
/// <root>/<experiment>/<run_id>/run.json
/// <root>/<experiment>/<run_id>/metrics.json
/// <root>/<experiment>/<run_id>/artifacts/...
/// <root>/models/<model_id>/...
/// <root>/registry/<name>/version-<n>.json
/// ```
#[derive(Debug, Clone)]
pub struct TrackingLayout {
    root: PathBuf,
}

impl TrackingLayout {
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Accepts a plain path or a `file://` tracking URI.
    #[must_use]
    pub fn from_uri(uri: &str) -> Self {
        Self::new(PathBuf::from(uri.strip_prefix("file://").unwrap_or(uri)))
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn experiment_dir(&self, experiment: &str) -> PathBuf {
        self.root.join(experiment)
    }

    #[must_use]
    pub fn run_dir(&self, experiment: &str, run_id: &str) -> PathBuf {
        self.experiment_dir(experiment).join(run_id)
    }

    #[must_use]
    pub fn run_manifest_path(&self, experiment: &str, run_id: &str) -> PathBuf {
        self.run_dir(experiment, run_id).join("run.json")
    }

    #[must_use]
    pub fn metrics_path(&self, experiment: &str, run_id: &str) -> PathBuf {
        self.run_dir(experiment, run_id).join("metrics.json")
    }

    #[must_use]
    pub fn artifacts_dir(&self, experiment: &str, run_id: &str) -> PathBuf {
        self.run_dir(experiment, run_id).join("artifacts")
    }

    #[must_use]
    pub fn models_dir(&self) -> PathBuf {
        self.root.join("models")
    }

    #[must_use]
    pub fn model_dir(&self, model_id: &str) -> PathBuf {
        self.models_dir().join(model_id)
    }

    #[must_use]
    pub fn registry_dir(&self, name: &str) -> PathBuf {
        self.root.join("registry").join(name)
    }

    #[must_use]
    pub fn registered_version_path(&self, name: &str, version: u32) -> PathBuf {
        self.registry_dir(name).join(format!("version-{version}.json"))
    }

    pub fn ensure_run_dirs(&self, experiment: &str, run_id: &str) -> TrainingResult<()> {
        std::fs::create_dir_all(self.artifacts_dir(experiment, run_id))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_layout_paths() {
        let temp = TempDir::new().unwrap();
        let layout = TrackingLayout::new(temp.path().to_path_buf());

        assert!(layout.run_dir("titanic", "run-1").ends_with("titanic/run-1"));
        assert!(layout.artifacts_dir("titanic", "run-1").ends_with("run-1/artifacts"));
        assert!(layout.registered_version_path("titanic-survival", 3).ends_with("version-3.json"));
    }

    #[test]
    fn test_from_uri_strips_file_scheme() {
        let layout = TrackingLayout::from_uri("file:///tmp/mlruns");
        assert_eq!(layout.root(), Path::new("/tmp/mlruns"));
        let layout = TrackingLayout::from_uri("mlruns");
        assert_eq!(layout.root(), Path::new("mlruns"));
    }
}
