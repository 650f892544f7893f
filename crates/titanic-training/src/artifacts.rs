use crate::error::{TrainingError, TrainingResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::Path;

/// One file recorded against a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedArtifact {
    /// Path relative to the run's artifact root, `/`-separated.
    pub path: String,
    pub sha256: String,
    pub logged_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Finished,
    Failed,
}

/// Persisted description of a run (`run.json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    pub run_id: String,
    pub experiment: String,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
    #[serde(default)]
    pub artifacts: Vec<TrackedArtifact>,
    /// Ids of model packages logged from this run, oldest first.
    #[serde(default)]
    pub models: Vec<String>,
}

pub fn sha256_file(path: &Path) -> TrainingResult<String> {
    let bytes = std::fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(hex::encode(hasher.finalize()))
}

pub fn make_artifact(rel_path: &str, stored: &Path) -> TrainingResult<TrackedArtifact> {
    if !stored.is_file() {
        return Err(TrainingError::Tracking(format!(
            "artifact path does not exist: {}",
            stored.display()
        )));
    }

    let hash = sha256_file(stored)?;
    Ok(TrackedArtifact { path: rel_path.to_string(), sha256: hash, logged_at: Utc::now() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_make_artifact_hashes_content() {
        let temp = TempDir::new().unwrap();
        let a = temp.path().join("a.csv");
        let b = temp.path().join("b.csv");
        std::fs::write(&a, "x\n1\n").unwrap();
        std::fs::write(&b, "x\n1\n").unwrap();

        let art_a = make_artifact("a/a.csv", &a).unwrap();
        let art_b = make_artifact("b/b.csv", &b).unwrap();
        assert_eq!(art_a.sha256, art_b.sha256);
        assert_eq!(art_a.sha256.len(), 64);
    }

    #[test]
    fn test_make_artifact_requires_file() {
        let temp = TempDir::new().unwrap();
        assert!(make_artifact("missing", &temp.path().join("missing")).is_err());
    }
}
