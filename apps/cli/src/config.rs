//! CLI configuration loading.
//!
//! Precedence, highest first:
//! 1. CLI arguments (handled by clap)
//! 2. Environment variables
//! 3. Config file (`--config`, else ./titanic.toml)
//! 4. Defaults

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use titanic_mcp::{ApiConfig, OAuthConfig};
use titanic_training::config::DEFAULT_CONFIG_FILE;
use titanic_training::PipelineConfig;

/// Sections of `titanic.toml` the training crate does not own.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct ServiceSections {
    oauth: OAuthConfig,
    api: ApiConfig,
    log_level: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub pipeline: PipelineConfig,
    pub oauth: OAuthConfig,
    pub api: ApiConfig,
    pub log_level: Option<String>,
}

fn resolve_path(explicit: Option<&Path>) -> Option<PathBuf> {
    match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => Some(PathBuf::from(DEFAULT_CONFIG_FILE)).filter(|p| p.is_file()),
    }
}

impl CliConfig {
    pub fn load(explicit: Option<&Path>, env: &dyn Fn(&str) -> Option<String>) -> Result<Self> {
        let path = resolve_path(explicit);
        let pipeline = PipelineConfig::load(path.as_deref(), env).context("Failed to load pipeline configuration")?;

        let mut sections = match &path {
            Some(path) => {
                let content = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config file: {}", path.display()))?;
                toml::from_str::<ServiceSections>(&content)
                    .with_context(|| format!("Failed to parse config file: {}", path.display()))?
            }
            None => ServiceSections::default(),
        };
        sections.oauth.apply_env(env);
        sections.api.apply_env(env);

        Ok(Self { pipeline, oauth: sections.oauth, api: sections.api, log_level: sections.log_level })
    }
}

pub fn process_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_all_sections() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("titanic.toml");
        std::fs::write(
            &path,
            r#"
log_level = "debug"

[tracking]
experiment = "exp"

[oauth]
domain = "auth.example.com"
client_id = "id"

[api]
url = "http://api:8080"
"#,
        )
        .unwrap();

        let env = |key: &str| (key == "OAUTH2_CLIENT_SECRET").then(|| "from-env".to_string());
        let config = CliConfig::load(Some(&path), &env).unwrap();
        assert_eq!(config.pipeline.tracking.experiment, "exp");
        assert_eq!(config.api.url, "http://api:8080");
        assert_eq!(config.log_level.as_deref(), Some("debug"));
        let creds = config.oauth.credentials().unwrap();
        assert_eq!(creds.client_secret, "from-env");
    }

    #[test]
    fn test_missing_explicit_file_fails() {
        let none = |_: &str| None;
        assert!(CliConfig::load(Some(Path::new("/nonexistent/titanic.toml")), &none).is_err());
    }
}
