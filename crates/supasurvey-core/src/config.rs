//! Survey configuration.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::form::UnknownTypePolicy;

/// Name of the project-local config file.
pub const CONFIG_FILE: &str = "supasurvey.toml";

/// Top-level supasurvey configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurveyConfig {
    /// Schema used when a command is given no `--schema`.
    #[serde(default)]
    pub schema: Option<PathBuf>,
    /// Handling of answers whose type has no field builder.
    #[serde(default)]
    pub unknown_types: UnknownTypePolicy,
    /// Output directory for score reports.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./supasurvey-reports")
}

impl Default for SurveyConfig {
    fn default() -> Self {
        Self {
            schema: None,
            unknown_types: UnknownTypePolicy::default(),
            output_dir: default_output_dir(),
        }
    }
}

impl SurveyConfig {
    /// The configured schema, or an error naming how to set one.
    pub fn schema_path(&self, explicit: Option<&Path>) -> Result<PathBuf> {
        explicit
            .map(Path::to_path_buf)
            .or_else(|| self.schema.clone())
            .context("no schema given: pass --schema, set `schema` in supasurvey.toml, or set SUPASURVEY_SCHEMA")
    }
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `supasurvey.toml` in the current directory
/// 2. `~/.config/supasurvey/config.toml`
///
/// Environment variable overrides: `SUPASURVEY_SCHEMA`, `SUPASURVEY_UNKNOWN_TYPES`.
pub fn load_config() -> Result<SurveyConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<SurveyConfig> {
    let config_path = match path {
        Some(p) if p.exists() => Some(p.to_path_buf()),
        Some(p) => anyhow::bail!("config file not found: {}", p.display()),
        None => [Some(PathBuf::from(CONFIG_FILE)), dirs_path().map(|d| d.join("config.toml"))]
            .into_iter()
            .flatten()
            .find(|p| p.exists()),
    };

    let mut config = match &config_path {
        Some(path) => parse_config(path)?,
        None => SurveyConfig::default(),
    };

    if let Ok(schema) = std::env::var("SUPASURVEY_SCHEMA") {
        if !schema.trim().is_empty() {
            config.schema = Some(PathBuf::from(schema));
        }
    }
    if let Ok(policy) = std::env::var("SUPASURVEY_UNKNOWN_TYPES") {
        config.unknown_types = policy
            .parse()
            .map_err(anyhow::Error::msg)
            .context("invalid SUPASURVEY_UNKNOWN_TYPES")?;
    }

    tracing::debug!(
        path = ?config_path,
        unknown_types = %config.unknown_types,
        "loaded config"
    );
    Ok(config)
}

fn parse_config(path: &Path) -> Result<SurveyConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config: {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("failed to parse config: {}", path.display()))
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("supasurvey"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = SurveyConfig::default();
        assert_eq!(config.unknown_types, UnknownTypePolicy::Lenient);
        assert!(config.schema.is_none());
        assert_eq!(config.output_dir, PathBuf::from("./supasurvey-reports"));
    }

    #[test]
    fn parse_full_config() {
        let config: SurveyConfig = toml::from_str(
            r#"
schema = "surveys/dogs.json"
unknown_types = "strict"
output_dir = "out"
"#,
        )
        .unwrap();
        assert_eq!(config.schema, Some(PathBuf::from("surveys/dogs.json")));
        assert_eq!(config.unknown_types, UnknownTypePolicy::Strict);
        assert_eq!(config.output_dir, PathBuf::from("out"));
    }

    #[test]
    fn explicit_path_must_exist() {
        let err = load_config_from(Some(Path::new("/nonexistent/supasurvey.toml"))).unwrap_err();
        assert!(err.to_string().contains("config file not found"));
    }

    #[test]
    fn explicit_path_is_read() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "output_dir = \"reports\"\n").unwrap();
        let config = load_config_from(Some(&path)).unwrap();
        assert_eq!(config.output_dir, PathBuf::from("reports"));
    }

    #[test]
    fn schema_path_prefers_explicit() {
        let config = SurveyConfig {
            schema: Some(PathBuf::from("configured.json")),
            ..Default::default()
        };
        assert_eq!(
            config.schema_path(Some(Path::new("given.json"))).unwrap(),
            PathBuf::from("given.json")
        );
        assert_eq!(config.schema_path(None).unwrap(), PathBuf::from("configured.json"));
        assert!(SurveyConfig::default().schema_path(None).is_err());
    }
}
