//! Configuration for the network interceptor.
//!
//! Controls where fixtures come from and what gets logged. The stub table
//! itself is fixed and not configurable.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration for the network interceptor.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct InterceptorConfig {
    /// Fixture resolution
    #[serde(default)]
    pub fixtures: FixtureSettings,

    /// Global settings
    #[serde(default)]
    pub settings: GlobalSettings,
}

impl InterceptorConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> anyhow::Result<()> {
        if let Some(dir) = &self.fixtures.dir {
            if !dir.is_dir() {
                anyhow::bail!("Fixture directory not found: {}", dir.display());
            }
        }
        Ok(())
    }
}

/// Where stub payloads are loaded from.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct FixtureSettings {
    /// Directory to read fixtures from (bundled fixtures when unset)
    #[serde(default)]
    pub dir: Option<PathBuf>,

    /// Fail start-up when a fixture cannot be loaded
    #[serde(default)]
    pub strict: bool,
}

/// Global settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GlobalSettings {
    /// Log all matched stubs
    #[serde(default = "default_true")]
    pub log_matches: bool,

    /// Log requests answered by the fallback response
    #[serde(default = "default_true")]
    pub log_unmatched: bool,
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            log_matches: true,
            log_unmatched: true,
        }
    }
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty_config() {
        let config: InterceptorConfig = serde_yaml::from_str("{}").unwrap();
        assert!(config.fixtures.dir.is_none());
        assert!(!config.fixtures.strict);
        assert!(config.settings.log_matches);
        assert!(config.settings.log_unmatched);
    }

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
fixtures:
  dir: /srv/fixtures
  strict: true
settings:
  log_matches: false
  log_unmatched: true
"#;
        let config: InterceptorConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.fixtures.dir, Some(PathBuf::from("/srv/fixtures")));
        assert!(config.fixtures.strict);
        assert!(!config.settings.log_matches);
    }

    #[test]
    fn test_reject_unknown_fields() {
        let yaml = r#"
stubs:
  - id: extra
"#;
        assert!(serde_yaml::from_str::<InterceptorConfig>(yaml).is_err());

        let yaml = r#"
settings:
  passthrough_unmatched: true
"#;
        assert!(serde_yaml::from_str::<InterceptorConfig>(yaml).is_err());
    }

    #[test]
    fn test_validate_fixture_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = InterceptorConfig::default();
        config.fixtures.dir = Some(dir.path().to_path_buf());
        assert!(config.validate().is_ok());

        config.fixtures.dir = Some(dir.path().join("missing"));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("network-interceptor.yaml");
        std::fs::write(&path, "settings:\n  log_unmatched: false\n").unwrap();

        let config = InterceptorConfig::from_file(&path).unwrap();
        assert!(!config.settings.log_unmatched);
        assert!(config.settings.log_matches);
    }

    #[test]
    fn test_default_config_file_parses() {
        let config: InterceptorConfig =
            serde_yaml::from_str(include_str!("../demos/default-config.yaml")).unwrap();
        assert!(config.fixtures.dir.is_none());
    }
}
