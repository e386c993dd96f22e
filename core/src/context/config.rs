//! Replay configuration
//!
//! Re-exports the shared config types from fightline-types and adds
//! persistence through confy, plus loading from an explicit TOML file.

use std::path::{Path, PathBuf};

pub use fightline_types::{PoolConfig, ReplayConfig};

use super::error::ConfigError;

const APP_NAME: &str = "fightline";
const CONFIG_NAME: &str = "config";

// ─────────────────────────────────────────────────────────────────────────────
// ReplayConfig Extensions
// ─────────────────────────────────────────────────────────────────────────────

/// Extension trait for ReplayConfig persistence
pub trait ReplayConfigExt: Sized {
    /// Stored config, or defaults if none exists or it can't be read
    fn load() -> Self;
    fn try_load() -> Result<Self, ConfigError>;
    fn save(&self) -> Result<(), ConfigError>;
    fn load_from_path(path: &Path) -> Result<Self, ConfigError>;
    fn parse_toml(text: &str, path: &Path) -> Result<Self, ConfigError>;
    fn config_path() -> Option<PathBuf>;
}

impl ReplayConfigExt for ReplayConfig {
    fn load() -> Self {
        match Self::try_load() {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!(error = %err, "Falling back to default replay config");
                Self::default()
            }
        }
    }

    fn try_load() -> Result<Self, ConfigError> {
        Ok(confy::load(APP_NAME, CONFIG_NAME)?)
    }

    fn save(&self) -> Result<(), ConfigError> {
        confy::store(APP_NAME, CONFIG_NAME, self).map_err(ConfigError::Save)
    }

    fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse_toml(&text, path)
    }

    fn parse_toml(text: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    fn config_path() -> Option<PathBuf> {
        confy::get_configuration_file_path(APP_NAME, CONFIG_NAME).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let text = r#"
            sample_interval_ms = 250

            [default_pool]
            max_workers = 2

            [pools.replay]
            max_workers = 6
            enable_logging = true
        "#;
        let config = ReplayConfig::parse_toml(text, Path::new("inline.toml")).unwrap();

        assert_eq!(config.sample_interval_ms, 250);
        assert_eq!(config.default_pool.max_workers, 2);
        assert_eq!(config.default_pool.task_timeout_ms, 30_000);
        assert_eq!(config.pool("replay").max_workers, 6);
        assert!(config.pool("replay").enable_logging);
        assert_eq!(config.pool("replay").idle_timeout_ms, 300_000);
        assert_eq!(config.pool("other").max_workers, 2);
    }

    #[test]
    fn test_empty_toml_is_default() {
        let config = ReplayConfig::parse_toml("", Path::new("empty.toml")).unwrap();
        assert_eq!(config, ReplayConfig::default());
    }

    #[test]
    fn test_toml_roundtrip() {
        let mut config = ReplayConfig::default();
        config.pools.insert(
            "scrub".to_string(),
            PoolConfig {
                max_workers: 1,
                task_timeout_ms: 0,
                ..Default::default()
            },
        );
        let text = toml::to_string(&config).unwrap();
        let parsed = ReplayConfig::parse_toml(&text, Path::new("roundtrip.toml")).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_parse_error_names_file() {
        let err = ReplayConfig::parse_toml("max_workers = [", Path::new("broken.toml"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("broken.toml"));
    }

    #[test]
    fn test_missing_file() {
        let err = ReplayConfig::load_from_path(Path::new("/nonexistent/fightline.toml"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::ReadFile { .. }));
    }
}
