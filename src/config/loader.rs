//! Configuration Loader
//!
//! Builds a [`SiteScoreConfig`] from three layers: compiled defaults, an
//! optional TOML file and environment variables. Environment variables use
//! the `SITESCORE` prefix with `__` as the section separator, so
//! `SITESCORE__ORCHESTRATOR__REQUEST_DEADLINE_MS=15000` overrides
//! `orchestrator.request_deadline_ms`.

use super::error::{ConfigResult, ConfigurationError};
use super::SiteScoreConfig;
use config::{Config, Environment, File, FileFormat};
use std::env;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const ENV_PREFIX: &str = "SITESCORE";
const CONFIG_PATH_VAR: &str = "SITESCORE_CONFIG_PATH";
const DEFAULT_CONFIG_PATH: &str = "config/sitescore.toml";

#[derive(Debug, Default)]
pub struct ConfigLoader {
    path: Option<PathBuf>,
    skip_environment: bool,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from an explicit file. A missing file is an error in this case.
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Ignore `SITESCORE__*` variables (used by tests that must not see the host env)
    pub fn without_environment(mut self) -> Self {
        self.skip_environment = true;
        self
    }

    /// Load, merge and validate configuration
    pub fn load(&self) -> ConfigResult<SiteScoreConfig> {
        let defaults = Config::try_from(&SiteScoreConfig::default())?;
        let mut builder = Config::builder().add_source(defaults);

        match self.resolve_path()? {
            Some(path) => {
                debug!(path = %path.display(), "Loading configuration file");
                builder = builder.add_source(File::from(path.as_path()).format(FileFormat::Toml));
            }
            None => debug!("No configuration file found, using defaults"),
        }

        if !self.skip_environment {
            builder = builder.add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            );
        }

        let config: SiteScoreConfig = builder.build()?.try_deserialize()?;
        config.validate()?;

        info!(
            environment = %config.environment,
            collectors = config.collectors.len(),
            durable_cache = config.cache.redis.is_some(),
            persistence = config.persistence.enabled,
            "Configuration loaded successfully"
        );

        Ok(config)
    }

    /// Load configuration from a TOML string (defaults still apply underneath)
    pub fn from_toml_str(contents: &str) -> ConfigResult<SiteScoreConfig> {
        let config: SiteScoreConfig = Config::builder()
            .add_source(Config::try_from(&SiteScoreConfig::default())?)
            .add_source(File::from_str(contents, FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn resolve_path(&self) -> ConfigResult<Option<PathBuf>> {
        if let Some(path) = &self.path {
            return Self::require_exists(path).map(Some);
        }
        if let Ok(path) = env::var(CONFIG_PATH_VAR) {
            return Self::require_exists(Path::new(&path)).map(Some);
        }
        let default_path = PathBuf::from(DEFAULT_CONFIG_PATH);
        Ok(default_path.exists().then_some(default_path))
    }

    fn require_exists(path: &Path) -> ConfigResult<PathBuf> {
        if path.exists() {
            Ok(path.to_path_buf())
        } else {
            Err(ConfigurationError::ConfigFileNotFound {
                path: path.display().to_string(),
            })
        }
    }
}

/// Detect the deployment environment from `SITESCORE_ENV` / `APP_ENV`
pub fn detect_environment() -> String {
    env::var("SITESCORE_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_toml_overrides_defaults() {
        let config = ConfigLoader::from_toml_str(
            r#"
            environment = "test"

            [orchestrator]
            max_concurrent_collectors = 4
            collector_timeout_ms = 500

            [scoring]
            min_categories = 2

            [scoring.weights]
            demographics = 0.5
            safety = 0.5

            [[collectors]]
            category = "demographics"
            url = "http://localhost:9000/demographics"
            "#,
        )
        .unwrap();

        assert_eq!(config.environment, "test");
        assert_eq!(config.orchestrator.max_concurrent_collectors, 4);
        assert_eq!(config.orchestrator.collector_timeout_ms, 500);
        // untouched keys keep their defaults
        assert_eq!(config.orchestrator.request_deadline_ms, 30_000);
        assert_eq!(config.scoring.min_categories, 2);
        assert_eq!(config.scoring.weights.get("safety"), Some(&0.5));
        assert_eq!(config.collectors.len(), 1);
        assert_eq!(config.batch.max_batch_size, 50);
    }

    #[test]
    fn test_invalid_values_fail_validation() {
        let result = ConfigLoader::from_toml_str(
            r#"
            [orchestrator]
            collector_timeout_ms = 60000
            request_deadline_ms = 1000
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        let err = ConfigLoader::new()
            .with_path("/definitely/not/here.toml")
            .without_environment()
            .load()
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::ConfigFileNotFound { .. }));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[cache]\nttl_seconds = 120\n\n[persistence]\nenabled = true\ndatabase_url = \"sqlite::memory:\""
        )
        .unwrap();

        let config = ConfigLoader::new()
            .with_path(file.path())
            .without_environment()
            .load()
            .unwrap();

        assert_eq!(config.cache.ttl_seconds, 120);
        assert!(config.persistence.enabled);
        assert_eq!(config.persistence.database_url, "sqlite::memory:");
    }
}
