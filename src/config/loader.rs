//! Configuration Loader
//!
//! Environment-aware configuration loading: built-in defaults, an optional
//! TOML file plus its per-environment sibling, then `INTAKE__SECTION__KEY`
//! environment overrides.

use super::error::{ConfigResult, ConfigurationError};
use super::IntakeConfig;
use config::{Config, Environment, File, FileFormat};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

const ENV_PREFIX: &str = "INTAKE";
const ENV_SEPARATOR: &str = "__";

/// Loaded configuration plus the context it was loaded in
#[derive(Debug)]
pub struct ConfigManager {
    config: IntakeConfig,
    environment: String,
    config_path: Option<PathBuf>,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        let path = env::var("INTAKE_CONFIG_PATH").ok().map(PathBuf::from);
        Self::load_from_path(path.as_deref())
    }

    /// Load configuration from a specific file
    pub fn load_from_path(path: Option<&Path>) -> ConfigResult<Arc<ConfigManager>> {
        let environment = Self::detect_environment();
        Self::load_with_env(path, &environment)
    }

    /// Load configuration with an explicit environment
    /// This is useful for testing without modifying global environment variables
    pub fn load_with_env(path: Option<&Path>, environment: &str) -> ConfigResult<Arc<ConfigManager>> {
        let overrides = Environment::with_prefix(ENV_PREFIX)
            .separator(ENV_SEPARATOR)
            .try_parsing(true);
        Self::load_with_sources(path, environment, overrides)
    }

    fn load_with_sources(
        path: Option<&Path>,
        environment: &str,
        overrides: Environment,
    ) -> ConfigResult<Arc<ConfigManager>> {
        debug!(
            environment = environment,
            path = ?path,
            "Loading intake configuration"
        );

        let defaults = Config::try_from(&IntakeConfig::default())
            .map_err(|e| ConfigurationError::parse_error("defaults", e))?;
        let mut builder = Config::builder().add_source(defaults);

        if let Some(path) = path {
            if !path.is_file() {
                return Err(ConfigurationError::file_read_error(
                    path.display().to_string(),
                    "not a regular file",
                ));
            }
            builder = builder.add_source(File::from(path.to_path_buf()).format(FileFormat::Toml));

            if let Some(env_path) = Self::environment_override_path(path, environment) {
                if env_path.is_file() {
                    debug!(path = %env_path.display(), "Applying environment overrides file");
                    builder =
                        builder.add_source(File::from(env_path).format(FileFormat::Toml));
                }
            }
        }

        let config: IntakeConfig = builder
            .add_source(overrides)
            .build()
            .and_then(|merged| merged.try_deserialize())
            .map_err(|e| {
                ConfigurationError::parse_error(
                    path.map(|p| p.display().to_string())
                        .unwrap_or_else(|| "environment".to_string()),
                    e,
                )
            })?;

        config.validate()?;

        info!(
            environment = environment,
            telemetry_enabled = config.telemetry.enabled,
            submission_endpoint = config.submission.endpoint.as_deref().unwrap_or("none"),
            "Configuration loaded successfully"
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_path: path.map(Path::to_path_buf),
        }))
    }

    /// Get the loaded configuration
    pub fn config(&self) -> &IntakeConfig {
        &self.config
    }

    /// Get the current environment
    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// Detect current environment from environment variables
    pub fn detect_environment() -> String {
        env::var("INTAKE_ENV")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string())
            .to_lowercase()
    }

    /// `intake.toml` + `test` -> `intake.test.toml`
    fn environment_override_path(path: &Path, environment: &str) -> Option<PathBuf> {
        let stem = path.file_stem()?.to_str()?;
        Some(path.with_file_name(format!("{stem}.{environment}.toml")))
    }
}
