//! Configuration Loader
//!
//! Environment-aware configuration loading. Layers compiled defaults, an
//! optional base TOML file, an optional environment-specific overlay, and
//! `TASKGATE__*` environment variables, in that order.

use super::{ConfigResult, GateConfig};
use config::{Config, Environment, File, FileFormat};
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// Loaded configuration together with the environment it was resolved for
pub struct ConfigManager {
    config: GateConfig,
    environment: String,
    config_directory: PathBuf,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        Self::load_from_directory(None)
    }

    /// Load configuration from a specific directory
    pub fn load_from_directory(config_dir: Option<PathBuf>) -> ConfigResult<Arc<ConfigManager>> {
        let environment = Self::detect_environment();
        Self::load_from_directory_with_env(config_dir, &environment)
    }

    /// Load configuration from a specific directory with explicit environment.
    /// Useful for testing without modifying global environment variables.
    pub fn load_from_directory_with_env(
        config_dir: Option<PathBuf>,
        environment: &str,
    ) -> ConfigResult<Arc<ConfigManager>> {
        let config_directory = config_dir.unwrap_or_else(|| PathBuf::from("config"));

        debug!(
            "Loading configuration for environment '{}' from directory: {}",
            environment,
            config_directory.display()
        );

        let base_file = config_directory.join("taskgate.toml");
        let env_file = config_directory.join(format!("taskgate.{environment}.toml"));

        let config: GateConfig = Config::builder()
            .add_source(Config::try_from(&GateConfig::default())?)
            .add_source(
                File::from(base_file)
                    .format(FileFormat::Toml)
                    .required(false),
            )
            .add_source(
                File::from(env_file)
                    .format(FileFormat::Toml)
                    .required(false),
            )
            .add_source(
                Environment::with_prefix("TASKGATE")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;

        debug!(
            environment = %environment,
            default_queue = %config.queue.default_queue,
            always_eager = config.execution.always_eager,
            "Configuration loaded successfully"
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory,
        }))
    }

    /// Get the loaded configuration
    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Get the resolved environment name
    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// Get the directory configuration files were loaded from
    pub fn config_directory(&self) -> &PathBuf {
        &self.config_directory
    }

    /// Detect environment from TASKGATE_ENV or APP_ENV, defaulting to development
    pub fn detect_environment() -> String {
        env::var("TASKGATE_ENV")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string())
    }
}

impl std::fmt::Debug for ConfigManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigManager")
            .field("environment", &self.environment)
            .field("config_directory", &self.config_directory)
            .finish()
    }
}

impl ConfigManager {
    /// Build a manager directly from an in-memory configuration.
    /// Intended for tests and embedders that construct configuration in code.
    pub fn from_config(config: GateConfig) -> ConfigResult<Arc<ConfigManager>> {
        config.validate()?;
        Ok(Arc::new(ConfigManager {
            config,
            environment: Self::detect_environment(),
            config_directory: PathBuf::from("config"),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn load_without_files_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let manager =
            ConfigManager::load_from_directory_with_env(Some(dir.path().to_path_buf()), "test")
                .unwrap();

        assert_eq!(manager.environment(), "test");
        assert_eq!(manager.config().queue.default_queue, "default");
        assert!(manager.config().timing.default_task_time_limit().is_none());
    }

    #[test]
    fn base_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = std::fs::File::create(dir.path().join("taskgate.toml")).unwrap();
        writeln!(
            file,
            r#"
[queue]
default_queue = "invoicing"

[timing]
default_task_time_limit_seconds = 60
"#
        )
        .unwrap();

        let manager =
            ConfigManager::load_from_directory_with_env(Some(dir.path().to_path_buf()), "test")
                .unwrap();

        assert_eq!(manager.config().queue.default_queue, "invoicing");
        assert_eq!(
            manager.config().timing.default_task_time_limit_seconds,
            Some(60)
        );
        // Fields the file does not mention keep their defaults
        assert_eq!(manager.config().dedup.key_prefix, "taskgate");
    }

    #[test]
    fn environment_overlay_wins_over_base() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("taskgate.toml"),
            "[execution]\nalways_eager = false\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("taskgate.test.toml"),
            "[execution]\nalways_eager = true\n",
        )
        .unwrap();

        let manager =
            ConfigManager::load_from_directory_with_env(Some(dir.path().to_path_buf()), "test")
                .unwrap();

        assert!(manager.config().execution.always_eager);
    }

    #[test]
    fn invalid_file_value_fails_loading() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("taskgate.toml"),
            "[events]\nchannel_capacity = 0\n",
        )
        .unwrap();

        let result =
            ConfigManager::load_from_directory_with_env(Some(dir.path().to_path_buf()), "test");
        assert!(result.is_err());
    }
}
