//! Configuration loading and environment variable handling

use crate::domains::logging::LoggingConfig;
use crate::domains::worker::WorkerConfig;
use crate::domains::KilnConfig;
use crate::error::{ConfigError, ConfigResult};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

/// Configuration loader with environment variable support
pub struct ConfigLoader {
    /// Environment variable prefix
    prefix: String,
}

impl ConfigLoader {
    /// Create a new config loader with default prefix
    pub fn new() -> Self {
        Self {
            prefix: "KILN".to_string(),
        }
    }

    /// Load configuration from a YAML file with environment overrides
    pub fn from_file(&self, path: impl AsRef<Path>) -> ConfigResult<KilnConfig> {
        let path = path.as_ref();
        debug!("Loading configuration from {}", path.display());
        let content = std::fs::read_to_string(path)?;
        let mut config: KilnConfig = serde_yaml::from_str(&content)?;

        self.apply_env_overrides(&mut config)?;
        config.validate_all()?;

        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env(&self) -> ConfigResult<KilnConfig> {
        let mut config = KilnConfig::default();
        self.apply_env_overrides(&mut config)?;
        config.validate_all()?;
        Ok(config)
    }

    /// Load configuration with fallback chain
    pub fn load(&self, config_path: Option<impl AsRef<Path>>) -> ConfigResult<KilnConfig> {
        match config_path {
            Some(path) => self.from_file(path),
            None => self.from_env(),
        }
    }

    /// Apply environment variable overrides to configuration
    fn apply_env_overrides(&self, config: &mut KilnConfig) -> ConfigResult<()> {
        self.apply_worker_overrides(&mut config.worker)?;
        self.apply_logging_overrides(&mut config.logging)?;
        Ok(())
    }

    /// Apply worker config overrides
    fn apply_worker_overrides(&self, config: &mut WorkerConfig) -> ConfigResult<()> {
        if let Ok(isolation) = self.get_env_var("WORKER_ISOLATION") {
            config.isolation = FromStr::from_str(&isolation)
                .map_err(|e| ConfigError::EnvError(format!("Invalid WORKER_ISOLATION: {}", e)))?;
        }

        if let Ok(log_level) = self.get_env_var("WORKER_LOG_LEVEL") {
            config.log_level = FromStr::from_str(&log_level)
                .map_err(|e| ConfigError::EnvError(format!("Invalid WORKER_LOG_LEVEL: {}", e)))?;
        }

        if let Ok(executable) = self.get_env_var("WORKER_EXECUTABLE") {
            config.executable = Some(PathBuf::from(executable));
        }

        // Zero turns the timeout off.
        if let Ok(timeout) = self.get_env_var("WORKER_ACCEPT_TIMEOUT") {
            let seconds: u64 = timeout.parse().map_err(|e| {
                ConfigError::EnvError(format!("Invalid WORKER_ACCEPT_TIMEOUT: {}", e))
            })?;
            config.accept_timeout = (seconds > 0).then(|| Duration::from_secs(seconds));
        }

        if let Ok(shared) = self.get_env_var("WORKER_SHARED_MODULES") {
            config.shared_modules = shared
                .split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(String::from)
                .collect();
        }

        Ok(())
    }

    /// Apply logging config overrides
    fn apply_logging_overrides(&self, config: &mut LoggingConfig) -> ConfigResult<()> {
        if let Ok(log_level) = self.get_env_var("LOG_LEVEL") {
            config.level = FromStr::from_str(&log_level)
                .map_err(|e| ConfigError::EnvError(format!("Invalid LOG_LEVEL: {}", e)))?;
        }

        Ok(())
    }

    /// Get environment variable with prefix
    fn get_env_var(&self, name: &str) -> Result<String, std::env::VarError> {
        std::env::var(format!("{}_{}", self.prefix, name))
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
