//! Domain-specific configuration modules

pub mod logging;
pub mod utils;
pub mod worker;

use crate::error::ConfigResult;
use crate::validation::{validate_required_string, Validatable};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Main Kiln configuration combining all domains
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct KilnConfig {
    /// Worker process configuration
    #[serde(default)]
    pub worker: worker::WorkerConfig,

    /// Logging configuration of the build process
    #[serde(default)]
    pub logging: logging::LoggingConfig,

    /// Named classpaths, such as `worker-process`
    #[serde(default)]
    pub classpaths: BTreeMap<String, Vec<PathBuf>>,
}

impl KilnConfig {
    /// Validate all domain configurations
    pub fn validate_all(&self) -> ConfigResult<()> {
        self.worker.validate()?;
        self.logging.validate()?;
        for name in self.classpaths.keys() {
            validate_required_string(name, "classpath name", "classpaths")?;
        }
        Ok(())
    }

    /// Generate a sample configuration file
    pub fn generate_sample() -> String {
        let config = KilnConfig::default();
        serde_yaml::to_string(&config)
            .unwrap_or_else(|_| "# Failed to generate sample config".to_string())
    }
}
