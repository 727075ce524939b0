//! Worker process configuration

use crate::error::ConfigResult;
use crate::validation::{
    validate_module_names, validate_positive, validate_required_path, validate_required_string,
    Validatable,
};
use kiln_core::{IsolationMode, LogLevel};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Worker process configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// How worker code domains are laid out
    #[serde(default)]
    pub isolation: IsolationMode,

    /// Log level handed to every worker
    #[serde(default)]
    pub log_level: LogLevel,

    /// Executable launched as the worker loader; the running binary if unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executable: Option<PathBuf>,

    /// Classpath of the worker implementation; the executable's directory if empty
    #[serde(default)]
    pub implementation_classpath: Vec<PathBuf>,

    /// Module prefixes visible across isolated domains
    #[serde(default)]
    pub shared_modules: Vec<String>,

    /// How long to wait for a worker to connect back; forever if unset
    #[serde(
        default,
        with = "crate::domains::utils::serde_duration_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub accept_timeout: Option<Duration>,

    /// Extra environment variables for worker processes
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Working directory of worker processes; inherited if unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,
}

impl Validatable for WorkerConfig {
    fn validate(&self) -> ConfigResult<()> {
        if let Some(executable) = &self.executable {
            validate_required_path(executable, "executable", self.domain_name())?;
        }

        for entry in &self.implementation_classpath {
            validate_required_path(entry, "implementation_classpath entry", self.domain_name())?;
        }

        validate_module_names(&self.shared_modules, "shared_modules", self.domain_name())?;

        if let Some(timeout) = self.accept_timeout {
            validate_positive(timeout.as_secs(), "accept_timeout", self.domain_name())?;
        }

        for key in self.env.keys() {
            validate_required_string(key, "env key", self.domain_name())?;
            if key.contains('=') {
                return Err(self.validation_error(format!("env key '{}' cannot contain '='", key)));
            }
        }

        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "worker"
    }
}
