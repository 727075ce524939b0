//! Configuration validation traits and utilities

use crate::error::{ConfigError, ConfigResult};
use kiln_core::validate_module_name;
use std::path::Path;

/// Trait for validatable configuration
pub trait Validatable {
    /// Validate the configuration
    fn validate(&self) -> ConfigResult<()>;

    /// Get the domain name for error reporting
    fn domain_name(&self) -> &'static str;

    /// Helper to create a domain-specific validation error
    fn validation_error(&self, message: impl Into<String>) -> ConfigError {
        ConfigError::DomainError {
            domain: self.domain_name().to_string(),
            message: message.into(),
        }
    }
}

/// Validate a required string field
pub fn validate_required_string(value: &str, field_name: &str, domain: &str) -> ConfigResult<()> {
    if value.is_empty() {
        return Err(ConfigError::DomainError {
            domain: domain.to_string(),
            message: format!("{} cannot be empty", field_name),
        });
    }
    Ok(())
}

/// Validate a positive number
pub fn validate_positive<T>(value: T, field_name: &str, domain: &str) -> ConfigResult<()>
where
    T: PartialOrd + Default + std::fmt::Display,
{
    if value <= T::default() {
        return Err(ConfigError::DomainError {
            domain: domain.to_string(),
            message: format!("{} must be greater than 0, got {}", field_name, value),
        });
    }
    Ok(())
}

/// Validate a path that must not be empty
pub fn validate_required_path(path: &Path, field_name: &str, domain: &str) -> ConfigResult<()> {
    if path.as_os_str().is_empty() {
        return Err(ConfigError::DomainError {
            domain: domain.to_string(),
            message: format!("{} cannot be an empty path", field_name),
        });
    }
    Ok(())
}

/// Validate a list of dot separated module names
pub fn validate_module_names(names: &[String], field_name: &str, domain: &str) -> ConfigResult<()> {
    for name in names {
        validate_module_name(name).map_err(|e| ConfigError::DomainError {
            domain: domain.to_string(),
            message: format!("{} contains an invalid entry: {}", field_name, e),
        })?;
    }
    Ok(())
}
