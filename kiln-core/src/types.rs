//! Core type definitions for Kiln

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Log levels propagated from the build process into its workers
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[derive(Default)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Get the string representation of the log level
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }

    /// Get all supported log levels
    pub fn all() -> &'static [LogLevel] {
        &[
            LogLevel::Trace,
            LogLevel::Debug,
            LogLevel::Info,
            LogLevel::Warn,
            LogLevel::Error,
        ]
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(ParseError::InvalidLogLevel(s.to_string())),
        }
    }
}

/// How application code is loaded inside a worker process.
///
/// `Shared` adds the application classpath to the worker's single system
/// domain. `Isolated` loads application code into a private domain nested
/// under the implementation domain, which only exposes the shared modules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[derive(Default)]
pub enum IsolationMode {
    Shared,
    #[default]
    Isolated,
}

impl IsolationMode {
    /// Get the string representation of the isolation mode
    pub fn as_str(&self) -> &'static str {
        match self {
            IsolationMode::Shared => "shared",
            IsolationMode::Isolated => "isolated",
        }
    }
}

impl fmt::Display for IsolationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for IsolationMode {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "shared" => Ok(IsolationMode::Shared),
            "isolated" => Ok(IsolationMode::Isolated),
            _ => Err(ParseError::InvalidIsolationMode(s.to_string())),
        }
    }
}

/// Errors that can occur when parsing types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Invalid log level: '{0}'. Supported levels are: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid isolation mode: '{0}'. Supported modes are: shared, isolated")]
    InvalidIsolationMode(String),

    #[error("Invalid module name: '{0}'")]
    InvalidModuleName(String),
}
