use kiln_core::ParseError;
use thiserror::Error;

/// Errors raised while resolving modules
#[derive(Debug, Error)]
pub enum IsolationError {
    #[error("Module '{module}' not found in domain '{domain}'")]
    ModuleNotFound { module: String, domain: String },

    #[error(transparent)]
    InvalidModuleName(#[from] ParseError),
}

impl IsolationError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, IsolationError::ModuleNotFound { .. })
    }
}
