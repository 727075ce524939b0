//! Domain-driven configuration for Kiln
//!
//! Configuration is split by functional domain, loaded from YAML, refined by
//! `KILN_*` environment variables and validated per domain.

pub mod error;
pub mod loader;
pub mod validation;

// Domain-specific configuration modules
pub mod domains;

// Re-export main types
pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;
pub use validation::Validatable;

// Re-export domain configurations
pub use domains::{logging::LoggingConfig, worker::WorkerConfig, KilnConfig};

// Re-export utilities
pub use domains::utils::serde_duration_option;
