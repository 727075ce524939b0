//! Core value types for Kiln
//!
//! This crate contains the small set of types shared between the parent
//! (build side) and the spawned worker processes. It has minimal
//! dependencies so that every other crate can depend on it.

pub mod classpath;
pub mod ids;
pub mod types;

// Re-export commonly used types at the crate root
pub use classpath::{
    module_relative_path, validate_module_name, Classpath, MODULE_FILE_EXTENSION,
};
pub use ids::{IdGenerator, MonotonicIdGenerator, WorkerId};
pub use types::{IsolationMode, LogLevel, ParseError};
