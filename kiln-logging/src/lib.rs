//! Logging infrastructure for Kiln
//!
//! Build-side processes log to the console through `tracing-subscriber`.
//! Worker processes log to stderr only, at the level handed to them by the
//! build process in their bootstrap descriptor.

pub mod init;

pub use init::{env_filter_for, init_simple_tracing, init_worker_tracing};
pub use kiln_core::LogLevel;
