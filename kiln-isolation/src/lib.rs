//! Code isolation for Kiln workers
//!
//! A worker resolves modules through [`CodeDomain`]s. Domains nest, and a
//! child domain only sees through to its parent for the names its
//! [`Visibility`] admits. [`Topology`] builds the two layouts a worker can
//! run in, and [`context`] tracks which domain the running action owns.

pub mod context;
pub mod domain;
pub mod error;
pub mod shared;
pub mod topology;

pub use context::{context_domain, with_context_domain};
pub use domain::{CodeDomain, LoadedModule, ParentLookup, Visibility};
pub use error::IsolationError;
pub use shared::SharedModules;
pub use topology::Topology;
