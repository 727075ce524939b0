//! Worker identifiers

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identifier minted by the parent for every spawned worker.
///
/// Ids are never reused within a generator's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkerId(pub u64);

impl WorkerId {
    /// Get the inner value
    pub fn as_u64(&self) -> u64 {
        self.0
    }

    /// Human readable label used in logs and error messages
    pub fn display_name(&self) -> String {
        format!("Kiln Worker {}", self.0)
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for WorkerId {
    fn from(id: u64) -> Self {
        WorkerId(id)
    }
}

/// Source of worker ids
pub trait IdGenerator: Send + Sync {
    fn generate_id(&self) -> WorkerId;
}

/// Generates strictly increasing ids, starting at 1
#[derive(Debug)]
pub struct MonotonicIdGenerator {
    next: AtomicU64,
}

impl MonotonicIdGenerator {
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    pub fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }
}

impl Default for MonotonicIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl IdGenerator for MonotonicIdGenerator {
    fn generate_id(&self) -> WorkerId {
        WorkerId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}
