//! Error types for worker processes

use kiln_ipc::IpcError;
use std::time::Duration;
use thiserror::Error;

/// Exit status of a worker whose action failed
pub const EXIT_ACTION_FAILED: u8 = 1;

/// Exit status of a worker that could not start its action
pub const EXIT_BOOTSTRAP_FAILED: u8 = 2;

/// Worker process errors
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("No worker action specified for this worker process.")]
    NoWorkerAction,

    #[error("Failed to spawn worker process '{program}': {reason}")]
    SpawnFailed { program: String, reason: String },

    #[error("IPC error: {0}")]
    Ipc(#[from] IpcError),

    #[error("Worker did not connect within {0:?}")]
    ConnectionTimeout(Duration),

    #[error("Worker process exited before connecting: {status}")]
    WorkerExited { status: String },

    #[error("Worker action of {display_name} failed: {source}")]
    ActionFailed {
        display_name: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Unknown worker action '{0}'")]
    UnknownAction(String),

    #[error("Invalid parameters for worker action '{kind}': {reason}")]
    InvalidAction { kind: String, reason: String },

    #[error("Invalid worker descriptor: {0}")]
    Descriptor(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Worker process I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ExecutionError {
    /// Exit status a worker reports for this error
    pub fn exit_code(&self) -> u8 {
        match self {
            ExecutionError::ActionFailed { .. } => EXIT_ACTION_FAILED,
            _ => EXIT_BOOTSTRAP_FAILED,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        let failed = ExecutionError::ActionFailed {
            display_name: "Kiln Worker 1".to_string(),
            source: "boom".into(),
        };
        assert_eq!(failed.exit_code(), EXIT_ACTION_FAILED);
        assert!(failed.to_string().contains("Kiln Worker 1"));

        assert_eq!(ExecutionError::NoWorkerAction.exit_code(), EXIT_BOOTSTRAP_FAILED);
        assert_eq!(
            ExecutionError::Ipc(IpcError::ConnectionClosed).exit_code(),
            EXIT_BOOTSTRAP_FAILED
        );
    }
}
