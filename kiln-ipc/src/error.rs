//! IPC error types

use thiserror::Error;

/// IPC error types
#[derive(Debug, Error)]
pub enum IpcError {
    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Deserialization error
    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    /// IO error
    #[error("IO error: {0}")]
    IoError(String),

    /// Connection closed by the peer without an end-of-stream marker,
    /// or read from after the end-of-stream marker was seen
    #[error("Connection closed")]
    ConnectionClosed,

    /// Could not dial the remote endpoint
    #[error("Failed to connect to {address}: {reason}")]
    ConnectFailed { address: String, reason: String },

    /// Protocol version mismatch
    #[error("Protocol version mismatch: expected {expected}, got {actual}")]
    ProtocolVersionMismatch { expected: u32, actual: u32 },

    /// Invalid message format, such as a frame over the size limit
    #[error("Invalid message format: {0}")]
    InvalidMessage(String),

    /// Invalid endpoint address
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Transport not connected
    #[error("Transport not connected")]
    NotConnected,

    /// The channel was used in a way its protocol forbids, such as
    /// dispatching after it was stopped
    #[error("Illegal state: {0}")]
    IllegalState(String),
}

impl IpcError {
    /// Check if this error indicates a fatal condition
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            IpcError::ProtocolVersionMismatch { .. }
                | IpcError::InvalidMessage(_)
                | IpcError::IllegalState(_)
        )
    }
}

impl From<std::io::Error> for IpcError {
    fn from(err: std::io::Error) -> Self {
        IpcError::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for IpcError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_io() {
            IpcError::IoError(err.to_string())
        } else if err.is_data() || err.is_syntax() || err.is_eof() {
            IpcError::DeserializationError(err.to_string())
        } else {
            IpcError::SerializationError(err.to_string())
        }
    }
}
