//! IPC protocol definitions and message types
//!
//! Every frame on the wire is one JSON encoded [`MessageEnvelope`] followed
//! by a newline. The same envelope also wraps the bootstrap descriptor that a
//! worker reads from its standard input.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;

use crate::error::IpcError;

/// IPC protocol version for compatibility checking
pub const IPC_PROTOCOL_VERSION: u32 = 1;

/// A message travelling over an object connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    /// Application payload, opaque to the transport
    Payload { body: JsonValue },

    /// Orderly end of the sender's stream. Produced only by stopping an
    /// [`EndOfStreamDispatch`](crate::dispatch::EndOfStreamDispatch).
    EndOfStream,
}

impl Message {
    /// Wrap any serializable value as a payload
    pub fn payload<T: Serialize + ?Sized>(value: &T) -> Result<Self, IpcError> {
        Ok(Message::Payload {
            body: serde_json::to_value(value)?,
        })
    }

    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, Message::EndOfStream)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Message::Payload { body } => write!(f, "payload {}", body),
            Message::EndOfStream => write!(f, "end-of-stream"),
        }
    }
}

/// Message envelope for all IPC communications
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageEnvelope<T> {
    pub protocol_version: u32,
    pub timestamp: DateTime<Utc>,
    pub message: T,
}

impl<T> MessageEnvelope<T> {
    /// Create a new message envelope
    pub fn new(message: T) -> Self {
        Self {
            protocol_version: IPC_PROTOCOL_VERSION,
            timestamp: Utc::now(),
            message,
        }
    }

    /// Check if protocol version is compatible
    pub fn is_compatible(&self) -> bool {
        self.protocol_version == IPC_PROTOCOL_VERSION
    }

    /// Unwrap the message, failing on a version mismatch
    pub fn into_compatible(self) -> Result<T, IpcError> {
        if !self.is_compatible() {
            return Err(IpcError::ProtocolVersionMismatch {
                expected: IPC_PROTOCOL_VERSION,
                actual: self.protocol_version,
            });
        }
        Ok(self.message)
    }
}

/// Encode a message as a single newline terminated frame
pub fn encode_frame<T: Serialize>(message: &T) -> Result<String, IpcError> {
    let envelope = MessageEnvelope::new(message);
    let mut json = serde_json::to_string(&envelope)
        .map_err(|e| IpcError::SerializationError(e.to_string()))?;
    json.push('\n');
    Ok(json)
}

/// Decode one frame, checking protocol version compatibility
pub fn decode_frame<T: DeserializeOwned>(frame: &str) -> Result<T, IpcError> {
    let envelope: MessageEnvelope<T> = serde_json::from_str(frame.trim_end())
        .map_err(|e| IpcError::DeserializationError(e.to_string()))?;
    envelope.into_compatible()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_wire_format() {
        let message = Message::payload("ready").unwrap();
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value, json!({"type": "payload", "body": "ready"}));

        let value = serde_json::to_value(Message::EndOfStream).unwrap();
        assert_eq!(value, json!({"type": "end_of_stream"}));
    }

    #[test]
    fn test_frames_are_single_lines() {
        let message = Message::payload(&json!({"text": "line one\nline two"})).unwrap();
        let frame = encode_frame(&message).unwrap();

        assert!(frame.ends_with('\n'));
        assert_eq!(frame.matches('\n').count(), 1);

        let decoded: Message = decode_frame(&frame).unwrap();
        assert_eq!(decoded, message);
    }

    #[test]
    fn test_version_mismatch_is_rejected() {
        let mut envelope = MessageEnvelope::new(Message::EndOfStream);
        envelope.protocol_version = IPC_PROTOCOL_VERSION + 1;
        let frame = serde_json::to_string(&envelope).unwrap();

        let err = decode_frame::<Message>(&frame).unwrap_err();
        assert!(matches!(
            err,
            IpcError::ProtocolVersionMismatch { expected: IPC_PROTOCOL_VERSION, .. }
        ));
    }

    #[test]
    fn test_garbage_frame_is_rejected() {
        let err = decode_frame::<Message>("not json at all").unwrap_err();
        assert!(matches!(err, IpcError::DeserializationError(_)));
    }
}
