//! The bootstrap descriptor handed to a worker over its standard input

use kiln_core::{Classpath, IsolationMode, LogLevel, WorkerId};
use kiln_ipc::{decode_frame, encode_frame, Address};
use kiln_isolation::SharedModules;
use serde::{Deserialize, Serialize};

use crate::action::ActionSpec;
use crate::error::ExecutionError;

/// Everything a worker needs to start running its action.
///
/// Encoded as a single versioned envelope frame, so a worker built from a
/// different protocol version refuses it instead of misreading it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerDescriptor {
    pub worker_id: WorkerId,
    pub display_name: String,
    /// Where the build process waits for this worker to connect
    pub server_address: Address,
    pub action: ActionSpec,
    pub application_classpath: Classpath,
    pub implementation_classpath: Classpath,
    pub shared_modules: SharedModules,
    pub isolation: IsolationMode,
    pub log_level: LogLevel,
}

impl WorkerDescriptor {
    pub fn to_bytes(&self) -> Result<Vec<u8>, ExecutionError> {
        Ok(encode_frame(self)?.into_bytes())
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ExecutionError> {
        let frame = std::str::from_utf8(bytes)
            .map_err(|e| ExecutionError::Descriptor(format!("not UTF-8: {}", e)))?;
        if frame.trim().is_empty() {
            return Err(ExecutionError::Descriptor("empty input".to_string()));
        }
        Ok(decode_frame(frame)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_ipc::{IpcError, MessageEnvelope, IPC_PROTOCOL_VERSION};
    use serde_json::json;

    fn descriptor() -> WorkerDescriptor {
        WorkerDescriptor {
            worker_id: WorkerId(7),
            display_name: WorkerId(7).display_name(),
            server_address: "tcp://127.0.0.1:41000".parse().unwrap(),
            action: ActionSpec::new("send-messages", json!({"messages": ["ready"]})),
            application_classpath: Classpath::from_entries(["/work/app"]),
            implementation_classpath: Classpath::from_entries(["/opt/kiln/lib"]),
            shared_modules: ["logging"].into_iter().collect(),
            isolation: IsolationMode::Isolated,
            log_level: LogLevel::Debug,
        }
    }

    #[test]
    fn test_bytes_reproduce_descriptor() {
        let original = descriptor();
        let bytes = original.to_bytes().unwrap();
        assert_eq!(bytes.last(), Some(&b'\n'));
        assert_eq!(WorkerDescriptor::from_bytes(&bytes).unwrap(), original);
    }

    #[test]
    fn test_rejects_other_protocol_version() {
        let mut envelope = MessageEnvelope::new(descriptor());
        envelope.protocol_version = IPC_PROTOCOL_VERSION + 1;
        let bytes = serde_json::to_vec(&envelope).unwrap();

        let err = WorkerDescriptor::from_bytes(&bytes).unwrap_err();
        assert!(matches!(
            err,
            ExecutionError::Ipc(IpcError::ProtocolVersionMismatch { .. })
        ));
    }

    #[test]
    fn test_rejects_empty_and_garbage_input() {
        assert!(matches!(
            WorkerDescriptor::from_bytes(b"").unwrap_err(),
            ExecutionError::Descriptor(_)
        ));
        assert!(matches!(
            WorkerDescriptor::from_bytes(&[0xff, 0xfe]).unwrap_err(),
            ExecutionError::Descriptor(_)
        ));
        assert!(WorkerDescriptor::from_bytes(b"{\"worker_id\": 1}").is_err());
    }
}
