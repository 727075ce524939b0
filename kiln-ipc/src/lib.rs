//! Inter-process communication for Kiln
//!
//! This crate provides the object messaging used between a build process and
//! the worker processes it spawns: a stoppable dispatch channel with an
//! end-of-stream guarantee, a newline-delimited JSON wire protocol and a TCP
//! transport that pairs exactly one worker with one parent-side endpoint.

pub mod address;
pub mod connection;
pub mod dispatch;
pub mod error;
pub mod protocol;

// Re-export commonly used types
pub use address::Address;
pub use connection::{
    MessagingClient, MessagingServer, ObjectConnection, PendingConnection, TcpMessagingClient,
    TcpMessagingServer, MAX_FRAME_BYTES,
};
pub use dispatch::{Dispatch, EndOfStreamDispatch, StoppableDispatch};
pub use error::IpcError;
pub use protocol::{decode_frame, encode_frame, Message, MessageEnvelope, IPC_PROTOCOL_VERSION};
