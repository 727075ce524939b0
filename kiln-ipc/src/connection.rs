//! TCP object connections
//!
//! A [`TcpMessagingServer`] hands out a [`PendingConnection`] bound to an
//! ephemeral loopback port. Its address is given to exactly one worker,
//! which dials it with a [`TcpMessagingClient`]. Both ends then hold a
//! symmetric [`ObjectConnection`].

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tracing::{debug, trace};

use crate::address::Address;
use crate::dispatch::{Dispatch, EndOfStreamDispatch, StoppableDispatch};
use crate::error::IpcError;
use crate::protocol::{decode_frame, encode_frame, Message};

/// Largest frame, newline included, a connection accepts from its peer
pub const MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;

/// Creates parent-side connection endpoints
#[async_trait]
pub trait MessagingServer: Send + Sync {
    /// Bind an endpoint that accepts exactly one peer
    async fn create_unicast_connection(&self) -> Result<PendingConnection, IpcError>;
}

/// Dials endpoints created by a [`MessagingServer`]
#[async_trait]
pub trait MessagingClient: Send + Sync {
    async fn connect(&self, address: &Address) -> Result<ObjectConnection, IpcError>;
}

/// Messaging server listening on ephemeral TCP ports
#[derive(Debug, Clone)]
pub struct TcpMessagingServer {
    bind_address: IpAddr,
    max_frame_bytes: usize,
}

impl TcpMessagingServer {
    /// Create a server that binds to the IPv4 loopback interface
    pub fn new() -> Self {
        Self::with_bind_address(IpAddr::V4(Ipv4Addr::LOCALHOST))
    }

    pub fn with_bind_address(bind_address: IpAddr) -> Self {
        Self {
            bind_address,
            max_frame_bytes: MAX_FRAME_BYTES,
        }
    }

    /// Limit the size of frames accepted connections will read
    pub fn with_max_frame_bytes(mut self, max_frame_bytes: usize) -> Self {
        self.max_frame_bytes = max_frame_bytes;
        self
    }
}

impl Default for TcpMessagingServer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessagingServer for TcpMessagingServer {
    async fn create_unicast_connection(&self) -> Result<PendingConnection, IpcError> {
        let listener = TcpListener::bind(SocketAddr::new(self.bind_address, 0)).await?;
        let local_address = Address::new(listener.local_addr()?);
        debug!("Listening for a worker connection on {}", local_address);

        Ok(PendingConnection {
            listener,
            local_address,
            max_frame_bytes: self.max_frame_bytes,
        })
    }
}

/// A bound endpoint that has not yet been dialed by its peer
#[derive(Debug)]
pub struct PendingConnection {
    listener: TcpListener,
    local_address: Address,
    max_frame_bytes: usize,
}

impl PendingConnection {
    /// Address to hand to the single remote peer
    pub fn local_address(&self) -> &Address {
        &self.local_address
    }

    /// Wait for the peer to connect.
    ///
    /// The listener is closed once the first peer is accepted, so later
    /// connection attempts are refused by the operating system.
    pub async fn accept(self) -> Result<ObjectConnection, IpcError> {
        let (stream, peer) = self.listener.accept().await?;
        debug!("Accepted connection from {} on {}", peer, self.local_address);
        drop(self.listener);
        ObjectConnection::from_stream(stream, self.max_frame_bytes)
    }
}

/// Messaging client dialing TCP endpoints
#[derive(Debug, Clone)]
pub struct TcpMessagingClient {
    max_frame_bytes: usize,
}

impl TcpMessagingClient {
    pub fn new() -> Self {
        Self {
            max_frame_bytes: MAX_FRAME_BYTES,
        }
    }

    /// Limit the size of frames the dialed connection will read
    pub fn with_max_frame_bytes(mut self, max_frame_bytes: usize) -> Self {
        self.max_frame_bytes = max_frame_bytes;
        self
    }
}

impl Default for TcpMessagingClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessagingClient for TcpMessagingClient {
    async fn connect(&self, address: &Address) -> Result<ObjectConnection, IpcError> {
        let stream = TcpStream::connect(address.socket_addr())
            .await
            .map_err(|e| IpcError::ConnectFailed {
                address: address.to_string(),
                reason: e.to_string(),
            })?;
        debug!("Connected to {}", address);
        ObjectConnection::from_stream(stream, self.max_frame_bytes)
    }
}

/// Write side of a socket, delivering one frame per message
struct SocketSink {
    writer: Mutex<Option<OwnedWriteHalf>>,
}

impl SocketSink {
    async fn shutdown(&self) -> Result<(), IpcError> {
        let mut writer = self.writer.lock().await;
        if let Some(mut writer) = writer.take() {
            writer.shutdown().await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Dispatch<Message> for SocketSink {
    async fn dispatch(&self, message: Message) -> Result<(), IpcError> {
        let frame = encode_frame(&message)?;
        let mut writer = self.writer.lock().await;
        let writer = writer.as_mut().ok_or(IpcError::NotConnected)?;
        writer.write_all(frame.as_bytes()).await?;
        writer.flush().await?;
        trace!("Sent {}", message);
        Ok(())
    }
}

struct Incoming {
    reader: BufReader<OwnedReadHalf>,
    max_frame_bytes: usize,
    /// Set once the peer's end-of-stream marker or an oversized frame was read
    end_of_stream: bool,
}

struct ConnectionInner {
    outgoing: EndOfStreamDispatch<Arc<SocketSink>>,
    sink: Arc<SocketSink>,
    incoming: Mutex<Incoming>,
    local_address: Address,
    peer_address: Address,
}

/// A live, bidirectional message connection between two processes.
///
/// Clones share the same underlying socket.
#[derive(Clone)]
pub struct ObjectConnection {
    inner: Arc<ConnectionInner>,
}

impl ObjectConnection {
    fn from_stream(stream: TcpStream, max_frame_bytes: usize) -> Result<Self, IpcError> {
        let local_address = Address::new(stream.local_addr()?);
        let peer_address = Address::new(stream.peer_addr()?);
        stream.set_nodelay(true)?;

        let (reader, writer) = stream.into_split();
        let sink = Arc::new(SocketSink {
            writer: Mutex::new(Some(writer)),
        });

        Ok(Self {
            inner: Arc::new(ConnectionInner {
                outgoing: EndOfStreamDispatch::new(sink.clone()),
                sink,
                incoming: Mutex::new(Incoming {
                    reader: BufReader::new(reader),
                    max_frame_bytes,
                    end_of_stream: false,
                }),
                local_address,
                peer_address,
            }),
        })
    }

    pub fn local_address(&self) -> &Address {
        &self.inner.local_address
    }

    pub fn peer_address(&self) -> &Address {
        &self.inner.peer_address
    }

    /// Send a serializable value to the peer
    pub async fn dispatch<T: Serialize + ?Sized>(&self, value: &T) -> Result<(), IpcError> {
        self.dispatch_message(Message::payload(value)?).await
    }

    /// Send a raw message to the peer
    pub async fn dispatch_message(&self, message: Message) -> Result<(), IpcError> {
        self.inner.outgoing.dispatch(message).await
    }

    /// Receive the next message from the peer, in the order it was sent.
    ///
    /// Fails with [`IpcError::ConnectionClosed`] when the socket closes
    /// without an end-of-stream marker, and on any call after the marker
    /// has been returned. A frame longer than the connection's limit fails
    /// with [`IpcError::InvalidMessage`] and ends the incoming stream.
    pub async fn receive(&self) -> Result<Message, IpcError> {
        let mut incoming = self.inner.incoming.lock().await;
        if incoming.end_of_stream {
            return Err(IpcError::ConnectionClosed);
        }

        let limit = incoming.max_frame_bytes;
        let mut line = String::new();
        let read = (&mut incoming.reader)
            .take(limit as u64 + 1)
            .read_line(&mut line)
            .await?;
        if read == 0 {
            debug!("Connection to {} closed by peer", self.inner.peer_address);
            return Err(IpcError::ConnectionClosed);
        }
        if read > limit {
            incoming.end_of_stream = true;
            return Err(IpcError::InvalidMessage(format!(
                "Frame from {} exceeds {} bytes",
                self.inner.peer_address, limit
            )));
        }

        let message: Message = decode_frame(&line)?;
        if message.is_end_of_stream() {
            debug!("Received end of stream from {}", self.inner.peer_address);
            incoming.end_of_stream = true;
        }
        Ok(message)
    }

    /// Receive the next payload, or `None` once the peer has ended its stream
    pub async fn receive_payload<T: DeserializeOwned>(&self) -> Result<Option<T>, IpcError> {
        match self.receive().await? {
            Message::Payload { body } => Ok(Some(serde_json::from_value(body)?)),
            Message::EndOfStream => Ok(None),
        }
    }

    /// Whether this end has been stopped
    pub async fn is_stopped(&self) -> bool {
        self.inner.outgoing.is_stopped().await
    }

    /// Stop sending: deliver the end-of-stream marker, then close the
    /// write half of the socket so the peer observes the end promptly.
    pub async fn stop(&self) -> Result<(), IpcError> {
        let stopped = self.inner.outgoing.stop().await;
        let closed = self.inner.sink.shutdown().await;
        stopped.and(closed)
    }
}

impl std::fmt::Debug for ObjectConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectConnection")
            .field("local_address", &self.inner.local_address)
            .field("peer_address", &self.inner.peer_address)
            .finish()
    }
}
