//! Parent-side handle on a spawned worker

use kiln_core::WorkerId;
use kiln_ipc::{Address, IpcError, ObjectConnection, PendingConnection};
use std::process::ExitStatus;
use std::time::Duration;
use tokio::process::Child;
use tracing::{debug, warn};

use crate::error::ExecutionError;

/// A spawned worker process and its not yet connected channel
#[derive(Debug)]
pub struct WorkerProcess {
    worker_id: WorkerId,
    display_name: String,
    server_address: Address,
    child: Child,
    pending: Option<PendingConnection>,
    connection: Option<ObjectConnection>,
    accept_timeout: Option<Duration>,
}

enum Rendezvous {
    Connected(Result<ObjectConnection, IpcError>),
    Exited(std::io::Result<ExitStatus>),
    TimedOut,
}

impl WorkerProcess {
    pub(crate) fn new(
        worker_id: WorkerId,
        display_name: String,
        child: Child,
        pending: PendingConnection,
        accept_timeout: Option<Duration>,
    ) -> Self {
        Self {
            worker_id,
            display_name,
            server_address: *pending.local_address(),
            child,
            pending: Some(pending),
            connection: None,
            accept_timeout,
        }
    }

    pub fn worker_id(&self) -> WorkerId {
        self.worker_id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// OS process id, `None` once the process has been reaped
    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    /// Address the worker connects back to
    pub fn server_address(&self) -> Address {
        self.server_address
    }

    /// The accepted connection, if the worker has connected
    pub fn connection(&self) -> Option<&ObjectConnection> {
        self.connection.as_ref()
    }

    /// Wait for the worker to connect back.
    ///
    /// Fails with [`ExecutionError::WorkerExited`] if the process ends first
    /// and with [`ExecutionError::ConnectionTimeout`] if the accept timeout
    /// elapses. Once connected, later calls return the same connection.
    pub async fn wait_for_connection(&mut self) -> Result<ObjectConnection, ExecutionError> {
        if let Some(connection) = &self.connection {
            return Ok(connection.clone());
        }
        let pending = self
            .pending
            .take()
            .ok_or(ExecutionError::Ipc(IpcError::NotConnected))?;

        let timeout = self.accept_timeout;
        let expired = async move {
            match timeout {
                Some(duration) => tokio::time::sleep(duration).await,
                None => std::future::pending::<()>().await,
            }
        };

        let rendezvous = tokio::select! {
            // A worker that connected and then exited still counts as connected.
            biased;
            accepted = pending.accept() => Rendezvous::Connected(accepted),
            status = self.child.wait() => Rendezvous::Exited(status),
            _ = expired => Rendezvous::TimedOut,
        };

        match rendezvous {
            Rendezvous::Connected(accepted) => {
                let connection = accepted?;
                debug!(
                    "{} connected from {}.",
                    self.display_name,
                    connection.peer_address()
                );
                self.connection = Some(connection.clone());
                Ok(connection)
            }
            Rendezvous::Exited(status) => {
                let status = status?;
                warn!("{} exited before connecting: {}", self.display_name, status);
                Err(ExecutionError::WorkerExited {
                    status: status.to_string(),
                })
            }
            Rendezvous::TimedOut => {
                let duration = timeout.unwrap_or_default();
                warn!("{} did not connect within {:?}.", self.display_name, duration);
                Err(ExecutionError::ConnectionTimeout(duration))
            }
        }
    }

    /// Wait for the process to exit
    pub async fn wait_for_stop(&mut self) -> Result<ExitStatus, ExecutionError> {
        let status = self.child.wait().await?;
        debug!("{} stopped: {}", self.display_name, status);
        Ok(status)
    }

    /// Kill the process and reap it
    pub async fn kill(&mut self) -> Result<(), ExecutionError> {
        self.child.kill().await?;
        Ok(())
    }
}
