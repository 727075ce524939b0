//! Child-side execution of a worker action

use futures::FutureExt;
use kiln_core::WorkerId;
use kiln_ipc::{Address, MessagingClient, TcpMessagingClient};
use kiln_isolation::{with_context_domain, CodeDomain};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::action::{WorkerAction, WorkerProcessContext};
use crate::error::ExecutionError;

/// What the bootstrap hands to the worker once code domains exist
#[derive(Debug, Clone)]
pub struct WorkerContext {
    pub application_domain: Arc<CodeDomain>,
}

impl WorkerContext {
    pub fn new(application_domain: Arc<CodeDomain>) -> Self {
        Self { application_domain }
    }
}

/// Connects back to the build process and runs one action
pub struct ActionExecutionWorker {
    worker_id: WorkerId,
    display_name: String,
    server_address: Address,
    action: Box<dyn WorkerAction>,
    client: Arc<dyn MessagingClient>,
}

impl ActionExecutionWorker {
    pub fn new(
        worker_id: WorkerId,
        display_name: impl Into<String>,
        server_address: Address,
        action: Box<dyn WorkerAction>,
    ) -> Self {
        Self {
            worker_id,
            display_name: display_name.into(),
            server_address,
            action,
            client: Arc::new(TcpMessagingClient::new()),
        }
    }

    pub fn with_client(mut self, client: Arc<dyn MessagingClient>) -> Self {
        self.client = client;
        self
    }

    /// Run the action with the application domain as context domain.
    ///
    /// The connection is stopped on every path, so the build process always
    /// sees an end-of-stream once the action is done. Action errors come back
    /// as [`ExecutionError::ActionFailed`] and panics resume after the stop.
    pub async fn execute(&self, worker_context: WorkerContext) -> Result<(), ExecutionError> {
        let connection = self.client.connect(&self.server_address).await?;
        let domain = worker_context.application_domain;
        let context = WorkerProcessContext::new(
            connection.clone(),
            domain.clone(),
            self.worker_id,
            self.display_name.clone(),
        );

        debug!("Executing {} in domain '{}'.", self.display_name, domain.name());
        let outcome = AssertUnwindSafe(with_context_domain(domain, self.action.execute(&context)))
            .catch_unwind()
            .await;

        let stopped = connection.stop().await;

        match outcome {
            Ok(Ok(())) => {
                stopped?;
                debug!("Completed {}.", self.display_name);
                Ok(())
            }
            Ok(Err(source)) => {
                if let Err(e) = stopped {
                    warn!("Failed to stop connection of {}: {}", self.display_name, e);
                }
                Err(ExecutionError::ActionFailed {
                    display_name: self.display_name.clone(),
                    source: source.into(),
                })
            }
            Err(panic) => {
                if let Err(e) = stopped {
                    warn!("Failed to stop connection of {}: {}", self.display_name, e);
                }
                std::panic::resume_unwind(panic)
            }
        }
    }
}
