//! Worker process entry point
//!
//! The worker loader reads its descriptor from standard input, builds the
//! code domains the descriptor asks for, and runs the action.

use kiln_core::Classpath;
use kiln_isolation::{CodeDomain, Topology};
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::debug;

use crate::action::ActionRegistry;
use crate::descriptor::WorkerDescriptor;
use crate::error::ExecutionError;
use crate::worker::{ActionExecutionWorker, WorkerContext};

/// Name of the domain built from the launch classpath
pub const SYSTEM_DOMAIN: &str = "system";

/// Read the whole descriptor from `input`
pub async fn read_descriptor<R>(mut input: R) -> Result<WorkerDescriptor, ExecutionError>
where
    R: AsyncRead + Unpin,
{
    let mut bytes = Vec::new();
    input.read_to_end(&mut bytes).await?;
    WorkerDescriptor::from_bytes(&bytes)
}

/// Run a worker from the descriptor in `input`
pub async fn worker_main<R>(
    system_classpath: Classpath,
    input: R,
    registry: &ActionRegistry,
) -> Result<(), ExecutionError>
where
    R: AsyncRead + Unpin,
{
    let descriptor = read_descriptor(input).await?;
    run_descriptor(system_classpath, descriptor, registry).await
}

/// Run a worker from an already decoded descriptor
pub async fn run_descriptor(
    system_classpath: Classpath,
    descriptor: WorkerDescriptor,
    registry: &ActionRegistry,
) -> Result<(), ExecutionError> {
    kiln_logging::init_worker_tracing(descriptor.log_level)
        .map_err(|e| ExecutionError::Configuration(e.to_string()))?;
    debug!(
        "Bootstrapping {} ({} isolation).",
        descriptor.display_name, descriptor.isolation
    );

    let system = CodeDomain::root(SYSTEM_DOMAIN, system_classpath);
    let topology = Topology::build(
        descriptor.isolation,
        system,
        &descriptor.implementation_classpath,
        &descriptor.application_classpath,
        &descriptor.shared_modules,
    );

    let action = registry.instantiate(&descriptor.action)?;
    let worker = ActionExecutionWorker::new(
        descriptor.worker_id,
        descriptor.display_name,
        descriptor.server_address,
        action,
    );
    worker
        .execute(WorkerContext::new(topology.application().clone()))
        .await
}
