//! Kiln worker processes
//!
//! The build process configures a worker with a [`WorkerProcessBuilder`],
//! which spawns the `kiln` worker loader and hands it a [`WorkerDescriptor`]
//! over standard input. Inside the child, [`bootstrap::worker_main`] builds
//! the code domains and an [`ActionExecutionWorker`] connects back and runs
//! the action.

pub mod action;
pub mod actions;
pub mod bootstrap;
pub mod builder;
pub mod descriptor;
pub mod error;
pub mod factory;
pub mod launcher;
pub mod process;
pub mod worker;

// Re-export main types
pub use action::{ActionRegistry, ActionSpec, RegisteredAction, WorkerAction, WorkerProcessContext};
pub use actions::{Echo, Fail, ModuleProbe, ProbeModules, SendMessages};
pub use bootstrap::{read_descriptor, run_descriptor, worker_main};
pub use builder::{WorkerProcessBuilder, WorkerProcessFactory};
pub use descriptor::WorkerDescriptor;
pub use error::{ExecutionError, EXIT_ACTION_FAILED, EXIT_BOOTSTRAP_FAILED};
pub use factory::{
    ClassPathRegistry, IsolatedDomainWorkerFactory, SystemDomainWorkerFactory, WorkerFactory,
    WorkerParameters, WORKER_PROCESS_CLASSPATH,
};
pub use launcher::{ProcessLauncher, TokioProcessLauncher, WorkerCommand};
pub use process::WorkerProcess;
pub use worker::{ActionExecutionWorker, WorkerContext};
