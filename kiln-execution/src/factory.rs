//! Isolation factories
//!
//! A factory decides two things for one isolation mode: the classpath the
//! worker process is launched with, and the descriptor it bootstraps from.

use kiln_core::{Classpath, IsolationMode, LogLevel, WorkerId};
use kiln_ipc::Address;
use kiln_isolation::SharedModules;
use std::collections::HashMap;
use std::sync::Arc;

use crate::action::ActionSpec;
use crate::descriptor::WorkerDescriptor;

/// Name of the registered classpath holding the worker bootstrap code
pub const WORKER_PROCESS_CLASSPATH: &str = "worker-process";

/// Named classpaths known to the build process
#[derive(Debug, Clone, Default)]
pub struct ClassPathRegistry {
    classpaths: HashMap<String, Classpath>,
}

impl ClassPathRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, classpath: Classpath) {
        self.classpaths.insert(name.into(), classpath);
    }

    /// The classpath registered under `name`, empty if there is none
    pub fn get(&self, name: &str) -> Classpath {
        self.classpaths.get(name).cloned().unwrap_or_default()
    }
}

impl<S: Into<String>> FromIterator<(S, Classpath)> for ClassPathRegistry {
    fn from_iter<I: IntoIterator<Item = (S, Classpath)>>(iter: I) -> Self {
        let mut registry = Self::new();
        for (name, classpath) in iter {
            registry.insert(name, classpath);
        }
        registry
    }
}

/// Per-worker inputs a factory turns into a descriptor
#[derive(Debug, Clone)]
pub struct WorkerParameters {
    pub worker_id: WorkerId,
    pub display_name: String,
    pub server_address: Address,
    pub action: ActionSpec,
    pub application_classpath: Classpath,
    pub shared_modules: SharedModules,
    pub log_level: LogLevel,
}

pub trait WorkerFactory: Send + Sync {
    fn isolation(&self) -> IsolationMode;

    /// Classpath the worker process is launched with
    fn system_classpath(&self) -> Classpath;

    /// Descriptor the worker bootstraps from
    fn create(&self, parameters: WorkerParameters) -> WorkerDescriptor;
}

/// Application and implementation code share the worker's system domain
#[derive(Debug, Clone)]
pub struct SystemDomainWorkerFactory {
    implementation_classpath: Classpath,
}

impl SystemDomainWorkerFactory {
    pub fn new(implementation_classpath: Classpath) -> Self {
        Self {
            implementation_classpath,
        }
    }
}

impl WorkerFactory for SystemDomainWorkerFactory {
    fn isolation(&self) -> IsolationMode {
        IsolationMode::Shared
    }

    fn system_classpath(&self) -> Classpath {
        self.implementation_classpath.clone()
    }

    fn create(&self, parameters: WorkerParameters) -> WorkerDescriptor {
        descriptor(self.isolation(), &self.implementation_classpath, parameters)
    }
}

/// Application code runs in its own domain, seeing only the shared modules
/// of the implementation
#[derive(Debug, Clone)]
pub struct IsolatedDomainWorkerFactory {
    implementation_classpath: Classpath,
    registry: Arc<ClassPathRegistry>,
}

impl IsolatedDomainWorkerFactory {
    pub fn new(implementation_classpath: Classpath, registry: Arc<ClassPathRegistry>) -> Self {
        Self {
            implementation_classpath,
            registry,
        }
    }
}

impl WorkerFactory for IsolatedDomainWorkerFactory {
    fn isolation(&self) -> IsolationMode {
        IsolationMode::Isolated
    }

    fn system_classpath(&self) -> Classpath {
        self.registry
            .get(WORKER_PROCESS_CLASSPATH)
            .plus(&self.implementation_classpath)
    }

    fn create(&self, parameters: WorkerParameters) -> WorkerDescriptor {
        descriptor(self.isolation(), &self.implementation_classpath, parameters)
    }
}

fn descriptor(
    isolation: IsolationMode,
    implementation_classpath: &Classpath,
    parameters: WorkerParameters,
) -> WorkerDescriptor {
    WorkerDescriptor {
        worker_id: parameters.worker_id,
        display_name: parameters.display_name,
        server_address: parameters.server_address,
        action: parameters.action,
        application_classpath: parameters.application_classpath,
        implementation_classpath: implementation_classpath.clone(),
        shared_modules: parameters.shared_modules,
        isolation,
        log_level: parameters.log_level,
    }
}

/// Pick the factory for an isolation mode
pub fn factory_for(
    isolation: IsolationMode,
    implementation_classpath: Classpath,
    registry: Arc<ClassPathRegistry>,
) -> Box<dyn WorkerFactory> {
    match isolation {
        IsolationMode::Shared => Box::new(SystemDomainWorkerFactory::new(implementation_classpath)),
        IsolationMode::Isolated => Box::new(IsolatedDomainWorkerFactory::new(
            implementation_classpath,
            registry,
        )),
    }
}
