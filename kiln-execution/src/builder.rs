//! Configuring and spawning worker processes

use kiln_config::KilnConfig;
use kiln_core::{Classpath, IdGenerator, IsolationMode, LogLevel, MonotonicIdGenerator};
use kiln_ipc::{MessagingServer, TcpMessagingServer};
use kiln_isolation::SharedModules;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::action::ActionSpec;
use crate::error::ExecutionError;
use crate::factory::{factory_for, ClassPathRegistry, WorkerParameters};
use crate::launcher::{ProcessLauncher, TokioProcessLauncher, WorkerCommand};
use crate::process::WorkerProcess;

/// Collaborators and defaults shared by every builder of one factory
#[derive(Clone)]
struct Services {
    server: Arc<dyn MessagingServer>,
    launcher: Arc<dyn ProcessLauncher>,
    id_generator: Arc<dyn IdGenerator>,
    classpath_registry: Arc<ClassPathRegistry>,
    implementation_classpath: Classpath,
}

/// Creates builders for worker processes
#[derive(Clone)]
pub struct WorkerProcessFactory {
    services: Services,
    executable: PathBuf,
    log_level: LogLevel,
    isolation: IsolationMode,
    shared_modules: SharedModules,
    accept_timeout: Option<Duration>,
    working_dir: Option<PathBuf>,
    env: BTreeMap<String, String>,
}

impl WorkerProcessFactory {
    /// Create a factory that launches `executable` as the worker loader.
    ///
    /// The implementation classpath defaults to the executable's directory.
    pub fn new(
        server: Arc<dyn MessagingServer>,
        launcher: Arc<dyn ProcessLauncher>,
        id_generator: Arc<dyn IdGenerator>,
        executable: impl Into<PathBuf>,
    ) -> Self {
        let executable = executable.into();
        let implementation_classpath = executable
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .map(|dir| Classpath::from_entries([dir.to_path_buf()]))
            .unwrap_or_default();

        Self {
            services: Services {
                server,
                launcher,
                id_generator,
                classpath_registry: Arc::new(ClassPathRegistry::new()),
                implementation_classpath,
            },
            executable,
            log_level: LogLevel::default(),
            isolation: IsolationMode::default(),
            shared_modules: SharedModules::new(),
            accept_timeout: None,
            working_dir: None,
            env: BTreeMap::new(),
        }
    }

    /// Create a factory from configuration, with TCP messaging and real
    /// OS processes
    pub fn from_config(config: &KilnConfig) -> Result<Self, ExecutionError> {
        let worker = &config.worker;
        let executable = match &worker.executable {
            Some(executable) => executable.clone(),
            None => std::env::current_exe()?,
        };

        let shared_modules = SharedModules::try_from_names(worker.shared_modules.iter().cloned())
            .map_err(|e| ExecutionError::Configuration(e.to_string()))?;
        let classpath_registry = config
            .classpaths
            .iter()
            .map(|(name, entries)| (name.clone(), Classpath::from_entries(entries.iter().cloned())))
            .collect();

        let mut factory = Self::new(
            Arc::new(TcpMessagingServer::new()),
            Arc::new(TokioProcessLauncher::new()),
            Arc::new(MonotonicIdGenerator::new()),
            executable,
        )
        .with_log_level(worker.log_level)
        .with_isolation(worker.isolation)
        .with_shared_modules(shared_modules)
        .with_accept_timeout(worker.accept_timeout)
        .with_env(worker.env.clone())
        .with_classpath_registry(classpath_registry);

        if !worker.implementation_classpath.is_empty() {
            factory = factory.with_implementation_classpath(Classpath::from_entries(
                worker.implementation_classpath.iter().cloned(),
            ));
        }

        if let Some(dir) = &worker.working_dir {
            factory = factory.with_working_dir(dir.clone());
        }

        Ok(factory)
    }

    pub fn with_log_level(mut self, log_level: LogLevel) -> Self {
        self.log_level = log_level;
        self
    }

    pub fn with_isolation(mut self, isolation: IsolationMode) -> Self {
        self.isolation = isolation;
        self
    }

    pub fn with_shared_modules(mut self, shared_modules: SharedModules) -> Self {
        self.shared_modules = shared_modules;
        self
    }

    pub fn with_accept_timeout(mut self, accept_timeout: Option<Duration>) -> Self {
        self.accept_timeout = accept_timeout;
        self
    }

    pub fn with_working_dir(mut self, working_dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(working_dir.into());
        self
    }

    pub fn with_env(mut self, env: BTreeMap<String, String>) -> Self {
        self.env = env;
        self
    }

    pub fn with_implementation_classpath(mut self, classpath: Classpath) -> Self {
        self.services.implementation_classpath = classpath;
        self
    }

    pub fn with_classpath_registry(mut self, registry: ClassPathRegistry) -> Self {
        self.services.classpath_registry = Arc::new(registry);
        self
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    pub fn implementation_classpath(&self) -> &Classpath {
        &self.services.implementation_classpath
    }

    /// Start configuring a new worker process
    pub fn new_process(&self) -> WorkerProcessBuilder {
        WorkerProcessBuilder {
            services: self.services.clone(),
            action: None,
            application_classpath: Classpath::new(),
            shared_modules: self.shared_modules.clone(),
            log_level: self.log_level,
            isolation: self.isolation,
            executable: self.executable.clone(),
            working_dir: self.working_dir.clone(),
            env: self.env.clone(),
            accept_timeout: self.accept_timeout,
        }
    }
}

/// Configures and spawns one worker process
pub struct WorkerProcessBuilder {
    services: Services,
    action: Option<ActionSpec>,
    application_classpath: Classpath,
    shared_modules: SharedModules,
    log_level: LogLevel,
    isolation: IsolationMode,
    executable: PathBuf,
    working_dir: Option<PathBuf>,
    env: BTreeMap<String, String>,
    accept_timeout: Option<Duration>,
}

impl WorkerProcessBuilder {
    /// Set the action the worker runs
    pub fn worker(&mut self, action: ActionSpec) -> &mut Self {
        self.action = Some(action);
        self
    }

    pub fn application_classpath(&mut self, classpath: Classpath) -> &mut Self {
        self.application_classpath = classpath;
        self
    }

    pub fn shared_modules(&mut self, shared_modules: SharedModules) -> &mut Self {
        self.shared_modules = shared_modules;
        self
    }

    /// Add one shared module prefix
    pub fn share_module(&mut self, prefix: impl Into<String>) -> &mut Self {
        self.shared_modules.insert(prefix);
        self
    }

    pub fn log_level(&mut self, log_level: LogLevel) -> &mut Self {
        self.log_level = log_level;
        self
    }

    pub fn isolation(&mut self, isolation: IsolationMode) -> &mut Self {
        self.isolation = isolation;
        self
    }

    pub fn executable(&mut self, executable: impl Into<PathBuf>) -> &mut Self {
        self.executable = executable.into();
        self
    }

    pub fn working_dir(&mut self, working_dir: impl Into<PathBuf>) -> &mut Self {
        self.working_dir = Some(working_dir.into());
        self
    }

    pub fn env(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn accept_timeout(&mut self, timeout: Option<Duration>) -> &mut Self {
        self.accept_timeout = timeout;
        self
    }

    /// Spawn the worker process.
    ///
    /// Returns as soon as the process exists. The worker has not necessarily
    /// connected yet; see [`WorkerProcess::wait_for_connection`].
    pub async fn build(&self) -> Result<WorkerProcess, ExecutionError> {
        let action = self.action.clone().ok_or(ExecutionError::NoWorkerAction)?;

        let pending = self.services.server.create_unicast_connection().await?;
        let server_address = *pending.local_address();

        let worker_id = self.services.id_generator.generate_id();
        let display_name = worker_id.display_name();

        let implementation_classpath = self.services.implementation_classpath.clone();

        let factory = factory_for(
            self.isolation,
            implementation_classpath,
            self.services.classpath_registry.clone(),
        );
        let descriptor = factory.create(WorkerParameters {
            worker_id,
            display_name: display_name.clone(),
            server_address,
            action,
            application_classpath: self.application_classpath.clone(),
            shared_modules: self.shared_modules.clone(),
            log_level: self.log_level,
        });

        let stdin = descriptor.to_bytes()?;

        let system_classpath = factory.system_classpath().join().map_err(|e| {
            ExecutionError::Configuration(format!("Invalid system classpath: {}", e))
        })?;
        let mut command = WorkerCommand::loader(&self.executable, system_classpath, stdin);
        command.env = self.env.clone();
        command.working_dir = self.working_dir.clone();

        debug!(
            "Starting {} ({} isolation, action {}).",
            display_name, self.isolation, descriptor.action
        );
        let child = self.services.launcher.launch(command).await?;
        info!("Started {} with pid {:?}.", display_name, child.id());

        Ok(WorkerProcess::new(
            worker_id,
            display_name,
            child,
            pending,
            self.accept_timeout,
        ))
    }
}
