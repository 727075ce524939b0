//! Worker actions and the registry that reconstructs them
//!
//! A worker action is described by an [`ActionSpec`]: a registered kind plus
//! serializable parameters. The parent sends it inside the worker
//! descriptor and the child looks the kind up in its [`ActionRegistry`].

use async_trait::async_trait;
use kiln_core::WorkerId;
use kiln_ipc::ObjectConnection;
use kiln_isolation::CodeDomain;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::actions::{Echo, Fail, ProbeModules, SendMessages};
use crate::error::ExecutionError;

/// A unit of work run inside a worker process
#[async_trait]
pub trait WorkerAction: Send + Sync {
    async fn execute(&self, context: &WorkerProcessContext) -> anyhow::Result<()>;
}

/// An action that can travel inside a worker descriptor
pub trait RegisteredAction: WorkerAction + Serialize + DeserializeOwned + 'static {
    /// Kind name the registry knows this action by
    const KIND: &'static str;
}

/// Serialized form of a worker action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionSpec {
    pub kind: String,
    #[serde(default)]
    pub params: JsonValue,
}

impl ActionSpec {
    pub fn new(kind: impl Into<String>, params: JsonValue) -> Self {
        Self {
            kind: kind.into(),
            params,
        }
    }

    /// Describe a registered action
    pub fn from_action<A: RegisteredAction>(action: &A) -> Result<Self, ExecutionError> {
        let params = serde_json::to_value(action).map_err(|e| ExecutionError::InvalidAction {
            kind: A::KIND.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self::new(A::KIND, params))
    }
}

impl fmt::Display for ActionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)
    }
}

/// What a running action can see of its worker
pub struct WorkerProcessContext {
    connection: ObjectConnection,
    application_domain: Arc<CodeDomain>,
    worker_id: WorkerId,
    display_name: String,
}

impl WorkerProcessContext {
    pub fn new(
        connection: ObjectConnection,
        application_domain: Arc<CodeDomain>,
        worker_id: WorkerId,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            connection,
            application_domain,
            worker_id,
            display_name: display_name.into(),
        }
    }

    /// Live connection back to the build process
    pub fn connection(&self) -> &ObjectConnection {
        &self.connection
    }

    /// Domain the application code resolves through
    pub fn application_domain(&self) -> &Arc<CodeDomain> {
        &self.application_domain
    }

    pub fn worker_id(&self) -> WorkerId {
        self.worker_id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }
}

type ActionConstructor =
    Arc<dyn Fn(JsonValue) -> Result<Box<dyn WorkerAction>, serde_json::Error> + Send + Sync>;

/// Maps action kinds to constructors
#[derive(Clone, Default)]
pub struct ActionRegistry {
    constructors: HashMap<String, ActionConstructor>,
}

impl ActionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the built-in actions
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register::<SendMessages>();
        registry.register::<Echo>();
        registry.register::<Fail>();
        registry.register::<ProbeModules>();
        registry
    }

    /// Register an action type under its kind, replacing any previous entry
    pub fn register<A: RegisteredAction>(&mut self) {
        let constructor: ActionConstructor = Arc::new(|params| {
            let action: A = serde_json::from_value(params)?;
            Ok(Box::new(action) as Box<dyn WorkerAction>)
        });
        self.constructors.insert(A::KIND.to_string(), constructor);
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.constructors.contains_key(kind)
    }

    /// Registered kinds, sorted
    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<_> = self.constructors.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }

    /// Rebuild the action a spec describes
    pub fn instantiate(&self, spec: &ActionSpec) -> Result<Box<dyn WorkerAction>, ExecutionError> {
        let constructor = self
            .constructors
            .get(&spec.kind)
            .ok_or_else(|| ExecutionError::UnknownAction(spec.kind.clone()))?;
        // Absent parameters read as an empty object.
        let params = match &spec.params {
            JsonValue::Null => JsonValue::Object(Default::default()),
            params => params.clone(),
        };
        constructor(params).map_err(|e| ExecutionError::InvalidAction {
            kind: spec.kind.clone(),
            reason: e.to_string(),
        })
    }
}

impl fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}
