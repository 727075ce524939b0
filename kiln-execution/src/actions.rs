//! Built-in worker actions

use anyhow::bail;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::debug;

use crate::action::{RegisteredAction, WorkerAction, WorkerProcessContext};

/// Sends each message to the build process, in order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendMessages {
    pub messages: Vec<JsonValue>,
}

impl SendMessages {
    pub fn new<I, M>(messages: I) -> Self
    where
        I: IntoIterator<Item = M>,
        M: Into<JsonValue>,
    {
        Self {
            messages: messages.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl WorkerAction for SendMessages {
    async fn execute(&self, context: &WorkerProcessContext) -> anyhow::Result<()> {
        for message in &self.messages {
            context.connection().dispatch(message).await?;
        }
        debug!("{} sent {} messages.", context.display_name(), self.messages.len());
        Ok(())
    }
}

impl RegisteredAction for SendMessages {
    const KIND: &'static str = "send-messages";
}

/// Sends every payload it receives straight back until the build process
/// ends its stream
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Echo {}

#[async_trait]
impl WorkerAction for Echo {
    async fn execute(&self, context: &WorkerProcessContext) -> anyhow::Result<()> {
        let connection = context.connection();
        let mut echoed = 0usize;
        while let Some(payload) = connection.receive_payload::<JsonValue>().await? {
            connection.dispatch(&payload).await?;
            echoed += 1;
        }
        debug!("{} echoed {} messages.", context.display_name(), echoed);
        Ok(())
    }
}

impl RegisteredAction for Echo {
    const KIND: &'static str = "echo";
}

/// Fails with the given message, after sending any messages it carries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fail {
    pub message: String,
    #[serde(default)]
    pub before: Vec<JsonValue>,
}

impl Fail {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            before: Vec::new(),
        }
    }
}

#[async_trait]
impl WorkerAction for Fail {
    async fn execute(&self, context: &WorkerProcessContext) -> anyhow::Result<()> {
        for message in &self.before {
            context.connection().dispatch(message).await?;
        }
        bail!("{}", self.message)
    }
}

impl RegisteredAction for Fail {
    const KIND: &'static str = "fail";
}

/// How one module resolves from the application domain and from the
/// domain directly above it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleProbe {
    pub module: String,
    /// Domain that defined the module as loaded by the application domain
    pub application: Option<String>,
    /// Same, as loaded by the parent of the application domain. In shared
    /// mode the application domain has no parent and answers for itself.
    pub implementation: Option<String>,
    /// Both loads resolved to the very same module instance
    pub identical: bool,
}

/// Reports how modules resolve inside the worker, one [`ModuleProbe`] per
/// module sent as its own message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeModules {
    pub modules: Vec<String>,
}

impl ProbeModules {
    pub fn new<I, S>(modules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            modules: modules.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl WorkerAction for ProbeModules {
    async fn execute(&self, context: &WorkerProcessContext) -> anyhow::Result<()> {
        let application = context.application_domain();
        let implementation = application.parent().unwrap_or(application);

        for module in &self.modules {
            let from_application = application.load(module).ok();
            let from_implementation = implementation.load(module).ok();
            let identical = match (&from_application, &from_implementation) {
                (Some(a), Some(b)) => Arc::ptr_eq(a, b),
                _ => false,
            };
            let probe = ModuleProbe {
                module: module.clone(),
                application: from_application.map(|m| m.defined_by().to_string()),
                implementation: from_implementation.map(|m| m.defined_by().to_string()),
                identical,
            };
            context.connection().dispatch(&probe).await?;
        }
        Ok(())
    }
}

impl RegisteredAction for ProbeModules {
    const KIND: &'static str = "probe-modules";
}
