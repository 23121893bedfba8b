use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use promptrun_catalog::ToolDescriptor;
use promptrun_utils::error::ToolCallError;
use promptrun_utils::trace::TraceContext;
use promptrun_utils::types::Namespace;

/// Everything a backend needs to run one call.
#[derive(Debug, Clone)]
pub struct ToolInvocation {
    pub namespace: Namespace,
    pub descriptor: ToolDescriptor,
    pub arguments: Value,
    pub env: Arc<BTreeMap<String, String>>,
    pub timeout: Duration,
    pub trace: TraceContext,
    /// Cancelled when the dispatcher stops waiting for this call.
    pub cancel: CancellationToken,
}

/// What a backend reports back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutput {
    pub success: bool,
    #[serde(default)]
    pub output: Value,
    #[serde(default)]
    pub elapsed_ms: u64,
}

impl ToolOutput {
    #[must_use]
    pub fn ok(output: Value) -> Self {
        Self {
            success: true,
            output,
            elapsed_ms: 0,
        }
    }

    #[must_use]
    pub fn failed(output: Value) -> Self {
        Self {
            success: false,
            output,
            elapsed_ms: 0,
        }
    }
}

/// Backend that executes calls for one namespace.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn invoke(&self, invocation: ToolInvocation) -> Result<ToolOutput, ToolCallError>;
}

/// One executor slot per namespace; an empty slot means the namespace is off.
#[derive(Clone, Default)]
pub struct ExecutorSet {
    executors: BTreeMap<Namespace, Arc<dyn ToolExecutor>>,
}

impl fmt::Debug for ExecutorSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutorSet")
            .field("enabled", &self.executors.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ExecutorSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, namespace: Namespace, executor: Arc<dyn ToolExecutor>) -> Self {
        self.executors.insert(namespace, executor);
        self
    }

    /// Same executor for tools, and for activities/workflows when enabled.
    #[must_use]
    pub fn uniform(
        executor: Arc<dyn ToolExecutor>,
        activities_enabled: bool,
        workflows_enabled: bool,
    ) -> Self {
        let mut set = Self::new().with(Namespace::Tool, executor.clone());
        if activities_enabled {
            set = set.with(Namespace::Activity, executor.clone());
        }
        if workflows_enabled {
            set = set.with(Namespace::Workflow, executor);
        }
        set
    }

    #[must_use]
    pub fn get(&self, namespace: Namespace) -> Option<&Arc<dyn ToolExecutor>> {
        self.executors.get(&namespace)
    }

    #[must_use]
    pub fn is_enabled(&self, namespace: Namespace) -> bool {
        self.executors.contains_key(&namespace)
    }
}
