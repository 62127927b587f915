//! Tool execution: the executor seam, a registry, and built-in tools
//!
//! The generation backend requests side-effecting operations by name;
//! the pipeline routes them through a [`ToolExecutor`]. The registry
//! here is the default executor, dispatching to registered [`Tool`]
//! implementations.

mod clock;

pub use clock::{CurrentDate, CurrentTime};

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::{Error, Result};

/// Tool definition advertised to the generation backend
#[derive(Debug, Clone, Serialize)]
pub struct ToolSpec {
    /// Tool name, unique within the registry
    pub name: String,
    /// What the tool does, phrased for the model
    pub description: String,
    /// JSON schema for the arguments object
    pub parameters: serde_json::Value,
}

/// Executes named tools on behalf of the generation backend
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Execute a tool call
    ///
    /// # Errors
    ///
    /// Fails on unknown tool name or internal tool error.
    async fn execute(&self, name: &str, arguments: &serde_json::Value) -> Result<String>;
}

/// One callable tool
#[async_trait]
pub trait Tool: Send + Sync {
    /// Definition advertised to the backend
    fn spec(&self) -> ToolSpec;

    /// Run the tool
    ///
    /// # Errors
    ///
    /// Returns an error on invalid arguments or internal failure.
    async fn call(&self, arguments: &serde_json::Value) -> Result<String>;
}

/// Dispatches tool calls to registered [`Tool`] implementations
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the built-in clock tools
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(CurrentTime));
        registry.register(Arc::new(CurrentDate));
        registry
    }

    /// Add a tool, replacing any existing tool with the same name
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.spec().name, tool);
    }

    /// Definitions for every registered tool, in name order
    #[must_use]
    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools.values().map(|t| t.spec()).collect()
    }

    /// Number of registered tools
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the registry has no tools
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[async_trait]
impl ToolExecutor for ToolRegistry {
    async fn execute(&self, name: &str, arguments: &serde_json::Value) -> Result<String> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| Error::Tool(format!("unknown tool: {name}")))?;
        tracing::debug!(tool = name, "executing tool");
        tool.call(arguments).await
    }
}
