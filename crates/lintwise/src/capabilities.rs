use async_trait::async_trait;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;

use crate::errors::AgentResult;
use crate::models::tool::Tool;

mod executor;
mod registry;
pub mod schema;

pub use executor::CapabilityExecutor;
pub use registry::CapabilityRegistry;

/// Executes one capability. Implementations report failures through the
/// returned result; the executor also contains panics.
#[async_trait]
pub trait CapabilityHandler: Send + Sync {
    async fn call(&self, arguments: Value) -> AgentResult<String>;
}

/// A named capability: its descriptor plus the handler that runs it
#[derive(Clone)]
pub struct Capability {
    pub tool: Tool,
    pub handler: Arc<dyn CapabilityHandler>,
}

impl Capability {
    pub fn new(tool: Tool, handler: Arc<dyn CapabilityHandler>) -> Self {
        Self { tool, handler }
    }

    pub fn name(&self) -> &str {
        &self.tool.name
    }
}

impl std::fmt::Debug for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Capability")
            .field("tool", &self.tool)
            .finish_non_exhaustive()
    }
}

struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> CapabilityHandler for FnHandler<F>
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: Future<Output = AgentResult<String>> + Send,
{
    async fn call(&self, arguments: Value) -> AgentResult<String> {
        (self.0)(arguments).await
    }
}

/// Wrap an async function as a capability handler
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn CapabilityHandler>
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = AgentResult<String>> + Send + 'static,
{
    Arc::new(FnHandler(f))
}

/// Core trait that defines a group of capabilities the agent can operate
#[async_trait]
pub trait System: Send + Sync {
    /// Get the name of the system
    fn name(&self) -> &str;

    /// Get the system description
    fn description(&self) -> &str;

    /// Get system instructions, rendered into the system prompt
    fn instructions(&self) -> &str;

    /// Get available tools
    fn tools(&self) -> &[Tool];

    /// Call one of this system's tools
    async fn call(&self, tool_name: &str, arguments: Value) -> AgentResult<String>;
}

/// Routes a registered tool back to the system that declared it
struct SystemHandler {
    system: Arc<dyn System>,
    tool_name: String,
}

#[async_trait]
impl CapabilityHandler for SystemHandler {
    async fn call(&self, arguments: Value) -> AgentResult<String> {
        self.system.call(&self.tool_name, arguments).await
    }
}
