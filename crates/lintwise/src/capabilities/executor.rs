use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use super::schema::validate_arguments;
use super::CapabilityRegistry;
use crate::errors::AgentError;
use crate::models::tool::{ToolCall, ToolResult};

/// Looks calls up in the registry and runs them.
///
/// `execute` never fails: unknown names, invalid arguments, handler errors and
/// handler panics all come back as a failed [`ToolResult`].
#[derive(Clone, Default)]
pub struct CapabilityExecutor {
    registry: Arc<CapabilityRegistry>,
}

impl CapabilityExecutor {
    pub fn new(registry: CapabilityRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    pub async fn execute(&self, call: &ToolCall) -> ToolResult {
        let Some(capability) = self.registry.get(&call.name) else {
            warn!(name = %call.name, "model requested an unknown capability");
            return ToolResult::err(AgentError::ToolNotFound(call.name.clone()).to_string());
        };

        if let Err(e) = validate_arguments(&capability.tool.parameters, &call.arguments) {
            debug!(name = %call.name, error = %e, "rejected capability arguments");
            return ToolResult::err(e.to_string());
        }

        let started = Instant::now();
        let outcome = AssertUnwindSafe(capability.handler.call(call.arguments.clone()))
            .catch_unwind()
            .await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(Ok(content)) => {
                debug!(name = %call.name, elapsed_ms, "capability succeeded");
                ToolResult::ok(content)
            }
            Ok(Err(e)) => {
                debug!(name = %call.name, elapsed_ms, error = %e, "capability failed");
                ToolResult::err(e.to_string())
            }
            Err(panic) => {
                let reason = panic_message(panic.as_ref());
                warn!(name = %call.name, elapsed_ms, %reason, "capability panicked");
                ToolResult::err(format!("Capability {} panicked: {}", call.name, reason))
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
