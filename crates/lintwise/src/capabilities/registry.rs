use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

use super::{Capability, System, SystemHandler};
use crate::models::tool::Tool;

/// The flat set of capabilities offered to the model.
///
/// Names are unique: the first registration of a name wins and later ones are
/// ignored with a warning.
#[derive(Default, Clone)]
pub struct CapabilityRegistry {
    systems: Vec<Arc<dyn System>>,
    capabilities: Vec<Capability>,
    index: HashMap<String, usize>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every tool of a system
    pub fn add_system(&mut self, system: Arc<dyn System>) {
        for tool in system.tools() {
            let handler = Arc::new(SystemHandler {
                system: Arc::clone(&system),
                tool_name: tool.name.clone(),
            });
            self.register(Capability::new(tool.clone(), handler));
        }
        self.systems.push(system);
    }

    pub fn with_system(mut self, system: Arc<dyn System>) -> Self {
        self.add_system(system);
        self
    }

    /// Register a single capability, returning false if the name was taken
    pub fn register(&mut self, capability: Capability) -> bool {
        if self.index.contains_key(capability.name()) {
            warn!(
                name = capability.name(),
                "capability already registered, ignoring duplicate"
            );
            return false;
        }
        self.index
            .insert(capability.name().to_string(), self.capabilities.len());
        self.capabilities.push(capability);
        true
    }

    pub fn get(&self, name: &str) -> Option<&Capability> {
        self.index.get(name).map(|&i| &self.capabilities[i])
    }

    /// Descriptors of all capabilities, in registration order
    pub fn tools(&self) -> Vec<Tool> {
        self.capabilities.iter().map(|c| c.tool.clone()).collect()
    }

    pub fn systems(&self) -> &[Arc<dyn System>] {
        &self.systems
    }

    pub fn len(&self) -> usize {
        self.capabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::handler_fn;
    use serde_json::json;

    fn capability(name: &str, reply: &'static str) -> Capability {
        Capability::new(
            Tool::new(name, "test capability", json!({"type": "object"})),
            handler_fn(move |_| async move { Ok(reply.to_string()) }),
        )
    }

    #[tokio::test]
    async fn test_duplicates_keep_first_registration() -> anyhow::Result<()> {
        let mut registry = CapabilityRegistry::new();
        assert!(registry.register(capability("scan", "first")));
        assert!(!registry.register(capability("scan", "second")));
        assert!(registry.register(capability("lint", "other")));

        assert_eq!(registry.len(), 2);
        let names: Vec<_> = registry.tools().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["scan", "lint"]);

        let scan = registry.get("scan").expect("scan registered");
        assert_eq!(scan.handler.call(json!({})).await?, "first");
        Ok(())
    }

    #[test]
    fn test_missing_lookup() {
        let registry = CapabilityRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.get("nope").is_none());
    }
}
