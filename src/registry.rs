//! In-memory agent and tool registries.
//!
//! Pure lookup tables populated once at process startup from
//! configuration and passed by reference into the engine — no
//! module-level singletons. Reads dominate; admin enable/disable takes
//! the write side of a reader-writer lock so iterating readers never see
//! torn state.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::handler::AgentHandler;
use crate::tool::{Tool, ToolDescriptor};

/// Capability descriptor for a registered agent.
///
/// Built at startup; mutated only through registry admin operations;
/// read-only during execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDescriptor {
    /// Agent name (lookup key and classifier vocabulary).
    pub name: String,
    /// Human-readable display name.
    pub display_name: String,
    /// Coarse capability category (e.g., `"analysis"`, `"generalist"`).
    pub category: String,
    /// Preference weight; higher wins on ties.
    pub priority: i32,
    /// Whether the agent may be dispatched.
    pub active: bool,
}

impl AgentDescriptor {
    /// Creates an active descriptor with priority 0.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        display_name: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            display_name: display_name.into(),
            category: category.into(),
            priority: 0,
            active: true,
        }
    }

    /// Sets the preference weight.
    #[must_use]
    pub const fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Marks the agent inactive at registration time.
    #[must_use]
    pub const fn inactive(mut self) -> Self {
        self.active = false;
        self
    }
}

struct AgentEntry {
    descriptor: AgentDescriptor,
    handler: Arc<dyn AgentHandler>,
}

/// Lookup table mapping agent names to handlers and descriptors.
pub struct AgentRegistry {
    entries: RwLock<HashMap<String, AgentEntry>>,
}

impl AgentRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Registers an agent.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::DuplicateAgent`] if the name is taken.
    pub fn register(
        &self,
        descriptor: AgentDescriptor,
        handler: Arc<dyn AgentHandler>,
    ) -> Result<(), CoreError> {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        if entries.contains_key(&descriptor.name) {
            return Err(CoreError::DuplicateAgent {
                name: descriptor.name,
            });
        }
        entries.insert(descriptor.name.clone(), AgentEntry { descriptor, handler });
        Ok(())
    }

    /// Resolves an agent for dispatch.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownAgent`] for unregistered names and
    /// [`CoreError::InactiveAgent`] for disabled ones. Both are
    /// configuration errors surfaced immediately, never retried.
    pub fn resolve(
        &self,
        name: &str,
    ) -> Result<(AgentDescriptor, Arc<dyn AgentHandler>), CoreError> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        let entry = entries.get(name).ok_or_else(|| CoreError::UnknownAgent {
            name: name.to_string(),
        })?;
        if !entry.descriptor.active {
            return Err(CoreError::InactiveAgent {
                name: name.to_string(),
            });
        }
        Ok((entry.descriptor.clone(), Arc::clone(&entry.handler)))
    }

    /// Returns `true` if `name` is registered and active.
    #[must_use]
    pub fn is_active(&self, name: &str) -> bool {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.get(name).is_some_and(|e| e.descriptor.active)
    }

    /// Admin operation: enables or disables an agent.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownAgent`] for unregistered names.
    pub fn set_active(&self, name: &str, active: bool) -> Result<(), CoreError> {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let entry = entries.get_mut(name).ok_or_else(|| CoreError::UnknownAgent {
            name: name.to_string(),
        })?;
        entry.descriptor.active = active;
        Ok(())
    }

    /// Returns descriptors of all active agents, ordered by priority
    /// (descending) then name. This ordering is deterministic, so the
    /// classifier vocabulary does not shift between runs.
    #[must_use]
    pub fn roster(&self) -> Vec<AgentDescriptor> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        let mut roster: Vec<AgentDescriptor> = entries
            .values()
            .filter(|e| e.descriptor.active)
            .map(|e| e.descriptor.clone())
            .collect();
        roster.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.name.cmp(&b.name)));
        roster
    }

    /// Number of registered agents, active or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for AgentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for AgentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentRegistry")
            .field("len", &self.len())
            .finish()
    }
}

struct ToolEntry {
    descriptor: ToolDescriptor,
    tool: Arc<dyn Tool>,
}

/// Lookup table mapping tool names to callables and descriptors.
pub struct ToolRegistry {
    entries: RwLock<HashMap<String, ToolEntry>>,
}

impl ToolRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Registers a tool.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::DuplicateTool`] if the name is taken.
    pub fn register(&self, descriptor: ToolDescriptor, tool: Arc<dyn Tool>) -> Result<(), CoreError> {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        if entries.contains_key(&descriptor.name) {
            return Err(CoreError::DuplicateTool {
                name: descriptor.name,
            });
        }
        entries.insert(descriptor.name.clone(), ToolEntry { descriptor, tool });
        Ok(())
    }

    /// Resolves a tool for invocation.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownTool`] for unregistered names and
    /// [`CoreError::InactiveTool`] for disabled ones.
    pub fn resolve(&self, name: &str) -> Result<(ToolDescriptor, Arc<dyn Tool>), CoreError> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        let entry = entries.get(name).ok_or_else(|| CoreError::UnknownTool {
            name: name.to_string(),
        })?;
        if !entry.descriptor.active {
            return Err(CoreError::InactiveTool {
                name: name.to_string(),
            });
        }
        Ok((entry.descriptor.clone(), Arc::clone(&entry.tool)))
    }

    /// Admin operation: enables or disables a tool.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownTool`] for unregistered names.
    pub fn set_active(&self, name: &str, active: bool) -> Result<(), CoreError> {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let entry = entries.get_mut(name).ok_or_else(|| CoreError::UnknownTool {
            name: name.to_string(),
        })?;
        entry.descriptor.active = active;
        Ok(())
    }

    /// Returns descriptors of all active tools, ordered by name.
    #[must_use]
    pub fn roster(&self) -> Vec<ToolDescriptor> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        let mut roster: Vec<ToolDescriptor> = entries
            .values()
            .filter(|e| e.descriptor.active)
            .map(|e| e.descriptor.clone())
            .collect();
        roster.sort_by(|a, b| a.name.cmp(&b.name));
        roster
    }

    /// Number of registered tools, active or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::handler::AgentContext;
    use crate::tool::ToolParams;
    use async_trait::async_trait;

    struct EchoHandler;

    #[async_trait]
    impl AgentHandler for EchoHandler {
        fn name(&self) -> &str {
            "echo"
        }

        async fn handle(&self, ctx: &AgentContext) -> Result<String, CoreError> {
            Ok(ctx.query.clone())
        }
    }

    struct NoopTool;

    #[async_trait]
    impl Tool for NoopTool {
        async fn invoke(&self, _params: &ToolParams) -> Result<String, CoreError> {
            Ok("ok".to_string())
        }
    }

    fn agent(name: &str, priority: i32) -> AgentDescriptor {
        AgentDescriptor::new(name, name.to_uppercase(), "analysis").with_priority(priority)
    }

    #[test]
    fn test_register_and_resolve_agent() {
        let registry = AgentRegistry::new();
        registry
            .register(agent("echo", 1), Arc::new(EchoHandler))
            .unwrap_or_else(|e| panic!("register: {e}"));

        let (desc, _handler) = registry
            .resolve("echo")
            .unwrap_or_else(|e| panic!("resolve: {e}"));
        assert_eq!(desc.display_name, "ECHO");
        assert!(registry.is_active("echo"));
    }

    #[test]
    fn test_duplicate_agent_rejected() {
        let registry = AgentRegistry::new();
        registry
            .register(agent("echo", 0), Arc::new(EchoHandler))
            .unwrap_or_else(|e| panic!("register: {e}"));
        let result = registry.register(agent("echo", 5), Arc::new(EchoHandler));
        assert!(matches!(result, Err(CoreError::DuplicateAgent { .. })));
    }

    #[test]
    fn test_unknown_agent() {
        let registry = AgentRegistry::new();
        let result = registry.resolve("missing");
        assert!(matches!(result, Err(CoreError::UnknownAgent { .. })));
    }

    #[test]
    fn test_inactive_agent_rejected() {
        let registry = AgentRegistry::new();
        registry
            .register(agent("echo", 0), Arc::new(EchoHandler))
            .unwrap_or_else(|e| panic!("register: {e}"));
        registry
            .set_active("echo", false)
            .unwrap_or_else(|e| panic!("set_active: {e}"));

        assert!(!registry.is_active("echo"));
        let result = registry.resolve("echo");
        assert!(matches!(result, Err(CoreError::InactiveAgent { .. })));
    }

    #[test]
    fn test_roster_ordering() {
        let registry = AgentRegistry::new();
        for (name, priority) in [("beta", 1), ("alpha", 1), ("top", 9), ("off", 99)] {
            registry
                .register(agent(name, priority), Arc::new(EchoHandler))
                .unwrap_or_else(|e| panic!("register: {e}"));
        }
        registry
            .set_active("off", false)
            .unwrap_or_else(|e| panic!("set_active: {e}"));

        let names: Vec<String> = registry.roster().into_iter().map(|d| d.name).collect();
        // Priority descending, then name; inactive excluded.
        assert_eq!(names, vec!["top", "alpha", "beta"]);
    }

    #[test]
    fn test_tool_registry_lifecycle() {
        let registry = ToolRegistry::new();
        registry
            .register(
                ToolDescriptor::new("calculator", "Evaluate arithmetic"),
                Arc::new(NoopTool),
            )
            .unwrap_or_else(|e| panic!("register: {e}"));

        let (desc, _tool) = registry
            .resolve("calculator")
            .unwrap_or_else(|e| panic!("resolve: {e}"));
        assert_eq!(desc.max_identical_calls, 3);

        registry
            .set_active("calculator", false)
            .unwrap_or_else(|e| panic!("set_active: {e}"));
        assert!(matches!(
            registry.resolve("calculator"),
            Err(CoreError::InactiveTool { .. })
        ));
        assert!(matches!(
            registry.resolve("nope"),
            Err(CoreError::UnknownTool { .. })
        ));
    }

    #[test]
    fn test_duplicate_tool_rejected() {
        let registry = ToolRegistry::new();
        registry
            .register(ToolDescriptor::new("t", "d"), Arc::new(NoopTool))
            .unwrap_or_else(|e| panic!("register: {e}"));
        assert!(matches!(
            registry.register(ToolDescriptor::new("t", "d2"), Arc::new(NoopTool)),
            Err(CoreError::DuplicateTool { .. })
        ));
    }
}
