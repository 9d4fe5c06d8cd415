//! Tool types for the bounded tool-calling loop.
//!
//! A tool is an external callable capability with a name, JSON
//! parameters, and a bounded execution time. The specific tools (search,
//! calculator, templating, ...) are external collaborators implementing
//! the one [`Tool`] contract.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Default per-call execution budget.
const DEFAULT_MAX_EXECUTION: Duration = Duration::from_secs(30);
/// Default identical-invocation limit within one run.
const DEFAULT_MAX_IDENTICAL_CALLS: u32 = 3;
/// Maximum raw byte length of tool parameter JSON accepted from the model.
const MAX_TOOL_PARAMS_LEN: usize = 100_000;

/// Tool call parameters: a JSON object keyed by parameter name.
///
/// `serde_json::Map` is ordered by key, so serializing the same logical
/// parameter set always yields the same string — see
/// [`ToolCall::canonical_key`].
pub type ToolParams = serde_json::Map<String, serde_json::Value>;

/// Trait implemented by every callable tool.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Invokes the tool with the given parameters.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ToolExecution`] on failure. Timeouts are
    /// enforced by the caller, not the tool.
    async fn invoke(&self, params: &ToolParams) -> Result<String, CoreError>;
}

/// Capability descriptor for a registered tool.
///
/// Built at startup from configuration; read-only during execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Tool name (lookup key).
    pub name: String,
    /// Human-readable description of what the tool does.
    pub description: String,
    /// Per-call execution budget.
    #[serde(with = "crate::audit::duration_secs")]
    pub max_execution: Duration,
    /// Identical-invocation limit within one tool-calling run.
    pub max_identical_calls: u32,
    /// Whether the tool may be dispatched.
    pub active: bool,
}

impl ToolDescriptor {
    /// Creates a descriptor with the default execution budget (30s) and
    /// identical-call limit (3).
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            max_execution: DEFAULT_MAX_EXECUTION,
            max_identical_calls: DEFAULT_MAX_IDENTICAL_CALLS,
            active: true,
        }
    }

    /// Overrides the per-call execution budget.
    #[must_use]
    pub const fn with_max_execution(mut self, budget: Duration) -> Self {
        self.max_execution = budget;
        self
    }

    /// Overrides the identical-invocation limit.
    #[must_use]
    pub const fn with_max_identical_calls(mut self, limit: u32) -> Self {
        self.max_identical_calls = limit;
        self
    }

    /// Marks the tool inactive at registration time.
    #[must_use]
    pub const fn inactive(mut self) -> Self {
        self.active = false;
        self
    }
}

/// A tool invocation requested by the reasoning step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Name of the tool to invoke.
    pub tool: String,
    /// Parameters for the call.
    #[serde(default)]
    pub params: ToolParams,
}

impl ToolCall {
    /// Returns the canonical identity of this call: tool name plus the
    /// key-ordered JSON of its parameters. Two calls with the same name
    /// and logically identical parameters always map to the same key.
    #[must_use]
    pub fn canonical_key(&self) -> String {
        let params = serde_json::to_string(&self.params).unwrap_or_default();
        format!("{}:{params}", self.tool)
    }

    /// Validates the raw parameter payload size.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ToolExecution`] when the serialized parameters
    /// exceed the accepted payload bound.
    pub fn check_params_len(&self) -> Result<(), CoreError> {
        let len = serde_json::to_string(&self.params)
            .map(|s| s.len())
            .unwrap_or(0);
        if len > MAX_TOOL_PARAMS_LEN {
            return Err(CoreError::ToolExecution {
                name: self.tool.clone(),
                message: format!("tool parameters too large ({len} bytes, max {MAX_TOOL_PARAMS_LEN})"),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_descriptor_defaults() {
        let desc = ToolDescriptor::new("calculator", "Evaluate arithmetic expressions");
        assert_eq!(desc.name, "calculator");
        assert_eq!(desc.max_execution, Duration::from_secs(30));
        assert_eq!(desc.max_identical_calls, 3);
        assert!(desc.active);
    }

    #[test]
    fn test_descriptor_overrides() {
        let desc = ToolDescriptor::new("slow", "slow tool")
            .with_max_execution(Duration::from_secs(5))
            .with_max_identical_calls(1)
            .inactive();
        assert_eq!(desc.max_execution, Duration::from_secs(5));
        assert_eq!(desc.max_identical_calls, 1);
        assert!(!desc.active);
    }

    #[test]
    fn test_canonical_key_ignores_insertion_order() {
        let mut a = ToolParams::new();
        a.insert("x".to_string(), json!(1));
        a.insert("y".to_string(), json!("two"));

        let mut b = ToolParams::new();
        b.insert("y".to_string(), json!("two"));
        b.insert("x".to_string(), json!(1));

        let call_a = ToolCall {
            tool: "calculator".to_string(),
            params: a,
        };
        let call_b = ToolCall {
            tool: "calculator".to_string(),
            params: b,
        };
        assert_eq!(call_a.canonical_key(), call_b.canonical_key());
    }

    #[test]
    fn test_canonical_key_distinguishes_params() {
        let mut a = ToolParams::new();
        a.insert("x".to_string(), json!(1));
        let mut b = ToolParams::new();
        b.insert("x".to_string(), json!(2));

        let call_a = ToolCall {
            tool: "calculator".to_string(),
            params: a,
        };
        let call_b = ToolCall {
            tool: "calculator".to_string(),
            params: b,
        };
        assert_ne!(call_a.canonical_key(), call_b.canonical_key());
    }

    #[test]
    fn test_tool_call_deserialization_defaults_params() {
        let call: ToolCall = serde_json::from_str(r#"{"tool":"search"}"#)
            .unwrap_or_else(|e| panic!("parse: {e}"));
        assert_eq!(call.tool, "search");
        assert!(call.params.is_empty());
    }

    #[test]
    fn test_params_len_bound() {
        let mut params = ToolParams::new();
        params.insert("blob".to_string(), json!("x".repeat(MAX_TOOL_PARAMS_LEN)));
        let call = ToolCall {
            tool: "search".to_string(),
            params,
        };
        assert!(call.check_params_len().is_err());
    }
}
