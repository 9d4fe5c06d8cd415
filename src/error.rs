//! Error types for the orchestration core.
//!
//! One taxonomy covers both execution layers: workflow-level failures
//! (classification, agent dispatch, budget exhaustion) and leaf-level
//! failures inside the tool-calling loop. Leaf failures never cross the
//! caller boundary directly; the engine folds them into
//! [`WorkflowResult`](crate::state::WorkflowResult) entries.

use thiserror::Error;

/// Errors raised by the orchestration core.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The incoming request failed validation before any dispatch.
    #[error("invalid request: {message}")]
    InvalidRequest {
        /// What was wrong with the request.
        message: String,
    },

    /// Configuration failed validation at build time.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// What was wrong with the configuration.
        message: String,
    },

    /// Intent classification failed. Recovered internally via the
    /// deterministic fallback route; never surfaced to the caller.
    #[error("classification failed: {message}")]
    Classification {
        /// Why the classifier reply was unusable.
        message: String,
    },

    /// An agent handler returned an error.
    #[error("agent '{agent}' failed: {message}")]
    AgentExecution {
        /// Name of the failing agent.
        agent: String,
        /// Failure description.
        message: String,
    },

    /// No agent with this name is registered.
    #[error("unknown agent: {name}")]
    UnknownAgent {
        /// Requested agent name.
        name: String,
    },

    /// The agent exists but has been disabled by an admin operation.
    #[error("agent '{name}' is inactive")]
    InactiveAgent {
        /// Requested agent name.
        name: String,
    },

    /// An agent with this name is already registered.
    #[error("agent '{name}' is already registered")]
    DuplicateAgent {
        /// Conflicting agent name.
        name: String,
    },

    /// No tool with this name is registered.
    #[error("unknown tool: {name}")]
    UnknownTool {
        /// Requested tool name.
        name: String,
    },

    /// The tool exists but has been disabled by an admin operation.
    #[error("tool '{name}' is inactive")]
    InactiveTool {
        /// Requested tool name.
        name: String,
    },

    /// A tool with this name is already registered.
    #[error("tool '{name}' is already registered")]
    DuplicateTool {
        /// Conflicting tool name.
        name: String,
    },

    /// A tool call returned an error. Recorded as an observation; the
    /// tool-calling loop continues.
    #[error("tool '{name}' failed: {message}")]
    ToolExecution {
        /// Name of the failing tool.
        name: String,
        /// Failure description.
        message: String,
    },

    /// A tool call exceeded its per-call execution budget. Recorded as a
    /// timeout observation; the tool-calling loop continues.
    #[error("tool '{name}' timed out after {timeout_secs}s")]
    ToolTimeout {
        /// Name of the timed-out tool.
        name: String,
        /// Per-call budget that was exceeded, in seconds.
        timeout_secs: u64,
    },

    /// The same tool was requested with identical parameters past its
    /// repeat limit. Terminal for the tool-calling run.
    #[error("tool '{name}' repeated with identical parameters more than {limit} times")]
    RepeatedToolCall {
        /// Name of the repeated tool.
        name: String,
        /// Identical-invocation limit that was exceeded.
        limit: u32,
    },

    /// The reasoning backend failed to produce a completion.
    #[error("reasoning call failed: {message}")]
    Reasoning {
        /// Backend failure description.
        message: String,
    },

    /// Execution was cancelled cooperatively (workflow budget exhausted
    /// or caller-initiated shutdown).
    #[error("execution cancelled")]
    Cancelled,
}
