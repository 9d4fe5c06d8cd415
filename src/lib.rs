//! Multi-agent workflow orchestration core.
//!
//! One conversational request is classified into a workflow shape and
//! handled by one or more specialized agents — or by a generalist agent
//! driving a bounded tool-calling loop — returning a structured result
//! plus an audit trail. The reasoning backend, the tools, and the caller's
//! transport layer are all injected collaborators.
//!
//! # Architecture
//!
//! ```text
//! WorkflowRequest → WorkflowEngine
//!   ├── IntentClassifier (one reasoning call → agents + shape,
//!   │                     deterministic fallback on any failure)
//!   ├── Single     → one AgentHandler
//!   ├── Sequential → up to 5 handlers in order, sharing prior outputs;
//!   │                first failure stops the chain (partial)
//!   ├── Parallel   → up to 3 handlers concurrently, independent failures,
//!   │                fan-in barrier, mutex-serialized aggregation
//!   └── ExecutionAuditor → append-only step log, merged into the result
//!
//! GeneralistAgent → ToolExecutor (Thought → Action → Observation,
//!   max 5 iterations, 30s per tool call, identical-call limit 3)
//! ```
//!
//! Everything runs under one hard wall-clock budget (5 minutes by
//! default); exhausting it cancels in-flight work cooperatively and the
//! caller still receives a well-formed [`WorkflowResult`] with status
//! `timeout`.

pub mod audit;
pub mod classifier;
pub mod config;
pub mod conversation;
pub mod engine;
pub mod error;
pub mod handler;
pub mod prompt;
pub mod provider;
pub mod react;
pub mod registry;
pub mod state;
pub mod tool;

// Re-export key types
pub use audit::{ExecutionAuditor, ExecutionStep, StepKind, StepOutcome};
pub use classifier::{IntentClassifier, RoutingDecision};
pub use config::EngineConfig;
pub use conversation::{ConversationTurn, Role, WorkflowRequest, assistant_turn, user_turn};
pub use engine::WorkflowEngine;
pub use error::CoreError;
pub use handler::{AgentContext, AgentHandler, GeneralistAgent, PromptAgent};
pub use prompt::PromptSet;
pub use provider::ReasoningClient;
pub use react::{ReactDecision, ReactRun, ToolExecutor};
pub use registry::{AgentDescriptor, AgentRegistry, ToolRegistry};
pub use state::{
    AgentFailure, AgentOutput, AgentOutputs, WorkflowResult, WorkflowStatus, WorkflowType,
};
pub use tool::{Tool, ToolCall, ToolDescriptor, ToolParams};
