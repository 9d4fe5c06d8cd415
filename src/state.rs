//! Workflow shapes, per-run state, and the result returned to callers.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::audit::ExecutionStep;

/// How many agents a workflow dispatched and in what order/concurrency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowType {
    /// One agent handles the whole request.
    Single,
    /// Up to five agents run strictly in order, sharing prior outputs.
    Sequential,
    /// Up to three agents run concurrently with independent failures.
    Parallel,
}

impl WorkflowType {
    /// Parses the classifier's workflow-type token.
    #[must_use]
    pub fn parse(token: &str) -> Option<Self> {
        match token.trim() {
            "single" => Some(Self::Single),
            "sequential" => Some(Self::Sequential),
            "parallel" => Some(Self::Parallel),
            _ => None,
        }
    }

    /// Lowercase token name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::Sequential => "sequential",
            Self::Parallel => "parallel",
        }
    }
}

/// Workflow-level outcome surfaced to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowStatus {
    /// Every dispatched agent produced an output.
    Success,
    /// Some outputs were gathered, but the workflow did not complete
    /// cleanly (sequential chain cut short, or parallel slots failed).
    Partial,
    /// The wall-clock budget elapsed before completion.
    Timeout,
    /// Nothing usable was produced.
    Error,
}

/// One agent's output, keyed by agent name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentOutput {
    /// Producing agent.
    pub agent: String,
    /// Output text.
    pub output: String,
}

/// Outputs gathered during a run.
///
/// Keys are unique and entries are kept in completion order, so the
/// sequence doubles as the completion timeline under parallel fan-out.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentOutputs(Vec<AgentOutput>);

impl AgentOutputs {
    /// Creates an empty collection.
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Appends an output. A duplicate agent name keeps the first entry;
    /// completion order is never rewritten.
    pub fn insert(&mut self, agent: impl Into<String>, output: impl Into<String>) {
        let agent = agent.into();
        if self.get(&agent).is_none() {
            self.0.push(AgentOutput {
                agent,
                output: output.into(),
            });
        }
    }

    /// Looks up an output by agent name.
    #[must_use]
    pub fn get(&self, agent: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|o| o.agent == agent)
            .map(|o| o.output.as_str())
    }

    /// Agent names in completion order.
    #[must_use]
    pub fn agents(&self) -> Vec<&str> {
        self.0.iter().map(|o| o.agent.as_str()).collect()
    }

    /// Iterates entries in completion order.
    pub fn iter(&self) -> impl Iterator<Item = &AgentOutput> {
        self.0.iter()
    }

    /// Number of outputs gathered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if no outputs were gathered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'a> IntoIterator for &'a AgentOutputs {
    type Item = &'a AgentOutput;
    type IntoIter = std::slice::Iter<'a, AgentOutput>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// A recorded agent-level failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentFailure {
    /// Agent (or pseudo-source such as `"request"`) that failed.
    pub agent: String,
    /// Failure description.
    pub error: String,
}

/// Mutable state for the lifetime of one orchestration run.
///
/// Never shared across requests: the engine creates one per incoming
/// request and guards it with a mutex only because parallel fan-out
/// writes into it concurrently.
#[derive(Debug, Default)]
pub struct WorkflowState {
    workflow: Option<WorkflowType>,
    /// Agent currently being dispatched (diagnostic).
    pub current_agent: Option<String>,
    /// Outputs gathered so far, completion order.
    pub outputs: AgentOutputs,
    /// Agent-level failures gathered so far.
    pub errors: Vec<AgentFailure>,
    /// Whether classification took the fallback route.
    pub fallback_used: bool,
}

impl WorkflowState {
    /// Creates an empty run state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fixes the workflow shape after classification. The shape is set
    /// exactly once; later calls are ignored.
    pub fn fix_workflow(&mut self, workflow: WorkflowType) {
        if self.workflow.is_none() {
            self.workflow = Some(workflow);
        }
    }

    /// Workflow shape, once classification completed.
    #[must_use]
    pub const fn workflow(&self) -> Option<WorkflowType> {
        self.workflow
    }

    /// Records an agent failure.
    pub fn record_failure(&mut self, agent: impl Into<String>, error: &crate::error::CoreError) {
        self.errors.push(AgentFailure {
            agent: agent.into(),
            error: error.to_string(),
        });
    }
}

/// Final, immutable result of one orchestration run.
///
/// Plain serializable data with no framework dependency; the caller
/// always receives one of these, even on total failure.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowResult {
    /// Workflow-level outcome.
    pub status: WorkflowStatus,
    /// Shape the run was classified into.
    pub workflow: WorkflowType,
    /// Whether classification fell back to the default route.
    pub fallback_used: bool,
    /// Outputs in completion order.
    pub outputs: AgentOutputs,
    /// Agent-level failures.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<AgentFailure>,
    /// Append-ordered audit trail.
    pub execution_log: Vec<ExecutionStep>,
    /// Total wall-clock time for the run.
    #[serde(with = "crate::audit::duration_secs")]
    pub elapsed: Duration,
}
