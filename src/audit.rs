//! Execution audit trail.
//!
//! Every agent invocation and every tool-loop iteration appends one
//! [`ExecutionStep`], success or failure. The auditor never errors and
//! never blocks the critical path: steps land in an in-memory buffer and
//! are optionally forwarded best-effort to an external sink.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

/// Maximum byte length of a step payload preview.
const MAX_PAYLOAD_LEN: usize = 2_000;

/// What kind of work a step records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    /// A reasoning step inside the tool-calling loop.
    Thought,
    /// A tool invocation request.
    Action,
    /// A tool result (or error/timeout marker).
    Observation,
    /// One agent handler dispatch by the engine.
    AgentInvocation,
}

/// How a step ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepOutcome {
    /// The step completed normally.
    Success,
    /// The step failed.
    Error,
    /// The step was aborted on a time budget.
    Timeout,
}

/// One immutable record in the execution log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionStep {
    /// Iteration index: 1-based loop iteration for tool-loop steps,
    /// 1-based dispatch ordinal for agent invocations.
    pub iteration: usize,
    /// Step kind.
    pub kind: StepKind,
    /// Agent this step belongs to, when attributable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    /// Payload preview (thought text, tool call, observation, output).
    pub payload: String,
    /// Offset from the start of the run. Monotonically non-decreasing
    /// across the log.
    #[serde(with = "duration_secs")]
    pub at: Duration,
    /// How the step ended.
    pub outcome: StepOutcome,
}

/// Append-only collector for [`ExecutionStep`] records.
///
/// One auditor exists per orchestration run. Appends are serialized
/// through an internal lock, which also assigns the monotonic `at`
/// offsets; under parallel fan-out this is the single-writer point for
/// the log. An optional unbounded sink forwards each step to an external
/// audit collaborator; send failures are ignored.
#[derive(Debug)]
pub struct ExecutionAuditor {
    started: Instant,
    steps: Mutex<Vec<ExecutionStep>>,
    sink: Option<UnboundedSender<ExecutionStep>>,
}

impl ExecutionAuditor {
    /// Creates an auditor with no external sink.
    #[must_use]
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            steps: Mutex::new(Vec::new()),
            sink: None,
        }
    }

    /// Creates an auditor that forwards each step to `sink` best-effort.
    #[must_use]
    pub fn with_sink(sink: UnboundedSender<ExecutionStep>) -> Self {
        Self {
            started: Instant::now(),
            steps: Mutex::new(Vec::new()),
            sink: Some(sink),
        }
    }

    /// Appends one step. Never errors; a closed sink is ignored.
    pub fn record(
        &self,
        iteration: usize,
        kind: StepKind,
        agent: Option<&str>,
        payload: &str,
        outcome: StepOutcome,
    ) {
        // The offset is read under the append lock so offsets are
        // monotonic in append order.
        let mut guard = self.steps.lock().unwrap_or_else(|e| e.into_inner());
        let step = ExecutionStep {
            iteration,
            kind,
            agent: agent.map(str::to_string),
            payload: truncate_payload(payload),
            at: self.started.elapsed(),
            outcome,
        };
        debug!(
            iteration,
            kind = ?step.kind,
            agent = step.agent.as_deref().unwrap_or("-"),
            outcome = ?step.outcome,
            "execution step"
        );
        if let Some(sink) = &self.sink {
            let _ = sink.send(step.clone());
        }
        guard.push(step);
    }

    /// Returns a snapshot of all steps recorded so far, in append order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<ExecutionStep> {
        self.steps
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Number of steps recorded so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Returns `true` if no steps have been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ExecutionAuditor {
    fn default() -> Self {
        Self::new()
    }
}

/// Truncates a payload to the preview bound at a char boundary.
fn truncate_payload(payload: &str) -> String {
    if payload.len() <= MAX_PAYLOAD_LEN {
        return payload.to_string();
    }
    let mut end = MAX_PAYLOAD_LEN;
    while !payload.is_char_boundary(end) {
        end -= 1;
    }
    payload[..end].to_string()
}

/// Serde helpers for `Duration` fields encoded as fractional seconds.
pub mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    /// Serializes a duration as `f64` seconds.
    #[allow(clippy::trivially_copy_pass_by_ref)]
    pub fn serialize<S>(d: &Duration, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        s.serialize_f64(d.as_secs_f64())
    }

    /// Deserializes a duration from `f64` seconds.
    pub fn deserialize<'de, D>(d: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(d)?;
        if !secs.is_finite() {
            return Ok(Duration::ZERO);
        }
        Ok(Duration::from_secs_f64(secs.max(0.0)))
    }
}
