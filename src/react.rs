//! Bounded tool-calling loop (Thought → Action → Observation).
//!
//! Drives the reasoning ↔ tool round-trip for one generalist run: each
//! iteration asks the reasoning backend for a JSON decision, executes the
//! requested tool under a per-call time budget, and feeds the result back
//! as the next observation. The loop is strictly bounded: by the
//! iteration cap, by per-tool identical-call limits, and by the run's
//! cancellation token.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::audit::{StepKind, StepOutcome};
use crate::config::EngineConfig;
use crate::error::CoreError;
use crate::handler::AgentContext;
use crate::prompt::{PromptSet, build_react_prompt};
use crate::provider::ReasoningClient;
use crate::registry::ToolRegistry;
use crate::tool::ToolCall;

/// One parsed reasoning step: a tool invocation plan or a final answer.
///
/// Parsing is lenient by design — a reply that is not the expected JSON
/// object is treated as a final answer in prose, never as an error.
/// When a reply carries both an answer and an action, the answer wins
/// and the run terminates.
#[derive(Debug, Clone, Default)]
pub struct ReactDecision {
    /// The model's reasoning for this step.
    pub thought: Option<String>,
    /// Requested tool invocation.
    pub action: Option<ToolCall>,
    /// Final answer, terminating the run.
    pub answer: Option<String>,
}

#[derive(Deserialize)]
struct RawDecision {
    #[serde(default)]
    thought: Option<String>,
    #[serde(default)]
    action: Option<ToolCall>,
    #[serde(default)]
    answer: Option<String>,
}

impl ReactDecision {
    /// Parses a reasoning reply into a decision.
    ///
    /// Markdown code fences are stripped first. Invalid JSON — or a JSON
    /// object carrying neither thought, action, nor answer — falls back
    /// to treating the whole reply as the final answer.
    #[must_use]
    pub fn parse(content: &str) -> Self {
        let trimmed = content.trim();

        // Handle markdown code blocks
        let json_str = if trimmed.starts_with("```") {
            trimmed
                .trim_start_matches("```json")
                .trim_start_matches("```")
                .trim_end_matches("```")
                .trim()
        } else {
            trimmed
        };

        match serde_json::from_str::<RawDecision>(json_str) {
            Ok(raw) if raw.thought.is_some() || raw.action.is_some() || raw.answer.is_some() => {
                Self {
                    thought: raw.thought,
                    action: raw.action,
                    answer: raw.answer,
                }
            }
            _ => Self {
                thought: None,
                action: None,
                answer: Some(trimmed.to_string()),
            },
        }
    }
}

/// Outcome of one tool-calling run.
#[derive(Debug, Clone)]
pub struct ReactRun {
    /// Final answer, or the best available partial answer when the
    /// iteration cap was reached (last observation, else last thought).
    pub answer: String,
    /// Iterations consumed (1-based; never exceeds the configured cap).
    pub iterations: usize,
    /// `false` when the cap was reached before a final answer. Not an
    /// error either way.
    pub completed: bool,
}

/// Runs the bounded tool-calling loop for one agent.
pub struct ToolExecutor {
    client: Arc<dyn ReasoningClient>,
    tools: Arc<ToolRegistry>,
    system_prompt: String,
    max_iterations: usize,
    max_tokens: u32,
}

impl ToolExecutor {
    /// Creates an executor bound to a reasoning backend and tool registry.
    #[must_use]
    pub fn new(
        client: Arc<dyn ReasoningClient>,
        tools: Arc<ToolRegistry>,
        config: &EngineConfig,
        prompts: &PromptSet,
    ) -> Self {
        Self {
            client,
            tools,
            system_prompt: prompts.react.clone(),
            max_iterations: config.max_react_iterations,
            max_tokens: config.react_max_tokens,
        }
    }

    /// Runs the loop until a final answer, a terminal error, or the
    /// iteration cap.
    ///
    /// Reaching the cap is NOT an error: the run resolves to the best
    /// available partial answer with `completed = false`. Per-call tool
    /// timeouts and tool failures are recorded as observations and the
    /// loop continues; only an unknown/inactive tool, an identical call
    /// past its repeat limit, a reasoning failure, or cancellation
    /// terminate the run with an error.
    ///
    /// Every thought, action, and observation appends one audit step,
    /// regardless of outcome.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownTool`]/[`CoreError::InactiveTool`]
    /// (configuration errors, not retried),
    /// [`CoreError::RepeatedToolCall`], [`CoreError::Reasoning`], or
    /// [`CoreError::Cancelled`].
    pub async fn run(&self, agent: &str, ctx: &AgentContext) -> Result<ReactRun, CoreError> {
        let roster = self.tools.roster();
        let mut transcript: Vec<String> = Vec::new();
        let mut call_counts: HashMap<String, u32> = HashMap::new();
        let mut last_thought = String::new();
        let mut last_observation: Option<String> = None;

        for iteration in 1..=self.max_iterations {
            let prompt = build_react_prompt(
                &self.system_prompt,
                &ctx.query,
                &ctx.conversation,
                &ctx.prior_outputs,
                &roster,
                &transcript,
            );

            let reply = tokio::select! {
                biased;
                () = ctx.cancel.cancelled() => return Err(CoreError::Cancelled),
                result = self.client.complete(&prompt, self.max_tokens) => result,
            };
            let reply = match reply {
                Ok(reply) => reply,
                Err(e) => {
                    ctx.audit.record(
                        iteration,
                        StepKind::Thought,
                        Some(agent),
                        &e.to_string(),
                        StepOutcome::Error,
                    );
                    return Err(e);
                }
            };

            let decision = ReactDecision::parse(&reply);
            let thought = decision.thought.clone().unwrap_or_default();
            if !thought.is_empty() {
                last_thought.clone_from(&thought);
                transcript.push(format!("thought: {thought}"));
            }
            ctx.audit.record(
                iteration,
                StepKind::Thought,
                Some(agent),
                if thought.is_empty() { &reply } else { &thought },
                StepOutcome::Success,
            );

            if let Some(answer) = decision.answer {
                debug!(iteration, agent, "tool loop produced final answer");
                return Ok(ReactRun {
                    answer,
                    iterations: iteration,
                    completed: true,
                });
            }

            let Some(call) = decision.action else {
                // Thought without a plan: let the next iteration decide.
                continue;
            };

            let params_json = serde_json::to_string(&call.params).unwrap_or_default();
            transcript.push(format!("action: {} {params_json}", call.tool));

            match self
                .execute_call(agent, ctx, iteration, &call, &mut call_counts)
                .await?
            {
                Some(observation) => {
                    transcript.push(format!("observation: {observation}"));
                    last_observation = Some(observation);
                }
                None => continue,
            }
        }

        warn!(
            agent,
            max_iterations = self.max_iterations,
            "tool loop reached iteration cap without final answer"
        );
        Ok(ReactRun {
            answer: last_observation.unwrap_or(last_thought),
            iterations: self.max_iterations,
            completed: false,
        })
    }

    /// Executes one requested tool call.
    ///
    /// Returns the observation text to feed into the next iteration, or
    /// `None` when the call was rejected before execution in a way the
    /// loop survives (oversized parameters). Terminal conditions bubble
    /// up as errors.
    async fn execute_call(
        &self,
        agent: &str,
        ctx: &AgentContext,
        iteration: usize,
        call: &ToolCall,
        call_counts: &mut HashMap<String, u32>,
    ) -> Result<Option<String>, CoreError> {
        let (descriptor, tool) = match self.tools.resolve(&call.tool) {
            Ok(resolved) => resolved,
            Err(e) => {
                // Unknown or disabled tool is a configuration error:
                // recorded, then terminal for the run.
                ctx.audit.record(
                    iteration,
                    StepKind::Action,
                    Some(agent),
                    &e.to_string(),
                    StepOutcome::Error,
                );
                return Err(e);
            }
        };

        let count = call_counts.entry(call.canonical_key()).or_insert(0);
        *count += 1;
        if *count > descriptor.max_identical_calls {
            let e = CoreError::RepeatedToolCall {
                name: call.tool.clone(),
                limit: descriptor.max_identical_calls,
            };
            ctx.audit.record(
                iteration,
                StepKind::Action,
                Some(agent),
                &e.to_string(),
                StepOutcome::Error,
            );
            return Err(e);
        }

        if let Err(e) = call.check_params_len() {
            ctx.audit.record(
                iteration,
                StepKind::Action,
                Some(agent),
                &e.to_string(),
                StepOutcome::Error,
            );
            return Ok(Some(format!("error: {e}")));
        }

        let params_json = serde_json::to_string(&call.params).unwrap_or_default();
        ctx.audit.record(
            iteration,
            StepKind::Action,
            Some(agent),
            &format!("{} {params_json}", call.tool),
            StepOutcome::Success,
        );

        let invocation = tokio::time::timeout(descriptor.max_execution, tool.invoke(&call.params));
        let outcome = tokio::select! {
            biased;
            () = ctx.cancel.cancelled() => return Err(CoreError::Cancelled),
            result = invocation => result,
        };

        let observation = match outcome {
            Ok(Ok(result)) => {
                ctx.audit.record(
                    iteration,
                    StepKind::Observation,
                    Some(agent),
                    &result,
                    StepOutcome::Success,
                );
                result
            }
            Ok(Err(e)) => {
                // Tool failures are contained: the error becomes the
                // observation and the loop moves on.
                ctx.audit.record(
                    iteration,
                    StepKind::Observation,
                    Some(agent),
                    &e.to_string(),
                    StepOutcome::Error,
                );
                format!("error: {e}")
            }
            Err(_elapsed) => {
                let e = CoreError::ToolTimeout {
                    name: call.tool.clone(),
                    timeout_secs: descriptor.max_execution.as_secs(),
                };
                debug!(tool = %call.tool, agent, "tool call timed out");
                ctx.audit.record(
                    iteration,
                    StepKind::Observation,
                    Some(agent),
                    &e.to_string(),
                    StepOutcome::Timeout,
                );
                e.to_string()
            }
        };

        Ok(Some(observation))
    }
}

impl std::fmt::Debug for ToolExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolExecutor")
            .field("client", &self.client.name())
            .field("tools", &self.tools)
            .field("max_iterations", &self.max_iterations)
            .finish()
    }
}
