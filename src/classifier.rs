//! Intent classification: which agent(s), in which workflow shape.
//!
//! One reasoning call whose reply is a small delimited token rather than
//! prose. Anything that fails — the call itself, the parse, or registry
//! validation — falls back deterministically to the configured default
//! agent with a single-agent shape. Classification never errors a
//! request and never mutates shared state.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::conversation::ConversationTurn;
use crate::error::CoreError;
use crate::prompt::{PromptSet, build_classifier_prompt};
use crate::provider::ReasoningClient;
use crate::registry::AgentRegistry;
use crate::state::WorkflowType;

/// Routing decision produced by classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingDecision {
    /// Agents to dispatch, in chain order.
    pub agents: Vec<String>,
    /// Workflow shape.
    pub workflow: WorkflowType,
    /// `true` when the deterministic fallback route was taken.
    pub fallback: bool,
}

/// Classifies a request into a routing decision.
pub struct IntentClassifier {
    client: Arc<dyn ReasoningClient>,
    system_prompt: String,
    fallback_agent: String,
    max_tokens: u32,
}

impl IntentClassifier {
    /// Creates a classifier bound to a reasoning backend.
    #[must_use]
    pub fn new(
        client: Arc<dyn ReasoningClient>,
        config: &EngineConfig,
        prompts: &PromptSet,
    ) -> Self {
        Self {
            client,
            system_prompt: prompts.classifier.clone(),
            fallback_agent: config.fallback_agent.clone(),
            max_tokens: config.classifier_max_tokens,
        }
    }

    /// Classifies a query against the registry's active roster.
    ///
    /// Expected reply: `<agent>[,<agent>...]|<single|sequential|parallel>`.
    /// Every failure mode resolves to the fallback route; a fixed
    /// malformed reply always yields the same decision.
    pub async fn classify(
        &self,
        query: &str,
        conversation: &[ConversationTurn],
        registry: &AgentRegistry,
    ) -> RoutingDecision {
        let roster = registry.roster();
        let prompt = build_classifier_prompt(&self.system_prompt, query, conversation, &roster);

        let reply = match self.client.complete(&prompt, self.max_tokens).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(error = %e, "classification call failed, using fallback route");
                return self.fallback();
            }
        };

        match Self::parse_route(&reply) {
            Ok((agents, workflow)) => {
                if let Some(bad) = agents.iter().find(|name| !registry.is_active(name)) {
                    warn!(
                        agent = %bad,
                        "classifier chose an unknown or inactive agent, using fallback route"
                    );
                    return self.fallback();
                }
                debug!(?workflow, agents = ?agents, "request classified");
                RoutingDecision {
                    agents,
                    workflow,
                    fallback: false,
                }
            }
            Err(e) => {
                warn!(error = %e, reply = %reply, "unparseable classifier reply, using fallback route");
                self.fallback()
            }
        }
    }

    /// The deterministic fallback route: default agent, single shape.
    #[must_use]
    pub fn fallback(&self) -> RoutingDecision {
        RoutingDecision {
            agents: vec![self.fallback_agent.clone()],
            workflow: WorkflowType::Single,
            fallback: true,
        }
    }

    /// Parses the delimited routing token.
    ///
    /// Strips markdown code fences, reads the first non-empty line, and
    /// splits it into an agent list and a workflow type. Duplicate agent
    /// names are collapsed, preserving first occurrence order.
    fn parse_route(reply: &str) -> Result<(Vec<String>, WorkflowType), CoreError> {
        let trimmed = reply.trim();

        // Handle markdown code blocks
        let stripped = if trimmed.starts_with("```") {
            trimmed
                .trim_start_matches("```")
                .trim_end_matches("```")
                .trim()
        } else {
            trimmed
        };

        let line = stripped
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .ok_or_else(|| CoreError::Classification {
                message: "empty reply".to_string(),
            })?;

        let (agents_part, type_part) =
            line.split_once('|').ok_or_else(|| CoreError::Classification {
                message: format!("missing '|' delimiter in {line:?}"),
            })?;

        let workflow =
            WorkflowType::parse(type_part).ok_or_else(|| CoreError::Classification {
                message: format!("unknown workflow type {type_part:?}"),
            })?;

        let mut agents: Vec<String> = Vec::new();
        for name in agents_part.split(',') {
            let name = name.trim();
            if name.is_empty() {
                continue;
            }
            if !agents.iter().any(|a| a == name) {
                agents.push(name.to_string());
            }
        }

        if agents.is_empty() {
            return Err(CoreError::Classification {
                message: "no agent named".to_string(),
            });
        }
        if workflow == WorkflowType::Single && agents.len() != 1 {
            return Err(CoreError::Classification {
                message: format!("single workflow with {} agents", agents.len()),
            });
        }

        Ok((agents, workflow))
    }
}

impl std::fmt::Debug for IntentClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntentClassifier")
            .field("client", &self.client.name())
            .field("fallback_agent", &self.fallback_agent)
            .finish()
    }
}
