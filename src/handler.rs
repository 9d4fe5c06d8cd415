//! Agent handler seam between the engine and agent implementations.
//!
//! Every registered agent implements [`AgentHandler`]. Two handler
//! flavors ship with the crate: [`PromptAgent`], a specialized handler
//! backed by a single reasoning call with its own template, and
//! [`GeneralistAgent`], which runs the bounded tool-calling loop.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::audit::ExecutionAuditor;
use crate::config::EngineConfig;
use crate::conversation::ConversationTurn;
use crate::error::CoreError;
use crate::prompt::build_agent_prompt;
use crate::provider::ReasoningClient;
use crate::react::ToolExecutor;
use crate::state::AgentOutputs;

/// Per-invocation context handed to a handler.
///
/// An owned snapshot: `prior_outputs` is the read-only view of what
/// earlier agents in the chain produced, frozen at dispatch time.
#[derive(Clone)]
pub struct AgentContext {
    /// The user's query text.
    pub query: String,
    /// Prior conversation turns.
    pub conversation: Vec<ConversationTurn>,
    /// Outputs produced by earlier agents in this run.
    pub prior_outputs: AgentOutputs,
    /// Audit trail for this run.
    pub audit: Arc<ExecutionAuditor>,
    /// Run-scoped cancellation signal.
    pub cancel: CancellationToken,
}

impl AgentContext {
    /// Creates a context with no prior outputs and a fresh cancel token.
    /// Primarily for driving a handler outside the engine (tests, direct
    /// embedding).
    #[must_use]
    pub fn new(query: impl Into<String>, conversation: Vec<ConversationTurn>) -> Self {
        Self {
            query: query.into(),
            conversation,
            prior_outputs: AgentOutputs::new(),
            audit: Arc::new(ExecutionAuditor::new()),
            cancel: CancellationToken::new(),
        }
    }
}

impl std::fmt::Debug for AgentContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentContext")
            .field("query", &self.query)
            .field("conversation_turns", &self.conversation.len())
            .field("prior_outputs", &self.prior_outputs.len())
            .finish()
    }
}

/// Trait implemented by every agent handler.
///
/// Handlers encapsulate one specialized capability behind a reasoning
/// call. The engine resolves a handler from the registry and calls
/// [`AgentHandler::handle`] with a per-invocation context snapshot.
#[async_trait]
pub trait AgentHandler: Send + Sync {
    /// Handler name for logging and audit attribution.
    fn name(&self) -> &str;

    /// Handles one request.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError`] on reasoning or tool failures. The engine
    /// contains the error per the enclosing workflow's failure policy;
    /// handlers never need to recover themselves.
    async fn handle(&self, ctx: &AgentContext) -> Result<String, CoreError>;
}

/// A specialized agent backed by a single reasoning call.
///
/// Holds its own system prompt; the per-call user message is built from
/// the query, conversation, and shared chain outputs.
pub struct PromptAgent {
    name: String,
    system_prompt: String,
    client: Arc<dyn ReasoningClient>,
    max_tokens: u32,
}

impl PromptAgent {
    /// Creates a prompt agent with the engine's per-agent token budget.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        system_prompt: impl Into<String>,
        client: Arc<dyn ReasoningClient>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            name: name.into(),
            system_prompt: system_prompt.into(),
            client,
            max_tokens: config.agent_max_tokens,
        }
    }
}

#[async_trait]
impl AgentHandler for PromptAgent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, ctx: &AgentContext) -> Result<String, CoreError> {
        let prompt = build_agent_prompt(
            &self.system_prompt,
            &ctx.query,
            &ctx.conversation,
            &ctx.prior_outputs,
        );
        tokio::select! {
            biased;
            () = ctx.cancel.cancelled() => Err(CoreError::Cancelled),
            result = self.client.complete(&prompt, self.max_tokens) => result,
        }
    }
}

impl std::fmt::Debug for PromptAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PromptAgent")
            .field("name", &self.name)
            .field("client", &self.client.name())
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

/// The generalist agent: answers by driving the tool-calling loop.
#[derive(Debug)]
pub struct GeneralistAgent {
    name: String,
    executor: ToolExecutor,
}

impl GeneralistAgent {
    /// Creates a generalist agent around a configured tool executor.
    #[must_use]
    pub fn new(name: impl Into<String>, executor: ToolExecutor) -> Self {
        Self {
            name: name.into(),
            executor,
        }
    }
}

#[async_trait]
impl AgentHandler for GeneralistAgent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, ctx: &AgentContext) -> Result<String, CoreError> {
        let run = self.executor.run(&self.name, ctx).await?;
        Ok(run.answer)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::conversation::user_turn;

    struct StaticClient(&'static str);

    #[async_trait]
    impl ReasoningClient for StaticClient {
        fn name(&self) -> &'static str {
            "static"
        }

        async fn complete(&self, _prompt: &str, _max_tokens: u32) -> Result<String, CoreError> {
            Ok(self.0.to_string())
        }
    }

    struct FailingClient;

    #[async_trait]
    impl ReasoningClient for FailingClient {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn complete(&self, _prompt: &str, _max_tokens: u32) -> Result<String, CoreError> {
            Err(CoreError::Reasoning {
                message: "backend down".to_string(),
            })
        }
    }

    fn config() -> EngineConfig {
        EngineConfig::default()
    }

    #[tokio::test]
    async fn test_prompt_agent_completes() {
        let agent = PromptAgent::new(
            "summary",
            "Summarize the shared context.",
            Arc::new(StaticClient("a short summary")),
            &config(),
        );
        let ctx = AgentContext::new("summarize this", vec![user_turn("earlier turn")]);
        let output = agent
            .handle(&ctx)
            .await
            .unwrap_or_else(|e| panic!("handle: {e}"));
        assert_eq!(output, "a short summary");
        assert_eq!(agent.name(), "summary");
    }

    #[tokio::test]
    async fn test_prompt_agent_propagates_reasoning_error() {
        let agent = PromptAgent::new("summary", "p", Arc::new(FailingClient), &config());
        let ctx = AgentContext::new("q", Vec::new());
        let result = agent.handle(&ctx).await;
        assert!(matches!(result, Err(CoreError::Reasoning { .. })));
    }

    #[tokio::test]
    async fn test_prompt_agent_respects_cancellation() {
        let agent = PromptAgent::new("summary", "p", Arc::new(StaticClient("late")), &config());
        let ctx = AgentContext::new("q", Vec::new());
        ctx.cancel.cancel();
        let result = agent.handle(&ctx).await;
        assert!(matches!(result, Err(CoreError::Cancelled)));
    }
}
