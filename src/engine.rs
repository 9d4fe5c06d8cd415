//! Top-level workflow engine.
//!
//! Entry point for one conversational request: classify the intent, then
//! run the resulting shape — one agent, a strict chain, or a bounded
//! fan-out — under a hard wall-clock budget. The state machine is an
//! explicit match over [`WorkflowType`]; the shapes are fixed, so there
//! is nothing to compile or plan.
//!
//! `execute` never returns an error: every leaf failure is folded into
//! the [`WorkflowResult`] and the caller always receives a well-formed
//! result, timeout included.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use futures_util::future::join_all;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::audit::{ExecutionAuditor, ExecutionStep, StepKind, StepOutcome};
use crate::classifier::IntentClassifier;
use crate::config::EngineConfig;
use crate::conversation::WorkflowRequest;
use crate::error::CoreError;
use crate::handler::AgentContext;
use crate::prompt::PromptSet;
use crate::provider::ReasoningClient;
use crate::registry::AgentRegistry;
use crate::state::{AgentOutputs, WorkflowResult, WorkflowState, WorkflowStatus, WorkflowType};

/// Maximum accepted query length in bytes.
const MAX_QUERY_LEN: usize = 10_000;

/// Pseudo-agent name used for failures that precede any dispatch.
const REQUEST_SOURCE: &str = "request";

/// Orchestrates one workflow run per incoming request.
///
/// Holds only injected dependencies: the reasoning backend (shared with
/// the classifier), the agent registry, and configuration. Per-request
/// state never outlives [`WorkflowEngine::execute`].
pub struct WorkflowEngine {
    agents: Arc<AgentRegistry>,
    classifier: IntentClassifier,
    config: EngineConfig,
    audit_sink: Option<UnboundedSender<ExecutionStep>>,
}

impl WorkflowEngine {
    /// Creates an engine from injected dependencies.
    ///
    /// Prompt templates are resolved once here, from the configured
    /// prompt directory with compiled-in fallbacks.
    #[must_use]
    pub fn new(
        client: Arc<dyn ReasoningClient>,
        agents: Arc<AgentRegistry>,
        config: EngineConfig,
    ) -> Self {
        let prompts = PromptSet::load(config.prompt_dir.as_deref());
        let classifier = IntentClassifier::new(client, &config, &prompts);
        Self {
            agents,
            classifier,
            config,
            audit_sink: None,
        }
    }

    /// Forwards every execution step of every run to `sink`, best-effort.
    #[must_use]
    pub fn with_audit_sink(mut self, sink: UnboundedSender<ExecutionStep>) -> Self {
        self.audit_sink = Some(sink);
        self
    }

    /// Executes one request to completion, budget permitting.
    ///
    /// Always returns a well-formed [`WorkflowResult`]; leaf failures are
    /// captured inside it, never thrown across this boundary. When the
    /// wall-clock budget elapses first, in-flight work is cancelled
    /// cooperatively and the result carries status `timeout` with
    /// whatever outputs had already landed.
    pub async fn execute(&self, request: &WorkflowRequest) -> WorkflowResult {
        let start = Instant::now();
        let auditor = Arc::new(self.audit_sink.as_ref().map_or_else(
            ExecutionAuditor::new,
            |sink| ExecutionAuditor::with_sink(sink.clone()),
        ));
        let state = Arc::new(Mutex::new(WorkflowState::new()));

        if let Err(e) = validate_request(request) {
            lock(&state).record_failure(REQUEST_SOURCE, &e);
            return Self::build_result(&state, &auditor, WorkflowStatus::Error, start);
        }

        let cancel = CancellationToken::new();
        let run = self.run_classified(request, &state, &auditor, &cancel);

        let status = match tokio::time::timeout(self.config.workflow_budget, run).await {
            Ok(status) => status,
            Err(_elapsed) => {
                warn!(
                    budget_secs = self.config.workflow_budget.as_secs(),
                    "workflow budget exhausted, cancelling in-flight work"
                );
                cancel.cancel();
                WorkflowStatus::Timeout
            }
        };

        Self::build_result(&state, &auditor, status, start)
    }

    /// Classifies the request and dispatches the resulting shape.
    async fn run_classified(
        &self,
        request: &WorkflowRequest,
        state: &Arc<Mutex<WorkflowState>>,
        auditor: &Arc<ExecutionAuditor>,
        cancel: &CancellationToken,
    ) -> WorkflowStatus {
        let decision = self
            .classifier
            .classify(&request.query, &request.conversation, &self.agents)
            .await;

        {
            let mut s = lock(state);
            s.fix_workflow(decision.workflow);
            s.fallback_used = decision.fallback;
        }
        debug!(workflow = decision.workflow.as_str(), agents = ?decision.agents, "dispatching workflow");

        match decision.workflow {
            WorkflowType::Single => {
                self.execute_single(&decision.agents[0], request, state, auditor, cancel)
                    .await
            }
            WorkflowType::Sequential => {
                self.execute_sequential(&decision.agents, request, state, auditor, cancel)
                    .await
            }
            WorkflowType::Parallel => {
                self.execute_parallel(&decision.agents, request, state, auditor, cancel)
                    .await
            }
        }
    }

    /// Invokes one agent: the single selected handler, no further dispatch.
    async fn execute_single(
        &self,
        agent: &str,
        request: &WorkflowRequest,
        state: &Arc<Mutex<WorkflowState>>,
        auditor: &Arc<ExecutionAuditor>,
        cancel: &CancellationToken,
    ) -> WorkflowStatus {
        lock(state).current_agent = Some(agent.to_string());
        let ctx = AgentContext {
            query: request.query.clone(),
            conversation: request.conversation.clone(),
            prior_outputs: AgentOutputs::new(),
            audit: Arc::clone(auditor),
            cancel: cancel.child_token(),
        };

        match self.invoke_agent(agent, 1, &ctx).await {
            Ok(output) => {
                lock(state).outputs.insert(agent, output);
                WorkflowStatus::Success
            }
            Err(e) => {
                lock(state).record_failure(agent, &e);
                WorkflowStatus::Error
            }
        }
    }

    /// Runs a strict chain: each agent sees all earlier outputs; the
    /// first failure stops the chain and keeps what was gathered.
    async fn execute_sequential(
        &self,
        agents: &[String],
        request: &WorkflowRequest,
        state: &Arc<Mutex<WorkflowState>>,
        auditor: &Arc<ExecutionAuditor>,
        cancel: &CancellationToken,
    ) -> WorkflowStatus {
        let cap = self.config.max_sequential_agents;
        if agents.len() > cap {
            warn!(requested = agents.len(), cap, "sequential chain truncated");
        }
        let chain = &agents[..agents.len().min(cap)];

        for (idx, agent) in chain.iter().enumerate() {
            // Snapshot of everything produced so far, frozen at call time.
            let prior_outputs = {
                let mut s = lock(state);
                s.current_agent = Some(agent.clone());
                s.outputs.clone()
            };
            let ctx = AgentContext {
                query: request.query.clone(),
                conversation: request.conversation.clone(),
                prior_outputs,
                audit: Arc::clone(auditor),
                cancel: cancel.child_token(),
            };

            match self.invoke_agent(agent, idx + 1, &ctx).await {
                Ok(output) => lock(state).outputs.insert(agent, output),
                Err(e) => {
                    // Stop-on-first-failure: no retry, no skip-forward.
                    warn!(agent = %agent, error = %e, "sequential chain stopped");
                    lock(state).record_failure(agent, &e);
                    return WorkflowStatus::Partial;
                }
            }
        }
        WorkflowStatus::Success
    }

    /// Fans out up to the parallel cap concurrently and joins at a
    /// barrier. Failures are independent: one failing slot never cancels
    /// its siblings.
    async fn execute_parallel(
        &self,
        agents: &[String],
        request: &WorkflowRequest,
        state: &Arc<Mutex<WorkflowState>>,
        auditor: &Arc<ExecutionAuditor>,
        cancel: &CancellationToken,
    ) -> WorkflowStatus {
        let cap = self.config.max_parallel_agents;
        if agents.len() > cap {
            warn!(requested = agents.len(), cap, "parallel fan-out truncated");
        }
        let fan = &agents[..agents.len().min(cap)];
        let dispatched = fan.len();

        let mut handles = Vec::with_capacity(dispatched);
        for (idx, agent) in fan.iter().enumerate() {
            let ordinal = idx + 1;
            // Resolution failures are configuration errors: recorded
            // immediately, slot never spawns.
            let (_descriptor, handler) = match self.agents.resolve(agent) {
                Ok(resolved) => resolved,
                Err(e) => {
                    auditor.record(
                        ordinal,
                        StepKind::AgentInvocation,
                        Some(agent.as_str()),
                        &e.to_string(),
                        StepOutcome::Error,
                    );
                    lock(state).record_failure(agent.as_str(), &e);
                    continue;
                }
            };

            let ctx = AgentContext {
                query: request.query.clone(),
                conversation: request.conversation.clone(),
                prior_outputs: AgentOutputs::new(),
                audit: Arc::clone(auditor),
                cancel: cancel.child_token(),
            };
            let agent = agent.clone();
            let state = Arc::clone(state);
            let auditor = Arc::clone(auditor);

            handles.push((agent.clone(), tokio::spawn(async move {
                let result = tokio::select! {
                    biased;
                    () = ctx.cancel.cancelled() => Err(CoreError::Cancelled),
                    result = handler.handle(&ctx) => result,
                };
                match result {
                    Ok(output) => {
                        auditor.record(
                            ordinal,
                            StepKind::AgentInvocation,
                            Some(agent.as_str()),
                            &output,
                            StepOutcome::Success,
                        );
                        // Aggregation is serialized through the state
                        // mutex; entries land in completion order.
                        lock(&state).outputs.insert(agent, output);
                    }
                    Err(e) => {
                        let outcome = if matches!(e, CoreError::Cancelled) {
                            StepOutcome::Timeout
                        } else {
                            StepOutcome::Error
                        };
                        auditor.record(
                            ordinal,
                            StepKind::AgentInvocation,
                            Some(agent.as_str()),
                            &e.to_string(),
                            outcome,
                        );
                        lock(&state).record_failure(agent, &e);
                    }
                }
            })));
        }

        // Fan-in barrier.
        let (names, joins): (Vec<String>, Vec<_>) = handles.into_iter().unzip();
        for (name, joined) in names.into_iter().zip(join_all(joins).await) {
            if let Err(e) = joined {
                let err = CoreError::AgentExecution {
                    agent: name.clone(),
                    message: format!("task join failed: {e}"),
                };
                lock(state).record_failure(name, &err);
            }
        }

        let succeeded = lock(state).outputs.len();
        if succeeded == dispatched {
            WorkflowStatus::Success
        } else if succeeded > 0 {
            WorkflowStatus::Partial
        } else {
            WorkflowStatus::Error
        }
    }

    /// Resolves and invokes one agent, recording the invocation step
    /// whatever the outcome.
    async fn invoke_agent(
        &self,
        agent: &str,
        ordinal: usize,
        ctx: &AgentContext,
    ) -> Result<String, CoreError> {
        let (_descriptor, handler) = match self.agents.resolve(agent) {
            Ok(resolved) => resolved,
            Err(e) => {
                ctx.audit.record(
                    ordinal,
                    StepKind::AgentInvocation,
                    Some(agent),
                    &e.to_string(),
                    StepOutcome::Error,
                );
                return Err(e);
            }
        };

        debug!(agent, ordinal, "dispatching agent");
        let result = tokio::select! {
            biased;
            () = ctx.cancel.cancelled() => Err(CoreError::Cancelled),
            result = handler.handle(ctx) => result,
        };

        match &result {
            Ok(output) => ctx.audit.record(
                ordinal,
                StepKind::AgentInvocation,
                Some(agent),
                output,
                StepOutcome::Success,
            ),
            Err(e) => {
                let outcome = if matches!(e, CoreError::Cancelled) {
                    StepOutcome::Timeout
                } else {
                    StepOutcome::Error
                };
                ctx.audit.record(
                    ordinal,
                    StepKind::AgentInvocation,
                    Some(agent),
                    &e.to_string(),
                    outcome,
                );
            }
        }
        result
    }

    /// Assembles the immutable result from the run state and audit trail.
    fn build_result(
        state: &Arc<Mutex<WorkflowState>>,
        auditor: &Arc<ExecutionAuditor>,
        status: WorkflowStatus,
        start: Instant,
    ) -> WorkflowResult {
        let s = lock(state);
        WorkflowResult {
            status,
            workflow: s.workflow().unwrap_or(WorkflowType::Single),
            fallback_used: s.fallback_used,
            outputs: s.outputs.clone(),
            errors: s.errors.clone(),
            execution_log: auditor.snapshot(),
            elapsed: start.elapsed(),
        }
    }
}

impl std::fmt::Debug for WorkflowEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowEngine")
            .field("agents", &self.agents)
            .field("classifier", &self.classifier)
            .field("config", &self.config)
            .finish()
    }
}

/// Locks the run state, recovering from poisoning.
fn lock(state: &Arc<Mutex<WorkflowState>>) -> std::sync::MutexGuard<'_, WorkflowState> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}

/// Validates the incoming request before any dispatch.
fn validate_request(request: &WorkflowRequest) -> Result<(), CoreError> {
    if request.query.trim().is_empty() {
        return Err(CoreError::InvalidRequest {
            message: "query cannot be empty".to_string(),
        });
    }
    if request.query.len() > MAX_QUERY_LEN {
        return Err(CoreError::InvalidRequest {
            message: format!(
                "query exceeds maximum length ({} bytes, max {MAX_QUERY_LEN})",
                request.query.len()
            ),
        });
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::handler::AgentHandler;
    use crate::registry::AgentDescriptor;

    use async_trait::async_trait;

    struct StaticClient(String);

    #[async_trait]
    impl ReasoningClient for StaticClient {
        fn name(&self) -> &'static str {
            "static"
        }

        async fn complete(&self, _prompt: &str, _max_tokens: u32) -> Result<String, CoreError> {
            Ok(self.0.clone())
        }
    }

    struct EchoHandler;

    #[async_trait]
    impl AgentHandler for EchoHandler {
        fn name(&self) -> &str {
            "echo"
        }

        async fn handle(&self, ctx: &AgentContext) -> Result<String, CoreError> {
            Ok(format!("echo: {}", ctx.query))
        }
    }

    struct FailingHandler;

    #[async_trait]
    impl AgentHandler for FailingHandler {
        fn name(&self) -> &str {
            "broken"
        }

        async fn handle(&self, _ctx: &AgentContext) -> Result<String, CoreError> {
            Err(CoreError::AgentExecution {
                agent: "broken".to_string(),
                message: "handler exploded".to_string(),
            })
        }
    }

    fn engine_with(reply: &str) -> WorkflowEngine {
        let registry = Arc::new(AgentRegistry::new());
        registry
            .register(AgentDescriptor::new("echo", "Echo", "test"), Arc::new(EchoHandler))
            .unwrap_or_else(|e| panic!("register: {e}"));
        registry
            .register(
                AgentDescriptor::new("broken", "Broken", "test"),
                Arc::new(FailingHandler),
            )
            .unwrap_or_else(|e| panic!("register: {e}"));
        WorkflowEngine::new(
            Arc::new(StaticClient(reply.to_string())),
            registry,
            EngineConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_single_success() {
        let engine = engine_with("echo|single");
        let result = engine.execute(&WorkflowRequest::new("hello")).await;

        assert_eq!(result.status, WorkflowStatus::Success);
        assert_eq!(result.workflow, WorkflowType::Single);
        assert!(!result.fallback_used);
        assert_eq!(result.outputs.get("echo"), Some("echo: hello"));
        assert!(result.errors.is_empty());
        assert_eq!(result.execution_log.len(), 1);
        assert_eq!(result.execution_log[0].kind, StepKind::AgentInvocation);
    }

    #[tokio::test]
    async fn test_single_failure_is_error() {
        let engine = engine_with("broken|single");
        let result = engine.execute(&WorkflowRequest::new("hello")).await;

        assert_eq!(result.status, WorkflowStatus::Error);
        assert!(result.outputs.is_empty());
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].agent, "broken");
    }

    #[tokio::test]
    async fn test_malformed_classification_routes_to_fallback() {
        let registry = Arc::new(AgentRegistry::new());
        registry
            .register(
                AgentDescriptor::new("generalist", "Generalist", "generalist"),
                Arc::new(EchoHandler),
            )
            .unwrap_or_else(|e| panic!("register: {e}"));
        let engine = WorkflowEngine::new(
            Arc::new(StaticClient("garbage".to_string())),
            registry,
            EngineConfig::default(),
        );

        let result = engine.execute(&WorkflowRequest::new("hello")).await;
        assert_eq!(result.status, WorkflowStatus::Success);
        assert!(result.fallback_used);
        assert_eq!(result.workflow, WorkflowType::Single);
        assert_eq!(result.outputs.agents(), vec!["generalist"]);
    }

    #[tokio::test]
    async fn test_unregistered_fallback_agent_is_error_not_panic() {
        let registry = Arc::new(AgentRegistry::new());
        registry
            .register(AgentDescriptor::new("echo", "Echo", "test"), Arc::new(EchoHandler))
            .unwrap_or_else(|e| panic!("register: {e}"));
        // Classifier reply is garbage and the fallback agent does not exist.
        let engine = WorkflowEngine::new(
            Arc::new(StaticClient("garbage".to_string())),
            registry,
            EngineConfig::default(),
        );

        let result = engine.execute(&WorkflowRequest::new("hello")).await;
        assert_eq!(result.status, WorkflowStatus::Error);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].error.contains("unknown agent"));
    }

    #[tokio::test]
    async fn test_empty_query_rejected() {
        let engine = engine_with("echo|single");
        let result = engine.execute(&WorkflowRequest::new("   ")).await;

        assert_eq!(result.status, WorkflowStatus::Error);
        assert_eq!(result.errors[0].agent, "request");
        assert!(result.execution_log.is_empty());
    }

    #[tokio::test]
    async fn test_oversized_query_rejected() {
        let engine = engine_with("echo|single");
        let result = engine
            .execute(&WorkflowRequest::new("x".repeat(MAX_QUERY_LEN + 1)))
            .await;
        assert_eq!(result.status, WorkflowStatus::Error);
        assert!(result.errors[0].error.contains("maximum length"));
    }
}
