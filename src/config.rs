//! Engine configuration with builder pattern and environment variable support.
//!
//! Configuration is resolved in order: explicit values → environment variables → defaults.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::CoreError;

/// Default wall-clock budget for one workflow run.
const DEFAULT_WORKFLOW_BUDGET_SECS: u64 = 300;
/// Default cap on agents in a sequential chain.
const DEFAULT_MAX_SEQUENTIAL_AGENTS: usize = 5;
/// Default cap on agents in a parallel fan-out.
const DEFAULT_MAX_PARALLEL_AGENTS: usize = 3;
/// Default cap on tool-loop iterations.
const DEFAULT_MAX_REACT_ITERATIONS: usize = 5;
/// Default classifier completion budget.
const DEFAULT_CLASSIFIER_MAX_TOKENS: u32 = 256;
/// Default per-agent completion budget.
const DEFAULT_AGENT_MAX_TOKENS: u32 = 2048;
/// Default tool-loop completion budget per reasoning step.
const DEFAULT_REACT_MAX_TOKENS: u32 = 1024;
/// Default fallback agent for failed classification.
const DEFAULT_FALLBACK_AGENT: &str = "generalist";

/// Configuration for the workflow engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Hard wall-clock budget for one workflow run.
    pub workflow_budget: Duration,
    /// Cap on agents in a sequential chain.
    pub max_sequential_agents: usize,
    /// Cap on agents in a parallel fan-out.
    pub max_parallel_agents: usize,
    /// Cap on tool-loop iterations per run.
    pub max_react_iterations: usize,
    /// Completion budget for classification calls.
    pub classifier_max_tokens: u32,
    /// Completion budget for specialized agent calls.
    pub agent_max_tokens: u32,
    /// Completion budget per tool-loop reasoning step.
    pub react_max_tokens: u32,
    /// Agent routed to when classification fails soft.
    pub fallback_agent: String,
    /// Directory containing prompt template overrides.
    pub prompt_dir: Option<PathBuf>,
}

impl EngineConfig {
    /// Creates a new builder for `EngineConfig`.
    #[must_use]
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    /// Creates configuration from environment variables with defaults.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidConfig`] if a resolved bound is zero.
    pub fn from_env() -> Result<Self, CoreError> {
        Self::builder().from_env().build()
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workflow_budget: Duration::from_secs(DEFAULT_WORKFLOW_BUDGET_SECS),
            max_sequential_agents: DEFAULT_MAX_SEQUENTIAL_AGENTS,
            max_parallel_agents: DEFAULT_MAX_PARALLEL_AGENTS,
            max_react_iterations: DEFAULT_MAX_REACT_ITERATIONS,
            classifier_max_tokens: DEFAULT_CLASSIFIER_MAX_TOKENS,
            agent_max_tokens: DEFAULT_AGENT_MAX_TOKENS,
            react_max_tokens: DEFAULT_REACT_MAX_TOKENS,
            fallback_agent: DEFAULT_FALLBACK_AGENT.to_string(),
            prompt_dir: None,
        }
    }
}

/// Builder for [`EngineConfig`].
#[derive(Debug, Clone, Default)]
pub struct EngineConfigBuilder {
    workflow_budget: Option<Duration>,
    max_sequential_agents: Option<usize>,
    max_parallel_agents: Option<usize>,
    max_react_iterations: Option<usize>,
    classifier_max_tokens: Option<u32>,
    agent_max_tokens: Option<u32>,
    react_max_tokens: Option<u32>,
    fallback_agent: Option<String>,
    prompt_dir: Option<PathBuf>,
}

impl EngineConfigBuilder {
    /// Populates unset fields from environment variables.
    #[must_use]
    pub fn from_env(mut self) -> Self {
        if self.workflow_budget.is_none() {
            self.workflow_budget = std::env::var("MAESTRO_WORKFLOW_BUDGET_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs);
        }
        if self.max_sequential_agents.is_none() {
            self.max_sequential_agents = std::env::var("MAESTRO_MAX_SEQUENTIAL_AGENTS")
                .ok()
                .and_then(|v| v.parse().ok());
        }
        if self.max_parallel_agents.is_none() {
            self.max_parallel_agents = std::env::var("MAESTRO_MAX_PARALLEL_AGENTS")
                .ok()
                .and_then(|v| v.parse().ok());
        }
        if self.max_react_iterations.is_none() {
            self.max_react_iterations = std::env::var("MAESTRO_MAX_REACT_ITERATIONS")
                .ok()
                .and_then(|v| v.parse().ok());
        }
        if self.fallback_agent.is_none() {
            self.fallback_agent = std::env::var("MAESTRO_FALLBACK_AGENT").ok();
        }
        if self.prompt_dir.is_none() {
            self.prompt_dir = std::env::var("MAESTRO_PROMPT_DIR").ok().map(PathBuf::from);
        }
        self
    }

    /// Sets the workflow wall-clock budget.
    #[must_use]
    pub const fn workflow_budget(mut self, budget: Duration) -> Self {
        self.workflow_budget = Some(budget);
        self
    }

    /// Sets the sequential chain cap.
    #[must_use]
    pub const fn max_sequential_agents(mut self, n: usize) -> Self {
        self.max_sequential_agents = Some(n);
        self
    }

    /// Sets the parallel fan-out cap.
    #[must_use]
    pub const fn max_parallel_agents(mut self, n: usize) -> Self {
        self.max_parallel_agents = Some(n);
        self
    }

    /// Sets the tool-loop iteration cap.
    #[must_use]
    pub const fn max_react_iterations(mut self, n: usize) -> Self {
        self.max_react_iterations = Some(n);
        self
    }

    /// Sets the classifier completion budget.
    #[must_use]
    pub const fn classifier_max_tokens(mut self, n: u32) -> Self {
        self.classifier_max_tokens = Some(n);
        self
    }

    /// Sets the per-agent completion budget.
    #[must_use]
    pub const fn agent_max_tokens(mut self, n: u32) -> Self {
        self.agent_max_tokens = Some(n);
        self
    }

    /// Sets the tool-loop per-step completion budget.
    #[must_use]
    pub const fn react_max_tokens(mut self, n: u32) -> Self {
        self.react_max_tokens = Some(n);
        self
    }

    /// Sets the classification fallback agent.
    #[must_use]
    pub fn fallback_agent(mut self, name: impl Into<String>) -> Self {
        self.fallback_agent = Some(name.into());
        self
    }

    /// Sets the prompt template directory.
    #[must_use]
    pub fn prompt_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.prompt_dir = Some(dir.into());
        self
    }

    /// Builds the [`EngineConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidConfig`] when a bound resolves to zero
    /// or the fallback agent name is empty.
    pub fn build(self) -> Result<EngineConfig, CoreError> {
        let defaults = EngineConfig::default();
        let config = EngineConfig {
            workflow_budget: self.workflow_budget.unwrap_or(defaults.workflow_budget),
            max_sequential_agents: self
                .max_sequential_agents
                .unwrap_or(defaults.max_sequential_agents),
            max_parallel_agents: self
                .max_parallel_agents
                .unwrap_or(defaults.max_parallel_agents),
            max_react_iterations: self
                .max_react_iterations
                .unwrap_or(defaults.max_react_iterations),
            classifier_max_tokens: self
                .classifier_max_tokens
                .unwrap_or(defaults.classifier_max_tokens),
            agent_max_tokens: self.agent_max_tokens.unwrap_or(defaults.agent_max_tokens),
            react_max_tokens: self.react_max_tokens.unwrap_or(defaults.react_max_tokens),
            fallback_agent: self.fallback_agent.unwrap_or(defaults.fallback_agent),
            prompt_dir: self.prompt_dir,
        };

        if config.workflow_budget.is_zero() {
            return Err(CoreError::InvalidConfig {
                message: "workflow budget must be non-zero".to_string(),
            });
        }
        if config.max_sequential_agents == 0
            || config.max_parallel_agents == 0
            || config.max_react_iterations == 0
        {
            return Err(CoreError::InvalidConfig {
                message: "agent and iteration caps must be at least 1".to_string(),
            });
        }
        if config.fallback_agent.trim().is_empty() {
            return Err(CoreError::InvalidConfig {
                message: "fallback agent name must not be empty".to_string(),
            });
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let config = EngineConfig::builder()
            .build()
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(config.workflow_budget, Duration::from_secs(300));
        assert_eq!(config.max_sequential_agents, 5);
        assert_eq!(config.max_parallel_agents, 3);
        assert_eq!(config.max_react_iterations, 5);
        assert_eq!(config.fallback_agent, "generalist");
    }

    #[test]
    fn test_builder_custom_values() {
        let config = EngineConfig::builder()
            .workflow_budget(Duration::from_secs(30))
            .max_parallel_agents(2)
            .fallback_agent("helper")
            .build()
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(config.workflow_budget, Duration::from_secs(30));
        assert_eq!(config.max_parallel_agents, 2);
        assert_eq!(config.fallback_agent, "helper");
        // Unset fields keep defaults.
        assert_eq!(config.max_sequential_agents, 5);
    }

    #[test]
    fn test_zero_bounds_rejected() {
        assert!(EngineConfig::builder()
            .max_react_iterations(0)
            .build()
            .is_err());
        assert!(EngineConfig::builder()
            .workflow_budget(Duration::ZERO)
            .build()
            .is_err());
        assert!(EngineConfig::builder().fallback_agent("  ").build().is_err());
    }
}
