//! Pluggable reasoning backend trait.
//!
//! The orchestration core treats the LLM as one abstract capability:
//! turn a prompt into text. Model loading, quantization, and backend
//! selection all live behind this trait in an external collaborator.

use async_trait::async_trait;

use crate::error::CoreError;

/// Trait for the injected reasoning backend.
///
/// Implementations handle the transport layer (HTTP, SDK calls, retries)
/// while presenting one uniform completion call to the core.
///
/// # Concurrency
///
/// The engine issues concurrent `complete` calls during parallel fan-out.
/// Implementations MUST tolerate this: a backend that swaps per-agent
/// adapters on a single shared model instance has to serialize those
/// calls internally, or hold one instance per loaded adapter. The core
/// makes no single-flight guarantee.
#[async_trait]
pub trait ReasoningClient: Send + Sync {
    /// Backend name for logging (e.g., `"openai"`, `"local"`).
    fn name(&self) -> &'static str;

    /// Executes one completion request.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Reasoning`] on backend failures.
    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String, CoreError>;
}
