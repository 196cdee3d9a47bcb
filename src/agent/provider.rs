//! Pluggable LLM provider trait.
//!
//! Implementations translate provider-agnostic [`ChatRequest`]/[`ChatResponse`]
//! into provider-specific SDK calls. Retries, timeouts and caching live in
//! the [`Gateway`](super::gateway::Gateway), not here: a provider performs
//! exactly one attempt per call.

use async_trait::async_trait;

use super::message::{ChatRequest, ChatResponse};
use crate::error::GatewayError;

/// Trait for LLM provider backends.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name (e.g., `"openai"`, `"ollama"`).
    fn name(&self) -> &'static str;

    /// Executes a single chat completion attempt.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] classified by retryability.
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, GatewayError>;
}
