//! Agent trait definition.
//!
//! All agents (selector, planner, outline, writer) implement this trait,
//! which provides a uniform interface for the orchestrator.

use async_trait::async_trait;

use super::gateway::Gateway;
use super::message::{ChatRequest, TokenUsage, system_message, user_message};
use crate::error::AgentError;

/// Response from an agent execution.
#[derive(Debug, Clone)]
pub struct AgentResponse {
    /// The agent's text output.
    pub content: String,
    /// Token usage for this call.
    pub usage: TokenUsage,
    /// Why the model stopped generating (e.g. `"stop"`, `"length"`).
    pub finish_reason: Option<String>,
}

/// Trait implemented by all agents in the system.
///
/// Agents encapsulate a specific role (persona selection, query planning,
/// outlining, writing) with a model configuration. The orchestrator calls
/// [`Agent::execute`] to run the agent through the [`Gateway`].
#[async_trait]
pub trait Agent: Send + Sync {
    /// Agent name for logging, telemetry and identification.
    fn name(&self) -> &'static str;

    /// Model identifier to use for this agent.
    fn model(&self) -> &str;

    /// Whether to request JSON-formatted output.
    fn json_mode(&self) -> bool {
        false
    }

    /// Sampling temperature (0.0 = deterministic, higher = more creative).
    fn temperature(&self) -> f32 {
        0.0
    }

    /// Maximum tokens for the response.
    fn max_tokens(&self) -> u32 {
        2048
    }

    /// Executes the agent with the given system and user messages.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Gateway`] when the call fails after retries and
    /// [`AgentError::EmptyResponse`] when the model returns no text.
    async fn execute(
        &self,
        gateway: &Gateway,
        system_prompt: &str,
        user_msg: &str,
    ) -> Result<AgentResponse, AgentError> {
        let request = ChatRequest {
            model: self.model().to_string(),
            messages: vec![system_message(system_prompt), user_message(user_msg)],
            temperature: Some(self.temperature()),
            max_tokens: Some(self.max_tokens()),
            json_mode: self.json_mode(),
        };

        let response = gateway.generate(self.name(), &request).await?;
        if response.content.trim().is_empty() {
            return Err(AgentError::EmptyResponse { agent: self.name() });
        }

        Ok(AgentResponse {
            content: response.content,
            usage: response.usage,
            finish_reason: response.finish_reason,
        })
    }
}

/// Strips a surrounding markdown code fence, if any.
pub(crate) fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    if trimmed.starts_with("```") {
        trimmed
            .trim_start_matches("```json")
            .trim_start_matches("```")
            .trim_end_matches("```")
            .trim()
    } else {
        trimmed
    }
}

/// Returns the outermost `open`…`close` span of `content`.
///
/// Used to dig a JSON value out of prose such as
/// `Sure! Here it is: {...}. Let me know.`
pub(crate) fn json_span(content: &str, open: char, close: char) -> Option<&str> {
    let start = content.find(open)?;
    let end = content.rfind(close)?;
    (end > start).then(|| &content[start..=end])
}
