//! Report writer agent.
//!
//! Produces report text (whole reports, introductions and sections) in
//! the voice of the selected persona.

use async_trait::async_trait;

use super::config::ResearchConfig;
use super::gateway::Gateway;
use super::traits::{Agent, AgentResponse};
use crate::core::AgentProfile;
use crate::error::AgentError;

/// Agent that writes markdown report text.
#[derive(Debug, Clone)]
pub struct ReportWriter {
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl ReportWriter {
    /// Creates a writer with the given configuration.
    #[must_use]
    pub fn new(config: &ResearchConfig) -> Self {
        Self {
            model: config.writer_model.clone(),
            max_tokens: config.writer_max_tokens,
            temperature: config.temperature,
        }
    }

    /// Writes text for `prompt` as `agent`.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] if the call fails or the answer is empty.
    pub async fn write(
        &self,
        gateway: &Gateway,
        agent: &AgentProfile,
        prompt: &str,
    ) -> Result<AgentResponse, AgentError> {
        let mut response = self.execute(gateway, &agent.role_prompt, prompt).await?;
        response.content = response.content.trim().to_string();
        Ok(response)
    }
}

#[async_trait]
impl Agent for ReportWriter {
    fn name(&self) -> &'static str {
        "report_writer"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn temperature(&self) -> f32 {
        self.temperature
    }

    fn max_tokens(&self) -> u32 {
        self.max_tokens
    }
}
