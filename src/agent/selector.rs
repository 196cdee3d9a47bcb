//! Persona selector agent.
//!
//! Picks the expert persona (name and role prompt) that steers every
//! later generation call of a research run.

use async_trait::async_trait;
use serde_json::Value;

use super::config::ResearchConfig;
use super::gateway::Gateway;
use super::prompt::build_selector_prompt;
use super::traits::{Agent, AgentResponse, json_span, strip_code_fence};
use crate::core::AgentProfile;
use crate::error::AgentError;

/// Keys accepted for the persona name, in priority order.
const NAME_KEYS: [&str; 3] = ["server", "name", "agent"];
/// Keys accepted for the role prompt, in priority order.
const ROLE_KEYS: [&str; 2] = ["agent_role_prompt", "role_prompt"];

/// Agent that chooses a research persona for a topic.
#[derive(Debug, Clone)]
pub struct AgentSelector {
    model: String,
    max_tokens: u32,
    temperature: f32,
    system_prompt: String,
}

impl AgentSelector {
    /// Creates a selector with the given configuration and system prompt.
    #[must_use]
    pub fn new(config: &ResearchConfig, system_prompt: String) -> Self {
        Self {
            model: config.planner_model.clone(),
            max_tokens: config.planner_max_tokens,
            temperature: config.temperature,
            system_prompt,
        }
    }

    /// Selects a persona for `topic`.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Gateway`] if the call fails and
    /// [`AgentError::ResponseParse`] if no persona can be read from the answer.
    pub async fn select(
        &self,
        gateway: &Gateway,
        topic: &str,
    ) -> Result<(AgentProfile, AgentResponse), AgentError> {
        let response = self
            .execute(gateway, &self.system_prompt, &build_selector_prompt(topic))
            .await?;
        let profile = Self::parse_profile(&response.content)?;
        Ok((profile, response))
    }

    /// Parses the JSON persona, tolerating code fences and surrounding prose.
    fn parse_profile(content: &str) -> Result<AgentProfile, AgentError> {
        let parse_error = |message: String| AgentError::ResponseParse {
            message,
            content: content.to_string(),
        };

        let stripped = strip_code_fence(content);
        let json_str = json_span(stripped, '{', '}')
            .ok_or_else(|| parse_error("no JSON object in persona response".to_string()))?;
        let value: Value = serde_json::from_str(json_str)
            .map_err(|e| parse_error(format!("Failed to parse persona: {e}")))?;

        let field = |keys: &[&str]| {
            keys.iter()
                .filter_map(|key| value.get(*key).and_then(Value::as_str))
                .map(str::trim)
                .find(|s| !s.is_empty())
                .map(str::to_string)
        };

        match (field(&NAME_KEYS), field(&ROLE_KEYS)) {
            (Some(name), Some(role_prompt)) => Ok(AgentProfile { name, role_prompt }),
            _ => Err(parse_error(
                "persona response lacks a name or role prompt".to_string(),
            )),
        }
    }
}

#[async_trait]
impl Agent for AgentSelector {
    fn name(&self) -> &'static str {
        "agent_selector"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn json_mode(&self) -> bool {
        true
    }

    fn temperature(&self) -> f32 {
        self.temperature
    }

    fn max_tokens(&self) -> u32 {
        self.max_tokens
    }
}
