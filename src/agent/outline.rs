//! Outline planner agent for detailed reports.

use std::collections::HashSet;

use async_trait::async_trait;
use serde_json::Value;

use super::config::ResearchConfig;
use super::gateway::Gateway;
use super::prompt::build_outline_prompt;
use super::traits::{Agent, AgentResponse, json_span, strip_code_fence};
use crate::core::SubTopic;
use crate::error::AgentError;

/// Agent that turns a topic and its research context into section headings.
#[derive(Debug, Clone)]
pub struct OutlinePlanner {
    model: String,
    max_tokens: u32,
    temperature: f32,
    system_prompt: String,
}

impl OutlinePlanner {
    /// Creates an outline planner with the given configuration and system prompt.
    #[must_use]
    pub fn new(config: &ResearchConfig, system_prompt: String) -> Self {
        Self {
            model: config.planner_model.clone(),
            max_tokens: config.planner_max_tokens,
            temperature: config.temperature,
            system_prompt,
        }
    }

    /// Plans at most `max_subtopics` headings, numbered from 1.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Gateway`] if the call fails and
    /// [`AgentError::ResponseParse`] if the answer holds no headings.
    pub async fn plan(
        &self,
        gateway: &Gateway,
        topic: &str,
        context: &str,
        max_subtopics: usize,
    ) -> Result<(Vec<SubTopic>, AgentResponse), AgentError> {
        let prompt = build_outline_prompt(topic, context, max_subtopics);
        let response = self.execute(gateway, &self.system_prompt, &prompt).await?;
        let subtopics = Self::parse_subtopics(&response.content, max_subtopics)?;
        Ok((subtopics, response))
    }

    /// Parses `{"subtopics": [{"task": ...}]}` or a bare array of headings.
    fn parse_subtopics(content: &str, max_subtopics: usize) -> Result<Vec<SubTopic>, AgentError> {
        let parse_error = |message: &str| AgentError::ResponseParse {
            message: message.to_string(),
            content: content.to_string(),
        };

        let stripped = strip_code_fence(content);
        let items = json_span(stripped, '{', '}')
            .and_then(|span| serde_json::from_str::<Value>(span).ok())
            .and_then(|value| value.get("subtopics").and_then(Value::as_array).cloned())
            .or_else(|| {
                json_span(stripped, '[', ']')
                    .and_then(|span| serde_json::from_str::<Vec<Value>>(span).ok())
            })
            .ok_or_else(|| parse_error("no subtopic list in outline response"))?;

        let mut seen = HashSet::new();
        let subtopics: Vec<SubTopic> = items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.as_str()),
                Value::Object(map) => ["task", "title"]
                    .iter()
                    .find_map(|key| map.get(*key).and_then(Value::as_str)),
                _ => None,
            })
            .map(str::trim)
            .filter(|title| !title.is_empty())
            .filter(|title| seen.insert(title.to_lowercase()))
            .take(max_subtopics)
            .enumerate()
            .map(|(i, title)| SubTopic {
                title: title.to_string(),
                ordinal: i + 1,
            })
            .collect();

        if subtopics.is_empty() {
            return Err(parse_error("outline response contains no subtopics"));
        }
        Ok(subtopics)
    }
}

#[async_trait]
impl Agent for OutlinePlanner {
    fn name(&self) -> &'static str {
        "outline_planner"
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
