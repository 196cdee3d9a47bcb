//! Working-set types produced while a request is researched.

use serde::{Deserialize, Serialize};

/// Persona used to steer every generation call of a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentProfile {
    /// Display name, e.g. `"💰 Financial Analyst"`.
    pub name: String,
    /// System prompt describing the persona's role.
    pub role_prompt: String,
}

/// Name of the fallback persona.
pub const FALLBACK_AGENT_NAME: &str = "Default Agent";

/// Role prompt of the fallback persona.
pub const FALLBACK_ROLE_PROMPT: &str = "You are an AI critical thinking research assistant. \
Your sole purpose is to write well-structured, critical, and objective reports on given text.";

impl AgentProfile {
    /// Creates a profile.
    #[must_use]
    pub fn new(name: impl Into<String>, role_prompt: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            role_prompt: role_prompt.into(),
        }
    }

    /// The generic research-assistant persona used when selection fails.
    #[must_use]
    pub fn fallback() -> Self {
        Self::new(FALLBACK_AGENT_NAME, FALLBACK_ROLE_PROMPT)
    }
}

/// A narrower search query derived from the topic.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubQuery {
    /// Query text.
    pub text: String,
}

impl SubQuery {
    /// Creates a sub-query.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// A single web search hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Source URL.
    pub url: String,
    /// Page title.
    pub title: String,
    /// Extracted page text.
    pub raw_content: String,
}

/// A passage selected by the relevance ranker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextChunk {
    /// URL of the page the passage came from.
    pub source_url: String,
    /// Title of that page.
    pub title: String,
    /// Passage text.
    pub text: String,
    /// Cosine similarity to the sub-query.
    pub relevance_score: f32,
}

impl ContextChunk {
    /// Source-attributed rendering used in prompt context blocks.
    #[must_use]
    pub fn to_context_entry(&self) -> String {
        format!(
            "Source: {}\nTitle: {}\nContent: {}\n\n",
            self.source_url, self.title, self.text
        )
    }

    /// Characters [`Self::to_context_entry`] adds around the text.
    #[must_use]
    pub fn entry_overhead(&self) -> usize {
        "Source: \nTitle: \nContent: \n\n".len()
            + self.source_url.chars().count()
            + self.title.chars().count()
    }
}

/// A heading of the detailed report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubTopic {
    /// Heading text.
    pub title: String,
    /// 1-based position in the outline.
    pub ordinal: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_profile() {
        let agent = AgentProfile::fallback();
        assert_eq!(agent.name, FALLBACK_AGENT_NAME);
        assert!(agent.role_prompt.contains("research assistant"));
    }

    #[test]
    fn test_entry_overhead_matches_rendering() {
        let chunk = ContextChunk {
            source_url: "https://ex.example/ü".to_string(),
            title: "Überblick".to_string(),
            text: "körper".to_string(),
            relevance_score: 0.5,
        };
        let entry = chunk.to_context_entry();
        assert_eq!(
            entry.chars().count(),
            chunk.entry_overhead() + chunk.text.chars().count()
        );
    }

    #[test]
    fn test_subquery_serializes_as_string() {
        let json = serde_json::to_string(&SubQuery::new("battery chemistry")).unwrap_or_default();
        assert_eq!(json, "\"battery chemistry\"");
    }
}
