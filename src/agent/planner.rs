//! Sub-query planner agent.
//!
//! Asks the persona for narrower web search queries and parses whatever
//! list shape the model answers with.

use std::collections::HashSet;
use std::sync::LazyLock;

use async_trait::async_trait;
use chrono::Utc;
use regex::Regex;
use serde_json::Value;

use super::config::ResearchConfig;
use super::gateway::Gateway;
use super::prompt::build_subquery_prompt;
use super::traits::{Agent, AgentResponse, json_span, strip_code_fence};
use crate::core::{AgentProfile, SubQuery};
use crate::error::AgentError;

/// Leading list markers: `1.`, `2)`, `-`, `*`, `•`.
static LIST_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:\d+\s*[.)]|[-*•])\s*").unwrap_or_else(|_| unreachable!())
});

/// Agent that derives search sub-queries from a task.
#[derive(Debug, Clone)]
pub struct SubQueryPlanner {
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl SubQueryPlanner {
    /// Creates a planner with the given configuration.
    #[must_use]
    pub fn new(config: &ResearchConfig) -> Self {
        Self {
            model: config.planner_model.clone(),
            max_tokens: config.planner_max_tokens,
            temperature: config.temperature,
        }
    }

    /// Generates between 1 and `max_n` sub-queries for `task`.
    ///
    /// The persona's role prompt is the system prompt. An answer with no
    /// usable query yields `task` itself as the only sub-query.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] only when the generation call itself fails.
    pub async fn generate(
        &self,
        gateway: &Gateway,
        agent: &AgentProfile,
        task: &str,
        max_n: usize,
    ) -> Result<(Vec<SubQuery>, AgentResponse), AgentError> {
        let prompt = build_subquery_prompt(task, max_n, Utc::now().date_naive());
        let response = self.execute(gateway, &agent.role_prompt, &prompt).await?;
        let queries = parse_subqueries(&response.content, max_n, task);
        Ok((queries, response))
    }
}

/// Extracts at most `max_n` distinct queries from a model answer.
///
/// Accepts a JSON array of strings, a JSON object with a `queries` array,
/// or a numbered/bulleted line list. Duplicates are dropped
/// case-insensitively. Falls back to `fallback` when nothing remains.
#[must_use]
pub fn parse_subqueries(content: &str, max_n: usize, fallback: &str) -> Vec<SubQuery> {
    let stripped = strip_code_fence(content);
    let candidates = json_candidates(stripped).unwrap_or_else(|| line_candidates(stripped));

    let mut seen = HashSet::new();
    let mut queries: Vec<SubQuery> = candidates
        .into_iter()
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty())
        .filter(|q| seen.insert(q.to_lowercase()))
        .take(max_n.max(1))
        .map(SubQuery::new)
        .collect();

    if queries.is_empty() {
        queries.push(SubQuery::new(fallback.trim()));
    }
    queries
}

fn strings_of(values: &[Value]) -> Vec<String> {
    values
        .iter()
        .filter_map(|v| match v {
            Value::String(s) => Some(s.clone()),
            Value::Object(map) => map
                .get("query")
                .and_then(Value::as_str)
                .map(str::to_string),
            _ => None,
        })
        .collect()
}

fn json_candidates(content: &str) -> Option<Vec<String>> {
    if let Some(span) = json_span(content, '[', ']') {
        if let Ok(values) = serde_json::from_str::<Vec<Value>>(span) {
            return Some(strings_of(&values));
        }
    }
    let span = json_span(content, '{', '}')?;
    let value: Value = serde_json::from_str(span).ok()?;
    value
        .get("queries")
        .and_then(Value::as_array)
        .map(|values| strings_of(values))
}

/// One query per line. When any line carries a list marker, unmarked lines
/// are prose around the list and are dropped.
fn line_candidates(content: &str) -> Vec<String> {
    let has_markers = content.lines().any(|line| LIST_MARKER.is_match(line));
    content
        .lines()
        .filter(|line| !has_markers || LIST_MARKER.is_match(line))
        .map(|line| LIST_MARKER.replace(line, ""))
        .map(|line| {
            line.trim()
                .trim_end_matches(',')
                .trim_matches(|c| c == '"' || c == '\'' || c == '`')
                .to_string()
        })
        .filter(|line| !line.is_empty())
        .collect()
}

#[async_trait]
impl Agent for SubQueryPlanner {
    fn name(&self) -> &'static str {
        "subquery_planner"
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

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use test_case::test_case;

    use super::*;

    fn texts(queries: &[SubQuery]) -> Vec<&str> {
        queries.iter().map(|q| q.text.as_str()).collect()
    }

    #[test_case(r#"["a b", "c d", "e f"]"# ; "json array")]
    #[test_case("```json\n[\"a b\", \"c d\", \"e f\"]\n```" ; "fenced array")]
    #[test_case(r#"Here you go: ["a b", "c d", "e f"]"# ; "array in prose")]
    #[test_case(r#"{"queries": ["a b", "c d", "e f"]}"# ; "object with queries")]
    #[test_case("1. a b\n2) c d\n3. \"e f\"" ; "numbered lines")]
    #[test_case("- a b\n* c d\n• e f" ; "bulleted lines")]
    #[test_case("Here are 3 search queries for your task:\n1. a b\n2. c d\n3. e f" ; "numbered lines after lead-in")]
    #[test_case("Sure!\n- a b\n- c d\n- e f\n\nHope this helps!" ; "bulleted lines inside prose")]
    fn test_parse_subqueries_shapes(content: &str) {
        let queries = parse_subqueries(content, 5, "topic");
        assert_eq!(texts(&queries), vec!["a b", "c d", "e f"]);
    }

    #[test]
    fn test_parse_subqueries_dedupes_case_insensitively() {
        let queries = parse_subqueries(r#"["EV sales", "ev sales ", "Battery cost"]"#, 5, "t");
        assert_eq!(texts(&queries), vec!["EV sales", "Battery cost"]);
    }

    #[test]
    fn test_parse_subqueries_lead_in_does_not_take_a_slot() {
        let content = "Here are 3 search queries for your task:\n\
                       1. solid state battery cost\n\
                       2. solid state battery makers\n\
                       3. electrolyte chemistry";
        let queries = parse_subqueries(content, 3, "topic");
        assert_eq!(
            texts(&queries),
            vec![
                "solid state battery cost",
                "solid state battery makers",
                "electrolyte chemistry"
            ]
        );
    }

    #[test]
    fn test_parse_subqueries_truncates() {
        let queries = parse_subqueries(r#"["a", "b", "c", "d"]"#, 2, "t");
        assert_eq!(texts(&queries), vec!["a", "b"]);
    }

    #[test_case("" ; "empty")]
    #[test_case("[]" ; "empty array")]
    #[test_case("[1, 2, 3]" ; "non-string array")]
    #[test_case("   \n  \n" ; "blank lines")]
    fn test_parse_subqueries_falls_back_to_topic(content: &str) {
        let queries = parse_subqueries(content, 3, " solid-state batteries ");
        assert_eq!(texts(&queries), vec!["solid-state batteries"]);
    }

    proptest! {
        #[test]
        fn prop_subquery_count_is_bounded(
            items in prop::collection::vec("[a-z ]{0,12}", 0..25),
            max_n in 1usize..=10,
        ) {
            let content = serde_json::to_string(&items).unwrap_or_default();
            let queries = parse_subqueries(&content, max_n, "topic");
            prop_assert!(!queries.is_empty());
            prop_assert!(queries.len() <= max_n);
            let lowered: HashSet<String> = queries.iter().map(|q| q.text.to_lowercase()).collect();
            prop_assert_eq!(lowered.len(), queries.len());
        }
    }
}
