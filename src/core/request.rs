//! Research request, report types and tones.
//!
//! A [`ResearchRequest`] is validated once by its builder and is immutable
//! afterwards, so every downstream component can rely on its bounds.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::context::AgentProfile;
use crate::error::ConfigError;

/// Inclusive bounds for the number of generated sub-queries.
pub const SUBQUERY_BOUNDS: (usize, usize) = (1, 10);
/// Inclusive bounds for the number of detailed-report sub-topics.
pub const SUBTOPIC_BOUNDS: (usize, usize) = (1, 10);
/// Inclusive bounds for search results fetched per sub-query.
pub const RESULTS_PER_QUERY_BOUNDS: (usize, usize) = (1, 20);

/// Default number of sub-queries.
pub const DEFAULT_MAX_SUBQUERIES: usize = 5;
/// Default number of sub-topics.
pub const DEFAULT_MAX_SUBTOPICS: usize = 5;
/// Default search results per sub-query.
pub const DEFAULT_MAX_RESULTS_PER_QUERY: usize = 5;

/// Kind of report to compose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportType {
    /// In-depth research report with citations.
    #[default]
    Comprehensive,
    /// Annotated list of the most useful sources.
    ResourceSummary,
    /// Structured outline of a research report.
    Outline,
    /// Report following caller-supplied instructions.
    Custom,
    /// Introduction plus one generated section per sub-topic.
    Detailed,
}

impl ReportType {
    /// All report types, in display order.
    pub const ALL: [Self; 5] = [
        Self::Comprehensive,
        Self::ResourceSummary,
        Self::Outline,
        Self::Custom,
        Self::Detailed,
    ];

    /// Returns the canonical name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Comprehensive => "comprehensive",
            Self::ResourceSummary => "resource_summary",
            Self::Outline => "outline",
            Self::Custom => "custom",
            Self::Detailed => "detailed",
        }
    }

    /// Short human description.
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::Comprehensive => "single-pass research report with citations and references",
            Self::ResourceSummary => "literature/resource recommendation report",
            Self::Outline => "markdown outline of a research report",
            Self::Custom => "report following custom instructions (--instructions)",
            Self::Detailed => "introduction plus one section per generated sub-topic",
        }
    }

    /// Whether this type produces per-sub-topic sections.
    #[must_use]
    pub const fn is_multi_section(&self) -> bool {
        matches!(self, Self::Detailed)
    }
}

impl fmt::Display for ReportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "comprehensive" | "research" | "research_report" => Ok(Self::Comprehensive),
            "resource_summary" | "resource" | "resource_report" => Ok(Self::ResourceSummary),
            "outline" | "outline_report" => Ok(Self::Outline),
            "custom" | "custom_report" => Ok(Self::Custom),
            "detailed" | "detailed_report" => Ok(Self::Detailed),
            other => Err(ConfigError::InvalidRequest {
                field: "report_type",
                message: format!("unknown report type '{other}'"),
            }),
        }
    }
}

/// Writing tone injected into report prompts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[allow(missing_docs)]
pub enum Tone {
    #[default]
    Objective,
    Formal,
    Analytical,
    Persuasive,
    Informative,
    Explanatory,
    Descriptive,
    Critical,
    Comparative,
    Speculative,
    Reflective,
    Narrative,
    Humorous,
    Optimistic,
    Pessimistic,
}

impl Tone {
    /// All tones, in display order.
    pub const ALL: [Self; 15] = [
        Self::Objective,
        Self::Formal,
        Self::Analytical,
        Self::Persuasive,
        Self::Informative,
        Self::Explanatory,
        Self::Descriptive,
        Self::Critical,
        Self::Comparative,
        Self::Speculative,
        Self::Reflective,
        Self::Narrative,
        Self::Humorous,
        Self::Optimistic,
        Self::Pessimistic,
    ];

    /// Returns the canonical name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Objective => "objective",
            Self::Formal => "formal",
            Self::Analytical => "analytical",
            Self::Persuasive => "persuasive",
            Self::Informative => "informative",
            Self::Explanatory => "explanatory",
            Self::Descriptive => "descriptive",
            Self::Critical => "critical",
            Self::Comparative => "comparative",
            Self::Speculative => "speculative",
            Self::Reflective => "reflective",
            Self::Narrative => "narrative",
            Self::Humorous => "humorous",
            Self::Optimistic => "optimistic",
            Self::Pessimistic => "pessimistic",
        }
    }

    /// Instruction text placed into prompts.
    #[must_use]
    pub const fn instruction(&self) -> &'static str {
        match self {
            Self::Objective => "Objective (present facts and findings fairly and without bias)",
            Self::Formal => {
                "Formal (follow academic standards with rigorous language and structure)"
            }
            Self::Analytical => {
                "Analytical (critical evaluation and detailed examination of data and theories)"
            }
            Self::Persuasive => {
                "Persuasive (aimed at convincing the audience to accept specific viewpoints or arguments)"
            }
            Self::Informative => {
                "Informative (provide clear and comprehensive information related to the topic)"
            }
            Self::Explanatory => "Explanatory (clarify complex concepts and processes)",
            Self::Descriptive => {
                "Descriptive (detailed depiction of phenomena, experiments, or case studies)"
            }
            Self::Critical => {
                "Critical (evaluate the validity and relevance of research and its conclusions)"
            }
            Self::Comparative => {
                "Comparative (juxtapose different theories, data, or methods to highlight differences and similarities)"
            }
            Self::Speculative => {
                "Speculative (explore hypotheses, potential impacts, or future research directions)"
            }
            Self::Reflective => {
                "Reflective (reflect on the research process and personal insights or experiences)"
            }
            Self::Narrative => {
                "Narrative (present research findings or methods through storytelling)"
            }
            Self::Humorous => {
                "Humorous (light-hearted and engaging, making content more understandable and accessible)"
            }
            Self::Optimistic => "Optimistic (emphasize positive findings and potential benefits)",
            Self::Pessimistic => {
                "Pessimistic (focus on limitations, challenges, or negative outcomes)"
            }
        }
    }
}

impl fmt::Display for Tone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tone {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|tone| tone.as_str() == needle)
            .ok_or_else(|| ConfigError::InvalidRequest {
                field: "tone",
                message: format!("unknown tone '{needle}'"),
            })
    }
}

/// A validated research request.
///
/// Construct with [`ResearchRequest::builder`]; all bounds are checked there.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResearchRequest {
    topic: String,
    report_type: ReportType,
    tone: Tone,
    max_subqueries: usize,
    max_subtopics: usize,
    max_results_per_query: usize,
    custom_instructions: Option<String>,
    parent_topic: Option<String>,
    agent: Option<AgentProfile>,
}

impl ResearchRequest {
    /// Starts a builder for the given topic.
    #[must_use]
    pub fn builder(topic: impl Into<String>) -> ResearchRequestBuilder {
        ResearchRequestBuilder {
            topic: topic.into(),
            ..ResearchRequestBuilder::default()
        }
    }

    /// Research topic (trimmed, non-empty).
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Report type to compose.
    #[must_use]
    pub const fn report_type(&self) -> ReportType {
        self.report_type
    }

    /// Writing tone.
    #[must_use]
    pub const fn tone(&self) -> Tone {
        self.tone
    }

    /// Upper bound on generated sub-queries.
    #[must_use]
    pub const fn max_subqueries(&self) -> usize {
        self.max_subqueries
    }

    /// Upper bound on detailed-report sub-topics.
    #[must_use]
    pub const fn max_subtopics(&self) -> usize {
        self.max_subtopics
    }

    /// Upper bound on search results fetched per sub-query.
    #[must_use]
    pub const fn max_results_per_query(&self) -> usize {
        self.max_results_per_query
    }

    /// Instructions for [`ReportType::Custom`].
    #[must_use]
    pub fn custom_instructions(&self) -> Option<&str> {
        self.custom_instructions.as_deref()
    }

    /// Parent topic this request refines, if any.
    #[must_use]
    pub fn parent_topic(&self) -> Option<&str> {
        self.parent_topic.as_deref()
    }

    /// Caller-supplied persona that skips agent selection.
    #[must_use]
    pub const fn agent(&self) -> Option<&AgentProfile> {
        self.agent.as_ref()
    }
}

/// Builder for [`ResearchRequest`].
#[derive(Debug, Clone, Default)]
pub struct ResearchRequestBuilder {
    topic: String,
    report_type: Option<ReportType>,
    tone: Option<Tone>,
    max_subqueries: Option<usize>,
    max_subtopics: Option<usize>,
    max_results_per_query: Option<usize>,
    custom_instructions: Option<String>,
    parent_topic: Option<String>,
    agent: Option<AgentProfile>,
}

impl ResearchRequestBuilder {
    /// Sets the report type.
    #[must_use]
    pub const fn report_type(mut self, report_type: ReportType) -> Self {
        self.report_type = Some(report_type);
        self
    }

    /// Sets the tone.
    #[must_use]
    pub const fn tone(mut self, tone: Tone) -> Self {
        self.tone = Some(tone);
        self
    }

    /// Sets the maximum number of sub-queries.
    #[must_use]
    pub const fn max_subqueries(mut self, n: usize) -> Self {
        self.max_subqueries = Some(n);
        self
    }

    /// Sets the maximum number of sub-topics.
    #[must_use]
    pub const fn max_subtopics(mut self, n: usize) -> Self {
        self.max_subtopics = Some(n);
        self
    }

    /// Sets the maximum search results per sub-query.
    #[must_use]
    pub const fn max_results_per_query(mut self, n: usize) -> Self {
        self.max_results_per_query = Some(n);
        self
    }

    /// Sets instructions for the custom report type.
    #[must_use]
    pub fn custom_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.custom_instructions = Some(instructions.into());
        self
    }

    /// Sets the parent topic this request refines.
    #[must_use]
    pub fn parent_topic(mut self, parent: impl Into<String>) -> Self {
        self.parent_topic = Some(parent.into());
        self
    }

    /// Supplies a persona, skipping agent selection.
    #[must_use]
    pub fn agent(mut self, agent: AgentProfile) -> Self {
        self.agent = Some(agent);
        self
    }

    /// Validates and builds the request.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidRequest`] if the topic is empty, a
    /// bound is out of range, or a custom report has no instructions.
    pub fn build(self) -> Result<ResearchRequest, ConfigError> {
        let topic = self.topic.trim().to_string();
        if topic.is_empty() {
            return Err(ConfigError::InvalidRequest {
                field: "topic",
                message: "topic cannot be empty".to_string(),
            });
        }

        let max_subqueries = check_bounds(
            "max_subqueries",
            self.max_subqueries.unwrap_or(DEFAULT_MAX_SUBQUERIES),
            SUBQUERY_BOUNDS,
        )?;
        let max_subtopics = check_bounds(
            "max_subtopics",
            self.max_subtopics.unwrap_or(DEFAULT_MAX_SUBTOPICS),
            SUBTOPIC_BOUNDS,
        )?;
        let max_results_per_query = check_bounds(
            "max_results_per_query",
            self.max_results_per_query
                .unwrap_or(DEFAULT_MAX_RESULTS_PER_QUERY),
            RESULTS_PER_QUERY_BOUNDS,
        )?;

        let report_type = self.report_type.unwrap_or_default();
        let custom_instructions = self
            .custom_instructions
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        if report_type == ReportType::Custom && custom_instructions.is_none() {
            return Err(ConfigError::InvalidRequest {
                field: "custom_instructions",
                message: "the custom report type requires instructions".to_string(),
            });
        }

        Ok(ResearchRequest {
            topic,
            report_type,
            tone: self.tone.unwrap_or_default(),
            max_subqueries,
            max_subtopics,
            max_results_per_query,
            custom_instructions,
            parent_topic: self
                .parent_topic
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            agent: self.agent,
        })
    }
}

fn check_bounds(
    field: &'static str,
    value: usize,
    (min, max): (usize, usize),
) -> Result<usize, ConfigError> {
    if (min..=max).contains(&value) {
        Ok(value)
    } else {
        Err(ConfigError::InvalidRequest {
            field,
            message: format!("must be between {min} and {max}, got {value}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_builder_defaults() {
        let request = ResearchRequest::builder("  quantum sensing ")
            .build()
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(request.topic(), "quantum sensing");
        assert_eq!(request.report_type(), ReportType::Comprehensive);
        assert_eq!(request.tone(), Tone::Objective);
        assert_eq!(request.max_subqueries(), DEFAULT_MAX_SUBQUERIES);
        assert_eq!(request.max_subtopics(), DEFAULT_MAX_SUBTOPICS);
        assert_eq!(request.max_results_per_query(), DEFAULT_MAX_RESULTS_PER_QUERY);
        assert!(request.agent().is_none());
    }

    #[test]
    fn test_builder_rejects_blank_topic() {
        let result = ResearchRequest::builder("   ").build();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidRequest { field: "topic", .. })
        ));
    }

    #[test_case(0, 5, 5, "max_subqueries" ; "zero subqueries")]
    #[test_case(11, 5, 5, "max_subqueries" ; "too many subqueries")]
    #[test_case(3, 0, 5, "max_subtopics" ; "zero subtopics")]
    #[test_case(3, 11, 5, "max_subtopics" ; "too many subtopics")]
    #[test_case(3, 5, 0, "max_results_per_query" ; "zero results")]
    #[test_case(3, 5, 21, "max_results_per_query" ; "too many results")]
    fn test_builder_enforces_bounds(q: usize, t: usize, r: usize, expected: &str) {
        let result = ResearchRequest::builder("topic")
            .max_subqueries(q)
            .max_subtopics(t)
            .max_results_per_query(r)
            .build();
        match result {
            Err(ConfigError::InvalidRequest { field, .. }) => assert_eq!(field, expected),
            other => unreachable!("expected bound violation, got {other:?}"),
        }
    }

    #[test]
    fn test_custom_requires_instructions() {
        let result = ResearchRequest::builder("topic")
            .report_type(ReportType::Custom)
            .build();
        assert!(result.is_err());

        let ok = ResearchRequest::builder("topic")
            .report_type(ReportType::Custom)
            .custom_instructions("Write a FAQ")
            .build();
        assert!(ok.is_ok());
    }

    #[test_case("comprehensive", ReportType::Comprehensive)]
    #[test_case("research_report", ReportType::Comprehensive)]
    #[test_case("resource-summary", ReportType::ResourceSummary)]
    #[test_case("OUTLINE", ReportType::Outline)]
    #[test_case("custom_report", ReportType::Custom)]
    #[test_case("detailed", ReportType::Detailed)]
    fn test_report_type_parse(input: &str, expected: ReportType) {
        assert_eq!(input.parse::<ReportType>().ok(), Some(expected));
    }

    #[test]
    fn test_report_type_parse_unknown() {
        assert!("essay".parse::<ReportType>().is_err());
    }

    #[test]
    fn test_tone_round_trips_through_name() {
        for tone in Tone::ALL {
            assert_eq!(tone.as_str().parse::<Tone>().ok(), Some(tone));
        }
        assert!("sarcastic".parse::<Tone>().is_err());
    }

    #[test]
    fn test_only_detailed_is_multi_section() {
        let multi: Vec<_> = ReportType::ALL
            .into_iter()
            .filter(ReportType::is_multi_section)
            .collect();
        assert_eq!(multi, vec![ReportType::Detailed]);
    }
}
