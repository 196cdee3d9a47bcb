//! Final report and run metadata.

use std::fmt;
use std::time::Duration;

use serde::Serialize;

use super::context::{AgentProfile, SubQuery};
use super::request::ReportType;

/// A generated section of a detailed report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Section {
    /// Sub-topic heading the section was generated for.
    pub title: String,
    /// Generated markdown body.
    pub body: String,
}

/// The composed research report.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    /// Research topic.
    pub topic: String,
    /// Report type that was composed.
    pub report_type: ReportType,
    /// Introduction (detailed reports only; empty otherwise).
    pub introduction: String,
    /// Sections in outline order (detailed reports only).
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sections: Vec<Section>,
    /// Canonical assembled output.
    pub full_text: String,
    /// How the report was produced.
    pub metadata: ReportMetadata,
}

/// Pipeline stage at which a degraded-but-tolerated failure occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    /// Persona selection fell back to the generic persona.
    AgentSelection,
    /// Sub-query generation fell back to the raw topic.
    SubqueryGeneration,
    /// A sub-query's web search failed.
    Search,
    /// A sub-query's ranking (or one of its candidates) failed.
    Ranking,
    /// Detailed-report outline generation failed.
    Outline,
    /// Detailed-report introduction generation failed.
    Introduction,
    /// One detailed-report section failed.
    Section,
}

impl FailureStage {
    /// Returns the stage name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::AgentSelection => "agent_selection",
            Self::SubqueryGeneration => "subquery_generation",
            Self::Search => "search",
            Self::Ranking => "ranking",
            Self::Outline => "outline",
            Self::Introduction => "introduction",
            Self::Section => "section",
        }
    }
}

/// A component-level error that degraded but did not abort the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartialFailure {
    /// Where it happened.
    pub stage: FailureStage,
    /// What it concerned (sub-query text, URL, sub-topic title, topic).
    pub subject: String,
    /// Error message.
    pub message: String,
}

impl PartialFailure {
    /// Creates a partial failure record.
    #[must_use]
    pub fn new(stage: FailureStage, subject: impl Into<String>, message: impl fmt::Display) -> Self {
        Self {
            stage,
            subject: subject.into(),
            message: message.to_string(),
        }
    }
}

impl fmt::Display for PartialFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}): {}",
            self.stage.as_str(),
            self.subject,
            self.message
        )
    }
}

/// Run metadata attached to every [`Report`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReportMetadata {
    /// Unique id of the research run.
    pub session_id: String,
    /// Persona that steered generation.
    pub agent: Option<AgentProfile>,
    /// Sub-queries that were searched.
    pub subqueries: Vec<SubQuery>,
    /// Distinct source URLs of the context chunks, in context order.
    pub sources: Vec<String>,
    /// Total search results fetched across all sub-queries.
    pub search_results_fetched: usize,
    /// Context chunks fed to generation.
    pub context_chunks: usize,
    /// Characters of chunk text fed to generation.
    pub context_chars: usize,
    /// Whether the retrieval deadline cut the fan-out short.
    pub retrieval_timed_out: bool,
    /// Degraded-but-tolerated failures.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub partial_failures: Vec<PartialFailure>,
    /// Total tokens reported by the language model.
    pub total_tokens: u32,
    /// Wall-clock duration of the run.
    #[serde(serialize_with = "serialize_duration")]
    pub elapsed: Duration,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn serialize_duration<S>(d: &Duration, s: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    s.serialize_f64(d.as_secs_f64())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_failure_display() {
        let failure = PartialFailure::new(FailureStage::Search, "solid-state batteries", "timed out");
        assert_eq!(
            failure.to_string(),
            "search (solid-state batteries): timed out"
        );
    }

    #[test]
    fn test_report_serialization_skips_empty_sections() {
        let report = Report {
            topic: "t".to_string(),
            report_type: ReportType::Outline,
            introduction: String::new(),
            sections: Vec::new(),
            full_text: "# Outline".to_string(),
            metadata: ReportMetadata {
                elapsed: Duration::from_millis(1500),
                ..ReportMetadata::default()
            },
        };
        let json = serde_json::to_string(&report).unwrap_or_default();
        assert!(!json.contains("\"sections\""));
        assert!(!json.contains("partial_failures"));
        assert!(json.contains("\"report_type\":\"outline\""));
        assert!(json.contains("\"elapsed\":1.5"));
    }
}
