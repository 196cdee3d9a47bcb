//! Output formatting for CLI commands.

use std::fmt::Write as _;

use serde::Serialize;

use crate::core::{Report, ReportType, Tone};
use crate::error::CommandError;

/// Output format of CLI commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// Pretty-printed JSON.
    Json,
}

impl OutputFormat {
    /// Parses a format name; anything other than `json` is text.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        if s.eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Text
        }
    }
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String, CommandError> {
    serde_json::to_string_pretty(value)
        .map(|mut s| {
            s.push('\n');
            s
        })
        .map_err(|e| CommandError::OutputFormat(format!("JSON serialization failed: {e}")))
}

/// Formats a finished report.
///
/// Text output is the report followed by a one-line run summary and any
/// partial failures.
///
/// # Errors
///
/// Returns [`CommandError::OutputFormat`] if JSON serialization fails.
pub fn format_report(report: &Report, format: OutputFormat) -> Result<String, CommandError> {
    if format == OutputFormat::Json {
        return to_json(report);
    }

    let meta = &report.metadata;
    let mut output = report.full_text.clone();
    let agent = meta.agent.as_ref().map_or("-", |a| a.name.as_str());
    let timeout_hint = if meta.retrieval_timed_out {
        " (retrieval timed out)"
    } else {
        ""
    };
    let _ = write!(
        output,
        "\n\n---\nAgent: {agent} | Sub-queries: {} | Results: {} | Sources: {} | Context: {} chunks, {} chars{timeout_hint} | Tokens: {} | Time: {:.1}s",
        meta.subqueries.len(),
        meta.search_results_fetched,
        meta.sources.len(),
        meta.context_chunks,
        meta.context_chars,
        meta.total_tokens,
        meta.elapsed.as_secs_f64()
    );
    for failure in &meta.partial_failures {
        let _ = write!(output, "\nPartial failure: {failure}");
    }
    output.push('\n');
    Ok(output)
}

#[derive(Serialize)]
struct NamedEntry<'a> {
    name: &'a str,
    description: &'a str,
}

/// Formats the accepted tones.
///
/// # Errors
///
/// Returns [`CommandError::OutputFormat`] if JSON serialization fails.
pub fn format_tones(format: OutputFormat) -> Result<String, CommandError> {
    let entries: Vec<NamedEntry<'_>> = Tone::ALL
        .iter()
        .map(|t| NamedEntry {
            name: t.as_str(),
            description: t.instruction(),
        })
        .collect();
    format_entries(&entries, format)
}

/// Formats the accepted report types.
///
/// # Errors
///
/// Returns [`CommandError::OutputFormat`] if JSON serialization fails.
pub fn format_report_types(format: OutputFormat) -> Result<String, CommandError> {
    let entries: Vec<NamedEntry<'_>> = ReportType::ALL
        .iter()
        .map(|t| NamedEntry {
            name: t.as_str(),
            description: t.description(),
        })
        .collect();
    format_entries(&entries, format)
}

fn format_entries(entries: &[NamedEntry<'_>], format: OutputFormat) -> Result<String, CommandError> {
    match format {
        OutputFormat::Json => to_json(entries),
        OutputFormat::Text => {
            let width = entries.iter().map(|e| e.name.len()).max().unwrap_or(0);
            let mut output = String::new();
            for entry in entries {
                let _ = writeln!(output, "{:<width$}  {}", entry.name, entry.description);
            }
            Ok(output)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::core::{
        AgentProfile, FailureStage, PartialFailure, ReportMetadata, Section, SubQuery,
    };

    fn report() -> Report {
        Report {
            topic: "heat pumps".to_string(),
            report_type: ReportType::Detailed,
            introduction: "# Heat pumps".to_string(),
            sections: vec![Section {
                title: "Efficiency".to_string(),
                body: "COP of 3-4.".to_string(),
            }],
            full_text: "# Heat pumps\n\nCOP of 3-4.".to_string(),
            metadata: ReportMetadata {
                session_id: "s-1".to_string(),
                agent: Some(AgentProfile::new("Engineer", "You are an engineer.")),
                subqueries: vec![SubQuery::new("heat pump efficiency")],
                sources: vec!["https://a.example".to_string()],
                search_results_fetched: 5,
                context_chunks: 3,
                context_chars: 1200,
                retrieval_timed_out: false,
                partial_failures: vec![PartialFailure::new(
                    FailureStage::Section,
                    "Costs",
                    "empty response",
                )],
                total_tokens: 4200,
                elapsed: Duration::from_millis(2500),
            },
        }
    }

    #[test]
    fn test_output_format_parse() {
        assert_eq!(OutputFormat::parse("json"), OutputFormat::Json);
        assert_eq!(OutputFormat::parse("JSON"), OutputFormat::Json);
        assert_eq!(OutputFormat::parse("text"), OutputFormat::Text);
        assert_eq!(OutputFormat::parse("yaml"), OutputFormat::Text);
    }

    #[test]
    fn test_format_report_text() {
        let output = format_report(&report(), OutputFormat::Text).unwrap_or_default();
        assert!(output.starts_with("# Heat pumps"));
        assert!(output.contains("Agent: Engineer | Sub-queries: 1"));
        assert!(output.contains("Tokens: 4200 | Time: 2.5s"));
        assert!(output.contains("Partial failure: section (Costs): empty response"));
    }

    #[test]
    fn test_format_report_json() {
        let output = format_report(&report(), OutputFormat::Json).unwrap_or_default();
        let value: serde_json::Value = serde_json::from_str(&output).unwrap_or_default();
        assert_eq!(value["report_type"], "detailed");
        assert_eq!(value["metadata"]["sources"][0], "https://a.example");
        assert_eq!(value["metadata"]["partial_failures"][0]["stage"], "section");
        assert_eq!(value["sections"][0]["title"], "Efficiency");
    }

    #[test]
    fn test_format_listings() {
        let tones = format_tones(OutputFormat::Text).unwrap_or_default();
        assert_eq!(tones.lines().count(), Tone::ALL.len());
        assert!(tones.contains("objective"));

        let types = format_report_types(OutputFormat::Json).unwrap_or_default();
        let value: serde_json::Value = serde_json::from_str(&types).unwrap_or_default();
        assert_eq!(value.as_array().map(Vec::len), Some(ReportType::ALL.len()));
    }
}
