//! Report composition.
//!
//! Single-call report types are written in one generation. The detailed
//! type is assembled from an outline, an introduction and one section per
//! sub-topic, written strictly in outline order.

use chrono::Utc;
use tracing::{debug, info, warn};

use super::config::ResearchConfig;
use super::gateway::Gateway;
use super::outline::OutlinePlanner;
use super::prompt::{
    WritingBrief, build_context_block, build_introduction_prompt, build_report_prompt,
    build_section_prompt,
};
use super::writer::ReportWriter;
use crate::core::{
    AgentProfile, ContextChunk, FailureStage, PartialFailure, Report, ReportMetadata,
    ResearchRequest, Section,
};
use crate::error::ResearchError;

/// Subsections allowed within one detailed-report section.
const MAX_SUBSECTIONS: usize = 5;

/// Writes the report from the merged context.
#[derive(Debug)]
pub struct ReportComposer {
    gateway: Gateway,
    writer: ReportWriter,
    outline: OutlinePlanner,
    context_budget: usize,
    total_words: usize,
    report_format: String,
}

impl ReportComposer {
    /// Creates a composer; `outline_prompt` is the outline planner's
    /// system prompt.
    #[must_use]
    pub fn new(gateway: Gateway, config: &ResearchConfig, outline_prompt: String) -> Self {
        Self {
            gateway,
            writer: ReportWriter::new(config),
            outline: OutlinePlanner::new(config, outline_prompt),
            context_budget: config.context_budget_chars,
            total_words: config.total_words,
            report_format: config.report_format.clone(),
        }
    }

    /// Composes the report for `request` as `agent` from `context`.
    ///
    /// The returned report carries the partial failures and token usage of
    /// composition in its metadata; the caller fills in the rest.
    ///
    /// # Errors
    ///
    /// Returns [`ResearchError::ReportGeneration`] if a single-call report
    /// cannot be generated and [`ResearchError::EmptyReport`] if a detailed
    /// report ends up with no text.
    pub async fn compose(
        &self,
        request: &ResearchRequest,
        agent: &AgentProfile,
        context: &[ContextChunk],
    ) -> Result<Report, ResearchError> {
        let context_block = build_context_block(context, self.context_budget);
        let brief = WritingBrief {
            topic: request.topic(),
            context: &context_block,
            tone: request.tone(),
            total_words: self.total_words,
            report_format: &self.report_format,
            date: Utc::now().date_naive(),
        };

        info!(
            topic = request.topic(),
            report_type = %request.report_type(),
            context_chars = context_block.chars().count(),
            "composing report"
        );

        if request.report_type().is_multi_section() {
            self.compose_detailed(request, agent, &brief).await
        } else {
            self.compose_single(request, agent, &brief).await
        }
    }

    async fn compose_single(
        &self,
        request: &ResearchRequest,
        agent: &AgentProfile,
        brief: &WritingBrief<'_>,
    ) -> Result<Report, ResearchError> {
        let prompt =
            build_report_prompt(request.report_type(), brief, request.custom_instructions());
        let response = self
            .writer
            .write(&self.gateway, agent, &prompt)
            .await
            .map_err(|source| ResearchError::ReportGeneration { source })?;

        Ok(Report {
            topic: request.topic().to_string(),
            report_type: request.report_type(),
            introduction: String::new(),
            sections: Vec::new(),
            full_text: response.content,
            metadata: ReportMetadata {
                total_tokens: response.usage.total_tokens,
                ..ReportMetadata::default()
            },
        })
    }

    async fn compose_detailed(
        &self,
        request: &ResearchRequest,
        agent: &AgentProfile,
        brief: &WritingBrief<'_>,
    ) -> Result<Report, ResearchError> {
        let mut failures = Vec::new();
        let mut total_tokens = 0u32;

        let subtopics = match self
            .outline
            .plan(&self.gateway, brief.topic, brief.context, request.max_subtopics())
            .await
        {
            Ok((subtopics, response)) => {
                total_tokens = total_tokens.saturating_add(response.usage.total_tokens);
                debug!(count = subtopics.len(), "outline planned");
                subtopics
            }
            Err(e) => {
                warn!(error = %e, "outline generation failed");
                failures.push(PartialFailure::new(FailureStage::Outline, brief.topic, e));
                Vec::new()
            }
        };

        let introduction = match self
            .writer
            .write(&self.gateway, agent, &build_introduction_prompt(brief))
            .await
        {
            Ok(response) => {
                total_tokens = total_tokens.saturating_add(response.usage.total_tokens);
                response.content
            }
            Err(e) => {
                warn!(error = %e, "introduction generation failed");
                failures.push(PartialFailure::new(FailureStage::Introduction, brief.topic, e));
                String::new()
            }
        };

        let mut sections: Vec<Section> = Vec::with_capacity(subtopics.len());
        for subtopic in &subtopics {
            let existing: Vec<String> = sections.iter().map(|s| s.title.clone()).collect();
            let prompt = build_section_prompt(brief, subtopic, &existing, MAX_SUBSECTIONS);
            match self.writer.write(&self.gateway, agent, &prompt).await {
                Ok(response) => {
                    total_tokens = total_tokens.saturating_add(response.usage.total_tokens);
                    debug!(ordinal = subtopic.ordinal, title = %subtopic.title, "section written");
                    sections.push(Section {
                        title: subtopic.title.clone(),
                        body: response.content,
                    });
                }
                Err(e) => {
                    warn!(ordinal = subtopic.ordinal, title = %subtopic.title, error = %e, "section skipped");
                    failures.push(PartialFailure::new(
                        FailureStage::Section,
                        &subtopic.title,
                        e,
                    ));
                }
            }
        }

        let full_text = assemble(&introduction, &sections);
        if full_text.is_empty() {
            return Err(ResearchError::EmptyReport {
                topic: request.topic().to_string(),
            });
        }

        Ok(Report {
            topic: request.topic().to_string(),
            report_type: request.report_type(),
            introduction,
            sections,
            full_text,
            metadata: ReportMetadata {
                partial_failures: failures,
                total_tokens,
                ..ReportMetadata::default()
            },
        })
    }
}

/// Joins the introduction and section bodies with blank lines.
fn assemble(introduction: &str, sections: &[Section]) -> String {
    std::iter::once(introduction)
        .chain(sections.iter().map(|s| s.body.as_str()))
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::agent::message::{ChatRequest, ChatResponse, Role, TokenUsage};
    use crate::agent::provider::LlmProvider;
    use crate::core::ReportType;
    use crate::error::GatewayError;
    use crate::retry::RetryPolicy;

    /// Answers by prompt marker; fails writer calls containing `fail_on`.
    struct ScriptedProvider {
        outline: Option<&'static str>,
        fail_on: Option<&'static str>,
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, GatewayError> {
            let user = request
                .messages
                .iter()
                .find(|m| m.role == Role::User)
                .map_or("", |m| m.content.as_str());
            if self.fail_on.is_some_and(|marker| user.contains(marker)) {
                return Err(GatewayError::InvalidRequest {
                    message: "rejected".to_string(),
                });
            }
            let content = if user.contains("Build a list of at most") {
                self.outline.unwrap_or("no outline here").to_string()
            } else if user.contains("report introduction") {
                "# Batteries\n\nIntro text.".to_string()
            } else if let Some(rest) = user.split("report on the subtopic: ").nth(1) {
                let title = rest.split(" under the main topic").next().unwrap_or_default();
                format!("## {title}\n\nBody of {title}.")
            } else {
                "Single report body.".to_string()
            };
            Ok(ChatResponse {
                content,
                usage: TokenUsage {
                    prompt_tokens: 1,
                    completion_tokens: 1,
                    total_tokens: 2,
                },
                finish_reason: Some("stop".to_string()),
            })
        }
    }

    fn composer(provider: ScriptedProvider) -> ReportComposer {
        let config = ResearchConfig::builder()
            .build()
            .unwrap_or_else(|_| unreachable!());
        let policy = RetryPolicy {
            max_attempts: 1,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(1),
            call_timeout: Duration::from_secs(5),
        };
        let gateway = Gateway::new(Arc::new(provider), policy);
        ReportComposer::new(gateway, &config, "outline system".to_string())
    }

    fn context() -> Vec<ContextChunk> {
        vec![ContextChunk {
            source_url: "https://a.example".to_string(),
            title: "A".to_string(),
            text: "Solid-state cells use ceramic electrolytes.".to_string(),
            relevance_score: 0.8,
        }]
    }

    fn request(report_type: ReportType, max_subtopics: usize) -> ResearchRequest {
        ResearchRequest::builder("solid-state batteries")
            .report_type(report_type)
            .max_subtopics(max_subtopics)
            .build()
            .unwrap_or_else(|_| unreachable!())
    }

    #[tokio::test]
    async fn test_single_call_report_has_no_sections() {
        let composer = composer(ScriptedProvider {
            outline: None,
            fail_on: None,
        });
        let report = composer
            .compose(
                &request(ReportType::Comprehensive, 3),
                &AgentProfile::fallback(),
                &context(),
            )
            .await
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(report.full_text, "Single report body.");
        assert!(report.sections.is_empty());
        assert!(report.introduction.is_empty());
        assert_eq!(report.metadata.total_tokens, 2);
    }

    #[tokio::test]
    async fn test_single_call_failure_is_terminal() {
        let composer = composer(ScriptedProvider {
            outline: None,
            fail_on: Some("Information:"),
        });
        let result = composer
            .compose(
                &request(ReportType::Comprehensive, 3),
                &AgentProfile::fallback(),
                &context(),
            )
            .await;
        assert!(matches!(result, Err(ResearchError::ReportGeneration { .. })));
    }

    #[tokio::test]
    async fn test_detailed_report_skips_failed_section() {
        let composer = composer(ScriptedProvider {
            outline: Some(r#"{"subtopics": [{"task": "Chemistry"}, {"task": "Costs"}, {"task": "Outlook"}]}"#),
            fail_on: Some("subtopic: Costs"),
        });
        let report = composer
            .compose(
                &request(ReportType::Detailed, 3),
                &AgentProfile::fallback(),
                &context(),
            )
            .await
            .unwrap_or_else(|_| unreachable!());

        let titles: Vec<&str> = report.sections.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["Chemistry", "Outlook"]);
        assert_eq!(report.metadata.partial_failures.len(), 1);
        assert_eq!(report.metadata.partial_failures[0].stage, FailureStage::Section);
        assert_eq!(report.metadata.partial_failures[0].subject, "Costs");
        assert!(report.full_text.starts_with("# Batteries"));
        assert!(report.full_text.contains("Body of Chemistry."));
        assert!(report.full_text.contains("Body of Outlook."));
        assert!(!report.full_text.contains("Body of Costs."));
    }

    #[tokio::test]
    async fn test_detailed_outline_failure_keeps_introduction() {
        let composer = composer(ScriptedProvider {
            outline: None,
            fail_on: None,
        });
        let report = composer
            .compose(
                &request(ReportType::Detailed, 3),
                &AgentProfile::fallback(),
                &context(),
            )
            .await
            .unwrap_or_else(|_| unreachable!());
        assert!(report.sections.is_empty());
        assert_eq!(report.full_text, "# Batteries\n\nIntro text.");
        assert_eq!(report.metadata.partial_failures[0].stage, FailureStage::Outline);
    }

    #[tokio::test]
    async fn test_detailed_with_nothing_written_is_empty_report() {
        let composer = composer(ScriptedProvider {
            outline: None,
            fail_on: Some("report introduction"),
        });
        let result = composer
            .compose(
                &request(ReportType::Detailed, 3),
                &AgentProfile::fallback(),
                &context(),
            )
            .await;
        assert!(matches!(result, Err(ResearchError::EmptyReport { .. })));
    }

    #[test]
    fn test_assemble_skips_empty_parts() {
        let sections = vec![
            Section {
                title: "A".to_string(),
                body: "Body A".to_string(),
            },
            Section {
                title: "B".to_string(),
                body: "  ".to_string(),
            },
        ];
        assert_eq!(assemble("", &sections), "Body A");
        assert_eq!(assemble("Intro", &sections), "Intro\n\nBody A");
    }
}
