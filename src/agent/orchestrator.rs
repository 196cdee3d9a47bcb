//! Orchestrator for the research pipeline.
//!
//! Coordinates the full run: persona selection → sub-query generation →
//! concurrent retrieval → report composition → metadata.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use tracing::{Instrument, info, info_span, warn};
use uuid::Uuid;

use super::cache::{MemoryCache, ResponseCache};
use super::composer::ReportComposer;
use super::config::ResearchConfig;
use super::gateway::Gateway;
use super::planner::SubQueryPlanner;
use super::prompt::PromptSet;
use super::provider::LlmProvider;
use super::selector::AgentSelector;
use crate::core::context::FALLBACK_AGENT_NAME;
use crate::core::{
    AgentProfile, ContextChunk, FailureStage, PartialFailure, Report, ResearchRequest, SubQuery,
};
use crate::error::ResearchError;
use crate::retrieval::embedding::Embedder;
use crate::retrieval::ranker::{RankerSettings, RelevanceRanker};
use crate::retrieval::retriever::Retriever;
use crate::retrieval::search::WebSearch;
use crate::telemetry::Telemetry;

/// Orchestrates research runs.
///
/// Holds the capabilities and configuration shared by runs; everything a
/// run produces is owned by that run.
pub struct Orchestrator {
    gateway: Gateway,
    search: Arc<dyn WebSearch>,
    embedder: Arc<dyn Embedder>,
    config: ResearchConfig,
    prompts: PromptSet,
    telemetry: Telemetry,
}

impl Orchestrator {
    /// Creates a new orchestrator from capabilities and configuration.
    ///
    /// Loads prompt templates from the directory specified in
    /// [`ResearchConfig::prompt_dir`], falling back to compiled-in defaults.
    /// An in-memory response cache is attached when
    /// [`ResearchConfig::cache_enabled`] is set.
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        search: Arc<dyn WebSearch>,
        embedder: Arc<dyn Embedder>,
        config: ResearchConfig,
    ) -> Self {
        let prompts = PromptSet::load(config.prompt_dir.as_deref());
        let mut gateway = Gateway::new(provider, config.retry_policy())
            .with_cost_per_1k_tokens(config.cost_per_1k_tokens);
        if config.cache_enabled {
            gateway = gateway.with_cache(Arc::new(MemoryCache::new()));
        }
        Self {
            gateway,
            search,
            embedder,
            config,
            prompts,
            telemetry: Telemetry::disabled(),
        }
    }

    /// Replaces the prompt templates.
    #[must_use]
    pub fn with_prompts(mut self, prompts: PromptSet) -> Self {
        self.prompts = prompts;
        self
    }

    /// Replaces the response cache.
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<dyn ResponseCache>) -> Self {
        self.gateway = self.gateway.with_cache(cache);
        self
    }

    /// Emits a [`crate::telemetry::CallRecord`] for every external call.
    #[must_use]
    pub fn with_telemetry(mut self, telemetry: Telemetry) -> Self {
        self.gateway = self.gateway.with_telemetry(telemetry.clone());
        self.telemetry = telemetry;
        self
    }

    /// Researches `request` and composes its report.
    ///
    /// # Steps
    ///
    /// 1. Select a persona (unless the request carries one)
    /// 2. Generate sub-queries
    /// 3. Search and rank every sub-query concurrently
    /// 4. Merge the ranked chunks into a budgeted context
    /// 5. Compose the report
    ///
    /// Failures of steps 1 and 2, of individual sub-queries, and of single
    /// detailed-report parts degrade the report and are listed in its
    /// metadata.
    ///
    /// # Errors
    ///
    /// Returns [`ResearchError::NoContext`] when retrieval yields nothing,
    /// and the composition errors of [`ReportComposer::compose`].
    pub async fn run_research(&self, request: &ResearchRequest) -> Result<Report, ResearchError> {
        let session_id = Uuid::new_v4().to_string();
        let span = info_span!("research", session_id = %session_id, topic = request.topic());
        self.run(request, session_id).instrument(span).await
    }

    async fn run(
        &self,
        request: &ResearchRequest,
        session_id: String,
    ) -> Result<Report, ResearchError> {
        let started = Instant::now();
        let mut failures: Vec<PartialFailure> = Vec::new();
        let mut total_tokens = 0u32;

        info!(report_type = %request.report_type(), "research started");

        // Step 1: persona
        let agent = match request.agent() {
            Some(agent) => agent.clone(),
            None => {
                let selector = AgentSelector::new(&self.config, self.prompts.selector.clone());
                match selector.select(&self.gateway, request.topic()).await {
                    Ok((agent, response)) => {
                        total_tokens = total_tokens.saturating_add(response.usage.total_tokens);
                        agent
                    }
                    Err(e) => {
                        warn!(error = %e, "persona selection failed, using default agent");
                        failures.push(PartialFailure::new(
                            FailureStage::AgentSelection,
                            request.topic(),
                            e,
                        ));
                        AgentProfile::new(FALLBACK_AGENT_NAME, self.prompts.persona.clone())
                    }
                }
            }
        };
        info!(agent = %agent.name, "persona selected");

        // Step 2: sub-queries
        let task = request.parent_topic().map_or_else(
            || request.topic().to_string(),
            |parent| format!("{parent} - {}", request.topic()),
        );
        let planner = SubQueryPlanner::new(&self.config);
        let subqueries = match planner
            .generate(&self.gateway, &agent, &task, request.max_subqueries())
            .await
        {
            Ok((subqueries, response)) => {
                total_tokens = total_tokens.saturating_add(response.usage.total_tokens);
                subqueries
            }
            Err(e) => {
                warn!(error = %e, "sub-query generation failed, searching the topic only");
                failures.push(PartialFailure::new(FailureStage::SubqueryGeneration, &task, e));
                vec![SubQuery::new(task.clone())]
            }
        };
        info!(count = subqueries.len(), "sub-queries planned");

        // Steps 3-4: retrieval
        let ranker = RelevanceRanker::new(
            Arc::clone(&self.embedder),
            RankerSettings::from_config(&self.config),
            self.config.retry_policy(),
        )
        .with_telemetry(self.telemetry.clone());
        let retriever = Retriever::new(Arc::clone(&self.search), Arc::new(ranker), &self.config)
            .with_telemetry(self.telemetry.clone());
        let retrieval = retriever
            .retrieve(&subqueries, request.max_results_per_query())
            .await;
        failures.extend(retrieval.failures);

        if retrieval.chunks.is_empty() {
            warn!(failures = failures.len(), "no usable context");
            return Err(ResearchError::NoContext {
                failures: failures.iter().map(ToString::to_string).collect(),
            });
        }

        // Step 5: composition
        let composer = ReportComposer::new(
            self.gateway.clone(),
            &self.config,
            self.prompts.outline.clone(),
        );
        let mut report = composer.compose(request, &agent, &retrieval.chunks).await?;

        failures.append(&mut report.metadata.partial_failures);
        let metadata = &mut report.metadata;
        metadata.session_id = session_id;
        metadata.agent = Some(agent);
        metadata.subqueries = subqueries;
        metadata.sources = distinct_sources(&retrieval.chunks);
        metadata.search_results_fetched = retrieval.fetched;
        metadata.context_chunks = retrieval.chunks.len();
        metadata.context_chars = retrieval.chunks.iter().map(|c| c.text.chars().count()).sum();
        metadata.retrieval_timed_out = retrieval.timed_out;
        metadata.partial_failures = failures;
        metadata.total_tokens = metadata.total_tokens.saturating_add(total_tokens);
        metadata.elapsed = started.elapsed();

        info!(
            sections = report.sections.len(),
            sources = report.metadata.sources.len(),
            partial_failures = report.metadata.partial_failures.len(),
            total_tokens = report.metadata.total_tokens,
            elapsed_ms = u64::try_from(report.metadata.elapsed.as_millis()).unwrap_or(u64::MAX),
            "research complete"
        );

        Ok(report)
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("gateway", &self.gateway)
            .field("search", &self.search.name())
            .field("embedder", &self.embedder.name())
            .finish_non_exhaustive()
    }
}

/// Source URLs of `chunks` in context order, without repeats.
fn distinct_sources(chunks: &[ContextChunk]) -> Vec<String> {
    let mut seen = HashSet::new();
    chunks
        .iter()
        .filter(|c| seen.insert(c.source_url.as_str()))
        .map(|c| c.source_url.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distinct_sources_keeps_order() {
        let chunk = |url: &str| ContextChunk {
            source_url: url.to_string(),
            title: String::new(),
            text: String::new(),
            relevance_score: 0.0,
        };
        let sources = distinct_sources(&[chunk("b"), chunk("a"), chunk("b")]);
        assert_eq!(sources, vec!["b", "a"]);
    }
}
