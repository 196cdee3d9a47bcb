//! # literesearch
//!
//! Turns a research topic into a structured, sourced report by chaining
//! language-model calls, web search and embedding-based relevance
//! filtering.
//!
//! A run selects a research persona, derives search sub-queries, searches
//! and ranks every sub-query concurrently, compresses the results into a
//! budgeted context and composes the report, either in a single generation
//! or, for detailed reports, as an introduction plus one section per
//! outlined sub-topic.
//!
//! ```no_run
//! use literesearch::{ReportType, ResearchConfig, ResearchRequest};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ResearchConfig::from_env()?;
//! let request = ResearchRequest::builder("solid-state batteries")
//!     .report_type(ReportType::Detailed)
//!     .max_subtopics(4)
//!     .build()?;
//! let report = literesearch::run_research(&config, &request).await?;
//! assert!(!report.full_text.is_empty());
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod cli;
pub mod core;
pub mod error;
pub mod retrieval;
pub mod retry;
pub mod telemetry;

pub use agent::{
    Gateway, LlmProvider, MemoryCache, Orchestrator, PromptSet, ResearchConfig, ResponseCache,
};
pub use crate::core::{
    AgentProfile, ContextChunk, FailureStage, PartialFailure, Report, ReportMetadata, ReportType,
    ResearchRequest, SearchResult, Section, SubQuery, SubTopic, Tone,
};
pub use error::{
    AgentError, CommandError, ConfigError, EmbeddingError, GatewayError, Result, ResearchError,
    SearchError,
};
pub use retrieval::{Embedder, HashEmbedder, WebSearch};
pub use retry::RetryPolicy;
pub use telemetry::{CallRecord, Telemetry};

/// Researches `request` with providers built from `config`.
///
/// Creates the LLM provider, web search and embedder named in `config` and
/// runs an [`Orchestrator`]. With [`ResearchConfig::telemetry_enabled`],
/// call records are logged through `tracing`.
///
/// # Errors
///
/// Returns [`ResearchError::Config`] if a provider cannot be created, and
/// otherwise the errors of [`Orchestrator::run_research`].
pub async fn run_research(config: &ResearchConfig, request: &ResearchRequest) -> Result<Report> {
    let provider = agent::create_provider(config)?;
    let search = agent::create_search(config)?;
    let embedder = agent::create_embedder(config)?;

    let mut orchestrator = Orchestrator::new(provider, search, embedder, config.clone());
    if config.telemetry_enabled {
        orchestrator = orchestrator.with_telemetry(Telemetry::tracing_observer());
    }
    orchestrator.run_research(request).await
}
