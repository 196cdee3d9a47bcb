//! Language-model side of the research pipeline.
//!
//! Provides the agents that plan and write a report, the gateway every
//! generation call goes through, and the orchestrator tying them to
//! retrieval. Providers sit behind the [`LlmProvider`] abstraction backed
//! by OpenAI-compatible APIs.
//!
//! # Architecture
//!
//! ```text
//! ResearchRequest → Orchestrator
//!   ├── AgentSelector (chooses a persona)
//!   ├── SubQueryPlanner (derives search queries)
//!   ├── Retriever → N concurrent sub-query tasks
//!   │   └── search → filter → RelevanceRanker → Vec<ContextChunk>
//!   ├── Merge into a budgeted context
//!   └── ReportComposer
//!       ├── ReportWriter (single-call report types)
//!       └── OutlinePlanner → introduction → sections (detailed)
//! ```

pub mod cache;
pub mod client;
pub mod composer;
pub mod config;
pub mod gateway;
pub mod message;
pub mod orchestrator;
pub mod outline;
pub mod planner;
pub mod prompt;
pub mod provider;
pub mod providers;
pub mod selector;
pub mod traits;
pub mod writer;

// Re-export key types
pub use cache::{MemoryCache, ResponseCache};
pub use client::{create_embedder, create_provider, create_search};
pub use composer::ReportComposer;
pub use config::{ResearchConfig, ResearchConfigBuilder};
pub use gateway::Gateway;
pub use message::{ChatMessage, ChatRequest, ChatResponse, Role, TokenUsage};
pub use orchestrator::Orchestrator;
pub use outline::OutlinePlanner;
pub use planner::{SubQueryPlanner, parse_subqueries};
pub use prompt::PromptSet;
pub use provider::LlmProvider;
pub use providers::{OpenAiProvider, ProviderKind};
pub use selector::AgentSelector;
pub use traits::{Agent, AgentResponse};
pub use writer::ReportWriter;
