//! Core data model.
//!
//! These types carry no I/O and are shared by the agent, retrieval and CLI
//! layers.

pub mod context;
pub mod report;
pub mod request;

pub use context::{AgentProfile, ContextChunk, SearchResult, SubQuery, SubTopic};
pub use report::{FailureStage, PartialFailure, Report, ReportMetadata, Section};
pub use request::{ReportType, ResearchRequest, ResearchRequestBuilder, Tone};
