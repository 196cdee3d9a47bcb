//! Command-line argument parsing.
//!
//! Defines the CLI structure using clap derive macros.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::core::request::{
    DEFAULT_MAX_RESULTS_PER_QUERY, DEFAULT_MAX_SUBQUERIES, DEFAULT_MAX_SUBTOPICS,
};

/// literesearch: turn a research topic into a sourced report.
///
/// Selects a research persona, searches the web with generated sub-queries,
/// keeps the most relevant passages and writes the report with an
/// OpenAI-compatible model.
#[derive(Parser, Debug)]
#[command(name = "literesearch")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, default_value = "text", global = true)]
    pub format: String,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Research a topic and print the report.
    ///
    /// Requires an LLM API key (`OPENAI_API_KEY`) and a Tavily key
    /// (`TAVILY_API_KEY`). Use `--embedding-provider hash` to rank without
    /// an embeddings API.
    #[command(after_help = r#"Examples:
  literesearch run "solid-state batteries"
  literesearch run "EU AI act" --report-type detailed --max-subtopics 4
  literesearch run "rust async runtimes" --tone critical --max-results 8
  literesearch run "ocean acidification" --report-type custom --instructions "Write a one-page brief"
  literesearch --format json run "heat pumps" | jq '.metadata.sources'
"#)]
    Run {
        /// The research topic.
        topic: String,

        /// Report type (comprehensive, resource_summary, outline, custom, detailed).
        #[arg(short = 't', long, default_value = "comprehensive")]
        report_type: String,

        /// Writing tone (see `literesearch tones`).
        #[arg(long, default_value = "objective")]
        tone: String,

        /// Maximum generated search sub-queries (1-10).
        #[arg(long, default_value_t = DEFAULT_MAX_SUBQUERIES)]
        max_subqueries: usize,

        /// Maximum sections of a detailed report (1-10).
        #[arg(long, default_value_t = DEFAULT_MAX_SUBTOPICS)]
        max_subtopics: usize,

        /// Search results kept per sub-query (1-20).
        #[arg(short = 'k', long = "max-results", default_value_t = DEFAULT_MAX_RESULTS_PER_QUERY)]
        max_results: usize,

        /// Instructions for the `custom` report type.
        #[arg(long)]
        instructions: Option<String>,

        /// Parent topic; sub-queries are generated for "parent - topic".
        #[arg(long)]
        parent: Option<String>,

        /// Persona name; skips persona selection (requires --agent-role).
        #[arg(long, requires = "agent_role")]
        agent_name: Option<String>,

        /// Persona role prompt; skips persona selection (requires --agent-name).
        #[arg(long, requires = "agent_name")]
        agent_role: Option<String>,

        /// Directory containing prompt template files.
        #[arg(long)]
        prompt_dir: Option<PathBuf>,

        /// Model for persona, sub-query and outline calls.
        #[arg(long)]
        planner_model: Option<String>,

        /// Model for report and section writing.
        #[arg(long)]
        writer_model: Option<String>,

        /// Embedding provider (openai, hash).
        #[arg(long)]
        embedding_provider: Option<String>,

        /// Discard passages below this cosine similarity (0 disables).
        #[arg(long = "similarity-threshold")]
        similarity_threshold: Option<f32>,

        /// Maximum concurrent sub-query tasks.
        #[arg(long)]
        concurrency: Option<usize>,

        /// Target report length in words.
        #[arg(long)]
        total_words: Option<usize>,

        /// Cache identical generation requests for the run.
        #[arg(long)]
        cache: bool,

        /// Log one telemetry record per external call.
        #[arg(long)]
        telemetry: bool,
    },

    /// Write default prompt templates to a directory.
    ///
    /// Existing files are not overwritten.
    #[command(name = "init-prompts")]
    InitPrompts {
        /// Target directory (default: ~/.config/literesearch/prompts).
        dir: Option<PathBuf>,
    },

    /// List accepted writing tones.
    Tones,

    /// List accepted report types.
    #[command(name = "report-types")]
    ReportTypes,
}
