//! CLI command implementations.
//!
//! Contains the business logic for each CLI command.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use crate::agent::config::ResearchConfig;
use crate::agent::prompt::PromptSet;
use crate::cli::output::{OutputFormat, format_report, format_report_types, format_tones};
use crate::cli::parser::{Cli, Commands};
use crate::core::{AgentProfile, ReportType, ResearchRequest, Tone};
use crate::error::CommandError;

/// Parameters for the run command.
#[derive(Debug, Clone, Default)]
pub struct RunParams<'a> {
    /// Research topic.
    pub topic: &'a str,
    /// Report type name.
    pub report_type: &'a str,
    /// Tone name.
    pub tone: &'a str,
    /// Maximum sub-queries.
    pub max_subqueries: usize,
    /// Maximum detailed-report sections.
    pub max_subtopics: usize,
    /// Search results kept per sub-query.
    pub max_results: usize,
    /// Instructions for the custom report type.
    pub instructions: Option<&'a str>,
    /// Parent topic.
    pub parent: Option<&'a str>,
    /// Persona override (name, role prompt).
    pub agent: Option<(&'a str, &'a str)>,
    /// Directory containing prompt template files.
    pub prompt_dir: Option<&'a Path>,
    /// Planner model override.
    pub planner_model: Option<&'a str>,
    /// Writer model override.
    pub writer_model: Option<&'a str>,
    /// Embedding provider override.
    pub embedding_provider: Option<&'a str>,
    /// Similarity threshold override.
    pub similarity_threshold: Option<f32>,
    /// Concurrency override.
    pub concurrency: Option<usize>,
    /// Word target override.
    pub total_words: Option<usize>,
    /// Enable the in-memory response cache.
    pub cache: bool,
    /// Enable telemetry logging.
    pub telemetry: bool,
}

/// Executes the CLI command.
///
/// # Returns
///
/// Result with output string on success.
///
/// # Errors
///
/// Returns an error if the command fails to execute.
pub fn execute(cli: &Cli) -> Result<String, CommandError> {
    let format = OutputFormat::parse(&cli.format);

    match &cli.command {
        Commands::Run {
            topic,
            report_type,
            tone,
            max_subqueries,
            max_subtopics,
            max_results,
            instructions,
            parent,
            agent_name,
            agent_role,
            prompt_dir,
            planner_model,
            writer_model,
            embedding_provider,
            similarity_threshold,
            concurrency,
            total_words,
            cache,
            telemetry,
        } => {
            let params = RunParams {
                topic,
                report_type,
                tone,
                max_subqueries: *max_subqueries,
                max_subtopics: *max_subtopics,
                max_results: *max_results,
                instructions: instructions.as_deref(),
                parent: parent.as_deref(),
                agent: agent_name.as_deref().zip(agent_role.as_deref()),
                prompt_dir: prompt_dir.as_deref(),
                planner_model: planner_model.as_deref(),
                writer_model: writer_model.as_deref(),
                embedding_provider: embedding_provider.as_deref(),
                similarity_threshold: *similarity_threshold,
                concurrency: *concurrency,
                total_words: *total_words,
                cache: *cache,
                telemetry: *telemetry,
            };
            cmd_run(&params, format)
        }
        Commands::InitPrompts { dir } => cmd_init_prompts(dir.as_deref(), format),
        Commands::Tones => format_tones(format),
        Commands::ReportTypes => format_report_types(format),
    }
}

/// Builds the research request from command parameters.
fn build_request(params: &RunParams<'_>) -> Result<ResearchRequest, CommandError> {
    let report_type: ReportType = params.report_type.parse()?;
    let tone: Tone = params.tone.parse()?;

    let mut builder = ResearchRequest::builder(params.topic)
        .report_type(report_type)
        .tone(tone)
        .max_subqueries(params.max_subqueries)
        .max_subtopics(params.max_subtopics)
        .max_results_per_query(params.max_results);
    if let Some(instructions) = params.instructions {
        builder = builder.custom_instructions(instructions);
    }
    if let Some(parent) = params.parent {
        builder = builder.parent_topic(parent);
    }
    if let Some((name, role)) = params.agent {
        builder = builder.agent(AgentProfile::new(name, role));
    }
    Ok(builder.build()?)
}

/// Builds the research configuration from env + CLI overrides.
fn build_config(params: &RunParams<'_>) -> Result<ResearchConfig, CommandError> {
    let mut builder = ResearchConfig::builder().from_env();
    if let Some(dir) = params.prompt_dir {
        builder = builder.prompt_dir(dir);
    }
    if let Some(model) = params.planner_model {
        builder = builder.planner_model(model);
    }
    if let Some(model) = params.writer_model {
        builder = builder.writer_model(model);
    }
    if let Some(provider) = params.embedding_provider {
        builder = builder.embedding_provider(provider);
    }
    if let Some(threshold) = params.similarity_threshold {
        builder = builder.similarity_threshold(threshold);
    }
    if let Some(n) = params.concurrency {
        builder = builder.max_concurrency(n);
    }
    if let Some(words) = params.total_words {
        builder = builder.total_words(words);
    }
    if params.cache {
        builder = builder.cache_enabled(true);
    }
    if params.telemetry {
        builder = builder.telemetry_enabled(true);
    }
    Ok(builder.build()?)
}

fn cmd_run(params: &RunParams<'_>, format: OutputFormat) -> Result<String, CommandError> {
    let request = build_request(params)?;
    let config = build_config(params)?;

    // Create tokio runtime as sync/async bridge
    let rt = tokio::runtime::Runtime::new().map_err(|e| {
        CommandError::ExecutionFailed(format!("Failed to create async runtime: {e}"))
    })?;

    let report = rt.block_on(crate::run_research(&config, &request))?;
    format_report(&report, format)
}

fn cmd_init_prompts(dir: Option<&Path>, format: OutputFormat) -> Result<String, CommandError> {
    let target_dir = dir
        .map(PathBuf::from)
        .or_else(PromptSet::default_dir)
        .ok_or_else(|| {
            CommandError::ExecutionFailed(
                "Could not determine home directory for default prompt path".to_string(),
            )
        })?;

    let written = PromptSet::write_defaults(&target_dir)?;

    match format {
        OutputFormat::Text => {
            if written.is_empty() {
                return Ok(format!(
                    "All prompt templates already exist in: {}\n",
                    target_dir.display()
                ));
            }
            let mut output = format!(
                "Wrote {} prompt template(s) to: {}\n",
                written.len(),
                target_dir.display()
            );
            for path in &written {
                let _ = writeln!(
                    output,
                    "  {}",
                    path.file_name()
                        .and_then(|n| n.to_str())
                        .unwrap_or("unknown")
                );
            }
            output.push_str("\nEdit these files to customize agent system prompts.\n");
            Ok(output)
        }
        OutputFormat::Json => {
            let json = serde_json::json!({
                "directory": target_dir.to_string_lossy(),
                "written": written
                    .iter()
                    .map(|p| p.to_string_lossy().into_owned())
                    .collect::<Vec<_>>(),
            });
            serde_json::to_string_pretty(&json)
                .map(|s| s + "\n")
                .map_err(|e| CommandError::OutputFormat(format!("JSON serialization failed: {e}")))
        }
    }
}
