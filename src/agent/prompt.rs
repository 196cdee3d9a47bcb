//! System prompts and template builders for agents.
//!
//! The persona selector, outline planner and fallback persona prompts can be
//! overridden from markdown files (see [`PromptSet::load`]). Report templates
//! are built from the request by the `build_*` functions.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use crate::core::context::FALLBACK_ROLE_PROMPT;
use crate::core::{ContextChunk, ReportType, SubTopic, Tone};

/// System prompt for the persona selector agent.
pub const SELECTOR_SYSTEM_PROMPT: &str = r#"This task involves researching a given topic, regardless of its complexity or whether there are clear answers. Research is performed by a specific agent, and each agent requires different instructions based on its type and role definition.

## Agents

Agents are determined by the domain of the topic. Each agent has a name prefixed with an emoji matching its professional domain, and a role prompt describing how it writes.

## Output Format (JSON)

```json
{
  "server": "<emoji> <agent name>",
  "agent_role_prompt": "<role prompt for the agent>"
}
```

## Examples

task: "Should I invest in Apple stock?"
{"server": "💰 Financial Analyst", "agent_role_prompt": "You are an experienced AI financial analyst assistant. Your primary goal is to write comprehensive, insightful, objective, and well-structured financial reports based on provided data and trends."}

task: "Could sneaker reselling become a profitable business?"
{"server": "📈 Business Analyst", "agent_role_prompt": "You are an experienced AI business analyst assistant. Your primary goal is to create comprehensive, insightful, objective, and systematic business reports based on provided business data, market trends, and strategic analysis."}

task: "What are the most interesting attractions in Tel Aviv?"
{"server": "🌍 Travel Advisor", "agent_role_prompt": "You are a knowledgeable AI travel advisor assistant. Your primary task is to write engaging, insightful, objective, and well-structured travel reports for specified locations, including historical, attraction, and cultural insights."}

Return ONLY the JSON object, no surrounding text."#;

/// System prompt for the outline (sub-topic) planner agent.
pub const OUTLINE_SYSTEM_PROMPT: &str = r#"You are a research editor. You turn a research topic and collected research data into the list of headings of a detailed report.

## Rules

- Every subtopic must be relevant to the topic and supported by the research data.
- There must be no duplicate subtopics.
- Order the subtopics so they read meaningfully as consecutive sections of one report.
- Do not include an introduction, conclusion or references heading.
- Write all subtopics in English.

## Output Format (JSON)

```json
{"subtopics": [{"task": "<heading>"}, {"task": "<heading>"}]}
```

Return ONLY the JSON object, no surrounding text."#;

/// Default prompt directory under user config.
const DEFAULT_PROMPT_DIR: &str = ".config/literesearch/prompts";

/// Filename for the persona selector prompt template.
const SELECTOR_FILENAME: &str = "selector.md";
/// Filename for the outline planner prompt template.
const OUTLINE_FILENAME: &str = "outline.md";
/// Filename for the fallback persona prompt template.
const PERSONA_FILENAME: &str = "persona.md";

/// Prompts that can be customized from disk.
///
/// Loaded from external template files when available, falling back to
/// compiled-in defaults. Use [`PromptSet::load`] to resolve the prompt
/// directory from CLI flags, environment variables, or the default path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptSet {
    /// System prompt for the persona selector agent.
    pub selector: String,
    /// System prompt for the outline planner agent.
    pub outline: String,
    /// Role prompt of the fallback persona.
    pub persona: String,
}

impl PromptSet {
    /// Loads prompts from the given directory, falling back to compiled-in defaults.
    ///
    /// Resolution order for `prompt_dir`:
    /// 1. Explicit `prompt_dir` argument (from `--prompt-dir` CLI flag)
    /// 2. `RESEARCH_PROMPT_DIR` environment variable
    /// 3. `~/.config/literesearch/prompts/`
    ///
    /// Each file is loaded independently; a missing or blank file uses its default.
    #[must_use]
    pub fn load(prompt_dir: Option<&Path>) -> Self {
        let resolved_dir = prompt_dir
            .map(PathBuf::from)
            .or_else(|| std::env::var("RESEARCH_PROMPT_DIR").ok().map(PathBuf::from))
            .or_else(Self::default_dir);

        let load_file = |filename: &str, default: &str| -> String {
            resolved_dir
                .as_ref()
                .map(|dir| dir.join(filename))
                .and_then(|path| std::fs::read_to_string(&path).ok())
                .filter(|text| !text.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        Self {
            selector: load_file(SELECTOR_FILENAME, SELECTOR_SYSTEM_PROMPT),
            outline: load_file(OUTLINE_FILENAME, OUTLINE_SYSTEM_PROMPT),
            persona: load_file(PERSONA_FILENAME, FALLBACK_ROLE_PROMPT),
        }
    }

    /// Returns compiled-in defaults without checking the filesystem.
    #[must_use]
    pub fn defaults() -> Self {
        Self {
            selector: SELECTOR_SYSTEM_PROMPT.to_string(),
            outline: OUTLINE_SYSTEM_PROMPT.to_string(),
            persona: FALLBACK_ROLE_PROMPT.to_string(),
        }
    }

    /// Writes the compiled-in default prompts to the given directory.
    ///
    /// Creates the directory if it does not exist. Existing files are
    /// **not** overwritten; use this for initial scaffolding only.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if directory creation or file writing fails.
    pub fn write_defaults(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
        std::fs::create_dir_all(dir)?;

        let templates = [
            (SELECTOR_FILENAME, SELECTOR_SYSTEM_PROMPT),
            (OUTLINE_FILENAME, OUTLINE_SYSTEM_PROMPT),
            (PERSONA_FILENAME, FALLBACK_ROLE_PROMPT),
        ];

        let mut written = Vec::new();
        for (filename, content) in &templates {
            let path = dir.join(filename);
            if !path.exists() {
                std::fs::write(&path, content)?;
                written.push(path);
            }
        }

        Ok(written)
    }

    /// Returns the default prompt directory under the user's home.
    ///
    /// Returns `None` if the home directory cannot be determined.
    #[must_use]
    pub fn default_dir() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(DEFAULT_PROMPT_DIR))
    }
}

/// Everything a writing prompt needs besides its type-specific task.
#[derive(Debug, Clone, Copy)]
pub struct WritingBrief<'a> {
    /// Research topic.
    pub topic: &'a str,
    /// Formatted context block (see [`build_context_block`]).
    pub context: &'a str,
    /// Requested tone.
    pub tone: Tone,
    /// Target length in words.
    pub total_words: usize,
    /// Citation style, e.g. `APA`.
    pub report_format: &'a str,
    /// Date the model should assume as today.
    pub date: NaiveDate,
}

fn format_date(date: NaiveDate) -> String {
    date.format("%B %d, %Y").to_string()
}

/// Builds the user message for the persona selector.
#[must_use]
pub fn build_selector_prompt(topic: &str) -> String {
    format!("task: {topic}")
}

/// Builds the user message asking for `max_n` search queries.
#[must_use]
pub fn build_subquery_prompt(task: &str, max_n: usize, date: NaiveDate) -> String {
    format!(
        "Write {max_n} google search queries to search online that form an objective opinion \
         from the following task: \"{task}\"\n\
         Assume the current date is {date} if required.\n\
         You must respond with a list of strings in the following format: \
         [\"query 1\", \"query 2\", \"query 3\"].\n\
         The response should contain ONLY the list.",
        date = format_date(date),
    )
}

/// Formats context chunks as a source-attributed block of at most
/// `budget` characters.
///
/// Chunks are emitted in the given order; a chunk that does not fit is
/// truncated and nothing after it is emitted.
#[must_use]
pub fn build_context_block(chunks: &[ContextChunk], budget: usize) -> String {
    let mut block = String::new();
    let mut used = 0;

    for chunk in chunks {
        let entry = chunk.to_context_entry();
        let len = entry.chars().count();
        if used + len <= budget {
            block.push_str(&entry);
            used += len;
        } else {
            block.extend(entry.chars().take(budget - used));
            break;
        }
    }

    block
}

/// Builds the user message of a single-call report.
///
/// `instructions` is only used by [`ReportType::Custom`]. The detailed
/// type is composed from the outline, introduction and section builders
/// and falls back to the comprehensive template here.
#[must_use]
pub fn build_report_prompt(
    report_type: ReportType,
    brief: &WritingBrief<'_>,
    instructions: Option<&str>,
) -> String {
    match report_type {
        ReportType::ResourceSummary => build_resource_prompt(brief),
        ReportType::Outline => build_outline_report_prompt(brief),
        ReportType::Custom => build_custom_prompt(brief, instructions.unwrap_or_default()),
        ReportType::Comprehensive | ReportType::Detailed => build_comprehensive_prompt(brief),
    }
}

fn build_comprehensive_prompt(brief: &WritingBrief<'_>) -> String {
    let format = brief.report_format;
    format!(
        "Information: \"{context}\"\n\
         ---\n\
         Using the above information, answer the following query or task: \"{topic}\" in a detailed report.\n\
         The report should focus on the answer to the query, should be well structured, informative, \
         in-depth and comprehensive, with facts and numbers if available and at least {words} words.\n\
         You should strive to write the report as long as you can using all relevant and necessary information provided.\n\n\
         Please follow all of the following guidelines in your report:\n\
         - You MUST determine your own concrete and valid opinion based on the given information. Do NOT defer to general and meaningless conclusions.\n\
         - You MUST write the report with markdown syntax and {format} format.\n\
         - Use in-text citation references in {format} format and make it with markdown hyperlink placed at the end of the sentence or paragraph that references them like this: ([in-text citation](url)).\n\
         - You MUST write all used source urls at the end of the report as references, and make sure to not add duplicated sources, but only one reference for each. \
         Every url should be hyperlinked: [url website](url).\n\
         - Write the report in a {tone} tone.\n\
         - You MUST write the report in English.\n\n\
         Assume that the current date is {date}.",
        context = brief.context,
        topic = brief.topic,
        words = brief.total_words,
        tone = brief.tone.instruction(),
        date = format_date(brief.date),
    )
}

fn build_resource_prompt(brief: &WritingBrief<'_>) -> String {
    format!(
        "\"{context}\"\n\n\
         Based on the above information, generate a bibliography recommendation report for the following \
         question or topic: \"{topic}\". The report should provide a detailed analysis of each recommended resource, \
         explaining how each source can contribute to finding answers to the research question.\n\
         Focus on the relevance, reliability, and significance of each source.\n\
         Ensure that the report is well-structured, informative, in-depth, and follows Markdown syntax.\n\
         Include relevant facts, figures, and numbers whenever available.\n\
         The report should have a minimum length of {words} words.\n\
         You MUST include all relevant source urls.\n\
         Write the report in a {tone} tone and in English.",
        context = brief.context,
        topic = brief.topic,
        words = brief.total_words,
        tone = brief.tone.instruction(),
    )
}

fn build_outline_report_prompt(brief: &WritingBrief<'_>) -> String {
    format!(
        "\"{context}\"\n\n\
         Using the above information, generate an outline for a research report in Markdown syntax for the \
         following question or topic: \"{topic}\". The outline should provide a well-structured framework for \
         the research report, including the main sections, subsections, and key points to be covered.\n\
         The research report should be detailed, informative, in-depth, and a minimum of {words} words.\n\
         Use appropriate Markdown syntax to format the outline and ensure readability.\n\
         You MUST write the outline in English.",
        context = brief.context,
        topic = brief.topic,
        words = brief.total_words,
    )
}

fn build_custom_prompt(brief: &WritingBrief<'_>, instructions: &str) -> String {
    format!(
        "\"{context}\"\n\n\
         Topic: \"{topic}\"\n\n\
         Using the above information, follow these instructions:\n{instructions}\n\n\
         Write in a {tone} tone, in English, using markdown syntax. Cite sources as markdown hyperlinks \
         ([Website Name](url)) where relevant.\n\
         Assume that the current date is {date}.",
        context = brief.context,
        topic = brief.topic,
        tone = brief.tone.instruction(),
        date = format_date(brief.date),
    )
}

/// Builds the user message asking for at most `max_subtopics` headings.
#[must_use]
pub fn build_outline_prompt(topic: &str, context: &str, max_subtopics: usize) -> String {
    format!(
        "Based on the following topic:\n\n{topic}\n\n\
         and research data:\n\n{context}\n\n\
         Build a list of at most {max_subtopics} subtopics that will become the headings of the report document."
    )
}

/// Builds the user message for the detailed-report introduction.
#[must_use]
pub fn build_introduction_prompt(brief: &WritingBrief<'_>) -> String {
    format!(
        "{context}\n\n\
         Using the above latest information, prepare a detailed report introduction on the topic -- {topic}.\n\
         - The introduction should be succinct, well-structured, informative with markdown syntax.\n\
         - As this introduction will be part of a larger report, do NOT include any other sections, which are generally present in a report.\n\
         - The introduction should be preceded by an H1 heading with a suitable topic for the entire report.\n\
         - You must include hyperlinks with markdown syntax ([url website](url)) related to the sentences wherever necessary.\n\
         - Write in a {tone} tone and in English.\n\
         Assume that the current date is {date} if required.",
        context = brief.context,
        topic = brief.topic,
        tone = brief.tone.instruction(),
        date = format_date(brief.date),
    )
}

/// Builds the user message for one detailed-report section.
///
/// `existing` lists the titles of sections already written, so the model
/// can avoid repeating them.
#[must_use]
pub fn build_section_prompt(
    brief: &WritingBrief<'_>,
    subtopic: &SubTopic,
    existing: &[String],
    max_subsections: usize,
) -> String {
    let existing_list = if existing.is_empty() {
        "(none yet)".to_string()
    } else {
        existing
            .iter()
            .map(|title| format!("- {title}"))
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        "Context:\n\"{context}\"\n\n\
         Main Topic and Subtopic:\n\
         Using the latest information available, construct a detailed report on the subtopic: {subtopic} \
         under the main topic: {topic}.\n\
         You must limit the number of subsections to a maximum of {max_subsections}.\n\n\
         Content Focus:\n\
         - The report should focus on answering the question, be well-structured, informative, in-depth, \
         and include facts and numbers if available.\n\
         - Use markdown syntax and follow the {format} format.\n\n\
         Structure and Formatting:\n\
         - As this sub-report will be part of a larger report, include only the main body divided into suitable \
         subtopics without any introduction or conclusion section.\n\
         - You MUST include markdown hyperlinks to relevant source URLs wherever referenced in the report, for example: \
         ([Website Name](url)).\n\n\
         Existing Subtopic Reports:\n\
         {existing_list}\n\
         - Do not use any of the above headers or related details to avoid duplicates. Use smaller Markdown headers \
         (e.g. H2 or H3) for content structure; avoid the largest header (H1) as it is reserved for the report title.\n\n\
         Date:\n\
         Assume the current date is {date} if required.\n\n\
         IMPORTANT:\n\
         - The focus MUST be on the main topic! You MUST leave out any information unrelated to it!\n\
         - Must NOT have any introduction, conclusion, summary or reference section.\n\
         - The report should have a minimum length of {words} words.\n\
         - Write in a {tone} tone and in English.",
        context = brief.context,
        subtopic = subtopic.title,
        topic = brief.topic,
        format = brief.report_format.to_uppercase(),
        words = brief.total_words,
        tone = brief.tone.instruction(),
        date = format_date(brief.date),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(url: &str, text: &str) -> ContextChunk {
        ContextChunk {
            source_url: url.to_string(),
            title: "Title".to_string(),
            text: text.to_string(),
            relevance_score: 0.9,
        }
    }

    fn brief<'a>(context: &'a str) -> WritingBrief<'a> {
        WritingBrief {
            topic: "solid-state batteries",
            context,
            tone: Tone::Analytical,
            total_words: 800,
            report_format: "apa",
            date: NaiveDate::from_ymd_opt(2026, 3, 14).unwrap_or_default(),
        }
    }

    #[test]
    fn test_build_context_block_attributes_sources() {
        let block = build_context_block(&[chunk("https://a.example", "alpha")], 10_000);
        assert!(block.contains("Source: https://a.example"));
        assert!(block.contains("Content: alpha"));
    }

    #[test]
    fn test_build_context_block_respects_budget() {
        let chunks = vec![
            chunk("https://a.example", &"a".repeat(300)),
            chunk("https://b.example", &"b".repeat(300)),
        ];
        let block = build_context_block(&chunks, 400);
        assert_eq!(block.chars().count(), 400);
        assert!(block.contains("https://b.example"));
        assert!(build_context_block(&chunks, 0).is_empty());
    }

    #[test]
    fn test_build_subquery_prompt() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 14).unwrap_or_default();
        let prompt = build_subquery_prompt("EV market - batteries", 4, date);
        assert!(prompt.contains("Write 4 google search queries"));
        assert!(prompt.contains("\"EV market - batteries\""));
        assert!(prompt.contains("March 14, 2026"));
    }

    #[test]
    fn test_build_report_prompt_by_type() {
        let b = brief("CONTEXT");
        let comprehensive = build_report_prompt(ReportType::Comprehensive, &b, None);
        assert!(comprehensive.contains("at least 800 words"));
        assert!(comprehensive.contains("apa format"));
        assert!(comprehensive.contains("Analytical"));

        let resource = build_report_prompt(ReportType::ResourceSummary, &b, None);
        assert!(resource.contains("bibliography recommendation report"));

        let outline = build_report_prompt(ReportType::Outline, &b, None);
        assert!(outline.contains("generate an outline"));

        let custom = build_report_prompt(ReportType::Custom, &b, Some("List three risks."));
        assert!(custom.contains("List three risks."));
        assert!(custom.contains("CONTEXT"));
    }

    #[test]
    fn test_build_section_prompt_lists_existing_titles() {
        let b = brief("CONTEXT");
        let subtopic = SubTopic {
            title: "Manufacturing".to_string(),
            ordinal: 2,
        };
        let prompt = build_section_prompt(&b, &subtopic, &["Chemistry".to_string()], 5);
        assert!(prompt.contains("subtopic: Manufacturing"));
        assert!(prompt.contains("- Chemistry"));
        assert!(prompt.contains("APA format"));
        assert!(prompt.contains("CONTEXT"));

        let first = build_section_prompt(&b, &subtopic, &[], 5);
        assert!(first.contains("(none yet)"));
    }

    #[test]
    fn test_build_introduction_prompt() {
        let prompt = build_introduction_prompt(&brief("CONTEXT"));
        assert!(prompt.contains("H1 heading"));
        assert!(prompt.contains("solid-state batteries"));
    }

    #[test]
    fn test_write_defaults_does_not_overwrite() {
        let dir = tempfile::tempdir().unwrap_or_else(|_| unreachable!());
        std::fs::write(dir.path().join(SELECTOR_FILENAME), "custom selector")
            .unwrap_or_else(|_| unreachable!());
        let written = PromptSet::write_defaults(dir.path()).unwrap_or_else(|_| unreachable!());
        assert_eq!(written.len(), 2);

        let prompts = PromptSet::load(Some(dir.path()));
        assert_eq!(prompts.selector, "custom selector");
        assert_eq!(prompts.outline, OUTLINE_SYSTEM_PROMPT);
        assert_eq!(prompts.persona, FALLBACK_ROLE_PROMPT);
    }

    #[test]
    fn test_load_missing_dir_uses_defaults() {
        let prompts = PromptSet::load(Some(Path::new("/nonexistent/literesearch/prompts")));
        assert_eq!(prompts, PromptSet::defaults());
    }
}
