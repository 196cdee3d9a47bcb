//! Research configuration with builder pattern and environment variable support.
//!
//! Configuration is resolved in order: explicit values → environment variables → defaults.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;
use crate::retry::{DEFAULT_INITIAL_DELAY, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_DELAY, RetryPolicy};

/// Default language-model provider.
pub const DEFAULT_PROVIDER: &str = "openai";
/// Default model for persona selection, sub-queries and outlines.
pub const DEFAULT_PLANNER_MODEL: &str = "gpt-4o-mini";
/// Default model for report text.
pub const DEFAULT_WRITER_MODEL: &str = "gpt-4o";
/// Default sampling temperature.
pub const DEFAULT_TEMPERATURE: f32 = 0.55;
/// Default planner max tokens.
const DEFAULT_PLANNER_MAX_TOKENS: u32 = 1024;
/// Default writer max tokens.
const DEFAULT_WRITER_MAX_TOKENS: u32 = 4096;
/// Default target length of a report, in words.
pub const DEFAULT_TOTAL_WORDS: usize = 800;
/// Default citation style.
pub const DEFAULT_REPORT_FORMAT: &str = "APA";
/// Default embedding provider.
pub const DEFAULT_EMBEDDING_PROVIDER: &str = "openai";
/// Default embedding model.
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
/// Default web search provider.
pub const DEFAULT_SEARCH_PROVIDER: &str = "tavily";
/// Default maximum concurrent sub-query tasks.
const DEFAULT_MAX_CONCURRENCY: usize = 5;
/// Default per-call timeout in seconds.
const DEFAULT_CALL_TIMEOUT_SECS: u64 = 60;
/// Default retrieval deadline in seconds.
const DEFAULT_RETRIEVAL_TIMEOUT_SECS: u64 = 180;
/// Default ranking window size in characters.
const DEFAULT_WINDOW_SIZE: usize = 500;
/// Default overlap between ranking windows in characters.
const DEFAULT_WINDOW_OVERLAP: usize = 100;
/// Default maximum windows embedded per candidate.
const DEFAULT_MAX_WINDOWS: usize = 32;
/// Default character budget of the merged context.
pub const DEFAULT_CONTEXT_BUDGET_CHARS: usize = 25_000;
/// Default maximum merged context chunks.
const DEFAULT_MAX_CONTEXT_CHUNKS: usize = 50;
/// Search results with less extracted text than this are discarded.
const DEFAULT_MIN_CONTENT_LENGTH: usize = 100;

/// Configuration of a research pipeline.
#[derive(Debug, Clone)]
pub struct ResearchConfig {
    /// LLM provider name (`openai`, `deepseek`, `openrouter`, `ollama`).
    pub provider: String,
    /// API key for the provider. Optional for local providers.
    pub api_key: Option<String>,
    /// Optional base URL override (for proxies or compatible APIs).
    pub base_url: Option<String>,
    /// Model for persona selection, sub-query and outline calls.
    pub planner_model: String,
    /// Model for report, introduction and section calls.
    pub writer_model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Maximum tokens for planner responses.
    pub planner_max_tokens: u32,
    /// Maximum tokens for writer responses.
    pub writer_max_tokens: u32,
    /// Target report length in words.
    pub total_words: usize,
    /// Citation style requested from the writer (e.g. `APA`).
    pub report_format: String,
    /// Embedding provider name (`openai` or `hash`).
    pub embedding_provider: String,
    /// Embedding model.
    pub embedding_model: String,
    /// API key for embeddings; falls back to `api_key`.
    pub embedding_api_key: Option<String>,
    /// Web search provider name.
    pub search_provider: String,
    /// API key for web search.
    pub search_api_key: Option<String>,
    /// Maximum concurrent sub-query tasks.
    pub max_concurrency: usize,
    /// Timeout of each individual external call attempt.
    pub call_timeout: Duration,
    /// Deadline of the whole retrieval fan-out.
    pub retrieval_timeout: Duration,
    /// Attempts per external call, first attempt included.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub retry_initial_delay: Duration,
    /// Upper bound on any retry delay.
    pub retry_max_delay: Duration,
    /// Candidates scoring below this similarity are discarded.
    pub similarity_threshold: f32,
    /// Ranking window size in characters.
    pub window_size: usize,
    /// Overlap between consecutive ranking windows in characters.
    pub window_overlap: usize,
    /// Maximum windows embedded per candidate.
    pub max_windows: usize,
    /// Character budget of the merged context block.
    pub context_budget_chars: usize,
    /// Maximum merged context chunks.
    pub max_context_chunks: usize,
    /// Search results shorter than this are discarded.
    pub min_content_length: usize,
    /// Directory containing prompt template files.
    ///
    /// When set, prompts are loaded from markdown files in this directory,
    /// falling back to compiled-in defaults for any missing files.
    pub prompt_dir: Option<PathBuf>,
    /// Minimum delay between external calls per retrieval task.
    ///
    /// Applied after acquiring the concurrency semaphore permit.
    pub request_delay: Duration,
    /// Cache identical generation requests in memory.
    pub cache_enabled: bool,
    /// Log a telemetry record for every external call.
    pub telemetry_enabled: bool,
    /// USD per 1000 tokens used for telemetry cost estimates.
    pub cost_per_1k_tokens: Option<f64>,
}

impl ResearchConfig {
    /// Creates a new builder for `ResearchConfig`.
    #[must_use]
    pub fn builder() -> ResearchConfigBuilder {
        ResearchConfigBuilder::default()
    }

    /// Creates configuration from environment variables with defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a required API key is missing or a value
    /// is out of range.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::builder().from_env().build()
    }

    /// Retry policy shared by every external call.
    #[must_use]
    pub const fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_retries,
            initial_delay: self.retry_initial_delay,
            max_delay: self.retry_max_delay,
            call_timeout: self.call_timeout,
        }
    }
}

/// Builder for [`ResearchConfig`].
#[derive(Debug, Clone, Default)]
pub struct ResearchConfigBuilder {
    provider: Option<String>,
    api_key: Option<String>,
    base_url: Option<String>,
    planner_model: Option<String>,
    writer_model: Option<String>,
    temperature: Option<f32>,
    planner_max_tokens: Option<u32>,
    writer_max_tokens: Option<u32>,
    total_words: Option<usize>,
    report_format: Option<String>,
    embedding_provider: Option<String>,
    embedding_model: Option<String>,
    embedding_api_key: Option<String>,
    search_provider: Option<String>,
    search_api_key: Option<String>,
    max_concurrency: Option<usize>,
    call_timeout: Option<Duration>,
    retrieval_timeout: Option<Duration>,
    max_retries: Option<u32>,
    retry_initial_delay: Option<Duration>,
    retry_max_delay: Option<Duration>,
    similarity_threshold: Option<f32>,
    window_size: Option<usize>,
    window_overlap: Option<usize>,
    max_windows: Option<usize>,
    context_budget_chars: Option<usize>,
    max_context_chunks: Option<usize>,
    min_content_length: Option<usize>,
    prompt_dir: Option<PathBuf>,
    request_delay: Option<Duration>,
    cache_enabled: Option<bool>,
    telemetry_enabled: Option<bool>,
    cost_per_1k_tokens: Option<f64>,
}

fn env_parse<T: std::str::FromStr>(var: &str) -> Option<T> {
    std::env::var(var).ok().and_then(|v| v.trim().parse().ok())
}

impl ResearchConfigBuilder {
    /// Populates unset fields from environment variables.
    #[must_use]
    pub fn from_env(mut self) -> Self {
        if self.provider.is_none() {
            self.provider = std::env::var("RESEARCH_PROVIDER")
                .or_else(|_| std::env::var("LLM_PROVIDER"))
                .ok();
        }
        if self.api_key.is_none() {
            self.api_key = std::env::var("OPENAI_API_KEY")
                .or_else(|_| std::env::var("RESEARCH_API_KEY"))
                .ok();
        }
        if self.base_url.is_none() {
            self.base_url = std::env::var("OPENAI_BASE_URL")
                .or_else(|_| std::env::var("RESEARCH_BASE_URL"))
                .ok();
        }
        if self.planner_model.is_none() {
            self.planner_model = std::env::var("RESEARCH_PLANNER_MODEL").ok();
        }
        if self.writer_model.is_none() {
            self.writer_model = std::env::var("RESEARCH_WRITER_MODEL")
                .or_else(|_| std::env::var("LLM_MODEL"))
                .ok();
        }
        if self.temperature.is_none() {
            self.temperature = env_parse("RESEARCH_TEMPERATURE");
        }
        if self.total_words.is_none() {
            self.total_words = env_parse("RESEARCH_TOTAL_WORDS");
        }
        if self.report_format.is_none() {
            self.report_format = std::env::var("RESEARCH_REPORT_FORMAT").ok();
        }
        if self.embedding_provider.is_none() {
            self.embedding_provider = std::env::var("RESEARCH_EMBEDDING_PROVIDER").ok();
        }
        if self.embedding_model.is_none() {
            self.embedding_model = std::env::var("RESEARCH_EMBEDDING_MODEL").ok();
        }
        if self.embedding_api_key.is_none() {
            self.embedding_api_key = std::env::var("EMBEDDING_API_KEY").ok();
        }
        if self.search_api_key.is_none() {
            self.search_api_key = std::env::var("TAVILY_API_KEY").ok();
        }
        if self.similarity_threshold.is_none() {
            self.similarity_threshold = env_parse("RESEARCH_SIMILARITY_THRESHOLD");
        }
        if self.max_concurrency.is_none() {
            self.max_concurrency = env_parse("RESEARCH_MAX_CONCURRENCY");
        }
        if self.context_budget_chars.is_none() {
            self.context_budget_chars = env_parse("RESEARCH_CONTEXT_BUDGET");
        }
        if self.prompt_dir.is_none() {
            self.prompt_dir = std::env::var("RESEARCH_PROMPT_DIR").ok().map(PathBuf::from);
        }
        self
    }

    /// Sets the LLM provider name.
    #[must_use]
    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Sets the API key.
    #[must_use]
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the base URL override.
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the planner model.
    #[must_use]
    pub fn planner_model(mut self, model: impl Into<String>) -> Self {
        self.planner_model = Some(model.into());
        self
    }

    /// Sets the writer model.
    #[must_use]
    pub fn writer_model(mut self, model: impl Into<String>) -> Self {
        self.writer_model = Some(model.into());
        self
    }

    /// Sets the sampling temperature.
    #[must_use]
    pub const fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Sets the planner max tokens.
    #[must_use]
    pub const fn planner_max_tokens(mut self, n: u32) -> Self {
        self.planner_max_tokens = Some(n);
        self
    }

    /// Sets the writer max tokens.
    #[must_use]
    pub const fn writer_max_tokens(mut self, n: u32) -> Self {
        self.writer_max_tokens = Some(n);
        self
    }

    /// Sets the target report length in words.
    #[must_use]
    pub const fn total_words(mut self, n: usize) -> Self {
        self.total_words = Some(n);
        self
    }

    /// Sets the citation style.
    #[must_use]
    pub fn report_format(mut self, format: impl Into<String>) -> Self {
        self.report_format = Some(format.into());
        self
    }

    /// Sets the embedding provider name.
    #[must_use]
    pub fn embedding_provider(mut self, provider: impl Into<String>) -> Self {
        self.embedding_provider = Some(provider.into());
        self
    }

    /// Sets the embedding model.
    #[must_use]
    pub fn embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = Some(model.into());
        self
    }

    /// Sets the embedding API key.
    #[must_use]
    pub fn embedding_api_key(mut self, key: impl Into<String>) -> Self {
        self.embedding_api_key = Some(key.into());
        self
    }

    /// Sets the web search provider name.
    #[must_use]
    pub fn search_provider(mut self, provider: impl Into<String>) -> Self {
        self.search_provider = Some(provider.into());
        self
    }

    /// Sets the web search API key.
    #[must_use]
    pub fn search_api_key(mut self, key: impl Into<String>) -> Self {
        self.search_api_key = Some(key.into());
        self
    }

    /// Sets the maximum concurrency.
    #[must_use]
    pub const fn max_concurrency(mut self, n: usize) -> Self {
        self.max_concurrency = Some(n);
        self
    }

    /// Sets the per-call timeout.
    #[must_use]
    pub const fn call_timeout(mut self, duration: Duration) -> Self {
        self.call_timeout = Some(duration);
        self
    }

    /// Sets the retrieval deadline.
    #[must_use]
    pub const fn retrieval_timeout(mut self, duration: Duration) -> Self {
        self.retrieval_timeout = Some(duration);
        self
    }

    /// Sets the attempts per external call.
    #[must_use]
    pub const fn max_retries(mut self, n: u32) -> Self {
        self.max_retries = Some(n);
        self
    }

    /// Sets the retry delay bounds.
    #[must_use]
    pub const fn retry_delays(mut self, initial: Duration, max: Duration) -> Self {
        self.retry_initial_delay = Some(initial);
        self.retry_max_delay = Some(max);
        self
    }

    /// Sets the similarity threshold.
    #[must_use]
    pub const fn similarity_threshold(mut self, threshold: f32) -> Self {
        self.similarity_threshold = Some(threshold);
        self
    }

    /// Sets the ranking window size and overlap.
    #[must_use]
    pub const fn window(mut self, size: usize, overlap: usize) -> Self {
        self.window_size = Some(size);
        self.window_overlap = Some(overlap);
        self
    }

    /// Sets the maximum windows embedded per candidate.
    #[must_use]
    pub const fn max_windows(mut self, n: usize) -> Self {
        self.max_windows = Some(n);
        self
    }

    /// Sets the context budget in characters.
    #[must_use]
    pub const fn context_budget_chars(mut self, n: usize) -> Self {
        self.context_budget_chars = Some(n);
        self
    }

    /// Sets the maximum merged context chunks.
    #[must_use]
    pub const fn max_context_chunks(mut self, n: usize) -> Self {
        self.max_context_chunks = Some(n);
        self
    }

    /// Sets the minimum search result content length.
    #[must_use]
    pub const fn min_content_length(mut self, n: usize) -> Self {
        self.min_content_length = Some(n);
        self
    }

    /// Sets the prompt template directory.
    #[must_use]
    pub fn prompt_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.prompt_dir = Some(dir.into());
        self
    }

    /// Sets the minimum delay between external calls per task.
    #[must_use]
    pub const fn request_delay(mut self, delay: Duration) -> Self {
        self.request_delay = Some(delay);
        self
    }

    /// Enables or disables the in-memory response cache.
    #[must_use]
    pub const fn cache_enabled(mut self, enabled: bool) -> Self {
        self.cache_enabled = Some(enabled);
        self
    }

    /// Enables or disables telemetry logging.
    #[must_use]
    pub const fn telemetry_enabled(mut self, enabled: bool) -> Self {
        self.telemetry_enabled = Some(enabled);
        self
    }

    /// Sets the cost per 1000 tokens used in telemetry.
    #[must_use]
    pub const fn cost_per_1k_tokens(mut self, cost: f64) -> Self {
        self.cost_per_1k_tokens = Some(cost);
        self
    }

    /// Builds the [`ResearchConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for out-of-range values. API keys
    /// are checked when providers are created.
    pub fn build(self) -> Result<ResearchConfig, ConfigError> {
        let temperature = self.temperature.unwrap_or(DEFAULT_TEMPERATURE);
        if !(0.0..=2.0).contains(&temperature) {
            return Err(ConfigError::Invalid {
                message: format!("temperature must be within 0.0..=2.0, got {temperature}"),
            });
        }
        let similarity_threshold = self.similarity_threshold.unwrap_or(0.0);
        if !(-1.0..=1.0).contains(&similarity_threshold) {
            return Err(ConfigError::Invalid {
                message: format!(
                    "similarity threshold must be within -1.0..=1.0, got {similarity_threshold}"
                ),
            });
        }
        let window_size = self.window_size.unwrap_or(DEFAULT_WINDOW_SIZE);
        let window_overlap = self.window_overlap.unwrap_or(DEFAULT_WINDOW_OVERLAP);
        if window_size == 0 || window_overlap >= window_size {
            return Err(ConfigError::Invalid {
                message: format!(
                    "window overlap ({window_overlap}) must be smaller than a non-zero window size ({window_size})"
                ),
            });
        }
        let max_concurrency = self.max_concurrency.unwrap_or(DEFAULT_MAX_CONCURRENCY);
        if max_concurrency == 0 {
            return Err(ConfigError::Invalid {
                message: "max concurrency must be at least 1".to_string(),
            });
        }

        Ok(ResearchConfig {
            provider: self
                .provider
                .unwrap_or_else(|| DEFAULT_PROVIDER.to_string()),
            api_key: self.api_key.filter(|k| !k.trim().is_empty()),
            base_url: self.base_url,
            planner_model: self
                .planner_model
                .unwrap_or_else(|| DEFAULT_PLANNER_MODEL.to_string()),
            writer_model: self
                .writer_model
                .unwrap_or_else(|| DEFAULT_WRITER_MODEL.to_string()),
            temperature,
            planner_max_tokens: self
                .planner_max_tokens
                .unwrap_or(DEFAULT_PLANNER_MAX_TOKENS),
            writer_max_tokens: self.writer_max_tokens.unwrap_or(DEFAULT_WRITER_MAX_TOKENS),
            total_words: self.total_words.unwrap_or(DEFAULT_TOTAL_WORDS),
            report_format: self
                .report_format
                .unwrap_or_else(|| DEFAULT_REPORT_FORMAT.to_string()),
            embedding_provider: self
                .embedding_provider
                .unwrap_or_else(|| DEFAULT_EMBEDDING_PROVIDER.to_string()),
            embedding_model: self
                .embedding_model
                .unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string()),
            embedding_api_key: self.embedding_api_key.filter(|k| !k.trim().is_empty()),
            search_provider: self
                .search_provider
                .unwrap_or_else(|| DEFAULT_SEARCH_PROVIDER.to_string()),
            search_api_key: self.search_api_key.filter(|k| !k.trim().is_empty()),
            max_concurrency,
            call_timeout: self
                .call_timeout
                .unwrap_or(Duration::from_secs(DEFAULT_CALL_TIMEOUT_SECS)),
            retrieval_timeout: self
                .retrieval_timeout
                .unwrap_or(Duration::from_secs(DEFAULT_RETRIEVAL_TIMEOUT_SECS)),
            max_retries: self.max_retries.unwrap_or(DEFAULT_MAX_ATTEMPTS).max(1),
            retry_initial_delay: self.retry_initial_delay.unwrap_or(DEFAULT_INITIAL_DELAY),
            retry_max_delay: self.retry_max_delay.unwrap_or(DEFAULT_MAX_DELAY),
            similarity_threshold,
            window_size,
            window_overlap,
            max_windows: self.max_windows.unwrap_or(DEFAULT_MAX_WINDOWS).max(1),
            context_budget_chars: self
                .context_budget_chars
                .unwrap_or(DEFAULT_CONTEXT_BUDGET_CHARS),
            max_context_chunks: self
                .max_context_chunks
                .unwrap_or(DEFAULT_MAX_CONTEXT_CHUNKS),
            min_content_length: self
                .min_content_length
                .unwrap_or(DEFAULT_MIN_CONTENT_LENGTH),
            prompt_dir: self.prompt_dir,
            request_delay: self.request_delay.unwrap_or(Duration::ZERO),
            cache_enabled: self.cache_enabled.unwrap_or(false),
            telemetry_enabled: self.telemetry_enabled.unwrap_or(false),
            cost_per_1k_tokens: self.cost_per_1k_tokens,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let config = ResearchConfig::builder()
            .api_key("test-key")
            .build()
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(config.provider, "openai");
        assert_eq!(config.api_key.as_deref(), Some("test-key"));
        assert_eq!(config.max_concurrency, DEFAULT_MAX_CONCURRENCY);
        assert_eq!(config.planner_model, DEFAULT_PLANNER_MODEL);
        assert_eq!(config.total_words, 800);
        assert_eq!(config.report_format, "APA");
        assert!((config.temperature - 0.55).abs() < f32::EPSILON);
        assert!(config.similarity_threshold.abs() < f32::EPSILON);
        assert_eq!(config.min_content_length, 100);
        assert!(!config.cache_enabled);
    }

    #[test]
    fn test_builder_blank_api_key_is_unset() {
        let config = ResearchConfig::builder()
            .api_key("  ")
            .build()
            .unwrap_or_else(|_| unreachable!());
        assert!(config.api_key.is_none());
    }

    #[test]
    fn test_builder_custom_values() {
        let config = ResearchConfig::builder()
            .api_key("key")
            .provider("deepseek")
            .planner_model("deepseek-chat")
            .max_concurrency(10)
            .call_timeout(Duration::from_secs(30))
            .window(200, 50)
            .build()
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(config.provider, "deepseek");
        assert_eq!(config.planner_model, "deepseek-chat");
        assert_eq!(config.max_concurrency, 10);
        assert_eq!(config.retry_policy().call_timeout, Duration::from_secs(30));
        assert_eq!(config.window_size, 200);
    }

    #[test]
    fn test_builder_rejects_bad_window() {
        let result = ResearchConfig::builder().window(100, 100).build();
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_builder_rejects_bad_temperature() {
        let result = ResearchConfig::builder().temperature(3.5).build();
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_builder_rejects_zero_concurrency() {
        let result = ResearchConfig::builder().max_concurrency(0).build();
        assert!(result.is_err());
    }
}
