//! Capability factories.
//!
//! Maps configured provider names to concrete [`LlmProvider`],
//! [`WebSearch`] and [`Embedder`] implementations.

use std::sync::Arc;

use crate::agent::config::ResearchConfig;
use crate::agent::provider::LlmProvider;
use crate::agent::providers::OpenAiProvider;
use crate::error::ConfigError;
use crate::retrieval::embedding::{Embedder, HashEmbedder, OpenAiEmbedder};
use crate::retrieval::search::{TavilySearch, WebSearch};

/// Creates an [`LlmProvider`] based on the configured provider name.
///
/// # Supported Providers
///
/// - `"openai"` (default), `"deepseek"`, `"openrouter"`, `"ollama"` — all
///   `OpenAI`-compatible APIs via `async-openai`
///
/// # Errors
///
/// Returns [`ConfigError::UnsupportedProvider`] for unknown provider names
/// and [`ConfigError::ApiKeyMissing`] when a hosted provider has no key.
pub fn create_provider(config: &ResearchConfig) -> Result<Arc<dyn LlmProvider>, ConfigError> {
    Ok(Arc::new(OpenAiProvider::new(config)?))
}

/// Creates the configured [`WebSearch`] backend.
///
/// # Errors
///
/// Returns [`ConfigError`] for an unknown backend or a missing key.
pub fn create_search(config: &ResearchConfig) -> Result<Arc<dyn WebSearch>, ConfigError> {
    match config.search_provider.as_str() {
        "tavily" => {
            let key = config
                .search_api_key
                .as_deref()
                .ok_or(ConfigError::ApiKeyMissing {
                    var: "TAVILY_API_KEY",
                })?;
            Ok(Arc::new(TavilySearch::new(key)))
        }
        other => Err(ConfigError::UnsupportedProvider {
            capability: "search",
            name: other.to_string(),
        }),
    }
}

/// Creates the configured [`Embedder`].
///
/// `"openai"` uses the embedding key, falling back to the provider key, and
/// the provider base URL when one is set. `"hash"` needs no credentials.
///
/// # Errors
///
/// Returns [`ConfigError`] for an unknown backend or a missing key.
pub fn create_embedder(config: &ResearchConfig) -> Result<Arc<dyn Embedder>, ConfigError> {
    match config.embedding_provider.as_str() {
        "openai" => {
            let key = config
                .embedding_api_key
                .as_deref()
                .or(config.api_key.as_deref())
                .ok_or(ConfigError::ApiKeyMissing {
                    var: "EMBEDDING_API_KEY",
                })?;
            Ok(Arc::new(OpenAiEmbedder::new(
                key,
                config.base_url.as_deref(),
                config.embedding_model.clone(),
            )))
        }
        "hash" => Ok(Arc::new(HashEmbedder::default())),
        other => Err(ConfigError::UnsupportedProvider {
            capability: "embedding",
            name: other.to_string(),
        }),
    }
}
