//! Error types for literesearch.
//!
//! Errors are layered the same way the pipeline is: capability errors
//! ([`GatewayError`], [`SearchError`], [`EmbeddingError`]) carry a kind that
//! decides whether a call is retried, [`AgentError`] wraps generation
//! failures of a single agent, and [`ResearchError`] is the terminal error of
//! a research run. Degraded-but-usable outcomes are not errors; they are
//! recorded as [`PartialFailure`](crate::core::PartialFailure) values.

use std::time::Duration;

use thiserror::Error;

/// Convenience result alias for research operations.
pub type Result<T, E = ResearchError> = std::result::Result<T, E>;

/// Configuration and request validation errors. Always fatal, never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required API key was not provided.
    #[error("API key missing: set {var}")]
    ApiKeyMissing {
        /// Environment variable that would supply the key.
        var: &'static str,
    },

    /// Unknown provider name in configuration.
    #[error("unsupported {capability} provider: {name}")]
    UnsupportedProvider {
        /// Capability the provider was requested for (`llm`, `search`, `embedding`).
        capability: &'static str,
        /// Provider name as configured.
        name: String,
    },

    /// A research request field is out of bounds or malformed.
    #[error("invalid request field `{field}`: {message}")]
    InvalidRequest {
        /// Offending field.
        field: &'static str,
        /// Description of the violation.
        message: String,
    },

    /// Any other invalid configuration value.
    #[error("invalid configuration: {message}")]
    Invalid {
        /// Description of the problem.
        message: String,
    },
}

/// Errors returned by the language-model gateway.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// Network failure, timeout or 5xx. Retried.
    #[error("transient gateway failure: {message}")]
    Transient {
        /// Error details.
        message: String,
    },

    /// Provider throttled the call. Retried, honoring the delay hint.
    #[error("gateway rate limited: {message}")]
    RateLimited {
        /// Error details.
        message: String,
        /// Provider-supplied delay before the next attempt.
        retry_after: Option<Duration>,
    },

    /// Credentials were rejected. Not retried.
    #[error("gateway authentication failed: {message}")]
    Auth {
        /// Error details.
        message: String,
    },

    /// The request itself was rejected. Not retried.
    #[error("invalid gateway request: {message}")]
    InvalidRequest {
        /// Error details.
        message: String,
    },
}

/// Errors returned by the web search client.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SearchError {
    /// Network failure, timeout or 5xx. Retried.
    #[error("transient search failure: {message}")]
    Transient {
        /// Error details.
        message: String,
    },

    /// Search API throttled the call. Retried, honoring the delay hint.
    #[error("search rate limited: {message}")]
    RateLimited {
        /// Error details.
        message: String,
        /// Provider-supplied delay before the next attempt.
        retry_after: Option<Duration>,
    },

    /// The search API refused the request (bad key, bad query). Not retried.
    #[error("search request rejected (status {status}): {message}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Error details.
        message: String,
    },
}

/// Errors returned by the embedding capability.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EmbeddingError {
    /// Network failure, timeout or 5xx. Retried.
    #[error("transient embedding failure: {message}")]
    Transient {
        /// Error details.
        message: String,
    },

    /// Embedding API throttled the call. Retried, honoring the delay hint.
    #[error("embedding rate limited: {message}")]
    RateLimited {
        /// Error details.
        message: String,
        /// Provider-supplied delay before the next attempt.
        retry_after: Option<Duration>,
    },

    /// The input could not be embedded. Not retried.
    #[error("invalid embedding input: {message}")]
    InvalidInput {
        /// Error details.
        message: String,
    },
}

/// Generation error of a single agent call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AgentError {
    /// The gateway call failed after retries.
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// The model answered, but the answer could not be parsed.
    #[error("response parse error: {message}")]
    ResponseParse {
        /// Error details.
        message: String,
        /// Raw response content.
        content: String,
    },

    /// The model returned no text.
    #[error("empty response from {agent} agent")]
    EmptyResponse {
        /// Agent name.
        agent: &'static str,
    },
}

/// Terminal error of a research run.
///
/// Only returned when no usable context or no usable report text could be
/// produced at all; every other failure degrades the report instead.
#[derive(Error, Debug)]
pub enum ResearchError {
    /// Configuration or request validation failed.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Retrieval produced no context chunks.
    #[error("no usable context retrieved ({} failures): {}", failures.len(), failures.join("; "))]
    NoContext {
        /// Failure messages collected during retrieval.
        failures: Vec<String>,
    },

    /// The single-call report generation failed after retries.
    #[error("report generation failed: {source}")]
    ReportGeneration {
        /// Underlying generation error.
        #[source]
        source: AgentError,
    },

    /// Every report generation step failed or returned nothing.
    #[error("no report text could be produced for topic '{topic}'")]
    EmptyReport {
        /// Research topic.
        topic: String,
    },
}

/// CLI command errors.
#[derive(Error, Debug)]
pub enum CommandError {
    /// Command could not be executed.
    #[error("{0}")]
    ExecutionFailed(String),

    /// Output could not be formatted.
    #[error("output format error: {0}")]
    OutputFormat(String),

    /// The research run failed.
    #[error(transparent)]
    Research(#[from] ResearchError),

    /// Configuration failed.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_context_message_lists_failures() {
        let err = ResearchError::NoContext {
            failures: vec!["a: timeout".to_string(), "b: 500".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("2 failures"));
        assert!(msg.contains("a: timeout; b: 500"));
    }

    #[test]
    fn test_agent_error_from_gateway_is_transparent() {
        let err: AgentError = GatewayError::Auth {
            message: "bad key".to_string(),
        }
        .into();
        assert_eq!(err.to_string(), "gateway authentication failed: bad key");
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::InvalidRequest {
            field: "max_subqueries",
            message: "must be between 1 and 10, got 0".to_string(),
        };
        assert!(err.to_string().contains("max_subqueries"));
    }
}
