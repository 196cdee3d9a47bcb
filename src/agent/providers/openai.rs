//! `OpenAI`-compatible provider implementation using the `async-openai` crate.
//!
//! Serves `OpenAI`, `DeepSeek`, `OpenRouter` and Ollama through their
//! `OpenAI`-compatible endpoints, selected by [`ProviderKind`].

use std::time::Duration;

use async_openai::Client;
use async_openai::config::OpenAIConfig;
use async_openai::error::OpenAIError;
use async_openai::types::{
    ChatCompletionRequestAssistantMessage, ChatCompletionRequestAssistantMessageContent,
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
    ChatCompletionRequestSystemMessageContent, ChatCompletionRequestUserMessage,
    ChatCompletionRequestUserMessageContent, CreateChatCompletionRequest, ResponseFormat,
};
use async_trait::async_trait;

use super::ProviderKind;
use crate::agent::config::ResearchConfig;
use crate::agent::message::{ChatMessage, ChatRequest, ChatResponse, Role, TokenUsage};
use crate::agent::provider::LlmProvider;
use crate::error::{ConfigError, GatewayError};

/// Builds an `async-openai` client with its internal retries disabled.
///
/// Retrying is owned by [`crate::retry`], so the SDK must surface the first
/// failure instead of backing off on its own.
pub(crate) fn openai_client(api_key: &str, base_url: &str) -> Client<OpenAIConfig> {
    let config = OpenAIConfig::new()
        .with_api_key(api_key)
        .with_api_base(base_url);
    let no_retry = backoff::ExponentialBackoff {
        max_elapsed_time: Some(Duration::ZERO),
        ..backoff::ExponentialBackoff::default()
    };
    Client::with_config(config).with_backoff(no_retry)
}

/// Maps an SDK error onto the retry-relevant [`GatewayError`] kinds.
pub(crate) fn classify_openai_error(err: OpenAIError) -> GatewayError {
    match err {
        OpenAIError::Reqwest(e) => {
            let message = e.to_string();
            match e.status().map(|s| s.as_u16()) {
                Some(429) => GatewayError::RateLimited {
                    message,
                    retry_after: None,
                },
                Some(401 | 403) => GatewayError::Auth { message },
                Some(status) if (400..500).contains(&status) => {
                    GatewayError::InvalidRequest { message }
                }
                _ => GatewayError::Transient { message },
            }
        }
        OpenAIError::ApiError(api) => {
            let kind = api.r#type.clone().unwrap_or_default().to_lowercase();
            let lowered = api.message.to_lowercase();
            let message = api.message;
            if kind.contains("rate_limit") || lowered.contains("rate limit") {
                GatewayError::RateLimited {
                    message,
                    retry_after: None,
                }
            } else if kind.contains("authentication")
                || lowered.contains("api key")
                || lowered.contains("unauthorized")
            {
                GatewayError::Auth { message }
            } else if kind.contains("invalid_request") || kind.contains("insufficient_quota") {
                GatewayError::InvalidRequest { message }
            } else {
                GatewayError::Transient { message }
            }
        }
        OpenAIError::InvalidArgument(message) => GatewayError::InvalidRequest { message },
        other => GatewayError::Transient {
            message: other.to_string(),
        },
    }
}

/// `OpenAI`-compatible LLM provider.
///
/// Wraps the `async-openai` client for chat completions. Compatible
/// with any API that follows the `OpenAI` chat completion spec.
pub struct OpenAiProvider {
    client: Client<OpenAIConfig>,
    kind: ProviderKind,
}

impl OpenAiProvider {
    /// Creates a new provider from research configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for an unknown provider name or a missing
    /// API key.
    pub fn new(config: &ResearchConfig) -> Result<Self, ConfigError> {
        let kind: ProviderKind = config.provider.parse()?;
        let api_key = match (&config.api_key, kind.requires_api_key()) {
            (Some(key), _) => key.clone(),
            (None, false) => kind.as_str().to_string(),
            (None, true) => {
                return Err(ConfigError::ApiKeyMissing {
                    var: kind.api_key_var(),
                });
            }
        };
        let base_url = config
            .base_url
            .as_deref()
            .unwrap_or_else(|| kind.default_base_url());

        Ok(Self {
            client: openai_client(&api_key, base_url),
            kind,
        })
    }

    /// Converts our message type to the `OpenAI` SDK type.
    fn convert_message(msg: &ChatMessage) -> ChatCompletionRequestMessage {
        match msg.role {
            Role::System => {
                ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage {
                    content: ChatCompletionRequestSystemMessageContent::Text(msg.content.clone()),
                    name: None,
                })
            }
            Role::User => ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
                content: ChatCompletionRequestUserMessageContent::Text(msg.content.clone()),
                name: None,
            }),
            Role::Assistant => {
                #[allow(deprecated)]
                ChatCompletionRequestMessage::Assistant(ChatCompletionRequestAssistantMessage {
                    content: Some(ChatCompletionRequestAssistantMessageContent::Text(
                        msg.content.clone(),
                    )),
                    name: None,
                    tool_calls: None,
                    refusal: None,
                    audio: None,
                    function_call: None,
                })
            }
        }
    }

    /// Builds an `OpenAI` chat completion request from our generic request.
    fn build_request(request: &ChatRequest) -> CreateChatCompletionRequest {
        let messages: Vec<_> = request.messages.iter().map(Self::convert_message).collect();

        let response_format = if request.json_mode {
            Some(ResponseFormat::JsonObject)
        } else {
            None
        };

        CreateChatCompletionRequest {
            model: request.model.clone(),
            messages,
            temperature: request.temperature.filter(|&t| t != 0.0),
            max_completion_tokens: request.max_tokens,
            response_format,
            ..Default::default()
        }
    }
}

impl std::fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("kind", &self.kind)
            .field("client", &"<async-openai::Client>")
            .finish()
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &'static str {
        self.kind.as_str()
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, GatewayError> {
        let openai_request = Self::build_request(request);

        let response = self
            .client
            .chat()
            .create(openai_request)
            .await
            .map_err(classify_openai_error)?;

        let choice = response.choices.first();

        let content = choice
            .and_then(|c| c.message.content.as_ref())
            .cloned()
            .unwrap_or_default();

        let finish_reason = choice.and_then(|c| {
            c.finish_reason
                .as_ref()
                .map(|fr| format!("{fr:?}").to_lowercase())
        });

        let usage = response
            .usage
            .map_or_else(TokenUsage::default, |u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            });

        Ok(ChatResponse {
            content,
            usage,
            finish_reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use async_openai::error::ApiError;

    use super::*;
    use crate::agent::message;

    fn api_error(kind: Option<&str>, message: &str) -> OpenAIError {
        let api: ApiError = serde_json::from_value(serde_json::json!({
            "message": message,
            "type": kind,
        }))
        .unwrap_or_else(|_| unreachable!());
        OpenAIError::ApiError(api)
    }

    #[test]
    fn test_convert_system_message() {
        let msg = message::system_message("test");
        let converted = OpenAiProvider::convert_message(&msg);
        assert!(matches!(converted, ChatCompletionRequestMessage::System(_)));
    }

    #[test]
    fn test_convert_user_message() {
        let msg = message::user_message("hello");
        let converted = OpenAiProvider::convert_message(&msg);
        assert!(matches!(converted, ChatCompletionRequestMessage::User(_)));
    }

    #[test]
    fn test_build_request_json_mode() {
        let request = ChatRequest {
            model: "gpt-4o-mini".to_string(),
            messages: vec![message::user_message("test")],
            temperature: Some(0.0),
            max_tokens: Some(100),
            json_mode: true,
        };
        let built = OpenAiProvider::build_request(&request);
        assert!(built.response_format.is_some());
        assert!(built.temperature.is_none());
        assert_eq!(built.max_completion_tokens, Some(100));
    }

    #[test]
    fn test_build_request_keeps_temperature() {
        let request = ChatRequest {
            model: "gpt-4o".to_string(),
            messages: vec![message::user_message("test")],
            temperature: Some(0.55),
            max_tokens: None,
            json_mode: false,
        };
        let built = OpenAiProvider::build_request(&request);
        assert!(built.response_format.is_none());
        assert_eq!(built.temperature, Some(0.55));
    }

    #[test]
    fn test_new_requires_key_for_hosted_provider() {
        let config = ResearchConfig::builder()
            .provider("openrouter")
            .build()
            .unwrap_or_else(|_| unreachable!());
        assert!(matches!(
            OpenAiProvider::new(&config),
            Err(ConfigError::ApiKeyMissing { .. })
        ));
    }

    #[test]
    fn test_new_ollama_without_key() {
        let config = ResearchConfig::builder()
            .provider("ollama")
            .build()
            .unwrap_or_else(|_| unreachable!());
        let provider = OpenAiProvider::new(&config).unwrap_or_else(|_| unreachable!());
        assert_eq!(provider.name(), "ollama");
    }

    #[test]
    fn test_classify_api_errors() {
        assert!(matches!(
            classify_openai_error(api_error(Some("rate_limit_exceeded"), "slow down")),
            GatewayError::RateLimited { .. }
        ));
        assert!(matches!(
            classify_openai_error(api_error(None, "Incorrect API key provided")),
            GatewayError::Auth { .. }
        ));
        assert!(matches!(
            classify_openai_error(api_error(Some("invalid_request_error"), "too long")),
            GatewayError::InvalidRequest { .. }
        ));
        assert!(matches!(
            classify_openai_error(api_error(Some("server_error"), "overloaded")),
            GatewayError::Transient { .. }
        ));
        assert!(matches!(
            classify_openai_error(OpenAIError::InvalidArgument("bad".to_string())),
            GatewayError::InvalidRequest { .. }
        ));
    }
}
