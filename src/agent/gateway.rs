//! Generation gateway.
//!
//! Every language-model call of the pipeline goes through [`Gateway::generate`],
//! which layers the response cache, the retry policy, per-attempt timeouts
//! and telemetry over a single [`LlmProvider`].

use std::sync::Arc;
use std::time::Instant;

use tracing::debug;

use super::cache::{ResponseCache, cache_key};
use super::message::{ChatRequest, ChatResponse, Role};
use super::provider::LlmProvider;
use crate::error::GatewayError;
use crate::retry::{RetryPolicy, call_with_policy};
use crate::telemetry::{CallRecord, Telemetry};

/// Shared entry point for language-model calls.
#[derive(Clone)]
pub struct Gateway {
    provider: Arc<dyn LlmProvider>,
    cache: Option<Arc<dyn ResponseCache>>,
    policy: RetryPolicy,
    telemetry: Telemetry,
    cost_per_1k_tokens: Option<f64>,
}

impl Gateway {
    /// Creates a gateway without cache or telemetry.
    #[must_use]
    pub fn new(provider: Arc<dyn LlmProvider>, policy: RetryPolicy) -> Self {
        Self {
            provider,
            cache: None,
            policy,
            telemetry: Telemetry::disabled(),
            cost_per_1k_tokens: None,
        }
    }

    /// Attaches a response cache.
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<dyn ResponseCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Attaches a telemetry handle.
    #[must_use]
    pub fn with_telemetry(mut self, telemetry: Telemetry) -> Self {
        self.telemetry = telemetry;
        self
    }

    /// Sets the per-1000-token price used for cost estimates.
    #[must_use]
    pub const fn with_cost_per_1k_tokens(mut self, cost: Option<f64>) -> Self {
        self.cost_per_1k_tokens = cost;
        self
    }

    /// Name of the wrapped provider.
    #[must_use]
    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    /// Executes `request` on behalf of `component`.
    ///
    /// # Errors
    ///
    /// Returns the last [`GatewayError`] once retries are exhausted, or the
    /// first non-retryable one.
    pub async fn generate(
        &self,
        component: &str,
        request: &ChatRequest,
    ) -> Result<ChatResponse, GatewayError> {
        let key = self
            .cache
            .as_ref()
            .map(|_| cache_key(self.provider.name(), request));
        if let (Some(cache), Some(key)) = (&self.cache, key) {
            if let Some(hit) = cache.get(key) {
                debug!(component, model = %request.model, "cache hit");
                return Ok(hit);
            }
        }

        let started = Instant::now();
        let result = call_with_policy(&self.policy, component, || self.provider.chat(request)).await;
        let latency = started.elapsed();

        let input = request
            .messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map_or("", |m| m.content.as_str());

        match &result {
            Ok(response) => {
                debug!(
                    component,
                    model = %request.model,
                    tokens = response.usage.total_tokens,
                    latency_ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                    "generation complete"
                );
                let cost = self
                    .cost_per_1k_tokens
                    .map(|rate| f64::from(response.usage.total_tokens) / 1000.0 * rate);
                self.telemetry.emit(
                    CallRecord::new(component, input, &response.content, latency, true)
                        .with_cost(cost),
                );
                if let (Some(cache), Some(key)) = (&self.cache, key) {
                    cache.put(key, response.clone());
                }
            }
            Err(e) => {
                debug!(component, model = %request.model, error = %e, "generation failed");
                self.telemetry
                    .emit(CallRecord::new(component, input, &e.to_string(), latency, false));
            }
        }

        result
    }
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("provider", &self.provider.name())
            .field("cached", &self.cache.is_some())
            .field("policy", &self.policy)
            .field("telemetry", &self.telemetry.is_enabled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::agent::cache::MemoryCache;
    use crate::agent::message::{TokenUsage, user_message};

    struct FlakyProvider {
        calls: AtomicU32,
        failures: u32,
    }

    #[async_trait]
    impl LlmProvider for FlakyProvider {
        fn name(&self) -> &'static str {
            "flaky"
        }

        async fn chat(&self, _request: &ChatRequest) -> Result<ChatResponse, GatewayError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                return Err(GatewayError::Transient {
                    message: "502".to_string(),
                });
            }
            Ok(ChatResponse {
                content: "ok".to_string(),
                usage: TokenUsage {
                    prompt_tokens: 10,
                    completion_tokens: 10,
                    total_tokens: 2000,
                },
                finish_reason: Some("stop".to_string()),
            })
        }
    }

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            call_timeout: Duration::from_secs(1),
        }
    }

    fn request() -> ChatRequest {
        ChatRequest {
            model: "m".to_string(),
            messages: vec![user_message("task: batteries")],
            temperature: None,
            max_tokens: None,
            json_mode: false,
        }
    }

    #[tokio::test]
    async fn test_generate_retries_transient() {
        let provider = Arc::new(FlakyProvider {
            calls: AtomicU32::new(0),
            failures: 2,
        });
        let gateway = Gateway::new(provider.clone(), policy());
        let response = gateway.generate("test", &request()).await;
        assert_eq!(response.map(|r| r.content).ok().as_deref(), Some("ok"));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_generate_uses_cache() {
        let provider = Arc::new(FlakyProvider {
            calls: AtomicU32::new(0),
            failures: 0,
        });
        let cache = Arc::new(MemoryCache::new());
        let gateway = Gateway::new(provider.clone(), policy()).with_cache(cache.clone());
        assert!(gateway.generate("test", &request()).await.is_ok());
        assert!(gateway.generate("test", &request()).await.is_ok());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_generate_emits_telemetry_with_cost() {
        let provider = Arc::new(FlakyProvider {
            calls: AtomicU32::new(0),
            failures: 0,
        });
        let (telemetry, mut rx) = Telemetry::channel();
        let gateway = Gateway::new(provider, policy())
            .with_telemetry(telemetry)
            .with_cost_per_1k_tokens(Some(0.5));
        assert!(gateway.generate("report_writer", &request()).await.is_ok());
        let record = rx.try_recv().unwrap_or_else(|_| unreachable!());
        assert_eq!(record.component, "report_writer");
        assert_eq!(record.input_summary, "task: batteries");
        assert!(record.success);
        assert_eq!(record.cost_estimate, Some(1.0));
    }
}
