//! Embedding capability.
//!
//! [`OpenAiEmbedder`] calls an `OpenAI`-compatible embeddings endpoint;
//! [`HashEmbedder`] is a deterministic offline feature-hashing embedder
//! for runs without an embedding API.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use async_openai::Client;
use async_openai::config::OpenAIConfig;
use async_openai::types::CreateEmbeddingRequestArgs;
use async_trait::async_trait;
use unicode_segmentation::UnicodeSegmentation;

use crate::agent::providers::{ProviderKind, classify_openai_error, openai_client};
use crate::error::{EmbeddingError, GatewayError};

/// Default dimension of [`HashEmbedder`] vectors.
pub const DEFAULT_HASH_DIMENSION: usize = 384;

/// Trait for embedding backends.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Backend name (e.g. `"openai"`, `"hash"`).
    fn name(&self) -> &'static str;

    /// Embeds `texts`, returning one vector per input in input order.
    ///
    /// # Errors
    ///
    /// Returns [`EmbeddingError`] classified by retryability.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;
}

impl From<GatewayError> for EmbeddingError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Transient { message } => Self::Transient { message },
            GatewayError::RateLimited {
                message,
                retry_after,
            } => Self::RateLimited {
                message,
                retry_after,
            },
            GatewayError::Auth { message } => Self::InvalidInput {
                message: format!("authentication failed: {message}"),
            },
            GatewayError::InvalidRequest { message } => Self::InvalidInput { message },
        }
    }
}

/// Embedder backed by an `OpenAI`-compatible embeddings endpoint.
pub struct OpenAiEmbedder {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiEmbedder {
    /// Creates an embedder for the public `OpenAI` endpoint or `base_url`.
    #[must_use]
    pub fn new(api_key: &str, base_url: Option<&str>, model: impl Into<String>) -> Self {
        let base_url = base_url.unwrap_or_else(|| ProviderKind::OpenAi.default_base_url());
        Self {
            client: openai_client(api_key, base_url),
            model: model.into(),
        }
    }
}

impl std::fmt::Debug for OpenAiEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiEmbedder")
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = CreateEmbeddingRequestArgs::default()
            .model(&self.model)
            .input(texts.to_vec())
            .build()
            .map_err(|e| EmbeddingError::InvalidInput {
                message: e.to_string(),
            })?;

        let response = self
            .client
            .embeddings()
            .create(request)
            .await
            .map_err(|e| EmbeddingError::from(classify_openai_error(e)))?;

        let mut data = response.data;
        if data.len() != texts.len() {
            return Err(EmbeddingError::Transient {
                message: format!(
                    "expected {} embeddings, received {}",
                    texts.len(),
                    data.len()
                ),
            });
        }
        data.sort_by_key(|d| d.index);
        Ok(data.into_iter().map(|d| d.embedding).collect())
    }
}

/// Deterministic bag-of-words embedder using signed feature hashing.
///
/// Vectors are L2-normalized; text without words maps to the zero vector.
#[derive(Debug, Clone, Copy)]
pub struct HashEmbedder {
    dimension: usize,
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_HASH_DIMENSION)
    }
}

impl HashEmbedder {
    /// Creates an embedder producing `dimension`-sized vectors (minimum 1).
    #[must_use]
    pub const fn new(dimension: usize) -> Self {
        Self {
            dimension: if dimension == 0 { 1 } else { dimension },
        }
    }

    /// Embeds a single text.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0_f32; self.dimension];
        for word in text.unicode_words() {
            let mut hasher = DefaultHasher::new();
            word.to_lowercase().hash(&mut hasher);
            let digest = hasher.finish();
            let bucket = (digest % self.dimension as u64) as usize;
            let sign = if digest >> 63 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn name(&self) -> &'static str {
        "hash"
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::ranker::cosine_similarity;

    #[test]
    fn test_hash_embedder_is_deterministic_and_normalized() {
        let embedder = HashEmbedder::new(64);
        let a = embedder.embed_one("Solid-state batteries use solid electrolytes");
        let b = embedder.embed_one("solid-state BATTERIES use solid electrolytes");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        let norm = a.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_hash_embedder_ranks_overlap_higher() {
        let embedder = HashEmbedder::default();
        let query = embedder.embed_one("battery electrolyte chemistry");
        let close = embedder.embed_one("the electrolyte chemistry of a battery cell");
        let far = embedder.embed_one("medieval castle architecture in france");
        assert!(cosine_similarity(&query, &close) > cosine_similarity(&query, &far));
    }

    #[test]
    fn test_hash_embedder_empty_text_is_zero() {
        let v = HashEmbedder::new(8).embed_one("  ... ");
        assert!(v.iter().all(|x| *x == 0.0));
    }

    #[tokio::test]
    async fn test_hash_embedder_batch_order() {
        let embedder = HashEmbedder::new(16);
        let texts = vec!["alpha".to_string(), "beta".to_string()];
        let vectors = embedder.embed(&texts).await.unwrap_or_default();
        assert_eq!(vectors.len(), 2);
        assert_eq!(vectors[0], embedder.embed_one("alpha"));
        assert_eq!(vectors[1], embedder.embed_one("beta"));
    }

    #[test]
    fn test_gateway_error_conversion() {
        let err = EmbeddingError::from(GatewayError::Auth {
            message: "bad key".to_string(),
        });
        assert!(matches!(err, EmbeddingError::InvalidInput { .. }));
    }
}
