//! Relevance ranking and context compression.
//!
//! Each candidate page is cut into overlapping windows on word boundaries,
//! every window is embedded, and the candidate is scored by its best window.
//! That best window becomes the candidate's context text, so only the most
//! relevant passage of a long page reaches the writer.

use std::sync::Arc;
use std::time::Instant;

use futures_util::future::join_all;
use tracing::{debug, warn};
use unicode_segmentation::UnicodeSegmentation;

use super::embedding::Embedder;
use crate::agent::config::ResearchConfig;
use crate::core::{ContextChunk, FailureStage, PartialFailure, SearchResult};
use crate::error::EmbeddingError;
use crate::retry::{RetryPolicy, call_with_policy};
use crate::telemetry::{CallRecord, Telemetry};

/// Windowing and filtering settings of the ranker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankerSettings {
    /// Window size in characters.
    pub window_size: usize,
    /// Overlap between consecutive windows in characters.
    pub window_overlap: usize,
    /// Maximum windows embedded per candidate.
    pub max_windows: usize,
    /// Candidates scoring below this are discarded; `<= 0.0` disables.
    pub similarity_threshold: f32,
}

impl RankerSettings {
    /// Extracts ranker settings from configuration.
    #[must_use]
    pub const fn from_config(config: &ResearchConfig) -> Self {
        Self {
            window_size: config.window_size,
            window_overlap: config.window_overlap,
            max_windows: config.max_windows,
            similarity_threshold: config.similarity_threshold,
        }
    }
}

/// Result of ranking one sub-query's candidates.
#[derive(Debug, Clone, Default)]
pub struct RankOutcome {
    /// Ranked chunks, best first.
    pub chunks: Vec<ContextChunk>,
    /// Candidates dropped because their embedding failed.
    pub dropped: Vec<PartialFailure>,
}

/// Scores candidate passages against a query with an [`Embedder`].
pub struct RelevanceRanker {
    embedder: Arc<dyn Embedder>,
    settings: RankerSettings,
    policy: RetryPolicy,
    telemetry: Telemetry,
}

impl RelevanceRanker {
    /// Creates a ranker.
    #[must_use]
    pub fn new(embedder: Arc<dyn Embedder>, settings: RankerSettings, policy: RetryPolicy) -> Self {
        Self {
            embedder,
            settings,
            policy,
            telemetry: Telemetry::disabled(),
        }
    }

    /// Attaches a telemetry handle.
    #[must_use]
    pub fn with_telemetry(mut self, telemetry: Telemetry) -> Self {
        self.telemetry = telemetry;
        self
    }

    /// Ranks `candidates` against `query` and keeps the best `top_k`.
    ///
    /// Candidates are embedded concurrently, one call each. Ties keep input
    /// order.
    ///
    /// # Errors
    ///
    /// Returns [`EmbeddingError`] only if the query itself cannot be
    /// embedded; failing candidates are reported in [`RankOutcome::dropped`].
    pub async fn rank(
        &self,
        query: &str,
        candidates: &[SearchResult],
        top_k: usize,
    ) -> Result<RankOutcome, EmbeddingError> {
        if candidates.is_empty() || top_k == 0 {
            return Ok(RankOutcome::default());
        }

        let query_vector = self
            .embed_texts(vec![query.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::InvalidInput {
                message: "query produced no embedding".to_string(),
            })?;

        let scored = join_all(
            candidates
                .iter()
                .map(|candidate| self.score_candidate(&query_vector, candidate)),
        )
        .await;

        let mut outcome = RankOutcome::default();
        for (candidate, result) in candidates.iter().zip(scored) {
            match result {
                Ok(Some(chunk)) => outcome.chunks.push(chunk),
                Ok(None) => {}
                Err(e) => {
                    warn!(url = %candidate.url, error = %e, "dropping candidate");
                    outcome
                        .dropped
                        .push(PartialFailure::new(FailureStage::Ranking, &candidate.url, e));
                }
            }
        }

        let threshold = self.settings.similarity_threshold;
        if threshold > 0.0 {
            outcome.chunks.retain(|c| c.relevance_score >= threshold);
        }
        sort_by_score(&mut outcome.chunks);
        outcome.chunks.truncate(top_k);

        debug!(
            query,
            candidates = candidates.len(),
            kept = outcome.chunks.len(),
            dropped = outcome.dropped.len(),
            "ranked candidates"
        );
        Ok(outcome)
    }

    /// Scores one candidate by its best window; `None` if it has no text.
    async fn score_candidate(
        &self,
        query_vector: &[f32],
        candidate: &SearchResult,
    ) -> Result<Option<ContextChunk>, EmbeddingError> {
        let windows = split_windows(
            &candidate.raw_content,
            self.settings.window_size,
            self.settings.window_overlap,
            self.settings.max_windows,
        );
        if windows.is_empty() {
            return Ok(None);
        }

        let vectors = self.embed_texts(windows.clone()).await?;
        let best = vectors
            .iter()
            .map(|v| cosine_similarity(query_vector, v))
            .enumerate()
            .fold(None, |best: Option<(usize, f32)>, (i, score)| match best {
                Some((_, top)) if top >= score => best,
                _ => Some((i, score)),
            });

        Ok(best.map(|(i, score)| ContextChunk {
            source_url: candidate.url.clone(),
            title: candidate.title.clone(),
            text: windows[i].clone(),
            relevance_score: score,
        }))
    }

    async fn embed_texts(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let started = Instant::now();
        let result = call_with_policy(&self.policy, "embedding", || self.embedder.embed(&texts))
            .await
            .and_then(|vectors| {
                if vectors.len() == texts.len() {
                    Ok(vectors)
                } else {
                    Err(EmbeddingError::InvalidInput {
                        message: format!(
                            "expected {} embeddings, received {}",
                            texts.len(),
                            vectors.len()
                        ),
                    })
                }
            });

        let input = texts.first().map_or("", String::as_str);
        let output = match &result {
            Ok(vectors) => format!("{} vectors", vectors.len()),
            Err(e) => e.to_string(),
        };
        self.telemetry.emit(CallRecord::new(
            "embedding",
            input,
            &output,
            started.elapsed(),
            result.is_ok(),
        ));
        result
    }
}

impl std::fmt::Debug for RelevanceRanker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelevanceRanker")
            .field("embedder", &self.embedder.name())
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

/// Stable sort by descending relevance; ties keep their order.
pub(crate) fn sort_by_score(chunks: &mut [ContextChunk]) {
    chunks.sort_by(|a, b| b.relevance_score.total_cmp(&a.relevance_score));
}

/// Cosine similarity; `0.0` for zero vectors, mismatched lengths or
/// non-finite components.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    let similarity = dot / (norm_a * norm_b);
    if similarity.is_finite() { similarity } else { 0.0 }
}

/// Splits `text` into at most `max_windows` windows of at most `size`
/// characters, cut on word boundaries and overlapping by up to `overlap`
/// characters.
///
/// A single word longer than `size` is cut mid-word.
#[must_use]
pub fn split_windows(text: &str, size: usize, overlap: usize, max_windows: usize) -> Vec<String> {
    let text = text.trim();
    if text.is_empty() || size == 0 || max_windows == 0 {
        return Vec::new();
    }

    let offsets: Vec<usize> = text
        .char_indices()
        .map(|(byte, _)| byte)
        .chain(std::iter::once(text.len()))
        .collect();
    let total = offsets.len() - 1;
    if total <= size {
        return vec![text.to_string()];
    }

    // Word-boundary positions in characters, starting at 0 and ending at `total`.
    let mut bounds = vec![0];
    let mut pos = 0;
    for piece in text.split_word_bounds() {
        pos += piece.chars().count();
        bounds.push(pos);
    }

    let last_bound_within = |lo: usize, hi: usize| {
        let i = bounds.partition_point(|&b| b <= hi);
        (i > 0 && bounds[i - 1] > lo).then(|| bounds[i - 1])
    };

    let mut windows = Vec::new();
    let mut start = 0;
    while start < total && windows.len() < max_windows {
        let limit = start + size;
        let end = if limit >= total {
            total
        } else {
            last_bound_within(start, limit).unwrap_or(limit)
        };

        let window = text[offsets[start]..offsets[end]].trim();
        if !window.is_empty() {
            windows.push(window.to_string());
        }
        if end >= total {
            break;
        }
        start = last_bound_within(start, end.saturating_sub(overlap)).unwrap_or(end);
    }

    windows
}
