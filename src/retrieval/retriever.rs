//! Retrieval orchestration: concurrent search and ranking per sub-query,
//! then merging into one budgeted context.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use futures_util::future::join_all;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use super::ranker::{RelevanceRanker, sort_by_score};
use super::search::WebSearch;
use crate::agent::config::ResearchConfig;
use crate::core::{ContextChunk, FailureStage, PartialFailure, SearchResult, SubQuery};
use crate::retry::{RetryPolicy, call_with_policy};
use crate::telemetry::{CallRecord, Telemetry};

/// A final chunk is only cut to fit the budget if this much text fits.
const MIN_PARTIAL_CHARS: usize = 200;

/// Everything one sub-query task produced.
#[derive(Debug, Clone)]
pub struct SubQueryOutcome {
    /// Position of the sub-query in the generated list.
    pub index: usize,
    /// The sub-query.
    pub subquery: SubQuery,
    /// Ranked chunks, best first.
    pub chunks: Vec<ContextChunk>,
    /// Search results returned before filtering.
    pub fetched: usize,
    /// Failures isolated to this sub-query.
    pub failures: Vec<PartialFailure>,
}

impl SubQueryOutcome {
    fn empty(index: usize, subquery: SubQuery) -> Self {
        Self {
            index,
            subquery,
            chunks: Vec::new(),
            fetched: 0,
            failures: Vec::new(),
        }
    }
}

/// Merged result of the retrieval fan-out.
#[derive(Debug, Clone, Default)]
pub struct RetrievalOutcome {
    /// Merged context, best first, within budget.
    pub chunks: Vec<ContextChunk>,
    /// Total search results fetched.
    pub fetched: usize,
    /// Failures of all sub-queries, in sub-query order.
    pub failures: Vec<PartialFailure>,
    /// Whether the deadline aborted outstanding sub-queries.
    pub timed_out: bool,
}

/// Per-task state cloned into every spawned sub-query task.
#[derive(Clone)]
struct Worker {
    search: Arc<dyn WebSearch>,
    ranker: Arc<RelevanceRanker>,
    policy: RetryPolicy,
    telemetry: Telemetry,
    min_content_length: usize,
}

impl Worker {
    async fn run(&self, index: usize, subquery: SubQuery, max_results: usize) -> SubQueryOutcome {
        let mut outcome = SubQueryOutcome::empty(index, subquery);
        let query = outcome.subquery.text.clone();

        let results = match self.search(&query, max_results).await {
            Ok(results) => results,
            Err(failure) => {
                warn!(subquery = %query, error = %failure.message, "search failed");
                outcome.failures.push(failure);
                return outcome;
            }
        };
        outcome.fetched = results.len();

        let candidates: Vec<SearchResult> = results
            .into_iter()
            .take(max_results)
            .filter(|r| r.raw_content.trim().chars().count() >= self.min_content_length)
            .collect();
        if candidates.is_empty() {
            debug!(subquery = %query, fetched = outcome.fetched, "no usable search results");
            return outcome;
        }

        match self.ranker.rank(&query, &candidates, max_results).await {
            Ok(ranked) => {
                outcome.chunks = ranked.chunks;
                outcome.failures.extend(ranked.dropped);
            }
            Err(e) => {
                warn!(subquery = %query, error = %e, "ranking failed");
                outcome
                    .failures
                    .push(PartialFailure::new(FailureStage::Ranking, &query, e));
            }
        }

        debug!(
            subquery = %query,
            fetched = outcome.fetched,
            chunks = outcome.chunks.len(),
            "sub-query done"
        );
        outcome
    }

    async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<SearchResult>, PartialFailure> {
        let started = Instant::now();
        let result =
            call_with_policy(&self.policy, "search", || self.search.search(query, max_results))
                .await;

        let output = match &result {
            Ok(results) => format!("{} results", results.len()),
            Err(e) => e.to_string(),
        };
        self.telemetry.emit(CallRecord::new(
            "search",
            query,
            &output,
            started.elapsed(),
            result.is_ok(),
        ));

        result.map_err(|e| PartialFailure::new(FailureStage::Search, query, e))
    }
}

/// Fans sub-queries out to search and ranking and merges the results.
pub struct Retriever {
    worker: Worker,
    max_concurrency: usize,
    request_delay: Duration,
    retrieval_timeout: Duration,
    context_budget_chars: usize,
    max_context_chunks: usize,
}

impl Retriever {
    /// Creates a retriever using the concurrency, deadline and budget
    /// settings of `config`.
    #[must_use]
    pub fn new(
        search: Arc<dyn WebSearch>,
        ranker: Arc<RelevanceRanker>,
        config: &ResearchConfig,
    ) -> Self {
        Self {
            worker: Worker {
                search,
                ranker,
                policy: config.retry_policy(),
                telemetry: Telemetry::disabled(),
                min_content_length: config.min_content_length,
            },
            max_concurrency: config.max_concurrency.max(1),
            request_delay: config.request_delay,
            retrieval_timeout: config.retrieval_timeout,
            context_budget_chars: config.context_budget_chars,
            max_context_chunks: config.max_context_chunks,
        }
    }

    /// Attaches a telemetry handle for search calls.
    #[must_use]
    pub fn with_telemetry(mut self, telemetry: Telemetry) -> Self {
        self.worker.telemetry = telemetry;
        self
    }

    /// Searches and ranks every sub-query concurrently, then merges.
    ///
    /// Never fails: search and ranking failures are isolated per sub-query
    /// and reported in [`RetrievalOutcome::failures`]. Sub-queries still
    /// running at the deadline are aborted and reported as failures.
    pub async fn retrieve(&self, subqueries: &[SubQuery], max_results: usize) -> RetrievalOutcome {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let collector: Arc<Mutex<Vec<SubQueryOutcome>>> =
            Arc::new(Mutex::new(Vec::with_capacity(subqueries.len())));

        let mut handles = Vec::with_capacity(subqueries.len());
        for (index, subquery) in subqueries.iter().enumerate() {
            let sem = Arc::clone(&semaphore);
            let sink = Arc::clone(&collector);
            let worker = self.worker.clone();
            let subquery = subquery.clone();
            let request_delay = self.request_delay;

            handles.push(tokio::spawn(async move {
                let outcome = match sem.acquire_owned().await {
                    Ok(_permit) => {
                        if !request_delay.is_zero() {
                            tokio::time::sleep(request_delay).await;
                        }
                        worker.run(index, subquery, max_results).await
                    }
                    Err(e) => {
                        let mut outcome = SubQueryOutcome::empty(index, subquery);
                        let failure =
                            PartialFailure::new(FailureStage::Search, &outcome.subquery.text, e);
                        outcome.failures.push(failure);
                        outcome
                    }
                };
                lock(&sink).push(outcome);
            }));
        }

        let joined =
            tokio::time::timeout(self.retrieval_timeout, join_all(handles.iter_mut())).await;
        let mut task_errors: HashMap<usize, String> = HashMap::new();
        let timed_out = match joined {
            Ok(results) => {
                for (index, result) in results.into_iter().enumerate() {
                    if let Err(e) = result {
                        task_errors.insert(index, format!("retrieval task failed: {e}"));
                    }
                }
                false
            }
            Err(_) => {
                for handle in &handles {
                    handle.abort();
                }
                warn!(
                    deadline_secs = self.retrieval_timeout.as_secs_f64(),
                    "retrieval deadline exceeded, using collected results"
                );
                true
            }
        };

        let mut outcomes = std::mem::take(&mut *lock(&collector));
        outcomes.sort_by_key(|o| o.index);

        let mut failures = Vec::new();
        let mut batches = Vec::with_capacity(outcomes.len());
        let mut fetched = 0;
        let mut next = outcomes.into_iter().peekable();
        for (index, subquery) in subqueries.iter().enumerate() {
            if let Some(outcome) = next.next_if(|o| o.index == index) {
                fetched += outcome.fetched;
                failures.extend(outcome.failures);
                batches.push(outcome.chunks);
            } else {
                let message = task_errors
                    .remove(&index)
                    .unwrap_or_else(|| "retrieval deadline exceeded".to_string());
                failures.push(PartialFailure::new(
                    FailureStage::Search,
                    &subquery.text,
                    message,
                ));
            }
        }

        let chunks = merge_chunks(batches, self.context_budget_chars, self.max_context_chunks);
        info!(
            subqueries = subqueries.len(),
            fetched,
            chunks = chunks.len(),
            failures = failures.len(),
            timed_out,
            "retrieval complete"
        );

        RetrievalOutcome {
            chunks,
            fetched,
            failures,
            timed_out,
        }
    }
}

impl std::fmt::Debug for Retriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retriever")
            .field("search", &self.worker.search.name())
            .field("max_concurrency", &self.max_concurrency)
            .field("retrieval_timeout", &self.retrieval_timeout)
            .finish_non_exhaustive()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Merges per-sub-query batches (in sub-query order) into one context.
///
/// Duplicate source URLs collapse to one chunk holding the highest score,
/// at the position where the URL first arrived. The result is sorted by
/// descending score (ties keep arrival order) and taken while the rendered
/// size stays within `budget` characters and the count within `max_chunks`.
/// The first chunk that does not fit is cut at a word boundary when at
/// least 200 characters of its text still fit.
#[must_use]
pub fn merge_chunks(
    batches: Vec<Vec<ContextChunk>>,
    budget: usize,
    max_chunks: usize,
) -> Vec<ContextChunk> {
    let mut merged: Vec<ContextChunk> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();
    for chunk in batches.into_iter().flatten() {
        if let Some(&i) = positions.get(&chunk.source_url) {
            if chunk.relevance_score > merged[i].relevance_score {
                merged[i] = chunk;
            }
        } else {
            positions.insert(chunk.source_url.clone(), merged.len());
            merged.push(chunk);
        }
    }
    sort_by_score(&mut merged);

    let mut used = 0;
    let mut selected = Vec::new();
    for chunk in merged {
        if selected.len() >= max_chunks {
            break;
        }
        let overhead = chunk.entry_overhead();
        let cost = overhead + chunk.text.chars().count();
        if used + cost <= budget {
            used += cost;
            selected.push(chunk);
            continue;
        }

        let allowance = budget.saturating_sub(used + overhead);
        if allowance >= MIN_PARTIAL_CHARS {
            if let Some(text) = truncate_at_word(&chunk.text, allowance) {
                selected.push(ContextChunk { text, ..chunk });
            }
        }
        break;
    }
    selected
}

/// First `max_chars` characters of `text`, shortened to the last word
/// boundary; `None` if nothing remains.
fn truncate_at_word(text: &str, max_chars: usize) -> Option<String> {
    let cut = text
        .char_indices()
        .nth(max_chars)
        .map_or(text.len(), |(byte, _)| byte);
    let head = &text[..cut];
    let at_boundary = cut == text.len() || text[cut..].starts_with(char::is_whitespace);
    let head = if at_boundary {
        head
    } else {
        head.rfind(char::is_whitespace).map_or(head, |i| &head[..i])
    };
    let head = head.trim_end();
    (!head.is_empty()).then(|| head.to_string())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use proptest::prelude::*;

    use super::*;
    use crate::error::SearchError;
    use crate::retrieval::embedding::HashEmbedder;
    use crate::retrieval::ranker::RankerSettings;

    fn chunk(url: &str, score: f32, text: &str) -> ContextChunk {
        ContextChunk {
            source_url: url.to_string(),
            title: String::new(),
            text: text.to_string(),
            relevance_score: score,
        }
    }

    /// Search stub: fails for queries containing "fail", hangs for "hang".
    struct StubSearch {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl WebSearch for StubSearch {
        fn name(&self) -> &'static str {
            "stub"
        }

        async fn search(
            &self,
            query: &str,
            max_results: usize,
        ) -> Result<Vec<SearchResult>, SearchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if query.contains("fail") {
                return Err(SearchError::Rejected {
                    status: 400,
                    message: "bad query".to_string(),
                });
            }
            if query.contains("hang") {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            Ok((0..max_results + 2)
                .map(|i| SearchResult {
                    url: format!("https://{}.example/{i}", query.replace(' ', "-")),
                    title: format!("{query} {i}"),
                    raw_content: if i == 0 {
                        "too short".to_string()
                    } else {
                        format!("{query} details page {i}. ").repeat(12)
                    },
                })
                .collect())
        }
    }

    fn retriever(config: &ResearchConfig) -> (Retriever, Arc<StubSearch>) {
        let search = Arc::new(StubSearch {
            calls: AtomicUsize::new(0),
        });
        let ranker = Arc::new(RelevanceRanker::new(
            Arc::new(HashEmbedder::default()),
            RankerSettings::from_config(config),
            config.retry_policy(),
        ));
        (
            Retriever::new(Arc::clone(&search) as Arc<dyn WebSearch>, ranker, config),
            search,
        )
    }

    #[test]
    fn test_merge_collapses_duplicates_keeping_max() {
        let merged = merge_chunks(
            vec![
                vec![chunk("https://a", 0.4, "a1"), chunk("https://b", 0.3, "b1")],
                vec![chunk("https://a", 0.9, "a2"), chunk("https://c", 0.3, "c1")],
            ],
            10_000,
            10,
        );
        let urls: Vec<&str> = merged.iter().map(|c| c.source_url.as_str()).collect();
        assert_eq!(urls, vec!["https://a", "https://b", "https://c"]);
        assert_eq!(merged[0].text, "a2");
        assert!((merged[0].relevance_score - 0.9).abs() < f32::EPSILON);
    }

    #[test]
    fn test_merge_respects_max_chunks() {
        let batch: Vec<ContextChunk> = (0..10)
            .map(|i| chunk(&format!("https://{i}"), 0.5, "text"))
            .collect();
        assert_eq!(merge_chunks(vec![batch], 10_000, 3).len(), 3);
    }

    #[test]
    fn test_merge_cuts_last_chunk_at_word_boundary() {
        let first = chunk("https://a", 0.9, &"alpha ".repeat(50));
        let second = chunk("https://b", 0.8, &"beta ".repeat(200));
        let budget = first.entry_overhead() + 300 + second.entry_overhead() + 250;
        let merged = merge_chunks(vec![vec![first, second]], budget, 10);
        assert_eq!(merged.len(), 2);
        assert!(merged[1].text.chars().count() <= 250);
        assert!(merged[1].text.ends_with("beta"));
        let rendered: usize = merged
            .iter()
            .map(|c| c.to_context_entry().chars().count())
            .sum();
        assert!(rendered <= budget);
    }

    #[test]
    fn test_merge_skips_small_remainder() {
        let first = chunk("https://a", 0.9, &"alpha ".repeat(50));
        let second = chunk("https://b", 0.8, &"beta ".repeat(200));
        let budget = first.entry_overhead() + 300 + second.entry_overhead() + 50;
        let merged = merge_chunks(vec![vec![first, second]], budget, 10);
        assert_eq!(merged.len(), 1);
    }

    #[test]
    fn test_truncate_at_word() {
        assert_eq!(truncate_at_word("hello world", 8).as_deref(), Some("hello"));
        assert_eq!(truncate_at_word("hello world", 5).as_deref(), Some("hello"));
        assert_eq!(truncate_at_word("hello", 10).as_deref(), Some("hello"));
        assert_eq!(truncate_at_word("abcdefgh", 3).as_deref(), Some("abc"));
        assert_eq!(truncate_at_word("", 3), None);
    }

    #[tokio::test]
    async fn test_retrieve_isolates_failures() {
        let config = ResearchConfig::builder()
            .min_content_length(50)
            .build()
            .unwrap_or_else(|_| unreachable!());
        let (retriever, search) = retriever(&config);
        let subqueries = vec![
            SubQuery::new("battery chemistry"),
            SubQuery::new("please fail"),
            SubQuery::new("grid storage"),
        ];

        let outcome = retriever.retrieve(&subqueries, 3).await;
        assert!(!outcome.timed_out);
        assert_eq!(search.calls.load(Ordering::SeqCst), 3);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].stage, FailureStage::Search);
        assert_eq!(outcome.failures[0].subject, "please fail");
        assert_eq!(outcome.fetched, 10);
        // One result per query is too short and the extras beyond 3 are ignored.
        assert_eq!(outcome.chunks.len(), 4);
        assert!(outcome.chunks.iter().all(|c| !c.source_url.contains("/0")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retrieve_deadline_keeps_collected_results() {
        let config = ResearchConfig::builder()
            .min_content_length(50)
            .retrieval_timeout(Duration::from_secs(5))
            .call_timeout(Duration::from_secs(600))
            .build()
            .unwrap_or_else(|_| unreachable!());
        let (retriever, _) = retriever(&config);
        let subqueries = vec![SubQuery::new("battery chemistry"), SubQuery::new("hang forever")];

        let outcome = retriever.retrieve(&subqueries, 2).await;
        assert!(outcome.timed_out);
        assert!(!outcome.chunks.is_empty());
        assert!(outcome.chunks.iter().all(|c| c.source_url.contains("battery")));
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].subject, "hang forever");
        assert!(outcome.failures[0].message.contains("deadline"));
    }

    proptest! {
        #[test]
        fn prop_merge_bounds(
            sizes in prop::collection::vec((0usize..6, 0u8..10, 1usize..400), 0..40),
            budget in 0usize..4000,
            max_chunks in 0usize..20,
        ) {
            let batch: Vec<ContextChunk> = sizes
                .iter()
                .map(|(url, score, len)| chunk(&format!("https://{url}"), f32::from(*score), &"w ".repeat(*len)))
                .collect();
            let merged = merge_chunks(vec![batch], budget, max_chunks);
            prop_assert!(merged.len() <= max_chunks);
            let rendered: usize = merged.iter().map(|c| c.to_context_entry().chars().count()).sum();
            prop_assert!(rendered <= budget);
            let mut urls: Vec<&str> = merged.iter().map(|c| c.source_url.as_str()).collect();
            urls.sort_unstable();
            urls.dedup();
            prop_assert_eq!(urls.len(), merged.len());
            for pair in merged.windows(2) {
                prop_assert!(pair[0].relevance_score >= pair[1].relevance_score);
            }
        }
    }
}
