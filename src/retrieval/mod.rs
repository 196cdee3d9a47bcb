//! Web retrieval: search, embedding, relevance ranking and the concurrent
//! per-sub-query fan-out that produces the report context.

pub mod embedding;
pub mod ranker;
pub mod retriever;
pub mod search;

pub use embedding::{Embedder, HashEmbedder, OpenAiEmbedder};
pub use ranker::{RankOutcome, RankerSettings, RelevanceRanker, cosine_similarity, split_windows};
pub use retriever::{RetrievalOutcome, Retriever, SubQueryOutcome, merge_chunks};
pub use search::{TavilySearch, WebSearch};
