//! Optional response cache for the generation gateway.
//!
//! Entries live in process memory only; nothing is persisted.

use std::collections::{HashMap, VecDeque};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Mutex;

use super::message::{ChatRequest, ChatResponse};

/// Storage for generation responses keyed by request digest.
pub trait ResponseCache: Send + Sync {
    /// Returns the cached response for `key`, if any.
    fn get(&self, key: u64) -> Option<ChatResponse>;

    /// Stores a response.
    fn put(&self, key: u64, response: ChatResponse);
}

/// Digest of everything that determines a response: provider, model,
/// temperature, max tokens, JSON mode and messages.
#[must_use]
pub fn cache_key(provider: &str, request: &ChatRequest) -> u64 {
    let mut hasher = DefaultHasher::new();
    provider.hash(&mut hasher);
    request.hash_into(&mut hasher);
    hasher.finish()
}

/// Responses kept by [`MemoryCache::new`].
pub const DEFAULT_CACHE_CAPACITY: usize = 256;

/// In-process [`ResponseCache`] holding at most `capacity` responses.
///
/// When full, the oldest stored response is evicted first.
#[derive(Debug)]
pub struct MemoryCache {
    capacity: usize,
    state: Mutex<CacheState>,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<u64, ChatResponse>,
    order: VecDeque<u64>,
}

impl MemoryCache {
    /// Creates an empty cache holding [`DEFAULT_CACHE_CAPACITY`] responses.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CACHE_CAPACITY)
    }

    /// Creates an empty cache holding at most `capacity` responses
    /// (minimum 1).
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            state: Mutex::new(CacheState::default()),
        }
    }

    /// Number of cached responses.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().map_or(0, |state| state.entries.len())
    }

    /// Whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseCache for MemoryCache {
    fn get(&self, key: u64) -> Option<ChatResponse> {
        self.state.lock().ok()?.entries.get(&key).cloned()
    }

    fn put(&self, key: u64, response: ChatResponse) {
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        if state.entries.insert(key, response).is_some() {
            return;
        }
        state.order.push_back(key);
        while state.entries.len() > self.capacity {
            match state.order.pop_front() {
                Some(oldest) => {
                    state.entries.remove(&oldest);
                }
                None => break,
            }
        }
    }
}
