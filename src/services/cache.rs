//! Response Cache
//!
//! Short-circuits repeated requests by keying final responses on the last
//! three messages of the conversation. The cache is an injected instance
//! shared through `Arc`; concurrent requests may race on writes, in which
//! case the last writer wins.
//!
//! Entries are evicted oldest-created first when full and expire `ttl`
//! after insertion. Lookups do not refresh an entry's age.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use serde::Serialize;
use sha2::{Digest, Sha256};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use qwen_chat_llm::{Message, MessageRole};

/// Number of trailing messages that form the cache key.
pub const KEY_WINDOW: usize = 3;

#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    created_at: Instant,
}

#[derive(Debug, Default)]
struct CacheInner {
    entries: HashMap<String, CacheEntry>,
    hits: u64,
    misses: u64,
}

/// Snapshot of cache occupancy and hit counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub size: usize,
    pub max_size: usize,
    pub ttl_seconds: u64,
    pub hits: u64,
    pub misses: u64,
}

/// In-memory response cache with fixed capacity and TTL.
#[derive(Debug)]
pub struct ResponseCache {
    inner: Mutex<CacheInner>,
    max_size: usize,
    ttl: Duration,
}

impl ResponseCache {
    pub fn new(max_size: usize, ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(CacheInner::default()),
            max_size: max_size.max(1),
            ttl,
        }
    }

    /// Hash of `role:content` over the last [`KEY_WINDOW`] messages.
    pub fn cache_key(messages: &[Message]) -> String {
        let start = messages.len().saturating_sub(KEY_WINDOW);
        let mut hasher = Sha256::new();
        for message in &messages[start..] {
            hasher.update(message.role.as_str().as_bytes());
            hasher.update(b":");
            hasher.update(message.content.as_bytes());
        }
        format!("{:x}", hasher.finalize())
    }

    /// Cached response for this conversation window, if present and fresh.
    pub fn lookup(&self, messages: &[Message]) -> Option<String> {
        let key = Self::cache_key(messages);
        let Ok(mut inner) = self.inner.lock() else {
            warn!("[Cache] Lock poisoned; treating lookup as a miss");
            return None;
        };

        let fresh = match inner.entries.get(&key) {
            Some(entry) if entry.created_at.elapsed() < self.ttl => Some(entry.value.clone()),
            Some(_) => {
                debug!("[Cache] Entry {} expired", short(&key));
                inner.entries.remove(&key);
                None
            }
            None => None,
        };

        match fresh {
            Some(value) => {
                inner.hits += 1;
                info!("[Cache] Hit for key {}", short(&key));
                Some(value)
            }
            None => {
                inner.misses += 1;
                None
            }
        }
    }

    /// Store a final response. Empty responses and conversations whose latest
    /// user message is empty are not cached.
    pub fn store(&self, messages: &[Message], text: &str) {
        if text.is_empty() {
            return;
        }
        let latest_user_empty = messages
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::User)
            .map_or(true, |m| m.content.trim().is_empty());
        if latest_user_empty {
            return;
        }

        let key = Self::cache_key(messages);
        let Ok(mut inner) = self.inner.lock() else {
            warn!("[Cache] Lock poisoned; skipping store");
            return;
        };

        if !inner.entries.contains_key(&key) && inner.entries.len() >= self.max_size {
            let oldest = inner
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.created_at)
                .map(|(k, _)| k.clone());
            if let Some(oldest) = oldest {
                debug!("[Cache] Evicting oldest entry {}", short(&oldest));
                inner.entries.remove(&oldest);
            }
        }

        inner.entries.insert(
            key.clone(),
            CacheEntry {
                value: text.to_string(),
                created_at: Instant::now(),
            },
        );
        info!("[Cache] Stored response for key {}", short(&key));
    }

    pub fn clear(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.entries.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|inner| inner.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let (size, hits, misses) = self
            .inner
            .lock()
            .map(|inner| (inner.entries.len(), inner.hits, inner.misses))
            .unwrap_or((0, 0, 0));
        CacheStats {
            size,
            max_size: self.max_size,
            ttl_seconds: self.ttl.as_secs(),
            hits,
            misses,
        }
    }
}

fn short(key: &str) -> &str {
    &key[..key.len().min(8)]
}
