//! Time-bounded memo of text completions.
//!
//! Keyed by `(model, prompt)`; only single-text prompts are cacheable —
//! multi-part prompts always miss and are never stored. Expiry is checked
//! lazily at read time; there is no background sweep and no entry-count
//! bound (growth is limited by distinct prompts seen in-process).

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::types::Prompt;

/// Default entry lifetime: five minutes.
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

struct CacheEntry {
    response: String,
    created_at: Instant,
}

/// Process-wide response cache for text generations.
pub struct ResponseCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    ttl: Duration,
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        ResponseCache {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Look up a cached response. Stale entries are evicted here rather
    /// than by a sweeper.
    pub fn get(&self, model: &str, prompt: &Prompt) -> Option<String> {
        let key = prompt.cache_key(model)?;
        let mut entries = self.entries.lock().unwrap();
        match entries.get(&key) {
            Some(entry) if entry.created_at.elapsed() < self.ttl => {
                debug!(model, "using cached response");
                Some(entry.response.clone())
            }
            Some(_) => {
                entries.remove(&key);
                None
            }
            None => None,
        }
    }

    /// Store a response. No-op for prompts without a cache key.
    pub fn put(&self, model: &str, prompt: &Prompt, response: &str) {
        let Some(key) = prompt.cache_key(model) else {
            return;
        };
        let mut entries = self.entries.lock().unwrap();
        entries.insert(
            key,
            CacheEntry {
                response: response.to_string(),
                created_at: Instant::now(),
            },
        );
    }

    /// Number of live-or-stale entries currently held.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PromptPart;

    #[tokio::test(start_paused = true)]
    async fn test_put_then_get() {
        let cache = ResponseCache::new();
        let prompt = Prompt::text("what is rust");
        cache.put("m", &prompt, "a systems language");
        assert_eq!(
            cache.get("m", &prompt).as_deref(),
            Some("a systems language")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_miss_for_different_model() {
        let cache = ResponseCache::new();
        let prompt = Prompt::text("p");
        cache.put("model-a", &prompt, "r");
        assert!(cache.get("model-b", &prompt).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_expires_after_ttl() {
        let cache = ResponseCache::new();
        let prompt = Prompt::text("p");
        cache.put("m", &prompt, "r");

        tokio::time::advance(Duration::from_secs(301)).await;
        assert!(cache.get("m", &prompt).is_none());
        // Stale entry was evicted on read.
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_valid_just_under_ttl() {
        let cache = ResponseCache::new();
        let prompt = Prompt::text("p");
        cache.put("m", &prompt, "r");

        tokio::time::advance(Duration::from_secs(299)).await;
        assert_eq!(cache.get("m", &prompt).as_deref(), Some("r"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_multipart_prompt_never_cached() {
        let cache = ResponseCache::new();
        let prompt = Prompt::parts(vec![
            PromptPart::Text { text: "hi".into() },
            PromptPart::Data {
                data: vec![1],
                mime_type: "image/png".into(),
            },
        ]);
        cache.put("m", &prompt, "r");
        assert!(cache.is_empty());
        assert!(cache.get("m", &prompt).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_put_overwrites_existing() {
        let cache = ResponseCache::new();
        let prompt = Prompt::text("p");
        cache.put("m", &prompt, "old");
        cache.put("m", &prompt, "new");
        assert_eq!(cache.get("m", &prompt).as_deref(), Some("new"));
        assert_eq!(cache.len(), 1);
    }
}
