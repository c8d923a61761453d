//! Response Cache (C2): fingerprint → prior [`LLMResponse`] map with TTL
//! and optional stale-on-error fallback.
//!
//! Grounded in `original_source/fs_agt_clean/core/ai/cached_llm_client.py`:
//! the fingerprint is `sha256(prompt|systemPrompt|model[|suffix])` truncated
//! to 16 hex characters and prefixed `flipsync:llm:`, matching that file's
//! `_generate_cache_key`. The shared-client/best-effort-storage idiom is
//! grounded in `src/cloudllm/clients/common.rs`.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::Result;
use crate::llm::client::{LLMClient, LLMRequest, LLMResponse};

/// The external key-value store backing the cache (Redis-compatible).
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
    async fn setex(&self, key: &str, ttl_sec: u64, value: Vec<u8>) -> Result<()>;
    async fn keys(&self, pattern: &str) -> Result<Vec<String>>;
    async fn info(&self) -> Result<HashMap<String, String>>;
}

/// A stored cache record: the wrapped response plus when it was stored and
/// for how long it remains fresh.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CacheEntry {
    pub fingerprint: String,
    pub content: String,
    pub provider: String,
    pub model: String,
    pub response_time_sec: f64,
    pub tokens_used: usize,
    pub confidence: f32,
    pub stored_at_epoch: i64,
    pub ttl_sec: u64,
}

impl CacheEntry {
    fn is_expired(&self, now_epoch: i64) -> bool {
        now_epoch >= self.stored_at_epoch + self.ttl_sec as i64
    }

    fn into_response(self, cached_stale: bool) -> LLMResponse {
        let mut metadata = HashMap::new();
        metadata.insert("cached".to_string(), serde_json::Value::Bool(true));
        if cached_stale {
            metadata.insert("cached-stale".to_string(), serde_json::Value::Bool(true));
        }
        LLMResponse {
            content: self.content,
            provider: self.provider,
            model: self.model,
            response_time_sec: self.response_time_sec,
            tokens_used: self.tokens_used,
            metadata,
            confidence: self.confidence,
        }
    }
}

/// Compute the stable cache key for a request. No timestamps participate.
pub fn fingerprint(prompt: &str, system_prompt: Option<&str>, model: &str, suffix: Option<&str>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(prompt.as_bytes());
    hasher.update(b"|");
    hasher.update(system_prompt.unwrap_or("").as_bytes());
    hasher.update(b"|");
    hasher.update(model.as_bytes());
    if let Some(suffix) = suffix {
        hasher.update(b"|");
        hasher.update(suffix.as_bytes());
    }
    let digest = hasher.finalize();
    let hex = format!("{:x}", digest);
    format!("flipsync:llm:{}", &hex[..16])
}

/// C2: wraps a [`CacheStore`] with the lookup/store/stale-fallback contract.
pub struct ResponseCache {
    store: Arc<dyn CacheStore>,
}

impl ResponseCache {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }

    /// Return a non-expired entry, if any. Store failures are logged and
    /// swallowed — they must never fail the caller's request.
    pub async fn lookup(&self, fp: &str) -> Option<LLMResponse> {
        let raw = match self.store.get(fp).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(err) => {
                log::warn!("cache lookup failed for {fp}: {err}");
                return None;
            }
        };
        let entry: CacheEntry = serde_json::from_slice(&raw).ok()?;
        let now = chrono::Utc::now().timestamp();
        if entry.is_expired(now) {
            None
        } else {
            Some(entry.into_response(false))
        }
    }

    /// Return an expired entry if present, flagged `cached-stale=true`.
    pub async fn lookup_stale(&self, fp: &str) -> Option<LLMResponse> {
        let raw = self.store.get(fp).await.ok().flatten()?;
        let entry: CacheEntry = serde_json::from_slice(&raw).ok()?;
        let now = chrono::Utc::now().timestamp();
        if entry.is_expired(now) {
            Some(entry.into_response(true))
        } else {
            None
        }
    }

    pub async fn store(&self, fp: &str, response: &LLMResponse, ttl_sec: u64) {
        let entry = CacheEntry {
            fingerprint: fp.to_string(),
            content: response.content.clone(),
            provider: response.provider.clone(),
            model: response.model.clone(),
            response_time_sec: response.response_time_sec,
            tokens_used: response.tokens_used,
            confidence: response.confidence,
            stored_at_epoch: chrono::Utc::now().timestamp(),
            ttl_sec,
        };
        let bytes = match serde_json::to_vec(&entry) {
            Ok(b) => b,
            Err(err) => {
                log::warn!("failed to serialize cache entry for {fp}: {err}");
                return;
            }
        };
        if let Err(err) = self.store.setex(fp, ttl_sec, bytes).await {
            log::warn!("cache store failed for {fp}: {err}");
        }
    }

    /// Wrap an [`LLMClient`] call: lookup first, call through on miss, store
    /// on success, and fall back to a stale entry (flagged) on error.
    pub async fn get_or_generate(
        &self,
        client: &LLMClient,
        request: LLMRequest,
        ttl_sec: u64,
    ) -> Result<LLMResponse> {
        let fp = fingerprint(&request.prompt, request.system_prompt.as_deref(), &request.model, None);

        if let Some(cached) = self.lookup(&fp).await {
            return Ok(cached);
        }

        match client.generate_response(request).await {
            Ok(response) => {
                self.store(&fp, &response, ttl_sec).await;
                Ok(response)
            }
            Err(err) => {
                if let Some(stale) = self.lookup_stale(&fp).await {
                    return Ok(stale);
                }
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    type StoredRecord = (Vec<u8>, i64, u64);

    struct InMemoryStore {
        data: Mutex<HashMap<String, StoredRecord>>,
    }

    impl InMemoryStore {
        fn new() -> Self {
            Self { data: Mutex::new(HashMap::new()) }
        }
    }

    #[async_trait]
    impl CacheStore for InMemoryStore {
        async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
            Ok(self.data.lock().unwrap().get(key).map(|(v, _, _)| v.clone()))
        }

        async fn setex(&self, key: &str, ttl_sec: u64, value: Vec<u8>) -> Result<()> {
            self.data.lock().unwrap().insert(key.to_string(), (value, chrono::Utc::now().timestamp(), ttl_sec));
            Ok(())
        }

        async fn keys(&self, _pattern: &str) -> Result<Vec<String>> {
            Ok(self.data.lock().unwrap().keys().cloned().collect())
        }

        async fn info(&self) -> Result<HashMap<String, String>> {
            Ok(HashMap::new())
        }
    }

    fn sample_response() -> LLMResponse {
        LLMResponse {
            content: "42".to_string(),
            provider: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
            response_time_sec: 0.2,
            tokens_used: 1,
            metadata: HashMap::new(),
            confidence: 1.0,
        }
    }

    #[test]
    fn fingerprint_ignores_timestamps_and_is_stable() {
        let a = fingerprint("what is 6*7", Some("sys"), "gpt-4o-mini", None);
        let b = fingerprint("what is 6*7", Some("sys"), "gpt-4o-mini", None);
        assert_eq!(a, b);
        assert!(a.starts_with("flipsync:llm:"));
        assert_eq!(a.len(), "flipsync:llm:".len() + 16);
    }

    #[tokio::test]
    async fn store_then_lookup_within_ttl_round_trips() {
        let cache = ResponseCache::new(Arc::new(InMemoryStore::new()));
        let fp = fingerprint("q", None, "m", None);
        cache.store(&fp, &sample_response(), 3600).await;
        let hit = cache.lookup(&fp).await.unwrap();
        assert_eq!(hit.content, "42");
        assert_eq!(hit.metadata.get("cached").and_then(|v| v.as_bool()), Some(true));
    }

    #[tokio::test]
    async fn expired_entry_is_absent_from_lookup_but_present_in_stale() {
        let cache = ResponseCache::new(Arc::new(InMemoryStore::new()));
        let fp = fingerprint("q", None, "m", None);
        cache.store(&fp, &sample_response(), 0).await;
        tokio::time::sleep(std::time::Duration::from_secs(1)).await;
        assert!(cache.lookup(&fp).await.is_none());
        let stale = cache.lookup_stale(&fp).await.unwrap();
        assert_eq!(stale.metadata.get("cached-stale").and_then(|v| v.as_bool()), Some(true));
    }
}
