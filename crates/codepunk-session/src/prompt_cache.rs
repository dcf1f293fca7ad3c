//! Prompt Cache (C14).
//!
//! Keys a cache entry off `{providerName, systemPrompt}` only — deliberately
//! ignoring the rest of the request so that turns sharing a system prompt on
//! the same provider reuse the same entry regardless of what else changed.

use chrono::{DateTime, Utc};
use codepunk_core::PromptCacheEntry;
use sha2::{Digest, Sha256};
use std::collections::HashMap;

/// `SHA256("{provider}\0{system_prompt}")` as lowercase hex.
pub fn cache_key(provider: &str, system_prompt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(provider.as_bytes());
    hasher.update(b"\0");
    hasher.update(system_prompt.as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// In-memory store of [`PromptCacheEntry`] keyed by [`cache_key`]. Expiry is
/// evaluated lazily on read, not by a background sweep.
#[derive(Default)]
pub struct PromptCache {
    entries: HashMap<String, PromptCacheEntry>,
}

impl PromptCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(
        &mut self,
        provider: &str,
        system_prompt: &str,
        provider_supports_cache: bool,
        provider_cache_info: Option<String>,
        ttl: Option<chrono::Duration>,
        now: DateTime<Utc>,
    ) -> &PromptCacheEntry {
        let key = cache_key(provider, system_prompt);
        let entry = PromptCacheEntry {
            key: key.clone(),
            provider_supports_cache,
            provider_cache_info,
            created_at: now,
            expires_at: ttl.map(|d| now + d),
        };
        self.entries.insert(key.clone(), entry);
        self.entries.get(&key).expect("entry just inserted")
    }

    /// Returns the entry for `{provider, system_prompt}` if present and not
    /// expired as of `now`; an expired entry is evicted on read.
    pub fn get(
        &mut self,
        provider: &str,
        system_prompt: &str,
        now: DateTime<Utc>,
    ) -> Option<&PromptCacheEntry> {
        let key = cache_key(provider, system_prompt);
        if self.entries.get(&key).is_some_and(|e| e.is_expired(now)) {
            self.entries.remove(&key);
            return None;
        }
        self.entries.get(&key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn key_is_stable_for_same_provider_and_prompt() {
        assert_eq!(
            cache_key("openai", "you are helpful"),
            cache_key("openai", "you are helpful")
        );
    }

    #[test]
    fn key_differs_when_provider_or_prompt_changes() {
        assert_ne!(
            cache_key("openai", "prompt"),
            cache_key("anthropic", "prompt")
        );
        assert_ne!(cache_key("openai", "a"), cache_key("openai", "b"));
    }

    #[test]
    fn put_then_get_round_trips_before_expiry() {
        let mut cache = PromptCache::new();
        let now = Utc::now();
        cache.put("openai", "sys", true, None, Some(Duration::hours(1)), now);
        assert!(cache.get("openai", "sys", now).is_some());
    }

    #[test]
    fn get_evicts_expired_entry() {
        let mut cache = PromptCache::new();
        let now = Utc::now();
        cache.put("openai", "sys", true, None, Some(Duration::minutes(1)), now);
        let later = now + Duration::minutes(2);
        assert!(cache.get("openai", "sys", later).is_none());
        // Evicted, not just hidden: a fresh put at `later` must succeed cleanly.
        cache.put("openai", "sys", true, None, None, later);
        assert!(cache.get("openai", "sys", later).is_some());
    }

    #[test]
    fn entry_without_ttl_never_expires() {
        let mut cache = PromptCache::new();
        let now = Utc::now();
        cache.put("openai", "sys", true, None, None, now);
        assert!(
            cache
                .get("openai", "sys", now + Duration::days(365))
                .is_some()
        );
    }
}
