//! Translation cache: `(source_text, target_language)` → translation.
//!
//! The persistent tier lives in the database and is shared by every run and
//! analysis. `SessionCache` fronts it with an in-memory map for the lifetime
//! of one pipeline job.

use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub translated_text: String,
    pub quality_score: f64,
}

/// Exact-match translation cache.
///
/// `get` returns `Ok(None)` for unseen pairs; "not found" is never an error.
/// `put` is an idempotent upsert, last writer wins.
#[async_trait]
pub trait TranslationCache: Send + Sync {
    async fn get(&self, source_text: &str, target_language: &str) -> Result<Option<CacheEntry>>;

    async fn put(
        &self,
        source_text: &str,
        target_language: &str,
        translated_text: &str,
        quality_score: f64,
    ) -> Result<()>;
}

/// Read-through, write-through memory tier over a persistent cache.
///
/// Persistent-tier failures never reach the caller: a failed read is a miss,
/// a failed write still keeps the in-memory entry.
pub struct SessionCache {
    persistent: Arc<dyn TranslationCache>,
    memory: DashMap<String, CacheEntry>,
}

impl SessionCache {
    pub fn new(persistent: Arc<dyn TranslationCache>) -> Self {
        Self {
            persistent,
            memory: DashMap::new(),
        }
    }

    pub async fn lookup(&self, source_text: &str, target_language: &str) -> Option<CacheEntry> {
        let key = cache_key(target_language, source_text);
        if let Some(entry) = self.memory.get(&key) {
            return Some(entry.clone());
        }

        match self.persistent.get(source_text, target_language).await {
            Ok(Some(entry)) => {
                debug!("Cache hit in database for '{}' ({})", source_text, target_language);
                self.memory.insert(key, entry.clone());
                Some(entry)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(
                    "Cache read failed for '{}' ({}), treating as miss: {:#}",
                    source_text, target_language, e
                );
                None
            }
        }
    }

    pub async fn store(
        &self,
        source_text: &str,
        target_language: &str,
        translated_text: &str,
        quality_score: f64,
    ) {
        self.memory.insert(
            cache_key(target_language, source_text),
            CacheEntry {
                translated_text: translated_text.to_string(),
                quality_score,
            },
        );

        if let Err(e) = self
            .persistent
            .put(source_text, target_language, translated_text, quality_score)
            .await
        {
            warn!(
                "Cache write failed for '{}' ({}), keeping in-memory entry: {:#}",
                source_text, target_language, e
            );
        }
    }

}

impl std::fmt::Debug for SessionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCache")
            .field("memory_len", &self.memory.len())
            .finish()
    }
}

/// Null byte separator so language and text can never collide.
fn cache_key(target_language: &str, source_text: &str) -> String {
    format!("{target_language}\0{source_text}")
}
