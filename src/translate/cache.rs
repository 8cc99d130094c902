//! Local translation cache: in-memory LRU in front of the optional SQLite tier.
//! Lookups check memory first, then SQLite; SQLite hits are promoted into memory.
//! Writes go to both tiers. SQLite failures are logged and swallowed, so the
//! memory tier stays authoritative for the life of the process.
//!
//! Entries are never deleted. A bounded memory tier only makes sense in front of
//! SQLite, where an evicted entry is still one lookup away; a memory-only cache
//! should be [`LocalCache::unbounded`].

use std::num::NonZeroUsize;

use lru::LruCache;
use parking_lot::Mutex;
use tracing::warn;

use super::sqlite_cache::SqliteCache;
use super::{CacheEntry, LangCode};

/// Default in-memory capacity.
pub const DEFAULT_MEMORY_CAPACITY: usize = 8192;

/// Composite cache key. No string concatenation, so no separator collisions.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub lang: LangCode,
    pub text: String,
}

impl CacheKey {
    pub fn new(lang: LangCode, text: impl Into<String>) -> Self {
        Self {
            lang,
            text: text.into(),
        }
    }
}

pub struct LocalCache {
    memory: Mutex<LruCache<CacheKey, String>>,
    bounded: bool,
    persistent: Option<SqliteCache>,
}

impl LocalCache {
    /// Memory-only cache holding at most `capacity` entries. Evicted entries
    /// are gone; prefer [`LocalCache::unbounded`] without a persistent tier.
    pub fn new(capacity: usize) -> Self {
        Self {
            memory: Mutex::new(LruCache::new(
                NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN),
            )),
            bounded: true,
            persistent: None,
        }
    }

    /// Memory-only cache that never evicts.
    pub fn unbounded() -> Self {
        Self {
            memory: Mutex::new(LruCache::unbounded()),
            bounded: false,
            persistent: None,
        }
    }

    /// Memory cache backed by a persistent SQLite tier.
    pub fn with_persistent(capacity: usize, persistent: SqliteCache) -> Self {
        Self {
            persistent: Some(persistent),
            ..Self::new(capacity)
        }
    }

    pub fn has_persistent(&self) -> bool {
        self.persistent.is_some()
    }

    pub fn is_bounded(&self) -> bool {
        self.bounded
    }

    pub fn get(&self, lang: LangCode, text: &str) -> Option<String> {
        let key = CacheKey::new(lang, text);
        if let Some(hit) = self.memory.lock().get(&key) {
            return Some(hit.clone());
        }
        let hit = self.persistent.as_ref()?.get(lang, text)?;
        self.memory.lock().put(key, hit.clone());
        Some(hit)
    }

    pub fn put(&self, lang: LangCode, text: &str, translation: &str) {
        self.memory
            .lock()
            .put(CacheKey::new(lang, text), translation.to_string());
        if let Some(persistent) = &self.persistent {
            if let Err(e) = persistent.insert(lang, text, translation) {
                warn!(error = %e, lang = %lang, "persistent cache write dropped");
            }
        }
    }

    /// Bulk load, used when warming from the shared dictionary.
    pub fn put_many(&self, entries: &[CacheEntry]) {
        {
            let mut memory = self.memory.lock();
            for entry in entries {
                memory.put(
                    CacheKey::new(entry.target_lang, entry.source_text.as_str()),
                    entry.translated_text.clone(),
                );
            }
        }
        if let Some(persistent) = &self.persistent {
            if let Err(e) = persistent.insert_many(entries) {
                warn!(error = %e, count = entries.len(), "persistent cache bulk write dropped");
            }
        }
    }

    pub fn memory_len(&self) -> usize {
        self.memory.lock().len()
    }

    /// Entries persisted for `lang`; zero without a persistent tier.
    pub fn persistent_len(&self, lang: LangCode) -> usize {
        self.persistent.as_ref().map_or(0, |p| p.count(lang))
    }
}

impl Default for LocalCache {
    fn default() -> Self {
        Self::new(DEFAULT_MEMORY_CAPACITY)
    }
}
