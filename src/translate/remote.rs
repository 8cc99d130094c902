//! Remote shared translation memory.
//! One dictionary document per target language, keyed by a djb2 hash of the
//! source text so every client converges on the same field for the same text.
//! Hash collisions are not detected: a colliding text overwrites the other's
//! entry (last write wins). Accepted for a best-effort cache.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{CacheEntry, LangCode, TranslateError};

/// Firestore collection holding one document per language.
pub const COLLECTION: &str = "translations_cache";
/// Document field holding the hash -> entry map.
pub const DICT_FIELD: &str = "dict";

/// One shared translation pair, stored as `{ s, t }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteEntry {
    #[serde(rename = "s")]
    pub source: String,
    #[serde(rename = "t")]
    pub translated: String,
}

impl RemoteEntry {
    pub fn new(source: impl Into<String>, translated: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            translated: translated.into(),
        }
    }

    /// Map key this entry is stored under.
    pub fn field_key(&self) -> String {
        hashed_field_key(&self.source)
    }
}

/// Shared dictionary document for one language.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteDictionary {
    pub lang: LangCode,
    pub entries: HashMap<String, RemoteEntry>,
}

impl RemoteDictionary {
    pub fn new(lang: LangCode) -> Self {
        Self {
            lang,
            entries: HashMap::new(),
        }
    }

    /// Insert under the entry's hashed key, replacing any previous value.
    pub fn insert(&mut self, entry: RemoteEntry) {
        self.entries.insert(entry.field_key(), entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries safe to copy into the local tiers. Rows with an empty source are skipped.
    pub fn usable_entries(&self) -> Vec<CacheEntry> {
        self.entries
            .values()
            .filter(|e| !e.source.is_empty())
            .map(|e| CacheEntry::new(e.source.as_str(), self.lang, e.translated.as_str()))
            .collect()
    }
}

/// djb2 over UTF-16 code units with 32-bit wrap, rendered in base 36.
/// Matches the web client bit-for-bit so both write to the same keys.
pub fn djb2(text: &str) -> String {
    let mut h: i32 = 5381;
    for unit in text.encode_utf16() {
        h = h.wrapping_shl(5).wrapping_add(h) ^ i32::from(unit);
    }
    to_base36(h as u32)
}

/// `k_` prefix keeps the key a valid unquoted document field path.
pub fn hashed_field_key(source: &str) -> String {
    format!("k_{}", djb2(source))
}

fn to_base36(mut n: u32) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut buf = Vec::with_capacity(7);
    while n > 0 {
        buf.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    buf.reverse();
    String::from_utf8_lossy(&buf).into_owned()
}

/// Backend for the shared tier.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Fetch the whole dictionary. `Ok(None)` when the document does not exist.
    async fn fetch_dictionary(
        &self,
        lang: LangCode,
    ) -> Result<Option<RemoteDictionary>, TranslateError>;

    /// Field-level merge of `entries`. Returns `TranslateError::NotFound` when
    /// the document does not exist yet.
    async fn update_entries(
        &self,
        lang: LangCode,
        entries: &[RemoteEntry],
    ) -> Result<(), TranslateError>;

    /// Create an empty dictionary. An already existing document is not an error.
    async fn create_dictionary(&self, lang: LangCode) -> Result<(), TranslateError>;
}

/// Merge entries into the shared dictionary, creating it on first write.
pub async fn merge_write(
    store: &dyn RemoteStore,
    lang: LangCode,
    entries: &[RemoteEntry],
) -> Result<(), TranslateError> {
    if lang.is_english() || entries.is_empty() {
        return Ok(());
    }
    match store.update_entries(lang, entries).await {
        Err(TranslateError::NotFound) => {
            debug!(lang = %lang, "shared dictionary missing, creating");
            store.create_dictionary(lang).await?;
            store.update_entries(lang, entries).await
        }
        other => other,
    }
}

/// In-process shared store. Backs local-only deployments and tests.
#[derive(Default)]
pub struct MemoryRemoteStore {
    docs: Mutex<HashMap<LangCode, RemoteDictionary>>,
    fetches: AtomicUsize,
    updates: AtomicUsize,
    creates: AtomicUsize,
}

impl MemoryRemoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a document directly.
    pub fn insert_dictionary(&self, dict: RemoteDictionary) {
        self.docs.lock().insert(dict.lang, dict);
    }

    pub fn dictionary(&self, lang: LangCode) -> Option<RemoteDictionary> {
        self.docs.lock().get(&lang).cloned()
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn update_count(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    pub fn create_count(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteStore for MemoryRemoteStore {
    async fn fetch_dictionary(
        &self,
        lang: LangCode,
    ) -> Result<Option<RemoteDictionary>, TranslateError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.docs.lock().get(&lang).cloned())
    }

    async fn update_entries(
        &self,
        lang: LangCode,
        entries: &[RemoteEntry],
    ) -> Result<(), TranslateError> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        let mut docs = self.docs.lock();
        let Some(dict) = docs.get_mut(&lang) else {
            return Err(TranslateError::NotFound);
        };
        for entry in entries {
            dict.insert(entry.clone());
        }
        Ok(())
    }

    async fn create_dictionary(&self, lang: LangCode) -> Result<(), TranslateError> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        let mut docs = self.docs.lock();
        if docs.contains_key(&lang) {
            warn!(lang = %lang, "shared dictionary already exists");
        } else {
            docs.insert(lang, RemoteDictionary::new(lang));
        }
        Ok(())
    }
}
