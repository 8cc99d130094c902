//! Translation module: cache tiers, provider client, shared dictionary and the
//! cache-aside resolver that ties them together.

pub mod cache;
pub mod firestore;
pub mod libre;
#[cfg(test)]
mod mock_http;
pub mod normalize;
pub mod remote;
pub mod service;
pub mod sqlite_cache;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use normalize::{normalize_lang, LangCode};
pub use service::TranslationService;

impl From<&str> for LangCode {
    fn from(s: &str) -> Self {
        normalize_lang(Some(s))
    }
}

impl From<Option<&str>> for LangCode {
    fn from(s: Option<&str>) -> Self {
        normalize_lang(s)
    }
}

impl From<&String> for LangCode {
    fn from(s: &String) -> Self {
        normalize_lang(Some(s))
    }
}

/// One resolved translation, as moved between tiers in bulk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub source_text: String,
    pub target_lang: LangCode,
    pub translated_text: String,
}

impl CacheEntry {
    pub fn new(
        source_text: impl Into<String>,
        target_lang: LangCode,
        translated_text: impl Into<String>,
    ) -> Self {
        Self {
            source_text: source_text.into(),
            target_lang,
            translated_text: translated_text.into(),
        }
    }
}

/// External translation backend.
#[async_trait]
pub trait TranslationProvider: Send + Sync {
    /// Translate a batch. Must return exactly one string per input, in order.
    async fn translate_many(
        &self,
        texts: &[String],
        target: LangCode,
    ) -> Result<Vec<String>, TranslateError>;

    async fn translate_one(&self, text: &str, target: LangCode) -> Result<String, TranslateError>;
}

#[derive(Debug, thiserror::Error)]
pub enum TranslateError {
    #[error("API error: {0}")]
    Api(String),
    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },
    #[error("translation timeout")]
    Timeout,
    #[error("translation cancelled")]
    Cancelled,
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("document not found")]
    NotFound,
    #[error("storage error: {0}")]
    Storage(String),
    #[error("configuration error: {0}")]
    Config(String),
}
