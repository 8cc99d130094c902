//! Setu Translate: cache-aside quiz translation for Shiksha Setu.
//! Library entry: tracing setup and service wiring from configuration.

pub mod cancellation;
pub mod config;
pub mod metrics;
pub mod quiz;
pub mod translate;

use std::sync::Arc;

use tracing::{info, warn};

use config::TranslatorConfig;
use metrics::MetricsRegistry;
use translate::cache::LocalCache;
use translate::firestore::{FirestoreStore, API_BASE as FIRESTORE_API_BASE};
use translate::libre::LibreTranslateClient;
use translate::sqlite_cache::SqliteCache;
use translate::{TranslateError, TranslationService};

pub use quiz::{translate_questions, translate_questions_with_cancel, Question, QuizOption};
pub use translate::{normalize_lang, LangCode};

/// Initialize tracing. `RUST_LOG` overrides the default filter.
pub fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("setu_translate=info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    let result = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    if let Err(e) = result {
        eprintln!("tracing already initialized: {e}");
    }
}

/// Build the translation service described by `config`.
///
/// The persistent tier is skipped (with a warning) when its database cannot be
/// opened. Without it the memory tier is unbounded, so nothing resolved in this
/// process is ever evicted. Provider and shared-store construction errors are
/// returned.
pub fn build_service(
    config: &TranslatorConfig,
    local_only: bool,
) -> Result<TranslationService, TranslateError> {
    let metrics = Arc::new(MetricsRegistry::new());

    let local = match &config.cache_db {
        Some(path) => match SqliteCache::open(path) {
            Ok(db) => LocalCache::with_persistent(config.memory_capacity, db),
            Err(e) => {
                warn!(error = %e, "persistent cache unavailable, memory only");
                LocalCache::unbounded()
            }
        },
        None => LocalCache::unbounded(),
    };

    let provider = LibreTranslateClient::new(
        config.endpoint.clone(),
        config.api_key.clone(),
        config.request_timeout,
    )?;
    info!(endpoint = %provider.endpoint(), "translation provider ready");

    let mut service = TranslationService::new(Arc::new(provider), Arc::new(local))
        .with_metrics(metrics)
        .with_deadline(config.translate_deadline);

    match (&config.firestore_project, local_only) {
        (Some(project), false) => {
            let store = FirestoreStore::with_api_base(
                config.firestore_api_base.as_deref().unwrap_or(FIRESTORE_API_BASE),
                project,
                &config.firestore_database,
                config.firestore_token.clone(),
                config.request_timeout,
            )?;
            info!(project = %project, "shared translation cache enabled");
            service = service.with_remote(Arc::new(store));
        }
        _ => info!("shared translation cache disabled, local only"),
    }

    Ok(service)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_local_only_without_project() {
        let service = build_service(&TranslatorConfig::default(), false).unwrap();
        assert!(!service.has_remote());
        assert!(!service.local_cache().has_persistent());
        assert!(!service.local_cache().is_bounded());
    }

    #[test]
    fn builds_with_shared_tier_and_sqlite() {
        let dir = tempfile::tempdir().unwrap();
        let config = TranslatorConfig {
            cache_db: Some(dir.path().join("cache.db")),
            firestore_project: Some("setu-test".into()),
            ..TranslatorConfig::default()
        };
        let service = build_service(&config, false).unwrap();
        assert!(service.has_remote());
        assert!(service.local_cache().has_persistent());
        assert!(service.local_cache().is_bounded());

        let local_only = build_service(&config, true).unwrap();
        assert!(!local_only.has_remote());
    }
}
