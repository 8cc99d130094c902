//! Runtime configuration from environment variables.
//! Every setting has a default; malformed values are logged and replaced.

use std::env;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tracing::{info, warn};

use crate::translate::cache::DEFAULT_MEMORY_CAPACITY;
use crate::translate::libre::{DEFAULT_ENDPOINT, DEFAULT_TIMEOUT};
use crate::translate::service::DEFAULT_DEADLINE;

#[derive(Debug, Clone)]
pub struct TranslatorConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub request_timeout: Duration,
    /// Total provider budget per batch, retries and fallback included.
    pub translate_deadline: Duration,
    /// Only applies when a persistent tier is configured.
    pub memory_capacity: usize,
    /// Unset means no persistent local tier.
    pub cache_db: Option<PathBuf>,
    /// Unset means no shared tier (local-only mode).
    pub firestore_project: Option<String>,
    pub firestore_database: String,
    pub firestore_token: Option<String>,
    /// REST root override, e.g. the emulator.
    pub firestore_api_base: Option<String>,
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key: None,
            request_timeout: DEFAULT_TIMEOUT,
            translate_deadline: DEFAULT_DEADLINE,
            memory_capacity: DEFAULT_MEMORY_CAPACITY,
            cache_db: None,
            firestore_project: None,
            firestore_database: "(default)".to_string(),
            firestore_token: None,
            firestore_api_base: None,
        }
    }
}

impl TranslatorConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let timeout_ms = parse_or(
            "SETU_REQUEST_TIMEOUT_MS",
            var("SETU_REQUEST_TIMEOUT_MS"),
            defaults.request_timeout.as_millis() as u64,
        );
        let deadline_ms = parse_or(
            "SETU_TRANSLATE_DEADLINE_MS",
            var("SETU_TRANSLATE_DEADLINE_MS"),
            defaults.translate_deadline.as_millis() as u64,
        );

        Self {
            endpoint: var("SETU_LT_ENDPOINT").unwrap_or_else(|| {
                info!("SETU_LT_ENDPOINT not set, using default: {}", defaults.endpoint);
                defaults.endpoint.clone()
            }),
            api_key: var("SETU_LT_API_KEY"),
            request_timeout: Duration::from_millis(timeout_ms),
            translate_deadline: Duration::from_millis(deadline_ms),
            memory_capacity: parse_or(
                "SETU_MEMORY_CAPACITY",
                var("SETU_MEMORY_CAPACITY"),
                defaults.memory_capacity,
            ),
            cache_db: var("SETU_CACHE_DB").map(PathBuf::from),
            firestore_project: var("SETU_FIRESTORE_PROJECT"),
            firestore_database: var("SETU_FIRESTORE_DATABASE")
                .unwrap_or(defaults.firestore_database),
            firestore_token: var("SETU_FIRESTORE_TOKEN"),
            firestore_api_base: var("SETU_FIRESTORE_API_BASE"),
        }
    }
}

fn parse_or<T>(key: &str, raw: Option<String>, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match raw {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|e| {
            warn!("Invalid {key} value {raw:?}: {e}, using default: {default}");
            default
        }),
    }
}
