//! Cache-aside resolver.
//! Local tiers first, then one batched provider call for the misses (falling back
//! to one call per string), then write-through to the local tiers and the shared
//! dictionary. Every failure degrades to the original text; nothing escapes.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

use super::cache::LocalCache;
use super::remote::{self, RemoteEntry, RemoteStore};
use super::{LangCode, TranslateError, TranslationProvider};
use crate::metrics::{metric_names, MetricsRegistry, RequestIds};

/// Budget for all provider calls of one batch, retries and fallback included.
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(20);

pub struct TranslationService {
    provider: Arc<dyn TranslationProvider>,
    local: Arc<LocalCache>,
    remote: Option<Arc<dyn RemoteStore>>,
    metrics: Arc<MetricsRegistry>,
    deadline: Duration,
}

impl TranslationService {
    /// Local-only service. Add a shared tier with [`TranslationService::with_remote`].
    pub fn new(provider: Arc<dyn TranslationProvider>, local: Arc<LocalCache>) -> Self {
        Self {
            provider,
            local,
            remote: None,
            metrics: Arc::new(MetricsRegistry::new()),
            deadline: DEFAULT_DEADLINE,
        }
    }

    /// Past `deadline` a batch gives up on the provider and returns its
    /// misses untranslated, writing nothing.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn with_remote(mut self, remote: Arc<dyn RemoteStore>) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn local_cache(&self) -> &Arc<LocalCache> {
        &self.local
    }

    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.metrics
    }

    pub fn has_remote(&self) -> bool {
        self.remote.is_some()
    }

    /// Warm the local tiers from the shared dictionary. Silent on any failure.
    pub async fn preload(&self, lang: impl Into<LangCode>) {
        let lang = lang.into();
        if lang.is_english() {
            return;
        }
        let Some(store) = &self.remote else {
            return;
        };

        let span = self.metrics.span(metric_names::REMOTE_PRELOAD);
        match store.fetch_dictionary(lang).await {
            Ok(Some(dict)) => {
                let entries = dict.usable_entries();
                self.local.put_many(&entries);
                info!(lang = %lang, entries = entries.len(), "translation cache preloaded");
            }
            Ok(None) => debug!(lang = %lang, "no shared dictionary yet"),
            Err(e) => warn!(error = %e, lang = %lang, "shared dictionary preload failed"),
        }
        span.finish();
    }

    /// Merge entries into the shared dictionary. Failures are logged and dropped.
    pub async fn merge_write(&self, lang: impl Into<LangCode>, entries: &[RemoteEntry]) {
        let lang = lang.into();
        let Some(store) = &self.remote else {
            return;
        };
        if lang.is_english() || entries.is_empty() {
            return;
        }

        let span = self.metrics.span(metric_names::REMOTE_WRITE);
        if let Err(e) = remote::merge_write(store.as_ref(), lang, entries).await {
            warn!(error = %e, lang = %lang, count = entries.len(), "shared dictionary write dropped");
        }
        span.finish();
    }

    /// Translate `texts`, returning one string per input in input order.
    pub async fn translate_batch(&self, texts: &[String], lang: impl Into<LangCode>) -> Vec<String> {
        self.translate_batch_with_cancel(texts, lang, &CancellationToken::new())
            .await
    }

    /// As [`TranslationService::translate_batch`]. Once `cancel` fires the call
    /// returns the original texts and writes nothing to any cache tier.
    /// Provider work is bounded by the service deadline.
    pub async fn translate_batch_with_cancel(
        &self,
        texts: &[String],
        lang: impl Into<LangCode>,
        cancel: &CancellationToken,
    ) -> Vec<String> {
        let lang = lang.into();
        if texts.is_empty() || lang.is_english() {
            return texts.to_vec();
        }

        let ids = RequestIds::new();
        let span = info_span!(
            "translate_batch",
            trace_id = %ids.trace_id,
            request_id = %ids.request_id,
            lang = %lang,
            count = texts.len()
        );
        self.resolve(texts, lang, cancel).instrument(span).await
    }

    async fn resolve(
        &self,
        texts: &[String],
        lang: LangCode,
        cancel: &CancellationToken,
    ) -> Vec<String> {
        let mut out: Vec<Option<String>> =
            texts.iter().map(|t| self.local.get(lang, t)).collect();

        // Unique misses in first-seen order.
        let mut misses: Vec<String> = Vec::new();
        let mut miss_index: HashMap<&str, usize> = HashMap::new();
        for (slot, text) in out.iter().zip(texts) {
            if slot.is_none() && !miss_index.contains_key(text.as_str()) {
                miss_index.insert(text.as_str(), misses.len());
                misses.push(text.clone());
            }
        }

        let hits = out.iter().filter(|s| s.is_some()).count();
        self.metrics.incr(metric_names::CACHE_HITS, hits as u64);
        self.metrics
            .incr(metric_names::CACHE_MISSES, (texts.len() - hits) as u64);

        if misses.is_empty() {
            debug!(hits, "all cached");
            return fill(out, texts);
        }

        let fetched =
            tokio::time::timeout(self.deadline, self.fetch_misses(&misses, lang, cancel)).await;
        let resolved = match fetched {
            Ok(Ok(resolved)) => resolved,
            Ok(Err(_)) => {
                self.metrics.incr(metric_names::CANCELLED_BATCHES, 1);
                debug!("batch cancelled, returning originals");
                return texts.to_vec();
            }
            Err(_) => {
                self.metrics.incr(metric_names::DEADLINE_EXCEEDED, 1);
                warn!(
                    deadline_ms = self.deadline.as_millis() as u64,
                    misses = misses.len(),
                    "provider deadline exceeded, misses left untranslated"
                );
                return fill(out, texts);
            }
        };

        if cancel.is_cancelled() {
            self.metrics.incr(metric_names::CANCELLED_BATCHES, 1);
            return texts.to_vec();
        }

        let mut to_persist = Vec::with_capacity(misses.len());
        for (source, translated) in misses.iter().zip(&resolved) {
            self.local.put(lang, source, translated);
            to_persist.push(RemoteEntry::new(source.as_str(), translated.as_str()));
        }

        for (slot, text) in out.iter_mut().zip(texts) {
            if slot.is_none() {
                if let Some(&j) = miss_index.get(text.as_str()) {
                    *slot = Some(resolved[j].clone());
                }
            }
        }

        self.merge_write(lang, &to_persist).await;

        debug!(hits, misses = misses.len(), "batch resolved");
        fill(out, texts)
    }

    /// One batched call, then one call per string if the batch is rejected.
    /// Per-string failures and empty results fall back to the original text.
    /// Only cancellation is reported as an error.
    async fn fetch_misses(
        &self,
        misses: &[String],
        lang: LangCode,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, TranslateError> {
        let span = self.metrics.span(metric_names::PROVIDER_BATCH);
        let batch = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(TranslateError::Cancelled),
            r = self.provider.translate_many(misses, lang) => r,
        };
        span.finish();

        match batch {
            Ok(translated) if translated.len() == misses.len() => {
                return Ok(misses
                    .iter()
                    .zip(translated)
                    .map(|(orig, tr)| non_empty_or(tr, orig))
                    .collect());
            }
            Ok(translated) => {
                warn!(
                    expected = misses.len(),
                    got = translated.len(),
                    "batch shape mismatch, falling back to per-string"
                );
            }
            Err(e) => {
                warn!(error = %e, "batch translation failed, falling back to per-string");
            }
        }

        self.metrics.incr(metric_names::BATCH_FALLBACKS, 1);
        let mut out = Vec::with_capacity(misses.len());
        for text in misses {
            let span = self.metrics.span(metric_names::PROVIDER_SINGLE);
            let single = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(TranslateError::Cancelled),
                r = self.provider.translate_one(text, lang) => r,
            };
            span.finish();

            match single {
                Ok(tr) => out.push(non_empty_or(tr, text)),
                Err(e) => {
                    self.metrics.incr(metric_names::PROVIDER_FAILURES, 1);
                    debug!(error = %e, "single translation failed, keeping original");
                    out.push(text.clone());
                }
            }
        }
        Ok(out)
    }
}

fn non_empty_or(translated: String, original: &str) -> String {
    if translated.is_empty() {
        original.to_string()
    } else {
        translated
    }
}

fn fill(out: Vec<Option<String>>, texts: &[String]) -> Vec<String> {
    out.into_iter()
        .zip(texts)
        .map(|(slot, orig)| slot.unwrap_or_else(|| orig.clone()))
        .collect()
}
