//! Observability: per-batch request IDs, latency histograms, hit/miss counters.
//! Histograms track p50/p95/p99 for provider calls, shared-store round trips
//! and whole quiz translations.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

/// Identifiers attached to every translation batch.
#[derive(Debug, Clone)]
pub struct RequestIds {
    pub trace_id: String,
    pub request_id: String,
}

impl RequestIds {
    pub fn new() -> Self {
        Self {
            trace_id: uuid::Uuid::new_v4().to_string(),
            request_id: uuid::Uuid::new_v4().to_string(),
        }
    }
}

impl Default for RequestIds {
    fn default() -> Self {
        Self::new()
    }
}

/// A span measuring elapsed time from creation to explicit end.
pub struct TimingSpan {
    name: &'static str,
    start: Instant,
    registry: Arc<MetricsRegistry>,
}

impl TimingSpan {
    pub fn new(name: &'static str, registry: Arc<MetricsRegistry>) -> Self {
        Self {
            name,
            start: Instant::now(),
            registry,
        }
    }

    /// End the span, recording elapsed duration in microseconds.
    pub fn finish(self) -> f64 {
        let elapsed_us = self.start.elapsed().as_micros() as f64;
        self.registry.record(self.name, elapsed_us);
        elapsed_us
    }
}

/// Fixed-capacity ring buffer for histogram samples.
struct SampleRing {
    samples: Vec<f64>,
    pos: usize,
    count: usize,
    capacity: usize,
}

impl SampleRing {
    fn new(capacity: usize) -> Self {
        Self {
            samples: vec![0.0; capacity],
            pos: 0,
            count: 0,
            capacity,
        }
    }

    fn push(&mut self, value: f64) {
        self.samples[self.pos] = value;
        self.pos = (self.pos + 1) % self.capacity;
        if self.count < self.capacity {
            self.count += 1;
        }
    }

    fn percentile(&self, p: f64) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        let mut sorted: Vec<f64> = self.samples[..self.count].to_vec();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let idx = ((p / 100.0) * (self.count as f64 - 1.0)).round() as usize;
        let idx = idx.min(self.count - 1);
        sorted[idx]
    }
}

/// Stores histograms and counters for all named metrics.
pub struct MetricsRegistry {
    histograms: Mutex<HashMap<&'static str, SampleRing>>,
    counters: Mutex<HashMap<&'static str, u64>>,
    ring_capacity: usize,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self {
            histograms: Mutex::new(HashMap::new()),
            counters: Mutex::new(HashMap::new()),
            ring_capacity: 1024,
        }
    }

    /// Record a sample (in microseconds) for the named metric.
    pub fn record(&self, name: &'static str, value_us: f64) {
        let mut hists = self.histograms.lock();
        hists
            .entry(name)
            .or_insert_with(|| SampleRing::new(self.ring_capacity))
            .push(value_us);
        tracing::trace!(metric = name, value_us = value_us, "metric_recorded");
    }

    /// Add `by` to a counter.
    pub fn incr(&self, name: &'static str, by: u64) {
        if by == 0 {
            return;
        }
        *self.counters.lock().entry(name).or_insert(0) += by;
    }

    pub fn counter(&self, name: &str) -> u64 {
        self.counters.lock().get(name).copied().unwrap_or(0)
    }

    /// Start a timing span that records on finish.
    pub fn span(self: &Arc<Self>, name: &'static str) -> TimingSpan {
        TimingSpan::new(name, Arc::clone(self))
    }

    /// Get percentile for a metric (p value 0-100). Returns microseconds.
    pub fn percentile(&self, name: &str, p: f64) -> f64 {
        let hists = self.histograms.lock();
        hists
            .get(name)
            .map(|ring| ring.percentile(p))
            .unwrap_or(0.0)
    }

    /// Generate a summary of all histograms at p50/p95/p99.
    pub fn summary(&self) -> HashMap<String, MetricSummary> {
        let hists = self.histograms.lock();
        let mut out = HashMap::new();
        for (&name, ring) in hists.iter() {
            out.insert(
                name.to_string(),
                MetricSummary {
                    p50_us: ring.percentile(50.0),
                    p95_us: ring.percentile(95.0),
                    p99_us: ring.percentile(99.0),
                    count: ring.count,
                },
            );
        }
        out
    }

    /// Snapshot of all counters.
    pub fn counters(&self) -> HashMap<String, u64> {
        self.counters
            .lock()
            .iter()
            .map(|(&k, &v)| (k.to_string(), v))
            .collect()
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct MetricSummary {
    pub p50_us: f64,
    pub p95_us: f64,
    pub p99_us: f64,
    pub count: usize,
}

/// Well-known metric names (constants to avoid typos).
pub mod metric_names {
    pub const PROVIDER_BATCH: &str = "t_provider_batch";
    pub const PROVIDER_SINGLE: &str = "t_provider_single";
    pub const REMOTE_PRELOAD: &str = "t_remote_preload";
    pub const REMOTE_WRITE: &str = "t_remote_write";
    pub const QUIZ_TRANSLATE: &str = "t_quiz_translate";
    // Counters
    pub const CACHE_HITS: &str = "cache_hits";
    pub const CACHE_MISSES: &str = "cache_misses";
    pub const BATCH_FALLBACKS: &str = "batch_fallbacks";
    pub const PROVIDER_FAILURES: &str = "provider_failures";
    pub const CANCELLED_BATCHES: &str = "cancelled_batches";
    pub const DEADLINE_EXCEEDED: &str = "deadline_exceeded";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentiles_over_recorded_samples() {
        let registry = MetricsRegistry::new();
        for v in 1..=100 {
            registry.record("t_test", v as f64);
        }
        assert_eq!(registry.percentile("t_test", 0.0), 1.0);
        assert_eq!(registry.percentile("t_test", 100.0), 100.0);
        assert_eq!(registry.summary()["t_test"].count, 100);
        assert_eq!(registry.percentile("t_missing", 50.0), 0.0);
    }

    #[test]
    fn counters_accumulate() {
        let registry = MetricsRegistry::new();
        registry.incr(metric_names::CACHE_HITS, 2);
        registry.incr(metric_names::CACHE_HITS, 3);
        registry.incr(metric_names::CACHE_MISSES, 0);
        assert_eq!(registry.counter(metric_names::CACHE_HITS), 5);
        assert_eq!(registry.counter(metric_names::CACHE_MISSES), 0);
        assert_eq!(registry.counters().len(), 1);
    }

    #[test]
    fn span_records_on_finish() {
        let registry = Arc::new(MetricsRegistry::new());
        let span = registry.span(metric_names::PROVIDER_BATCH);
        span.finish();
        assert_eq!(registry.summary()[metric_names::PROVIDER_BATCH].count, 1);
    }
}
