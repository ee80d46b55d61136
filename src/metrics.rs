//! Metrics collection and export module

use prometheus::{Histogram, HistogramOpts, IntCounter, IntGauge, Opts, Registry};

/// Global metrics registry
pub struct Metrics {
    registry: Registry,

    // Counters
    pub requests_total: IntCounter,
    pub requests_invalid_address: IntCounter,
    pub requests_cooldown_rejected: IntCounter,
    pub batches_submitted: IntCounter,
    pub batches_failed: IntCounter,
    pub submission_retries: IntCounter,
    pub ops_pruned: IntCounter,

    // Gauges
    pub active_distributions: IntGauge,

    // Histograms
    pub submit_latency: Histogram,
}

impl Metrics {
    /// Create new metrics instance
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let requests_total = IntCounter::with_opts(Opts::new(
            "requests_total",
            "Total number of distribution requests received",
        ))?;

        let requests_invalid_address = IntCounter::with_opts(Opts::new(
            "requests_invalid_address",
            "Requests rejected for a malformed target address",
        ))?;

        let requests_cooldown_rejected = IntCounter::with_opts(Opts::new(
            "requests_cooldown_rejected",
            "Requests rejected by the per-requester cooldown guard",
        ))?;

        let batches_submitted = IntCounter::with_opts(Opts::new(
            "batches_submitted",
            "Batches that committed to the ledger",
        ))?;

        let batches_failed = IntCounter::with_opts(Opts::new(
            "batches_failed",
            "Batches that ended in a permanent failure",
        ))?;

        let submission_retries = IntCounter::with_opts(Opts::new(
            "submission_retries",
            "Transient submission failures that were retried",
        ))?;

        let ops_pruned = IntCounter::with_opts(Opts::new(
            "ops_pruned",
            "Operations removed from batches for missing recipient authorization",
        ))?;

        let active_distributions = IntGauge::with_opts(Opts::new(
            "active_distributions",
            "Distributions currently in flight",
        ))?;

        let submit_latency = Histogram::with_opts(
            HistogramOpts::new("submit_latency_seconds", "Batch submission latency")
                .buckets(vec![0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0]),
        )?;

        registry.register(Box::new(requests_total.clone()))?;
        registry.register(Box::new(requests_invalid_address.clone()))?;
        registry.register(Box::new(requests_cooldown_rejected.clone()))?;
        registry.register(Box::new(batches_submitted.clone()))?;
        registry.register(Box::new(batches_failed.clone()))?;
        registry.register(Box::new(submission_retries.clone()))?;
        registry.register(Box::new(ops_pruned.clone()))?;
        registry.register(Box::new(active_distributions.clone()))?;
        registry.register(Box::new(submit_latency.clone()))?;

        Ok(Self {
            registry,
            requests_total,
            requests_invalid_address,
            requests_cooldown_rejected,
            batches_submitted,
            batches_failed,
            submission_retries,
            ops_pruned,
            active_distributions,
            submit_latency,
        })
    }

    /// Get the registry for exporting
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

/// Global metrics instance
pub fn metrics() -> &'static Metrics {
    static METRICS: once_cell::sync::Lazy<Metrics> =
        once_cell::sync::Lazy::new(|| Metrics::new().expect("Failed to initialize metrics"));
    &METRICS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_exposes_counters() {
        let m = metrics();
        m.requests_total.inc();
        let names: Vec<String> = m
            .registry()
            .gather()
            .iter()
            .map(|f| f.get_name().to_string())
            .collect();
        assert!(names.contains(&"requests_total".to_string()));
        assert!(names.contains(&"batches_failed".to_string()));
    }
}
