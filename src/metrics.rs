//! Metrics collection for signing-request assembly

use prometheus::{Histogram, HistogramOpts, IntCounterVec, Opts, Registry};

/// Global metrics registry
pub struct Metrics {
    registry: Registry,

    /// Payloads built, by operation and format
    pub requests_built: IntCounterVec,
    /// Failed operations, by error category
    pub assembly_failures: IntCounterVec,
    pub assembly_latency: Histogram,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let requests_built = IntCounterVec::new(
            Opts::new(
                "signing_requests_built_total",
                "Number of signing request payloads built",
            ),
            &["operation", "format"],
        )?;

        let assembly_failures = IntCounterVec::new(
            Opts::new(
                "assembly_failures_total",
                "Number of operations that failed before producing a payload",
            ),
            &["category"],
        )?;

        let assembly_latency = Histogram::with_opts(
            HistogramOpts::new(
                "assembly_latency_seconds",
                "End-to-end latency from SDK build to payload",
            )
            .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
        )?;

        registry.register(Box::new(requests_built.clone()))?;
        registry.register(Box::new(assembly_failures.clone()))?;
        registry.register(Box::new(assembly_latency.clone()))?;

        Ok(Self {
            registry,
            requests_built,
            assembly_failures,
            assembly_latency,
        })
    }

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
