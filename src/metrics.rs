use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

/// Service counters. Each instance owns its registry so routers built in
/// tests never share state.
pub struct AppMetrics {
    registry: Registry,
    ingest_accepted: IntCounter,
    ingest_rejected: IntCounterVec,
    ingest_failed: IntCounter,
    latest_queries: IntCounterVec,
}

impl AppMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let ingest_accepted = IntCounter::new(
            "ecopulse_ingest_accepted_total",
            "Metric documents stored",
        )?;
        let ingest_rejected = IntCounterVec::new(
            Opts::new(
                "ecopulse_ingest_rejected_total",
                "Metric payloads rejected by validation",
            ),
            &["reason"],
        )?;
        let ingest_failed = IntCounter::new(
            "ecopulse_ingest_failed_total",
            "Metric documents the store failed to persist",
        )?;
        let latest_queries = IntCounterVec::new(
            Opts::new("ecopulse_latest_queries_total", "Latest-document lookups"),
            &["outcome"],
        )?;

        registry.register(Box::new(ingest_accepted.clone()))?;
        registry.register(Box::new(ingest_rejected.clone()))?;
        registry.register(Box::new(ingest_failed.clone()))?;
        registry.register(Box::new(latest_queries.clone()))?;

        Ok(Self {
            registry,
            ingest_accepted,
            ingest_rejected,
            ingest_failed,
            latest_queries,
        })
    }

    pub fn ingest_accepted_total(&self) {
        self.ingest_accepted.inc();
    }

    pub fn ingest_rejected_total(&self, reason: &str) {
        self.ingest_rejected.with_label_values(&[reason]).inc();
    }

    pub fn ingest_failed_total(&self) {
        self.ingest_failed.inc();
    }

    pub fn latest_queries_total(&self, outcome: &str) {
        self.latest_queries.with_label_values(&[outcome]).inc();
    }

    /// Text exposition format.
    pub fn render(&self) -> String {
        let mut buf = Vec::new();
        if let Err(e) = TextEncoder::new().encode(&self.registry.gather(), &mut buf) {
            tracing::warn!(error = %e, "failed to encode metrics");
        }
        String::from_utf8(buf).unwrap_or_default()
    }
}
