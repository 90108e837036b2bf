use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::OnceCell;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

static TRACING_INIT: OnceCell<()> = OnceCell::new();

/// In-process counters. Each update is also forwarded to the `metrics`
/// facade so an installed recorder sees the same numbers.
#[derive(Debug, Default)]
pub struct AppMetrics {
    requests_total: AtomicU64,
    validations_total: AtomicU64,
    warnings_total: AtomicU64,
    source_failures_total: AtomicU64,
    fallback_narratives_total: AtomicU64,
    total_latency_millis: AtomicU64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub requests_total: u64,
    pub validations_total: u64,
    pub warnings_total: u64,
    pub source_failures_total: u64,
    pub fallback_narratives_total: u64,
    pub avg_latency_millis: f64,
}

impl AppMetrics {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn inc_request(&self) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("datewise_requests_total").increment(1);
    }

    pub fn record_validation(&self, warnings: usize) {
        self.validations_total.fetch_add(1, Ordering::Relaxed);
        self.warnings_total
            .fetch_add(warnings as u64, Ordering::Relaxed);
        metrics::counter!("datewise_validations_total").increment(1);
        metrics::counter!("datewise_validation_warnings_total").increment(warnings as u64);
    }

    pub fn inc_source_failure(&self, source: &'static str) {
        self.source_failures_total.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("datewise_source_failures_total", "source" => source).increment(1);
    }

    pub fn inc_fallback_narrative(&self) {
        self.fallback_narratives_total
            .fetch_add(1, Ordering::Relaxed);
        metrics::counter!("datewise_fallback_narratives_total").increment(1);
    }

    pub fn observe_latency(&self, duration: Duration) {
        self.total_latency_millis
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
        metrics::histogram!("datewise_request_latency_seconds").record(duration.as_secs_f64());
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let requests = self.requests_total.load(Ordering::Relaxed);
        let latency = self.total_latency_millis.load(Ordering::Relaxed);

        MetricsSnapshot {
            requests_total: requests,
            validations_total: self.validations_total.load(Ordering::Relaxed),
            warnings_total: self.warnings_total.load(Ordering::Relaxed),
            source_failures_total: self.source_failures_total.load(Ordering::Relaxed),
            fallback_narratives_total: self.fallback_narratives_total.load(Ordering::Relaxed),
            avg_latency_millis: if requests == 0 {
                0.0
            } else {
                latency as f64 / requests as f64
            },
        }
    }
}

/// JSON logs on stderr, filtered by `RUST_LOG`. Safe to call more than once.
pub fn init_tracing(service_name: &str) {
    TRACING_INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}=info,datewise_api=info,datewise_agents=info,datewise_llm=info,datewise_sources=info",
                service_name.replace('-', "_")
            ))
        });

        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(true)
            .with_span_list(true)
            .with_writer(std::io::stderr)
            .init();
    });
}
