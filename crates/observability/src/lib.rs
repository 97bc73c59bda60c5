use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::OnceCell;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

static TRACING_INIT: OnceCell<()> = OnceCell::new();

#[derive(Debug, Default)]
pub struct AppMetrics {
    requests_total: AtomicU64,
    location_hits_total: AtomicU64,
    no_location_total: AtomicU64,
    jurisdiction_fallback_total: AtomicU64,
    truncation_total: AtomicU64,
    store_failure_total: AtomicU64,
    total_latency_millis: AtomicU64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub requests_total: u64,
    pub location_hits_total: u64,
    pub no_location_total: u64,
    pub jurisdiction_fallback_total: u64,
    pub truncation_total: u64,
    pub store_failure_total: u64,
    pub avg_latency_millis: f64,
}

impl AppMetrics {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn inc_request(&self) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_location_hit(&self) {
        self.location_hits_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_no_location(&self) {
        self.no_location_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_jurisdiction_fallback(&self) {
        self.jurisdiction_fallback_total
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_truncation(&self) {
        self.truncation_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_store_failure(&self) {
        self.store_failure_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn observe_latency(&self, duration: Duration) {
        self.total_latency_millis
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let requests = self.requests_total.load(Ordering::Relaxed);
        let latency = self.total_latency_millis.load(Ordering::Relaxed);

        MetricsSnapshot {
            requests_total: requests,
            location_hits_total: self.location_hits_total.load(Ordering::Relaxed),
            no_location_total: self.no_location_total.load(Ordering::Relaxed),
            jurisdiction_fallback_total: self.jurisdiction_fallback_total.load(Ordering::Relaxed),
            truncation_total: self.truncation_total.load(Ordering::Relaxed),
            store_failure_total: self.store_failure_total.load(Ordering::Relaxed),
            avg_latency_millis: if requests == 0 {
                0.0
            } else {
                latency as f64 / requests as f64
            },
        }
    }
}

pub fn init_tracing(service_name: &str) {
    TRACING_INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}=info,kompas_agents=info,kompas_gazetteer=info",
                service_name
            ))
        });

        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(true)
            .with_span_list(true)
            .init();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reports_average_latency() {
        let metrics = AppMetrics::default();
        metrics.inc_request();
        metrics.inc_request();
        metrics.observe_latency(Duration::from_millis(30));
        metrics.observe_latency(Duration::from_millis(10));

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.requests_total, 2);
        assert!((snapshot.avg_latency_millis - 20.0).abs() < f64::EPSILON);
    }
}
