use axum::http::{Method, StatusCode};
use prometheus::{
    DEFAULT_BUCKETS, Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts,
    Registry, TextEncoder,
};

use crate::error::{GreeterError, Result};

const LABELS: [&str; 3] = ["method", "path", "status"];

/// Identity of one request series: equal triples accumulate into the same series.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LabelSet {
    pub method: String,
    pub path: String,
    pub status: String,
}

impl LabelSet {
    /// `path` must be the static route template, never the request URI.
    pub fn new(method: &Method, path: &str, status: StatusCode) -> Self {
        Self {
            method: method.as_str().to_string(),
            path: path.to_string(),
            status: status.as_u16().to_string(),
        }
    }

    fn values(&self) -> [&str; 3] {
        [&self.method, &self.path, &self.status]
    }
}

/// Request counter and latency histogram backed by a private registry.
///
/// Both vectors synchronize internally, so `increment` and `observe` can be
/// called from any number of request tasks while a scrape encodes the registry.
pub struct MetricsRecorder {
    registry: Registry,
    requests_total: IntCounterVec,
    request_duration: HistogramVec,
    runtime_workers: IntGauge,
    runtime_alive_tasks: IntGauge,
}

impl MetricsRecorder {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let requests_total = IntCounterVec::new(
            Opts::new(
                "http_requests_total",
                "Total number of HTTP requests processed.",
            ),
            &LABELS,
        )?;

        let request_duration = HistogramVec::new(
            HistogramOpts::new(
                "http_request_duration_seconds",
                "Histogram of latencies for HTTP requests.",
            )
            .buckets(DEFAULT_BUCKETS.to_vec()),
            &LABELS,
        )?;

        let runtime_workers = IntGauge::new(
            "tokio_runtime_workers",
            "Number of worker threads used by the async runtime.",
        )?;
        let runtime_alive_tasks = IntGauge::new(
            "tokio_runtime_alive_tasks",
            "Number of tasks currently alive in the async runtime.",
        )?;

        registry.register(Box::new(requests_total.clone()))?;
        registry.register(Box::new(request_duration.clone()))?;
        registry.register(Box::new(runtime_workers.clone()))?;
        registry.register(Box::new(runtime_alive_tasks.clone()))?;

        #[cfg(target_os = "linux")]
        registry.register(Box::new(
            prometheus::process_collector::ProcessCollector::for_self(),
        ))?;

        Ok(Self {
            registry,
            requests_total,
            request_duration,
            runtime_workers,
            runtime_alive_tasks,
        })
    }

    pub fn increment(&self, labels: &LabelSet) {
        self.requests_total
            .with_label_values(&labels.values())
            .inc();
    }

    pub fn observe(&self, labels: &LabelSet, duration_seconds: f64) {
        self.request_duration
            .with_label_values(&labels.values())
            .observe(duration_seconds);
    }

    /// Refresh runtime gauges from the current tokio runtime, if any.
    pub fn update_runtime_metrics(&self) {
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let metrics = handle.metrics();
            self.runtime_workers.set(metrics.num_workers() as i64);
            self.runtime_alive_tasks
                .set(metrics.num_alive_tasks() as i64);
        }
    }

    /// Encode the registry in the Prometheus text format.
    ///
    /// Returns the body together with its content type.
    pub fn gather(&self) -> Result<(String, String)> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        let body = String::from_utf8(buffer)
            .map_err(|e| GreeterError::Internal(format!("exposition is not UTF-8: {}", e)))?;
        Ok((body, encoder.format_type().to_string()))
    }

    // Lookups below materialise a zero series when the label set is new.

    pub fn request_count(&self, labels: &LabelSet) -> u64 {
        self.requests_total
            .with_label_values(&labels.values())
            .get()
    }

    pub fn observation_count(&self, labels: &LabelSet) -> u64 {
        self.request_duration
            .with_label_values(&labels.values())
            .get_sample_count()
    }

    pub fn observation_sum(&self, labels: &LabelSet) -> f64 {
        self.request_duration
            .with_label_values(&labels.values())
            .get_sample_sum()
    }
}
