//! Prometheus-compatible metrics endpoint
//!
//! Tracks the counters named in the metrics module of the
//! specification: segment cache hits/misses, encoder invocations and
//! failures, in-flight encode count, and request counts by status
//! class.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Metrics collector
#[derive(Debug)]
pub struct Metrics {
    start_time: Instant,
    requests_by_status_class: RwLock<std::collections::HashMap<&'static str, u64>>,
    cache_hits: RwLock<u64>,
    cache_misses: RwLock<u64>,
    encoder_invocations: RwLock<u64>,
    encoder_failures: RwLock<u64>,
    in_flight_encodes: AtomicI64,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            requests_by_status_class: RwLock::new(std::collections::HashMap::new()),
            cache_hits: RwLock::new(0),
            cache_misses: RwLock::new(0),
            encoder_invocations: RwLock::new(0),
            encoder_failures: RwLock::new(0),
            in_flight_encodes: AtomicI64::new(0),
        }
    }

    /// Record a completed request by its HTTP status class, e.g. "2xx".
    pub fn record_request(&self, status: StatusCode) {
        let class = status_class(status);
        *self
            .requests_by_status_class
            .write()
            .entry(class)
            .or_insert(0) += 1;
    }

    pub fn record_cache_hit(&self) {
        *self.cache_hits.write() += 1;
    }

    pub fn record_cache_miss(&self) {
        *self.cache_misses.write() += 1;
    }

    pub fn record_encoder_invocation(&self) {
        *self.encoder_invocations.write() += 1;
    }

    pub fn record_encoder_failure(&self) {
        *self.encoder_failures.write() += 1;
    }

    pub fn encode_started(&self) {
        self.in_flight_encodes.fetch_add(1, Ordering::SeqCst);
    }

    pub fn encode_finished(&self) {
        self.in_flight_encodes.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub fn export_prometheus(&self) -> String {
        let mut output = String::new();

        output.push_str("# HELP hls_server_uptime_seconds Server uptime in seconds\n");
        output.push_str("# TYPE hls_server_uptime_seconds counter\n");
        output.push_str(&format!("hls_server_uptime_seconds {}\n", self.uptime_secs()));

        output.push_str(
            "\n# HELP hls_server_start_time_seconds Server start time as Unix timestamp\n",
        );
        output.push_str("# TYPE hls_server_start_time_seconds gauge\n");
        output.push_str(&format!(
            "hls_server_start_time_seconds {}\n",
            std::time::SystemTime::UNIX_EPOCH
                .elapsed()
                .unwrap_or(Duration::ZERO)
                .as_secs()
                - self.uptime_secs()
        ));

        output.push_str("\n# HELP hls_requests_total Total number of HTTP requests by status class\n");
        output.push_str("# TYPE hls_requests_total counter\n");
        for (class, count) in self.requests_by_status_class.read().iter() {
            output.push_str(&format!("hls_requests_total{{status_class=\"{}\"}} {}\n", class, count));
        }

        output.push_str("\n# HELP hls_segment_cache_hits_total Total segment/playlist cache hits\n");
        output.push_str("# TYPE hls_segment_cache_hits_total counter\n");
        output.push_str(&format!("hls_segment_cache_hits_total {}\n", *self.cache_hits.read()));

        output.push_str("\n# HELP hls_segment_cache_misses_total Total segment/playlist cache misses\n");
        output.push_str("# TYPE hls_segment_cache_misses_total counter\n");
        output.push_str(&format!("hls_segment_cache_misses_total {}\n", *self.cache_misses.read()));

        let hits = *self.cache_hits.read();
        let misses = *self.cache_misses.read();
        let hit_ratio = if hits + misses > 0 {
            hits as f64 / (hits + misses) as f64
        } else {
            0.0
        };
        output.push_str("\n# HELP hls_segment_cache_hit_ratio Cache hit ratio\n");
        output.push_str("# TYPE hls_segment_cache_hit_ratio gauge\n");
        output.push_str(&format!("hls_segment_cache_hit_ratio {:.4}\n", hit_ratio));

        output.push_str("\n# HELP hls_encoder_invocations_total Total encoder subprocess invocations\n");
        output.push_str("# TYPE hls_encoder_invocations_total counter\n");
        output.push_str(&format!(
            "hls_encoder_invocations_total {}\n",
            *self.encoder_invocations.read()
        ));

        output.push_str("\n# HELP hls_encoder_failures_total Total encoder subprocess failures\n");
        output.push_str("# TYPE hls_encoder_failures_total counter\n");
        output.push_str(&format!(
            "hls_encoder_failures_total {}\n",
            *self.encoder_failures.read()
        ));

        output.push_str("\n# HELP hls_encodes_in_flight Number of encoder subprocesses currently running\n");
        output.push_str("# TYPE hls_encodes_in_flight gauge\n");
        output.push_str(&format!(
            "hls_encodes_in_flight {}\n",
            self.in_flight_encodes.load(Ordering::SeqCst)
        ));

        output
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

fn status_class(status: StatusCode) -> &'static str {
    match status.as_u16() / 100 {
        2 => "2xx",
        3 => "3xx",
        4 => "4xx",
        5 => "5xx",
        _ => "other",
    }
}

/// Metrics endpoint handler, for deployments that wire `Metrics` in as
/// its own router state rather than through `AppState`.
pub async fn metrics_handler(State(metrics): State<Arc<Metrics>>) -> Response {
    (
        StatusCode::OK,
        [("Content-Type", "text/plain; version=0.0.4")],
        metrics.export_prometheus(),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uptime_starts_near_zero() {
        let metrics = Metrics::new();
        assert!(metrics.uptime_secs() < 2);
    }

    #[test]
    fn records_requests_by_status_class() {
        let metrics = Metrics::new();
        metrics.record_request(StatusCode::OK);
        metrics.record_request(StatusCode::NOT_FOUND);
        metrics.record_request(StatusCode::NOT_FOUND);

        let output = metrics.export_prometheus();
        assert!(output.contains("status_class=\"2xx\"} 1"));
        assert!(output.contains("status_class=\"4xx\"} 2"));
    }

    #[test]
    fn cache_hit_ratio_reflects_recorded_counts() {
        let metrics = Metrics::new();
        metrics.record_cache_hit();
        metrics.record_cache_hit();
        metrics.record_cache_miss();

        assert_eq!(*metrics.cache_hits.read(), 2);
        assert_eq!(*metrics.cache_misses.read(), 1);
    }

    #[test]
    fn in_flight_encode_count_tracks_start_and_finish() {
        let metrics = Metrics::new();
        metrics.encode_started();
        metrics.encode_started();
        metrics.encode_finished();

        assert_eq!(metrics.in_flight_encodes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn export_contains_encoder_counters() {
        let metrics = Metrics::new();
        metrics.record_encoder_invocation();
        metrics.record_encoder_failure();

        let output = metrics.export_prometheus();
        assert!(output.contains("hls_encoder_invocations_total"));
        assert!(output.contains("hls_encoder_failures_total"));
    }
}
