//! Prometheus metrics for the replay server.
//!
//! Tracks served replays, replay misses and cursor resets.
use lazy_static::lazy_static;
use prometheus::{
    register_counter, register_counter_vec, register_histogram_vec, Counter, CounterVec, Encoder,
    HistogramVec, TextEncoder,
};

lazy_static! {
    /// Recorded responses served
    pub static ref REPLAYED_TOTAL: CounterVec = register_counter_vec!(
        "rewind_replayed_total",
        "Total number of recorded responses served",
        &["status"]
    )
    .unwrap();

    /// Requests that could not be answered from the capture
    pub static ref REPLAY_MISSES_TOTAL: CounterVec = register_counter_vec!(
        "rewind_replay_misses_total",
        "Total number of requests with no recorded response left",
        &["reason"]  // reason: unknown_origin|unknown_path|exhausted
    )
    .unwrap();

    /// Cursor resets issued through the admin API
    pub static ref RESETS_TOTAL: Counter = register_counter!(
        "rewind_resets_total",
        "Total number of replay cursor resets"
    )
    .unwrap();

    /// Time from request arrival to response hand-off
    pub static ref REPLAY_DURATION_MS: HistogramVec = register_histogram_vec!(
        "rewind_replay_duration_ms",
        "Histogram of replay handling time in milliseconds",
        &["outcome"],  // outcome: hit|miss
        vec![0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 25.0, 50.0, 100.0]
    )
    .unwrap();
}

pub fn record_replay(status: u16, duration_ms: f64) {
    REPLAYED_TOTAL
        .with_label_values(&[&status.to_string()])
        .inc();
    REPLAY_DURATION_MS
        .with_label_values(&["hit"])
        .observe(duration_ms);
}

pub fn record_miss(reason: &str, duration_ms: f64) {
    REPLAY_MISSES_TOTAL.with_label_values(&[reason]).inc();
    REPLAY_DURATION_MS
        .with_label_values(&["miss"])
        .observe(duration_ms);
}

pub fn record_reset() {
    RESETS_TOTAL.inc();
}

/// Render all registered metrics in the Prometheus text format
pub fn collect_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if encoder.encode(&metric_families, &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_are_exposed() {
        record_replay(200, 1.5);
        record_miss("exhausted", 0.2);
        record_reset();

        let text = collect_metrics();
        assert!(text.contains("rewind_replayed_total"));
        assert!(text.contains("rewind_replay_misses_total"));
        assert!(text.contains("rewind_resets_total"));
        assert!(text.contains("rewind_replay_duration_ms"));
    }
}
