//! Metrics and observability utilities
//!
//! Prometheus metrics for the retrieval pipeline with standardized naming.

use crate::errors::Stage;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};

/// Metrics prefix for all docqa metrics
pub const METRICS_PREFIX: &str = "docqa";

/// Buckets for a full question/answer cycle (two completions plus a search)
pub const QUERY_BUCKETS: &[f64] = &[
    0.250,  // 250ms
    0.500,  // 500ms
    1.000,  // 1s
    2.000,  // 2s
    5.000,  // 5s
    10.00,  // 10s
    30.00,  // 30s
];

/// Buckets for embedding latency
pub const EMBEDDING_BUCKETS: &[f64] = &[
    0.050,  // 50ms
    0.100,  // 100ms
    0.250,  // 250ms
    0.500,  // 500ms
    1.000,  // 1s
    2.000,  // 2s
    5.000,  // 5s
    10.00,  // 10s
    30.00,  // 30s
];

/// Register all metric descriptions
pub fn register_metrics() {
    // Ingestion metrics
    describe_counter!(
        format!("{}_documents_indexed_total", METRICS_PREFIX),
        Unit::Count,
        "Total documents (re)indexed"
    );

    describe_counter!(
        format!("{}_chunks_indexed_total", METRICS_PREFIX),
        Unit::Count,
        "Total chunks written to the vector index"
    );

    describe_histogram!(
        format!("{}_ingestion_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Document reindex latency in seconds"
    );

    // Query metrics
    describe_counter!(
        format!("{}_queries_total", METRICS_PREFIX),
        Unit::Count,
        "Total questions answered"
    );

    describe_histogram!(
        format!("{}_query_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Question answering latency in seconds"
    );

    describe_gauge!(
        format!("{}_search_results_count", METRICS_PREFIX),
        Unit::Count,
        "Number of facts returned by the last search"
    );

    describe_counter!(
        format!("{}_degraded_total", METRICS_PREFIX),
        Unit::Count,
        "Pipeline stages that degraded to an empty value"
    );

    // Embedding metrics
    describe_counter!(
        format!("{}_embedding_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total embedding API requests"
    );

    describe_histogram!(
        format!("{}_embedding_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Embedding generation latency in seconds"
    );

    describe_counter!(
        format!("{}_embedding_errors_total", METRICS_PREFIX),
        Unit::Count,
        "Total embedding API errors"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record ingestion metrics
pub fn record_ingestion(duration_secs: f64, chunks_indexed: usize) {
    counter!(format!("{}_documents_indexed_total", METRICS_PREFIX)).increment(1);

    counter!(format!("{}_chunks_indexed_total", METRICS_PREFIX))
        .increment(chunks_indexed as u64);

    histogram!(format!("{}_ingestion_duration_seconds", METRICS_PREFIX)).record(duration_secs);
}

/// Helper to record query metrics
pub fn record_query(duration_secs: f64, result_count: usize, degraded: bool) {
    counter!(
        format!("{}_queries_total", METRICS_PREFIX),
        "degraded" => degraded.to_string()
    )
    .increment(1);

    histogram!(format!("{}_query_duration_seconds", METRICS_PREFIX)).record(duration_secs);

    gauge!(format!("{}_search_results_count", METRICS_PREFIX)).set(result_count as f64);
}

/// Helper to record a fail-soft degradation
pub fn record_degraded(stage: Stage) {
    counter!(
        format!("{}_degraded_total", METRICS_PREFIX),
        "stage" => stage.as_str()
    )
    .increment(1);
}

/// Helper to record embedding metrics
pub fn record_embedding(duration_secs: f64, model: &str, batch_size: usize, success: bool) {
    let status = if success { "success" } else { "error" };

    counter!(
        format!("{}_embedding_requests_total", METRICS_PREFIX),
        "model" => model.to_string(),
        "status" => status
    )
    .increment(1);

    if success {
        histogram!(
            format!("{}_embedding_duration_seconds", METRICS_PREFIX),
            "model" => model.to_string()
        )
        .record(duration_secs);
        tracing::trace!(model, batch_size, duration_secs, "Embedding request recorded");
    } else {
        counter!(
            format!("{}_embedding_errors_total", METRICS_PREFIX),
            "model" => model.to_string()
        )
        .increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buckets_sorted() {
        for buckets in [QUERY_BUCKETS, EMBEDDING_BUCKETS] {
            let mut prev = 0.0;
            for &bucket in buckets {
                assert!(bucket > prev);
                prev = bucket;
            }
        }
    }

    #[test]
    fn test_recorders_without_exporter() {
        // No recorder installed: calls are no-ops and must not panic
        record_ingestion(0.5, 3);
        record_query(1.2, 5, false);
        record_degraded(Stage::Retrieve);
        record_embedding(0.1, "mock-embedding", 2, true);
    }
}
