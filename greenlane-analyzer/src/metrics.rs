use opentelemetry::{
    global,
    metrics::{Counter, Histogram, Meter},
};
use std::sync::LazyLock;

static GLOBAL_METER: LazyLock<Meter> = LazyLock::new(|| global::meter("greenlane"));

const LATENCY_HISTOGRAM_BUCKETS: [f64; 12] = [
    0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0,
];

/// Counter metric that tracks completed analyses.
///
/// # Metric Details
/// - Name: `greenlane_analyses_total`
/// - Type: Counter
/// - Labels: `mode` (`keyword`, `hybrid` or `inference`)
/// - Unit: requests (count)
pub static ANALYSES_TOTAL: LazyLock<Counter<u64>> = LazyLock::new(|| {
    GLOBAL_METER
        .u64_counter("greenlane_analyses_total")
        .with_description("The number of completed sustainability analyses")
        .with_unit("requests")
        .build()
});

/// Histogram metric that tracks the end-to-end latency of an analysis.
///
/// # Metric Details
/// - Name: `greenlane_analysis_latency`
/// - Type: Histogram
/// - Labels: `mode`
/// - Unit: seconds
pub static ANALYSIS_LATENCY: LazyLock<Histogram<f64>> = LazyLock::new(|| {
    GLOBAL_METER
        .f64_histogram("greenlane_analysis_latency")
        .with_description("Time taken to produce a score result in seconds")
        .with_unit("s")
        .with_boundaries(LATENCY_HISTOGRAM_BUCKETS.to_vec())
        .build()
});

/// Histogram metric that tracks the duration of prefill plus decoding.
///
/// # Metric Details
/// - Name: `greenlane_decoding_time`
/// - Type: Histogram
/// - Labels: `runtime`
/// - Unit: seconds
pub static DECODING_TIME: LazyLock<Histogram<f64>> = LazyLock::new(|| {
    GLOBAL_METER
        .f64_histogram("greenlane_decoding_time")
        .with_description("Time taken for prefill and decoding in seconds")
        .with_unit("s")
        .with_boundaries(LATENCY_HISTOGRAM_BUCKETS.to_vec())
        .build()
});

/// Counter metric that tracks prompt tokens fed to the engine.
///
/// # Metric Details
/// - Name: `greenlane_prompt_tokens`
/// - Type: Counter
/// - Labels: `runtime`
/// - Unit: tokens (count)
pub static PROMPT_TOKENS: LazyLock<Counter<u64>> = LazyLock::new(|| {
    GLOBAL_METER
        .u64_counter("greenlane_prompt_tokens")
        .with_description("Total number of prompt tokens fed to the engine")
        .with_unit("tokens")
        .build()
});

/// Counter metric that tracks generated tokens.
///
/// # Metric Details
/// - Name: `greenlane_generated_tokens`
/// - Type: Counter
/// - Labels: `runtime`
/// - Unit: tokens (count)
pub static GENERATED_TOKENS: LazyLock<Counter<u64>> = LazyLock::new(|| {
    GLOBAL_METER
        .u64_counter("greenlane_generated_tokens")
        .with_description("Total number of generated tokens")
        .with_unit("tokens")
        .build()
});

/// Counter metric that tracks inference attempts that failed and fell back to keyword scoring.
///
/// # Metric Details
/// - Name: `greenlane_inference_failures`
/// - Type: Counter
/// - Labels: `runtime`
/// - Unit: failures (count)
pub static INFERENCE_FAILURES: LazyLock<Counter<u64>> = LazyLock::new(|| {
    GLOBAL_METER
        .u64_counter("greenlane_inference_failures")
        .with_description("The number of inference attempts that failed")
        .with_unit("failures")
        .build()
});
