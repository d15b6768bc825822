use std::sync::LazyLock;

use anyhow::{Context, Result};
use opentelemetry::{global, trace::TracerProvider, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{
    metrics::{self as sdkmetrics},
    trace::{self as sdktrace, RandomIdGenerator, Sampler},
    Resource,
};
use tracing_appender::{
    non_blocking,
    non_blocking::WorkerGuard,
    rolling::{RollingFileAppender, Rotation},
};
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan, time::UtcTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Registry,
};

/// The directory where the logs are stored.
const LOGS: &str = "./logs";
/// The log file name for the node service.
const NODE_LOG_FILE: &str = "greenlane-node.log";
const DEFAULT_LOG_FILTER: &str = "info,greenlane_analyzer=info,greenlane_service=info";

static RESOURCE: LazyLock<Resource> =
    LazyLock::new(|| Resource::new(vec![KeyValue::new("service_name", "greenlane-node")]));

/// Initialize metrics with OpenTelemetry SDK
fn init_metrics(otlp_endpoint: &str) -> Result<sdkmetrics::SdkMeterProvider> {
    let metrics_exporter = opentelemetry_otlp::MetricExporter::builder()
        .with_tonic()
        .with_endpoint(otlp_endpoint)
        .build()?;

    let reader =
        sdkmetrics::PeriodicReader::builder(metrics_exporter, opentelemetry_sdk::runtime::Tokio)
            .with_interval(std::time::Duration::from_secs(3))
            .with_timeout(std::time::Duration::from_secs(10))
            .build();

    Ok(sdkmetrics::SdkMeterProvider::builder()
        .with_reader(reader)
        .with_resource(RESOURCE.clone())
        .build())
}

/// Initialize tracing with OpenTelemetry SDK
fn init_traces(otlp_endpoint: &str) -> Result<sdktrace::Tracer> {
    let tracing_exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(otlp_endpoint)
        .build()?;

    let tracer_provider = sdktrace::TracerProvider::builder()
        .with_batch_exporter(tracing_exporter, opentelemetry_sdk::runtime::Tokio)
        .with_sampler(Sampler::AlwaysOn)
        .with_id_generator(RandomIdGenerator::default())
        .with_max_events_per_span(16)
        .with_max_attributes_per_span(16)
        .with_resource(RESOURCE.clone())
        .build();

    let tracer = tracer_provider.tracer("greenlane-node");
    global::set_tracer_provider(tracer_provider);

    Ok(tracer)
}

/// Configure logging with JSON file output and pretty console output.
///
/// OTLP metric and trace export is enabled only when `OTEL_EXPORTER_OTLP_ENDPOINT`
/// is set. Without it, metric instruments record into the no-op global meter.
///
/// # Errors
///
/// Returns an error if:
/// - Failed to create logs directory
/// - Failed to initialize the OTLP exporters
/// - Failed to set global default subscriber
pub fn setup_logging() -> Result<WorkerGuard> {
    std::fs::create_dir_all(LOGS).context("Failed to create logs directory")?;

    let opentelemetry_layer = match std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT") {
        Ok(otlp_endpoint) => {
            let metrics_provider = init_metrics(&otlp_endpoint)?;
            global::set_meter_provider(metrics_provider);
            let tracer = init_traces(&otlp_endpoint)?;
            Some(OpenTelemetryLayer::new(tracer))
        }
        Err(_) => None,
    };

    let node_appender = RollingFileAppender::new(Rotation::DAILY, LOGS, NODE_LOG_FILE);
    let (node_non_blocking, node_guard) = non_blocking(node_appender);

    let node_layer = fmt::layer()
        .json()
        .with_timer(UtcTime::rfc_3339())
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_target(true)
        .with_line_number(true)
        .with_file(true)
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(node_non_blocking);

    let console_layer = fmt::layer()
        .pretty()
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .with_file(true)
        .with_span_events(FmtSpan::ENTER);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    Registry::default()
        .with(env_filter)
        .with(console_layer)
        .with(node_layer)
        .with(opentelemetry_layer)
        .try_init()
        .context("Failed to set global default subscriber")?;

    Ok(node_guard)
}

/// Ensure all spans are exported before shutdown
pub fn shutdown() {
    global::shutdown_tracer_provider();
}
