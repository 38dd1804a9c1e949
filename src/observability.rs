//! Observability setup: structured logging, spans and metrics.
//!
//! - `tracing` subscriber with an `EnvFilter` and JSON or pretty output
//! - span helpers for the OCR and model stages
//! - `metrics` counters and histograms, optionally scraped through a
//!   Prometheus listener

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Result;
use metrics_exporter_prometheus::PrometheusBuilder;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing_subscriber::prelude::*;

use crate::observability_config::{LogFormat, ObservabilityConfig};

/// Initialize logging and metrics.
pub fn init_observability(config: &ObservabilityConfig) -> Result<()> {
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid observability configuration: {}", e))?;

    init_tracing_with_config(config)?;
    init_metrics_with_config(config)?;

    tracing::info!(
        environment = %config.environment,
        metrics_port = ?config.metrics_port,
        "Observability initialized"
    );
    Ok(())
}

/// Initialize structured logging with tracing and configuration
pub fn init_tracing_with_config(config: &ObservabilityConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(format!("smart_receipt={}", config.log_level).parse()?)
        .add_directive("reqwest=warn".parse()?)
        .add_directive("hyper=warn".parse()?);

    match config.effective_log_format() {
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .pretty()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_thread_names(false),
            )
            .try_init()?,
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_thread_names(true),
            )
            .try_init()?,
    }

    tracing::info!(
        environment = %config.environment,
        log_level = %config.log_level,
        "Tracing initialized with structured logging"
    );
    Ok(())
}

/// Install the metrics recorder.
///
/// With a configured port, a Prometheus scrape endpoint is served on
/// `0.0.0.0:<port>`; this needs a running Tokio runtime.
pub fn init_metrics_with_config(config: &ObservabilityConfig) -> Result<()> {
    match config.metrics_port {
        Some(port) => {
            let addr = SocketAddr::from(([0, 0, 0, 0], port));
            PrometheusBuilder::new().with_http_listener(addr).install()?;
            tracing::info!(%addr, "Prometheus metrics listener started");
        }
        None => {
            PrometheusBuilder::new().install_recorder()?;
            tracing::info!("Metrics collection initialized without exporter");
        }
    }
    Ok(())
}

/// Create a span for OCR operations
pub fn ocr_span(operation: &str) -> tracing::Span {
    tracing::info_span!("ocr_operation", operation = operation, component = "ocr")
}

/// Create a span for one model call
pub fn ai_span(operation: &str, model: &str) -> tracing::Span {
    tracing::info_span!(
        "model_operation",
        operation = operation,
        model = model,
        component = "ai"
    )
}

/// Record OCR operation metrics
pub fn record_ocr_metrics(success: bool, duration: Duration, image_size: u64) {
    metrics::counter!("ocr_operations_total", "result" => if success { "success" } else { "failure" }).increment(1);
    metrics::histogram!("ocr_duration_seconds").record(duration.as_secs_f64());
    metrics::histogram!("ocr_image_size_bytes").record(image_size as f64);
}

/// Record one model attempt; `result` is `success` or a failure kind
pub fn record_model_attempt(model: &str, result: &'static str, duration: Duration) {
    metrics::counter!("model_attempts_total", "model" => model.to_string(), "result" => result)
        .increment(1);
    metrics::histogram!("model_call_duration_seconds", "model" => model.to_string())
        .record(duration.as_secs_f64());
}

/// Record which source produced a field guess
pub fn record_guess_source(source: &'static str) {
    metrics::counter!("field_guesses_total", "source" => source).increment(1);
}

/// Record a confirmed expense appended to a ledger
pub fn record_ledger_record(amount: Decimal) {
    metrics::counter!("ledger_records_total").increment(1);
    metrics::histogram!("ledger_record_amount").record(amount.to_f64().unwrap_or(0.0));
}
