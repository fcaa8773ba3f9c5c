//! Consent-aware visitor telemetry pipeline.
//!
//! A [`Pipeline`] collects a [`TelemetrySnapshot`], adds location data when
//! the visitor's geolocation consent allows it, posts the merged payload to a
//! collection endpoint and then navigates the visitor onward.
//!
//! ## Usage
//!
//! ```ignore
//! use beacon_core::{BeaconConfig, ChannelInterstitial, Pipeline, native};
//!
//! let config = BeaconConfig::load(None)?;
//! let platform = native::platform(&config, navigator);
//! let pipeline = Pipeline::from_config(&config, platform, Arc::new(ChannelInterstitial::new()))?;
//! let outcome = pipeline.trigger().await;
//! ```

pub mod config;
pub mod consent;
pub mod dispatch;
pub mod enrichment;
pub mod error;
pub mod interstitial;
pub mod native;
pub mod pipeline;
pub mod platform;
pub mod telemetry;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

pub use beacon_common::{
    ConsentState, Coordinates, LocationEnrichment, Payload, Reading, TelemetrySnapshot,
};
pub use config::BeaconConfig;
pub use dispatch::TerminalOutcome;
pub use interstitial::{ChannelInterstitial, Interstitial, InterstitialChoice};
pub use pipeline::{Endpoints, Pipeline, PipelineState, TriggerOutcome};
pub use platform::Platform;

/// Crates whose events are shown when `BEACON_LOG` is a plain level.
const LOG_TARGETS: [&str; 3] = ["beacon", "beacon_core", "beacon_common"];

pub fn init_tracing() {
    // BEACON_LOG controls log level: "trace", "debug", "info", "warn", "error"
    // or a full tracing filter spec like "beacon_core=debug,reqwest=warn"
    let filter = match std::env::var("BEACON_LOG") {
        Ok(level) if is_plain_level(&level) => scoped_filter(&level),
        Ok(spec) => spec,
        Err(_) => scoped_filter("info"),
    };

    match std::env::var("BEACON_OTLP_ENDPOINT") {
        Ok(endpoint) if !endpoint.is_empty() => {
            if let Err(e) = init_tracing_with_otel(&endpoint, &filter) {
                eprintln!("Warning: Failed to initialize OTLP logging: {e}");
                init_tracing_fmt_only(&filter);
            }
        }
        _ => init_tracing_fmt_only(&filter),
    }
}

fn scoped_filter(level: &str) -> String {
    LOG_TARGETS
        .iter()
        .map(|target| format!("{target}={level}"))
        .collect::<Vec<_>>()
        .join(",")
}

fn init_tracing_fmt_only(filter: &str) {
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_filter(EnvFilter::new(filter));

    if tracing_subscriber::registry()
        .with(fmt_layer)
        .try_init()
        .is_err()
    {
        eprintln!("Warning: tracing subscriber already initialized");
    }
}

fn init_tracing_with_otel(endpoint: &str, filter: &str) -> Result<(), String> {
    use opentelemetry::KeyValue;
    use opentelemetry_otlp::WithExportConfig;
    use opentelemetry_sdk::Resource;
    use opentelemetry_sdk::logs::SdkLoggerProvider;

    let exporter = opentelemetry_otlp::LogExporter::builder()
        .with_http()
        .with_endpoint(endpoint)
        .build()
        .map_err(|e| format!("Failed to create OTLP exporter: {e}"))?;

    let provider = SdkLoggerProvider::builder()
        .with_resource(
            Resource::builder()
                .with_attributes([
                    KeyValue::new("service.name", "beacon"),
                    KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
                ])
                .build(),
        )
        .with_batch_exporter(exporter)
        .build();

    let otel_layer =
        opentelemetry_appender_tracing::layer::OpenTelemetryTracingBridge::new(&provider)
            .with_filter(EnvFilter::new(filter));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_filter(EnvFilter::new(filter));

    if tracing_subscriber::registry()
        .with(otel_layer)
        .with(fmt_layer)
        .try_init()
        .is_err()
    {
        eprintln!("Warning: tracing subscriber already initialized");
    }

    Ok(())
}

fn is_plain_level(s: &str) -> bool {
    matches!(
        s.to_ascii_lowercase().as_str(),
        "trace" | "debug" | "info" | "warn" | "error"
    )
}
