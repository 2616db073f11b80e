//! Telemetry initialization.
//!
//! Builds the tracer provider used by the observer and, optionally, a global
//! `tracing` subscriber for crate-internal diagnostics.

use opentelemetry_otlp::{Compression, Protocol, WithExportConfig, WithHttpConfig};
use opentelemetry_sdk::trace::SdkTracerProvider;
use opentelemetry_sdk::Resource;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::EnvFilter;

use super::record::SharedWriter;
use crate::core::config::Configuration;
use crate::core::level::Level;
use crate::error::O11yError;

/// Build the tracer provider for a configuration.
///
/// When an OTLP URL is configured spans are batched and exported over
/// HTTP/protobuf with gzip compression. Otherwise the provider has no exporter
/// and spans are only used for context propagation.
pub fn build_provider(config: &Configuration) -> Result<SdkTracerProvider, O11yError> {
    let mut builder = SdkTracerProvider::builder().with_resource(resource(&config.service_name));

    if let Some(url) = &config.otel_url {
        let exporter = opentelemetry_otlp::SpanExporter::builder()
            .with_http()
            .with_endpoint(url.as_str())
            .with_protocol(Protocol::HttpBinary)
            .with_compression(Compression::Gzip)
            .build()?;
        builder = builder.with_batch_exporter(exporter);
        tracing::debug!(endpoint = %url, "OTLP span exporter configured");
    }

    Ok(builder.build())
}

fn resource(service_name: &str) -> Resource {
    let builder = Resource::builder();
    if service_name.is_empty() {
        builder.build()
    } else {
        builder.with_service_name(service_name.to_string()).build()
    }
}

/// Install a global `tracing` subscriber writing JSON to `writer`.
///
/// `RUST_LOG` directives take precedence over `level`.
///
/// # Example
///
/// ```rust,ignore
/// use o11y::telemetry::{install_subscriber, SharedWriter};
/// use o11y::Level;
///
/// install_subscriber(Level::Info, SharedWriter::stdout())?;
/// ```
pub fn install_subscriber(level: Level, writer: SharedWriter) -> Result<(), TryInitError> {
    let filter = EnvFilter::builder()
        .with_default_directive(level.as_filter().into())
        .from_env_lossy();

    let fmt_layer = fmt::layer()
        .json()
        .with_writer(writer)
        .with_target(true)
        .with_file(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
}
