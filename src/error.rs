//! Crate error type

use thiserror::Error;

use crate::core::config::ConfigError;
use crate::store::migrate::MigrationError;

/// Errors surfaced by the observer, its transports and its store.
#[derive(Error, Debug)]
pub enum O11yError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Could not create span exporter: {0}")]
    Exporter(#[from] opentelemetry_otlp::ExporterBuildError),

    #[error("Tracer provider shutdown failed: {0}")]
    Shutdown(#[from] opentelemetry_sdk::error::OTelSdkError),

    #[error("Could not connect to postgres: {0}")]
    Connect(String),

    #[cfg(feature = "postgres")]
    #[error("Connection pool error: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),

    #[error("Could not migrate database: {0}")]
    Migration(#[from] MigrationError),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[cfg(feature = "postgres")]
    #[error("Storage error: {0}")]
    Storage(#[from] tokio_postgres::Error),

    #[error("Storage error: {0}")]
    StoreFailed(String),

    #[error("Failed to read {what} body: {source}")]
    BodyRead {
        what: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Invalid HTTP message: {0}")]
    Http(#[from] http::Error),
}

impl O11yError {
    /// Body read failure for the request side.
    pub fn request_body(source: std::io::Error) -> Self {
        O11yError::BodyRead {
            what: "request",
            source,
        }
    }

    /// Body read failure for the response side.
    pub fn response_body(source: std::io::Error) -> Self {
        O11yError::BodyRead {
            what: "response",
            source,
        }
    }
}
