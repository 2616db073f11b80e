//! Telemetry plumbing for the observer.
//!
//! This module provides the pieces the observer is assembled from:
//! - JSON record sink with call-site attribution
//! - Span stack over `opentelemetry` spans
//! - Attribute encoding for span events
//! - Tracer provider and subscriber initialization
//! - W3C trace context propagation and request IDs
//!
//! # Feature Flags
//!
//! - `release-logs`: Strip crate-internal debug/trace diagnostics at compile time
//! - `max-perf`: Disable all crate-internal diagnostics

pub mod attributes;
mod correlation;
mod init;
pub mod propagation;
pub mod record;
pub mod spans;

pub use attributes::encode;
pub use correlation::RequestId;
pub use init::{build_provider, install_subscriber};
pub use record::{RecordSink, SharedWriter};
pub use spans::{SpanStack, TraceSpan};
