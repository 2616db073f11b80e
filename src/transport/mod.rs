//! Outbound HTTP instrumentation.
//!
//! A [`Transport`] executes one request. The decorators in this module wrap
//! another transport to log, persist or trace each round trip, reading the
//! observer from the [`ObsContext`](crate::ObsContext) attached to the request.

pub mod body;
pub mod client;
pub mod logging;
pub mod redact;
pub mod store;
pub mod trace;
pub mod traits;

pub use body::Body;
pub use client::{HttpClient, Instrumented, ReqwestTransport};
pub use logging::LoggingTransport;
pub use redact::{headers_to_map, redact_headers, REDACTED};
pub use store::StoreTransport;
pub use trace::TracingTransport;
pub use traits::{Transport, TransportFn};
