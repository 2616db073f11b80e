//! o11y - request-scoped observability
//!
//! One handle ([`Observer`]) for structured records, spans and outbound HTTP
//! round-trip capture. Handles travel with work inside an [`ObsContext`];
//! outbound calls made through the [`transport`] decorators pick up the
//! observer from the context attached to the request.

pub mod core;
pub mod error;
pub mod observer;
pub mod store;
pub mod telemetry;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use crate::core::config::{ConfigError, Configuration};
pub use crate::core::fields::{Fields, Value};
pub use crate::core::keys;
pub use crate::core::level::Level;
pub use crate::core::severity::Severity;
pub use error::O11yError;
pub use observer::{
    begin_request, expand, extend, get, initialise, open_span, reset, ObsContext, Observer,
    ObserverBuilder, RequestScope,
};
pub use store::{MemoryStore, RoundTripRecord, RoundTripStore};
pub use telemetry::RequestId;
pub use transport::{
    Body, HttpClient, Instrumented, LoggingTransport, ReqwestTransport, StoreTransport,
    TracingTransport, Transport, TransportFn,
};

#[cfg(feature = "postgres")]
pub use store::PostgresStore;
