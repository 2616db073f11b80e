//! Round-trip persistence decorator.

use std::time::Instant;

use async_trait::async_trait;
use http::{Request, Response};

use super::body::Body;
use super::redact::{headers_to_map, redact_headers};
use super::traits::Transport;
use crate::core::fields::Fields;
use crate::core::keys;
use crate::error::O11yError;
use crate::observer::{get, ObsContext};
use crate::store::RoundTripRecord;

/// Persists each completed round trip through the observer's store.
///
/// Headers are redacted before they are stored. When the observer has no
/// store the call is only logged at debug level; a failing store fails the
/// call.
#[derive(Debug, Clone)]
pub struct StoreTransport<T> {
    inner: T,
}

impl<T: Transport> StoreTransport<T> {
    pub fn new(inner: T) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }
}

#[async_trait]
impl<T: Transport> Transport for StoreTransport<T> {
    async fn round_trip(&self, req: Request<Body>) -> Result<Response<Body>, O11yError> {
        let o = get(&ObsContext::from_request(&req));

        let (parts, mut body) = req.into_parts();
        let request_body = match body.buffer().await {
            Ok(bytes) => bytes,
            Err(err) => {
                o.error(&err, ());
                return Err(O11yError::request_body(err));
            }
        };
        let url = parts.uri.to_string();
        let method = parts.method.to_string();
        let request_headers = headers_to_map(&redact_headers(&parts.headers));

        let start = Instant::now();
        let resp = match self.inner.round_trip(Request::from_parts(parts, body)).await {
            Ok(resp) => resp,
            Err(err) => {
                o.error(&err, Fields::new().with(keys::CALL_DURATION, start.elapsed()));
                return Err(err);
            }
        };
        let duration = start.elapsed();

        let (parts, mut body) = resp.into_parts();
        let response_body = match body.buffer().await {
            Ok(bytes) => bytes,
            Err(err) => {
                o.error(&err, Fields::new().with(keys::CALL_DURATION, duration));
                return Err(O11yError::response_body(err));
            }
        };

        let record = RoundTripRecord {
            url,
            method,
            status_code: i32::from(parts.status.as_u16()),
            duration,
            request_body: RoundTripRecord::body_text(&request_body),
            response_body: RoundTripRecord::body_text(&response_body),
            request_headers,
            response_headers: headers_to_map(&redact_headers(&parts.headers)),
            created_at: None,
        };
        o.store_round_trip(&record).await?;

        Ok(Response::from_parts(parts, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, RoundTripStore};
    use crate::transport::testing::{attached, capture, capture_with_store, echo};
    use crate::transport::TransportFn;
    use async_trait::async_trait;
    use bytes::Bytes;
    use futures::stream;
    use std::io;
    use std::sync::Arc;

    struct BrokenStore;

    #[async_trait]
    impl RoundTripStore for BrokenStore {
        async fn insert_round_trip(&self, _: &RoundTripRecord) -> Result<(), O11yError> {
            Err(O11yError::StoreFailed("disk full".to_string()))
        }

        async fn last_round_trip(&self) -> Result<Option<RoundTripRecord>, O11yError> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn test_round_trip_is_stored_redacted() {
        let store = Arc::new(MemoryStore::new());
        let (observer, _) = capture_with_store(store.clone());
        let transport = StoreTransport::new(echo());

        let req = Request::post("http://api.test/orders")
            .header("authorization", "Basic Zm9vOmJhcg==")
            .header("x-trace", "t1")
            .body(Body::from("payload"))
            .unwrap();
        let resp = transport.round_trip(attached(&observer, req)).await.unwrap();
        assert_eq!(resp.into_body().collect().await.unwrap(), "payload");

        let records = store.records();
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.url, "http://api.test/orders");
        assert_eq!(record.method, "POST");
        assert_eq!(record.status_code, 200);
        assert_eq!(record.request_body.as_deref(), Some("payload"));
        assert_eq!(record.response_body.as_deref(), Some("payload"));
        assert_eq!(record.request_headers["authorization"], vec!["REDACTED"]);
        assert_eq!(record.request_headers["x-trace"], vec!["t1"]);

        let last = observer.last_round_trip().await.unwrap();
        assert_eq!(last.url, "http://api.test/orders");
        assert!(last.created_at.is_some());
    }

    #[tokio::test]
    async fn test_without_store_only_logs() {
        let (observer, buffer) = capture();
        let transport = StoreTransport::new(echo());

        let req = Request::get("http://api.test/").body(Body::empty()).unwrap();
        transport.round_trip(attached(&observer, req)).await.unwrap();

        let records = buffer.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["level"], "DEBUG");
        assert_eq!(
            records[0]["msg"],
            "Database is not enabled, skipping storage of API request"
        );
    }

    #[tokio::test]
    async fn test_store_failure_fails_call() {
        let (observer, buffer) = capture_with_store(Arc::new(BrokenStore));
        let transport = StoreTransport::new(echo());

        let req = Request::get("http://api.test/").body(Body::empty()).unwrap();
        let err = transport
            .round_trip(attached(&observer, req))
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Storage error: disk full");
        let records = buffer.records();
        assert_eq!(records[0]["level"], "ERR");
        assert_eq!(records[0]["msg"], "Storage error: disk full");
    }

    #[tokio::test]
    async fn test_unreadable_request_body_is_logged_and_not_stored() {
        let store = Arc::new(MemoryStore::new());
        let (observer, buffer) = capture_with_store(store.clone());
        let transport = StoreTransport::new(echo());

        let chunks = vec![Err(io::Error::other("disk gone"))];
        let req = Request::post("http://api.test/upload")
            .body(Body::from_stream(stream::iter(chunks)))
            .unwrap();
        let err = transport
            .round_trip(attached(&observer, req))
            .await
            .unwrap_err();

        assert!(matches!(err, O11yError::BodyRead { what: "request", .. }));
        let records = buffer.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["level"], "ERR");
        assert_eq!(records[0]["msg"], "disk gone");
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_unreadable_response_body_is_logged_and_not_stored() {
        let store = Arc::new(MemoryStore::new());
        let (observer, buffer) = capture_with_store(store.clone());
        let transport = StoreTransport::new(TransportFn::new(|_: Request<Body>| async move {
            let chunks = vec![Ok(Bytes::from("half")), Err(io::Error::other("reset"))];
            Ok::<_, O11yError>(Response::new(Body::from_stream(stream::iter(chunks))))
        }));

        let req = Request::get("http://api.test/feed").body(Body::empty()).unwrap();
        let err = transport
            .round_trip(attached(&observer, req))
            .await
            .unwrap_err();

        assert!(matches!(err, O11yError::BodyRead { what: "response", .. }));
        let records = buffer.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["level"], "ERR");
        assert_eq!(records[0]["msg"], "reset");
        assert!(records[0]["call_duration"].is_string());
        assert!(store.is_empty());
    }
}
