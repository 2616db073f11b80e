//! Request/response logging decorator.

use std::time::Instant;

use async_trait::async_trait;
use http::{Request, Response};

use super::body::Body;
use super::redact::redacted_field;
use super::traits::Transport;
use crate::core::fields::Fields;
use crate::core::keys;
use crate::error::O11yError;
use crate::observer::{get, ObsContext};

/// Logs each outbound request and its response at info level.
///
/// Both bodies are buffered so the wrapped transport and the caller can still
/// read them. `Authorization` and `Cookie` headers are redacted in the record.
#[derive(Debug, Clone)]
pub struct LoggingTransport<T> {
    inner: T,
}

impl<T: Transport> LoggingTransport<T> {
    pub fn new(inner: T) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }
}

#[async_trait]
impl<T: Transport> Transport for LoggingTransport<T> {
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

        o.info(
            "outbound call - request",
            Fields::new()
                .with(keys::REQUEST_HEADERS, redacted_field(&parts.headers))
                .with(keys::REQUEST_METHOD, parts.method.as_str())
                .with(keys::REQUEST_URL, parts.uri.to_string())
                .with(keys::REQUEST_BODY, String::from_utf8_lossy(&request_body)),
        );

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

        o.info(
            "outbound call - response",
            Fields::new()
                .with(keys::CALL_DURATION, duration)
                .with(keys::STATUS_CODE, parts.status.as_u16())
                .with(keys::RESPONSE_HEADERS, redacted_field(&parts.headers))
                .with(keys::RESPONSE_BODY, String::from_utf8_lossy(&response_body)),
        );

        Ok(Response::from_parts(parts, body))
    }
}
