//! HTTP client adapters.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::TryStreamExt;
use http::{Request, Response};
use reqwest::Client;

use super::body::Body;
use super::logging::LoggingTransport;
use super::store::StoreTransport;
use super::trace::TracingTransport;
use super::traits::Transport;
use crate::error::O11yError;
use crate::observer::ObsContext;

/// Connection timeout in seconds
const CONNECT_TIMEOUT_SECS: u64 = 10;
/// Total request timeout in seconds
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Transport that sends requests with [`reqwest`].
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Client with the default connect and request timeouts.
    pub fn new() -> Result<Self, O11yError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn round_trip(&self, req: Request<Body>) -> Result<Response<Body>, O11yError> {
        let (parts, body) = req.into_parts();
        let body = body.collect().await.map_err(O11yError::request_body)?;
        let req = reqwest::Request::try_from(Request::from_parts(parts, body))?;

        let resp = self.client.execute(req).await?;

        let mut builder = Response::builder()
            .status(resp.status())
            .version(resp.version());
        if let Some(headers) = builder.headers_mut() {
            *headers = resp.headers().clone();
        }
        let stream = resp.bytes_stream().map_err(io::Error::other);
        Ok(builder.body(Body::from_stream(stream))?)
    }
}

/// Composes the instrumentation decorators around a base transport.
///
/// Decorators wrap in a fixed order regardless of the order they are enabled:
/// tracing outermost, then logging, then storage.
pub struct Instrumented {
    base: Box<dyn Transport>,
    logging: bool,
    store: bool,
    tracing: bool,
}

impl Instrumented {
    pub fn new(base: impl Transport + 'static) -> Self {
        Self {
            base: Box::new(base),
            logging: false,
            store: false,
            tracing: false,
        }
    }

    /// Instrument a [`ReqwestTransport`] with the default timeouts.
    pub fn reqwest() -> Result<Self, O11yError> {
        Ok(Self::new(ReqwestTransport::new()?))
    }

    pub fn with_logging(mut self) -> Self {
        self.logging = true;
        self
    }

    pub fn with_store(mut self) -> Self {
        self.store = true;
        self
    }

    pub fn with_tracing(mut self) -> Self {
        self.tracing = true;
        self
    }

    /// Logging, storage and tracing.
    pub fn with_all(self) -> Self {
        self.with_logging().with_store().with_tracing()
    }

    pub fn build(self) -> HttpClient {
        let mut transport = self.base;
        if self.store {
            transport = Box::new(StoreTransport::new(transport));
        }
        if self.logging {
            transport = Box::new(LoggingTransport::new(transport));
        }
        if self.tracing {
            transport = Box::new(TracingTransport::new(transport));
        }
        HttpClient {
            transport: Arc::from(transport),
        }
    }
}

/// Instrumented client. Cheap to clone.
#[derive(Clone)]
pub struct HttpClient {
    transport: Arc<dyn Transport>,
}

impl HttpClient {
    pub fn new(transport: impl Transport + 'static) -> Self {
        Self {
            transport: Arc::new(transport),
        }
    }

    /// Send `req` with `cx` attached, so the decorators use its observer.
    pub async fn send(
        &self,
        cx: &ObsContext,
        mut req: Request<Body>,
    ) -> Result<Response<Body>, O11yError> {
        cx.attach(&mut req);
        self.transport.round_trip(req).await
    }
}

#[async_trait]
impl Transport for HttpClient {
    async fn round_trip(&self, req: Request<Body>) -> Result<Response<Body>, O11yError> {
        self.transport.round_trip(req).await
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::transport::testing::{capture_with_store, echo};

    #[test]
    fn test_reqwest_transport_builds() {
        assert!(ReqwestTransport::new().is_ok());
    }

    #[tokio::test]
    async fn test_instrumented_composes_decorators() {
        let store = Arc::new(MemoryStore::new());
        let (observer, buffer) = capture_with_store(store.clone());
        let client = Instrumented::new(echo()).with_all().build();

        let cx = ObsContext::new().with_observer(observer);
        let req = Request::post("http://api.test/echo")
            .body(Body::from("ping"))
            .unwrap();
        let resp = client.send(&cx, req).await.unwrap();

        assert_eq!(resp.into_body().collect().await.unwrap(), "ping");
        assert_eq!(store.len(), 1);

        let msgs: Vec<_> = buffer
            .records()
            .iter()
            .map(|r| r["msg"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(msgs, vec!["outbound call - request", "outbound call - response"]);
        assert!(buffer.records()[0]["request_headers"]["traceparent"].is_array());
    }

    #[tokio::test]
    async fn test_plain_client_passes_through() {
        let client = Instrumented::new(echo()).build();
        let resp = client
            .send(
                &ObsContext::new(),
                Request::get("http://api.test/").body(Body::from("x")).unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
    }
}
