//! Client span decorator.

use async_trait::async_trait;
use http::{Request, Response};
use opentelemetry::trace::{SpanKind, Status, TraceContextExt, Tracer};
use opentelemetry::{Context, KeyValue};

use super::body::Body;
use super::traits::Transport;
use crate::error::O11yError;
use crate::observer::{get, ObsContext};
use crate::telemetry::{propagation, TraceSpan};

const TRACER_NAME: &str = "o11y/transport";

/// Wraps each outbound call in a client span.
///
/// The span is a child of the observer's active span (or the remote parent
/// carried by the request's context) and its context is sent to the server as
/// a `traceparent` header. Errors and 5xx responses mark the span as failed.
#[derive(Debug, Clone)]
pub struct TracingTransport<T> {
    inner: T,
}

impl<T: Transport> TracingTransport<T> {
    pub fn new(inner: T) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }
}

#[async_trait]
impl<T: Transport> Transport for TracingTransport<T> {
    async fn round_trip(&self, mut req: Request<Body>) -> Result<Response<Body>, O11yError> {
        let cx = ObsContext::from_request(&req);
        let o = get(&cx);

        let parent = o
            .active_span_context()
            .or_else(|| cx.remote_parent().cloned());
        let parent_cx = match parent {
            Some(span) => Context::new().with_remote_span_context(span),
            None => Context::new(),
        };

        let method = req.method().as_str().to_string();
        let tracer = o.tracer(TRACER_NAME);
        let builder = tracer
            .span_builder(format!("HTTP {method}"))
            .with_kind(SpanKind::Client)
            .with_attributes(vec![
                KeyValue::new("http.request.method", method),
                KeyValue::new("url.full", req.uri().to_string()),
            ]);
        let mut span: Box<dyn TraceSpan> = Box::new(tracer.build_with_context(builder, &parent_cx));

        propagation::inject(&span.span_context(), req.headers_mut());

        let result = self.inner.round_trip(req).await;
        match &result {
            Ok(resp) => {
                let status = resp.status();
                span.set_attributes(vec![KeyValue::new(
                    "http.response.status_code",
                    i64::from(status.as_u16()),
                )]);
                if status.is_server_error() {
                    span.set_status(Status::error(status.to_string()));
                }
            }
            Err(err) => {
                span.record_error(err);
                span.set_status(Status::error(err.to_string()));
            }
        }
        span.end();

        result
    }
}
