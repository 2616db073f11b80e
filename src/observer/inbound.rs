//! Inbound request scope.
//!
//! [`begin_request`] prepares the observer for one inbound HTTP request: it
//! resets state left over from the previous request, picks up the caller's
//! trace context, opens a server span and logs the request. Dropping (or
//! finishing) the returned [`RequestScope`] logs completion and closes the span.

use std::net::IpAddr;
use std::time::Instant;

use http::header::USER_AGENT;
use opentelemetry::trace::{SpanKind, Status};
use serde::Serialize;

use super::{extend, get, open_span, reset, ObsContext, Observer};
use crate::core::fields::Fields;
use crate::core::keys;
use crate::telemetry::{propagation, RequestId};

/// Header carrying a caller-supplied request ID.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

const TRACER_NAME: &str = "o11y/inbound";

/// Summary of the caller, recorded under the `origin` field.
#[derive(Debug, Clone, Serialize)]
pub struct Origin {
    pub client_ip: String,
    pub user_agent: String,
    pub method: String,
    pub path: String,
}

/// Observability state for one inbound request.
pub struct RequestScope {
    cx: ObsContext,
    observer: Observer,
    request_id: RequestId,
    started: Instant,
    depth: usize,
    finished: bool,
}

/// Start observing an inbound request.
pub fn begin_request<B>(
    cx: &ObsContext,
    req: &http::Request<B>,
    client_ip: Option<IpAddr>,
) -> RequestScope {
    let request_id = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(RequestId::from_string)
        .unwrap_or_default();
    let remote = propagation::extract(req.headers());

    let mut cx = reset(cx).with_request_id(request_id.clone());
    if let Some(parent) = &remote {
        cx = cx.with_remote_parent(parent.clone());
    }

    let method = req.method().as_str().to_string();
    let path = req.uri().path().to_string();
    let origin = Origin {
        client_ip: client_ip.map(|ip| ip.to_string()).unwrap_or_default(),
        user_agent: req
            .headers()
            .get(USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string(),
        method: method.clone(),
        path: path.clone(),
    };

    let tracer = get(&cx).tracer(TRACER_NAME);
    let (cx, observer) = open_span(&cx, &tracer, format!("HTTP {method} {path}"), SpanKind::Server);
    let depth = observer.span_depth();
    let span = observer.span_context();

    let mut fields = Fields::new()
        .with(keys::ORIGIN, serde_json::to_value(&origin).unwrap_or_default())
        .with(keys::REQUEST_ID, &request_id)
        .with(keys::REQUEST_METHOD, method)
        .with(keys::REQUEST_PATH, path)
        .with(keys::SPAN_ID, span.span_id().to_string())
        .with(keys::TRACE_ID, span.trace_id().to_string());
    if let Some(parent) = &remote {
        fields.push(keys::REMOTE_TRACE_ID, parent.trace_id().to_string());
        fields.push(keys::REMOTE_SPAN_ID, parent.span_id().to_string());
    }

    let (cx, observer) = extend(&cx, fields);
    observer.debug("request received", ());

    RequestScope {
        cx,
        observer,
        request_id,
        started: Instant::now(),
        depth,
        finished: false,
    }
}

impl RequestScope {
    /// Context to hand to request handlers.
    pub fn context(&self) -> &ObsContext {
        &self.cx
    }

    pub fn observer(&self) -> &Observer {
        &self.observer
    }

    pub fn request_id(&self) -> &RequestId {
        &self.request_id
    }

    /// Log completion and close the request span.
    pub fn finish(mut self) {
        self.complete(None);
    }

    /// Like [`RequestScope::finish`], recording the response status. Server
    /// errors mark the span as failed.
    pub fn finish_with_status(mut self, status: http::StatusCode) {
        self.complete(Some(status));
    }

    fn complete(&mut self, status: Option<http::StatusCode>) {
        if self.finished {
            return;
        }
        self.finished = true;

        let mut fields = Fields::new().with(keys::CALL_DURATION, self.started.elapsed());
        if let Some(status) = status {
            fields.push(keys::STATUS_CODE, status.as_u16());
        }
        self.observer.debug("request processed", fields);

        // Spans the handler left open sit above the request span.
        while self.observer.span_depth() > self.depth {
            self.observer.close_span();
        }
        if self.observer.span_depth() < self.depth {
            return;
        }
        if let Some(status) = status.filter(|s| s.is_server_error()) {
            self.observer
                .set_span_status(Status::error(status.to_string()));
        }
        self.observer.close_span();
    }
}

impl Drop for RequestScope {
    fn drop(&mut self) {
        self.complete(None);
    }
}
