//! Execution-context carrier.

use opentelemetry::trace::SpanContext;

use super::Observer;
use crate::telemetry::RequestId;

/// Carries an observer, a request ID and a remote parent span through a unit
/// of work.
///
/// Attach it to outbound `http::Request`s with [`ObsContext::attach`] so the
/// transport decorators can find the observer.
#[derive(Clone, Default, Debug)]
pub struct ObsContext {
    observer: Option<Observer>,
    request_id: Option<RequestId>,
    remote_parent: Option<SpanContext>,
}

impl ObsContext {
    /// Empty context; operations on it fall back to the process default observer.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_observer(mut self, observer: Observer) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn observer(&self) -> Option<&Observer> {
        self.observer.as_ref()
    }

    pub fn with_request_id(mut self, id: RequestId) -> Self {
        self.request_id = Some(id);
        self
    }

    pub fn request_id(&self) -> Option<&RequestId> {
        self.request_id.as_ref()
    }

    /// Parent for the first span opened in this context, typically extracted
    /// from inbound headers.
    pub fn with_remote_parent(mut self, parent: SpanContext) -> Self {
        self.remote_parent = Some(parent);
        self
    }

    pub fn remote_parent(&self) -> Option<&SpanContext> {
        self.remote_parent.as_ref()
    }

    /// Context attached to a request, or an empty one.
    pub fn from_request<B>(req: &http::Request<B>) -> Self {
        req.extensions()
            .get::<ObsContext>()
            .cloned()
            .unwrap_or_default()
    }

    /// Attach this context to a request.
    pub fn attach<B>(&self, req: &mut http::Request<B>) {
        req.extensions_mut().insert(self.clone());
    }
}
