//! Span handles and the per-observer span stack.
//!
//! The observer owns its spans as boxed [`TraceSpan`] trait objects so that spans
//! from any `opentelemetry` tracer can be pushed onto the same stack.

use std::error::Error;
use std::fmt;

use opentelemetry::trace::{Span, SpanContext, Status};
use opentelemetry::KeyValue;

/// Object-safe view of a backend span.
pub trait TraceSpan: Send + Sync {
    fn add_event(&mut self, name: String, attributes: Vec<KeyValue>);

    fn record_error(&mut self, err: &dyn Error);

    fn set_attributes(&mut self, attributes: Vec<KeyValue>);

    fn set_status(&mut self, status: Status);

    fn span_context(&self) -> SpanContext;

    fn end(&mut self);
}

impl<S> TraceSpan for S
where
    S: Span + Send + Sync,
{
    fn add_event(&mut self, name: String, attributes: Vec<KeyValue>) {
        Span::add_event(self, name, attributes);
    }

    fn record_error(&mut self, err: &dyn Error) {
        Span::record_error(self, err);
    }

    fn set_attributes(&mut self, attributes: Vec<KeyValue>) {
        Span::set_attributes(self, attributes);
    }

    fn set_status(&mut self, status: Status) {
        Span::set_status(self, status);
    }

    fn span_context(&self) -> SpanContext {
        Span::span_context(self).clone()
    }

    fn end(&mut self) {
        Span::end(self);
    }
}

/// LIFO stack of open spans. The top of the stack is the active span.
#[derive(Default)]
pub struct SpanStack {
    spans: Vec<Box<dyn TraceSpan>>,
}

impl SpanStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a span and make it active.
    pub fn enter(&mut self, span: Box<dyn TraceSpan>) {
        self.spans.push(span);
    }

    /// End and pop the active span.
    ///
    /// Returns `false` without doing anything when the stack is empty.
    pub fn exit(&mut self) -> bool {
        match self.spans.pop() {
            Some(mut span) => {
                span.end();
                true
            }
            None => false,
        }
    }

    pub fn active(&self) -> Option<&(dyn TraceSpan + 'static)> {
        self.spans.last().map(Box::as_ref)
    }

    pub fn active_mut(&mut self) -> Option<&mut (dyn TraceSpan + 'static)> {
        self.spans.last_mut().map(Box::as_mut)
    }

    /// Context of the active span, if any.
    pub fn active_context(&self) -> Option<SpanContext> {
        self.active().map(TraceSpan::span_context)
    }

    pub fn depth(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// End every open span, most recent first. Returns how many were ended.
    pub fn drain(&mut self) -> usize {
        let count = self.spans.len();
        while self.exit() {}
        count
    }
}

impl fmt::Debug for SpanStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpanStack")
            .field("depth", &self.depth())
            .finish()
    }
}
