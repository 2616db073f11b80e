//! Round-trip trait definition

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use http::{Request, Response};

use super::body::Body;
use crate::error::O11yError;

/// Executes one HTTP request and returns its response.
///
/// Decorators wrap another `Transport` and delegate to it. The observer for
/// the call is read from the [`ObsContext`](crate::ObsContext) attached to the
/// request's extensions.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn round_trip(&self, req: Request<Body>) -> Result<Response<Body>, O11yError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn round_trip(&self, req: Request<Body>) -> Result<Response<Body>, O11yError> {
        (**self).round_trip(req).await
    }
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Box<T> {
    async fn round_trip(&self, req: Request<Body>) -> Result<Response<Body>, O11yError> {
        (**self).round_trip(req).await
    }
}

/// Transport backed by an async closure.
pub struct TransportFn<F>(F);

impl<F> TransportFn<F> {
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

#[async_trait]
impl<F, Fut> Transport for TransportFn<F>
where
    F: Fn(Request<Body>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Response<Body>, O11yError>> + Send,
{
    async fn round_trip(&self, req: Request<Body>) -> Result<Response<Body>, O11yError> {
        (self.0)(req).await
    }
}
