use crate::body::MinifyBody;
use crate::config::Strategy;
use crate::future::ResponseFuture;
use crate::matcher::Registry;
use crate::pool::BufferPool;
use http::{Method, Request, Response};
use http_body::Body;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::Service;

/// A Tower service that minifies HTTP response bodies.
#[derive(Debug, Clone)]
pub struct MinifyService<S> {
    inner: S,
    registry: Arc<Registry>,
    pool: Arc<BufferPool>,
    strategy: Strategy,
}

impl<S> MinifyService<S> {
    /// Creates a new minification service wrapping the given inner service.
    pub fn new(
        inner: S,
        registry: Arc<Registry>,
        pool: Arc<BufferPool>,
        strategy: Strategy,
    ) -> Self {
        Self {
            inner,
            registry,
            pool,
            strategy,
        }
    }

    /// Returns a reference to the inner service.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Returns a mutable reference to the inner service.
    pub fn inner_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    /// Consumes this service, returning the inner service.
    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for MinifyService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
    ResBody: Body,
    ResBody::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    type Response = Response<MinifyBody<ResBody>>;
    type Error = S::Error;
    type Future = ResponseFuture<S::Future, ResBody>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        let head_request = req.method() == Method::HEAD;

        let inner = self.inner.call(req);

        ResponseFuture::new(
            inner,
            Arc::clone(&self.registry),
            Arc::clone(&self.pool),
            self.strategy,
            head_request,
        )
    }
}
