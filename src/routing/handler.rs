//! Callable capabilities plugged into the pipeline.
//!
//! Every capability is a trait with a blanket implementation for async closures,
//! so `|ctx| async move { ... }` works anywhere a handler, middleware, hook or
//! injector is expected.

use futures_util::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;

use crate::error::{ErrorReport, ServerResult};
use crate::http::{RequestContext, Response};

/// Produces the response for an endpoint.
pub trait Handler: Send + Sync + 'static {
    fn call(&self, ctx: Arc<RequestContext>) -> BoxFuture<'static, ServerResult<Response>>;
}

impl<F, Fut> Handler for F
where
    F: Fn(Arc<RequestContext>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ServerResult<Response>> + Send + 'static,
{
    fn call(&self, ctx: Arc<RequestContext>) -> BoxFuture<'static, ServerResult<Response>> {
        Box::pin(self(ctx))
    }
}

/// Runs for every request after validation and before the handler.
pub trait Middleware: Send + Sync + 'static {
    fn call(&self, ctx: Arc<RequestContext>) -> BoxFuture<'static, ServerResult<()>>;
}

impl<F, Fut> Middleware for F
where
    F: Fn(Arc<RequestContext>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ServerResult<()>> + Send + 'static,
{
    fn call(&self, ctx: Arc<RequestContext>) -> BoxFuture<'static, ServerResult<()>> {
        Box::pin(self(ctx))
    }
}

/// Runs after the response has been produced. Failures are only observed.
pub trait PostProcess: Send + Sync + 'static {
    fn call(&self, ctx: Arc<RequestContext>) -> BoxFuture<'static, ServerResult<()>>;
}

impl<F, Fut> PostProcess for F
where
    F: Fn(Arc<RequestContext>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ServerResult<()>> + Send + 'static,
{
    fn call(&self, ctx: Arc<RequestContext>) -> BoxFuture<'static, ServerResult<()>> {
        Box::pin(self(ctx))
    }
}

/// Populates the session before validation.
pub trait AuthInjector: Send + Sync + 'static {
    fn inject(&self, ctx: RequestContext) -> BoxFuture<'static, ServerResult<RequestContext>>;
}

impl<F, Fut> AuthInjector for F
where
    F: Fn(RequestContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ServerResult<RequestContext>> + Send + 'static,
{
    fn inject(&self, ctx: RequestContext) -> BoxFuture<'static, ServerResult<RequestContext>> {
        Box::pin(self(ctx))
    }
}

/// Notified of every translated error. Must not block.
pub trait ErrorObserver: Send + Sync + 'static {
    fn observe(&self, report: &ErrorReport);
}

impl<F> ErrorObserver for F
where
    F: Fn(&ErrorReport) + Send + Sync + 'static,
{
    fn observe(&self, report: &ErrorReport) {
        self(report)
    }
}
