//! Shared pipeline configuration and the per-request dispatch algorithm.
//!
//! # Per-request steps
//! ```text
//! 1. content-type gate      (raw mode only)
//! 2. read body + build RequestContext
//! 3. auth injection         (if configured)
//! 4. validation             (if the endpoint has a validator)
//!        returned Response → written as-is, stop
//! 5. global middleware      (sequential, registration order)
//! 6. handler
//! 7. send Response          (extra headers, raw or JSON)
//! 8. post-process           (spawned once the response body is written or
//!                            abandoned, failures only observed)
//!
//! any failure in 1-6 → translator → JSON error + error observer
//! ```
//!
//! # Design Decisions
//! - `Pipeline` is built once and shared read-only via `Arc`; there is no
//!   process-wide mutable state
//! - Panics inside user code are caught and treated as internal errors

use axum::body::{Body, HttpBody};
use axum::extract::rejection::RawPathParamsRejection;
use axum::extract::{FromRequestParts, RawPathParams, Request};
use axum::http::{header, HeaderValue, StatusCode};
use futures_util::{FutureExt, Stream};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use crate::config::ServerConfig;
use crate::error::{translate, DomainError, ErrorKind, ErrorReport, ServerError, ServerResult};
use crate::http::request::BodyPayload;
use crate::http::response::json_with_status;
use crate::http::{body, RequestContext};
use crate::observability::metrics;
use crate::routing::endpoint::{BodyMode, Endpoint, UploadPolicy};
use crate::routing::handler::{AuthInjector, ErrorObserver, Middleware};
use crate::validation::DEFAULT_FAILURE_STATUS;

/// Default limit for JSON bodies (100 KiB).
pub const DEFAULT_JSON_LIMIT: usize = 100 * 1024;

/// Default limit for uploads without an explicit size (5 MiB).
pub const DEFAULT_UPLOAD_LIMIT: usize = 5 * 1024 * 1024;

/// Default identifying header value.
pub const DEFAULT_POWERED_BY: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Server-wide hooks and limits shared by every router.
pub struct Pipeline {
    middleware: Vec<Arc<dyn Middleware>>,
    auth_injector: Option<Arc<dyn AuthInjector>>,
    error_observer: Option<Arc<dyn ErrorObserver>>,
    json_limit: usize,
    upload_limit: usize,
    failure_status: StatusCode,
    powered_by: HeaderValue,
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    /// A pipeline with no hooks and default limits.
    pub fn empty() -> Arc<Self> {
        Self::builder().build()
    }

    pub fn middleware_count(&self) -> usize {
        self.middleware.len()
    }

    pub fn powered_by(&self) -> &HeaderValue {
        &self.powered_by
    }

    /// Hand a report to the error observer, if any.
    pub fn notify(&self, report: &ErrorReport) {
        if let Some(observer) = &self.error_observer {
            observer.observe(report);
        }
    }

    fn upload_limit_for(&self, policy: &UploadPolicy) -> usize {
        policy.max_bytes().unwrap_or(self.upload_limit)
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("middleware", &self.middleware.len())
            .field("auth_injector", &self.auth_injector.is_some())
            .field("error_observer", &self.error_observer.is_some())
            .field("json_limit", &self.json_limit)
            .field("upload_limit", &self.upload_limit)
            .field("failure_status", &self.failure_status)
            .finish()
    }
}

/// One-time setup for a [`Pipeline`].
pub struct PipelineBuilder {
    middleware: Vec<Arc<dyn Middleware>>,
    auth_injector: Option<Arc<dyn AuthInjector>>,
    error_observer: Option<Arc<dyn ErrorObserver>>,
    json_limit: usize,
    upload_limit: usize,
    failure_status: StatusCode,
    powered_by: HeaderValue,
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self {
            middleware: Vec::new(),
            auth_injector: None,
            error_observer: None,
            json_limit: DEFAULT_JSON_LIMIT,
            upload_limit: DEFAULT_UPLOAD_LIMIT,
            failure_status: DEFAULT_FAILURE_STATUS,
            powered_by: HeaderValue::from_static(DEFAULT_POWERED_BY),
        }
    }
}

impl PipelineBuilder {
    /// Limits, status and identifying header from the server configuration.
    pub fn from_config(config: &ServerConfig) -> Self {
        Self::default()
            .json_limit(config.limits.json_body_bytes)
            .upload_limit(config.limits.upload_bytes)
            .failure_status(config.validation.failure_status)
            .powered_by(&config.errors.powered_by)
    }

    /// Append a middleware. Middleware run in the order they were added.
    pub fn add_middleware<F, Fut>(self, middleware: F) -> Self
    where
        F: Fn(Arc<RequestContext>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ServerResult<()>> + Send + 'static,
    {
        self.with_middleware(middleware)
    }

    pub fn with_middleware(mut self, middleware: impl Middleware) -> Self {
        self.middleware.push(Arc::new(middleware));
        self
    }

    pub fn set_auth_injector<F, Fut>(self, injector: F) -> Self
    where
        F: Fn(RequestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ServerResult<RequestContext>> + Send + 'static,
    {
        self.with_auth_injector(injector)
    }

    pub fn with_auth_injector(mut self, injector: impl AuthInjector) -> Self {
        self.auth_injector = Some(Arc::new(injector));
        self
    }

    pub fn set_error_observer<F>(self, observer: F) -> Self
    where
        F: Fn(&ErrorReport) + Send + Sync + 'static,
    {
        self.with_error_observer(observer)
    }

    pub fn with_error_observer(mut self, observer: impl ErrorObserver) -> Self {
        self.error_observer = Some(Arc::new(observer));
        self
    }

    pub fn json_limit(mut self, bytes: usize) -> Self {
        self.json_limit = bytes;
        self
    }

    pub fn upload_limit(mut self, bytes: usize) -> Self {
        self.upload_limit = bytes;
        self
    }

    /// Status for type-check failures. Invalid codes keep the current value.
    pub fn failure_status(mut self, status: u16) -> Self {
        if let Ok(status) = StatusCode::from_u16(status) {
            self.failure_status = status;
        }
        self
    }

    /// Identifying header value. Invalid values keep the current value.
    pub fn powered_by(mut self, value: &str) -> Self {
        match HeaderValue::from_str(value) {
            Ok(value) => self.powered_by = value,
            Err(_) => tracing::warn!(value = %value, "Ignoring invalid powered-by header value"),
        }
        self
    }

    /// Freeze the configuration.
    pub fn build(self) -> Arc<Pipeline> {
        Arc::new(Pipeline {
            middleware: self.middleware,
            auth_injector: self.auth_injector,
            error_observer: self.error_observer,
            json_limit: self.json_limit,
            upload_limit: self.upload_limit,
            failure_status: self.failure_status,
            powered_by: self.powered_by,
        })
    }
}

/// The compiled dispatch surface of a single endpoint.
#[derive(Clone)]
pub(crate) struct EndpointDispatch {
    endpoint: Arc<Endpoint>,
    pipeline: Arc<Pipeline>,
    /// Full route pattern, for logs and metrics.
    route: Arc<str>,
    /// Segments contributed by mount prefixes.
    mount_depth: usize,
}

impl EndpointDispatch {
    pub(crate) fn new(
        endpoint: Arc<Endpoint>,
        pipeline: Arc<Pipeline>,
        route: String,
        mount_depth: usize,
    ) -> Self {
        Self {
            endpoint,
            pipeline,
            route: route.into(),
            mount_depth,
        }
    }

    /// Run the pipeline for one request. Never fails; errors become responses.
    pub(crate) async fn dispatch(self, request: Request<Body>) -> axum::response::Response {
        let start = Instant::now();
        let method = self.endpoint.method();

        tracing::debug!(
            method = %method,
            route = %self.route,
            request_id = ?request.headers().get("x-request-id"),
            "Dispatching request"
        );

        let outcome = AssertUnwindSafe(self.execute(request)).catch_unwind().await;
        let response = match outcome {
            Ok(Ok(response)) => response,
            Ok(Err(error)) => self.fail(&error),
            Err(panic) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic payload".to_string());
                self.fail(&ServerError::internal(format!("panic while handling request: {}", message)))
            }
        };

        metrics::record_request(method.as_str(), &self.route, response.status().as_u16(), start);
        response
    }

    async fn execute(&self, request: Request<Body>) -> ServerResult<axum::response::Response> {
        let (mut parts, body) = request.into_parts();

        let payload = match self.endpoint.body_mode() {
            BodyMode::Raw(policy) => {
                check_content_type(&parts.headers, policy)?;
                let limit = self.pipeline.upload_limit_for(policy);
                BodyPayload::Raw(body::read_bytes(body, &parts.headers, limit).await?)
            }
            BodyMode::Json if parts.method == axum::http::Method::GET => BodyPayload::Json(None),
            BodyMode::Json => {
                BodyPayload::Json(body::read_json(body, &parts.headers, self.pipeline.json_limit).await?)
            }
        };

        let params: HashMap<String, String> = match RawPathParams::from_request_parts(&mut parts, &()).await {
            Ok(raw) => raw
                .iter()
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect(),
            Err(RawPathParamsRejection::InvalidUtf8InPathParam(rejection)) => {
                // The rejection names the offending parameter between backticks.
                let text = rejection.body_text();
                let name = text.split('`').nth(1).unwrap_or("path");
                return Err(DomainError::parameter_incorrect_format(name, Some("path")).into());
            }
            Err(_) => HashMap::new(),
        };

        let mut context = RequestContext::from_parts(&parts, payload, params).within_mount(self.mount_depth);

        if let Some(injector) = &self.pipeline.auth_injector {
            context = injector.inject(context).await?;
        }
        let context = Arc::new(context);

        if let Some(validator) = self.endpoint.get_validator() {
            if let Some(rejection) = validator.validate(&context, self.pipeline.failure_status).await? {
                tracing::debug!(
                    route = %self.route,
                    status = %rejection.get_status(),
                    "Request rejected by validator"
                );
                return Ok(rejection.into_http(&self.pipeline.powered_by));
            }
        }

        for middleware in &self.pipeline.middleware {
            middleware.call(Arc::clone(&context)).await?;
        }

        let response = self.endpoint.handler().call(Arc::clone(&context)).await?;
        let response = response.into_http(&self.pipeline.powered_by);

        let Some(hook) = self.endpoint.get_post_process() else {
            return Ok(response);
        };
        let hook = Arc::clone(hook);
        let pipeline = Arc::clone(&self.pipeline);
        let route = Arc::clone(&self.route);
        let runtime = tokio::runtime::Handle::current();
        Ok(after_body(response, move || {
            runtime.spawn(async move {
                let outcome = AssertUnwindSafe(hook.call(context)).catch_unwind().await;
                let error = match outcome {
                    Ok(Ok(())) => return,
                    Ok(Err(error)) => error,
                    Err(_) => ServerError::internal("panic in post-process hook"),
                };
                tracing::error!(route = %route, error = %error, "Post-process hook failed");
                metrics::record_post_process_failure(&route);
                let translation = translate(&error);
                pipeline.notify(&translation.report);
            });
        }))
    }

    fn fail(&self, error: &ServerError) -> axum::response::Response {
        let translation = translate(error);
        let report = &translation.report;
        metrics::record_error(
            report.class.as_str(),
            report.domain.as_ref().map(|d| d.kind().readable()).unwrap_or("none"),
        );
        self.pipeline.notify(report);
        json_with_status(translation.status, translation.body, &self.pipeline.powered_by)
    }
}

/// Run `done` once the transport drops the response body, after the last
/// chunk is written or when the connection goes away.
fn after_body(response: axum::response::Response, done: impl FnOnce() + Send + 'static) -> axum::response::Response {
    let (mut parts, body) = response.into_parts();
    if let Some(len) = body.size_hint().exact() {
        parts.headers.entry(header::CONTENT_LENGTH).or_insert_with(|| HeaderValue::from(len));
    }
    let stream = OnDrop {
        inner: body.into_data_stream(),
        done: Some(Box::new(done)),
    };
    axum::response::Response::from_parts(parts, Body::from_stream(stream))
}

struct OnDrop<S> {
    inner: S,
    done: Option<Box<dyn FnOnce() + Send>>,
}

impl<S: Stream + Unpin> Stream for OnDrop<S> {
    type Item = S::Item;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

impl<S> Drop for OnDrop<S> {
    fn drop(&mut self) {
        if let Some(done) = self.done.take() {
            done();
        }
    }
}

fn check_content_type(headers: &axum::http::HeaderMap, policy: &UploadPolicy) -> ServerResult<()> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            DomainError::user(ErrorKind::NullOrUndefined, "Content-Type header is not present.")
        })?;

    if !policy.allowed().allows(content_type) {
        return Err(DomainError::user(
            ErrorKind::FileIncorrectType,
            "Incorrect file type. Mime invalid.",
        )
        .into());
    }
    Ok(())
}
