//! HTTP server setup.
//!
//! # Responsibilities
//! - Own the root router and the pipeline configuration until start
//! - Compile routes and wire transport layers (request ID, tracing)
//! - Answer unmatched requests with a JSON 404
//! - Bind to a listener and serve until shutdown

use axum::http::{HeaderValue, Method, StatusCode, Uri};
use serde_json::json;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::error::translator::unix_millis;
use crate::error::{ErrorReport, ServerResult};
use crate::http::response::json_with_status;
use crate::http::RequestContext;
use crate::lifecycle::shutdown::wait as wait_for_shutdown;
use crate::observability::metrics;
use crate::routing::{AuthInjector, CompileError, Endpoint, ErrorObserver, Middleware, PipelineBuilder, Router};

/// Body message for requests no endpoint matched.
pub const NOT_FOUND_MESSAGE: &str = "Not found.";

/// Errors that stop the server from starting or serving.
#[derive(Debug, Error)]
pub enum ServeError {
    #[error("failed to compile routes: {0}")]
    Compile(#[from] CompileError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// The top-level server: a root router plus pipeline-wide hooks.
pub struct Server {
    config: ServerConfig,
    pipeline: PipelineBuilder,
    root: Router,
}

impl Server {
    pub fn new(config: ServerConfig) -> Self {
        let pipeline = PipelineBuilder::from_config(&config);
        Self {
            config,
            pipeline,
            root: Router::new(),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn router(&self) -> &Router {
        &self.root
    }

    /// Append a middleware run before every handler.
    pub fn add_middleware<F, Fut>(&mut self, middleware: F) -> &mut Self
    where
        F: Fn(Arc<RequestContext>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ServerResult<()>> + Send + 'static,
    {
        self.with_middleware(middleware)
    }

    pub fn with_middleware(&mut self, middleware: impl Middleware) -> &mut Self {
        self.pipeline = std::mem::take(&mut self.pipeline).with_middleware(middleware);
        self
    }

    /// Register the callback told about every translated error.
    pub fn set_error_observer<F>(&mut self, observer: F) -> &mut Self
    where
        F: Fn(&ErrorReport) + Send + Sync + 'static,
    {
        self.with_error_observer(observer)
    }

    pub fn with_error_observer(&mut self, observer: impl ErrorObserver) -> &mut Self {
        self.pipeline = std::mem::take(&mut self.pipeline).with_error_observer(observer);
        self
    }

    /// Register the hook that attaches session data before validation.
    pub fn set_auth_injector<F, Fut>(&mut self, injector: F) -> &mut Self
    where
        F: Fn(RequestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ServerResult<RequestContext>> + Send + 'static,
    {
        self.with_auth_injector(injector)
    }

    pub fn with_auth_injector(&mut self, injector: impl AuthInjector) -> &mut Self {
        self.pipeline = std::mem::take(&mut self.pipeline).with_auth_injector(injector);
        self
    }

    pub fn add_endpoint(&mut self, endpoint: Endpoint) -> &mut Self {
        self.root.add_endpoint(endpoint);
        self
    }

    /// Mount a router under `prefix` on the root router.
    pub fn mount(&mut self, prefix: &str, router: Router) -> &mut Self {
        self.root.mount(prefix, router);
        self
    }

    /// Compile everything into a ready-to-serve transport router.
    pub fn into_router(self) -> Result<axum::Router, CompileError> {
        let pipeline = self.pipeline.build();
        let powered_by = pipeline.powered_by().clone();

        let router = self
            .root
            .compile(&pipeline)?
            .fallback(move |method: Method, uri: Uri| not_found(method, uri, powered_by.clone()))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid));

        Ok(router)
    }

    /// Serve on `listener` until `shutdown` fires, then drain in-flight requests.
    pub async fn run(self, listener: TcpListener, shutdown: broadcast::Receiver<()>) -> Result<(), ServeError> {
        let addr = listener.local_addr()?;
        let app = self.into_router()?;

        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
            .with_graceful_shutdown(wait_for_shutdown(shutdown))
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

impl Default for Server {
    fn default() -> Self {
        Self::new(ServerConfig::default())
    }
}

async fn not_found(method: Method, uri: Uri, powered_by: HeaderValue) -> axum::response::Response {
    let start = Instant::now();
    tracing::debug!(method = %method, path = %uri.path(), "No endpoint matched");
    metrics::record_request(method.as_str(), "none", StatusCode::NOT_FOUND.as_u16(), start);

    json_with_status(
        StatusCode::NOT_FOUND,
        json!({ "error": NOT_FOUND_MESSAGE, "timeStamp": unix_millis() }),
        &powered_by,
    )
}
