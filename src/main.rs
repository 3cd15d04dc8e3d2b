//! Demo server binary.
//!
//! Serves a small API under `/api`:
//! - `GET  /api/health`        liveness
//! - `POST /api/echo`          echoes `name`, validated as a string
//! - `GET  /api/items/:id`     path parameter lookup
//! - `POST /api/upload`        raw body upload, `text/*` only

use clap::Parser;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;

use endpoint_router::config::{load_config, ServerConfig};
use endpoint_router::lifecycle::{spawn_signal_listener, Shutdown};
use endpoint_router::observability::{logging, metrics};
use endpoint_router::{
    DomainError, Endpoint, JsonType, Mime, ParameterSchema, RequestContext, Response, Router, Server,
    ServerResult, UploadPolicy, Validator,
};

#[derive(Debug, Parser)]
#[command(name = "endpoint-router", version, about = "Endpoint router demo server")]
struct Args {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override listener.bind_address.
    #[arg(short, long)]
    bind: Option<String>,
}

async fn health(_ctx: Arc<RequestContext>) -> ServerResult<Response> {
    Ok(Response::json(json!({ "status": "ok" })))
}

async fn echo(ctx: Arc<RequestContext>) -> ServerResult<Response> {
    Ok(Response::json(json!({
        "name": ctx.get("name"),
        "requestId": ctx.request_id(),
        "clientIp": ctx.client_ip(),
    })))
}

async fn item(ctx: Arc<RequestContext>) -> ServerResult<Response> {
    let id = ctx
        .param("id")
        .ok_or_else(|| DomainError::parameter_not_found("id", Some("path")))?;
    let id: u64 = id
        .parse()
        .map_err(|_| DomainError::parameter_incorrect_format("id", Some("path")))?;
    Ok(Response::json(json!({ "id": id })))
}

async fn upload(ctx: Arc<RequestContext>) -> ServerResult<Response> {
    let size = ctx.raw_body().map(|b| b.len()).unwrap_or(0);
    Ok(Response::json(json!({ "received": size })).status(201))
}

fn api() -> Router {
    Router::new()
        .endpoint(Endpoint::get("health", health))
        .endpoint(
            Endpoint::post("echo", echo)
                .validator(Validator::from_type_check(ParameterSchema::new().field("name", JsonType::String))),
        )
        .endpoint(Endpoint::get("items/:id", item))
        .endpoint(
            Endpoint::post("upload", upload)
                .upload(UploadPolicy::new(Mime::new("text", "*"), 64 * 1024))
                .post_process(|ctx: Arc<RequestContext>| async move {
                    tracing::info!(path = %ctx.path(), "Upload stored");
                    Ok(())
                }),
        )
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => ServerConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.listener.bind_address = bind;
    }

    logging::init(&config.observability)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "endpoint-router starting");

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    spawn_signal_listener(&shutdown);

    let mut server = Server::new(config);
    server
        .set_error_observer(|report| {
            tracing::debug!(status = %report.status, class = report.class.as_str(), "Error reported");
        })
        .mount("api", api());

    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
