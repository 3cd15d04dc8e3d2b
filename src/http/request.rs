//! The normalized request context handed to validators, middleware and handlers.
//!
//! # Responsibilities
//! - Snapshot method, path, host, protocol, headers and cookies at dispatch time
//! - Normalize the client address (loopback sentinel, mapped-IPv4 prefix)
//! - Expose the parsed body (query for GET, JSON body otherwise) and raw bytes
//! - Hold the session slot filled by the auth injector
//!
//! # Design Decisions
//! - `parsed_body` is always a map, never absent
//! - The session is typed on read via `Any` downcast; it can be set once

use axum::body::Bytes;
use axum::extract::{ConnectInfo, OriginalUri};
use axum::http::{header, request::Parts, HeaderMap};
use serde_json::{Map, Value};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::error::{ServerError, ServerResult};
use crate::error::translator::unix_millis;
use crate::http::body::{parse_cookies, parse_query};
use crate::routing::Method;

/// Address reported for loopback clients and for requests without peer info.
pub const LOOPBACK_SENTINEL: &str = "0.0.0.0";

const MAPPED_IPV4_PREFIX: &str = "::ffff:";

/// Normalize a peer address string.
///
/// `::1` becomes [`LOOPBACK_SENTINEL`]; the `::ffff:` prefix is stripped from everything else.
pub fn normalize_client_ip(raw: &str) -> String {
    if raw == "::1" {
        return LOOPBACK_SENTINEL.to_string();
    }
    raw.strip_prefix(MAPPED_IPV4_PREFIX).unwrap_or(raw).to_string()
}

/// Transport protocol of the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    Http,
    Https,
    Ws,
    Wss,
}

impl Protocol {
    /// Map a scheme string, defaulting to HTTP.
    pub fn from_scheme(scheme: &str) -> Self {
        match scheme.to_ascii_lowercase().as_str() {
            "https" => Protocol::Https,
            "ws" => Protocol::Ws,
            "wss" => Protocol::Wss,
            _ => Protocol::Http,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Protocol::Http => "HTTP",
            Protocol::Https => "HTTPS",
            Protocol::Ws => "WS",
            Protocol::Wss => "WSS",
        }
    }

    fn upgraded(self) -> Self {
        match self {
            Protocol::Http => Protocol::Ws,
            Protocol::Https => Protocol::Wss,
            other => other,
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The body as delivered by the endpoint's reader.
#[derive(Debug)]
pub enum BodyPayload {
    /// Structured mode. `None` when there was nothing to parse.
    Json(Option<Map<String, Value>>),
    /// Raw mode bytes, verbatim.
    Raw(Bytes),
}

/// Immutable view of an inbound request.
pub struct RequestContext {
    timestamp: u64,
    request_id: Option<String>,
    client_ip: String,
    path: String,
    raw_body: Option<Bytes>,
    parsed_body: Map<String, Value>,
    params: HashMap<String, String>,
    cookies: HashMap<String, String>,
    method: Method,
    host_name: String,
    full_url: String,
    protocol: Protocol,
    headers: HeaderMap,
    session: Option<Arc<dyn Any + Send + Sync>>,
}

impl RequestContext {
    /// Build a context from request parts, the read body and the matched path parameters.
    pub fn from_parts(parts: &Parts, payload: BodyPayload, params: HashMap<String, String>) -> Self {
        let method = Method::from_http(&parts.method);

        let client_ip = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| normalize_client_ip(&addr.ip().to_string()))
            .unwrap_or_else(|| LOOPBACK_SENTINEL.to_string());

        let original = parts
            .extensions
            .get::<OriginalUri>()
            .map(|OriginalUri(uri)| uri)
            .unwrap_or(&parts.uri);

        let (raw_body, body) = match payload {
            BodyPayload::Json(map) => (None, map),
            BodyPayload::Raw(bytes) => (Some(bytes), None),
        };
        let parsed_body = if method == Method::Get {
            parse_query(parts.uri.query())
        } else {
            body.unwrap_or_default()
        };

        Self {
            timestamp: unix_millis(),
            request_id: header_str(&parts.headers, "x-request-id").map(str::to_string),
            client_ip,
            path: parts.uri.path().to_string(),
            raw_body,
            parsed_body,
            params,
            cookies: parse_cookies(&parts.headers),
            method,
            host_name: host_name(parts),
            full_url: original.to_string(),
            protocol: protocol(parts),
            headers: parts.headers.clone(),
            session: None,
        }
    }

    /// Re-root `path` below its first `depth` segments, the mount prefix.
    pub(crate) fn within_mount(mut self, depth: usize) -> Self {
        if depth > 0 {
            let rest: Vec<&str> = self
                .path
                .split('/')
                .filter(|segment| !segment.is_empty())
                .skip(depth)
                .collect();
            self.path = format!("/{}", rest.join("/"));
        }
        self
    }

    /// Milliseconds since the Unix epoch when the context was built.
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    pub fn client_ip(&self) -> &str {
        &self.client_ip
    }

    /// Path relative to the router the endpoint is mounted in.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Raw body bytes. Only present for upload endpoints.
    pub fn raw_body(&self) -> Option<&Bytes> {
        self.raw_body.as_ref()
    }

    /// Query parameters for GET, the JSON body otherwise.
    pub fn parsed_body(&self) -> &Map<String, Value> {
        &self.parsed_body
    }

    /// Look up a single key in the parsed body.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.parsed_body.get(key)
    }

    /// A path parameter captured by the route pattern.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    pub fn params(&self) -> &HashMap<String, String> {
        &self.params
    }

    pub fn cookies(&self) -> &HashMap<String, String> {
        &self.cookies
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn host_name(&self) -> &str {
        &self.host_name
    }

    /// The URL as the client sent it, including any mount prefix and query.
    pub fn full_url(&self) -> &str {
        &self.full_url
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    pub fn protocol_str(&self) -> &'static str {
        self.protocol.as_str()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        header_str(&self.headers, name)
    }

    /// Attach the session. Fails if a session is already attached.
    pub fn set_session<T: Any + Send + Sync>(&mut self, session: T) -> ServerResult<()> {
        if self.session.is_some() {
            return Err(ServerError::internal("request session already set"));
        }
        self.session = Some(Arc::new(session));
        Ok(())
    }

    /// Read the session as `T`. `None` if unset or of another type.
    pub fn session<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.session.as_deref().and_then(|s| s.downcast_ref::<T>())
    }

    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }
}

impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("client_ip", &self.client_ip)
            .field("protocol", &self.protocol)
            .field("request_id", &self.request_id)
            .field("has_session", &self.session.is_some())
            .finish_non_exhaustive()
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn host_name(parts: &Parts) -> String {
    let host = header_str(&parts.headers, header::HOST.as_str())
        .map(str::to_string)
        .or_else(|| parts.uri.host().map(str::to_string))
        .unwrap_or_default();

    // Strip the port, keeping bracketed IPv6 literals intact.
    if host.starts_with('[') {
        return match host.find(']') {
            Some(end) => host[..=end].to_string(),
            None => host,
        };
    }
    match host.rsplit_once(':') {
        Some((name, port)) if port.chars().all(|c| c.is_ascii_digit()) => name.to_string(),
        _ => host,
    }
}

fn protocol(parts: &Parts) -> Protocol {
    let base = header_str(&parts.headers, "x-forwarded-proto")
        .and_then(|v| v.split(',').next())
        .map(|v| Protocol::from_scheme(v.trim()))
        .or_else(|| parts.uri.scheme_str().map(Protocol::from_scheme))
        .unwrap_or(Protocol::Http);

    let upgrade = header_str(&parts.headers, header::UPGRADE.as_str())
        .is_some_and(|v| v.eq_ignore_ascii_case("websocket"));
    if upgrade {
        base.upgraded()
    } else {
        base
    }
}
