//! Request body, query and cookie readers.
//!
//! # Responsibilities
//! - Read raw bytes bounded by a byte limit
//! - Read a JSON object body bounded by a byte limit
//! - Decode query strings and `Cookie` headers into maps
//!
//! # Design Decisions
//! - Reader failures are `TransportError`s; the translator classifies them by text
//! - A declared `Content-Length` over the limit is rejected before reading
//! - JSON is only parsed when the request says it is JSON; otherwise the body is empty

use axum::body::{self, Body, Bytes};
use axum::http::{header, HeaderMap};
use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::error::TransportError;
use crate::http::mime::Mime;

fn declared_length(headers: &HeaderMap) -> Option<usize> {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

fn is_length_limit(error: &(dyn std::error::Error + 'static)) -> bool {
    let mut next = Some(error);
    while let Some(err) = next {
        if err.to_string().contains("length limit exceeded") {
            return true;
        }
        next = err.source();
    }
    false
}

/// Read the whole body, failing with "request entity too large" past `limit`.
pub async fn read_bytes(body: Body, headers: &HeaderMap, limit: usize) -> Result<Bytes, TransportError> {
    if declared_length(headers).is_some_and(|len| len > limit) {
        return Err(TransportError::entity_too_large());
    }

    body::to_bytes(body, limit).await.map_err(|e| {
        if is_length_limit(&e) {
            TransportError::entity_too_large()
        } else {
            TransportError::new(format!("failed to read request body: {}", e))
        }
    })
}

/// Read a JSON object body.
///
/// Returns `None` when the request carries no JSON (wrong content type or empty body).
pub async fn read_json(
    body: Body,
    headers: &HeaderMap,
    limit: usize,
) -> Result<Option<Map<String, Value>>, TransportError> {
    let is_json = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| Mime::json().allows(ct));
    if !is_json {
        return Ok(None);
    }

    let bytes = read_bytes(body, headers, limit).await?;
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }

    match serde_json::from_slice::<Value>(&bytes) {
        Ok(Value::Object(map)) => Ok(Some(map)),
        Ok(_) => Err(TransportError::new("JSON body must be an object")),
        Err(e) => Err(TransportError::new(format!("invalid JSON: {}", e))),
    }
}

/// Decode a query string. Repeated keys become arrays.
pub fn parse_query(query: Option<&str>) -> Map<String, Value> {
    let mut params = Map::new();
    let Some(query) = query else {
        return params;
    };

    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        let value = Value::String(value.into_owned());
        match params.get_mut(key.as_ref()) {
            Some(Value::Array(values)) => values.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                params.insert(key.into_owned(), value);
            }
        }
    }
    params
}

/// Parse every `Cookie` header into a name → value map.
pub fn parse_cookies(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|line| line.split(';'))
        .filter_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            let value = value.trim().trim_matches('"');
            Some((name.to_string(), value.to_string()))
        })
        .collect()
}
