//! Response descriptors produced by handlers and validators.
//!
//! # Responsibilities
//! - Carry payload, status, content type, file name and extra headers
//! - Write themselves onto an HTTP response (JSON or raw bytes)
//!
//! # Design Decisions
//! - A response is raw iff the handler supplied a content type
//! - Extra headers are applied first; the raw path then overrides
//!   `Content-Type`, `Content-Disposition` and `Content-Length`
//! - The identifying header is stamped on every response

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderName, HeaderValue, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;
use serde_json::Value;

use crate::http::mime::Mime;

/// Name of the identifying header added to every response.
pub const X_POWERED_BY: HeaderName = HeaderName::from_static("x-powered-by");

/// Response payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Json(Value),
    Raw(Bytes),
}

/// A value object describing what to send back.
#[derive(Debug, Clone)]
pub struct Response {
    payload: Payload,
    content_type: Option<Mime>,
    file_name: String,
    status: StatusCode,
    headers: Vec<(String, String)>,
}

impl Response {
    fn with_payload(payload: Payload, content_type: Option<Mime>) -> Self {
        Self {
            payload,
            content_type,
            file_name: uuid::Uuid::new_v4().simple().to_string(),
            status: StatusCode::OK,
            headers: Vec::new(),
        }
    }

    /// A structured response serialized as JSON.
    pub fn json(value: impl Into<Value>) -> Self {
        Self::with_payload(Payload::Json(value.into()), None)
    }

    /// Serialize any `Serialize` value into a JSON response.
    pub fn serialize<T: Serialize>(value: &T) -> Result<Self, serde_json::Error> {
        Ok(Self::json(serde_json::to_value(value)?))
    }

    /// A JSON `null` response.
    pub fn empty() -> Self {
        Self::json(Value::Null)
    }

    /// Raw bytes sent verbatim with the given content type.
    pub fn raw(bytes: impl Into<Bytes>, content_type: Mime) -> Self {
        Self::with_payload(Payload::Raw(bytes.into()), Some(content_type))
    }

    /// Set the status code. Codes outside 100..=999 are ignored.
    pub fn status(mut self, status: u16) -> Self {
        if let Ok(status) = StatusCode::from_u16(status) {
            self.status = status;
        }
        self
    }

    /// File name (without extension) used in the `Content-Disposition` hint.
    pub fn file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = name.into();
        self
    }

    /// Add an extra response header.
    pub fn header(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.headers.push((name.into(), value.to_string()));
        self
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn is_raw(&self) -> bool {
        self.content_type.is_some()
    }

    /// The content type, `application/json` unless one was supplied.
    pub fn content_type(&self) -> Mime {
        self.content_type.clone().unwrap_or_else(Mime::json)
    }

    pub fn get_file_name(&self) -> &str {
        &self.file_name
    }

    pub fn get_status(&self) -> StatusCode {
        self.status
    }

    pub fn extra_headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Write the descriptor as an HTTP response.
    pub fn into_http(self, powered_by: &HeaderValue) -> axum::response::Response {
        let mime = self.content_type();
        let mut response = match self.payload {
            Payload::Json(value) if self.content_type.is_none() => {
                (self.status, Json(value)).into_response()
            }
            Payload::Json(value) => {
                let bytes = serde_json::to_vec(&value).unwrap_or_default();
                raw_response(self.status, Bytes::from(bytes))
            }
            Payload::Raw(bytes) => raw_response(self.status, bytes),
        };

        let headers = response.headers_mut();
        for (name, value) in &self.headers {
            match (
                HeaderName::try_from(name.as_str()),
                HeaderValue::try_from(value.as_str()),
            ) {
                (Ok(name), Ok(value)) => {
                    headers.insert(name, value);
                }
                _ => tracing::warn!(header = %name, "Skipping invalid response header"),
            }
        }
        headers.insert(X_POWERED_BY, powered_by.clone());

        if self.content_type.is_some() {
            let length = headers
                .get(header::CONTENT_LENGTH)
                .cloned()
                .unwrap_or_else(|| HeaderValue::from(0));
            let disposition = format!("inline; filename={}.{}", self.file_name, mime.extension());
            if let Ok(value) = HeaderValue::try_from(mime.to_string()) {
                headers.insert(header::CONTENT_TYPE, value);
            }
            if let Ok(value) = HeaderValue::try_from(disposition) {
                headers.insert(header::CONTENT_DISPOSITION, value);
            }
            headers.insert(header::CONTENT_LENGTH, length);
        }

        response
    }
}

fn raw_response(status: StatusCode, bytes: Bytes) -> axum::response::Response {
    let length = bytes.len();
    let mut response = (status, Body::from(bytes)).into_response();
    response
        .headers_mut()
        .insert(header::CONTENT_LENGTH, HeaderValue::from(length));
    response
}

/// A JSON error body with the identifying header.
pub(crate) fn json_with_status(
    status: StatusCode,
    body: Value,
    powered_by: &HeaderValue,
) -> axum::response::Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(X_POWERED_BY, powered_by.clone());
    response
}
