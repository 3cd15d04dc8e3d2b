//! Error-to-HTTP translation.
//!
//! # Responsibilities
//! - Classify a `ServerError` into exactly one translation
//! - Build the JSON error envelope and status code
//! - Log the true message server-side
//! - Produce an `ErrorReport` for the error observer
//!
//! # Design Decisions
//! - Domain errors → 400 with origin/type pair
//! - Message+status errors → their own status, message hidden unless shown
//! - Transport errors are matched on message text
//! - Everything else → 500 with a generic message

use axum::http::StatusCode;
use serde_json::{json, Value};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::taxonomy::{
    DomainError, ErrorClass, ErrorKind, ErrorOrigin, HttpError, ServerError, TransportError,
    GENERIC_INTERNAL_MESSAGE,
};

/// What the error observer receives for every translated error.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    /// Status code the client received (or would have received).
    pub status: StatusCode,
    pub class: ErrorClass,
    /// Present when the error was, or was converted to, a domain error.
    pub domain: Option<DomainError>,
    /// The unobfuscated message.
    pub message: String,
    /// Milliseconds since the Unix epoch.
    pub time_stamp: u64,
}

/// A fully translated error, ready to be written.
#[derive(Debug, Clone)]
pub struct Translation {
    pub status: StatusCode,
    pub body: Value,
    pub report: ErrorReport,
}

pub(crate) fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// Translate an error into a status, a JSON envelope and a report.
pub fn translate(error: &ServerError) -> Translation {
    match error {
        ServerError::Domain(domain) => translate_domain(domain.clone(), domain.kind().class()),
        ServerError::Http(http) => translate_http(http),
        ServerError::Transport(transport) => translate_transport(transport),
        ServerError::Internal(inner) => translate_internal(&inner.to_string(), Some(inner.as_ref())),
    }
}

fn translate_domain(domain: DomainError, class: ErrorClass) -> Translation {
    let time_stamp = unix_millis();
    tracing::warn!(
        origin = domain.origin().readable(),
        kind = domain.kind().readable(),
        message = %domain.message(),
        "Request failed with domain error"
    );

    let body = json!({
        "error": domain.message(),
        "origin": {
            "value": domain.origin().value(),
            "readable": domain.origin().readable(),
        },
        "type": {
            "value": domain.kind().value(),
            "readable": domain.kind().readable(),
        },
        "timeStamp": time_stamp,
    });

    Translation {
        status: StatusCode::BAD_REQUEST,
        body,
        report: ErrorReport {
            status: StatusCode::BAD_REQUEST,
            class,
            message: domain.message().to_string(),
            domain: Some(domain),
            time_stamp,
        },
    }
}

fn translate_http(error: &HttpError) -> Translation {
    if error.status().is_server_error() {
        tracing::error!(status = %error.status(), message = %error.message(), "Request failed");
    } else {
        tracing::warn!(status = %error.status(), message = %error.message(), "Request failed");
    }

    Translation {
        status: error.status(),
        body: json!({ "error": error.client_message() }),
        report: ErrorReport {
            status: error.status(),
            class: ErrorClass::Status,
            domain: None,
            message: error.message().to_string(),
            time_stamp: unix_millis(),
        },
    }
}

fn translate_transport(error: &TransportError) -> Translation {
    let message = error.message();

    if message == TransportError::ENTITY_TOO_LARGE {
        let domain = DomainError::user(
            ErrorKind::FileTooLarge,
            "The file you tried to upload is too large.",
        );
        return translate_domain(domain, ErrorClass::TransportParse);
    }

    if message.contains("JSON") {
        tracing::debug!(message = %message, "Rejecting malformed JSON body");
        let domain = DomainError::user(
            ErrorKind::FailedToParseJson,
            "The JSON you supplied was not valid.",
        );
        return translate_domain(domain, ErrorClass::TransportParse);
    }

    translate_internal(message, None)
}

fn translate_internal(
    message: &str,
    source: Option<&(dyn std::error::Error + Send + Sync)>,
) -> Translation {
    let time_stamp = unix_millis();

    let mut chain = Vec::new();
    let mut next = source.and_then(|e| e.source());
    while let Some(cause) = next {
        chain.push(cause.to_string());
        next = cause.source();
    }
    tracing::error!(message = %message, causes = ?chain, "Internal error while handling request");

    Translation {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        body: json!({
            "error": GENERIC_INTERNAL_MESSAGE,
            "timeStamp": time_stamp,
        }),
        report: ErrorReport {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            class: ErrorClass::Internal,
            domain: Some(DomainError::new(
                ErrorOrigin::Unhandled,
                ErrorKind::InternalUnhandled,
                message,
            )),
            message: message.to_string(),
            time_stamp,
        },
    }
}
