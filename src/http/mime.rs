//! MIME types and wildcard patterns.
//!
//! # Design Decisions
//! - Comparison is case-insensitive
//! - Parameters (`; charset=utf-8`) are ignored when matching
//! - `*` is allowed in either the type or subtype position of a pattern

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error returned when a MIME string is not `type/subtype`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid MIME type: '{0}'")]
pub struct MimeParseError(pub String);

/// A `type/subtype` pair, possibly containing wildcards.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Mime {
    top: String,
    sub: String,
}

impl Mime {
    pub fn new(top: impl Into<String>, sub: impl Into<String>) -> Self {
        Self {
            top: top.into().to_ascii_lowercase(),
            sub: sub.into().to_ascii_lowercase(),
        }
    }

    /// `*/*`
    pub fn any() -> Self {
        Self::new("*", "*")
    }

    /// `application/json`
    pub fn json() -> Self {
        Self::new("application", "json")
    }

    /// `application/octet-stream`
    pub fn octet_stream() -> Self {
        Self::new("application", "octet-stream")
    }

    pub fn top(&self) -> &str {
        &self.top
    }

    pub fn sub(&self) -> &str {
        &self.sub
    }

    /// Whether a `Content-Type` header value is allowed by this pattern.
    pub fn allows(&self, content_type: &str) -> bool {
        let candidate = match content_type.parse::<Mime>() {
            Ok(m) => m,
            Err(_) => return false,
        };
        (self.top == "*" || self.top == candidate.top)
            && (self.sub == "*" || self.sub == candidate.sub)
    }

    /// File extension used in `Content-Disposition` hints.
    pub fn extension(&self) -> &str {
        match self.sub.as_str() {
            "jpeg" => "jpg",
            "plain" => "txt",
            "octet-stream" => "bin",
            "svg+xml" => "svg",
            "javascript" => "js",
            "*" => "bin",
            sub => sub.split('+').next().unwrap_or(sub),
        }
    }
}

impl FromStr for Mime {
    type Err = MimeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let essence = s.split(';').next().unwrap_or_default().trim();
        let (top, sub) = essence
            .split_once('/')
            .ok_or_else(|| MimeParseError(s.to_string()))?;
        let (top, sub) = (top.trim(), sub.trim());
        if top.is_empty() || sub.is_empty() || sub.contains('/') {
            return Err(MimeParseError(s.to_string()));
        }
        Ok(Self::new(top, sub))
    }
}

impl fmt::Display for Mime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.top, self.sub)
    }
}
