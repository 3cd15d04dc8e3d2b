//! Endpoint descriptors.
//!
//! # Design Decisions
//! - Paths are normalized once, at construction
//! - `:name` / `*name` segments are rewritten to the transport's `{name}` / `{*name}`
//! - The body parsing mode is a function of the upload policy alone

use axum::http;
use axum::routing::MethodFilter;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::error::ServerResult;
use crate::http::{Mime, RequestContext, Response};
use crate::routing::handler::{Handler, PostProcess};
use crate::validation::Validator;

/// Verbs an endpoint can be registered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Options,
}

/// Verb → transport registration filter.
const VERB_TABLE: [(Method, MethodFilter, &str); 5] = [
    (Method::Get, MethodFilter::GET, "GET"),
    (Method::Post, MethodFilter::POST, "POST"),
    (Method::Put, MethodFilter::PUT, "PUT"),
    (Method::Delete, MethodFilter::DELETE, "DELETE"),
    (Method::Options, MethodFilter::OPTIONS, "OPTIONS"),
];

impl Method {
    /// Map a transport method. Verbs outside the table map to GET.
    pub fn from_http(method: &http::Method) -> Self {
        VERB_TABLE
            .iter()
            .find(|(_, _, name)| *name == method.as_str())
            .map(|(verb, _, _)| *verb)
            .unwrap_or(Method::Get)
    }

    pub fn filter(self) -> MethodFilter {
        VERB_TABLE
            .iter()
            .find(|(verb, _, _)| *verb == self)
            .map(|(_, filter, _)| *filter)
            .unwrap_or(MethodFilter::GET)
    }

    pub fn as_str(self) -> &'static str {
        VERB_TABLE
            .iter()
            .find(|(verb, _, _)| *verb == self)
            .map(|(_, _, name)| *name)
            .unwrap_or("GET")
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Constraints for raw-body upload endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadPolicy {
    allowed: Mime,
    max_bytes: Option<usize>,
}

impl UploadPolicy {
    pub fn new(allowed: Mime, max_bytes: usize) -> Self {
        Self {
            allowed,
            max_bytes: Some(max_bytes),
        }
    }

    /// Accept anything, up to the configured default upload size.
    pub fn any() -> Self {
        Self::of_type(Mime::any())
    }

    /// Accept `allowed`, up to the configured default upload size.
    pub fn of_type(allowed: Mime) -> Self {
        Self {
            allowed,
            max_bytes: None,
        }
    }

    pub fn allowed(&self) -> &Mime {
        &self.allowed
    }

    /// Explicit limit, if one was set.
    pub fn max_bytes(&self) -> Option<usize> {
        self.max_bytes
    }
}

/// How an endpoint reads its body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyMode<'a> {
    Json,
    Raw(&'a UploadPolicy),
}

/// Normalize a route path or mount prefix.
///
/// Always exactly one leading `/`, no trailing `/` except for the root.
pub fn normalize_path(path: &str) -> String {
    let trimmed = path.trim().trim_matches('/');
    if trimmed.is_empty() {
        return "/".to_string();
    }

    let segments: Vec<String> = trimmed
        .split('/')
        .map(|segment| {
            if let Some(name) = segment.strip_prefix(':') {
                format!("{{{}}}", name)
            } else if let Some(name) = segment.strip_prefix('*') {
                format!("{{*{}}}", name)
            } else {
                segment.to_string()
            }
        })
        .collect();

    format!("/{}", segments.join("/"))
}

/// Join a normalized prefix and a normalized path.
pub(crate) fn join_paths(prefix: &str, path: &str) -> String {
    match (prefix, path) {
        ("/", path) => path.to_string(),
        (prefix, "/") => prefix.to_string(),
        (prefix, path) => format!("{}{}", prefix, path),
    }
}

/// One method + path + handler binding.
#[derive(Clone)]
pub struct Endpoint {
    method: Method,
    path: String,
    handler: Arc<dyn Handler>,
    validator: Option<Validator>,
    post_process: Option<Arc<dyn PostProcess>>,
    upload: Option<UploadPolicy>,
}

impl Endpoint {
    pub fn new<F, Fut>(method: Method, path: impl AsRef<str>, handler: F) -> Self
    where
        F: Fn(Arc<RequestContext>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ServerResult<Response>> + Send + 'static,
    {
        Self::from_handler(method, path, handler)
    }

    /// Build from any `Handler` implementation.
    pub fn from_handler(method: Method, path: impl AsRef<str>, handler: impl Handler) -> Self {
        Self {
            method,
            path: normalize_path(path.as_ref()),
            handler: Arc::new(handler),
            validator: None,
            post_process: None,
            upload: None,
        }
    }

    pub fn get<F, Fut>(path: impl AsRef<str>, handler: F) -> Self
    where
        F: Fn(Arc<RequestContext>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ServerResult<Response>> + Send + 'static,
    {
        Self::new(Method::Get, path, handler)
    }

    pub fn post<F, Fut>(path: impl AsRef<str>, handler: F) -> Self
    where
        F: Fn(Arc<RequestContext>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ServerResult<Response>> + Send + 'static,
    {
        Self::new(Method::Post, path, handler)
    }

    pub fn put<F, Fut>(path: impl AsRef<str>, handler: F) -> Self
    where
        F: Fn(Arc<RequestContext>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ServerResult<Response>> + Send + 'static,
    {
        Self::new(Method::Put, path, handler)
    }

    pub fn delete<F, Fut>(path: impl AsRef<str>, handler: F) -> Self
    where
        F: Fn(Arc<RequestContext>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ServerResult<Response>> + Send + 'static,
    {
        Self::new(Method::Delete, path, handler)
    }

    pub fn options<F, Fut>(path: impl AsRef<str>, handler: F) -> Self
    where
        F: Fn(Arc<RequestContext>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ServerResult<Response>> + Send + 'static,
    {
        Self::new(Method::Options, path, handler)
    }

    pub fn validator(mut self, validator: Validator) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn post_process<F, Fut>(self, hook: F) -> Self
    where
        F: Fn(Arc<RequestContext>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ServerResult<()>> + Send + 'static,
    {
        self.with_post_process(hook)
    }

    pub fn with_post_process(mut self, hook: impl PostProcess) -> Self {
        self.post_process = Some(Arc::new(hook));
        self
    }

    /// Switch the endpoint to raw-body mode.
    pub fn upload(mut self, policy: UploadPolicy) -> Self {
        self.upload = Some(policy);
        self
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn handler(&self) -> &Arc<dyn Handler> {
        &self.handler
    }

    pub fn get_validator(&self) -> Option<&Validator> {
        self.validator.as_ref()
    }

    pub fn get_post_process(&self) -> Option<&Arc<dyn PostProcess>> {
        self.post_process.as_ref()
    }

    pub fn upload_policy(&self) -> Option<&UploadPolicy> {
        self.upload.as_ref()
    }

    pub fn body_mode(&self) -> BodyMode<'_> {
        match &self.upload {
            Some(policy) => BodyMode::Raw(policy),
            None => BodyMode::Json,
        }
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("validator", &self.validator)
            .field("post_process", &self.post_process.is_some())
            .field("upload", &self.upload)
            .finish()
    }
}
