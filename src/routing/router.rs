//! Router tree and compilation.
//!
//! # Responsibilities
//! - Hold an ordered list of endpoints
//! - Mount child routers under normalized prefixes
//! - Compile the tree into an `axum::Router` wired to the dispatch pipeline
//!
//! # Design Decisions
//! - Children are owned; mounting consumes the child, so cycles cannot be built
//! - Mounting the same prefix twice replaces the earlier child
//! - Duplicate method+path pairs anywhere in the tree are a compile error
//! - The tree is flattened into one route table; mounts are a naming device only
//! - Compilation does not mutate the router and may be repeated

use axum::extract::Request;
use axum::routing::MethodRouter;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;

use crate::routing::endpoint::{join_paths, normalize_path, Endpoint, Method};
use crate::routing::pipeline::{EndpointDispatch, Pipeline};

/// Errors raised while compiling a router tree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error("duplicate endpoint {method} {path}")]
    DuplicateEndpoint { method: Method, path: String },

    #[error("invalid route path '{path}': {reason}")]
    InvalidPath { path: String, reason: &'static str },

    #[error("route '{path}' conflicts with '{existing}'")]
    ConflictingParameters { path: String, existing: String },
}

/// A node in the routing tree.
#[derive(Debug, Default, Clone)]
pub struct Router {
    endpoints: Vec<Arc<Endpoint>>,
    mounts: Vec<(String, Router)>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an endpoint.
    pub fn add_endpoint(&mut self, endpoint: Endpoint) -> &mut Self {
        self.endpoints.push(Arc::new(endpoint));
        self
    }

    /// Builder form of [`Router::add_endpoint`].
    pub fn endpoint(mut self, endpoint: Endpoint) -> Self {
        self.add_endpoint(endpoint);
        self
    }

    /// Mount a child under `prefix`. `"api"`, `"/api"` and `"api/"` are the same prefix.
    pub fn mount(&mut self, prefix: &str, child: Router) -> &mut Self {
        let prefix = normalize_path(prefix);
        match self.mounts.iter_mut().find(|(existing, _)| *existing == prefix) {
            Some((_, slot)) => *slot = child,
            None => self.mounts.push((prefix, child)),
        }
        self
    }

    /// Builder form of [`Router::mount`].
    pub fn nest(mut self, prefix: &str, child: Router) -> Self {
        self.mount(prefix, child);
        self
    }

    pub fn endpoints(&self) -> impl Iterator<Item = &Endpoint> {
        self.endpoints.iter().map(Arc::as_ref)
    }

    pub fn mounts(&self) -> impl Iterator<Item = (&str, &Router)> {
        self.mounts.iter().map(|(prefix, router)| (prefix.as_str(), router))
    }

    /// Every method+path pair `compile` would register, fully prefixed.
    pub fn registrations(&self) -> Vec<(Method, String)> {
        let mut out = Vec::new();
        self.collect_registrations("/", &mut out);
        out
    }

    fn collect_registrations(&self, base: &str, out: &mut Vec<(Method, String)>) {
        for endpoint in &self.endpoints {
            out.push((endpoint.method(), join_paths(base, endpoint.path())));
        }
        for (prefix, child) in &self.mounts {
            child.collect_registrations(&join_paths(base, prefix), out);
        }
    }

    /// Compile the tree into a transport router. Call once per server.
    pub fn compile(&self, pipeline: &Arc<Pipeline>) -> Result<axum::Router, CompileError> {
        let registrations = self.registrations();
        let mut seen = HashSet::new();
        let mut slots = HashMap::new();
        for (method, path) in &registrations {
            validate_pattern(path)?;
            check_parameter_slots(path, &mut slots)?;
            if !seen.insert((*method, path.as_str())) {
                return Err(CompileError::DuplicateEndpoint {
                    method: *method,
                    path: path.clone(),
                });
            }
        }

        let mut table = BTreeMap::new();
        self.collect_routes("/", pipeline, &mut table);
        let router = table
            .into_iter()
            .fold(axum::Router::new(), |router, (path, method_router)| router.route(&path, method_router));
        tracing::info!(
            endpoints = registrations.len(),
            middleware = pipeline.middleware_count(),
            "Router compiled"
        );
        Ok(router)
    }

    fn collect_routes(&self, base: &str, pipeline: &Arc<Pipeline>, table: &mut BTreeMap<String, MethodRouter>) {
        let mount_depth = segment_count(base);

        for endpoint in &self.endpoints {
            let route = join_paths(base, endpoint.path());
            tracing::debug!(method = %endpoint.method(), route = %route, "Registering endpoint");

            let dispatch = EndpointDispatch::new(
                Arc::clone(endpoint),
                Arc::clone(pipeline),
                route.clone(),
                mount_depth,
            );
            let handler = move |request: Request| dispatch.clone().dispatch(request);

            let method_router = table.remove(&route).unwrap_or_else(MethodRouter::new);
            table.insert(route, method_router.on(endpoint.method().filter(), handler));
        }

        for (prefix, child) in &self.mounts {
            child.collect_routes(&join_paths(base, prefix), pipeline, table);
        }
    }
}

fn segment_count(path: &str) -> usize {
    path.split('/').filter(|segment| !segment.is_empty()).count()
}

/// The pattern with parameter names erased.
fn shape_of(path: &str) -> String {
    path.split('/')
        .map(|segment| match segment.strip_prefix("{*") {
            Some(_) => "{*}",
            None if segment.starts_with('{') => "{}",
            None => segment,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Every parameter position reachable through the same prefix must hold the same
/// segment: one name, and never a named parameter beside a wildcard.
fn check_parameter_slots<'a>(
    path: &'a str,
    slots: &mut HashMap<String, (&'a str, &'a str)>,
) -> Result<(), CompileError> {
    let segments: Vec<&str> = path.split('/').collect();
    for (i, segment) in segments.iter().enumerate() {
        if !segment.starts_with('{') {
            continue;
        }
        let prefix = shape_of(&segments[..i].join("/"));
        let (existing_segment, existing_path) = *slots.entry(prefix).or_insert((*segment, path));
        if existing_segment != *segment {
            return Err(CompileError::ConflictingParameters {
                path: path.to_string(),
                existing: existing_path.to_string(),
            });
        }
    }
    Ok(())
}

/// Reject patterns the transport would refuse to register.
fn validate_pattern(path: &str) -> Result<(), CompileError> {
    let invalid = |reason| CompileError::InvalidPath {
        path: path.to_string(),
        reason,
    };

    if path == "/" {
        return Ok(());
    }
    let segments: Vec<&str> = path.trim_start_matches('/').split('/').collect();
    let last = segments.len() - 1;
    for (i, segment) in segments.iter().enumerate() {
        if segment.is_empty() {
            return Err(invalid("empty path segment"));
        }
        let opens = segment.matches('{').count();
        let closes = segment.matches('}').count();
        if opens == 0 && closes == 0 {
            continue;
        }
        if opens != 1 || closes != 1 || !segment.starts_with('{') || !segment.ends_with('}') {
            return Err(invalid("parameters must occupy a whole segment"));
        }
        let name = &segment[1..segment.len() - 1];
        let (wildcard, name) = match name.strip_prefix('*') {
            Some(rest) => (true, rest),
            None => (false, name),
        };
        if name.is_empty() {
            return Err(invalid("parameter without a name"));
        }
        if wildcard && i != last {
            return Err(invalid("wildcard must be the last segment"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServerResult;
    use crate::http::{RequestContext, Response};

    async fn ok(_ctx: Arc<RequestContext>) -> ServerResult<Response> {
        Ok(Response::empty())
    }

    fn sorted(mut v: Vec<(Method, String)>) -> Vec<(Method, String)> {
        v.sort();
        v
    }

    #[test]
    fn test_mount_prefix_equivalence() {
        let leaf = || Router::new().endpoint(Endpoint::get("x", ok));

        let a = Router::new().nest("a", leaf());
        let b = Router::new().nest("/a", leaf());
        let c = Router::new().nest("a/", leaf());

        assert_eq!(a.registrations(), vec![(Method::Get, "/a/x".to_string())]);
        assert_eq!(a.registrations(), b.registrations());
        assert_eq!(b.registrations(), c.registrations());
    }

    #[test]
    fn test_nesting_depth_is_transparent() {
        let flat = Router::new()
            .endpoint(Endpoint::get("/v1/users", ok))
            .endpoint(Endpoint::post("/v1/users/:id", ok));

        let deep = Router::new().nest(
            "v1",
            Router::new().nest(
                "users",
                Router::new()
                    .endpoint(Endpoint::get("/", ok))
                    .endpoint(Endpoint::post(":id", ok)),
            ),
        );

        assert_eq!(sorted(flat.registrations()), sorted(deep.registrations()));
    }

    #[test]
    fn test_remount_replaces_child() {
        let mut root = Router::new();
        root.mount("api", Router::new().endpoint(Endpoint::get("old", ok)));
        root.mount("/api/", Router::new().endpoint(Endpoint::get("new", ok)));

        assert_eq!(root.mounts().count(), 1);
        assert_eq!(root.registrations(), vec![(Method::Get, "/api/new".to_string())]);
    }

    #[test]
    fn test_duplicate_endpoint_rejected() {
        let root = Router::new()
            .endpoint(Endpoint::get("/a/b", ok))
            .nest("a", Router::new().endpoint(Endpoint::get("b", ok)));

        let err = root.compile(&Pipeline::empty()).unwrap_err();
        assert_eq!(
            err,
            CompileError::DuplicateEndpoint {
                method: Method::Get,
                path: "/a/b".into()
            }
        );
    }

    #[test]
    fn test_same_path_different_methods_compile() {
        let root = Router::new()
            .endpoint(Endpoint::get("/items", ok))
            .endpoint(Endpoint::post("/items", ok))
            .nest("/", Router::new().endpoint(Endpoint::delete("/items", ok)));
        assert!(root.compile(&Pipeline::empty()).is_ok());
    }

    #[test]
    fn test_conflicting_parameter_names_rejected() {
        let root = Router::new()
            .endpoint(Endpoint::get("/users/:id", ok))
            .endpoint(Endpoint::delete("/users/:name", ok));

        let err = root.compile(&Pipeline::empty()).unwrap_err();
        assert!(matches!(err, CompileError::ConflictingParameters { .. }));
        assert_eq!(shape_of("/users/{id}/files/{*rest}"), "/users/{}/files/{*}");
    }

    #[test]
    fn test_parameter_beside_wildcard_rejected() {
        let root = Router::new()
            .endpoint(Endpoint::get("/a/:id", ok))
            .endpoint(Endpoint::get("/a/*rest", ok));

        let err = root.compile(&Pipeline::empty()).unwrap_err();
        assert_eq!(
            err,
            CompileError::ConflictingParameters {
                path: "/a/{*rest}".into(),
                existing: "/a/{id}".into()
            }
        );
    }

    #[test]
    fn test_parameter_names_must_agree_across_depths() {
        let root = Router::new()
            .endpoint(Endpoint::get("/users/:id", ok))
            .nest("users/:name", Router::new().endpoint(Endpoint::get("posts", ok)));

        let err = root.compile(&Pipeline::empty()).unwrap_err();
        assert!(matches!(err, CompileError::ConflictingParameters { .. }));
    }

    #[test]
    fn test_shared_parameter_slots_compile() {
        let root = Router::new()
            .endpoint(Endpoint::get("/users/:id", ok))
            .endpoint(Endpoint::delete("/users/:id", ok))
            .endpoint(Endpoint::get("/users/:id/files/*rest", ok))
            .endpoint(Endpoint::get("/users/me", ok));
        assert!(root.compile(&Pipeline::empty()).is_ok());
    }

    #[test]
    fn test_invalid_patterns() {
        assert!(validate_pattern("/a/{id}").is_ok());
        assert!(validate_pattern("/a/{*rest}").is_ok());
        assert!(validate_pattern("/a/x{id}").is_err());
        assert!(validate_pattern("/a/{}").is_err());
        assert!(validate_pattern("/{*rest}/a").is_err());
    }
}
