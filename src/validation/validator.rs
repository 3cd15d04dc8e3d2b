//! Pre-handler validation.
//!
//! # Responsibilities
//! - Run the structural type check against the parsed body
//! - Run the authorization check against the whole context
//! - Turn type violations into a failure response
//!
//! # Design Decisions
//! - Type check always runs before the auth check
//! - Structural failures are *returned* as a response; authorization failures
//!   may either return a response or raise an error
//! - A missing check always passes

use axum::http::StatusCode;
use futures_util::future::BoxFuture;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::error::ServerResult;
use crate::http::{RequestContext, Response};

/// Default status for type-check failures.
pub const DEFAULT_FAILURE_STATUS: StatusCode = StatusCode::NOT_ACCEPTABLE;

/// One structural problem found in a body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    pub field: String,
    pub expected: String,
    pub found: String,
}

/// A structural check against the parsed body.
pub trait TypeCheck: Send + Sync + 'static {
    /// Return every violation found, or `Ok(())`.
    fn check(&self, body: &Map<String, Value>) -> Result<(), Vec<Violation>>;
}

/// An authorization check against the request context.
///
/// `Ok(None)` passes, `Ok(Some(response))` rejects with that response,
/// `Err(_)` is translated like any other pipeline error.
pub trait AuthCheck: Send + Sync + 'static {
    fn verify(&self, ctx: Arc<RequestContext>) -> BoxFuture<'static, ServerResult<Option<Response>>>;
}

impl<F, Fut> AuthCheck for F
where
    F: Fn(Arc<RequestContext>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ServerResult<Option<Response>>> + Send + 'static,
{
    fn verify(&self, ctx: Arc<RequestContext>) -> BoxFuture<'static, ServerResult<Option<Response>>> {
        Box::pin(self(ctx))
    }
}

/// Optional type check plus optional auth check.
#[derive(Clone, Default)]
pub struct Validator {
    type_check: Option<Arc<dyn TypeCheck>>,
    auth_check: Option<Arc<dyn AuthCheck>>,
    failure_status: Option<StatusCode>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    /// A validator with only an ad-hoc authorization function.
    pub fn from_auth<F, Fut>(check: F) -> Self
    where
        F: Fn(Arc<RequestContext>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ServerResult<Option<Response>>> + Send + 'static,
    {
        Self::new().with_auth_check(check)
    }

    /// A validator with only a type check.
    pub fn from_type_check(check: impl TypeCheck) -> Self {
        Self::new().with_type_check(check)
    }

    pub fn with_type_check(mut self, check: impl TypeCheck) -> Self {
        self.type_check = Some(Arc::new(check));
        self
    }

    pub fn with_auth_check(mut self, check: impl AuthCheck) -> Self {
        self.auth_check = Some(Arc::new(check));
        self
    }

    /// Status used when the type check fails. Overrides the pipeline default.
    pub fn failure_status(mut self, status: u16) -> Self {
        self.failure_status = StatusCode::from_u16(status).ok();
        self
    }

    pub fn has_type_check(&self) -> bool {
        self.type_check.is_some()
    }

    pub fn has_auth_check(&self) -> bool {
        self.auth_check.is_some()
    }

    /// Run both checks. `Ok(Some(_))` is a rejection response to send as-is.
    pub async fn validate(
        &self,
        ctx: &Arc<RequestContext>,
        default_status: StatusCode,
    ) -> ServerResult<Option<Response>> {
        if let Some(check) = &self.type_check {
            if let Err(violations) = check.check(ctx.parsed_body()) {
                tracing::debug!(
                    path = %ctx.path(),
                    violations = violations.len(),
                    "Request body failed type check"
                );
                let status = self.failure_status.unwrap_or(default_status);
                return Ok(Some(
                    Response::json(json!({ "errors": violations })).status(status.as_u16()),
                ));
            }
        }

        if let Some(check) = &self.auth_check {
            return check.verify(Arc::clone(ctx)).await;
        }

        Ok(None)
    }
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Validator")
            .field("type_check", &self.type_check.is_some())
            .field("auth_check", &self.auth_check.is_some())
            .field("failure_status", &self.failure_status)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DomainError, ServerError};
    use crate::http::request::BodyPayload;
    use crate::validation::{JsonType, ParameterSchema};
    use axum::http::Request;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn ctx(body: Value) -> Arc<RequestContext> {
        let (parts, _) = Request::post("/").body(()).unwrap().into_parts();
        let map = match body {
            Value::Object(map) => Some(map),
            _ => None,
        };
        Arc::new(RequestContext::from_parts(&parts, BodyPayload::Json(map), HashMap::new()))
    }

    #[tokio::test]
    async fn test_empty_validator_passes() {
        let result = Validator::new()
            .validate(&ctx(json!({})), DEFAULT_FAILURE_STATUS)
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_type_failure_short_circuits_auth() {
        let auth_ran = Arc::new(AtomicBool::new(false));
        let flag = auth_ran.clone();
        let validator = Validator::from_type_check(ParameterSchema::new().field("name", JsonType::String))
            .with_auth_check(move |_ctx: Arc<RequestContext>| {
                let flag = flag.clone();
                async move {
                    flag.store(true, Ordering::SeqCst);
                    Ok(None)
                }
            });

        let rejection = validator
            .validate(&ctx(json!({})), DEFAULT_FAILURE_STATUS)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(rejection.get_status(), StatusCode::NOT_ACCEPTABLE);
        assert!(!auth_ran.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_custom_failure_status() {
        let validator = Validator::from_type_check(ParameterSchema::new().field("n", JsonType::Number))
            .failure_status(422);
        let rejection = validator
            .validate(&ctx(json!({"n": "x"})), DEFAULT_FAILURE_STATUS)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(rejection.get_status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_auth_outcomes() {
        let deny = Validator::from_auth(|_ctx| async {
            Err(DomainError::permission_denied("thing").into())
        });
        let err = deny
            .validate(&ctx(json!({})), DEFAULT_FAILURE_STATUS)
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::Domain(_)));

        let reject = Validator::from_auth(|_ctx| async {
            Ok(Some(Response::json(json!({"why": "nope"})).status(401)))
        });
        let response = reject
            .validate(&ctx(json!({})), DEFAULT_FAILURE_STATUS)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(response.get_status(), StatusCode::UNAUTHORIZED);
    }
}
