//! Endpoint routing, validation and error normalization over axum.
//!
//! ```text
//!     Client Request
//!         → http/server.rs (request ID, tracing, 404 fallback)
//!         → routing/router.rs (compiled method + path table)
//!         → routing/pipeline.rs
//!               content-type gate → body read → RequestContext
//!               → auth injector → validator → middleware → handler
//!         → http/response.rs
//!     Client Response                         post-process hook (after)
//!
//!     any failure → error/translator.rs → JSON envelope + ErrorReport → observer
//! ```

pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod routing;
pub mod validation;

pub use config::ServerConfig;
pub use error::{DomainError, ErrorKind, ErrorOrigin, HttpError, ServerError, ServerResult};
pub use http::{Mime, RequestContext, Response, Server};
pub use lifecycle::Shutdown;
pub use routing::{Endpoint, Method, Pipeline, Router, UploadPolicy};
pub use validation::{JsonType, ParameterSchema, Validator};
