//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Route Compilation (at startup):
//!     Router tree (endpoints + mounted children)
//!     → router.rs: flatten, reject duplicates and bad patterns
//!     → register one transport route per method+path
//!     → each route bound to an EndpointDispatch
//!
//! Per Request:
//!     transport match
//!     → pipeline.rs: content-type gate → body read → RequestContext
//!     → auth injector → validator → middleware chain → handler
//!     → Response sent; post-process hook runs after
//!     ✗ any stage → error/translator.rs → JSON envelope
//! ```
//!
//! # Design Decisions
//! - Pipeline-wide state (middleware, injector, observer, limits) is an immutable `Arc<Pipeline>`
//! - Endpoints are immutable once compiled
//! - Failures never escape as transport-level 500s; panics are caught and translated

pub mod endpoint;
pub mod handler;
pub mod pipeline;
pub mod router;

pub use endpoint::{normalize_path, BodyMode, Endpoint, Method, UploadPolicy};
pub use handler::{AuthInjector, ErrorObserver, Handler, Middleware, PostProcess};
pub use pipeline::{Pipeline, PipelineBuilder, DEFAULT_JSON_LIMIT, DEFAULT_POWERED_BY, DEFAULT_UPLOAD_LIMIT};
pub use router::{CompileError, Router};
