//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (axum setup, request ID, tracing, 404 fallback)
//!     → [routing/pipeline.rs dispatches to an endpoint]
//!     → body.rs (bounded read, JSON / query / cookie parsing)
//!     → request.rs (RequestContext built once, read-only afterwards)
//!     → response.rs (handler Response → transport response)
//!     → Send to client
//! ```

pub mod body;
pub mod mime;
pub mod request;
pub mod response;
pub mod server;

pub use mime::{Mime, MimeParseError};
pub use request::{BodyPayload, Protocol, RequestContext, LOOPBACK_SENTINEL};
pub use response::{Payload, Response, X_POWERED_BY};
pub use server::{ServeError, Server, NOT_FOUND_MESSAGE};
