//! Error taxonomy and translation.
//!
//! # Data Flow
//! ```text
//! handler / validator / middleware / body reader
//!     → ServerError (taxonomy.rs)
//!     → translator.rs (classify, log, build JSON envelope)
//!     → HTTP response + ErrorReport
//!     → error observer (fire-and-forget)
//! ```
//!
//! # Design Decisions
//! - One error type (`ServerError`) crosses every pipeline boundary
//! - Domain errors carry a machine-readable origin/kind pair for clients
//! - Internal messages never reach the client; the true text is only logged

pub mod taxonomy;
pub mod translator;

pub use taxonomy::{
    DomainError, ErrorClass, ErrorKind, ErrorOrigin, HttpError, ServerError, ServerResult,
    TransportError, GENERIC_INTERNAL_MESSAGE,
};
pub use translator::{translate, ErrorReport, Translation};
