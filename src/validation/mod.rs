//! Request validation subsystem.
//!
//! # Data Flow
//! ```text
//! RequestContext (after auth injection)
//!     → validator.rs: TypeCheck against parsed body
//!         ✗ → failure Response (406 by default), handler skipped
//!     → validator.rs: AuthCheck against whole context
//!         ✗ → returned Response, or error → translator
//!     → pass: continue to middleware
//! ```
//!
//! `schema.rs` is the built-in `TypeCheck`; any other engine can implement the trait.

pub mod schema;
pub mod validator;

pub use schema::{JsonType, Parameter, ParameterSchema};
pub use validator::{AuthCheck, TypeCheck, Validator, Violation, DEFAULT_FAILURE_STATUS};
