//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! routing/pipeline.rs, error/translator.rs produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → stdout (JSON or pretty)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Request ID (x-request-id) flows through logs and the request context
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
