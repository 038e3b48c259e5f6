//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! gate, stages, normalizer:
//!     → tracing events with structured fields → logging.rs subscriber
//!       (stdout, compact or JSON)
//!     → metrics.rs helpers → `metrics` facade → Prometheus scrape endpoint
//! ```
//!
//! # Design Decisions
//! - JSON output in production for machine parsing
//! - Request ID flows through every log line via the trace span
//! - Metric labels are route classes and failure kinds only

pub mod logging;
pub mod metrics;

pub use logging::init_logging;
