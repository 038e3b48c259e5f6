//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Outgoing response:
//!     → headers.rs (hardening headers, handler values win)
//!     → cors.rs (origin grant for allowed callers)
//! ```
//!
//! # Design Decisions
//! - Credentials are never granted to a wildcard origin
//! - Quota and token checks live in the request pipeline, not here

pub mod cors;
pub mod headers;

pub use cors::cors_layer;
pub use headers::{security_headers, with_security_headers};
