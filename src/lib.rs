//! Cross-cutting request layer for the health-telemetry API.
//!
//! Every route runs behind the same pipeline: quota, then credential
//! verification, then payload validation. Every failure leaves through one
//! normalizer that renders the shared error envelope.

// Core subsystems
pub mod auth;
pub mod config;
pub mod error;
pub mod normalizer;
pub mod pipeline;
pub mod quota;
pub mod validation;

// Collaborators and HTTP surface
pub mod http;
pub mod store;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;
pub mod security;

pub use config::GatewayConfig;
pub use error::GatewayError;
pub use http::{HttpServer, ServerBuilder};
pub use lifecycle::Shutdown;
pub use normalizer::Normalizer;
pub use pipeline::{Gateway, RouteSpec};
