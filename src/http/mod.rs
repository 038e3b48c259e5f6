//! HTTP surface of the gateway.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (ambient layers: request ID, tracing, CORS, security headers)
//!     → pipeline (normalizer, quota, auth, validation)
//!     → handlers.rs (index, health check, unknown-route fallback)
//!       or a mounted API handler using request.rs / response.rs
//!     → Send to client
//! ```

pub mod handlers;
pub mod request;
pub mod response;
pub mod server;

pub use handlers::{health_check, index, not_found, ProbeState};
pub use request::Payload;
pub use response::ApiResponse;
pub use server::{HttpServer, ServerBuilder, X_REQUEST_ID};
