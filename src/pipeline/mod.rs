//! Request pipeline subsystem.
//!
//! # Data Flow
//! ```text
//! normalize_failures (outermost, wraps everything below)
//!     → CatchPanicLayer (panics become failures)
//!     → router match
//!     → gate.rs (path, query and the unread body into a RequestContext)
//!         → QuotaStage      (admit or 429)
//!         → AuthStage       (protected routes: bearer token → Principal)
//!         → ValidationStage (read body if the rules need it, then rule set
//!                            → violations or sanitized input)
//!     → route handler
//! ```
//!
//! # Design Decisions
//! - Stages return `ControlFlow`: `Continue` passes on, `Break` carries the
//!   failure; there is no hidden `next` callback
//! - The pipeline holds no business state
//! - Route declarations are values bound at registration time

pub mod context;
pub mod gate;
pub mod gateway;
pub mod routes;
pub mod stage;

pub use context::{Access, PendingBody, RequestContext, RouteSpec};
pub use gate::{gate, GateState};
pub use gateway::Gateway;
pub use stage::{AuthStage, Pipeline, QuotaStage, Stage, ValidationStage};
