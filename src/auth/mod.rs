//! Credential subsystem.
//!
//! # Data Flow
//! ```text
//! login/registration handler (external, after password check)
//!     → token.rs (issue: sign {sub, email, iat, exp})
//!     → client stores bearer token
//!
//! protected request:
//!     → bearer.rs (pull token from Authorization header)
//!     → token.rs (verify: expiry, then signature)
//!     → Principal attached to request extensions
//! ```
//!
//! # Design Decisions
//! - Tokens are bearer credentials valid until natural expiry (7 days)
//! - No refresh or rotation
//! - A missing signing secret disables issuance, never public routes

pub mod bearer;
pub mod token;

pub use bearer::bearer_token;
pub use token::{Claims, CredentialError, Principal, TokenCodec, TOKEN_TTL_DAYS};
