//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → loader.rs (PORT, JWT_SECRET, APP_ENV, CORS_ORIGIN, LOG_FORMAT overrides)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → handed to the server builder at startup
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Quota limits are not configurable: they are part of the API contract

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{apply_env_overrides, load, load_config, parse_config, ConfigError};
pub use schema::{
    AuthConfig, CorsConfig, ExecutionMode, GatewayConfig, ListenerConfig, LogFormat,
    ObservabilityConfig, QuotaConfig, SecurityConfig,
};
pub use validation::{validate_config, ValidationError};
