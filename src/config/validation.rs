//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Check CORS origins are usable header values
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system
//! - A missing signing secret is not an error here; it only blocks
//!   protected routes when they are mounted

use std::net::SocketAddr;

use axum::http::HeaderValue;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use crate::config::schema::GatewayConfig;

/// Minimum secret length below which a warning is logged at startup.
pub const RECOMMENDED_SECRET_LEN: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener.bind_address '{0}' is not a socket address")]
    BindAddress(String),
    #[error("quota.sweep_interval_secs must be greater than zero")]
    SweepInterval,
    #[error("security.max_body_bytes must be greater than zero")]
    BodyLimit,
    #[error("observability.log_level '{0}' is not a valid filter")]
    LogLevel(String),
    #[error("observability.metrics_address '{0}' is not a socket address")]
    MetricsAddress(String),
    #[error("cors.allowed_origins entry '{0}' is not a valid origin")]
    CorsOrigin(String),
    #[error("cors.allow_credentials cannot be combined with a wildcard origin")]
    CorsWildcardWithCredentials,
}

/// Check every semantic constraint, collecting all failures.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }
    if config.quota.sweep_interval_secs == 0 {
        errors.push(ValidationError::SweepInterval);
    }
    if config.security.max_body_bytes == 0 {
        errors.push(ValidationError::BodyLimit);
    }
    if EnvFilter::try_new(&config.observability.log_level).is_err() {
        errors.push(ValidationError::LogLevel(config.observability.log_level.clone()));
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    for origin in &config.cors.allowed_origins {
        if origin == "*" {
            if config.cors.allow_credentials {
                errors.push(ValidationError::CorsWildcardWithCredentials);
            }
            continue;
        }
        let scheme_ok = origin.starts_with("http://") || origin.starts_with("https://");
        if !scheme_ok || HeaderValue::from_str(origin).is_err() {
            errors.push(ValidationError::CorsOrigin(origin.clone()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
