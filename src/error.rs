//! Failure taxonomy for the request-processing layer.
//!
//! Every stage raises the most specific [`GatewayError`] it can. Nothing in
//! this module decides what a client sees: the mapping to status codes and
//! response bodies lives in [`crate::normalizer`].

use std::any::Any;
use std::error::Error as StdError;
use std::fmt::Write as _;
use std::time::Duration;

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use thiserror::Error;

use crate::auth::CredentialError;
use crate::quota::RouteClass;
use crate::store::StoreError;
use crate::validation::Violation;

/// Closed set of failures that can reach the response boundary.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// A capability is misconfigured (e.g. no token signing secret).
    #[error("configuration error: {0}")]
    Config(String),

    /// Protected route called without a bearer token.
    #[error("access token is required")]
    MissingCredential,

    /// Bearer token is past its embedded expiry.
    #[error("token has expired")]
    ExpiredCredential,

    /// Bearer token signature or payload is invalid.
    #[error("invalid token: {0}")]
    MalformedCredential(String),

    /// Token verification failed for a reason unrelated to the token itself.
    #[error("token verification failed: {0}")]
    VerificationUnavailable(String),

    /// One or more field-level violations, in rule order.
    #[error("validation failed: {}", join_violations(.0))]
    Validation(Vec<Violation>),

    /// Request body could not be read or parsed as JSON.
    #[error("malformed request body: {0}")]
    MalformedBody(String),

    /// Client exhausted the quota of a route class.
    #[error("quota exceeded for {class} routes, retry in {}s", .retry_after.as_secs())]
    QuotaExceeded {
        class: RouteClass,
        retry_after: Duration,
    },

    /// Data store rejected a write on a unique constraint.
    #[error("unique constraint violated{}", .field.as_deref().map(|f| format!(" on {f}")).unwrap_or_default())]
    StoreConflict { field: Option<String> },

    /// Data store found no matching record.
    #[error("record not found")]
    StoreNotFound,

    /// Data store rejected a reference to a missing related record.
    #[error("invalid reference to related data")]
    StoreReference { field: Option<String> },

    /// Data store rejected the shape of the data.
    #[error("data store rejected input: {0}")]
    StoreValidation(String),

    /// No route matches the request.
    #[error("route {method} {path} not found")]
    RouteNotFound { method: String, path: String },

    /// Anything else. `status` is the status a handler explicitly asked for.
    #[error("{message}")]
    Unclassified {
        message: String,
        status: Option<StatusCode>,
        name: String,
        diagnostic: Option<String>,
    },
}

impl GatewayError {
    /// Wrap an arbitrary error, keeping its source chain for development mode.
    pub fn unclassified<E>(err: E) -> Self
    where
        E: StdError,
    {
        let name = std::any::type_name::<E>()
            .rsplit("::")
            .next()
            .unwrap_or("Error")
            .to_string();
        Self::Unclassified {
            message: err.to_string(),
            status: None,
            name,
            diagnostic: Some(diagnostic_chain(&err)),
        }
    }

    /// Unclassified failure from a plain message.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Unclassified {
            message: message.into(),
            status: None,
            name: "Error".to_string(),
            diagnostic: None,
        }
    }

    /// Handler-level named validation failure; the message is passed through verbatim.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Validation(vec![Violation::general(message)])
    }

    /// Attach the status a handler wants for an otherwise unclassified failure.
    /// Has no effect on classified kinds.
    pub fn with_status(self, status: StatusCode) -> Self {
        match self {
            Self::Unclassified {
                message,
                name,
                diagnostic,
                ..
            } => Self::Unclassified {
                message,
                status: Some(status),
                name,
                diagnostic,
            },
            other => other,
        }
    }

    /// Failure for a handler that panicked.
    pub fn from_panic(payload: Box<dyn Any + Send + 'static>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "handler panicked".to_string()
        };
        Self::Unclassified {
            diagnostic: Some(format!("panic: {message}")),
            message,
            status: None,
            name: "Panic".to_string(),
        }
    }

    /// Stable snake_case tag used in logs and metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::MissingCredential => "missing_credential",
            Self::ExpiredCredential => "expired_credential",
            Self::MalformedCredential(_) => "malformed_credential",
            Self::VerificationUnavailable(_) => "verification_unavailable",
            Self::Validation(_) => "validation",
            Self::MalformedBody(_) => "malformed_body",
            Self::QuotaExceeded { .. } => "quota_exceeded",
            Self::StoreConflict { .. } => "store_conflict",
            Self::StoreNotFound => "store_not_found",
            Self::StoreReference { .. } => "store_reference",
            Self::StoreValidation(_) => "store_validation",
            Self::RouteNotFound { .. } => "route_not_found",
            Self::Unclassified { .. } => "unclassified",
        }
    }
}

impl From<CredentialError> for GatewayError {
    fn from(err: CredentialError) -> Self {
        match err {
            CredentialError::MissingSecret => Self::Config(err.to_string()),
            CredentialError::Expired => Self::ExpiredCredential,
            CredentialError::Malformed(reason) => Self::MalformedCredential(reason),
            CredentialError::Unavailable(reason) => Self::VerificationUnavailable(reason),
        }
    }
}

impl From<StoreError> for GatewayError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UniqueViolation { target } => Self::StoreConflict {
                field: (!target.is_empty()).then(|| target.join(",")),
            },
            StoreError::NotFound => Self::StoreNotFound,
            StoreError::ForeignKeyViolation { field } => Self::StoreReference { field },
            StoreError::InvalidData(reason) => Self::StoreValidation(reason),
            other => Self::unclassified(other),
        }
    }
}

impl From<JsonRejection> for GatewayError {
    fn from(rejection: JsonRejection) -> Self {
        Self::MalformedBody(rejection.body_text())
    }
}

fn join_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(Violation::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn diagnostic_chain(err: &dyn StdError) -> String {
    let mut out = format!("{err:?}");
    let mut source = err.source();
    while let Some(cause) = source {
        let _ = write!(out, "\ncaused by: {cause}");
        source = cause.source();
    }
    out
}
