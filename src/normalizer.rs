//! Failure normalization.
//!
//! # Responsibilities
//! - Map every [`GatewayError`] to exactly one status code and envelope
//! - Decide how much internal detail a client may see (execution mode)
//! - Log and count every failure once, at the outermost boundary
//!
//! # Design Decisions
//! - The mapping is one exhaustive `match`; a new error kind does not compile
//!   until it is given a status
//! - Errors render themselves through `IntoResponse` in production form and
//!   tag the response; the outer [`normalize_failures`] layer re-renders the
//!   tagged error with the configured mode
//! - Bare error responses produced by tower layers (timeouts, body limits,
//!   method mismatch) are wrapped so clients only ever see the envelope

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Request, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::config::ExecutionMode;
use crate::error::GatewayError;
use crate::observability::metrics;
use crate::validation::Violation;

const GENERIC_MESSAGE: &str = "An unexpected error occurred";

/// Client-facing shape of a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedError {
    pub status: StatusCode,
    pub error: &'static str,
    pub message: String,
    pub field: Option<String>,
    pub details: Vec<Violation>,
    pub retry_after: Option<Duration>,
    /// `(name, stack)`; only populated in development mode.
    pub diagnostic: Option<(String, String)>,
}

impl NormalizedError {
    fn new(status: StatusCode, error: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            error,
            message: message.into(),
            field: None,
            details: Vec::new(),
            retry_after: None,
            diagnostic: None,
        }
    }

    fn with_field(mut self, field: Option<String>) -> Self {
        self.field = field;
        self
    }

    pub fn envelope(&self) -> ErrorEnvelope<'_> {
        ErrorEnvelope {
            success: false,
            error: self.error,
            message: &self.message,
            field: self.field.as_deref(),
            details: (!self.details.is_empty()).then_some(self.details.as_slice()),
            stack: self.diagnostic.as_ref().map(|(_, stack)| stack.as_str()),
            name: self.diagnostic.as_ref().map(|(name, _)| name.as_str()),
        }
    }
}

/// JSON body of every failed response.
#[derive(Debug, Serialize)]
pub struct ErrorEnvelope<'a> {
    pub success: bool,
    pub error: &'a str,
    pub message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<&'a [Violation]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<&'a str>,
}

/// Stateless error classifier, parameterized only by execution mode.
#[derive(Debug, Clone, Copy, Default)]
pub struct Normalizer {
    mode: ExecutionMode,
}

impl Normalizer {
    pub fn new(mode: ExecutionMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    /// Map an error to its client-facing form.
    pub fn classify(&self, err: &GatewayError) -> NormalizedError {
        match err {
            GatewayError::StoreConflict { field } => NormalizedError::new(
                StatusCode::CONFLICT,
                "Conflict",
                "A record with this data already exists",
            )
            .with_field(field.clone()),
            GatewayError::StoreNotFound => NormalizedError::new(
                StatusCode::NOT_FOUND,
                "Not Found",
                "The requested record was not found",
            ),
            GatewayError::StoreReference { .. } => NormalizedError::new(
                StatusCode::BAD_REQUEST,
                "Bad Request",
                "Invalid reference to related data",
            ),
            GatewayError::StoreValidation(_) => {
                NormalizedError::new(StatusCode::BAD_REQUEST, "Bad Request", "Invalid data provided")
            }
            GatewayError::MissingCredential => {
                NormalizedError::new(StatusCode::UNAUTHORIZED, "Unauthorized", "Access token is required")
            }
            GatewayError::ExpiredCredential => {
                NormalizedError::new(StatusCode::UNAUTHORIZED, "Unauthorized", "Token has expired")
            }
            GatewayError::MalformedCredential(_) => {
                NormalizedError::new(StatusCode::FORBIDDEN, "Forbidden", "Invalid token")
            }
            GatewayError::Validation(violations) => validation_failure(violations),
            GatewayError::MalformedBody(reason) => {
                NormalizedError::new(StatusCode::BAD_REQUEST, "Bad Request", reason.clone())
            }
            GatewayError::QuotaExceeded { class, retry_after } => {
                let mut normalized = NormalizedError::new(
                    StatusCode::TOO_MANY_REQUESTS,
                    "Too Many Requests",
                    class.rejection_message(),
                );
                normalized.retry_after = Some(*retry_after);
                normalized
            }
            GatewayError::RouteNotFound { method, path } => NormalizedError::new(
                StatusCode::NOT_FOUND,
                "Not Found",
                format!("Route {method} {path} not found"),
            ),
            GatewayError::VerificationUnavailable(_) => NormalizedError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal Server Error",
                "Token verification failed",
            ),
            GatewayError::Config(_) => NormalizedError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal Server Error",
                "Server configuration error",
            ),
            GatewayError::Unclassified {
                message,
                status,
                name,
                diagnostic,
            } => self.unclassified(message, *status, name, diagnostic.as_deref()),
        }
    }

    fn unclassified(
        &self,
        message: &str,
        status: Option<StatusCode>,
        name: &str,
        diagnostic: Option<&str>,
    ) -> NormalizedError {
        let status = status
            .filter(|s| s.is_client_error() || s.is_server_error())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let label = if status == StatusCode::INTERNAL_SERVER_ERROR {
            "Internal Server Error"
        } else {
            "Error"
        };

        if self.mode.exposes_diagnostics() {
            let mut normalized = NormalizedError::new(status, label, message);
            normalized.diagnostic = Some((
                name.to_string(),
                diagnostic.unwrap_or(message).to_string(),
            ));
            normalized
        } else {
            NormalizedError::new(status, label, GENERIC_MESSAGE)
        }
    }

    /// Build the HTTP response for an error.
    pub fn render(&self, err: &GatewayError) -> Response {
        let normalized = self.classify(err);
        let mut response = (normalized.status, Json(normalized.envelope())).into_response();
        if let Some(retry_after) = normalized.retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs(retry_after)));
        }
        response
    }

    /// Log and count one failure.
    fn report(&self, err: &GatewayError, status: StatusCode, method: &str, path: &str) {
        if status.is_server_error() {
            let diagnostic = match err {
                GatewayError::Unclassified { diagnostic, .. } => diagnostic.as_deref(),
                _ => None,
            };
            tracing::error!(
                kind = err.kind(),
                status = status.as_u16(),
                method,
                path,
                diagnostic,
                error = %err,
                "Request failed"
            );
        } else {
            tracing::warn!(
                kind = err.kind(),
                status = status.as_u16(),
                method,
                path,
                error = %err,
                "Request rejected"
            );
        }
        metrics::record_failure(err.kind(), status.as_u16());
    }
}

fn validation_failure(violations: &[Violation]) -> NormalizedError {
    let message = violations
        .iter()
        .map(|v| v.message.as_str())
        .collect::<Vec<_>>()
        .join(", ");

    let mut fields = violations.iter().map(|v| v.field.as_deref());
    let first = fields.next().flatten();
    let field = first
        .filter(|f| fields.all(|other| other == Some(*f)))
        .map(str::to_string);

    let mut normalized =
        NormalizedError::new(StatusCode::BAD_REQUEST, "Validation Error", message).with_field(field);
    normalized.details = violations.to_vec();
    normalized
}

/// Whole seconds until retry, rounded up, at least one.
pub fn retry_after_secs(delay: Duration) -> u64 {
    let secs = delay.as_secs() + u64::from(delay.subsec_nanos() > 0);
    secs.max(1)
}

/// Marker left on a response rendered from a [`GatewayError`], so the outer
/// layer can re-render it with the configured mode.
#[derive(Debug, Clone)]
pub struct PendingFailure(pub Arc<GatewayError>);

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let mut response = Normalizer::default().render(&self);
        response.extensions_mut().insert(PendingFailure(Arc::new(self)));
        response
    }
}

/// Outermost pipeline layer: every failure leaves through here.
pub async fn normalize_failures(
    State(normalizer): State<Normalizer>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();

    let response = next.run(request).await;

    let failure = match response.extensions().get::<PendingFailure>() {
        Some(pending) => Some(Arc::clone(&pending.0)),
        None if is_bare_failure(&response) => Some(Arc::new(
            GatewayError::internal(
                response
                    .status()
                    .canonical_reason()
                    .unwrap_or("request failed"),
            )
            .with_status(response.status()),
        )),
        None => None,
    };
    let Some(err) = failure else {
        return response;
    };

    let rendered = normalizer.render(&err);
    normalizer.report(&err, rendered.status(), &method, &path);

    let (mut parts, _) = response.into_parts();
    let (rendered_parts, body) = rendered.into_parts();
    parts.extensions.remove::<PendingFailure>();
    parts.headers.remove(header::CONTENT_LENGTH);
    parts.headers.extend(rendered_parts.headers);
    parts.status = rendered_parts.status;
    Response::from_parts(parts, body)
}

/// An error status without a JSON body; produced by layers, not handlers.
fn is_bare_failure(response: &Response) -> bool {
    let status = response.status();
    if !(status.is_client_error() || status.is_server_error()) {
        return false;
    }
    !response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/json"))
}
