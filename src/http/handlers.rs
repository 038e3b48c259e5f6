//! Service-level handlers: index, health check and the unknown-route fallback.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{SecondsFormat, Utc};
use serde_json::json;

use crate::error::GatewayError;
use crate::http::ApiResponse;
use crate::store::HealthProbe;

pub const SERVICE_NAME: &str = "HealthKit Backend API";

/// State for [`health_check`]; `None` when no data store is attached.
pub type ProbeState = Option<Arc<dyn HealthProbe>>;

/// `GET /`
pub async fn index() -> ApiResponse<serde_json::Value> {
    ApiResponse::ok(json!({
        "message": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "auth": "/api/auth",
            "health": "/api/health",
        },
    }))
}

/// `GET /api/health-check`
pub async fn health_check(State(probe): State<ProbeState>) -> Response {
    let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
    let Some(probe) = probe else {
        return ApiResponse::ok(json!({
            "status": "healthy",
            "database": "not_configured",
            "timestamp": timestamp,
        }))
        .into_response();
    };

    match probe.ping().await {
        Ok(()) => ApiResponse::ok(json!({
            "status": "healthy",
            "database": "connected",
            "timestamp": timestamp,
        }))
        .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "success": false,
                    "status": "unhealthy",
                    "database": "disconnected",
                    "error": e.to_string(),
                })),
            )
                .into_response()
        }
    }
}

/// Fallback for requests no route matches.
pub async fn not_found(method: Method, uri: Uri) -> GatewayError {
    GatewayError::RouteNotFound {
        method: method.to_string(),
        path: uri.path().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreError;
    use async_trait::async_trait;
    use http_body_util::BodyExt;
    use serde_json::Value;

    struct Down;

    #[async_trait]
    impl HealthProbe for Down {
        async fn ping(&self) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
    }

    struct Up;

    #[async_trait]
    impl HealthProbe for Up {
        async fn ping(&self) -> Result<(), StoreError> {
            Ok(())
        }
    }

    async fn body(response: Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn index_lists_endpoints() {
        let value = body(index().await.into_response()).await;
        assert_eq!(value["success"], true);
        assert_eq!(value["endpoints"]["auth"], "/api/auth");
    }

    #[tokio::test]
    async fn healthy_store_reports_connected() {
        let response = health_check(State(Some(Arc::new(Up) as Arc<dyn HealthProbe>))).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body(response).await["database"], "connected");
    }

    #[tokio::test]
    async fn unreachable_store_is_503() {
        let response = health_check(State(Some(Arc::new(Down) as Arc<dyn HealthProbe>))).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let value = body(response).await;
        assert_eq!(value["success"], false);
        assert_eq!(value["database"], "disconnected");
    }

    #[tokio::test]
    async fn no_probe_is_still_healthy() {
        let response = health_check(State(None)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body(response).await["database"], "not_configured");
    }
}
