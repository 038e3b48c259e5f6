//! Success envelope.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// `{"success": true, ...payload}` with the payload's fields flattened in.
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse<T> {
    success: bool,
    #[serde(flatten)]
    payload: T,
    #[serde(skip)]
    status: StatusCode,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(payload: T) -> Self {
        Self {
            success: true,
            payload,
            status: StatusCode::OK,
        }
    }

    pub fn created(payload: T) -> Self {
        Self::ok(payload).status(StatusCode::CREATED)
    }

    pub fn status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}
