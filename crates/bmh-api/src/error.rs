use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        ApiError { status: StatusCode::BAD_REQUEST, message: msg.into() }
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        ApiError { status: StatusCode::NOT_FOUND, message: msg.into() }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        ApiError { status: StatusCode::INTERNAL_SERVER_ERROR, message: msg.into() }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({ "error": self.message }));
        (self.status, body).into_response()
    }
}

impl From<bmh_reconciler::ReconcileError> for ApiError {
    fn from(e: bmh_reconciler::ReconcileError) -> Self {
        use bmh_reconciler::ReconcileError::*;
        match e {
            InvalidInput(_) | InsufficientCapacity { .. } => ApiError::bad_request(e.to_string()),
            _ => ApiError::internal(e.to_string()),
        }
    }
}

impl From<bmh_store::StoreError> for ApiError {
    fn from(e: bmh_store::StoreError) -> Self {
        ApiError::internal(e.to_string())
    }
}

impl From<bmh_operator::OperatorError> for ApiError {
    fn from(e: bmh_operator::OperatorError) -> Self {
        ApiError::internal(e.to_string())
    }
}
