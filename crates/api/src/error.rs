//! API error types and response envelopes

use std::any::Any;

use axum::{
    extract::{rejection::JsonRejection, FromRequest},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;

use crate::auth::AuthError;

/// Application error type
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Conflict(String),
    #[error("Method not allowed")]
    MethodNotAllowed,
    #[error("Internal server error")]
    Internal,
    #[error("Service unavailable")]
    ServiceUnavailable,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        let body = Json(json!({
            "statusCode": status.as_u16(),
            "message": self.to_string(),
            "success": false,
            "errors": [],
        }));

        (status, body).into_response()
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Validation(msg) => ApiError::Validation(msg),
            AuthError::NotFound(msg) => ApiError::NotFound(msg),
            AuthError::Unauthorized(msg) => ApiError::Unauthorized(msg),
            AuthError::Conflict(msg) => ApiError::Conflict(msg),
            AuthError::Internal(cause) => {
                tracing::error!(error = %cause, "Internal error");
                ApiError::Internal
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

/// Render a caught panic as a 500 envelope
pub fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");

    tracing::error!(panic = %detail, "Handler panicked");
    ApiError::Internal.into_response()
}

/// Fallback for paths no router matches
pub async fn route_not_found() -> ApiError {
    ApiError::NotFound("Route not found".to_string())
}

/// Give the router's bare 405 responses the error envelope, keeping `Allow`
pub async fn method_not_allowed_envelope(response: Response) -> Response {
    if response.status() != StatusCode::METHOD_NOT_ALLOWED {
        return response;
    }

    let mut envelope = ApiError::MethodNotAllowed.into_response();
    if let Some(allow) = response.headers().get(header::ALLOW) {
        envelope.headers_mut().insert(header::ALLOW, allow.clone());
    }
    envelope
}

/// Success envelope: `{statusCode, data, message, success: true}`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub status_code: u16,
    pub data: T,
    pub message: String,
    pub success: bool,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T, message: impl Into<String>) -> Self {
        Self {
            status_code: StatusCode::OK.as_u16(),
            data,
            message: message.into(),
            success: true,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::OK);
        (status, Json(self)).into_response()
    }
}

/// JSON body extractor whose rejections use the error envelope
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct AppJson<T>(pub T);

/// Result type alias for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
