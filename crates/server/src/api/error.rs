use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use compose_core::ComposeError;
use serde::Serialize;

#[derive(Debug)]
pub enum ApiError {
    InvalidRequest(String),
    Timeout(String),
    Unavailable(String),
    InternalError(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
    r#type: &'static str,
}

impl From<ComposeError> for ApiError {
    fn from(err: ComposeError) -> Self {
        let message = err.to_string();
        match err {
            ComposeError::BatchSize(_) | ComposeError::Tokenizer(_) | ComposeError::Config(_) => {
                ApiError::InvalidRequest(message)
            }
            ComposeError::DeadlineExceeded { .. } => ApiError::Timeout(message),
            ComposeError::Cancelled { .. } => ApiError::Unavailable(message),
            _ => ApiError::InternalError(message),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self {
            ApiError::InvalidRequest(msg) => {
                (StatusCode::BAD_REQUEST, "invalid_request_error", msg)
            }
            ApiError::Timeout(msg) => (StatusCode::GATEWAY_TIMEOUT, "timeout_error", msg),
            ApiError::Unavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable", msg)
            }
            ApiError::InternalError(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "server_error", msg)
            }
        };

        let body = ErrorResponse {
            error: ErrorBody {
                message,
                r#type: error_type,
            },
        };

        (status, axum::Json(body)).into_response()
    }
}
