//! Middleware for request handling during shutdown.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use super::error::ApiError;

/// Rejects requests with 503 once the server stopped accepting work.
pub async fn reject_while_draining(
    State(accepting): State<Arc<AtomicBool>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !accepting.load(Ordering::SeqCst) {
        return ApiError::Unavailable("server is shutting down, please retry".into())
            .into_response();
    }
    next.run(request).await
}
