use std::time::Instant;

use axum::extract::State;
use axum::Json;
use compose_core::{CancelToken, CompletionOutput};
use tracing::{info, warn};
use uuid::Uuid;

use super::error::ApiError;
use super::types::CompleteRequest;
use super::AppState;

/// Cancels the decode when the handler future is dropped, e.g. on client disconnect.
struct CancelOnDrop(CancelToken);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

/// Complete a partially typed text.
///
/// POST /v1/complete
pub async fn complete(
    State(state): State<AppState>,
    Json(req): Json<CompleteRequest>,
) -> Result<Json<CompletionOutput>, ApiError> {
    let request_id = Uuid::new_v4();
    let cancel = match state.request_timeout {
        Some(timeout) => CancelToken::with_timeout(timeout),
        None => CancelToken::new(),
    };
    let _guard = CancelOnDrop(cancel.clone());
    let service = state.service.clone();
    let started = Instant::now();

    let result = tokio::task::spawn_blocking(move || service.complete_batch(&req.inputs, &cancel))
        .await
        .map_err(|e| ApiError::InternalError(format!("completion task failed: {e}")))?;

    let elapsed_ms = started.elapsed().as_millis() as u64;
    match result {
        Ok(output) => {
            info!(
                %request_id,
                elapsed_ms,
                exist_prefix = output.exist_prefix,
                completions = output.predicted_texts.len(),
                "completion served"
            );
            Ok(Json(output))
        }
        Err(e) => {
            warn!(%request_id, elapsed_ms, error = %e, "completion failed");
            Err(e.into())
        }
    }
}
