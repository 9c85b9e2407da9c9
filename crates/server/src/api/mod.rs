pub mod complete;
pub mod error;
pub mod middleware;
pub mod tokenize;
pub mod types;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderValue, Method};
use axum::routing::{get, post};
use axum::{Json, Router};
use compose_core::CompletionService;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};

use types::HealthResponse;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<dyn CompletionService>,
    pub model_id: String,
    /// Per-request decode deadline.
    pub request_timeout: Option<Duration>,
    /// Whether the server is accepting new requests.
    accepting: Arc<AtomicBool>,
}

impl AppState {
    pub fn new(
        service: Arc<dyn CompletionService>,
        model_id: String,
        request_timeout: Option<Duration>,
        accepting: Arc<AtomicBool>,
    ) -> Self {
        Self {
            service,
            model_id,
            request_timeout,
            accepting,
        }
    }

    pub fn accepting_requests(&self) -> bool {
        self.accepting.load(Ordering::SeqCst)
    }
}

/// Build a `CorsLayer` from a comma-separated origin list, or "*" for all.
pub fn build_cors_layer(allowed_origins: &str) -> CorsLayer {
    if allowed_origins.trim() == "*" {
        return CorsLayer::very_permissive();
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| HeaderValue::from_str(s).ok())
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(AllowMethods::list([Method::GET, Method::POST, Method::OPTIONS]))
        .allow_headers(AllowHeaders::any())
}

pub fn create_router(state: AppState) -> Router {
    create_router_with_cors(state, CorsLayer::very_permissive())
}

/// API routes. `/health` stays reachable while draining so load balancers
/// can see the state change.
pub fn create_router_with_cors(state: AppState, cors: CorsLayer) -> Router {
    let accepting = state.accepting.clone();
    Router::new()
        .route("/v1/complete", post(complete::complete))
        .route("/v1/tokenize", post(tokenize::tokenize))
        .route("/v1/detokenize", post(tokenize::detokenize))
        .layer(axum::middleware::from_fn_with_state(
            accepting,
            middleware::reject_while_draining,
        ))
        .route("/health", get(health))
        .layer(cors)
        .with_state(state)
}

/// GET /health
async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let search = state.service.search_config();
    let status = if state.accepting_requests() {
        "ok"
    } else {
        "draining"
    };
    Json(HealthResponse {
        status: status.to_string(),
        model: state.model_id.clone(),
        vocab_size: state.service.vocab_size(),
        beam_width: search.beam_width,
        max_decode_length: search.max_decode_length,
    })
}
