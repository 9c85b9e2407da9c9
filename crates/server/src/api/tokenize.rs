use axum::extract::State;
use axum::Json;

use super::error::ApiError;
use super::types::{DetokenizeRequest, DetokenizeResponse, TokenizeRequest, TokenizeResponse};
use super::AppState;

/// Tokenize text into vocabulary ids.
///
/// POST /v1/tokenize
pub async fn tokenize(
    State(state): State<AppState>,
    Json(req): Json<TokenizeRequest>,
) -> Result<Json<TokenizeResponse>, ApiError> {
    let tokens = state.service.tokenize(&req.text)?;
    let count = tokens.len();
    Ok(Json(TokenizeResponse { tokens, count }))
}

/// Detokenize ids back into text.
///
/// POST /v1/detokenize
pub async fn detokenize(
    State(state): State<AppState>,
    Json(req): Json<DetokenizeRequest>,
) -> Result<Json<DetokenizeResponse>, ApiError> {
    let text = state.service.detokenize(&req.tokens)?;
    Ok(Json(DetokenizeResponse { text }))
}

#[cfg(test)]
mod tests {
    use super::super::create_router;
    use super::super::test_support::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn post(uri: &str, body: &str) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn tokenize_returns_ids() {
        let resp = create_router(state())
            .oneshot(post("/v1/tokenize", r#"{"text":"hello world"}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["tokens"], serde_json::json!([4, 9]));
        assert_eq!(json["count"], 2);
    }

    #[tokio::test]
    async fn detokenize_returns_text() {
        let resp = create_router(state())
            .oneshot(post("/v1/detokenize", r#"{"tokens":[4,6]}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["text"], "hello there");
    }

    #[tokio::test]
    async fn detokenize_out_of_range_is_bad_request() {
        let resp = create_router(state())
            .oneshot(post("/v1/detokenize", r#"{"tokens":[4,99]}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
