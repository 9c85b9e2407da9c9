use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CompleteRequest {
    /// Texts to complete. The decoder accepts exactly one.
    pub inputs: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TokenizeRequest {
    pub text: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TokenizeResponse {
    pub tokens: Vec<u32>,
    pub count: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DetokenizeRequest {
    pub tokens: Vec<u32>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DetokenizeResponse {
    pub text: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HealthResponse {
    /// "ok", or "draining" once shutdown has begun.
    pub status: String,
    pub model: String,
    pub vocab_size: usize,
    pub beam_width: usize,
    pub max_decode_length: usize,
}
