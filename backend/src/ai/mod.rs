pub mod client;
pub mod models;

use async_trait::async_trait;
use serde_json::Value;

pub use client::WorkersAiClient;
pub use models::{AiInput, ChatMessage};

/// Fixed model identifiers for the two-stage pipeline.
pub const MODEL_CLASSIFIER: &str = "@cf/microsoft/resnet-50";
pub const MODEL_LLAMA: &str = "@cf/meta/llama-2-7b-chat-int8";
pub const MODEL_GEMMA: &str = "@cf/google/gemma-7b-it-lora";

#[derive(Debug, thiserror::Error)]
pub enum AiError {
    #[error("inference request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("inference backend error: {0}")]
    Backend(String),
    #[error("malformed inference response: {0}")]
    MalformedResponse(String),
}

/// The sole capability the pipeline has on an external system:
/// `run(model, input) -> output`. Implemented by [`WorkersAiClient`]
/// in production and by recording mocks in tests; injected as a
/// long-lived `Arc<dyn InferenceBackend>`.
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    async fn run(&self, model: &str, input: AiInput) -> Result<Value, AiError>;
}
