use async_trait::async_trait;
use serde_json::Value;

use super::models::{AiInput, ApiEnvelope};
use super::{AiError, InferenceBackend};

/// REST client for the Workers AI `run` endpoint
/// (`POST {base}/accounts/{account}/ai/run/{model}`).
///
/// Holds a shared `reqwest::Client`; constructed once at startup and
/// injected wherever inference is needed.
pub struct WorkersAiClient {
    http: reqwest::Client,
    base_url: String,
    account_id: String,
    api_token: String,
}

impl WorkersAiClient {
    pub fn new(
        http: reqwest::Client,
        base_url: String,
        account_id: String,
        api_token: String,
    ) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            account_id,
            api_token,
        }
    }

    fn run_url(&self, model: &str) -> String {
        format!(
            "{}/accounts/{}/ai/run/{}",
            self.base_url, self.account_id, model
        )
    }
}

#[async_trait]
impl InferenceBackend for WorkersAiClient {
    async fn run(&self, model: &str, input: AiInput) -> Result<Value, AiError> {
        let response = self
            .http
            .post(self.run_url(model))
            .bearer_auth(&self.api_token)
            .json(&input)
            .send()
            .await?;

        let status = response.status();
        let envelope: ApiEnvelope = response.json().await?;

        if !status.is_success() || !envelope.success {
            let detail = if envelope.errors.is_empty() {
                format!("{} returned status {}", model, status)
            } else {
                envelope
                    .errors
                    .iter()
                    .map(|e| e.detail())
                    .collect::<Vec<_>>()
                    .join("; ")
            };
            log::error!("inference call to {} failed: {}", model, detail);
            return Err(AiError::Backend(detail));
        }

        envelope
            .result
            .ok_or_else(|| AiError::MalformedResponse(format!("{} returned no result", model)))
    }
}
