use std::sync::Arc;

use futures::future::join_all;
use serde_json::Value;
use tokio::sync::Semaphore;

use shared::{AnalysisBackend, ItemOutcome, UNKNOWN_ERROR_MESSAGE};

use crate::ai::{
    AiError, AiInput, ChatMessage, InferenceBackend, MODEL_CLASSIFIER, MODEL_GEMMA, MODEL_LLAMA,
};
use super::resolve::{resolve, ResolveError};
use super::validate::ImageDescriptor;

const ANALYSIS_MAX_TOKENS: u32 = 256;
const ANALYSIS_SYSTEM_PROMPT: &str =
    "You are an AI assistant that analyzes image classification results.";

/// Flat item-level error: the outcome shape does not distinguish where
/// in the pipeline an item failed, only that it did.
#[derive(Debug, thiserror::Error)]
enum ProcessingError {
    #[error("{0}")]
    Resolve(#[from] ResolveError),
    #[error("{0}")]
    Inference(#[from] AiError),
}

/// Drives the per-item classify/analyze pipeline and fans it out over a
/// batch. Stateless across requests: the only shared pieces are the
/// injected inference capability, the HTTP client, and the concurrency
/// limiter, all safe for concurrent use.
#[derive(Clone)]
pub struct ClassifyService {
    ai: Arc<dyn InferenceBackend>,
    http: reqwest::Client,
    limiter: Arc<Semaphore>,
}

impl ClassifyService {
    pub fn new(
        ai: Arc<dyn InferenceBackend>,
        http: reqwest::Client,
        max_concurrent: usize,
    ) -> Self {
        Self {
            ai,
            http,
            limiter: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    /// Fan out one task per descriptor, bounded by the limiter, and
    /// join all of them. `outcomes[i]` always corresponds to input
    /// descriptor `i` regardless of completion order; no item failure
    /// cancels its siblings and no partial batch is returned early.
    pub async fn process_batch(
        &self,
        batch: Vec<ImageDescriptor>,
        backend: AnalysisBackend,
    ) -> Vec<ItemOutcome> {
        let tasks: Vec<_> = batch
            .into_iter()
            .map(|descriptor| {
                let service = self.clone();
                tokio::spawn(async move {
                    // Acquire only fails if the semaphore is closed;
                    // never drop the item over that, but say so.
                    let _permit = match service.limiter.acquire().await {
                        Ok(permit) => Some(permit),
                        Err(_) => {
                            log::warn!("concurrency limiter is closed, processing unbounded");
                            None
                        }
                    };
                    service.process_item(descriptor, backend).await
                })
            })
            .collect();

        join_all(tasks)
            .await
            .into_iter()
            .map(|joined| match joined {
                Ok(outcome) => outcome,
                Err(e) => {
                    log::error!("classification task panicked: {:?}", e);
                    ItemOutcome::failure(UNKNOWN_ERROR_MESSAGE)
                }
            })
            .collect()
    }

    /// Run one image through resolve -> classify -> optional analyze.
    /// Infallible by construction: every failure is caught here and
    /// embedded in the outcome, never escalated to fail the batch.
    pub async fn process_item(
        &self,
        descriptor: ImageDescriptor,
        backend: AnalysisBackend,
    ) -> ItemOutcome {
        let classification = match self.classify(&descriptor).await {
            Ok(value) => value,
            Err(e) => {
                log::warn!("image processing failed: {}", e);
                return ItemOutcome::failure(e.to_string());
            }
        };

        if backend == AnalysisBackend::None {
            return ItemOutcome::success(classification);
        }

        // A computed classification is never discarded: analysis
        // failure is reported alongside it instead of replacing it.
        match self.analyze(backend, &classification).await {
            Ok(analysis) => ItemOutcome::Success {
                classification,
                analysis: Some(analysis),
                analysis_error: None,
            },
            Err(e) => {
                log::warn!("{} analysis failed, returning classification only: {}", backend, e);
                ItemOutcome::Success {
                    classification,
                    analysis: None,
                    analysis_error: Some(e.to_string()),
                }
            }
        }
    }

    async fn classify(&self, descriptor: &ImageDescriptor) -> Result<Value, ProcessingError> {
        let bytes = resolve(&self.http, descriptor).await?;
        let classification = self
            .ai
            .run(MODEL_CLASSIFIER, AiInput::image(bytes))
            .await?;
        Ok(classification)
    }

    async fn analyze(
        &self,
        backend: AnalysisBackend,
        classification: &Value,
    ) -> Result<Value, AiError> {
        let serialized = classification.to_string();
        match backend {
            AnalysisBackend::Llama => {
                let messages = vec![
                    ChatMessage::system(ANALYSIS_SYSTEM_PROMPT),
                    ChatMessage::user(format!(
                        "Please analyze the following image classification JSON output and provide a summary:\n\n{serialized}"
                    )),
                ];
                self.ai
                    .run(MODEL_LLAMA, AiInput::chat(messages, ANALYSIS_MAX_TOKENS))
                    .await
            }
            AnalysisBackend::Gemma => {
                let prompt = format!(
                    "Analyze the following image classification JSON output and provide a summary:\n\n{serialized}"
                );
                self.ai
                    .run(MODEL_GEMMA, AiInput::raw_prompt(prompt, ANALYSIS_MAX_TOKENS))
                    .await
            }
            AnalysisBackend::None => Ok(Value::Null),
        }
    }
}
