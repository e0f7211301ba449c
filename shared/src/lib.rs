use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;
use strum_macros::{Display, EnumString};

/// Marker string carried by every item-level failure outcome.
pub const PROCESSING_ERROR_MARKER: &str = "Failed to process image";

/// Fallback message when a failure carries no usable detail.
pub const UNKNOWN_ERROR_MESSAGE: &str = "An unknown error occurred";

/// One element of the classify request body. Exactly one of `url` or
/// `inline_data` must be set; the backend validator enforces this.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct ClassifyRequestItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Base64-encoded image bytes for inline uploads.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<String>,
    /// Required alongside `inline_data`; its extension is validated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

/// Second-stage text-generation backend selected by the request path.
#[derive(Display, EnumString, Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[strum(serialize_all = "lowercase")]
pub enum AnalysisBackend {
    None,
    Llama,
    Gemma,
}

impl AnalysisBackend {
    /// Parse the optional `{backend}` path segment. Unrecognized values
    /// fall back to `None`; the offending value is returned so the
    /// handler can surface a warning instead of failing silently.
    pub fn from_path_segment(segment: Option<&str>) -> (Self, Option<String>) {
        match segment {
            None => (AnalysisBackend::None, None),
            Some(value) => match AnalysisBackend::from_str(value) {
                Ok(backend) => (backend, None),
                Err(_) => (AnalysisBackend::None, Some(value.to_string())),
            },
        }
    }
}

/// Per-image result. Success keeps the classification even when the
/// analysis stage fails; `analysis_error` reports that independently.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(untagged)]
pub enum ItemOutcome {
    Success {
        classification: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        analysis: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        analysis_error: Option<String>,
    },
    Failure {
        error: String,
        message: String,
    },
}

impl ItemOutcome {
    pub fn success(classification: Value) -> Self {
        ItemOutcome::Success {
            classification,
            analysis: None,
            analysis_error: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        ItemOutcome::Failure {
            error: PROCESSING_ERROR_MARKER.to_string(),
            message: message.into(),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, ItemOutcome::Failure { .. })
    }
}

/// Whole-batch response; `responses[i]` corresponds to input item `i`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct BatchResponse {
    pub responses: Vec<ItemOutcome>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}
