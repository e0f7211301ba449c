use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One turn of a conversational analysis request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Inference request body. Untagged: each shape serializes exactly as
/// the backend expects it (`{"image": [...]}`, `{"messages": [...]}`,
/// `{"prompt": "..."}`).
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum AiInput {
    Image {
        image: Vec<u8>,
    },
    Chat {
        messages: Vec<ChatMessage>,
        max_tokens: u32,
    },
    Prompt {
        prompt: String,
        max_tokens: u32,
        raw: bool,
    },
}

impl AiInput {
    pub fn image(bytes: Vec<u8>) -> Self {
        AiInput::Image { image: bytes }
    }

    pub fn chat(messages: Vec<ChatMessage>, max_tokens: u32) -> Self {
        AiInput::Chat {
            messages,
            max_tokens,
        }
    }

    /// Raw prompt: the backend applies no prompt templating.
    pub fn raw_prompt(prompt: impl Into<String>, max_tokens: u32) -> Self {
        AiInput::Prompt {
            prompt: prompt.into(),
            max_tokens,
            raw: true,
        }
    }
}

/// Cloudflare v4 API response envelope.
#[derive(Debug, Deserialize)]
pub struct ApiEnvelope {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub errors: Vec<ApiMessage>,
}

#[derive(Debug, Deserialize)]
pub struct ApiMessage {
    #[serde(default)]
    pub code: Option<i64>,
    pub message: String,
}

impl ApiMessage {
    /// The message, with the numeric API error code appended when the
    /// envelope carries one.
    pub fn detail(&self) -> String {
        match self.code {
            Some(code) => format!("{} (code {})", self.message, code),
            None => self.message.clone(),
        }
    }
}
