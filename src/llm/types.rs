use crate::rag::types::{ConfidenceResult, ResponseStrategy};
use crate::stream::{ApiUsage, Citation, TokenUsage};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
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

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct ChatCompletionRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [ChatMessage],
    pub max_tokens: u32,
    pub temperature: f32,
    pub stream: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ResponseMessage {
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ResponseChoice {
    pub message: ResponseMessage,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ChatCompletionResponse {
    #[serde(default)]
    pub choices: Vec<ResponseChoice>,
    #[serde(default)]
    pub usage: Option<ApiUsage>,
}

/// A complete (non-streamed) model reply.
#[derive(Debug, Clone, PartialEq)]
pub struct Generation {
    pub content: String,
    pub usage: TokenUsage,
}

/// Everything the generator needs to answer one question. Owned so it can be
/// moved into the streaming task.
#[derive(Debug, Clone, Default)]
pub struct AnswerRequest {
    pub query: String,
    pub results: Vec<crate::rag::types::SearchResult>,
    pub profile: Option<crate::rag::types::UserProfile>,
    /// Earlier turns of the conversation, oldest first.
    pub history: Vec<ChatMessage>,
}

#[derive(Debug, Clone)]
pub struct PreparedAnswer {
    pub confidence: ConfidenceResult,
    pub strategy: ResponseStrategy,
    pub system_prompt: String,
    pub citations: Vec<Citation>,
}

#[derive(Debug, Clone)]
pub struct TaxAnswer {
    pub content: String,
    pub confidence: ConfidenceResult,
    pub disclaimer: String,
    pub citations: Vec<Citation>,
    pub usage: TokenUsage,
}
