use crate::config::LlmConfig;
use crate::error::{Result, TaxEngineError};
use crate::llm::types::*;
use crate::stream::{
    estimate_tokens, parse_sse_line, ApiUsage, SseLine, SseLineBuffer, StreamEvent, TokenUsage,
};
use futures::StreamExt;
use log::{debug, warn};
use reqwest::Client;
use tokio::sync::mpsc::Sender;

#[derive(Clone)]
pub struct OpenRouterClient {
    client: Client,
    config: LlmConfig,
}

/// Text and usage collected from a streamed completion.
#[derive(Debug, Clone, Default)]
pub(crate) struct StreamedCompletion {
    pub content: String,
    pub usage: Option<ApiUsage>,
}

enum LineOutcome {
    Continue,
    Finished,
    ReceiverDropped,
}

impl OpenRouterClient {
    pub fn new(config: LlmConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            client: Client::new(),
            config,
        })
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    pub(crate) fn usage_for(&self, reported: Option<&ApiUsage>, prompt: &str, completion: &str) -> TokenUsage {
        let (prompt_tokens, completion_tokens) = match reported {
            Some(u) => (u.prompt_tokens, u.completion_tokens),
            None => (estimate_tokens(prompt), estimate_tokens(completion)),
        };
        TokenUsage {
            prompt_tokens,
            completion_tokens,
            cost_usd: self.config.estimate_cost(prompt_tokens, completion_tokens),
        }
    }

    async fn send(&self, messages: &[ChatMessage], stream: bool) -> Result<reqwest::Response> {
        let payload = ChatCompletionRequest {
            model: &self.config.model,
            messages,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            stream,
        };

        let res = self
            .client
            .post(self.config.chat_completions_url())
            .bearer_auth(&self.config.api_key)
            .json(&payload)
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            let err_text = res.text().await.unwrap_or_default();
            return Err(TaxEngineError::Api {
                status: status.as_u16(),
                message: err_text,
            });
        }

        Ok(res)
    }

    pub async fn generate(&self, messages: &[ChatMessage]) -> Result<Generation> {
        let res = self.send(messages, false).await?;
        let body: ChatCompletionResponse = res.json().await?;

        let content = body
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| TaxEngineError::InvalidResponse("No choices returned".to_string()))?
            .message
            .content
            .ok_or_else(|| TaxEngineError::InvalidResponse("Choice has no content".to_string()))?;

        let prompt_text: String = messages.iter().map(|m| m.content.as_str()).collect();
        let usage = self.usage_for(body.usage.as_ref(), &prompt_text, &content);

        Ok(Generation { content, usage })
    }

    /// Streams a completion, forwarding every text delta to `tx` as a
    /// [`StreamEvent::Chunk`]. Returns `Ok(None)` when the receiver went away,
    /// which also drops the upstream response.
    pub(crate) async fn stream_chat(
        &self,
        messages: &[ChatMessage],
        tx: &Sender<StreamEvent>,
    ) -> Result<Option<StreamedCompletion>> {
        let res = self.send(messages, true).await?;
        let mut body = res.bytes_stream();
        let mut lines = SseLineBuffer::new();
        let mut completion = StreamedCompletion::default();

        while let Some(bytes) = body.next().await {
            let bytes = bytes?;
            for line in lines.push(&bytes) {
                match forward_line(&line, &mut completion, tx).await {
                    LineOutcome::Continue => {}
                    LineOutcome::Finished => return Ok(Some(completion)),
                    LineOutcome::ReceiverDropped => return Ok(None),
                }
            }
        }

        if let Some(line) = lines.finish() {
            if let LineOutcome::ReceiverDropped = forward_line(&line, &mut completion, tx).await {
                return Ok(None);
            }
        }

        debug!("Upstream stream ended without a [DONE] sentinel");
        Ok(Some(completion))
    }
}

async fn forward_line(
    line: &str,
    completion: &mut StreamedCompletion,
    tx: &Sender<StreamEvent>,
) -> LineOutcome {
    match parse_sse_line(line) {
        SseLine::Data(frame) => {
            if let Some(usage) = frame.usage.clone() {
                completion.usage = Some(usage);
            }
            if let Some(text) = frame.content() {
                completion.content.push_str(text);
                let event = StreamEvent::Chunk {
                    content: text.to_string(),
                };
                if tx.send(event).await.is_err() {
                    debug!("Stream receiver dropped, stopping");
                    return LineOutcome::ReceiverDropped;
                }
            }
            LineOutcome::Continue
        }
        SseLine::Done => LineOutcome::Finished,
        SseLine::Ignored => LineOutcome::Continue,
        SseLine::Malformed(e) => {
            warn!("Skipping malformed SSE frame: {}", e);
            LineOutcome::Continue
        }
    }
}
