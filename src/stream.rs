//! Typed events for streamed answers and parsing of upstream SSE frames.
//!
//! The generator emits [`StreamEvent`]s over a channel; a transport adapter
//! (HTTP SSE, WebSocket, ...) encodes them, e.g. with [`StreamEvent::to_sse`].

use crate::error::Result;
use crate::rag::types::SearchResult;
use crate::schema::ConfidenceLevel;
use serde::{Deserialize, Serialize};

const EXCERPT_CHARS: usize = 200;
const DONE_SENTINEL: &str = "[DONE]";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Citation {
    pub title: String,
    pub url: Option<String>,
    pub source_type: String,
    pub excerpt: String,
}

pub fn citations_from_results(results: &[SearchResult]) -> Vec<Citation> {
    results
        .iter()
        .map(|r| Citation {
            title: r.title.clone(),
            url: r.url.clone(),
            source_type: r.source_type.clone(),
            excerpt: excerpt(&r.content, EXCERPT_CHARS),
        })
        .collect()
}

fn excerpt(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", text[..idx].trim_end()),
        None => text.to_string(),
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub cost_usd: f64,
}

impl TokenUsage {
    pub fn total_tokens(&self) -> u32 {
        self.prompt_tokens + self.completion_tokens
    }
}

/// Rough token count used when the provider does not report usage.
pub fn estimate_tokens(text: &str) -> u32 {
    text.chars().count().div_ceil(4) as u32
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamEvent {
    Status {
        message: String,
        sources: Vec<String>,
    },
    Citations {
        citations: Vec<Citation>,
    },
    Chunk {
        content: String,
    },
    Metadata {
        confidence: ConfidenceLevel,
        disclaimer: String,
        usage: TokenUsage,
    },
    Done,
}

impl StreamEvent {
    pub fn event_name(&self) -> &'static str {
        match self {
            StreamEvent::Status { .. } => "status",
            StreamEvent::Citations { .. } => "citations",
            StreamEvent::Chunk { .. } => "chunk",
            StreamEvent::Metadata { .. } => "metadata",
            StreamEvent::Done => "done",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Done)
    }

    /// Encodes the event as one Server-Sent-Events frame.
    pub fn to_sse(&self) -> Result<String> {
        let data = serde_json::to_string(self)?;
        Ok(format!("event: {}\ndata: {}\n\n", self.event_name(), data))
    }
}

// ---------------------------------------------------------------------------
// Upstream (OpenAI-compatible) streaming frames
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ApiUsage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ChunkDelta {
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ChunkChoice {
    #[serde(default)]
    pub delta: ChunkDelta,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ChatCompletionChunk {
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
    #[serde(default)]
    pub usage: Option<ApiUsage>,
}

impl ChatCompletionChunk {
    pub fn content(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|c| c.delta.content.as_deref())
            .filter(|c| !c.is_empty())
    }
}

#[derive(Debug)]
pub enum SseLine {
    Data(ChatCompletionChunk),
    Done,
    /// Blank lines, comments (`: keep-alive`) and non-data fields.
    Ignored,
    Malformed(serde_json::Error),
}

pub fn parse_sse_line(line: &str) -> SseLine {
    let line = line.trim();
    let Some(payload) = line.strip_prefix("data:") else {
        return SseLine::Ignored;
    };
    let payload = payload.trim_start();

    if payload == DONE_SENTINEL {
        return SseLine::Done;
    }
    if payload.is_empty() {
        return SseLine::Ignored;
    }

    match serde_json::from_str::<ChatCompletionChunk>(payload) {
        Ok(chunk) => SseLine::Data(chunk),
        Err(e) => SseLine::Malformed(e),
    }
}

/// Splits an incoming byte stream into lines. Bytes are buffered until a
/// newline arrives so multi-byte characters split across reads stay intact.
#[derive(Debug, Default)]
pub struct SseLineBuffer {
    buffer: Vec<u8>,
}

impl SseLineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);

        let mut lines = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let text = String::from_utf8_lossy(&line[..line.len() - 1]);
            lines.push(text.trim_end_matches('\r').to_string());
        }
        lines
    }

    /// Any trailing partial line once the stream has ended.
    pub fn finish(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        let rest = String::from_utf8_lossy(&self.buffer).trim().to_string();
        self.buffer.clear();
        (!rest.is_empty()).then_some(rest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_data_frame() {
        let line = r#"data: {"choices":[{"delta":{"content":"Hello"},"finish_reason":null}]}"#;
        match parse_sse_line(line) {
            SseLine::Data(chunk) => assert_eq!(chunk.content(), Some("Hello")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parse_done_and_ignored() {
        assert!(matches!(parse_sse_line("data: [DONE]"), SseLine::Done));
        assert!(matches!(parse_sse_line(""), SseLine::Ignored));
        assert!(matches!(
            parse_sse_line(": OPENROUTER PROCESSING"),
            SseLine::Ignored
        ));
        assert!(matches!(parse_sse_line("data: {not json"), SseLine::Malformed(_)));
    }

    #[test]
    fn test_usage_only_frame_has_no_content() {
        let line = r#"data: {"choices":[],"usage":{"prompt_tokens":120,"completion_tokens":45}}"#;
        match parse_sse_line(line) {
            SseLine::Data(chunk) => {
                assert_eq!(chunk.content(), None);
                assert_eq!(chunk.usage.unwrap().completion_tokens, 45);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_line_buffer_handles_split_utf8() {
        let mut buffer = SseLineBuffer::new();
        let frame = "data: Québec\n".as_bytes();
        let split = frame.iter().position(|&b| b == 0xC3).unwrap() + 1;

        assert!(buffer.push(&frame[..split]).is_empty());
        let lines = buffer.push(&frame[split..]);
        assert_eq!(lines, vec!["data: Québec".to_string()]);
        assert_eq!(buffer.finish(), None);
    }

    #[test]
    fn test_line_buffer_crlf_and_trailing() {
        let mut buffer = SseLineBuffer::new();
        let lines = buffer.push(b"data: a\r\n\r\ndata: b");
        assert_eq!(lines, vec!["data: a".to_string(), String::new()]);
        assert_eq!(buffer.finish(), Some("data: b".to_string()));
    }

    #[test]
    fn test_event_sse_encoding() {
        let event = StreamEvent::Chunk {
            content: "RRSP".to_string(),
        };
        let frame = event.to_sse().unwrap();
        assert_eq!(
            frame,
            "event: chunk\ndata: {\"type\":\"chunk\",\"content\":\"RRSP\"}\n\n"
        );
        assert_eq!(StreamEvent::Done.to_sse().unwrap(), "event: done\ndata: {\"type\":\"done\"}\n\n");
    }

    #[test]
    fn test_citation_excerpt_truncated() {
        let long = "é".repeat(250);
        let results = vec![SearchResult::new("1", "Long", long, 0.7)];
        let citations = citations_from_results(&results);
        assert_eq!(citations[0].excerpt.chars().count(), 203);
        assert!(citations[0].excerpt.ends_with("..."));
    }

    #[test]
    fn test_estimate_tokens() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
    }
}
