use log::{error, info};
use tokio::sync::mpsc::{self, Receiver, Sender};

use crate::error::Result;
use crate::llm::client::OpenRouterClient;
use crate::llm::types::{AnswerRequest, ChatMessage, PreparedAnswer, TaxAnswer};
use crate::rag::{
    build_system_prompt, calculate_confidence, disclaimer_for, get_response_strategy,
    select_context_results, PromptContext,
};
use crate::schema::ConfidenceLevel;
use crate::stream::{citations_from_results, StreamEvent, TokenUsage};

const EVENT_BUFFER: usize = 64;
const APOLOGY: &str = "Sorry, I ran into a problem generating an answer. Please try again in a moment.";

/// Scores retrieval, builds the prompt for the question.
pub fn prepare_answer(request: &AnswerRequest) -> PreparedAnswer {
    let profile = request.profile.as_ref();
    let confidence = calculate_confidence(&request.results, &request.query, profile);
    let strategy = get_response_strategy(&confidence);

    let system_prompt = build_system_prompt(&PromptContext {
        query: &request.query,
        results: &request.results,
        profile,
        confidence: &confidence,
        strategy: &strategy,
    });

    let cited: Vec<_> = if strategy.use_rag_context {
        select_context_results(&request.results, confidence.level)
            .into_iter()
            .cloned()
            .collect()
    } else {
        Vec::new()
    };

    PreparedAnswer {
        citations: citations_from_results(&cited),
        confidence,
        strategy,
        system_prompt,
    }
}

fn conversation(request: &AnswerRequest, system_prompt: &str) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(request.history.len() + 2);
    messages.push(ChatMessage::system(system_prompt));
    messages.extend(request.history.iter().cloned());
    messages.push(ChatMessage::user(request.query.clone()));
    messages
}

#[derive(Clone)]
pub struct TaxAssistant {
    client: OpenRouterClient,
}

impl TaxAssistant {
    pub fn new(client: OpenRouterClient) -> Self {
        Self { client }
    }

    /// Answers a question in one request.
    pub async fn ask(&self, request: &AnswerRequest) -> Result<TaxAnswer> {
        let prepared = prepare_answer(request);
        let messages = conversation(request, &prepared.system_prompt);
        let generation = self.client.generate(&messages).await?;

        Ok(TaxAnswer {
            content: generation.content,
            disclaimer: disclaimer_for(prepared.confidence.level).to_string(),
            confidence: prepared.confidence,
            citations: prepared.citations,
            usage: generation.usage,
        })
    }

    /// Streams an answer as [`StreamEvent`]s: `status`, `citations`, any
    /// number of `chunk`s, `metadata`, then `done`.
    ///
    /// Upstream failures never surface as errors: the stream carries an
    /// apology chunk and `low` confidence metadata instead. Dropping the
    /// receiver stops generation.
    pub fn generate_stream(&self, request: AnswerRequest) -> Receiver<StreamEvent> {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let client = self.client.clone();

        tokio::spawn(async move {
            run_stream(client, request, tx).await;
        });

        rx
    }
}

async fn run_stream(client: OpenRouterClient, request: AnswerRequest, tx: Sender<StreamEvent>) {
    let prepared = prepare_answer(&request);

    let status = StreamEvent::Status {
        message: "Searching official CRA guidance".to_string(),
        sources: prepared.citations.iter().map(|c| c.title.clone()).collect(),
    };
    if tx.send(status).await.is_err() {
        return;
    }

    let citations = StreamEvent::Citations {
        citations: prepared.citations.clone(),
    };
    if tx.send(citations).await.is_err() {
        return;
    }

    let messages = conversation(&request, &prepared.system_prompt);

    let metadata = match client.stream_chat(&messages, &tx).await {
        Ok(Some(completion)) => {
            let prompt_text: String = messages.iter().map(|m| m.content.as_str()).collect();
            let usage = client.usage_for(completion.usage.as_ref(), &prompt_text, &completion.content);
            info!(
                "Streamed answer: {} chars, {} confidence, {} tokens",
                completion.content.len(),
                prepared.confidence.level,
                usage.total_tokens()
            );
            StreamEvent::Metadata {
                confidence: prepared.confidence.level,
                disclaimer: disclaimer_for(prepared.confidence.level).to_string(),
                usage,
            }
        }
        Ok(None) => return,
        Err(e) => {
            error!("Answer generation failed: {}", e);
            let apology = StreamEvent::Chunk {
                content: APOLOGY.to_string(),
            };
            if tx.send(apology).await.is_err() {
                return;
            }
            StreamEvent::Metadata {
                confidence: ConfidenceLevel::Low,
                disclaimer: disclaimer_for(ConfidenceLevel::Low).to_string(),
                usage: TokenUsage::default(),
            }
        }
    };

    if tx.send(metadata).await.is_err() {
        return;
    }
    let _ = tx.send(StreamEvent::Done).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::{SearchResult, UserProfile};

    #[test]
    fn test_prepare_answer_cites_selected_results() {
        let request = AnswerRequest {
            query: "What is the RRSP deadline?".to_string(),
            results: vec![
                SearchResult::new("1", "RRSP deadline", "60 days after year end", 0.64),
                SearchResult::new("2", "RRSP limits", "18% of earned income", 0.58),
                SearchResult::new("3", "Spousal RRSP", "Attribution rules", 0.55),
                SearchResult::new("4", "GST credit", "Quarterly payments", 0.30),
            ],
            profile: Some(UserProfile::default()),
            history: Vec::new(),
        };

        let prepared = prepare_answer(&request);
        assert_eq!(prepared.confidence.level, ConfidenceLevel::High);
        assert_eq!(prepared.citations.len(), 3);
        assert!(prepared.system_prompt.contains("RRSP deadline"));
    }

    #[test]
    fn test_conversation_order() {
        let request = AnswerRequest {
            query: "And for 2023?".to_string(),
            history: vec![
                ChatMessage::user("What is the TFSA limit?"),
                ChatMessage::assistant("$7,000 for 2024."),
            ],
            ..Default::default()
        };
        let messages = conversation(&request, "system");
        let roles: Vec<&str> = messages.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, vec!["system", "user", "assistant", "user"]);
        assert_eq!(messages[3].content, "And for 2023?");
    }
}
