#![cfg(feature = "openrouter")]

use anyhow::Result;
use tax_time_machine::llm::{AnswerRequest, OpenRouterClient, TaxAssistant};
use tax_time_machine::*;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc::Receiver;

/// Serves exactly one HTTP response, then closes the connection.
async fn fake_upstream(status_line: &'static str, content_type: &'static str, body: String) -> Result<String> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;

    tokio::spawn(async move {
        let Ok((mut socket, _)) = listener.accept().await else {
            return;
        };

        let mut request = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let Ok(n) = socket.read(&mut buf).await else {
                return;
            };
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
            if request_complete(&request) {
                break;
            }
        }

        let response = format!(
            "{}\r\nContent-Type: {}\r\nConnection: close\r\n\r\n{}",
            status_line, content_type, body
        );
        let _ = socket.write_all(response.as_bytes()).await;
        let _ = socket.shutdown().await;
    });

    Ok(format!("http://{}", addr))
}

fn request_complete(request: &[u8]) -> bool {
    let text = String::from_utf8_lossy(request);
    let Some(header_end) = text.find("\r\n\r\n") else {
        return false;
    };
    let content_length = text[..header_end]
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse::<usize>().ok())
                .flatten()
        })
        .unwrap_or(0);
    request.len() >= header_end + 4 + content_length
}

fn frame(content: &str) -> String {
    format!(
        "data: {}\n\n",
        serde_json::json!({ "choices": [{ "delta": { "content": content } }] })
    )
}

fn assistant_for(base_url: String) -> TaxAssistant {
    let config = LlmConfig::new("sk-test").with_base_url(base_url);
    TaxAssistant::new(OpenRouterClient::new(config).unwrap())
}

fn rrsp_request() -> AnswerRequest {
    AnswerRequest {
        query: "When is the RRSP contribution deadline?".to_string(),
        results: vec![
            SearchResult::new("1", "RRSP deadline", "60 days after the end of the year.", 0.66),
            SearchResult::new("2", "RRSP deduction limit", "18% of earned income.", 0.60),
            SearchResult::new("3", "Unused contributions", "Carry forward indefinitely.", 0.55),
        ],
        ..Default::default()
    }
}

async fn collect(mut rx: Receiver<StreamEvent>) -> Vec<StreamEvent> {
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn test_stream_forwards_chunks_in_order() -> Result<()> {
    let body = [
        ": OPENROUTER PROCESSING\n\n".to_string(),
        frame("The deadline "),
        "data: {not json}\n\n".to_string(),
        frame("is March 1."),
        "data: {\"choices\":[],\"usage\":{\"prompt_tokens\":420,\"completion_tokens\":12}}\n\n".to_string(),
        "data: [DONE]\n\n".to_string(),
    ]
    .concat();

    let base_url = fake_upstream("HTTP/1.1 200 OK", "text/event-stream", body).await?;
    let events = collect(assistant_for(base_url).generate_stream(rrsp_request())).await;

    let names: Vec<&str> = events.iter().map(|e| e.event_name()).collect();
    assert_eq!(
        names,
        vec!["status", "citations", "chunk", "chunk", "metadata", "done"]
    );

    match &events[1] {
        StreamEvent::Citations { citations } => assert_eq!(citations.len(), 3),
        other => panic!("expected citations, got {:?}", other),
    }

    let text: String = events
        .iter()
        .filter_map(|e| match e {
            StreamEvent::Chunk { content } => Some(content.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(text, "The deadline is March 1.");

    match &events[4] {
        StreamEvent::Metadata {
            confidence, usage, ..
        } => {
            assert_eq!(*confidence, ConfidenceLevel::High);
            assert_eq!(usage.prompt_tokens, 420);
            assert_eq!(usage.completion_tokens, 12);
            assert!(usage.cost_usd > 0.0);
        }
        other => panic!("expected metadata, got {:?}", other),
    }

    assert!(events.last().is_some_and(|e| e.is_terminal()));
    Ok(())
}

#[tokio::test]
async fn test_upstream_failure_degrades_to_apology() -> Result<()> {
    let base_url = fake_upstream(
        "HTTP/1.1 500 Internal Server Error",
        "application/json",
        "{\"error\":\"overloaded\"}".to_string(),
    )
    .await?;

    let events = collect(assistant_for(base_url).generate_stream(rrsp_request())).await;

    let names: Vec<&str> = events.iter().map(|e| e.event_name()).collect();
    assert_eq!(names, vec!["status", "citations", "chunk", "metadata", "done"]);

    match &events[2] {
        StreamEvent::Chunk { content } => assert!(content.starts_with("Sorry")),
        other => panic!("expected apology chunk, got {:?}", other),
    }
    match &events[3] {
        StreamEvent::Metadata {
            confidence,
            usage,
            disclaimer,
        } => {
            assert_eq!(*confidence, ConfidenceLevel::Low);
            assert_eq!(usage.total_tokens(), 0);
            assert!(!disclaimer.is_empty());
        }
        other => panic!("expected metadata, got {:?}", other),
    }
    Ok(())
}

#[tokio::test]
async fn test_stream_without_done_sentinel_still_completes() -> Result<()> {
    let body = format!("{}{}", frame("Partial "), frame("answer"));
    let base_url = fake_upstream("HTTP/1.1 200 OK", "text/event-stream", body).await?;

    let events = collect(assistant_for(base_url).generate_stream(rrsp_request())).await;
    let names: Vec<&str> = events.iter().map(|e| e.event_name()).collect();
    assert_eq!(
        names,
        vec!["status", "citations", "chunk", "chunk", "metadata", "done"]
    );

    match &events[4] {
        StreamEvent::Metadata { usage, .. } => {
            // No upstream usage frame, so both sides are estimated
            assert!(usage.prompt_tokens > 0);
            assert_eq!(usage.completion_tokens, 4);
        }
        other => panic!("expected metadata, got {:?}", other),
    }
    Ok(())
}

#[tokio::test]
async fn test_non_streaming_answer() -> Result<()> {
    let body = serde_json::json!({
        "choices": [{ "message": { "role": "assistant", "content": "March 1, 2024." } }],
        "usage": { "prompt_tokens": 300, "completion_tokens": 5 }
    })
    .to_string();
    let base_url = fake_upstream("HTTP/1.1 200 OK", "application/json", body).await?;

    let answer = assistant_for(base_url).ask(&rrsp_request()).await?;
    assert_eq!(answer.content, "March 1, 2024.");
    assert_eq!(answer.confidence.level, ConfidenceLevel::High);
    assert_eq!(answer.citations.len(), 3);
    assert_eq!(answer.usage.total_tokens(), 305);
    Ok(())
}

#[tokio::test]
async fn test_non_streaming_error_status() {
    let base_url = fake_upstream(
        "HTTP/1.1 401 Unauthorized",
        "application/json",
        "{\"error\":\"bad key\"}".to_string(),
    )
    .await
    .unwrap();

    let err = assistant_for(base_url)
        .ask(&rrsp_request())
        .await
        .unwrap_err();
    assert!(matches!(err, TaxEngineError::Api { status: 401, .. }));
}
