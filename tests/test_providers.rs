#![cfg(all(feature = "openai", feature = "gemini"))]

use llmflow_rs::prelude::*;
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_test::{assert_err, assert_ok};

/// One request as seen by the local responder
#[derive(Debug, Clone)]
struct Captured {
    request_line: String,
    headers: Vec<(String, String)>,
    body: String,
}

impl Captured {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    fn json(&self) -> Value {
        serde_json::from_str(&self.body).unwrap()
    }
}

type Requests = Arc<Mutex<Vec<Captured>>>;

/// Start a throwaway HTTP server that answers every request with `status` and
/// `body`. Returns its base URL and the requests it received.
async fn respond_with(status: u16, body: Value) -> (String, Requests) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let requests: Requests = Arc::new(Mutex::new(Vec::new()));

    let seen = requests.clone();
    let body = body.to_string();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let seen = seen.clone();
            let body = body.clone();
            tokio::spawn(async move { handle(stream, status, &body, &seen).await });
        }
    });

    (base, requests)
}

async fn handle(mut stream: TcpStream, status: u16, body: &str, seen: &Requests) {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        let n = stream.read(&mut chunk).await.unwrap();
        if n == 0 {
            return;
        }
        buffer.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buffer.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buffer[..header_end]).to_string();
    let mut lines = head.split("\r\n").filter(|line| !line.is_empty());
    let request_line = lines.next().unwrap_or_default().to_string();
    let headers: Vec<(String, String)> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect();

    let content_length = headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.parse::<usize>().ok())
        .unwrap_or(0);
    while buffer.len() < header_end + content_length {
        let n = stream.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buffer.extend_from_slice(&chunk[..n]);
    }
    let request_body = String::from_utf8_lossy(&buffer[header_end..]).to_string();

    seen.lock().unwrap().push(Captured {
        request_line,
        headers,
        body: request_body,
    });

    let response = format!(
        "HTTP/1.1 {status} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        reason(status),
        body.len()
    );
    stream.write_all(response.as_bytes()).await.unwrap();
    stream.shutdown().await.ok();
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        401 => "Unauthorized",
        404 => "Not Found",
        429 => "Too Many Requests",
        _ => "Internal Server Error",
    }
}

fn openai_at(base: &str) -> OpenAiProvider {
    OpenAiProvider::from_settings(
        &ProviderSettings::default().with_openai_base_url(format!("{base}/v1")),
    )
    .unwrap()
}

fn gemini_at(base: &str) -> GeminiProvider {
    GeminiProvider::from_settings(
        &ProviderSettings::default().with_gemini_base_url(format!("{base}/v1beta")),
    )
    .unwrap()
}

fn openai_config() -> LlmConfig {
    LlmConfig::new(Provider::OpenAi, "sk-test")
}

fn gemini_config() -> LlmConfig {
    LlmConfig::new(Provider::Gemini, "AIza-test")
}

#[tokio::test]
async fn test_openai_chat_completion_request() {
    let (base, requests) = respond_with(
        200,
        json!({"choices": [{"index": 0, "message": {"role": "assistant", "content": "4"}}]}),
    )
    .await;

    let text = assert_ok!(openai_at(&base).generate("2+2?", &openai_config()).await);
    assert_eq!(text, "4");

    let requests = requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.request_line, "POST /v1/chat/completions HTTP/1.1");
    assert_eq!(request.header("authorization"), Some("Bearer sk-test"));
    assert_eq!(
        request.json(),
        json!({
            "model": "gpt-4",
            "messages": [{"role": "user", "content": "2+2?"}],
            "temperature": 0.7,
            "max_tokens": 1000
        })
    );
}

#[tokio::test]
async fn test_openai_empty_content_falls_back() {
    let (base, _) = respond_with(
        200,
        json!({"choices": [{"message": {"role": "assistant", "content": null}}]}),
    )
    .await;

    let text = openai_at(&base)
        .generate("hi", &openai_config())
        .await
        .unwrap();
    assert_eq!(text, "No response generated");
}

#[tokio::test]
async fn test_openai_status_mapping() {
    let cases = [
        (
            429,
            json!({"error": {"message": "You exceeded your current quota"}}),
            ProviderError::QuotaExceeded,
        ),
        (
            404,
            json!({"error": {"message": "The model `gpt-5` does not exist"}}),
            ProviderError::InvalidModel,
        ),
        (
            401,
            json!({"error": {"message": "Incorrect API key provided: sk-test.", "code": "invalid_api_key"}}),
            ProviderError::InvalidApiKey,
        ),
        (
            500,
            json!({"error": {"message": "The server had an error while processing your request."}}),
            ProviderError::Upstream(
                "The server had an error while processing your request.".to_string(),
            ),
        ),
    ];

    for (status, body, expected) in cases {
        let (base, _) = respond_with(status, body).await;
        let err = assert_err!(openai_at(&base).generate("hi", &openai_config()).await);
        assert_eq!(err, expected, "status {status}");
    }
}

#[tokio::test]
async fn test_quota_message_wording() {
    let (base, _) = respond_with(429, json!({"error": {"message": "slow down"}})).await;
    let err = openai_at(&base)
        .generate("hi", &openai_config())
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "API quota exceeded. Please check your billing details and plan limits."
    );
}

#[tokio::test]
async fn test_gemini_generate_content_request() {
    let (base, requests) = respond_with(
        200,
        json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "Bonjour"}]},
                "finishReason": "STOP"
            }]
        }),
    )
    .await;

    let config = gemini_config().with_temperature(0.1).with_max_tokens(5);
    let text = gemini_at(&base).generate("Say hello in French", &config).await;
    assert_eq!(assert_ok!(text), "Bonjour");

    let requests = requests.lock().unwrap();
    let request = &requests[0];
    assert_eq!(
        request.request_line,
        "POST /v1beta/models/gemini-pro:generateContent HTTP/1.1"
    );
    assert_eq!(request.header("x-goog-api-key"), Some("AIza-test"));
    assert_eq!(request.header("authorization"), None);
    assert_eq!(
        request.json(),
        json!({"contents": [{"role": "user", "parts": [{"text": "Say hello in French"}]}]})
    );
}

#[tokio::test]
async fn test_gemini_errors_and_fallback() {
    let (base, _) = respond_with(
        400,
        json!({"error": {"code": 400, "message": "API key not valid. Please pass a valid API key.", "status": "INVALID_ARGUMENT"}}),
    )
    .await;
    let err = gemini_at(&base)
        .generate("hi", &gemini_config())
        .await
        .unwrap_err();
    assert_eq!(err, ProviderError::InvalidApiKey);

    let (base, _) = respond_with(404, json!({"error": {"message": "models/gemini-pro is not found"}})).await;
    let err = gemini_at(&base)
        .generate("hi", &gemini_config())
        .await
        .unwrap_err();
    assert_eq!(err, ProviderError::InvalidModel);

    let (base, _) = respond_with(200, json!({"candidates": []})).await;
    let text = gemini_at(&base)
        .generate("hi", &gemini_config())
        .await
        .unwrap();
    assert_eq!(text, "No response generated");
}

#[tokio::test]
async fn test_unreachable_endpoint_is_upstream_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let err = openai_at(&base)
        .generate("hi", &openai_config())
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Upstream(_)), "{err:?}");
}

#[tokio::test]
async fn test_workflow_runs_against_http_provider() {
    let (base, _) = respond_with(
        200,
        json!({"choices": [{"message": {"role": "assistant", "content": "4"}}]}),
    )
    .await;
    let settings = ProviderSettings::default().with_openai_base_url(format!("{base}/v1"));
    let executor = WorkflowExecutor::from_settings(&settings).unwrap();

    let mut graph = WorkflowGraph::initial();
    graph
        .update_node_data("input-1", InputData::new("2+2?").to_data())
        .unwrap();
    graph
        .update_node_data("llm-1", openai_config().to_data())
        .unwrap();

    let notifier = Arc::new(MemoryNotifier::new());
    let ctx = WorkflowContext::new(NodeStore::new(graph.nodes), notifier.clone());
    let nodes = executor.trigger(&ctx).await.unwrap();

    let output = first_of_kind(&nodes, NodeKind::Output).unwrap().output_data();
    assert_eq!(output.value, "Generated Output (via openai):\n\n4");
    assert!(notifier.errors().is_empty());
}

#[tokio::test]
async fn test_workflow_reports_http_failure() {
    let (base, _) = respond_with(
        404,
        json!({"error": {"message": "The model `gpt-7` does not exist"}}),
    )
    .await;
    let settings = ProviderSettings::default().with_openai_base_url(format!("{base}/v1"));
    let executor = WorkflowExecutor::from_settings(&settings).unwrap();

    let mut graph = WorkflowGraph::initial();
    graph
        .update_node_data("input-1", InputData::new("hi").to_data())
        .unwrap();
    graph
        .update_node_data("llm-1", openai_config().with_model("gpt-7").to_data())
        .unwrap();

    let notifier = Arc::new(MemoryNotifier::new());
    let ctx = WorkflowContext::new(NodeStore::new(graph.nodes), notifier.clone());
    let nodes = executor.trigger(&ctx).await.unwrap();

    let output = first_of_kind(&nodes, NodeKind::Output).unwrap().output_data();
    assert_eq!(
        output.value,
        "Error: The selected model is not available. Please check the model name."
    );
    assert!(!output.is_loading);
    assert_eq!(notifier.errors()[0].title, "Invalid Model");
}
