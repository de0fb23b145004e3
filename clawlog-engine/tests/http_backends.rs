//! Backends against a one-shot local HTTP server.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::thread::{self, JoinHandle};

use clawlog_engine::{GeminiSummarizer, OpenAiSummarizer, SummarizeError, Summarizer};

struct Captured {
    request_line: String,
    headers: Vec<String>,
    body: String,
}

/// Serve a single request with `status` and `body`, returning what was sent.
fn serve_once(status: u16, body: &'static str) -> (String, JoinHandle<Captured>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let handle = thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let mut reader = BufReader::new(stream.try_clone().unwrap());

        let mut request_line = String::new();
        reader.read_line(&mut request_line).unwrap();
        let mut headers = Vec::new();
        let mut content_length = 0usize;
        loop {
            let mut line = String::new();
            reader.read_line(&mut line).unwrap();
            let line = line.trim_end().to_string();
            if line.is_empty() {
                break;
            }
            if let Some((name, value)) = line.split_once(':') {
                if name.eq_ignore_ascii_case("content-length") {
                    content_length = value.trim().parse().unwrap();
                }
            }
            headers.push(line);
        }
        let mut buf = vec![0u8; content_length];
        reader.read_exact(&mut buf).unwrap();

        let mut stream = stream;
        write!(
            stream,
            "HTTP/1.1 {status} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        )
        .unwrap();
        stream.flush().unwrap();

        Captured {
            request_line: request_line.trim_end().to_string(),
            headers,
            body: String::from_utf8(buf).unwrap(),
        }
    });
    (base, handle)
}

fn has_header(captured: &Captured, name: &str, value: &str) -> bool {
    captured.headers.iter().any(|h| {
        h.split_once(':')
            .map(|(n, v)| n.eq_ignore_ascii_case(name) && v.trim() == value)
            .unwrap_or(false)
    })
}

#[test]
fn gemini_request_and_reply() {
    let (base, server) = serve_once(
        200,
        r####"{"candidates":[{"content":{"parts":[{"text":"### 📂 api"}]},"finishReason":"STOP"}]}"####,
    );
    let summary = GeminiSummarizer::new("g-key", "gemini-2.5-flash", "English")
        .with_base_url(base)
        .summarize("diff text")
        .unwrap();
    assert_eq!(summary, "### 📂 api");

    let captured = server.join().unwrap();
    assert_eq!(
        captured.request_line,
        "POST /v1beta/models/gemini-2.5-flash:generateContent HTTP/1.1"
    );
    assert!(has_header(&captured, "x-goog-api-key", "g-key"));
    let body: serde_json::Value = serde_json::from_str(&captured.body).unwrap();
    assert!(body["contents"][0]["parts"][0]["text"]
        .as_str()
        .unwrap()
        .ends_with("diff text"));
}

#[test]
fn openai_request_and_reply() {
    let (base, server) = serve_once(
        200,
        r#"{"choices":[{"message":{"role":"assistant","content":"report"},"finish_reason":"stop"}]}"#,
    );
    let summary = OpenAiSummarizer::new("sk-test", "gpt-4o-mini", "English")
        .with_base_url(base)
        .summarize("diff text")
        .unwrap();
    assert_eq!(summary, "report");

    let captured = server.join().unwrap();
    assert_eq!(captured.request_line, "POST /v1/chat/completions HTTP/1.1");
    assert!(has_header(&captured, "authorization", "Bearer sk-test"));
    let body: serde_json::Value = serde_json::from_str(&captured.body).unwrap();
    assert_eq!(body["temperature"], 0.7);
    assert_eq!(body["messages"].as_array().unwrap().len(), 2);
}

#[test]
fn rate_limit_maps_to_quota_error() {
    let (base, server) = serve_once(429, r#"{"error":{"code":429}}"#);
    let err = OpenAiSummarizer::new("sk", "gpt-4o-mini", "English")
        .with_base_url(base)
        .summarize("x")
        .unwrap_err();
    server.join().unwrap();
    assert!(matches!(err, SummarizeError::QuotaExceeded { .. }), "got: {err}");
}

#[test]
fn unknown_model_maps_to_model_not_found() {
    let (base, server) = serve_once(404, r#"{"error":{"status":"NOT_FOUND"}}"#);
    let err = GeminiSummarizer::new("k", "gemini-0", "English")
        .with_base_url(base)
        .summarize("x")
        .unwrap_err();
    server.join().unwrap();
    match err {
        SummarizeError::ModelNotFound { model, .. } => assert_eq!(model, "gemini-0"),
        other => panic!("expected ModelNotFound, got {other}"),
    }
}

#[test]
fn empty_candidates_is_empty_response() {
    let (base, server) = serve_once(200, r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#);
    let err = GeminiSummarizer::new("k", "m", "English")
        .with_base_url(base)
        .summarize("x")
        .unwrap_err();
    server.join().unwrap();
    assert!(err.to_string().contains("SAFETY"), "got: {err}");
}

#[test]
fn unreachable_host_is_transport_error() {
    // Bind then drop to get a port nothing listens on.
    let port = TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    let err = OpenAiSummarizer::new("sk", "m", "English")
        .with_base_url(format!("http://127.0.0.1:{port}"))
        .summarize("x")
        .unwrap_err();
    assert!(matches!(err, SummarizeError::Transport { .. }), "got: {err}");
}
