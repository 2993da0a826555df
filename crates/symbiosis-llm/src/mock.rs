//! Mock completion provider for deterministic testing.
//!
//! Returns pre-configured responses without making any HTTP calls.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::provider::*;
use symbiosis_core::{Result, SymbiosisError};

/// A mock provider that returns pre-configured responses.
///
/// Responses come from two places: *rules*, matched when the prompt contains
/// a marker string and reusable any number of times, and a FIFO *queue* used
/// when no rule matches.
///
/// # Example
/// ```
/// use symbiosis_llm::mock::MockProvider;
/// let provider = MockProvider::new("test")
///     .with_json(serde_json::json!({"response": "hi", "mood": "JOYFUL"}));
/// ```
pub struct MockProvider {
    responses: Arc<Mutex<Vec<MockResponse>>>,
    rules: Arc<Mutex<Vec<(String, MockResponse)>>>,
    /// Track all requests received (for assertions in tests).
    pub requests: Arc<Mutex<Vec<CompletionRequest>>>,
    name: String,
}

/// A pre-configured response from the mock provider.
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// Raw content returned as the candidate message.
    Text(String),
    /// Non-2xx HTTP status (401/403 map to credential errors).
    Status(u16),
    /// Network-level failure.
    Transport(String),
    /// Never answers within any sane timeout.
    Hang,
}

impl MockResponse {
    pub fn json(value: serde_json::Value) -> Self {
        MockResponse::Text(value.to_string())
    }
}

impl MockProvider {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(vec![])),
            rules: Arc::new(Mutex::new(vec![])),
            requests: Arc::new(Mutex::new(vec![])),
            name: name.into(),
        }
    }

    /// Queue a raw text response.
    pub fn with_response(self, text: &str) -> Self {
        self.push(MockResponse::Text(text.to_string()));
        self
    }

    /// Queue a structured response.
    pub fn with_json(self, value: serde_json::Value) -> Self {
        self.push(MockResponse::json(value));
        self
    }

    /// Queue an HTTP status failure.
    pub fn with_status(self, status: u16) -> Self {
        self.push(MockResponse::Status(status));
        self
    }

    /// Queue a fully custom response.
    pub fn with_mock_response(self, resp: MockResponse) -> Self {
        self.push(resp);
        self
    }

    /// Answer every request whose prompt contains `marker` with `value`.
    pub fn with_rule(self, marker: &str, value: serde_json::Value) -> Self {
        self.rules
            .lock()
            .unwrap()
            .push((marker.to_string(), MockResponse::json(value)));
        self
    }

    /// Queue a response directly (for mutable access patterns).
    pub fn queue_response(&self, resp: MockResponse) {
        self.push(resp);
    }

    /// Get all requests that were made to this provider.
    pub fn recorded_requests(&self) -> Arc<Mutex<Vec<CompletionRequest>>> {
        Arc::clone(&self.requests)
    }

    /// Number of requests received so far.
    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Number of recorded prompts containing `marker`.
    pub fn calls_matching(&self, marker: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.prompt_text().contains(marker))
            .count()
    }

    fn push(&self, resp: MockResponse) {
        self.responses.lock().unwrap().push(resp);
    }

    /// Rule match first, then the queue, then a non-JSON placeholder.
    fn next_response(&self, prompt: &str) -> MockResponse {
        if let Some((_, resp)) = self
            .rules
            .lock()
            .unwrap()
            .iter()
            .find(|(marker, _)| prompt.contains(marker.as_str()))
        {
            return resp.clone();
        }
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            MockResponse::Text("(mock: no more queued responses)".to_string())
        } else {
            responses.remove(0)
        }
    }
}

#[async_trait]
impl CompletionProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse> {
        self.requests.lock().unwrap().push(request.clone());
        match self.next_response(&request.prompt_text()) {
            MockResponse::Text(content) => Ok(CompletionResponse {
                content,
                usage: Usage {
                    input_tokens: 100,
                    output_tokens: 50,
                },
            }),
            MockResponse::Status(status) if status == 401 || status == 403 => {
                Err(SymbiosisError::Credentials { status })
            }
            MockResponse::Status(status) => Err(SymbiosisError::Http {
                status,
                body: "mock failure".into(),
            }),
            MockResponse::Transport(msg) => Err(SymbiosisError::Completion(msg)),
            MockResponse::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(SymbiosisError::Completion("mock hang elapsed".into()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use symbiosis_core::ChatMessage;

    fn request(text: &str) -> CompletionRequest {
        CompletionRequest {
            model: "test".into(),
            messages: vec![ChatMessage::system(text)],
            json_mode: true,
        }
    }

    #[tokio::test]
    async fn test_mock_text_response() {
        let provider = MockProvider::new("mock").with_response("{\"ok\":true}");
        let resp = provider.complete(&request("hi")).await.unwrap();
        assert_eq!(resp.content, "{\"ok\":true}");
    }

    #[tokio::test]
    async fn test_mock_status_maps_credentials() {
        let provider = MockProvider::new("mock").with_status(403).with_status(500);
        let first = provider.complete(&request("a")).await.unwrap_err();
        assert!(first.is_credential_error());
        let second = provider.complete(&request("b")).await.unwrap_err();
        assert!(matches!(second, SymbiosisError::Http { status: 500, .. }));
    }

    #[tokio::test]
    async fn test_mock_rules_take_precedence_and_repeat() {
        let provider = MockProvider::new("mock")
            .with_rule("TIMEKEEPER", serde_json::json!({"valid": true}))
            .with_response("queued");
        let a = provider.complete(&request("TIMEKEEPER check")).await.unwrap();
        let b = provider.complete(&request("TIMEKEEPER again")).await.unwrap();
        let c = provider.complete(&request("other")).await.unwrap();
        assert_eq!(a.content, b.content);
        assert_eq!(c.content, "queued");
        assert_eq!(provider.calls_matching("TIMEKEEPER"), 2);
    }

    #[tokio::test]
    async fn test_mock_multiple_responses_in_order() {
        let provider = MockProvider::new("mock")
            .with_response("first")
            .with_response("second");
        let r1 = provider.complete(&request("x")).await.unwrap();
        let r2 = provider.complete(&request("x")).await.unwrap();
        assert_eq!(r1.content, "first");
        assert_eq!(r2.content, "second");
        assert_eq!(provider.call_count(), 2);
    }
}
