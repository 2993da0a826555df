#[cfg(test)]
mod tests {
    use serde_json::{Value, json};
    use std::sync::Arc;
    use std::time::Duration;
    use symbiosis_core::ChatMessage;
    use symbiosis_llm::client::{CompletionClient, RetryOutcome, has_text};
    use symbiosis_llm::mock::{MockProvider, MockResponse};
    use tokio::time::Instant;

    fn prompt() -> Vec<ChatMessage> {
        vec![ChatMessage::system("classify this")]
    }

    fn client(mock: &Arc<MockProvider>) -> CompletionClient {
        CompletionClient::new(Arc::clone(mock) as Arc<dyn symbiosis_llm::CompletionProvider>, "mock/model")
    }

    // ── Retry schedule ─────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn test_always_failing_validator_exhausts_three_attempts() {
        let mock = Arc::new(
            MockProvider::new("mock")
                .with_json(json!({"a": 1}))
                .with_json(json!({"a": 2}))
                .with_json(json!({"a": 3})),
        );
        let start = Instant::now();
        let outcome = client(&mock).complete(prompt(), |_: &Value| false, "Test").await;

        assert!(outcome.is_safe_mode());
        assert_eq!(mock.call_count(), 3);
        // 1s after the first failure, 2s after the second
        assert!(start.elapsed() >= Duration::from_millis(3000));
        assert_eq!(outcome.into_value(), RetryOutcome::safe_mode_value());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unauthorized_is_not_retried() {
        let mock = Arc::new(MockProvider::new("mock").with_status(401).with_json(json!({"ok": true})));
        let start = Instant::now();
        let outcome = client(&mock).complete(prompt(), |_: &Value| true, "Auth").await;

        assert!(outcome.is_safe_mode());
        assert_eq!(mock.call_count(), 1);
        assert!(start.elapsed() < Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_forbidden_is_not_retried() {
        let mock = Arc::new(MockProvider::new("mock").with_status(403));
        let outcome = client(&mock).complete(prompt(), |_: &Value| true, "Auth").await;
        assert!(outcome.is_safe_mode());
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_error_then_success() {
        let mock = Arc::new(
            MockProvider::new("mock")
                .with_status(500)
                .with_json(json!({"response": "hello", "mood": "JOYFUL"})),
        );
        let outcome = client(&mock)
            .complete(prompt(), |v: &Value| has_text(v, "response"), "Gen")
            .await;
        assert_eq!(mock.call_count(), 2);
        assert_eq!(outcome.parsed().unwrap()["response"], "hello");
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_content_is_retried() {
        let mock = Arc::new(
            MockProvider::new("mock")
                .with_response("definitely not json")
                .with_mock_response(MockResponse::Transport("connection reset".into()))
                .with_json(json!({"intent": "CHAT"})),
        );
        let outcome = client(&mock)
            .complete(prompt(), |v: &Value| has_text(v, "intent"), "Director")
            .await;
        assert_eq!(mock.call_count(), 3);
        assert_eq!(outcome.parsed().unwrap()["intent"], "CHAT");
    }

    #[tokio::test(start_paused = true)]
    async fn test_schema_rejection_retries_until_valid() {
        let mock = Arc::new(
            MockProvider::new("mock")
                .with_json(json!({"is_duplicate": "maybe"}))
                .with_json(json!({"is_duplicate": false})),
        );
        let outcome = client(&mock)
            .complete(
                prompt(),
                |v: &Value| v.get("is_duplicate").is_some_and(Value::is_boolean),
                "Dedup",
            )
            .await;
        assert_eq!(mock.call_count(), 2);
        assert_eq!(outcome.parsed().unwrap()["is_duplicate"], false);
    }

    // ── Timeout ────────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn test_hung_provider_times_out_each_attempt() {
        let mock = Arc::new(
            MockProvider::new("mock")
                .with_mock_response(MockResponse::Hang)
                .with_mock_response(MockResponse::Hang)
                .with_mock_response(MockResponse::Hang),
        );
        let start = Instant::now();
        let outcome = client(&mock).complete(prompt(), |_: &Value| true, "Slow").await;

        assert!(outcome.is_safe_mode());
        assert_eq!(mock.call_count(), 3);
        // three 15s timeouts plus 1s and 2s of backoff
        assert!(start.elapsed() >= Duration::from_secs(48));
        assert!(start.elapsed() < Duration::from_secs(3600));
    }

    // ── Request shape ──────────────────────────────────────────

    #[tokio::test]
    async fn test_request_is_structured_and_recorded() {
        let mock = Arc::new(MockProvider::new("mock").with_json(json!({"ok": true})));
        client(&mock).complete(prompt(), |_: &Value| true, "Shape").await;

        let recorded = mock.recorded_requests();
        let recorded = recorded.lock().unwrap();
        assert_eq!(recorded.len(), 1);
        assert!(recorded[0].json_mode);
        assert_eq!(recorded[0].model, "mock/model");
        assert_eq!(recorded[0].messages[0].content, "classify this");
    }
}
