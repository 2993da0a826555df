use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

use crate::provider::{CompletionProvider, CompletionRequest, CompletionResponse};
use symbiosis_core::{ChatMessage, Result, SymbiosisError};

/// Total attempts per call, including the first.
pub const MAX_ATTEMPTS: u32 = 3;
/// Base delay for exponential backoff (doubles each retry).
pub const BASE_DELAY_MS: u64 = 1000;
/// Hard per-attempt timeout.
pub const REQUEST_TIMEOUT_SECS: u64 = 15;

/// Retry/timeout schedule for a [`CompletionClient`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
            base_delay: Duration::from_millis(BASE_DELAY_MS),
            timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
        }
    }
}

impl RetryPolicy {
    /// Delay slept after failed attempt number `attempt` (1-based): 1s, 2s, 4s, …
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}

/// Classification of a single attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    Ok(Value),
    Retryable(String),
    Fatal(String),
}

/// What every call site receives: a validated object, or the safe-mode sentinel.
#[derive(Debug, Clone, PartialEq)]
pub enum RetryOutcome {
    Parsed(Value),
    SafeMode,
}

impl RetryOutcome {
    /// The fixed object substituted when a call cannot be completed.
    pub fn safe_mode_value() -> Value {
        serde_json::json!({ "mood": "NEUTRAL", "response": "..." })
    }

    pub fn is_safe_mode(&self) -> bool {
        matches!(self, RetryOutcome::SafeMode)
    }

    pub fn into_value(self) -> Value {
        match self {
            RetryOutcome::Parsed(v) => v,
            RetryOutcome::SafeMode => Self::safe_mode_value(),
        }
    }

    pub fn value(&self) -> Value {
        self.clone().into_value()
    }

    /// The parsed object only when it was actually produced by the model.
    pub fn parsed(&self) -> Option<&Value> {
        match self {
            RetryOutcome::Parsed(v) => Some(v),
            RetryOutcome::SafeMode => None,
        }
    }
}

/// Strip a Markdown code fence some models wrap around JSON output.
fn strip_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Decide what one attempt's result means for the retry loop.
///
/// Credential errors are fatal. Everything else that is not a structured
/// object accepted by `validator` is retryable.
pub fn classify<V>(result: Result<CompletionResponse>, validator: &V) -> AttemptOutcome
where
    V: Fn(&Value) -> bool + ?Sized,
{
    let response = match result {
        Ok(r) => r,
        Err(e) if e.is_credential_error() => return AttemptOutcome::Fatal(e.to_string()),
        Err(e) => return AttemptOutcome::Retryable(e.to_string()),
    };
    let parsed: Value = match serde_json::from_str(strip_fence(&response.content)) {
        Ok(v) => v,
        Err(e) => return AttemptOutcome::Retryable(format!("unparsable content: {e}")),
    };
    if !parsed.is_object() {
        return AttemptOutcome::Retryable("content is not a JSON object".into());
    }
    if !validator(&parsed) {
        return AttemptOutcome::Retryable("content failed schema validation".into());
    }
    AttemptOutcome::Ok(parsed)
}

/// Issues structured completion calls with timeout, backoff retry, and
/// per-call validation. Never surfaces an error to its callers.
#[derive(Clone)]
pub struct CompletionClient {
    provider: Arc<dyn CompletionProvider>,
    model: String,
    policy: RetryPolicy,
}

impl CompletionClient {
    pub fn new(provider: Arc<dyn CompletionProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            policy: RetryPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Run one structured call. `label` names the call site in logs.
    pub async fn complete<V>(&self, messages: Vec<ChatMessage>, validator: V, label: &str) -> RetryOutcome
    where
        V: Fn(&Value) -> bool,
    {
        let request = CompletionRequest {
            model: self.model.clone(),
            messages,
            json_mode: true,
        };

        for attempt in 1..=self.policy.max_attempts {
            debug!(label, attempt, "completion attempt");
            let result = self.attempt(&request).await;

            match classify(result, &validator) {
                AttemptOutcome::Ok(parsed) => return RetryOutcome::Parsed(parsed),
                AttemptOutcome::Fatal(reason) => {
                    error!(label, attempt, %reason, "fatal completion error, not retrying");
                    return RetryOutcome::SafeMode;
                }
                AttemptOutcome::Retryable(reason) => {
                    if attempt < self.policy.max_attempts {
                        let delay = self.policy.delay_after(attempt);
                        warn!(
                            label,
                            attempt,
                            max = self.policy.max_attempts,
                            delay_ms = delay.as_millis() as u64,
                            %reason,
                            "retrying after failed attempt"
                        );
                        tokio::time::sleep(delay).await;
                    } else {
                        warn!(label, attempt, %reason, "final attempt failed");
                    }
                }
            }
        }

        error!(label, attempts = self.policy.max_attempts, "completion exhausted retries, using safe mode");
        RetryOutcome::SafeMode
    }

    /// One provider call bounded by the hard timeout.
    async fn attempt(&self, request: &CompletionRequest) -> Result<CompletionResponse> {
        match tokio::time::timeout(self.policy.timeout, self.provider.complete(request)).await {
            Ok(result) => result,
            Err(_) => Err(SymbiosisError::Timeout {
                secs: self.policy.timeout.as_secs(),
            }),
        }
    }
}

/// Validator helper: `key` is present and a non-empty string.
pub fn has_text(value: &Value, key: &str) -> bool {
    value
        .get(key)
        .and_then(Value::as_str)
        .is_some_and(|s| !s.trim().is_empty())
}

/// Validator helper: `key` is present and a boolean.
pub fn has_bool(value: &Value, key: &str) -> bool {
    value.get(key).is_some_and(Value::is_boolean)
}

/// Validator helper: `key` is present and an array.
pub fn has_array(value: &Value, key: &str) -> bool {
    value.get(key).is_some_and(Value::is_array)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::Usage;

    fn ok(content: &str) -> Result<CompletionResponse> {
        Ok(CompletionResponse {
            content: content.into(),
            usage: Usage::default(),
        })
    }

    #[test]
    fn test_delay_schedule_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_after(1), Duration::from_millis(1000));
        assert_eq!(policy.delay_after(2), Duration::from_millis(2000));
        assert_eq!(policy.delay_after(3), Duration::from_millis(4000));
    }

    #[test]
    fn test_classify_credentials_fatal() {
        let outcome = classify(Err(SymbiosisError::Credentials { status: 401 }), &|_: &Value| true);
        assert!(matches!(outcome, AttemptOutcome::Fatal(_)));
    }

    #[test]
    fn test_classify_server_error_retryable() {
        let err = SymbiosisError::Http { status: 503, body: String::new() };
        assert!(matches!(classify(Err(err), &|_: &Value| true), AttemptOutcome::Retryable(_)));
    }

    #[test]
    fn test_classify_rejects_non_object_and_bad_json() {
        assert!(matches!(classify(ok("[1,2]"), &|_: &Value| true), AttemptOutcome::Retryable(_)));
        assert!(matches!(classify(ok("not json"), &|_: &Value| true), AttemptOutcome::Retryable(_)));
    }

    #[test]
    fn test_classify_runs_validator() {
        let validator = |v: &Value| has_text(v, "intent");
        assert!(matches!(classify(ok("{\"x\":1}"), &validator), AttemptOutcome::Retryable(_)));
        assert!(matches!(classify(ok("{\"intent\":\"CHAT\"}"), &validator), AttemptOutcome::Ok(_)));
    }

    #[test]
    fn test_classify_strips_code_fence() {
        let outcome = classify(ok("```json\n{\"a\": true}\n```"), &|v: &Value| has_bool(v, "a"));
        assert!(matches!(outcome, AttemptOutcome::Ok(_)));
    }

    #[test]
    fn test_safe_mode_value() {
        let v = RetryOutcome::SafeMode.into_value();
        assert_eq!(v["mood"], "NEUTRAL");
        assert_eq!(v["response"], "...");
    }
}
