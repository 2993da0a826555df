use async_trait::async_trait;
use symbiosis_core::{Result, SymbiosisError};
use tracing::debug;

use crate::provider::*;

/// Default OpenAI-compatible endpoint (OpenRouter).
pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// OpenAI-compatible chat-completions provider (OpenRouter, OpenAI, vLLM, etc.)
pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    provider_name: String,
    app_title: Option<String>,
}

impl OpenAiProvider {
    pub fn new(api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: DEFAULT_BASE_URL.into(),
            provider_name: "openrouter".into(),
            app_title: None,
        }
    }

    /// Use a custom base URL (for OpenAI, Together, vLLM, etc.)
    pub fn with_base_url(mut self, url: String, name: String) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self.provider_name = name;
        self
    }

    /// Sent as `X-Title` so the request shows up under this app in the provider dashboard.
    pub fn with_app_title(mut self, title: impl Into<String>) -> Self {
        self.app_title = Some(title.into());
        self
    }

    fn build_body(request: &CompletionRequest) -> serde_json::Value {
        let messages: Vec<serde_json::Value> = request
            .messages
            .iter()
            .map(|m| {
                serde_json::json!({
                    "role": m.role.as_str(),
                    "content": m.content,
                })
            })
            .collect();

        let mut body = serde_json::json!({
            "model": &request.model,
            "messages": messages,
            // OpenRouter flag plus the xAI passthrough form
            "include_reasoning": false,
            "reasoning": { "enabled": false },
        });
        if request.json_mode {
            body["response_format"] = serde_json::json!({ "type": "json_object" });
        }
        body
    }
}

#[async_trait]
impl CompletionProvider for OpenAiProvider {
    fn name(&self) -> &str {
        &self.provider_name
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse> {
        let body = Self::build_body(request);

        let mut req = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body);
        if let Some(ref title) = self.app_title {
            req = req.header("X-Title", title);
        }

        let resp = req.send().await.map_err(|e| {
            if e.is_timeout() {
                SymbiosisError::Timeout { secs: 0 }
            } else {
                SymbiosisError::Completion(e.to_string())
            }
        })?;

        let status = resp.status();
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(SymbiosisError::Credentials {
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(SymbiosisError::Http {
                status: status.as_u16(),
                body: text,
            });
        }

        let data: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| SymbiosisError::InvalidResponse(e.to_string()))?;

        let content = data["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| SymbiosisError::InvalidResponse("missing choices[0].message.content".into()))?
            .to_string();

        let usage_data = &data["usage"];
        let usage = Usage {
            input_tokens: usage_data["prompt_tokens"].as_u64().unwrap_or(0) as u32,
            output_tokens: usage_data["completion_tokens"].as_u64().unwrap_or(0) as u32,
        };
        debug!(
            provider = %self.provider_name,
            tokens = usage.total_tokens(),
            "completion received"
        );

        Ok(CompletionResponse { content, usage })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use symbiosis_core::ChatMessage;

    #[test]
    fn test_body_requests_json_object() {
        let request = CompletionRequest {
            model: "x-ai/grok-4.1-fast".into(),
            messages: vec![ChatMessage::system("classify")],
            json_mode: true,
        };
        let body = OpenAiProvider::build_body(&request);
        assert_eq!(body["response_format"]["type"], "json_object");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["include_reasoning"], false);
    }

    #[test]
    fn test_body_plain_mode_has_no_format() {
        let request = CompletionRequest {
            model: "m".into(),
            messages: vec![ChatMessage::user("hi")],
            json_mode: false,
        };
        assert!(OpenAiProvider::build_body(&request).get("response_format").is_none());
    }
}
