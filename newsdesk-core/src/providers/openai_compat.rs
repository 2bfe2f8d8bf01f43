//! OpenAI-compatible generation provider.
//!
//! Talks to any endpoint that follows the OpenAI chat completions format
//! (OpenAI, Azure OpenAI, Ollama, vLLM, LM Studio).

use super::map_transport_error;
use crate::brain::GenerationProvider;
use crate::config::LlmConfig;
use crate::error::LlmError;
use crate::types::ChatMessage;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::debug;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI-compatible chat completion provider.
pub struct OpenAiCompatibleProvider {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: usize,
    temperature: f32,
    context_window: usize,
    timeout_secs: u64,
}

impl OpenAiCompatibleProvider {
    /// Create a provider from configuration.
    ///
    /// Local endpoints (`localhost`, `127.0.0.1`) do not need an API key.
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let is_local = config
            .base_url
            .as_ref()
            .map(|u| u.contains("localhost") || u.contains("127.0.0.1"))
            .unwrap_or(false);

        let api_key = match config.resolve_api_key() {
            Ok(key) => key,
            Err(_) if is_local => {
                debug!("No API key set for local provider; using dummy bearer token");
                "ollama".to_string()
            }
            Err(e) => {
                return Err(LlmError::AuthFailed {
                    provider: format!("OpenAI-compatible: {e}"),
                });
            }
        };
        Self::new_with_key(config, api_key)
    }

    /// Create a provider with an already resolved API key.
    pub fn new_with_key(config: &LlmConfig, api_key: String) -> Result<Self, LlmError> {
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| LlmError::Connection {
                message: format!("Failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            base_url,
            api_key,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            context_window: config.context_window,
            timeout_secs: config.request_timeout_secs,
        })
    }

    fn messages_to_json(messages: &[ChatMessage]) -> Vec<Value> {
        messages
            .iter()
            .map(|m| json!({ "role": m.role.to_string(), "content": m.content }))
            .collect()
    }

    fn build_request_body(&self, messages: &[ChatMessage]) -> Value {
        json!({
            "model": self.model,
            "messages": Self::messages_to_json(messages),
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
            "stream": false,
        })
    }

    /// Pull the assistant text out of a chat completion body.
    fn parse_response(body: &Value) -> Result<String, LlmError> {
        let choice = body
            .get("choices")
            .and_then(|c| c.get(0))
            .ok_or_else(|| LlmError::ResponseParse {
                message: "No choices in response".to_string(),
            })?;

        let message = choice
            .get("message")
            .ok_or_else(|| LlmError::ResponseParse {
                message: "No message in choice".to_string(),
            })?;

        let text = message
            .get("content")
            .and_then(|c| c.as_str())
            .unwrap_or("");
        if text.trim().is_empty() {
            return Err(LlmError::EmptyResponse);
        }
        Ok(text.to_string())
    }

    fn map_http_error(status: reqwest::StatusCode, body: &str) -> LlmError {
        match status.as_u16() {
            401 | 403 => {
                debug!(body = %body, "Authentication failed");
                LlmError::AuthFailed {
                    provider: "OpenAI-compatible".to_string(),
                }
            }
            429 => {
                // "Rate limit reached ... try again in 20s"
                let retry_secs = serde_json::from_str::<Value>(body)
                    .ok()
                    .and_then(|v| {
                        v.get("error")?
                            .get("message")?
                            .as_str()
                            .map(|s| s.to_string())
                    })
                    .and_then(|msg| {
                        msg.split("in ")
                            .last()
                            .and_then(|s| s.trim().trim_end_matches(['s', '.']).parse::<u64>().ok())
                    })
                    .unwrap_or(5);
                LlmError::RateLimited {
                    retry_after_secs: retry_secs,
                }
            }
            code if code >= 500 => LlmError::Connection {
                message: format!("Server error ({status}): {body}"),
            },
            _ => LlmError::ApiRequest {
                message: format!("HTTP {status}: {body}"),
            },
        }
    }
}

#[async_trait]
impl GenerationProvider for OpenAiCompatibleProvider {
    async fn generate(&self, messages: &[ChatMessage]) -> Result<String, LlmError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.build_request_body(messages);

        debug!(url = %url, model = %self.model, "Sending chat completion request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| map_transport_error(e, self.timeout_secs))?;

        let status = response.status();
        let response_body = response.text().await.map_err(|e| LlmError::ApiRequest {
            message: format!("Failed to read response body: {e}"),
        })?;

        if !status.is_success() {
            return Err(Self::map_http_error(status, &response_body));
        }

        let json: Value =
            serde_json::from_str(&response_body).map_err(|e| LlmError::ResponseParse {
                message: format!("Invalid JSON: {e}"),
            })?;

        Self::parse_response(&json)
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn context_window(&self) -> usize {
        self.context_window
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> LlmConfig {
        LlmConfig {
            api_key: Some("sk-test".into()),
            api_key_env: "NEWSDESK_TEST_OPENAI_KEY_UNUSED".into(),
            ..LlmConfig::default()
        }
    }

    #[test]
    fn test_messages_to_json() {
        let json = OpenAiCompatibleProvider::messages_to_json(&[
            ChatMessage::system("be brief"),
            ChatMessage::user("hello"),
        ]);
        assert_eq!(json[0]["role"], "system");
        assert_eq!(json[0]["content"], "be brief");
        assert_eq!(json[1]["role"], "user");
    }

    #[test]
    fn test_request_body_carries_limits() {
        let provider = OpenAiCompatibleProvider::new(&test_config()).unwrap();
        let body = provider.build_request_body(&[ChatMessage::user("q")]);
        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["max_tokens"], 4096);
        assert_eq!(body["stream"], false);
    }

    #[test]
    fn test_parse_text_response() {
        let body = json!({
            "choices": [{
                "message": {"role": "assistant", "content": "## TL;DR\nA quiet day."},
                "finish_reason": "stop"
            }]
        });
        let text = OpenAiCompatibleProvider::parse_response(&body).unwrap();
        assert_eq!(text, "## TL;DR\nA quiet day.");
    }

    #[test]
    fn test_parse_response_no_choices() {
        let body = json!({"choices": []});
        let err = OpenAiCompatibleProvider::parse_response(&body).unwrap_err();
        assert!(matches!(err, LlmError::ResponseParse { .. }));
    }

    #[test]
    fn test_parse_response_null_content_is_empty() {
        let body = json!({"choices": [{"message": {"content": null}}]});
        let err = OpenAiCompatibleProvider::parse_response(&body).unwrap_err();
        assert!(matches!(err, LlmError::EmptyResponse));
    }

    #[test]
    fn test_http_error_mapping_401() {
        let err = OpenAiCompatibleProvider::map_http_error(
            reqwest::StatusCode::UNAUTHORIZED,
            "Unauthorized",
        );
        assert!(matches!(err, LlmError::AuthFailed { .. }));
    }

    #[test]
    fn test_http_error_mapping_429_reads_retry_hint() {
        let err = OpenAiCompatibleProvider::map_http_error(
            reqwest::StatusCode::TOO_MANY_REQUESTS,
            r#"{"error":{"message":"Rate limit reached. Please try again in 20s"}}"#,
        );
        match err {
            LlmError::RateLimited { retry_after_secs } => assert_eq!(retry_after_secs, 20),
            other => panic!("Expected RateLimited, got {other:?}"),
        }
    }

    #[test]
    fn test_http_error_mapping_500_is_transient() {
        let err = OpenAiCompatibleProvider::map_http_error(
            reqwest::StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error",
        );
        match err {
            LlmError::Connection { message } => assert!(message.contains("500")),
            other => panic!("Expected Connection, got {other:?}"),
        }
    }

    #[test]
    fn test_new_missing_key() {
        let config = LlmConfig {
            api_key_env: "NEWSDESK_TEST_OPENAI_KEY_MISSING".into(),
            ..LlmConfig::default()
        };
        let result = OpenAiCompatibleProvider::new(&config);
        assert!(matches!(result, Err(LlmError::AuthFailed { .. })));
    }

    #[test]
    fn test_local_endpoint_needs_no_key() {
        let config = LlmConfig {
            api_key_env: "NEWSDESK_TEST_OPENAI_KEY_MISSING".into(),
            base_url: Some("http://localhost:11434/v1/".into()),
            model: "llama3.1:8b".into(),
            ..LlmConfig::default()
        };
        let provider = OpenAiCompatibleProvider::new(&config).unwrap();
        assert_eq!(provider.base_url, "http://localhost:11434/v1");
        assert_eq!(provider.model_name(), "llama3.1:8b");
    }
}
