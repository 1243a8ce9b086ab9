//! Anthropic responder
//!
//! Talks to the Messages API. Requests carry the API key in `x-api-key`
//! and pin the API version header.

use crate::config::ApiProviderConfig;
use crate::error::{ParleyError, Result};
use crate::providers::Responder;
use crate::session::{Message, Role};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Public endpoint used when no base URL is configured
pub const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com/v1";

const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 4096;

/// Responder backed by the Anthropic Messages API
pub struct AnthropicResponder {
    client: Client,
    base_url: String,
    token: String,
    model: String,
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: Vec<MessageInput<'a>>,
}

#[derive(Debug, Serialize)]
struct MessageInput<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    input_tokens: usize,
    #[serde(default)]
    output_tokens: usize,
}

impl AnthropicResponder {
    /// Create a responder for `model`
    ///
    /// # Errors
    ///
    /// Returns `ParleyError::Config` if no token is configured or the HTTP
    /// client cannot be built.
    pub fn new(config: &ApiProviderConfig, model: impl Into<String>) -> Result<Self> {
        let token = config.require_token("anthropic")?.to_string();
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(concat!("parley/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ParleyError::Config(format!("Failed to create HTTP client: {}", e)))?;

        let base_url = config.base_url_or(ANTHROPIC_BASE_URL).to_string();
        let model = model.into();
        tracing::debug!("Initialized Anthropic responder: base_url={}, model={}", base_url, model);

        Ok(Self {
            client,
            base_url,
            token,
            model,
        })
    }

    /// Model name sent with every request
    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_messages<'a>(history: &'a [Message], message: &'a str) -> Vec<MessageInput<'a>> {
        history
            .iter()
            .map(|m| MessageInput {
                role: match m.role {
                    Role::User => "user",
                    Role::Assistant => "assistant",
                },
                content: &m.content,
            })
            .chain(std::iter::once(MessageInput {
                role: "user",
                content: message,
            }))
            .collect()
    }
}

#[async_trait]
impl Responder for AnthropicResponder {
    async fn chat(&self, message: &str) -> Result<String> {
        self.chat_with_history(None, &[], message).await
    }

    async fn chat_with_history(
        &self,
        system_prompt: Option<&str>,
        history: &[Message],
        message: &str,
    ) -> Result<String> {
        let url = format!("{}/messages", self.base_url);
        let request = MessagesRequest {
            model: &self.model,
            max_tokens: MAX_TOKENS,
            system: system_prompt.filter(|s| !s.trim().is_empty()),
            messages: Self::build_messages(history, message),
        };

        tracing::debug!("Sending Anthropic request: {} messages", request.messages.len());

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.token)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Anthropic request failed: {}", e);
                ParleyError::Upstream(format!("Anthropic request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!("Anthropic returned error {}: {}", status, error_text);
            return Err(ParleyError::Upstream(format!(
                "Anthropic returned error {}: {}",
                status, error_text
            ))
            .into());
        }

        let body: MessagesResponse = response.json().await.map_err(|e| {
            tracing::error!("Failed to parse Anthropic response: {}", e);
            ParleyError::Upstream(format!("Failed to parse Anthropic response: {}", e))
        })?;

        if let Some(usage) = &body.usage {
            tracing::debug!(
                "Anthropic response: stop_reason={:?}, input_tokens={}, output_tokens={}",
                body.stop_reason,
                usage.input_tokens,
                usage.output_tokens
            );
        }

        let text: Vec<String> = body
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .map(|block| block.text)
            .collect();
        if text.is_empty() {
            return Err(ParleyError::Upstream("Anthropic returned no text".to_string()).into());
        }
        Ok(text.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::kind;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn responder_for(server: &MockServer) -> AnthropicResponder {
        let config = ApiProviderConfig {
            base_url: Some(server.uri()),
            token: Some("ant-key".to_string()),
            timeout_seconds: 5,
        };
        AnthropicResponder::new(&config, "claude-3-5-sonnet-20241022").unwrap()
    }

    #[test]
    fn test_build_messages_alternates_roles() {
        let history = vec![Message::user("q"), Message::assistant("a")];
        let messages = AnthropicResponder::build_messages(&history, "next");
        let roles: Vec<_> = messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec!["user", "assistant", "user"]);
    }

    #[tokio::test]
    async fn test_chat_sends_headers_and_system_prompt() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/messages"))
            .and(header("x-api-key", "ant-key"))
            .and(header("anthropic-version", ANTHROPIC_VERSION))
            .and(body_string_contains("\"system\":\"You summarize.\""))
            .and(body_string_contains("\"max_tokens\":4096"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "msg_1",
                "type": "message",
                "role": "assistant",
                "content": [{"type": "text", "text": "Summary here"}],
                "stop_reason": "end_turn",
                "usage": {"input_tokens": 10, "output_tokens": 2}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let reply = responder_for(&server)
            .chat_with_history(Some("You summarize."), &[], "text")
            .await
            .unwrap();
        assert_eq!(reply, "Summary here");
    }

    #[tokio::test]
    async fn test_overloaded_maps_to_upstream() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/messages"))
            .respond_with(ResponseTemplate::new(529).set_body_string("overloaded_error"))
            .mount(&server)
            .await;

        let err = responder_for(&server).chat("Hi").await.unwrap_err();
        assert!(matches!(kind(&err), Some(ParleyError::Upstream(msg)) if msg.contains("overloaded_error")));
    }
}
