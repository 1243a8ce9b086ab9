//! OpenAI responder
//!
//! Uses the Responses API: the system prompt travels as `instructions` and
//! the conversation as a list of `input` messages.

use crate::config::ApiProviderConfig;
use crate::error::{ParleyError, Result};
use crate::providers::Responder;
use crate::session::{Message, Role};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Public endpoint used when no base URL is configured
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Responder backed by the OpenAI Responses API
pub struct OpenAiResponder {
    client: Client,
    base_url: String,
    token: String,
    model: String,
}

#[derive(Debug, Serialize)]
struct ResponsesRequest<'a> {
    model: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    instructions: Option<&'a str>,
    input: Vec<InputMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct InputMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ResponsesResponse {
    #[serde(default)]
    status: String,
    #[serde(default)]
    error: Option<ApiError>,
    #[serde(default)]
    output: Vec<OutputItem>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct OutputItem {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    content: Vec<OutputContent>,
}

#[derive(Debug, Deserialize)]
struct OutputContent {
    #[serde(default)]
    text: String,
}

impl OpenAiResponder {
    /// Create a responder for `model`
    ///
    /// # Errors
    ///
    /// Returns `ParleyError::Config` if no token is configured or the HTTP
    /// client cannot be built.
    pub fn new(config: &ApiProviderConfig, model: impl Into<String>) -> Result<Self> {
        let token = config.require_token("openai")?.to_string();
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(concat!("parley/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ParleyError::Config(format!("Failed to create HTTP client: {}", e)))?;

        let base_url = config.base_url_or(OPENAI_BASE_URL).to_string();
        let model = model.into();
        tracing::debug!("Initialized OpenAI responder: base_url={}, model={}", base_url, model);

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

    fn build_input<'a>(history: &'a [Message], message: &'a str) -> Vec<InputMessage<'a>> {
        history
            .iter()
            .map(|m| InputMessage {
                role: match m.role {
                    Role::User => "user",
                    Role::Assistant => "assistant",
                },
                content: &m.content,
            })
            .chain(std::iter::once(InputMessage {
                role: "user",
                content: message,
            }))
            .collect()
    }

    fn extract_text(response: ResponsesResponse) -> Result<String> {
        if let Some(error) = response.error {
            return Err(ParleyError::Upstream(format!("OpenAI error: {}", error.message)).into());
        }

        let text: Vec<String> = response
            .output
            .into_iter()
            .filter(|item| item.kind == "message")
            .flat_map(|item| item.content)
            .map(|content| content.text)
            .filter(|text| !text.is_empty())
            .collect();

        if text.is_empty() {
            return Err(ParleyError::Upstream(format!(
                "OpenAI returned no text (status: {})",
                response.status
            ))
            .into());
        }
        Ok(text.join("\n"))
    }
}

#[async_trait]
impl Responder for OpenAiResponder {
    async fn chat(&self, message: &str) -> Result<String> {
        self.chat_with_history(None, &[], message).await
    }

    async fn chat_with_history(
        &self,
        system_prompt: Option<&str>,
        history: &[Message],
        message: &str,
    ) -> Result<String> {
        let url = format!("{}/responses", self.base_url);
        let request = ResponsesRequest {
            model: &self.model,
            instructions: system_prompt.filter(|s| !s.trim().is_empty()),
            input: Self::build_input(history, message),
        };

        tracing::debug!("Sending OpenAI request: {} messages", request.input.len());

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("OpenAI request failed: {}", e);
                ParleyError::Upstream(format!("OpenAI request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!("OpenAI returned error {}: {}", status, error_text);
            return Err(ParleyError::Upstream(format!(
                "OpenAI returned error {}: {}",
                status, error_text
            ))
            .into());
        }

        let body: ResponsesResponse = response.json().await.map_err(|e| {
            tracing::error!("Failed to parse OpenAI response: {}", e);
            ParleyError::Upstream(format!("Failed to parse OpenAI response: {}", e))
        })?;

        Self::extract_text(body)
    }
}
