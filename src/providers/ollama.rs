//! Ollama responder
//!
//! Talks to a local or remote Ollama server through its `/api/chat`
//! endpoint with streaming turned off.

use crate::config::OllamaConfig;
use crate::error::{ParleyError, Result};
use crate::providers::Responder;
use crate::session::{Message, Role};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Responder backed by an Ollama server
///
/// # Examples
///
/// ```
/// use parley::config::OllamaConfig;
/// use parley::providers::OllamaResponder;
///
/// let responder = OllamaResponder::new(OllamaConfig::default(), "llama3.2:latest").unwrap();
/// assert_eq!(responder.host(), "http://localhost:11434");
/// assert_eq!(responder.model(), "llama3.2:latest");
/// ```
pub struct OllamaResponder {
    client: Client,
    host: String,
    model: String,
}

/// Request body for `/api/chat`
#[derive(Debug, Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    messages: Vec<OllamaMessage>,
    stream: bool,
}

/// Message in Ollama's wire format
#[derive(Debug, Serialize, Deserialize)]
struct OllamaMessage {
    role: String,
    #[serde(default)]
    content: String,
}

/// Response body from `/api/chat`
#[derive(Debug, Deserialize)]
struct OllamaResponse {
    message: OllamaMessage,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    prompt_eval_count: usize,
    #[serde(default)]
    eval_count: usize,
}

impl OllamaResponder {
    /// Create a responder for `model` on the server in `config`
    ///
    /// # Errors
    ///
    /// Returns `ParleyError::Config` if the HTTP client cannot be built.
    pub fn new(config: OllamaConfig, model: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(concat!("parley/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ParleyError::Config(format!("Failed to create HTTP client: {}", e)))?;

        let model = model.into();
        tracing::debug!("Initialized Ollama responder: host={}, model={}", config.host, model);

        Ok(Self {
            client,
            host: config.host.trim_end_matches('/').to_string(),
            model,
        })
    }

    /// Server base URL
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Model name sent with every request
    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_messages(
        system_prompt: Option<&str>,
        history: &[Message],
        message: &str,
    ) -> Vec<OllamaMessage> {
        let mut messages = Vec::with_capacity(history.len() + 2);

        if let Some(system) = system_prompt.filter(|s| !s.trim().is_empty()) {
            messages.push(OllamaMessage {
                role: "system".to_string(),
                content: system.to_string(),
            });
        }

        messages.extend(history.iter().map(|m| OllamaMessage {
            role: match m.role {
                Role::User => "user".to_string(),
                Role::Assistant => "assistant".to_string(),
            },
            content: m.content.clone(),
        }));

        messages.push(OllamaMessage {
            role: "user".to_string(),
            content: message.to_string(),
        });

        messages
    }
}

#[async_trait]
impl Responder for OllamaResponder {
    async fn chat(&self, message: &str) -> Result<String> {
        self.chat_with_history(None, &[], message).await
    }

    async fn chat_with_history(
        &self,
        system_prompt: Option<&str>,
        history: &[Message],
        message: &str,
    ) -> Result<String> {
        let url = format!("{}/api/chat", self.host);
        let request = OllamaRequest {
            model: &self.model,
            messages: Self::build_messages(system_prompt, history, message),
            stream: false,
        };

        tracing::debug!("Sending Ollama request: {} messages", request.messages.len());

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Ollama request failed: {}", e);
                ParleyError::Upstream(format!("Ollama request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!("Ollama returned error {}: {}", status, error_text);
            return Err(ParleyError::Upstream(format!(
                "Ollama returned error {}: {}",
                status, error_text
            ))
            .into());
        }

        let ollama_response: OllamaResponse = response.json().await.map_err(|e| {
            tracing::error!("Failed to parse Ollama response: {}", e);
            ParleyError::Upstream(format!("Failed to parse Ollama response: {}", e))
        })?;

        tracing::debug!(
            "Ollama response: done={}, prompt_tokens={}, completion_tokens={}",
            ollama_response.done,
            ollama_response.prompt_eval_count,
            ollama_response.eval_count
        );

        Ok(ollama_response.message.content)
    }
}
