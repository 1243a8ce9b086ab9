//! Gemini responder
//!
//! Calls `models/<model>:generateContent`. The API key travels as the `key`
//! query parameter and assistant turns use the role name `model`.

use crate::config::ApiProviderConfig;
use crate::error::{ParleyError, Result};
use crate::providers::Responder;
use crate::session::{Message, Role};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Public endpoint used when no base URL is configured
pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Responder backed by the Gemini generateContent API
pub struct GeminiResponder {
    client: Client,
    base_url: String,
    token: String,
    model: String,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<SystemInstruction<'a>>,
}

#[derive(Debug, Serialize)]
struct SystemInstruction<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

impl GeminiResponder {
    /// Create a responder for `model`
    ///
    /// # Errors
    ///
    /// Returns `ParleyError::Config` if no token is configured or the HTTP
    /// client cannot be built.
    pub fn new(config: &ApiProviderConfig, model: impl Into<String>) -> Result<Self> {
        let token = config.require_token("gemini")?.to_string();
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(concat!("parley/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ParleyError::Config(format!("Failed to create HTTP client: {}", e)))?;

        let base_url = config.base_url_or(GEMINI_BASE_URL).to_string();
        let model = model.into();
        tracing::debug!("Initialized Gemini responder: base_url={}, model={}", base_url, model);

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

    fn build_contents<'a>(history: &'a [Message], message: &'a str) -> Vec<Content<'a>> {
        history
            .iter()
            .map(|m| Content {
                role: match m.role {
                    Role::User => "user",
                    Role::Assistant => "model",
                },
                parts: vec![Part { text: &m.content }],
            })
            .chain(std::iter::once(Content {
                role: "user",
                parts: vec![Part { text: message }],
            }))
            .collect()
    }
}

#[async_trait]
impl Responder for GeminiResponder {
    async fn chat(&self, message: &str) -> Result<String> {
        self.chat_with_history(None, &[], message).await
    }

    async fn chat_with_history(
        &self,
        system_prompt: Option<&str>,
        history: &[Message],
        message: &str,
    ) -> Result<String> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let request = GenerateRequest {
            contents: Self::build_contents(history, message),
            system_instruction: system_prompt
                .filter(|s| !s.trim().is_empty())
                .map(|text| SystemInstruction {
                    parts: vec![Part { text }],
                }),
        };

        tracing::debug!("Sending Gemini request: {} contents", request.contents.len());

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.token.as_str())])
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                // reqwest errors include the URL, which carries the key
                let e = e.without_url();
                tracing::error!("Gemini request failed: {}", e);
                ParleyError::Upstream(format!("Gemini request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!("Gemini returned error {}: {}", status, error_text);
            return Err(ParleyError::Upstream(format!(
                "Gemini returned error {}: {}",
                status, error_text
            ))
            .into());
        }

        let body: GenerateResponse = response.json().await.map_err(|e| {
            let e = e.without_url();
            tracing::error!("Failed to parse Gemini response: {}", e);
            ParleyError::Upstream(format!("Failed to parse Gemini response: {}", e))
        })?;

        let text: Vec<String> = body
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| content.parts.into_iter().map(|p| p.text).collect())
            .unwrap_or_default();
        if text.iter().all(|t| t.is_empty()) {
            return Err(ParleyError::Upstream("Gemini returned no candidates".to_string()).into());
        }
        Ok(text.concat())
    }
}
