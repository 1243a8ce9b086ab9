//! Responder trait and model identifiers
//!
//! The session core only ever talks to a model through [`Responder`]: send
//! one message, or send a message on top of an existing history.

use crate::error::{ParleyError, Result};
use crate::session::Message;
use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;

/// A model binding in `provider:model` form
///
/// The string is split on the first colon only, so model names that carry
/// their own tag (`llama3.2:latest`) survive intact.
///
/// # Examples
///
/// ```
/// use parley::providers::ModelId;
///
/// let id = ModelId::parse("ollama:llama3.2:latest").unwrap();
/// assert_eq!(id.provider(), "ollama");
/// assert_eq!(id.model(), "llama3.2:latest");
/// assert!(ModelId::parse("llama3.2").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModelId {
    provider: String,
    model: String,
}

impl ModelId {
    /// Parse a `provider:model` string
    ///
    /// # Errors
    ///
    /// Returns `ParleyError::Config` if there is no colon or either half is
    /// empty.
    pub fn parse(input: &str) -> Result<Self> {
        match input.trim().split_once(':') {
            Some((provider, model)) if !provider.is_empty() && !model.is_empty() => Ok(Self {
                provider: provider.to_string(),
                model: model.to_string(),
            }),
            _ => Err(ParleyError::Config(format!(
                "invalid model format: {:?} (expected provider:model, e.g. ollama:llama3.2)",
                input
            ))
            .into()),
        }
    }

    /// Provider half
    pub fn provider(&self) -> &str {
        &self.provider
    }

    /// Model half
    pub fn model(&self) -> &str {
        &self.model
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.provider, self.model)
    }
}

impl FromStr for ModelId {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Sends messages to a model and returns its reply
///
/// Implementations map every transport or protocol failure to
/// `ParleyError::Upstream`.
#[async_trait]
pub trait Responder: Send + Sync {
    /// Send a single message with no history
    async fn chat(&self, message: &str) -> Result<String>;

    /// Send `message` after `history`, optionally under a system prompt
    ///
    /// `history` must not already contain `message`.
    async fn chat_with_history(
        &self,
        system_prompt: Option<&str>,
        history: &[Message],
        message: &str,
    ) -> Result<String>;
}
