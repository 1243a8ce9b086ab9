//! Responder implementations for Parley
//!
//! This module contains the [`Responder`] abstraction the session core
//! talks to, the `provider:model` identifier, and one adapter per provider.

pub mod anthropic;
pub mod base;
pub mod gemini;
pub mod ollama;
pub mod openai;

pub use anthropic::AnthropicResponder;
pub use base::{ModelId, Responder};
pub use gemini::GeminiResponder;
pub use ollama::OllamaResponder;
pub use openai::OpenAiResponder;

use crate::config::ProvidersConfig;
use crate::error::{ParleyError, Result};

/// Providers with a shipped responder
pub const SUPPORTED_PROVIDERS: &[&str] = &["ollama", "openai", "anthropic", "gemini"];

/// Create the responder for `model`
///
/// # Errors
///
/// Returns `ParleyError::Config` if the provider is unknown or the
/// responder cannot be initialized, for example a hosted provider with no
/// token.
///
/// # Examples
///
/// ```
/// use parley::config::ProvidersConfig;
/// use parley::providers::{create_responder, ModelId};
///
/// let model = ModelId::parse("ollama:llama3.2:latest").unwrap();
/// assert!(create_responder(&model, &ProvidersConfig::default()).is_ok());
///
/// let unknown = ModelId::parse("acme:large").unwrap();
/// assert!(create_responder(&unknown, &ProvidersConfig::default()).is_err());
/// ```
pub fn create_responder(model: &ModelId, config: &ProvidersConfig) -> Result<Box<dyn Responder>> {
    match model.provider() {
        "ollama" => Ok(Box::new(OllamaResponder::new(
            config.ollama.clone(),
            model.model(),
        )?)),
        "openai" => Ok(Box::new(OpenAiResponder::new(&config.openai, model.model())?)),
        "anthropic" => Ok(Box::new(AnthropicResponder::new(
            &config.anthropic,
            model.model(),
        )?)),
        "gemini" => Ok(Box::new(GeminiResponder::new(&config.gemini, model.model())?)),
        other => Err(ParleyError::Config(format!(
            "Unknown provider: {}. Must be one of: {}",
            other,
            SUPPORTED_PROVIDERS.join(", ")
        ))
        .into()),
    }
}
