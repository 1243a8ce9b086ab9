//! Configuration management for Parley
//!
//! This module handles loading, parsing and validating configuration from
//! a YAML file and environment variables, and resolving it together with
//! command-line flags into one immutable [`ResolvedSettings`].

use crate::error::{ParleyError, Result};
use crate::providers::ModelId;
use crate::session::threshold::DEFAULT_MESSAGE_THRESHOLD;
use anyhow::Context;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Main configuration structure for Parley
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Default model in `provider:model` form
    #[serde(default = "default_model")]
    pub model: String,

    /// Provider connection settings
    #[serde(default)]
    pub providers: ProvidersConfig,

    /// Session store settings
    #[serde(default)]
    pub session: SessionConfig,

    /// Named templates: a system prompt and optional model
    #[serde(default)]
    pub templates: BTreeMap<String, TemplateConfig>,

    /// Model from `PARLEY_MODEL`, kept apart from `model` so a template
    /// cannot override it
    #[serde(skip)]
    pub env_model: Option<String>,
}

fn default_model() -> String {
    "ollama:llama3.2:latest".to_string()
}

/// Provider connection settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvidersConfig {
    /// Ollama configuration
    #[serde(default)]
    pub ollama: OllamaConfig,

    /// OpenAI configuration
    #[serde(default)]
    pub openai: ApiProviderConfig,

    /// Anthropic configuration
    #[serde(default)]
    pub anthropic: ApiProviderConfig,

    /// Gemini configuration
    #[serde(default)]
    pub gemini: ApiProviderConfig,
}

/// Settings shared by the hosted, token-authenticated providers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiProviderConfig {
    /// API base URL, the provider's public endpoint when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// API token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Request timeout
    #[serde(default = "default_ollama_timeout")]
    pub timeout_seconds: u64,
}

impl Default for ApiProviderConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            token: None,
            timeout_seconds: default_ollama_timeout(),
        }
    }
}

impl ApiProviderConfig {
    /// Configured base URL, or `default` when none is set
    pub fn base_url_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.base_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .unwrap_or(default)
            .trim_end_matches('/')
    }

    /// API token for `provider`
    ///
    /// # Errors
    ///
    /// Returns `ParleyError::Config` naming both places a token can be set
    /// when none is configured.
    pub fn require_token(&self, provider: &str) -> Result<&str> {
        self.token
            .as_deref()
            .filter(|token| !token.trim().is_empty())
            .ok_or_else(|| {
                ParleyError::Config(format!(
                    "{} token is not configured. Set providers.{}.token in the config file or PARLEY_{}_TOKEN",
                    provider,
                    provider,
                    provider.to_uppercase()
                ))
                .into()
            })
    }
}

/// Hide all but the ends of a secret for display
///
/// # Examples
///
/// ```
/// use parley::config::mask_token;
///
/// assert_eq!(mask_token("sk-1234567890abcd"), "sk-1...abcd");
/// assert_eq!(mask_token("short"), "********");
/// ```
pub fn mask_token(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() <= 8 {
        return "********".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}

/// Ollama provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    /// Ollama server host
    #[serde(default = "default_ollama_host")]
    pub host: String,

    /// Request timeout
    #[serde(default = "default_ollama_timeout")]
    pub timeout_seconds: u64,
}

fn default_ollama_host() -> String {
    "http://localhost:11434".to_string()
}

fn default_ollama_timeout() -> u64 {
    120
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: default_ollama_host(),
            timeout_seconds: default_ollama_timeout(),
        }
    }
}

/// Session store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Message count that triggers the long-session warning (0 disables)
    #[serde(default = "default_message_threshold")]
    pub message_threshold: usize,

    /// Age in days after which `sessions clear` removes a session
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,

    /// Explicit session directory
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

fn default_message_threshold() -> usize {
    DEFAULT_MESSAGE_THRESHOLD
}

fn default_retention_days() -> u32 {
    30
}

/// Largest accepted `session.retention_days`, one hundred years
pub const MAX_RETENTION_DAYS: u32 = 36_500;

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            message_threshold: default_message_threshold(),
            retention_days: default_retention_days(),
            dir: None,
        }
    }
}

/// A named template
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TemplateConfig {
    /// System prompt for sessions started from this template
    #[serde(default)]
    pub system: Option<String>,

    /// Model override in `provider:model` form
    #[serde(default)]
    pub model: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: default_model(),
            providers: ProvidersConfig::default(),
            session: SessionConfig::default(),
            templates: BTreeMap::new(),
            env_model: None,
        }
    }
}

/// Default config file location (`~/.config/parley/config.yaml` on Linux)
pub fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("io", "parley", "parley").map(|dirs| dirs.config_dir().join("config.yaml"))
}

impl Config {
    /// Load configuration from file with environment overrides
    ///
    /// A missing file is not an error: defaults are used and a warning is
    /// logged.
    ///
    /// # Errors
    ///
    /// Returns `ParleyError::Config` if the file exists but cannot be read,
    /// or `ParleyError::Yaml` if it is not a valid configuration document.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path.display());
            Self::default()
        };

        config.apply_env_vars();

        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ParleyError::Config(format!("Failed to read config file: {}", e)))?;
        let config = serde_yaml::from_str(&contents)
            .map_err(ParleyError::from)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    fn apply_env_vars(&mut self) {
        if let Ok(model) = std::env::var("PARLEY_MODEL") {
            if !model.trim().is_empty() {
                self.env_model = Some(model);
            }
        }

        if let Ok(ollama_host) = std::env::var("PARLEY_OLLAMA_HOST") {
            self.providers.ollama.host = ollama_host;
        }

        for (name, provider) in [
            ("OPENAI", &mut self.providers.openai),
            ("ANTHROPIC", &mut self.providers.anthropic),
            ("GEMINI", &mut self.providers.gemini),
        ] {
            if let Ok(token) = std::env::var(format!("PARLEY_{}_TOKEN", name)) {
                provider.token = Some(token);
            }
            if let Ok(base_url) = std::env::var(format!("PARLEY_{}_BASE_URL", name)) {
                provider.base_url = Some(base_url);
            }
        }

        if let Ok(dir) = std::env::var("PARLEY_SESSION_DIR") {
            if !dir.trim().is_empty() {
                self.session.dir = Some(PathBuf::from(dir));
            }
        }

        if let Ok(threshold) = std::env::var("PARLEY_SESSION_MESSAGE_THRESHOLD") {
            if let Ok(value) = threshold.parse() {
                self.session.message_threshold = value;
            } else {
                tracing::warn!("Invalid PARLEY_SESSION_MESSAGE_THRESHOLD: {}", threshold);
            }
        }

        if let Ok(days) = std::env::var("PARLEY_SESSION_RETENTION_DAYS") {
            if let Ok(value) = days.parse() {
                self.session.retention_days = value;
            } else {
                tracing::warn!("Invalid PARLEY_SESSION_RETENTION_DAYS: {}", days);
            }
        }
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns `ParleyError::Config` for a malformed model identifier
    /// (default, environment or template), a retention window outside
    /// `1..=MAX_RETENTION_DAYS` or a zero request timeout on any provider.
    pub fn validate(&self) -> Result<()> {
        parse_model(&self.model, "model")?;

        if let Some(env_model) = &self.env_model {
            parse_model(env_model, "PARLEY_MODEL")?;
        }

        if self.session.retention_days == 0 {
            return Err(ParleyError::Config(
                "session.retention_days must be greater than 0".to_string(),
            )
            .into());
        }

        if self.session.retention_days > MAX_RETENTION_DAYS {
            return Err(ParleyError::Config(format!(
                "session.retention_days must be at most {}",
                MAX_RETENTION_DAYS
            ))
            .into());
        }

        for (name, timeout) in [
            ("ollama", self.providers.ollama.timeout_seconds),
            ("openai", self.providers.openai.timeout_seconds),
            ("anthropic", self.providers.anthropic.timeout_seconds),
            ("gemini", self.providers.gemini.timeout_seconds),
        ] {
            if timeout == 0 {
                return Err(ParleyError::Config(format!(
                    "providers.{}.timeout_seconds must be greater than 0",
                    name
                ))
                .into());
            }
        }

        for (name, template) in &self.templates {
            if let Some(model) = &template.model {
                parse_model(model, &format!("templates.{}.model", name))?;
            }
        }

        Ok(())
    }
}

impl Config {
    /// Copy for display: the effective model, with every token masked
    pub fn masked(&self) -> Self {
        let mut shown = self.clone();
        if let Some(env_model) = shown.env_model.take() {
            shown.model = env_model;
        }
        for provider in [
            &mut shown.providers.openai,
            &mut shown.providers.anthropic,
            &mut shown.providers.gemini,
        ] {
            if let Some(token) = provider.token.as_mut() {
                *token = mask_token(token);
            }
        }
        shown
    }

    /// Render the masked configuration, or one dotted field of it, as YAML
    ///
    /// Scalar fields print bare, without YAML quoting.
    ///
    /// # Errors
    ///
    /// Returns `ParleyError::InvalidArgument` for a field that does not
    /// exist, or `ParleyError::Yaml` if rendering fails.
    pub fn render(&self, field: Option<&str>) -> Result<String> {
        let value = serde_yaml::to_value(self.masked()).map_err(ParleyError::from)?;

        let Some(field) = field else {
            return Ok(serde_yaml::to_string(&value).map_err(ParleyError::from)?);
        };

        let mut current = &value;
        for key in field.split('.') {
            current = current.get(key).ok_or_else(|| {
                ParleyError::InvalidArgument(format!("Unknown config field: {}", field))
            })?;
        }

        let rendered = match current {
            serde_yaml::Value::Null => String::new(),
            serde_yaml::Value::Bool(b) => b.to_string(),
            serde_yaml::Value::Number(n) => n.to_string(),
            serde_yaml::Value::String(s) => s.clone(),
            other => serde_yaml::to_string(other).map_err(ParleyError::from)?,
        };
        Ok(rendered.trim_end().to_string())
    }

    /// Write the default configuration to `path`
    ///
    /// Parent directories are created as needed.
    ///
    /// # Errors
    ///
    /// Returns `ParleyError::Config` if the file exists and `force` is not
    /// set, or `ParleyError::Io` if it cannot be written.
    pub fn write_default(path: &Path, force: bool) -> Result<()> {
        if path.exists() && !force {
            return Err(ParleyError::Config(format!(
                "config file already exists at: {} (use --force to overwrite)",
                path.display()
            ))
            .into());
        }

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(ParleyError::from)?;
        }

        let contents = serde_yaml::to_string(&Self::default()).map_err(ParleyError::from)?;
        std::fs::write(path, contents).map_err(ParleyError::from)?;
        tracing::info!("Wrote default config to {}", path.display());
        Ok(())
    }
}

fn parse_model(input: &str, context: &str) -> Result<ModelId> {
    ModelId::parse(input).map_err(|e| {
        let reason = match crate::error::kind(&e) {
            Some(ParleyError::Config(msg)) => msg.clone(),
            _ => e.to_string(),
        };
        ParleyError::Config(format!("{}: {}", context, reason)).into()
    })
}

/// Settings after every source has been applied
///
/// Built once per invocation and passed explicitly to the commands.
#[derive(Debug, Clone)]
pub struct ResolvedSettings {
    /// Model for new sessions and single-shot chats
    pub model: ModelId,
    /// Template selected with `--template`, if any
    pub template_name: Option<String>,
    /// System prompt from the selected template
    pub system_prompt: Option<String>,
    /// Directory holding the session files
    pub session_dir: PathBuf,
    /// Long-session warning threshold (0 disables)
    pub message_threshold: usize,
    /// Default retention window for `sessions clear`
    pub retention_days: u32,
    /// Provider connection settings
    pub providers: ProvidersConfig,
}

impl ResolvedSettings {
    /// Apply precedence flag > environment > template > file > default
    ///
    /// # Errors
    ///
    /// Returns `ParleyError::Config` if the template is unknown, the winning
    /// model identifier is malformed, or no session directory can be
    /// determined.
    pub fn resolve(
        config: &Config,
        cli_model: Option<&str>,
        template: Option<&str>,
        cli_session_dir: Option<&Path>,
        config_path: Option<&Path>,
    ) -> Result<Self> {
        let template_config = match template {
            Some(name) => Some(config.templates.get(name).ok_or_else(|| {
                ParleyError::Config(format!("Unknown template: {}", name))
            })?),
            None => None,
        };

        let (model, source) = if let Some(model) = cli_model {
            (model, "flag")
        } else if let Some(model) = config.env_model.as_deref() {
            (model, "environment")
        } else if let Some(model) = template_config.and_then(|t| t.model.as_deref()) {
            (model, "template")
        } else {
            (config.model.as_str(), "config")
        };

        let model = parse_model(model, &format!("invalid model from {}", source))?;
        tracing::debug!(model = %model, source, "Resolved model");

        let session_dir = match cli_session_dir {
            Some(dir) => dir.to_path_buf(),
            None => default_session_dir(config.session.dir.as_deref(), config_path)?,
        };
        tracing::debug!(dir = %session_dir.display(), "Resolved session directory");

        Ok(Self {
            model,
            template_name: template.map(str::to_string),
            system_prompt: template_config.and_then(|t| t.system.clone()),
            session_dir,
            message_threshold: config.session.message_threshold,
            retention_days: config.session.retention_days,
            providers: config.providers.clone(),
        })
    }
}

/// Pick the session directory when no flag names one
///
/// An explicit setting wins, then `sessions/` next to an existing config
/// file, then the per-user data directory.
pub fn default_session_dir(explicit: Option<&Path>, config_path: Option<&Path>) -> Result<PathBuf> {
    if let Some(dir) = explicit {
        return Ok(dir.to_path_buf());
    }

    if let Some(path) = config_path.filter(|p| p.is_file()) {
        if let Some(parent) = path.parent() {
            return Ok(parent.join("sessions"));
        }
    }

    let dirs = ProjectDirs::from("io", "parley", "parley")
        .ok_or_else(|| ParleyError::Config("Could not determine data directory".to_string()))?;
    Ok(dirs.data_dir().join("sessions"))
}
