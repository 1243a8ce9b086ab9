//! Conversation sessions
//!
//! A [`Session`] is a persisted conversation: an isolated message history
//! bound to one model, optionally linked to the parent session it
//! summarizes. The submodules implement the store around it:
//!
//! - `storage`: one JSON file per session in a directory
//! - `resolver`: full id / short prefix / `latest` resolution
//! - `ancestry`: parent-chain walking and summarization
//! - `retention`: age-based bulk cleanup with parent protection
//! - `threshold`: long-session warning before a continuation

pub mod ancestry;
pub mod resolver;
pub mod retention;
pub mod storage;
pub mod threshold;

pub use ancestry::{collect_ancestors, summarize, transcript, SummaryPlan};
pub use resolver::{resolve, LATEST_KEYWORD, MIN_PREFIX_LEN};
pub use retention::{parse_cutoff_date, RetentionMode, RetentionPlan, RetentionReport};
pub use storage::SessionStore;
pub use threshold::{ThresholdCheck, ThresholdGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// Number of characters shown as a session's short identifier
pub const SHORT_ID_LEN: usize = 8;

/// Author of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Text typed by the person using the CLI
    User,
    /// Reply produced by the model
    Assistant,
}

impl Role {
    /// Label used when rendering a transcript
    pub fn label(&self) -> &'static str {
        match self {
            Self::User => "User",
            Self::Assistant => "Assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
        }
    }
}

/// A single message in a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Who wrote the message
    pub role: Role,
    /// Message text
    pub content: String,
    /// When the message was appended
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Creates a user message stamped with the current time
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    /// Creates an assistant message stamped with the current time
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// A persisted conversation
///
/// Optional fields tolerate absence and, for `parent_id`, the empty string
/// written by older records, so loading never depends on the exact shape
/// of the file. Unknown fields are ignored.
///
/// # Examples
///
/// ```
/// use parley::session::{Role, Session};
///
/// let mut session = Session::new("ollama:llama3.2:latest");
/// session.add_message(Role::User, "hello");
/// assert_eq!(session.message_count(), 1);
/// assert_eq!(session.short_id().len(), 8);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Globally unique identifier (UUID v4), never changes
    pub id: String,

    /// Session this one summarizes, if any
    #[serde(
        default,
        deserialize_with = "empty_string_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub parent_id: Option<String>,

    /// Display name set by the user
    #[serde(
        default,
        deserialize_with = "empty_string_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub name: Option<String>,

    /// Template the session was started from (reference only)
    #[serde(
        default,
        deserialize_with = "empty_string_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub template_name: Option<String>,

    /// System prompt snapshot taken at creation
    #[serde(
        default,
        deserialize_with = "empty_string_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub system_prompt: Option<String>,

    /// Model binding in `provider:model` form
    pub model: String,

    /// Creation time
    pub created_at: DateTime<Utc>,

    /// Last time a message was appended (or the session was created)
    pub updated_at: DateTime<Utc>,

    /// Ordered, append-only history
    #[serde(default)]
    pub messages: Vec<Message>,
}

fn empty_string_as_none<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.is_empty()))
}

impl Session {
    /// Creates an empty session bound to `model` with a fresh identifier
    pub fn new(model: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            parent_id: None,
            name: None,
            template_name: None,
            system_prompt: None,
            model: model.into(),
            created_at: now,
            updated_at: now,
            messages: Vec::new(),
        }
    }

    /// Creates a child session that continues `parent` after summarization
    ///
    /// The child inherits the parent's model, system prompt and template
    /// name; the parent itself is not modified.
    pub fn child_of(parent: &Session) -> Self {
        let mut child = Self::new(parent.model.clone());
        child.parent_id = Some(parent.id.clone());
        child.system_prompt = parent.system_prompt.clone();
        child.template_name = parent.template_name.clone();
        child
    }

    /// Appends a message and bumps `updated_at`
    ///
    /// `updated_at` never moves backwards, even if the wall clock does.
    pub fn add_message(&mut self, role: Role, content: impl Into<String>) {
        let now = Utc::now();
        self.messages.push(Message {
            role,
            content: content.into(),
            timestamp: now,
        });
        if now > self.updated_at {
            self.updated_at = now;
        }
    }

    /// First eight characters of the identifier (or all of it if shorter)
    pub fn short_id(&self) -> &str {
        short_id(&self.id)
    }

    /// Name if one was set, otherwise the short identifier
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or_else(|| self.short_id())
    }

    /// Number of messages in the history
    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    /// Provider half of the model binding, if the binding is well formed
    pub fn provider(&self) -> Option<&str> {
        self.model
            .split_once(':')
            .map(|(provider, _)| provider)
            .filter(|p| !p.is_empty())
    }

    /// Model half of the model binding, or the whole binding when malformed
    pub fn model_name(&self) -> &str {
        match self.model.split_once(':') {
            Some((_, model)) if !model.is_empty() => model,
            _ => &self.model,
        }
    }

    /// Listing/disambiguation view of this session
    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id.clone(),
            short_id: self.short_id().to_string(),
            name: self.name.clone(),
            model: self.model.clone(),
            created_at: self.created_at,
            message_count: self.message_count(),
        }
    }
}

/// Returns the short form of a session identifier
pub fn short_id(id: &str) -> &str {
    match id.char_indices().nth(SHORT_ID_LEN) {
        Some((idx, _)) => &id[..idx],
        None => id,
    }
}

/// Metadata shown when listing sessions or disambiguating a prefix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    /// Full identifier
    pub id: String,
    /// First eight characters of the identifier
    pub short_id: String,
    /// Display name, if set
    pub name: Option<String>,
    /// Model binding
    pub model: String,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Number of messages
    pub message_count: usize,
}
