//! Error types for Parley
//!
//! This module defines all error types used throughout the application,
//! using `thiserror` for ergonomic error handling. Functions return the
//! crate-wide [`Result`] alias (backed by `anyhow`); callers that need to
//! branch on a failure kind recover it with `downcast_ref::<ParleyError>()`.

use crate::session::SessionSummary;
use thiserror::Error;

/// Main error type for Parley operations
///
/// The first six variants are the session-store taxonomy; the rest cover
/// configuration, I/O and encoding concerns around it. Transport failures
/// always surface as [`ParleyError::Upstream`].
#[derive(Error, Debug)]
pub enum ParleyError {
    /// No session (or session file) matches the given identifier
    #[error("Session not found: {0}\n\nRun 'parley sessions list' to see available sessions.")]
    NotFound(String),

    /// A short identifier matched more than one session
    #[error("{}", format_ambiguous(.prefix, .candidates))]
    Ambiguous {
        /// The prefix the user supplied
        prefix: String,
        /// Every session whose identifier starts with the prefix
        candidates: Vec<SessionSummary>,
    },

    /// User input was rejected before touching the store
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A session file exists but cannot be parsed
    #[error("Session {id} is corrupt: {reason}\n\nThe session file may be damaged.")]
    Corrupt {
        /// Identifier (file stem) of the unreadable session
        id: String,
        /// Parser error message
        reason: String,
    },

    /// Following parent references revisited a session
    #[error("Circular reference detected in session ancestry at {0}")]
    CycleDetected(String),

    /// Failure reported by the conversational responder
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Session directory errors other than a missing or corrupt file
    #[error("Storage error: {0}")]
    Storage(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

fn format_ambiguous(prefix: &str, candidates: &[SessionSummary]) -> String {
    let mut lines = vec![format!(
        "Ambiguous session ID \"{}\". Multiple matches found:",
        prefix
    )];
    for candidate in candidates {
        lines.push(format!(
            "- {} ({}, {}, {} messages)",
            candidate.short_id,
            candidate.model,
            candidate.created_at.format("%Y-%m-%d"),
            candidate.message_count
        ));
    }
    lines.push(String::new());
    lines.push("Please use a longer prefix or run 'parley sessions list'.".to_string());
    lines.join("\n")
}

/// Result type alias for Parley operations
///
/// This is a convenience alias that uses `anyhow::Error` as the error type,
/// allowing for rich error context and easy error propagation.
pub type Result<T> = anyhow::Result<T>;

/// Returns the [`ParleyError`] carried by an `anyhow` error, if any
pub fn kind(err: &anyhow::Error) -> Option<&ParleyError> {
    err.downcast_ref::<ParleyError>()
}
