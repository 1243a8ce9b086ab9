//! Parley - LLM chat CLI library with persistent sessions
//!
//! This library provides the session store behind the `parley` binary:
//! conversations saved as one JSON file each, resolved by full id, short
//! prefix or `latest`, summarized into child sessions, and cleaned up by
//! age without orphaning the parents of sessions that are kept.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `session`: session model, storage, identity resolution, ancestry,
//!   retention and the long-session threshold
//! - `providers`: the `Responder` abstraction and the Ollama, OpenAI,
//!   Anthropic and Gemini adapters
//! - `commands`: handlers behind the CLI commands
//! - `config`: configuration loading, validation and settings resolution
//! - `confirm`: yes/no prompts for destructive operations
//! - `error`: error types and result aliases
//! - `cli`: command-line interface definition
//!
//! # Example
//!
//! ```no_run
//! use parley::session::{resolve, SessionStore};
//!
//! fn main() -> anyhow::Result<()> {
//!     let store = SessionStore::new("/tmp/parley/sessions");
//!     let session = resolve(&store, "latest")?;
//!     println!("{} has {} messages", session.short_id(), session.message_count());
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod commands;
pub mod config;
pub mod confirm;
pub mod error;
pub mod providers;
pub mod session;

// Re-export commonly used types
pub use config::{Config, ResolvedSettings};
pub use error::{ParleyError, Result};
pub use providers::{ModelId, Responder};
pub use session::{Message, Role, Session, SessionStore};

#[cfg(test)]
pub mod test_utils;
