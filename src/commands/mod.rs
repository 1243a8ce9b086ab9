//! Command handlers for Parley
//!
//! This module contains the handlers for the CLI commands:
//!
//! - `chat`: single-shot messages, session turns and the interactive loop
//! - `sessions`: listing, inspecting and maintaining saved sessions
//! - `special_commands`: `/help`, `/info` and friends inside the interactive loop
//! - `setup`: `init`, `config` and `version`

pub mod chat;
pub mod sessions;
pub mod setup;
pub mod special_commands;

pub use chat::run_chat;
pub use sessions::handle_sessions;
