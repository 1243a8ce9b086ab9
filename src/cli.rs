//! Command-line interface definition for Parley
//!
//! This module defines the CLI structure using clap's derive API: a `chat`
//! command for talking to a model, a `sessions` command group for managing
//! the persisted conversations, and the `init`, `config` and `version`
//! housekeeping commands.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Parley - LLM chat with persistent sessions
///
/// Send one-off messages, or keep conversations in sessions you can
/// continue, summarize and clean up later.
#[derive(Parser, Debug, Clone)]
#[command(name = "parley")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, env = "PARLEY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory holding session files (overrides config and environment)
    #[arg(long, global = true)]
    pub session_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for Parley
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Send a message to the model
    ///
    /// Without a session flag this is a one-off exchange and nothing is
    /// saved. The message is read from stdin when no arguments are given.
    Chat(ChatArgs),

    /// Manage saved sessions
    Sessions {
        /// Session subcommand
        #[command(subcommand)]
        command: SessionsCommand,
    },

    /// Write a default configuration file
    ///
    /// The file goes to --config when given, otherwise to the per-user
    /// config location.
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Show the effective configuration with tokens masked
    Config {
        /// Dotted field to print on its own (e.g. session.retention_days,
        /// providers.openai.token, or config_file)
        field: Option<String>,
    },

    /// Show version information
    Version {
        /// Print only the version number
        #[arg(short, long)]
        short: bool,
    },
}

/// Options for `parley chat`
#[derive(Args, Debug, Clone, Default)]
pub struct ChatArgs {
    /// Message to send (joined with spaces)
    pub message: Vec<String>,

    /// Continue a session (full ID, prefix of 4+ characters, or "latest")
    #[arg(short, long, conflicts_with_all = ["new_session", "template", "system"])]
    pub session: Option<String>,

    /// Start a new session
    #[arg(short, long)]
    pub new_session: bool,

    /// Name for the new session
    #[arg(long, requires = "new_session")]
    pub session_name: Option<String>,

    /// Compose the message in $EDITOR
    #[arg(short, long, conflicts_with = "message")]
    pub editor: bool,

    /// Keep chatting in an interactive loop (needs --session or --new-session)
    #[arg(short, long)]
    pub interactive: bool,

    /// Continue even if the session is over the message threshold
    #[arg(long)]
    pub ignore_threshold: bool,

    /// Model to use (provider:model, e.g. ollama:llama3.2)
    #[arg(short, long)]
    pub model: Option<String>,

    /// Template from the config file
    #[arg(short, long)]
    pub template: Option<String>,

    /// System prompt (overrides the template's)
    #[arg(long)]
    pub system: Option<String>,
}

/// Session management subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum SessionsCommand {
    /// List all sessions, most recently updated first
    List,

    /// Show a session's details and transcript
    Show {
        /// Session ID, prefix, or "latest"
        id: String,
    },

    /// Delete a session
    Delete {
        /// Session ID, prefix, or "latest"
        id: String,

        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Set a session's display name
    Rename {
        /// Session ID, prefix, or "latest"
        id: String,

        /// New name
        name: String,
    },

    /// Delete old sessions
    ///
    /// Without options, removes sessions older than the configured retention
    /// window. Sessions still referenced by a kept child are preserved.
    Clear {
        /// Delete sessions created before this date (YYYY-MM-DD, YYYY-MM or YYYY)
        #[arg(long, conflicts_with = "all")]
        before: Option<String>,

        /// Delete every session
        #[arg(long)]
        all: bool,

        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Summarize a session into a new child session
    Summarize {
        /// Session ID, prefix, or "latest"
        id: String,
    },

    /// Start an interactive chat on a new or existing session
    Start {
        /// Session to continue; a new session is created when omitted
        id: Option<String>,

        /// Model for a new session (provider:model)
        #[arg(short, long)]
        model: Option<String>,

        /// Continue even if the session is over the message threshold
        #[arg(long)]
        ignore_threshold: bool,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
