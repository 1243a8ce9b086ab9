//! Special commands parser for interactive chat mode
//!
//! Lines starting with `/` are handled locally instead of being sent to the
//! model. Commands are case-insensitive.

use crate::session::Session;
use thiserror::Error;

/// Errors that can occur when parsing special commands
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// Unknown command was entered
    #[error("Unknown command: {0} (type '/help' for available commands)")]
    UnknownCommand(String),
}

/// Special commands that can be executed during interactive chat
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecialCommand {
    /// Display help information
    Help,

    /// Display the current session's details
    Info,

    /// Clear the terminal screen
    Clear,

    /// Exit the interactive session
    Exit,

    /// Not a special command; the line is a message for the model
    None,
}

/// Parse a line of interactive input
///
/// # Errors
///
/// Returns `CommandError::UnknownCommand` for a `/` command that does not
/// exist.
///
/// # Examples
///
/// ```
/// use parley::commands::special_commands::{parse_special_command, SpecialCommand};
///
/// assert_eq!(parse_special_command("/q").unwrap(), SpecialCommand::Exit);
/// assert_eq!(parse_special_command("hello").unwrap(), SpecialCommand::None);
/// assert!(parse_special_command("/bogus").is_err());
/// ```
pub fn parse_special_command(input: &str) -> Result<SpecialCommand, CommandError> {
    let lower = input.trim().to_lowercase();

    if !lower.starts_with('/') {
        return Ok(SpecialCommand::None);
    }

    match lower.as_str() {
        "/help" | "/h" => Ok(SpecialCommand::Help),
        "/info" | "/i" => Ok(SpecialCommand::Info),
        "/clear" | "/c" => Ok(SpecialCommand::Clear),
        "/exit" | "/quit" | "/q" => Ok(SpecialCommand::Exit),
        _ => Err(CommandError::UnknownCommand(lower)),
    }
}

/// Help text for interactive mode
pub fn help_text() -> &'static str {
    r#"
Available commands:
  /help, /h         - Show this help message
  /info, /i         - Show session information
  /clear, /c        - Clear the screen
  /exit, /quit, /q  - Exit interactive mode
  Ctrl+D, Ctrl+C    - Exit interactive mode
"#
}

/// Session details shown by `/info`
pub fn session_info(session: &Session) -> String {
    let mut lines = vec![
        "Session Information:".to_string(),
        format!("  ID: {}", session.short_id()),
        format!("  Full ID: {}", session.id),
    ];
    if let Some(name) = &session.name {
        lines.push(format!("  Name: {}", name));
    }
    lines.push(format!("  Model: {}", session.model));
    lines.push(format!("  Messages: {}", session.message_count()));
    lines.push(format!(
        "  Created: {}",
        session.created_at.format("%Y-%m-%d %H:%M:%S")
    ));
    if let Some(template) = &session.template_name {
        lines.push(format!("  Template: {}", template));
    }
    if let Some(parent) = &session.parent_id {
        lines.push(format!("  Parent: {}", crate::session::short_id(parent)));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_help_aliases() {
        assert_eq!(parse_special_command("/help").unwrap(), SpecialCommand::Help);
        assert_eq!(parse_special_command("/h").unwrap(), SpecialCommand::Help);
    }

    #[test]
    fn test_parse_info_aliases() {
        assert_eq!(parse_special_command("/info").unwrap(), SpecialCommand::Info);
        assert_eq!(parse_special_command("/i").unwrap(), SpecialCommand::Info);
    }

    #[test]
    fn test_parse_clear_aliases() {
        assert_eq!(parse_special_command("/clear").unwrap(), SpecialCommand::Clear);
        assert_eq!(parse_special_command("/c").unwrap(), SpecialCommand::Clear);
    }

    #[test]
    fn test_parse_exit_aliases() {
        for input in ["/exit", "/quit", "/q"] {
            assert_eq!(parse_special_command(input).unwrap(), SpecialCommand::Exit);
        }
    }

    #[test]
    fn test_parse_case_insensitive_with_whitespace() {
        assert_eq!(parse_special_command("  /HELP  ").unwrap(), SpecialCommand::Help);
        assert_eq!(parse_special_command("/Quit").unwrap(), SpecialCommand::Exit);
    }

    #[test]
    fn test_parse_regular_text_returns_none() {
        assert_eq!(
            parse_special_command("what is a monad?").unwrap(),
            SpecialCommand::None
        );
        assert_eq!(parse_special_command("exit").unwrap(), SpecialCommand::None);
        assert_eq!(parse_special_command("").unwrap(), SpecialCommand::None);
    }

    #[test]
    fn test_parse_unknown_command_returns_error() {
        let result = parse_special_command("/foo");
        if let Err(CommandError::UnknownCommand(cmd)) = result {
            assert_eq!(cmd, "/foo");
        } else {
            panic!("Expected UnknownCommand error");
        }
    }

    #[test]
    fn test_session_info_lists_optional_fields_when_set() {
        let mut session = Session::new("ollama:llama3.2");
        let bare = session_info(&session);
        assert!(bare.contains(&format!("Full ID: {}", session.id)));
        assert!(!bare.contains("Name:"));

        session.name = Some("release notes".to_string());
        session.template_name = Some("writer".to_string());
        let info = session_info(&session);
        assert!(info.contains("Name: release notes"));
        assert!(info.contains("Template: writer"));
        assert!(info.contains("Model: ollama:llama3.2"));
    }
}
