//! Chat command handler
//!
//! `parley chat` runs in one of three shapes: a single-shot exchange that
//! persists nothing, a turn on an existing session, or a turn on a freshly
//! created session. With `--interactive` the session variants drop into a
//! readline loop afterwards.

use crate::cli::ChatArgs;
use crate::commands::special_commands::{
    help_text, parse_special_command, session_info, SpecialCommand,
};
use crate::config::ResolvedSettings;
use crate::confirm::Prompter;
use crate::error::{ParleyError, Result};
use crate::providers::{create_responder, ModelId, Responder};
use crate::session::{resolve, Role, Session, SessionStore, ThresholdGuard};
use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::io::{IsTerminal, Read, Write};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// What the interactive loop should do after handling a line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopAction {
    /// Read the next line
    Continue,
    /// Leave the loop
    Exit,
}

/// Run `parley chat`
///
/// # Arguments
///
/// * `args` - Parsed chat options
/// * `settings` - Settings resolved from flags, environment and config
/// * `prompter` - Answers the long-session question
///
/// # Errors
///
/// Returns an error if the options are inconsistent, no message was given
/// outside interactive mode, the session cannot be resolved, or the
/// responder fails.
pub async fn run_chat(
    args: ChatArgs,
    settings: &ResolvedSettings,
    prompter: &mut dyn Prompter,
) -> Result<()> {
    tracing::info!("Starting chat command");

    if args.interactive && args.session.is_none() && !args.new_session {
        return Err(ParleyError::InvalidArgument(
            "interactive mode requires --session or --new-session".to_string(),
        )
        .into());
    }

    let message = if args.editor {
        Some(compose_in_editor(&editor_from_env()?)?)
    } else {
        read_message(&args.message, args.interactive, std::io::stdin().lock())?
    };

    let store = SessionStore::new(settings.session_dir.clone());
    let (mut session, is_new) = if let Some(ident) = args.session.as_deref() {
        let session = resolve(&store, ident)?;
        if args.model.is_some() {
            tracing::warn!(
                "Ignoring --model: session {} is bound to {}",
                session.short_id(),
                session.model
            );
        }

        let guard = ThresholdGuard::new(settings.message_threshold);
        if !guard.enforce(&session, args.ignore_threshold, prompter)? {
            eprintln!("Cancelled.");
            return Ok(());
        }
        tracing::info!(session = %session.id, "Continuing session");
        (session, false)
    } else if args.new_session {
        let session = new_session(settings, args.session_name.clone(), args.system.clone());
        tracing::info!(session = %session.id, model = %session.model, "Creating new session");
        (session, true)
    } else {
        let message = message.ok_or_else(|| {
            ParleyError::InvalidArgument("no message provided".to_string())
        })?;
        let system = args.system.clone().or_else(|| settings.system_prompt.clone());
        let responder = create_responder(&settings.model, &settings.providers)?;
        let reply = single_shot(responder.as_ref(), system.as_deref(), &message).await?;
        println!("{}", reply);
        return Ok(());
    };

    let responder = responder_for(&session, settings)?;

    if let Some(message) = message.as_deref() {
        let reply = send_turn(responder.as_ref(), &mut session, message).await?;
        store.persist(&session)?;
        println!("{}", reply);
    }

    if is_new {
        eprintln!("\nSession created: {}", session.short_id());
        eprintln!("Path: {}", store.path_for(&session.id).display());
        if !args.interactive {
            eprintln!(
                "\nNext time, use:\n  parley chat -s {} \"your message\"",
                session.short_id()
            );
        }
    }

    if args.interactive {
        run_interactive(&store, responder.as_ref(), &mut session).await?;
    }

    Ok(())
}

/// Get the message from the arguments, falling back to stdin
///
/// In interactive mode the message is optional and stdin is left alone.
///
/// # Errors
///
/// Returns `ParleyError::InvalidArgument` when no message is available
/// outside interactive mode.
pub fn read_message<R: Read>(
    words: &[String],
    interactive: bool,
    mut input: R,
) -> Result<Option<String>> {
    let joined = words.join(" ");
    if !joined.trim().is_empty() {
        return Ok(Some(joined));
    }

    if interactive {
        return Ok(None);
    }

    let mut buffer = String::new();
    input
        .read_to_string(&mut buffer)
        .map_err(ParleyError::from)?;

    let trimmed = buffer.trim();
    if trimmed.is_empty() {
        return Err(ParleyError::InvalidArgument(
            "no message provided (pass it as arguments or on stdin)".to_string(),
        )
        .into());
    }
    Ok(Some(trimmed.to_string()))
}

/// Editor command from `$EDITOR`
///
/// # Errors
///
/// Returns `ParleyError::InvalidArgument` if the variable is unset or blank.
pub fn editor_from_env() -> Result<String> {
    std::env::var("EDITOR")
        .ok()
        .filter(|editor| !editor.trim().is_empty())
        .ok_or_else(|| {
            ParleyError::InvalidArgument("EDITOR environment variable is not set".to_string())
                .into()
        })
}

/// Open `editor` on a scratch file and return what was written, trimmed
///
/// `editor` may carry its own arguments (`code --wait`); the scratch file
/// path is appended last. The file is removed afterwards.
///
/// # Errors
///
/// Returns `ParleyError::InvalidArgument` if the editor cannot be started,
/// exits unsuccessfully or leaves the file empty.
pub fn compose_in_editor(editor: &str) -> Result<String> {
    let scratch = tempfile::Builder::new()
        .prefix("parley-")
        .suffix(".md")
        .tempfile()
        .map_err(ParleyError::from)?;

    let mut words = editor.split_whitespace();
    let program = words.next().ok_or_else(|| {
        ParleyError::InvalidArgument("EDITOR environment variable is not set".to_string())
    })?;

    tracing::debug!(editor, path = %scratch.path().display(), "Opening editor");
    let status = std::process::Command::new(program)
        .args(words)
        .arg(scratch.path())
        .status()
        .map_err(|e| ParleyError::InvalidArgument(format!("failed to open editor {}: {}", editor, e)))?;

    if !status.success() {
        return Err(ParleyError::InvalidArgument(format!(
            "editor {} exited with {}",
            editor, status
        ))
        .into());
    }

    let content = std::fs::read_to_string(scratch.path()).map_err(ParleyError::from)?;
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(
            ParleyError::InvalidArgument("no message written in the editor".to_string()).into(),
        );
    }
    Ok(trimmed.to_string())
}

/// Build a new, unsaved session from the resolved settings
///
/// An explicit system prompt wins over the template's.
pub fn new_session(
    settings: &ResolvedSettings,
    name: Option<String>,
    system_prompt: Option<String>,
) -> Session {
    let mut session = Session::new(settings.model.to_string());
    session.name = name.filter(|n| !n.trim().is_empty());
    session.template_name = settings.template_name.clone();
    session.system_prompt = system_prompt
        .or_else(|| settings.system_prompt.clone())
        .filter(|s| !s.trim().is_empty());
    session
}

/// Create the responder for the model a session is bound to
///
/// # Errors
///
/// Returns `ParleyError::Config` if the stored binding is malformed or the
/// provider is unknown.
pub fn responder_for(session: &Session, settings: &ResolvedSettings) -> Result<Box<dyn Responder>> {
    let model = ModelId::parse(&session.model)?;
    create_responder(&model, &settings.providers)
}

/// Send a message without any history
pub async fn single_shot(
    responder: &dyn Responder,
    system_prompt: Option<&str>,
    message: &str,
) -> Result<String> {
    match system_prompt {
        Some(system) if !system.trim().is_empty() => {
            responder
                .chat_with_history(Some(system), &[], message)
                .await
        }
        _ => responder.chat(message).await,
    }
}

/// Send one turn of a session
///
/// The user message and the reply are appended only after the responder
/// succeeds; on failure `session` is left exactly as it was. The caller
/// persists.
pub async fn send_turn(
    responder: &dyn Responder,
    session: &mut Session,
    message: &str,
) -> Result<String> {
    let reply = responder
        .chat_with_history(session.system_prompt.as_deref(), &session.messages, message)
        .await?;

    session.add_message(Role::User, message);
    session.add_message(Role::Assistant, reply.clone());
    Ok(reply)
}

/// Run the interactive loop on `session` until the user exits
///
/// # Errors
///
/// Returns an error if the line editor cannot be created.
pub async fn run_interactive(
    store: &SessionStore,
    responder: &dyn Responder,
    session: &mut Session,
) -> Result<()> {
    let mut rl = DefaultEditor::new()?;

    print_welcome_banner(session);

    loop {
        match rl.readline("You> ") {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                rl.add_history_entry(trimmed)?;

                if handle_input(store, responder, session, trimmed).await == LoopAction::Exit {
                    break;
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                eprintln!("\nGoodbye!");
                break;
            }
            Err(err) => {
                tracing::error!("Readline error: {:?}", err);
                break;
            }
        }
    }

    Ok(())
}

/// Handle one line of interactive input
pub async fn handle_input(
    store: &SessionStore,
    responder: &dyn Responder,
    session: &mut Session,
    input: &str,
) -> LoopAction {
    let input = input.trim();
    if input.is_empty() {
        return LoopAction::Continue;
    }

    match parse_special_command(input) {
        Ok(SpecialCommand::Help) => eprintln!("{}", help_text()),
        Ok(SpecialCommand::Info) => eprintln!("\n{}\n", session_info(session)),
        Ok(SpecialCommand::Clear) => {
            print!("\x1b[H\x1b[2J");
            let _ = std::io::stdout().flush();
        }
        Ok(SpecialCommand::Exit) => {
            eprintln!("Goodbye!");
            return LoopAction::Exit;
        }
        Err(e) => eprintln!("{}", e.to_string().yellow()),
        Ok(SpecialCommand::None) => {
            let spinner = Spinner::start("Thinking...");
            let result = send_turn(responder, session, input).await;
            spinner.stop().await;

            match result {
                Ok(reply) => {
                    if let Err(e) = store.persist(session) {
                        tracing::warn!("Failed to save session {}: {:#}", session.id, e);
                        eprintln!("Warning: failed to save session: {:#}", e);
                    }
                    println!("\n{} {}\n", "Assistant>".green().bold(), reply);
                }
                Err(e) => eprintln!("{} {:#}", "Error:".red(), e),
            }
        }
    }

    LoopAction::Continue
}

fn print_welcome_banner(session: &Session) {
    eprintln!(
        "\n{}",
        format!("=== Interactive Session [{}] ===", session.short_id()).bold()
    );
    eprintln!("Model: {}", session.model.cyan());
    if let Some(system) = &session.system_prompt {
        eprintln!("System Prompt: {}", system);
    }
    eprintln!("Type '/help' for commands, '/exit' or 'Ctrl+D' to quit");
    eprintln!("===================================\n");
}

const SPINNER_FRAMES: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

/// Progress indicator drawn on stderr while a turn is in flight
///
/// The animation task and the turn share nothing but the stop signal.
struct Spinner {
    stop: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Spinner {
    fn start(label: &'static str) -> Self {
        if !std::io::stderr().is_terminal() {
            return Self {
                stop: None,
                handle: None,
            };
        }

        let (stop, mut stopped) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_millis(100));
            let mut frame = 0usize;
            loop {
                tokio::select! {
                    _ = &mut stopped => break,
                    _ = ticker.tick() => {
                        eprint!("\r{} {}", SPINNER_FRAMES[frame % SPINNER_FRAMES.len()], label);
                        let _ = std::io::stderr().flush();
                        frame += 1;
                    }
                }
            }
            eprint!("\r{}\r", " ".repeat(label.chars().count() + 2));
            let _ = std::io::stderr().flush();
        });

        Self {
            stop: Some(stop),
            handle: Some(handle),
        }
    }

    async fn stop(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, ResolvedSettings};
    use crate::error::kind;
    use crate::test_utils::{temp_store, ScriptedResponder};
    use std::path::Path;

    fn settings(template: Option<&str>) -> ResolvedSettings {
        let mut config = Config::default();
        config.templates.insert(
            "reviewer".to_string(),
            crate::config::TemplateConfig {
                system: Some("You review code.".to_string()),
                model: Some("ollama:codellama".to_string()),
            },
        );
        ResolvedSettings::resolve(&config, None, template, Some(Path::new("/tmp/unused")), None)
            .unwrap()
    }

    #[test]
    fn test_read_message_joins_arguments() {
        let words = vec!["hello".to_string(), "there".to_string()];
        let message = read_message(&words, false, std::io::empty()).unwrap();
        assert_eq!(message.as_deref(), Some("hello there"));
    }

    #[test]
    fn test_read_message_falls_back_to_trimmed_stdin() {
        let message = read_message(&[], false, "  piped text\n".as_bytes()).unwrap();
        assert_eq!(message.as_deref(), Some("piped text"));
    }

    #[test]
    fn test_read_message_optional_in_interactive_mode() {
        let message = read_message(&[], true, "ignored".as_bytes()).unwrap();
        assert!(message.is_none());
    }

    #[test]
    fn test_read_message_rejects_empty_input() {
        let err = read_message(&[], false, "   \n".as_bytes()).unwrap_err();
        assert!(matches!(kind(&err), Some(ParleyError::InvalidArgument(_))));
    }

    /// Editor command that runs `body` as a shell script
    #[cfg(unix)]
    fn editor_script(dir: &Path, body: &str) -> String {
        let path = dir.join("fake-editor.sh");
        std::fs::write(&path, format!("{}\n", body)).unwrap();
        format!("sh {}", path.display())
    }

    #[cfg(unix)]
    #[test]
    fn test_compose_in_editor_returns_trimmed_text() {
        let dir = tempfile::tempdir().unwrap();
        let editor = editor_script(dir.path(), "printf '\\n  drafted in the editor\\n\\n' > \"$1\"");

        let message = compose_in_editor(&editor).unwrap();
        assert_eq!(message, "drafted in the editor");
    }

    #[cfg(unix)]
    #[test]
    fn test_compose_in_editor_passes_editor_arguments() {
        let dir = tempfile::tempdir().unwrap();
        let script = editor_script(dir.path(), "printf '%s' \"$1\" > \"$2\"");

        let message = compose_in_editor(&format!("{} --wait", script)).unwrap();
        assert_eq!(message, "--wait");
    }

    #[cfg(unix)]
    #[test]
    fn test_compose_in_editor_rejects_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let editor = editor_script(dir.path(), "exit 0");

        let err = compose_in_editor(&editor).unwrap_err();
        assert!(
            matches!(kind(&err), Some(ParleyError::InvalidArgument(msg)) if msg.contains("no message"))
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_compose_in_editor_reports_failed_editor() {
        let dir = tempfile::tempdir().unwrap();
        let editor = editor_script(dir.path(), "exit 3");

        let err = compose_in_editor(&editor).unwrap_err();
        assert!(matches!(kind(&err), Some(ParleyError::InvalidArgument(msg)) if msg.contains("exited")));
    }

    #[test]
    fn test_compose_in_editor_reports_missing_program() {
        let err = compose_in_editor("parley-no-such-editor-binary").unwrap_err();
        assert!(
            matches!(kind(&err), Some(ParleyError::InvalidArgument(msg)) if msg.contains("failed to open editor"))
        );
    }

    #[test]
    fn test_new_session_uses_template_settings() {
        let session = new_session(&settings(Some("reviewer")), Some("review".to_string()), None);
        assert_eq!(session.model, "ollama:codellama");
        assert_eq!(session.template_name.as_deref(), Some("reviewer"));
        assert_eq!(session.system_prompt.as_deref(), Some("You review code."));
        assert_eq!(session.name.as_deref(), Some("review"));
        assert!(session.messages.is_empty());
    }

    #[test]
    fn test_new_session_explicit_system_prompt_wins() {
        let session = new_session(
            &settings(Some("reviewer")),
            None,
            Some("Answer in French.".to_string()),
        );
        assert_eq!(session.system_prompt.as_deref(), Some("Answer in French."));
    }

    #[test]
    fn test_new_session_drops_blank_name_and_prompt() {
        let session = new_session(&settings(None), Some("  ".to_string()), Some(String::new()));
        assert!(session.name.is_none());
        assert!(session.system_prompt.is_none());
        assert!(session.template_name.is_none());
    }

    #[test]
    fn test_responder_for_rejects_malformed_binding() {
        let session = Session::new("not-a-model");
        assert!(responder_for(&session, &settings(None)).is_err());
    }

    #[tokio::test]
    async fn test_single_shot_without_system_prompt_sends_bare_message() {
        let responder = ScriptedResponder::new(vec!["pong".to_string()]);
        let reply = single_shot(&responder, None, "ping").await.unwrap();
        assert_eq!(reply, "pong");
        assert_eq!(responder.prompts(), vec!["ping"]);
    }

    #[tokio::test]
    async fn test_send_turn_appends_both_messages_and_sends_prior_history() {
        let responder = ScriptedResponder::new(vec!["first".to_string(), "second".to_string()]);
        let mut session = Session::new("ollama:x");

        send_turn(&responder, &mut session, "one").await.unwrap();
        send_turn(&responder, &mut session, "two").await.unwrap();

        assert_eq!(session.message_count(), 4);
        assert_eq!(session.messages[2].content, "two");
        assert_eq!(session.messages[3].role, Role::Assistant);
        assert_eq!(session.messages[3].content, "second");
        assert_eq!(responder.history_lens(), vec![0, 2]);
    }

    #[tokio::test]
    async fn test_send_turn_failure_leaves_session_unchanged() {
        let responder = ScriptedResponder::failing("connection refused");
        let mut session = Session::new("ollama:x");
        let before = session.clone();

        let err = send_turn(&responder, &mut session, "hello").await.unwrap_err();
        assert!(matches!(kind(&err), Some(ParleyError::Upstream(_))));
        assert_eq!(session, before);
    }

    #[tokio::test]
    async fn test_handle_input_turn_persists_session() {
        let (store, _dir) = temp_store();
        let responder = ScriptedResponder::new(vec!["hi there".to_string()]);
        let mut session = Session::new("ollama:x");

        let action = handle_input(&store, &responder, &mut session, "hello").await;
        assert_eq!(action, LoopAction::Continue);

        let saved = store.load(&session.id).unwrap();
        assert_eq!(saved.message_count(), 2);
        assert_eq!(saved.messages[1].content, "hi there");
    }

    #[tokio::test]
    async fn test_handle_input_failed_turn_is_not_saved() {
        let (store, _dir) = temp_store();
        let responder = ScriptedResponder::failing("boom");
        let mut session = Session::new("ollama:x");

        let action = handle_input(&store, &responder, &mut session, "hello").await;
        assert_eq!(action, LoopAction::Continue);
        assert!(session.messages.is_empty());
        assert!(store.load(&session.id).is_err());
    }

    #[tokio::test]
    async fn test_handle_input_save_failure_keeps_loop_running() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "x").unwrap();
        let store = SessionStore::new(blocker);
        let responder = ScriptedResponder::new(vec!["ok".to_string()]);
        let mut session = Session::new("ollama:x");

        let action = handle_input(&store, &responder, &mut session, "hello").await;
        assert_eq!(action, LoopAction::Continue);
        assert_eq!(session.message_count(), 2);
    }

    #[tokio::test]
    async fn test_handle_input_special_commands_do_not_reach_responder() {
        let (store, _dir) = temp_store();
        let responder = ScriptedResponder::default();
        let mut session = Session::new("ollama:x");

        for input in ["/help", "/i", "/bogus", "   "] {
            let action = handle_input(&store, &responder, &mut session, input).await;
            assert_eq!(action, LoopAction::Continue);
        }
        assert_eq!(
            handle_input(&store, &responder, &mut session, "/quit").await,
            LoopAction::Exit
        );
        assert!(responder.prompts().is_empty());
        assert!(session.messages.is_empty());
    }
}
