//! Session management command handlers
//!
//! Implements `parley sessions list|show|delete|rename|clear|summarize|start`
//! on top of the session store.

use crate::cli::SessionsCommand;
use crate::commands::chat::{responder_for, run_interactive};
use crate::config::ResolvedSettings;
use crate::confirm::{AssumeYes, Prompter};
use crate::error::{ParleyError, Result};
use crate::providers::{ModelId, Responder};
use crate::session::{
    parse_cutoff_date, resolve, RetentionMode, RetentionPlan, RetentionReport, Session,
    SessionStore, SummaryPlan, ThresholdGuard,
};
use chrono::Utc;
use colored::Colorize;
use prettytable::{format, Table};

const NAME_WIDTH: usize = 40;

/// Handle `parley sessions` subcommands
///
/// # Arguments
///
/// * `command` - The sessions subcommand to run
/// * `settings` - Settings resolved from flags, environment and config
/// * `prompter` - Answers confirmation questions (skipped with `--yes`)
pub async fn handle_sessions(
    command: SessionsCommand,
    settings: &ResolvedSettings,
    prompter: &mut dyn Prompter,
) -> Result<()> {
    let store = SessionStore::new(settings.session_dir.clone());

    match command {
        SessionsCommand::List => list_sessions(&store),
        SessionsCommand::Show { id } => show_session(&store, &id),
        SessionsCommand::Delete { id, yes } => {
            if yes {
                delete_session(&store, &id, &mut AssumeYes).map(|_| ())
            } else {
                delete_session(&store, &id, prompter).map(|_| ())
            }
        }
        SessionsCommand::Rename { id, name } => rename_session(&store, &id, &name).map(|_| ()),
        SessionsCommand::Clear { before, all, yes } => {
            let mode = retention_mode(before.as_deref(), all, settings.retention_days)?;
            if yes {
                clear_sessions(&store, mode, &mut AssumeYes).map(|_| ())
            } else {
                clear_sessions(&store, mode, prompter).map(|_| ())
            }
        }
        SessionsCommand::Summarize { id } => {
            let session = resolve(&store, &id)?;
            let responder = responder_for(&session, settings)?;
            summarize_session(&store, responder.as_ref(), &session)
                .await
                .map(|_| ())
        }
        SessionsCommand::Start {
            id,
            model,
            ignore_threshold,
        } => {
            let mut session = match id {
                Some(ident) => {
                    let session = resolve(&store, &ident)?;
                    if model.is_some() {
                        tracing::warn!(
                            "Ignoring --model: session {} is bound to {}",
                            session.short_id(),
                            session.model
                        );
                    }
                    let guard = ThresholdGuard::new(settings.message_threshold);
                    if !guard.enforce(&session, ignore_threshold, prompter)? {
                        eprintln!("Cancelled.");
                        return Ok(());
                    }
                    session
                }
                None => start_session(settings, model.as_deref())?,
            };

            let responder = responder_for(&session, settings)?;
            run_interactive(&store, responder.as_ref(), &mut session).await
        }
    }
}

/// Print every session as a table, most recently updated first
pub fn list_sessions(store: &SessionStore) -> Result<()> {
    let sessions = store.list_all()?;

    if sessions.is_empty() {
        println!("{}", "No sessions found.".yellow());
        return Ok(());
    }

    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BORDERS_ONLY);

    table.add_row(prettytable::row![
        "ID".bold(),
        "Model".bold(),
        "Created".bold(),
        "Messages".bold(),
        "Name".bold()
    ]);

    for session in &sessions {
        let name = session.name.as_deref().map(truncate).unwrap_or_default();
        let created = session.created_at.format("%Y-%m-%d %H:%M").to_string();

        table.add_row(prettytable::row![
            session.short_id().cyan(),
            session.model,
            created,
            session.message_count(),
            name
        ]);
    }

    println!("\nSessions:");
    table.printstd();
    println!();
    println!(
        "Use {} to continue a session.",
        "parley chat -s <ID> \"your message\"".cyan()
    );
    println!();

    Ok(())
}

fn truncate(text: &str) -> String {
    if text.chars().count() > NAME_WIDTH {
        let head: String = text.chars().take(NAME_WIDTH - 3).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}

/// Print a session's metadata followed by its transcript
pub fn show_session(store: &SessionStore, ident: &str) -> Result<()> {
    let session = resolve(store, ident)?;
    println!("{}", render_session(&session));
    Ok(())
}

/// Metadata block and transcript for `sessions show`
pub fn render_session(session: &Session) -> String {
    let mut out = String::new();
    out.push_str(&format!("{} {}\n", "Session:".bold(), session.id));
    if let Some(name) = &session.name {
        out.push_str(&format!("Name: {}\n", name));
    }
    out.push_str(&format!("Model: {}\n", session.model));
    if let Some(parent) = &session.parent_id {
        out.push_str(&format!("Parent: {}\n", parent));
    }
    if let Some(template) = &session.template_name {
        out.push_str(&format!("Template: {}\n", template));
    }
    if let Some(system) = &session.system_prompt {
        out.push_str(&format!("System Prompt: {}\n", system));
    }
    out.push_str(&format!(
        "Created: {}\n",
        session.created_at.format("%Y-%m-%d %H:%M:%S")
    ));
    out.push_str(&format!(
        "Updated: {}\n",
        session.updated_at.format("%Y-%m-%d %H:%M:%S")
    ));
    out.push_str(&format!("Messages: {}\n", session.message_count()));

    for message in &session.messages {
        out.push_str(&format!(
            "\n[{}] {}\n{}\n",
            message.role.label().cyan(),
            message.timestamp.format("%Y-%m-%d %H:%M:%S"),
            message.content
        ));
    }

    out
}

/// Delete one session after confirmation
///
/// Returns `Ok(false)` when the user declines.
pub fn delete_session(
    store: &SessionStore,
    ident: &str,
    prompter: &mut dyn Prompter,
) -> Result<bool> {
    let session = resolve(store, ident)?;

    let question = match &session.name {
        Some(name) => format!("Delete session {} ({})?", session.short_id(), name),
        None => format!("Delete session {}?", session.short_id()),
    };
    if !prompter.confirm(&question)? {
        println!("Deletion cancelled.");
        return Ok(false);
    }

    store.delete(&session.id)?;
    println!(
        "{}",
        format!("Deleted session {}", session.short_id()).green()
    );
    Ok(true)
}

/// Set a session's display name
///
/// # Errors
///
/// Returns `ParleyError::InvalidArgument` for a blank name.
pub fn rename_session(store: &SessionStore, ident: &str, name: &str) -> Result<Session> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ParleyError::InvalidArgument("session name cannot be empty".to_string()).into());
    }

    let mut session = resolve(store, ident)?;
    session.name = Some(name.to_string());
    store.persist(&session)?;

    println!(
        "{}",
        format!("Renamed session {} to \"{}\"", session.short_id(), name).green()
    );
    Ok(session)
}

/// Pick the cleanup mode from the `clear` flags
pub fn retention_mode(before: Option<&str>, all: bool, retention_days: u32) -> Result<RetentionMode> {
    if all {
        return Ok(RetentionMode::All);
    }
    match before {
        Some(date) => Ok(RetentionMode::Before(parse_cutoff_date(date)?)),
        None => Ok(RetentionMode::OlderThanDays(retention_days)),
    }
}

/// Run a retention cleanup
///
/// Returns `Ok(None)` when nothing was deleted because there was nothing
/// to delete or the user declined.
pub fn clear_sessions(
    store: &SessionStore,
    mode: RetentionMode,
    prompter: &mut dyn Prompter,
) -> Result<Option<RetentionReport>> {
    let plan = RetentionPlan::build(store.list_all()?, mode, Utc::now());
    let cutoff = plan
        .cutoff
        .map(|c| c.format("%Y-%m-%d").to_string())
        .unwrap_or_default();

    if plan.to_delete.is_empty() && plan.protected.is_empty() {
        match mode {
            RetentionMode::All => println!("No sessions found."),
            _ => println!("No sessions found created before {}.", cutoff),
        }
        return Ok(None);
    }

    if !plan.protected.is_empty() {
        eprintln!(
            "\n{}",
            "Notice: The following sessions were not deleted (referenced by child sessions):"
                .yellow()
        );
        for session in &plan.protected {
            eprintln!(
                "  - {} (created: {})",
                session.short_id(),
                session.created_at.format("%Y-%m-%d")
            );
        }
        eprintln!();
    }

    if plan.to_delete.is_empty() {
        println!("No sessions to delete after excluding protected parent sessions.");
        return Ok(None);
    }

    let count = plan.to_delete.len();
    let question = match mode {
        RetentionMode::All => format!("Delete all {} sessions?", count),
        RetentionMode::Before(_) => format!("Delete {} sessions created before {}?", count, cutoff),
        RetentionMode::OlderThanDays(days) => format!(
            "Delete {} sessions older than {} days (created before {})?",
            count, days, cutoff
        ),
    };
    if !prompter.confirm(&question)? {
        println!("Deletion cancelled.");
        return Ok(None);
    }

    let report = plan.execute(store);
    for (id, err) in &report.failures {
        eprintln!("Warning: failed to delete session {}: {}", id, err);
    }

    if report.failed() > 0 {
        println!(
            "Successfully deleted {} sessions ({} failed).",
            report.deleted,
            report.failed()
        );
    } else {
        println!(
            "{}",
            format!("Successfully deleted {} sessions.", report.deleted).green()
        );
    }

    Ok(Some(report))
}

/// Summarize `session` into a new child session, printing progress
pub async fn summarize_session(
    store: &SessionStore,
    responder: &dyn Responder,
    session: &Session,
) -> Result<Session> {
    let plan = SummaryPlan::prepare(store, session)?;

    if plan.ancestors.is_empty() {
        eprintln!(
            "Summarizing {} messages from session {}...",
            plan.message_count,
            session.short_id()
        );
    } else {
        eprintln!(
            "Summarizing {} messages from session {} and {} ancestor session(s)...",
            plan.message_count,
            session.short_id(),
            plan.ancestors.len()
        );
    }
    eprintln!("Generating summary using {}...", session.model);

    let child = plan.execute(store, responder, session).await?;

    println!(
        "\n{}",
        format!(
            "New session created: {} (parent: {})",
            child.short_id(),
            session.short_id()
        )
        .green()
    );
    println!("Path: {}", store.path_for(&child.id).display());
    println!(
        "\nContinue with:\n  parley chat -s {} \"your message\"",
        child.short_id()
    );

    Ok(child)
}

/// Build a fresh session for `sessions start`
///
/// # Errors
///
/// Returns `ParleyError::Config` if `model` is not a valid
/// `provider:model` identifier.
pub fn start_session(settings: &ResolvedSettings, model: Option<&str>) -> Result<Session> {
    let model = match model {
        Some(model) => ModelId::parse(model)?,
        None => settings.model.clone(),
    };

    let mut session = Session::new(model.to_string());
    session.template_name = settings.template_name.clone();
    session.system_prompt = settings.system_prompt.clone();
    tracing::info!(session = %session.id, model = %session.model, "Starting new session");
    Ok(session)
}
