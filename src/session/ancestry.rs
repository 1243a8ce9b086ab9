//! Ancestry walking and summarization
//!
//! Summarizing a session creates a child whose first message is a synthetic
//! summary of everything before it. Following `parent_id` links back from a
//! session reconstructs the whole conversation across those hand-offs.

use super::{resolve, Message, Session, SessionStore};
use crate::error::{ParleyError, Result};
use crate::providers::Responder;
use std::collections::HashSet;

/// Prefix of the first message in a session created by summarization
pub const SUMMARY_PREFIX: &str = "Previous conversation summary:\n\n";

const SUMMARY_INSTRUCTIONS: &str = "Please summarize the following conversation in 3-5 concise paragraphs.
Focus on:
- Main topics discussed
- Key decisions made
- Current status or next steps

Conversation history:

";

/// Collect the ancestors of `session`, oldest first
///
/// The walk follows `parent_id` through the identity resolver. A parent
/// that cannot be resolved (deleted, corrupt) ends the walk with a warning
/// and the chain found so far is returned.
///
/// # Errors
///
/// Returns `ParleyError::CycleDetected` if a session is reached twice.
pub fn collect_ancestors(store: &SessionStore, session: &Session) -> Result<Vec<Session>> {
    let mut visited = HashSet::new();
    visited.insert(session.id.clone());

    let mut ancestors = Vec::new();
    let mut next = session.parent_id.clone();

    while let Some(parent_id) = next {
        if !visited.insert(parent_id.clone()) {
            return Err(ParleyError::CycleDetected(parent_id).into());
        }

        let parent = match resolve(store, &parent_id) {
            Ok(parent) => parent,
            Err(e) => {
                tracing::warn!(
                    "Parent session {} could not be loaded, stopping ancestry traversal: {}",
                    parent_id,
                    e
                );
                break;
            }
        };

        next = parent.parent_id.clone();
        ancestors.push(parent);
    }

    ancestors.reverse();
    tracing::debug!(id = %session.id, ancestors = ancestors.len(), "Collected ancestry");
    Ok(ancestors)
}

/// Messages of `ancestors` followed by those of `target`, in order
///
/// The first message of any session with a parent is the summary
/// placeholder and is left out.
pub fn transcript<'a>(ancestors: &'a [Session], target: &'a Session) -> Vec<&'a Message> {
    ancestors
        .iter()
        .chain(std::iter::once(target))
        .flat_map(|session| {
            let skip = usize::from(session.parent_id.is_some());
            session.messages.iter().skip(skip)
        })
        .collect()
}

/// Render a transcript as numbered `[Message N] Role: text` blocks
pub fn render_transcript(messages: &[&Message]) -> String {
    messages
        .iter()
        .enumerate()
        .map(|(idx, msg)| format!("[Message {}] {}: {}\n\n", idx + 1, msg.role.label(), msg.content))
        .collect()
}

/// Everything needed to summarize one session
#[derive(Debug, Clone)]
pub struct SummaryPlan {
    /// Ancestors of the session, oldest first
    pub ancestors: Vec<Session>,
    /// Number of real (non-placeholder) messages being summarized
    pub message_count: usize,
    /// Prompt sent to the responder
    pub prompt: String,
}

impl SummaryPlan {
    /// Walk the ancestry of `session` and build the summarization prompt
    ///
    /// # Errors
    ///
    /// - `ParleyError::InvalidArgument` if `session` has no messages
    /// - `ParleyError::CycleDetected` from the ancestry walk
    pub fn prepare(store: &SessionStore, session: &Session) -> Result<Self> {
        if session.messages.is_empty() {
            return Err(ParleyError::InvalidArgument(format!(
                "session {} has no messages to summarize",
                session.short_id()
            ))
            .into());
        }

        let ancestors = collect_ancestors(store, session)?;
        let (message_count, prompt) = {
            let messages = transcript(&ancestors, session);
            let prompt = format!("{}{}", SUMMARY_INSTRUCTIONS, render_transcript(&messages));
            (messages.len(), prompt)
        };

        Ok(Self {
            ancestors,
            message_count,
            prompt,
        })
    }

    /// Ask `responder` for the summary and persist the resulting child session
    ///
    /// `session` is left untouched; the returned child carries its model,
    /// system prompt and template name.
    pub async fn execute(
        &self,
        store: &SessionStore,
        responder: &dyn Responder,
        session: &Session,
    ) -> Result<Session> {
        let summary = responder.chat(&self.prompt).await?;

        let mut child = Session::child_of(session);
        child.add_message(super::Role::User, format!("{}{}", SUMMARY_PREFIX, summary));
        store.persist(&child)?;

        tracing::info!(parent = %session.id, child = %child.id, "Created summary session");
        Ok(child)
    }
}

/// Summarize `session` (and its ancestry) into a new child session
pub async fn summarize(
    store: &SessionStore,
    responder: &dyn Responder,
    session: &Session,
) -> Result<Session> {
    SummaryPlan::prepare(store, session)?
        .execute(store, responder, session)
        .await
}
