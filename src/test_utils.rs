//! Test utilities for Parley
//!
//! Temporary session stores, session fixtures with chosen timestamps, and
//! scripted stand-ins for the responder and the confirmation prompt.

use crate::confirm::Prompter;
use crate::error::{ParleyError, Result};
use crate::providers::Responder;
use crate::session::{Message, Session, SessionStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::sync::Mutex;
use tempfile::TempDir;

/// Create a session store in a fresh temporary directory
///
/// Keep the returned `TempDir` alive for as long as the store is used.
pub fn temp_store() -> (SessionStore, TempDir) {
    let dir = TempDir::new().expect("Failed to create temporary directory");
    let store = SessionStore::new(dir.path().join("sessions"));
    (store, dir)
}

/// Session with fixed creation and update times
pub fn session_at(created_at: DateTime<Utc>, updated_at: DateTime<Utc>) -> Session {
    let mut session = Session::new("ollama:llama3.2:latest");
    session.created_at = created_at;
    session.updated_at = updated_at;
    session
}

/// Session with a chosen identifier
pub fn session_with_id(id: &str) -> Session {
    let mut session = Session::new("ollama:llama3.2:latest");
    session.id = id.to_string();
    session
}

/// Assert that an error's message contains `expected`
pub fn assert_error_contains<T>(result: Result<T>, expected: &str) {
    match result {
        Ok(_) => panic!("Expected error containing '{}' but got Ok", expected),
        Err(e) => {
            let error_msg = format!("{:#}", e);
            assert!(
                error_msg.contains(expected),
                "Error message '{}' does not contain '{}'",
                error_msg,
                expected
            );
        }
    }
}

/// Responder that replays canned replies and records what it was sent
#[derive(Default)]
pub struct ScriptedResponder {
    replies: Mutex<VecDeque<std::result::Result<String, String>>>,
    prompts: Mutex<Vec<String>>,
    history_lens: Mutex<Vec<usize>>,
}

impl ScriptedResponder {
    /// Reply with each of `replies` in turn
    pub fn new(replies: Vec<String>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().map(Ok).collect()),
            ..Self::default()
        }
    }

    /// Fail the first call with an upstream error
    pub fn failing(reason: &str) -> Self {
        Self {
            replies: Mutex::new(VecDeque::from(vec![Err(reason.to_string())])),
            ..Self::default()
        }
    }

    /// Queue another reply
    pub fn push_reply(&self, reply: &str) {
        self.replies.lock().unwrap().push_back(Ok(reply.to_string()));
    }

    /// Queue a failure
    pub fn push_failure(&self, reason: &str) {
        self.replies
            .lock()
            .unwrap()
            .push_back(Err(reason.to_string()));
    }

    /// Every message sent so far
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    /// History length sent with each call
    pub fn history_lens(&self) -> Vec<usize> {
        self.history_lens.lock().unwrap().clone()
    }

    fn next_reply(&self, message: &str, history_len: usize) -> Result<String> {
        self.prompts.lock().unwrap().push(message.to_string());
        self.history_lens.lock().unwrap().push(history_len);
        match self.replies.lock().unwrap().pop_front() {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(reason)) => Err(ParleyError::Upstream(reason).into()),
            None => Err(ParleyError::Upstream("no scripted reply left".to_string()).into()),
        }
    }
}

#[async_trait]
impl Responder for ScriptedResponder {
    async fn chat(&self, message: &str) -> Result<String> {
        self.next_reply(message, 0)
    }

    async fn chat_with_history(
        &self,
        _system_prompt: Option<&str>,
        history: &[Message],
        message: &str,
    ) -> Result<String> {
        self.next_reply(message, history.len())
    }
}

/// Prompter that answers from a script and records the questions
///
/// Once the script runs out every further question is answered with no.
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    answers: VecDeque<bool>,
    questions: Vec<String>,
}

impl ScriptedPrompter {
    /// Answer with each of `answers` in turn
    pub fn new(answers: Vec<bool>) -> Self {
        Self {
            answers: answers.into(),
            questions: Vec::new(),
        }
    }

    /// Questions asked so far
    pub fn questions(&self) -> &[String] {
        &self.questions
    }
}

impl Prompter for ScriptedPrompter {
    fn confirm(&mut self, question: &str) -> Result<bool> {
        self.questions.push(question.to_string());
        Ok(self.answers.pop_front().unwrap_or(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temp_store_is_empty() {
        let (store, _dir) = temp_store();
        assert!(store.list_all().unwrap().is_empty());
    }

    #[test]
    fn test_assert_error_contains_success() {
        let result: Result<()> = Err(ParleyError::Config("test error message".to_string()).into());
        assert_error_contains(result, "test error");
    }

    #[test]
    #[should_panic(expected = "Expected error containing")]
    fn test_assert_error_contains_ok() {
        let result: Result<()> = Ok(());
        assert_error_contains(result, "error");
    }

    #[tokio::test]
    async fn test_scripted_responder_replays_in_order() {
        let responder = ScriptedResponder::new(vec!["one".to_string()]);
        responder.push_failure("down");
        responder.push_reply("three");

        assert_eq!(responder.chat("a").await.unwrap(), "one");
        assert!(responder.chat("b").await.is_err());
        assert_eq!(responder.chat("c").await.unwrap(), "three");
        assert!(responder.chat("d").await.is_err());
        assert_eq!(responder.prompts(), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_scripted_prompter_defaults_to_no() {
        let mut prompter = ScriptedPrompter::new(vec![true]);
        assert!(prompter.confirm("first?").unwrap());
        assert!(!prompter.confirm("second?").unwrap());
        assert_eq!(prompter.questions().len(), 2);
    }
}
