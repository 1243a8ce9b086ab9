//! Long-session warning
//!
//! Continuing a session with a very long history costs more tokens on every
//! turn. The guard warns once the history reaches a configured size and lets
//! the user decide; it never blocks on its own.

use super::Session;
use crate::confirm::Prompter;
use crate::error::Result;

/// Default message count at which the guard trips
pub const DEFAULT_MESSAGE_THRESHOLD: usize = 50;

/// Outcome of checking a session against the threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdCheck {
    /// The guard is turned off (threshold 0)
    Disabled,
    /// The session is below the threshold
    WithinLimit,
    /// The threshold was reached but the caller asked to ignore it
    Bypassed,
    /// The threshold was reached and the user has to decide
    Exceeded {
        /// Messages in the session
        count: usize,
        /// Configured threshold
        threshold: usize,
    },
}

/// Checks message counts before a session is continued
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThresholdGuard {
    threshold: usize,
}

impl Default for ThresholdGuard {
    fn default() -> Self {
        Self::new(DEFAULT_MESSAGE_THRESHOLD)
    }
}

impl ThresholdGuard {
    /// Create a guard tripping at `threshold` messages; 0 disables it
    pub fn new(threshold: usize) -> Self {
        Self { threshold }
    }

    /// Configured threshold
    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Classify `session` without asking anything
    pub fn check(&self, session: &Session, ignore: bool) -> ThresholdCheck {
        if self.threshold == 0 {
            return ThresholdCheck::Disabled;
        }

        let count = session.message_count();
        if count < self.threshold {
            ThresholdCheck::WithinLimit
        } else if ignore {
            tracing::debug!(count, threshold = self.threshold, "Message threshold bypassed");
            ThresholdCheck::Bypassed
        } else {
            ThresholdCheck::Exceeded {
                count,
                threshold: self.threshold,
            }
        }
    }

    /// Check `session` and, if the threshold tripped, warn and ask whether to
    /// continue
    ///
    /// Returns `Ok(false)` when the user declines.
    pub fn enforce(
        &self,
        session: &Session,
        ignore: bool,
        prompter: &mut dyn Prompter,
    ) -> Result<bool> {
        match self.check(session, ignore) {
            ThresholdCheck::Exceeded { count, threshold } => {
                eprintln!("{}", warning_text(session, count, threshold));
                prompter.confirm("Continue with this session?")
            }
            _ => Ok(true),
        }
    }
}

/// Warning shown when a session reaches the threshold
pub fn warning_text(session: &Session, count: usize, threshold: usize) -> String {
    let short = session.short_id();
    format!(
        "\nWarning: Session {short} has {count} messages (threshold: {threshold}).\n\
         Long sessions may impact performance and token usage.\n\
         \n\
         Options:\n  \
         1. Continue anyway with --ignore-threshold flag\n  \
         2. Summarize session: parley sessions summarize {short}\n  \
         3. Start a new session: parley chat --new-session\n"
    )
}
