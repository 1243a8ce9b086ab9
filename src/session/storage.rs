//! File-per-session storage
//!
//! Each session lives in `<dir>/<id>.json`. Writes overwrite in place with
//! no locking: the CLI assumes one writer per session identifier, and when
//! two invocations race on the same session the later write wins.

use super::Session;
use crate::error::{ParleyError, Result};
use anyhow::Context;
use std::cmp::Ordering;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

const SESSION_FILE_EXTENSION: &str = "json";

/// Storage backend for conversation sessions
#[derive(Debug, Clone)]
pub struct SessionStore {
    dir: PathBuf,
}

impl SessionStore {
    /// Create a store rooted at `dir`
    ///
    /// The directory is not touched until the first write or listing.
    ///
    /// # Examples
    ///
    /// ```
    /// use parley::session::SessionStore;
    ///
    /// let store = SessionStore::new("/tmp/parley-sessions");
    /// assert!(store.dir().ends_with("parley-sessions"));
    /// ```
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding the session files
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file backing the session `id`
    pub fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", id, SESSION_FILE_EXTENSION))
    }

    fn ensure_dir(&self) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create session directory {}", self.dir.display()))
            .map_err(|e| ParleyError::Storage(format!("{:#}", e)))?;
        Ok(())
    }

    /// Write `session` to disk, replacing any previous version
    ///
    /// # Errors
    ///
    /// Returns `ParleyError::Storage` if the directory cannot be created or
    /// the file cannot be written.
    pub fn persist(&self, session: &Session) -> Result<()> {
        self.ensure_dir()?;

        let data = serde_json::to_string_pretty(session).map_err(ParleyError::from)?;

        let path = self.path_for(&session.id);
        std::fs::write(&path, data)
            .with_context(|| format!("Failed to write session file {}", path.display()))
            .map_err(|e| ParleyError::Storage(format!("{:#}", e)))?;

        tracing::debug!(id = %session.id, messages = session.messages.len(), "Persisted session");
        Ok(())
    }

    /// Read the session with full identifier `id`
    ///
    /// # Errors
    ///
    /// - `ParleyError::NotFound` if no file exists for `id`
    /// - `ParleyError::Corrupt` if the file cannot be parsed or records a
    ///   different identifier than its name
    /// - `ParleyError::Storage` for any other read failure
    pub fn load(&self, id: &str) -> Result<Session> {
        if !is_plain_file_stem(id) {
            return Err(ParleyError::NotFound(id.to_string()).into());
        }

        let path = self.path_for(id);
        let data = match std::fs::read_to_string(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(ParleyError::NotFound(id.to_string()).into());
            }
            Err(e) => {
                return Err(ParleyError::Storage(format!(
                    "Failed to read session file {}: {}",
                    path.display(),
                    e
                ))
                .into());
            }
        };

        let session: Session =
            serde_json::from_str(&data).map_err(|e| ParleyError::Corrupt {
                id: id.to_string(),
                reason: e.to_string(),
            })?;

        if session.id != id {
            return Err(ParleyError::Corrupt {
                id: id.to_string(),
                reason: format!("file records session id {}", session.id),
            }
            .into());
        }

        tracing::debug!(id = %id, "Loaded session");
        Ok(session)
    }

    /// Remove the session with full identifier `id`
    ///
    /// # Errors
    ///
    /// Returns `ParleyError::NotFound` if there is nothing to delete; a
    /// repeated delete never reports success.
    pub fn delete(&self, id: &str) -> Result<()> {
        if !is_plain_file_stem(id) {
            return Err(ParleyError::NotFound(id.to_string()).into());
        }

        let path = self.path_for(id);
        match std::fs::remove_file(&path) {
            Ok(()) => {
                tracing::debug!(id = %id, "Deleted session");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(ParleyError::NotFound(id.to_string()).into())
            }
            Err(e) => Err(ParleyError::Storage(format!(
                "Failed to delete session file {}: {}",
                path.display(),
                e
            ))
            .into()),
        }
    }

    /// List every readable session, most recently updated first
    ///
    /// Files that fail to load, including files whose name differs from the
    /// identifier they record, are skipped with a warning so that one bad
    /// record never hides the rest of the store. Sessions with identical
    /// `updated_at` are ordered by identifier.
    pub fn list_all(&self) -> Result<Vec<Session>> {
        self.ensure_dir()?;

        let entries = std::fs::read_dir(&self.dir)
            .with_context(|| format!("Failed to read session directory {}", self.dir.display()))
            .map_err(|e| ParleyError::Storage(format!("{:#}", e)))?;

        let mut sessions = Vec::new();
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("Skipping unreadable directory entry: {}", e);
                    continue;
                }
            };

            let path = entry.path();
            if path.is_dir()
                || path.extension().and_then(|ext| ext.to_str()) != Some(SESSION_FILE_EXTENSION)
            {
                continue;
            }

            let Some(id) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };

            match self.load(id) {
                Ok(session) => sessions.push(session),
                Err(e) => tracing::warn!("Skipping session file {}: {}", path.display(), e),
            }
        }

        sessions.sort_by(most_recent_first);
        Ok(sessions)
    }
}

/// Ordering used by [`SessionStore::list_all`]
pub fn most_recent_first(a: &Session, b: &Session) -> Ordering {
    b.updated_at
        .cmp(&a.updated_at)
        .then_with(|| a.id.cmp(&b.id))
}

fn is_plain_file_stem(id: &str) -> bool {
    !id.is_empty() && !id.contains(['/', '\\']) && id != "." && id != ".."
}
