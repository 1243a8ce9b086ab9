//! Identity resolution
//!
//! Maps whatever the user typed (a full identifier, a short prefix, or the
//! `latest` keyword) to exactly one stored session.

use super::{Session, SessionStore};
use crate::error::{ParleyError, Result};

/// Keyword resolving to the most recently updated session
pub const LATEST_KEYWORD: &str = "latest";

/// Shortest prefix accepted for prefix matching
pub const MIN_PREFIX_LEN: usize = 4;

const FULL_ID_LEN: usize = 36;
const FULL_ID_DASHES: [usize; 4] = [8, 13, 18, 23];

/// Returns true if `ident` has the length and dash layout of a full UUID
///
/// Only the shape is checked; hex digits are not validated, since the file
/// lookup that follows is the real test.
pub fn looks_like_full_id(ident: &str) -> bool {
    let bytes = ident.as_bytes();
    if bytes.len() != FULL_ID_LEN {
        return false;
    }
    bytes.iter().enumerate().all(|(idx, &b)| {
        if FULL_ID_DASHES.contains(&idx) {
            b == b'-'
        } else {
            b != b'-'
        }
    })
}

/// Resolve a user-supplied identifier to a single session
///
/// # Errors
///
/// - `ParleyError::NotFound` if nothing matches (or the store is empty for
///   `latest`)
/// - `ParleyError::InvalidArgument` for prefixes shorter than
///   [`MIN_PREFIX_LEN`]
/// - `ParleyError::Ambiguous` if a prefix matches more than one session
///
/// # Examples
///
/// ```no_run
/// use parley::session::{resolve, SessionStore};
///
/// let store = SessionStore::new("/tmp/sessions");
/// let session = resolve(&store, "latest")?;
/// println!("{}", session.display_name());
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn resolve(store: &SessionStore, ident: &str) -> Result<Session> {
    let ident = ident.trim();

    if ident == LATEST_KEYWORD {
        tracing::debug!("Resolving latest session");
        return store
            .list_all()?
            .into_iter()
            .next()
            .ok_or_else(|| ParleyError::NotFound("no sessions exist yet".to_string()).into());
    }

    if looks_like_full_id(ident) {
        tracing::debug!(id = %ident, "Resolving full session id");
        return store.load(ident);
    }

    if ident.chars().count() < MIN_PREFIX_LEN {
        return Err(ParleyError::InvalidArgument(format!(
            "session ID prefix \"{}\" is too short (minimum {} characters)",
            ident, MIN_PREFIX_LEN
        ))
        .into());
    }

    let mut matches: Vec<Session> = store
        .list_all()?
        .into_iter()
        .filter(|session| session.id.starts_with(ident))
        .collect();

    tracing::debug!(prefix = %ident, matches = matches.len(), "Resolved session prefix");

    match matches.len() {
        0 => Err(ParleyError::NotFound(ident.to_string()).into()),
        1 => Ok(matches.remove(0)),
        _ => Err(ParleyError::Ambiguous {
            prefix: ident.to_string(),
            candidates: matches.iter().map(Session::summary).collect(),
        }
        .into()),
    }
}
