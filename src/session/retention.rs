//! Age-based bulk cleanup
//!
//! Cleanup happens in two steps: [`RetentionPlan::build`] decides what goes
//! without touching the disk, so the caller can show the plan and ask for
//! confirmation, then [`RetentionPlan::execute`] performs the deletions.

use super::{Session, SessionStore};
use crate::error::{ParleyError, Result};
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use std::collections::HashSet;

/// Which sessions a cleanup targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetentionMode {
    /// Every session
    All,
    /// Sessions created strictly before the given instant
    Before(DateTime<Utc>),
    /// Sessions created more than the given number of days ago
    OlderThanDays(u32),
}

impl RetentionMode {
    /// Cutoff instant for this mode, `None` for [`RetentionMode::All`]
    ///
    /// A window reaching past the earliest representable instant saturates
    /// there, so no session is old enough to be a candidate.
    pub fn cutoff(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Self::All => None,
            Self::Before(cutoff) => Some(*cutoff),
            Self::OlderThanDays(days) => Some(
                now.checked_sub_signed(Duration::days(i64::from(*days)))
                    .unwrap_or(DateTime::<Utc>::MIN_UTC),
            ),
        }
    }
}

/// Parse a `YYYY`, `YYYY-MM` or `YYYY-MM-DD` date into the first UTC
/// instant of that period
///
/// # Errors
///
/// Returns `ParleyError::InvalidArgument` for any other shape or for a date
/// that does not exist.
///
/// # Examples
///
/// ```
/// use parley::session::parse_cutoff_date;
///
/// let cutoff = parse_cutoff_date("2024-03").unwrap();
/// assert_eq!(cutoff.to_rfc3339(), "2024-03-01T00:00:00+00:00");
/// assert!(parse_cutoff_date("03/2024").is_err());
/// ```
pub fn parse_cutoff_date(input: &str) -> Result<DateTime<Utc>> {
    let invalid = || {
        ParleyError::InvalidArgument(format!(
            "invalid date format: {} (use YYYY-MM-DD, YYYY-MM, or YYYY)",
            input
        ))
    };

    let digits = |part: &str, len: usize| part.len() == len && part.bytes().all(|b| b.is_ascii_digit());

    let parts: Vec<&str> = input.trim().split('-').collect();
    let (year, month, day) = match parts.as_slice() {
        [y] if digits(*y, 4) => (*y, "1", "1"),
        [y, m] if digits(*y, 4) && digits(*m, 2) => (*y, *m, "1"),
        [y, m, d] if digits(*y, 4) && digits(*m, 2) && digits(*d, 2) => (*y, *m, *d),
        _ => return Err(invalid().into()),
    };

    let year: i32 = year.parse().map_err(|_| invalid())?;
    let month: u32 = month.parse().map_err(|_| invalid())?;
    let day: u32 = day.parse().map_err(|_| invalid())?;

    let midnight = NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .ok_or_else(invalid)?;

    Ok(Utc.from_utc_datetime(&midnight))
}

/// What a cleanup will do, computed before anything is deleted
#[derive(Debug, Clone)]
pub struct RetentionPlan {
    /// Cutoff instant, `None` when every session is a candidate
    pub cutoff: Option<DateTime<Utc>>,
    /// Candidates that will be deleted
    pub to_delete: Vec<Session>,
    /// Candidates kept because a surviving session names them as parent
    pub protected: Vec<Session>,
    /// Number of sessions that were never candidates
    pub untouched: usize,
}

impl RetentionPlan {
    /// Split `sessions` into deletions, protected parents and the rest
    ///
    /// Protection is a single pass: a candidate is kept only if a
    /// non-candidate session names it as parent. A candidate whose only
    /// child is itself a protected candidate is still deleted.
    pub fn build(sessions: Vec<Session>, mode: RetentionMode, now: DateTime<Utc>) -> Self {
        let cutoff = mode.cutoff(now);
        let is_candidate = |session: &Session| match cutoff {
            None => true,
            Some(cutoff) => session.created_at < cutoff,
        };

        let candidates: HashSet<String> = sessions
            .iter()
            .filter(|s| is_candidate(*s))
            .map(|s| s.id.clone())
            .collect();

        let protected_ids: HashSet<String> = sessions
            .iter()
            .filter(|s| !candidates.contains(&s.id))
            .filter_map(|s| s.parent_id.as_ref())
            .filter(|parent| candidates.contains(*parent))
            .cloned()
            .collect();

        let mut plan = Self {
            cutoff,
            to_delete: Vec::new(),
            protected: Vec::new(),
            untouched: 0,
        };

        for session in sessions {
            if protected_ids.contains(&session.id) {
                plan.protected.push(session);
            } else if candidates.contains(&session.id) {
                plan.to_delete.push(session);
            } else {
                plan.untouched += 1;
            }
        }

        tracing::debug!(
            delete = plan.to_delete.len(),
            protected = plan.protected.len(),
            untouched = plan.untouched,
            "Built retention plan"
        );
        plan
    }

    /// Delete every planned session, continuing past individual failures
    pub fn execute(&self, store: &SessionStore) -> RetentionReport {
        let mut report = RetentionReport {
            protected: self.protected.len(),
            ..RetentionReport::default()
        };

        for session in &self.to_delete {
            match store.delete(&session.id) {
                Ok(()) => report.deleted += 1,
                Err(e) => {
                    tracing::warn!("Failed to delete session {}: {}", session.short_id(), e);
                    report
                        .failures
                        .push((session.short_id().to_string(), e.to_string()));
                }
            }
        }

        tracing::info!(
            deleted = report.deleted,
            failed = report.failures.len(),
            "Retention cleanup finished"
        );
        report
    }
}

/// Outcome of [`RetentionPlan::execute`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetentionReport {
    /// Sessions removed
    pub deleted: usize,
    /// Short id and error message of every session that could not be removed
    pub failures: Vec<(String, String)>,
    /// Sessions kept as protected parents
    pub protected: usize,
}

impl RetentionReport {
    /// Number of failed deletions
    pub fn failed(&self) -> usize {
        self.failures.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::kind;
    use crate::test_utils::{session_at, temp_store};

    fn days_ago(now: DateTime<Utc>, days: i64) -> Session {
        let at = now - Duration::days(days);
        session_at(at, at)
    }

    fn ids(sessions: &[Session]) -> Vec<&str> {
        sessions.iter().map(|s| s.id.as_str()).collect()
    }

    #[test]
    fn test_parse_cutoff_date_accepts_three_granularities() {
        assert_eq!(
            parse_cutoff_date("2024-05-17").unwrap().to_rfc3339(),
            "2024-05-17T00:00:00+00:00"
        );
        assert_eq!(
            parse_cutoff_date("2024-05").unwrap().to_rfc3339(),
            "2024-05-01T00:00:00+00:00"
        );
        assert_eq!(
            parse_cutoff_date("2024").unwrap().to_rfc3339(),
            "2024-01-01T00:00:00+00:00"
        );
    }

    #[test]
    fn test_parse_cutoff_date_rejects_other_shapes() {
        for input in ["", "24", "2024-5", "2024-05-1", "2024/05/01", "2024-13", "2024-02-30", "yesterday"] {
            let err = parse_cutoff_date(input).unwrap_err();
            assert!(
                matches!(kind(&err), Some(ParleyError::InvalidArgument(_))),
                "{:?} should be rejected",
                input
            );
        }
    }

    #[test]
    fn test_retention_window_protects_parent_of_survivor() {
        let now = Utc::now();
        let middle = days_ago(now, 40);
        let oldest = days_ago(now, 100);
        let mut recent = days_ago(now, 10);
        recent.parent_id = Some(oldest.id.clone());

        let plan = RetentionPlan::build(
            vec![recent.clone(), middle.clone(), oldest.clone()],
            RetentionMode::OlderThanDays(30),
            now,
        );

        assert_eq!(ids(&plan.to_delete), vec![middle.id.as_str()]);
        assert_eq!(ids(&plan.protected), vec![oldest.id.as_str()]);
        assert_eq!(plan.untouched, 1);
    }

    #[test]
    fn test_protection_is_single_pass() {
        let now = Utc::now();
        let grandparent = days_ago(now, 100);
        let mut parent = days_ago(now, 60);
        parent.parent_id = Some(grandparent.id.clone());
        let mut child = days_ago(now, 1);
        child.parent_id = Some(parent.id.clone());

        let plan = RetentionPlan::build(
            vec![child, parent.clone(), grandparent.clone()],
            RetentionMode::OlderThanDays(30),
            now,
        );

        assert_eq!(ids(&plan.protected), vec![parent.id.as_str()]);
        assert_eq!(ids(&plan.to_delete), vec![grandparent.id.as_str()]);
    }

    #[test]
    fn test_before_cutoff_is_strict() {
        let cutoff = parse_cutoff_date("2024-01-01").unwrap();
        let before = session_at(cutoff - Duration::seconds(1), cutoff);
        let exactly = session_at(cutoff, cutoff);
        let after = session_at(cutoff + Duration::days(3), cutoff + Duration::days(3));

        let plan = RetentionPlan::build(
            vec![before.clone(), exactly, after],
            RetentionMode::Before(cutoff),
            Utc::now(),
        );

        assert_eq!(ids(&plan.to_delete), vec![before.id.as_str()]);
        assert!(plan.protected.is_empty());
        assert_eq!(plan.untouched, 2);
    }

    #[test]
    fn test_huge_window_saturates_instead_of_overflowing() {
        let now = Utc::now();
        let cutoff = RetentionMode::OlderThanDays(u32::MAX).cutoff(now);
        assert_eq!(cutoff, Some(DateTime::<Utc>::MIN_UTC));

        let cutoff = RetentionMode::OlderThanDays(200_000_000).cutoff(now);
        assert_eq!(cutoff, Some(DateTime::<Utc>::MIN_UTC));

        let plan = RetentionPlan::build(
            vec![days_ago(now, 10_000)],
            RetentionMode::OlderThanDays(200_000_000),
            now,
        );
        assert!(plan.to_delete.is_empty());
        assert_eq!(plan.untouched, 1);
    }

    #[test]
    fn test_all_mode_targets_everything() {
        let now = Utc::now();
        let a = days_ago(now, 0);
        let mut b = days_ago(now, 5);
        b.parent_id = Some(a.id.clone());

        let plan = RetentionPlan::build(vec![a, b], RetentionMode::All, now);
        assert_eq!(plan.to_delete.len(), 2);
        assert!(plan.protected.is_empty());
        assert!(plan.cutoff.is_none());
    }

    #[test]
    fn test_execute_deletes_planned_sessions_and_keeps_the_rest() {
        let (store, _dir) = temp_store();
        let now = Utc::now();
        let keep = days_ago(now, 1);
        let drop_a = days_ago(now, 45);
        let drop_b = days_ago(now, 90);
        for s in [&keep, &drop_a, &drop_b] {
            store.persist(s).unwrap();
        }

        let plan = RetentionPlan::build(store.list_all().unwrap(), RetentionMode::OlderThanDays(30), now);
        let report = plan.execute(&store);

        assert_eq!(report.deleted, 2);
        assert_eq!(report.failed(), 0);
        let remaining = store.list_all().unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, keep.id);
    }

    #[test]
    fn test_execute_tallies_failures_without_aborting() {
        let (store, _dir) = temp_store();
        let now = Utc::now();
        let gone = days_ago(now, 50);
        let present = days_ago(now, 60);
        store.persist(&gone).unwrap();
        store.persist(&present).unwrap();

        let plan = RetentionPlan::build(store.list_all().unwrap(), RetentionMode::All, now);
        store.delete(&gone.id).unwrap();

        let report = plan.execute(&store);
        assert_eq!(report.deleted, 1);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.failures[0].0, gone.short_id());
        assert!(store.list_all().unwrap().is_empty());
    }
}
