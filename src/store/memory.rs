//! Transactional in-memory store for enrollments and attempts.
//!
//! All state lives behind one `tokio::sync::RwLock`; a mutating operation
//! holds the write guard for its full read-check-write span, which makes the
//! guard the transaction boundary. Every fallible check runs before the
//! first mutation, so a failed operation leaves both rows untouched, and the
//! enrollment aggregate is recomputed inside the same critical section as
//! the attempt update that triggered it.

use super::records::{Attempt, Enrollment, LegacyBookmark};
use crate::cmi::NormalizedBatch;
use crate::core::{
    AttemptId, ContentId, EnrollmentId, EnrollmentStatus, EntryMode, ExitMode, LearnerId, Result,
    ScormVersion, SessionId, TrackError,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Everything the engine persists. Serializable as a unit so snapshots are a
/// pure dump of rows.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct StoreState {
    pub enrollments: HashMap<EnrollmentId, Enrollment>,
    pub attempts: HashMap<AttemptId, Attempt>,
    pub attempts_by_enrollment: HashMap<EnrollmentId, Vec<AttemptId>>,
    pub enrollment_index: HashMap<(LearnerId, ContentId), EnrollmentId>,
    pub legacy_bookmarks: HashMap<EnrollmentId, LegacyBookmark>,
}

/// Outcome of applying (or deduplicating) one commit.
#[derive(Debug, Clone, Copy)]
pub struct CommitApplied {
    pub duplicate: bool,
    pub attempt_complete: bool,
    pub newly_completed: bool,
    pub enrollment_status: EnrollmentStatus,
}

pub struct TrackingStore {
    state: RwLock<StoreState>,
}

impl Default for TrackingStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TrackingStore {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(StoreState::default()),
        }
    }

    pub fn from_state(state: StoreState) -> Self {
        Self {
            state: RwLock::new(state),
        }
    }

    /// Idempotent: returns the existing enrollment or creates a zeroed one.
    pub async fn get_or_create_enrollment(
        &self,
        learner: &LearnerId,
        content: &ContentId,
    ) -> Enrollment {
        let mut state = self.state.write().await;
        let key = (learner.clone(), content.clone());
        if let Some(id) = state.enrollment_index.get(&key) {
            return state.enrollments[id].clone();
        }
        let enrollment = Enrollment::new(learner.clone(), content.clone(), Utc::now());
        state.enrollment_index.insert(key, enrollment.id);
        state
            .attempts_by_enrollment
            .insert(enrollment.id, Vec::new());
        state.enrollments.insert(enrollment.id, enrollment.clone());
        enrollment
    }

    pub async fn find_enrollment(
        &self,
        learner: &LearnerId,
        content: &ContentId,
    ) -> Option<Enrollment> {
        let state = self.state.read().await;
        let id = state
            .enrollment_index
            .get(&(learner.clone(), content.clone()))?;
        state.enrollments.get(id).cloned()
    }

    pub async fn enrollment(&self, id: EnrollmentId) -> Option<Enrollment> {
        self.state.read().await.enrollments.get(&id).cloned()
    }

    pub async fn attempt(&self, id: AttemptId) -> Option<Attempt> {
        self.state.read().await.attempts.get(&id).cloned()
    }

    pub async fn attempts_of(&self, enrollment: EnrollmentId) -> Vec<Attempt> {
        let state = self.state.read().await;
        state
            .attempts_by_enrollment
            .get(&enrollment)
            .into_iter()
            .flatten()
            .filter_map(|id| state.attempts.get(id).cloned())
            .collect()
    }

    /// Most recent non-terminated attempt, if any. At most one exists.
    pub async fn latest_open_attempt(&self, enrollment: EnrollmentId) -> Option<Attempt> {
        let state = self.state.read().await;
        latest_open(&state, enrollment).cloned()
    }

    /// Most recent attempt that committed under the given session id,
    /// terminated or not. Lets a late retry land on its own attempt instead
    /// of forking a fresh one.
    pub async fn find_attempt_by_session(
        &self,
        enrollment: EnrollmentId,
        session: &SessionId,
    ) -> Option<Attempt> {
        let state = self.state.read().await;
        state
            .attempts_by_enrollment
            .get(&enrollment)?
            .iter()
            .rev()
            .filter_map(|id| state.attempts.get(id))
            .find(|attempt| &attempt.session == session)
            .cloned()
    }

    /// Returns the current open attempt, or allocates the next attempt
    /// number and creates a fresh row. Creation is serialized by the write
    /// guard, so two concurrent first launches cannot fork two open
    /// attempts.
    pub async fn get_open_attempt_or_create(
        &self,
        enrollment: EnrollmentId,
        session: &SessionId,
        version: ScormVersion,
        entry_mode: EntryMode,
    ) -> Result<Attempt> {
        let mut state = self.state.write().await;
        if let Some(open) = latest_open(&state, enrollment) {
            return Ok(open.clone());
        }

        let row = state
            .enrollments
            .get_mut(&enrollment)
            .ok_or_else(|| TrackError::NotFound(format!("enrollment {:?}", enrollment.0)))?;
        row.total_attempts += 1;
        if row.status == EnrollmentStatus::NotStarted {
            row.status = EnrollmentStatus::InProgress;
        }
        let number = row.total_attempts;

        let attempt = Attempt::new(
            enrollment,
            number,
            session.clone(),
            version,
            entry_mode,
            Utc::now(),
        );
        state
            .attempts_by_enrollment
            .entry(enrollment)
            .or_default()
            .push(attempt.id);
        state.attempts.insert(attempt.id, attempt.clone());
        Ok(attempt)
    }

    /// The critical path: applies one validated commit to an attempt and
    /// recomputes its enrollment aggregate, atomically.
    ///
    /// A sequence number at or below the attempt's watermark for the same
    /// session id is a duplicate: reported as success with no state change.
    /// A commit carrying a *different* session id re-keys the open attempt
    /// to the new session (a second tab adopting it) and restarts the
    /// sequence watermark.
    pub async fn apply_commit(
        &self,
        attempt_id: AttemptId,
        session: &SessionId,
        sequence: u64,
        batch: &NormalizedBatch,
        now: DateTime<Utc>,
    ) -> Result<CommitApplied> {
        let mut state = self.state.write().await;

        let attempt = state
            .attempts
            .get(&attempt_id)
            .ok_or_else(|| TrackError::NotFound(format!("attempt {:?}", attempt_id.0)))?;
        let enrollment_id = attempt.enrollment;
        let same_session = &attempt.session == session;
        if !state.enrollments.contains_key(&enrollment_id) {
            return Err(TrackError::Storage(format!(
                "attempt {:?} references missing enrollment",
                attempt_id.0
            )));
        }

        if same_session && sequence <= attempt.last_applied_sequence {
            tracing::debug!(
                attempt = %attempt_id.0,
                session = %session,
                sequence,
                watermark = attempt.last_applied_sequence,
                "duplicate commit ignored"
            );
            let status = state.enrollments[&enrollment_id].status;
            return Ok(CommitApplied {
                duplicate: true,
                attempt_complete: attempt.completed_at.is_some(),
                newly_completed: false,
                enrollment_status: status,
            });
        }

        // All checks passed; from here on nothing fails.
        let attempt = state
            .attempts
            .get_mut(&attempt_id)
            .expect("attempt row present under held write guard");
        if !same_session {
            attempt.session = session.clone();
        }
        attempt.last_applied_sequence = sequence;
        let newly_completed = attempt.apply_batch(batch, now);
        let attempt_complete = attempt.completed_at.is_some();
        let attempt_score = attempt.score.raw;

        let enrollment_status =
            recompute_enrollment(&mut state, enrollment_id, newly_completed, attempt_score, now);

        Ok(CommitApplied {
            duplicate: false,
            attempt_complete,
            newly_completed,
            enrollment_status,
        })
    }

    /// Marks the attempt terminated. Exit mode comes from the last committed
    /// exit element unless the caller supplies an explicit one; everything
    /// else stays as last committed (no implicit final commit).
    pub async fn terminate_attempt(
        &self,
        attempt_id: AttemptId,
        exit_mode: Option<ExitMode>,
    ) -> Result<Attempt> {
        let mut state = self.state.write().await;
        let attempt = state
            .attempts
            .get_mut(&attempt_id)
            .ok_or_else(|| TrackError::NotFound(format!("attempt {:?}", attempt_id.0)))?;
        attempt.terminated = true;
        attempt.exit_mode = exit_mode.or(attempt.exit).or(Some(ExitMode::Normal));
        Ok(attempt.clone())
    }

    pub async fn legacy_bookmark(&self, enrollment: EnrollmentId) -> Option<LegacyBookmark> {
        self.state
            .read()
            .await
            .legacy_bookmarks
            .get(&enrollment)
            .cloned()
    }

    pub async fn set_legacy_bookmark(&self, enrollment: EnrollmentId, bookmark: LegacyBookmark) {
        self.state
            .write()
            .await
            .legacy_bookmarks
            .insert(enrollment, bookmark);
    }

    /// Clone the full row set, for snapshotting.
    pub async fn export_state(&self) -> StoreState {
        let state = self.state.read().await;
        StoreState {
            enrollments: state.enrollments.clone(),
            attempts: state.attempts.clone(),
            attempts_by_enrollment: state.attempts_by_enrollment.clone(),
            enrollment_index: state.enrollment_index.clone(),
            legacy_bookmarks: state.legacy_bookmarks.clone(),
        }
    }
}

fn latest_open(state: &StoreState, enrollment: EnrollmentId) -> Option<&Attempt> {
    state
        .attempts_by_enrollment
        .get(&enrollment)?
        .iter()
        .rev()
        .filter_map(|id| state.attempts.get(id))
        .find(|attempt| attempt.is_open())
}

/// Recompute the enrollment aggregate from its attempts. Cumulative time is
/// a full re-sum, never an increment, so retried commits cannot double
/// count. Completion side effects fire only on a first transition.
fn recompute_enrollment(
    state: &mut StoreState,
    enrollment_id: EnrollmentId,
    newly_completed: bool,
    completing_score: Option<f64>,
    now: DateTime<Utc>,
) -> EnrollmentStatus {
    let cumulative: u64 = state
        .attempts_by_enrollment
        .get(&enrollment_id)
        .into_iter()
        .flatten()
        .filter_map(|id| state.attempts.get(id))
        .map(|attempt| attempt.total_time_seconds)
        .sum();

    let enrollment = state
        .enrollments
        .get_mut(&enrollment_id)
        .expect("enrollment row checked before mutation");
    enrollment.cumulative_time_seconds = cumulative;
    if enrollment.status == EnrollmentStatus::NotStarted {
        enrollment.status = EnrollmentStatus::InProgress;
    }

    if newly_completed {
        enrollment.status = EnrollmentStatus::Completed;
        enrollment.last_completion_at = Some(now);
        if enrollment.first_completion_at.is_none() {
            enrollment.first_completion_at = Some(now);
        }
        if let Some(score) = completing_score {
            let best = enrollment.best_score.map_or(score, |b| b.max(score));
            enrollment.best_score = Some(best);
        }
    }

    enrollment.status
}
