//! Persistent row types for enrollments and attempts.

use crate::cmi::NormalizedBatch;
use crate::completion;
use crate::core::{
    AttemptId, CompletionStatus, ContentId, EnrollmentId, EnrollmentStatus, EntryMode, ExitMode,
    LearnerId, LessonStatus, ScormVersion, Score, SessionId, SuccessStatus,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Lifetime record of one learner's relationship to one content package.
/// Aggregates all attempts; only ever mutated by the tracking store, only
/// ever read by the gradebook through the summary surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: EnrollmentId,
    pub learner: LearnerId,
    pub content: ContentId,
    pub status: EnrollmentStatus,
    /// Highest raw score seen across all completed attempts.
    pub best_score: Option<f64>,
    pub first_completion_at: Option<DateTime<Utc>>,
    pub last_completion_at: Option<DateTime<Utc>>,
    /// Always recomputed by summing attempt totals, never incremented.
    pub cumulative_time_seconds: u64,
    pub total_attempts: u32,
    pub created_at: DateTime<Utc>,
}

impl Enrollment {
    pub fn new(learner: LearnerId, content: ContentId, now: DateTime<Utc>) -> Self {
        Self {
            id: EnrollmentId(Uuid::new_v4()),
            learner,
            content,
            status: EnrollmentStatus::NotStarted,
            best_score: None,
            first_completion_at: None,
            last_completion_at: None,
            cumulative_time_seconds: 0,
            total_attempts: 0,
            created_at: now,
        }
    }
}

/// One launch/session of a content package. Created at launch, mutated by
/// every accepted commit, closed by terminate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attempt {
    pub id: AttemptId,
    pub enrollment: EnrollmentId,
    /// Monotonically increasing, scoped to the enrollment.
    pub number: u32,
    pub session: SessionId,
    /// Idempotency watermark: a commit with sequence <= this value for the
    /// same session id has already been applied.
    pub last_applied_sequence: u64,
    pub version: ScormVersion,
    pub entry_mode: EntryMode,

    pub lesson_status: Option<LessonStatus>,
    pub completion_status: Option<CompletionStatus>,
    pub success_status: Option<SuccessStatus>,
    pub score: Score,
    pub total_time_seconds: u64,
    /// Set once the package writes a total-time element itself; until then
    /// the total tracks the largest session time seen.
    #[serde(default)]
    pub total_time_explicit: bool,
    pub session_time_seconds: u64,
    pub lesson_location: Option<String>,
    pub suspend_data: Option<String>,
    pub exit: Option<ExitMode>,

    pub interactions: BTreeMap<u32, BTreeMap<String, String>>,
    pub objectives: BTreeMap<u32, BTreeMap<String, String>>,
    /// Full last-known element map, kept for audit/debug.
    pub cmi_snapshot: BTreeMap<String, String>,

    pub completed_at: Option<DateTime<Utc>>,
    pub terminated: bool,
    pub exit_mode: Option<ExitMode>,
    pub started_at: DateTime<Utc>,
}

impl Attempt {
    pub fn new(
        enrollment: EnrollmentId,
        number: u32,
        session: SessionId,
        version: ScormVersion,
        entry_mode: EntryMode,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: AttemptId(Uuid::new_v4()),
            enrollment,
            number,
            session,
            last_applied_sequence: 0,
            version,
            entry_mode,
            lesson_status: None,
            completion_status: None,
            success_status: None,
            score: Score::default(),
            total_time_seconds: 0,
            total_time_explicit: false,
            session_time_seconds: 0,
            lesson_location: None,
            suspend_data: None,
            exit: None,
            interactions: BTreeMap::new(),
            objectives: BTreeMap::new(),
            cmi_snapshot: BTreeMap::new(),
            completed_at: None,
            terminated: false,
            exit_mode: None,
            started_at: now,
        }
    }

    pub fn is_open(&self) -> bool {
        !self.terminated
    }

    pub fn has_bookmark(&self) -> bool {
        self.suspend_data.as_deref().is_some_and(|s| !s.is_empty())
            || self.lesson_location.as_deref().is_some_and(|s| !s.is_empty())
    }

    /// Fold a validated batch into this attempt and re-resolve completion.
    ///
    /// Returns `true` exactly when this application transitions the attempt
    /// into complete for the first time. Completion is monotonic: a batch
    /// whose merged result would downgrade an already-complete attempt has
    /// its status writes discarded (everything else still applies).
    pub fn apply_batch(&mut self, batch: &NormalizedBatch, now: DateTime<Utc>) -> bool {
        let was_complete = self.completed_at.is_some();
        let prior_status = (
            self.lesson_status,
            self.completion_status,
            self.success_status,
        );

        let projected = &batch.projected;
        if let Some(status) = projected.lesson_status {
            self.lesson_status = Some(status);
        }
        if let Some(status) = projected.completion_status {
            self.completion_status = Some(status);
        }
        if let Some(status) = projected.success_status {
            self.success_status = Some(status);
        }
        self.score.merge(&projected.score);

        // Session time is stored verbatim. The attempt total comes from an
        // explicit total-time write when the package sends one; packages
        // that never do report a growing session elapsed each commit, so
        // until an explicit write arrives the total tracks the largest
        // session time seen (the LMS-accumulates convention).
        if let Some(session_seconds) = projected.session_time_seconds {
            self.session_time_seconds = session_seconds;
        }
        if let Some(total_seconds) = projected.total_time_seconds {
            self.total_time_seconds = total_seconds;
            self.total_time_explicit = true;
        } else if !self.total_time_explicit {
            if let Some(session_seconds) = projected.session_time_seconds {
                self.total_time_seconds = self.total_time_seconds.max(session_seconds);
            }
        }

        if let Some(location) = &projected.lesson_location {
            self.lesson_location = Some(location.clone());
        }
        if let Some(suspend) = &projected.suspend_data {
            self.suspend_data = Some(suspend.clone());
        }
        if let Some(exit) = projected.exit {
            self.exit = Some(exit);
        }

        for (index, fields) in &batch.interactions {
            self.interactions
                .entry(*index)
                .or_default()
                .extend(fields.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        for (index, fields) in &batch.objectives {
            self.objectives
                .entry(*index)
                .or_default()
                .extend(fields.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        self.cmi_snapshot
            .extend(batch.raw.iter().map(|(k, v)| (k.clone(), v.clone())));

        let resolution = completion::resolve(
            self.version,
            self.lesson_status,
            self.completion_status,
            self.success_status,
        );

        if was_complete && !resolution.complete {
            // Stale downgrade: keep the terminal status fields.
            (
                self.lesson_status,
                self.completion_status,
                self.success_status,
            ) = prior_status;
            return false;
        }

        if resolution.complete && !was_complete {
            self.completed_at = Some(now);
            return true;
        }
        false
    }
}

/// Pre-attempt-tracking bookmark record, kept per enrollment. Read only when
/// an enrollment has no attempt rows at all.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LegacyBookmark {
    pub lesson_location: Option<String>,
    pub suspend_data: Option<String>,
}
