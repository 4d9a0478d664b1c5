//! Launch planning: entry mode decision and bookmark supply.
//!
//! At launch time the engine decides whether the learner starts fresh or
//! resumes mid-content, and hands the in-browser shim whatever bookmark data
//! the open attempt carries.

use crate::core::{EntryMode, Result, ScormVersion, Score, SessionId};
use crate::store::{Attempt, Enrollment, TrackingStore};

/// What a launch hands to the in-browser shim.
#[derive(Debug, Clone)]
pub struct LaunchPlan {
    pub entry: EntryMode,
    pub lesson_location: String,
    pub suspend_data: String,
    /// Version-appropriate status token for the resumed attempt, if any.
    pub completion: Option<&'static str>,
    pub score: Score,
    /// Session id the shim should commit under: the open attempt's existing
    /// id on resume, a fresh one otherwise.
    pub session: SessionId,
    pub attempt: Attempt,
}

/// Decide entry mode for a launch and create or reuse the attempt row.
///
/// - Open attempt with a non-empty bookmark field: resume it.
/// - Open attempt with empty bookmark fields: reuse the row, start fresh
///   (an empty bookmark is no reason to fork a new attempt).
/// - No attempt rows at all: consult the legacy per-enrollment bookmark
///   before starting ab-initio (backward compatibility with enrollments
///   tracked before attempt rows existed).
pub async fn plan_launch(
    store: &TrackingStore,
    enrollment: &Enrollment,
    version: ScormVersion,
) -> Result<LaunchPlan> {
    if let Some(open) = store.latest_open_attempt(enrollment.id).await {
        let entry = if open.has_bookmark() {
            EntryMode::Resume
        } else {
            EntryMode::AbInitio
        };
        return Ok(LaunchPlan {
            entry,
            lesson_location: open.lesson_location.clone().unwrap_or_default(),
            suspend_data: open.suspend_data.clone().unwrap_or_default(),
            completion: status_token(&open),
            score: open.score,
            session: open.session.clone(),
            attempt: open,
        });
    }

    let had_attempts = !store.attempts_of(enrollment.id).await.is_empty();
    let legacy = if had_attempts {
        // Attempt-level data exists; the legacy record is no longer
        // authoritative.
        None
    } else {
        store
            .legacy_bookmark(enrollment.id)
            .await
            .filter(|bookmark| {
                bookmark.lesson_location.as_deref().is_some_and(|s| !s.is_empty())
                    || bookmark.suspend_data.as_deref().is_some_and(|s| !s.is_empty())
            })
    };

    let session = SessionId::generate();
    let entry = if legacy.is_some() {
        EntryMode::Resume
    } else {
        EntryMode::AbInitio
    };
    let attempt = store
        .get_open_attempt_or_create(enrollment.id, &session, version, entry)
        .await?;

    let (lesson_location, suspend_data) = match legacy {
        Some(bookmark) => (
            bookmark.lesson_location.unwrap_or_default(),
            bookmark.suspend_data.unwrap_or_default(),
        ),
        None => (String::new(), String::new()),
    };

    Ok(LaunchPlan {
        entry,
        lesson_location,
        suspend_data,
        completion: None,
        score: Score::default(),
        // The attempt may pre-date this launch if another tab created it
        // between our check and the store call; commit under its session.
        session: attempt.session.clone(),
        attempt,
    })
}

fn status_token(attempt: &Attempt) -> Option<&'static str> {
    match attempt.version {
        ScormVersion::V1_2 => attempt.lesson_status.map(|s| s.token()),
        ScormVersion::V2004 => attempt.completion_status.map(|s| s.token()),
    }
}
