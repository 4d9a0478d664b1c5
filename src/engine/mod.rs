//! The RTE commit handler: the engine's orchestration boundary.
//!
//! Receives batched CMI writes from the in-browser shim, enforces
//! idempotency and ordering, and drives the validator, time codec,
//! completion resolver, and store in sequence. Every operation is one short,
//! bounded store transaction; there is no background work.

use crate::cmi::{self, ElementWarning};
use crate::core::{
    ContentId, EnrollmentStatus, LearnerId, Result, ScormVersion, SessionId, TrackError,
};
use crate::resume;
use crate::store::TrackingStore;
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

// ============================================================================
// Collaborators
// ============================================================================

/// Read-only view of the external content-package store: the declared SCORM
/// version and entry file of a package. Package storage and extraction live
/// outside the engine.
#[async_trait]
pub trait ContentPackages: Send + Sync {
    async fn version_of(&self, content: &ContentId) -> Option<ScormVersion>;
    async fn entry_file(&self, content: &ContentId) -> Option<String>;
}

/// In-memory package registry, used by the server binary and tests.
#[derive(Debug, Default)]
pub struct InMemoryContentPackages {
    packages: HashMap<ContentId, (ScormVersion, String)>,
}

impl InMemoryContentPackages {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, content: ContentId, version: ScormVersion, entry_file: &str) {
        self.packages
            .insert(content, (version, entry_file.to_string()));
    }
}

#[async_trait]
impl ContentPackages for InMemoryContentPackages {
    async fn version_of(&self, content: &ContentId) -> Option<ScormVersion> {
        self.packages.get(content).map(|(version, _)| *version)
    }

    async fn entry_file(&self, content: &ContentId) -> Option<String> {
        self.packages.get(content).map(|(_, entry)| entry.clone())
    }
}

// ============================================================================
// Wire types
// ============================================================================

/// Commit envelope posted by the shim. `cmi` holds one string value per
/// element name; JSON object keys are unique, so within one envelope there
/// is exactly one (latest) value per element.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitRequest {
    pub session_id: String,
    /// Monotonic per session, +1 per commit. Retries resend the same value.
    pub sequence: u64,
    pub scorm_version: String,
    pub cmi: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitResponse {
    pub accepted: bool,
    pub duplicate: bool,
    pub enrollment_status: EnrollmentStatus,
    pub attempt_complete: bool,
    /// Elements dropped from the structured projection, with why. Never a
    /// hard failure.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<ElementWarning>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaunchResponse {
    pub entry: String,
    pub lesson_location: String,
    pub suspend_data: String,
    pub session_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerminateResponse {
    pub terminated: bool,
    pub attempt_complete: bool,
}

/// The only enrollment fields other subsystems may read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrollmentSummary {
    pub status: EnrollmentStatus,
    pub best_score: Option<f64>,
    pub cumulative_time_seconds: u64,
    pub total_attempts: u32,
}

// ============================================================================
// Handler
// ============================================================================

pub struct CommitHandler {
    store: Arc<TrackingStore>,
    packages: Arc<dyn ContentPackages>,
}

impl CommitHandler {
    pub fn new(store: Arc<TrackingStore>, packages: Arc<dyn ContentPackages>) -> Self {
        Self { store, packages }
    }

    pub fn store(&self) -> &Arc<TrackingStore> {
        &self.store
    }

    /// Launch: decide fresh-vs-resume and hand back bookmark data.
    pub async fn launch(&self, learner: &LearnerId, content: &ContentId) -> Result<LaunchResponse> {
        let version = self
            .packages
            .version_of(content)
            .await
            .ok_or_else(|| TrackError::UnknownContent(content.0.clone()))?;

        let enrollment = self.store.get_or_create_enrollment(learner, content).await;
        let plan = resume::plan_launch(&self.store, &enrollment, version).await?;

        tracing::info!(
            learner = %learner,
            content = %content,
            entry = plan.entry.token(),
            attempt = plan.attempt.number,
            "launch"
        );

        Ok(LaunchResponse {
            entry: plan.entry.token().to_string(),
            lesson_location: plan.lesson_location,
            suspend_data: plan.suspend_data,
            session_id: plan.session.0,
        })
    }

    /// Commit: the critical path. Validates the envelope, normalizes the
    /// batch, and applies it atomically. Duplicates are acknowledged as
    /// success so the shim never sees an error for a legitimate retry.
    pub async fn commit(
        &self,
        learner: &LearnerId,
        content: &ContentId,
        request: CommitRequest,
    ) -> Result<CommitResponse> {
        if request.session_id.is_empty() {
            return Err(TrackError::Protocol("missing session_id".into()));
        }
        if request.sequence == 0 {
            return Err(TrackError::Protocol("sequence must start at 1".into()));
        }
        let request_version = ScormVersion::from_tag(&request.scorm_version).ok_or_else(|| {
            TrackError::Protocol(format!("unknown scorm_version '{}'", request.scorm_version))
        })?;

        if self.packages.version_of(content).await.is_none() {
            return Err(TrackError::UnknownContent(content.0.clone()));
        }

        let session = SessionId(request.session_id);
        let enrollment = self.store.get_or_create_enrollment(learner, content).await;
        // A late retry after terminate belongs to its original attempt; any
        // other commit lands on the open attempt, or opens one (a commit
        // without a prior launch happens when the shim restarts).
        let attempt = match self
            .store
            .find_attempt_by_session(enrollment.id, &session)
            .await
        {
            Some(attempt) => attempt,
            None => {
                self.store
                    .get_open_attempt_or_create(
                        enrollment.id,
                        &session,
                        request_version,
                        crate::core::EntryMode::AbInitio,
                    )
                    .await?
            }
        };

        // Validation branches on the attempt's stored version, not the
        // envelope tag, so one mislabeled retry cannot flip the schema.
        if attempt.version != request_version {
            tracing::warn!(
                attempt = %attempt.id.0,
                stored = attempt.version.tag(),
                envelope = request_version.tag(),
                "scorm_version mismatch; using stored version"
            );
        }
        let writes: Vec<(String, String)> = request.cmi.into_iter().collect();
        let batch = cmi::validate_batch(attempt.version, &writes);

        let applied = self
            .store
            .apply_commit(attempt.id, &session, request.sequence, &batch, Utc::now())
            .await?;

        if applied.newly_completed {
            tracing::info!(
                learner = %learner,
                content = %content,
                attempt = attempt.number,
                "attempt completed"
            );
        }
        for warning in &batch.warnings {
            tracing::debug!(
                element = %warning.element,
                kind = ?warning.kind,
                "element dropped from projection"
            );
        }

        Ok(CommitResponse {
            accepted: true,
            duplicate: applied.duplicate,
            enrollment_status: applied.enrollment_status,
            attempt_complete: applied.attempt_complete,
            warnings: batch.warnings,
        })
    }

    /// Terminate: close the attempt owning the supplied session. No implicit
    /// final commit happens here; the shim sends its last commit before
    /// calling this.
    pub async fn terminate(
        &self,
        learner: &LearnerId,
        content: &ContentId,
        session_id: &str,
    ) -> Result<TerminateResponse> {
        if session_id.is_empty() {
            return Err(TrackError::Protocol("missing session_id".into()));
        }
        let enrollment = self
            .store
            .find_enrollment(learner, content)
            .await
            .ok_or_else(|| TrackError::NotFound(format!("enrollment for '{content}'")))?;
        let session = SessionId(session_id.to_string());
        let owner = self
            .store
            .find_attempt_by_session(enrollment.id, &session)
            .await
            .ok_or_else(|| TrackError::NotFound(format!("session '{session_id}'")))?;
        if owner.terminated {
            // A stale tab's unload handler fires after a relaunch; ack it
            // without touching whatever attempt is open now.
            return Ok(TerminateResponse {
                terminated: true,
                attempt_complete: owner.completed_at.is_some(),
            });
        }

        let attempt = self.store.terminate_attempt(owner.id, None).await?;
        tracing::info!(
            learner = %learner,
            content = %content,
            attempt = attempt.number,
            exit = ?attempt.exit_mode,
            "attempt terminated"
        );
        Ok(TerminateResponse {
            terminated: true,
            attempt_complete: attempt.completed_at.is_some(),
        })
    }

    /// The gradebook read surface.
    pub async fn summary(
        &self,
        learner: &LearnerId,
        content: &ContentId,
    ) -> Result<EnrollmentSummary> {
        let enrollment = self
            .store
            .find_enrollment(learner, content)
            .await
            .ok_or_else(|| TrackError::NotFound(format!("enrollment for '{content}'")))?;
        Ok(EnrollmentSummary {
            status: enrollment.status,
            best_score: enrollment.best_score,
            cumulative_time_seconds: enrollment.cumulative_time_seconds,
            total_attempts: enrollment.total_attempts,
        })
    }
}
